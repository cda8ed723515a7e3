//! Market trigger: one BUY and one SELL per qualifying quote.

use et_core::config::{OrderDefaults, TriggerConfig};
use et_core::types::{InstrumentConfig, OrderRequest, Quote, Side};
use tracing::{debug, info};

/// Turns fully-known quotes into order pairs.
///
/// By default every call fires. With `suppress_while_pending` set, a pair is
/// held back while any earlier order is still outstanding at the dispatcher.
#[derive(Debug, Clone)]
pub struct MarketTrigger {
    instrument: InstrumentConfig,
    defaults: OrderDefaults,
    suppress_while_pending: bool,
    fired: u64,
    suppressed: u64,
}

impl MarketTrigger {
    pub fn new(instrument: InstrumentConfig, defaults: OrderDefaults, config: &TriggerConfig) -> Self {
        Self {
            instrument,
            defaults,
            suppress_while_pending: config.suppress_while_pending,
            fired: 0,
            suppressed: 0,
        }
    }

    /// Build the `[BUY, SELL]` pair for `quote`, or `None` if suppressed.
    ///
    /// `outstanding` is the dispatcher's count of unresolved orders; it is
    /// only consulted when suppression is enabled.
    pub fn on_quote(&mut self, quote: Quote, outstanding: usize) -> Option<[OrderRequest; 2]> {
        if self.suppress_while_pending && outstanding > 0 {
            self.suppressed += 1;
            debug!(
                "[trigger] suppressed at bid={:.4} ask={:.4}: {outstanding} order(s) outstanding",
                quote.bid, quote.ask
            );
            return None;
        }

        let buy = OrderRequest::priced_from(Side::Buy, &self.instrument, quote, &self.defaults);
        let sell = OrderRequest::priced_from(Side::Sell, &self.instrument, quote, &self.defaults);
        self.fired += 1;
        info!("[trigger] bid={:.4} ask={:.4} -> {buy} | {sell}", quote.bid, quote.ask);
        Some([buy, sell])
    }

    /// Pairs produced so far.
    pub fn fired(&self) -> u64 {
        self.fired
    }

    /// Pairs held back by in-flight suppression.
    pub fn suppressed(&self) -> u64 {
        self.suppressed
    }
}
