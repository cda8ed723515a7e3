//! Trading-related data structures: the instrument being traded and the
//! order requests the trigger produces.

use serde::{Deserialize, Serialize};

use super::enums::{OrderType, PricePoint, Side, TimeInForce};
use super::market_data::Quote;
use crate::config::OrderDefaults;
use crate::error::EtError;

// ---------------------------------------------------------------------------
// Instrument configuration (fixed at startup)
// ---------------------------------------------------------------------------

/// The single instrument this process trades, and how it prices orders.
///
/// Built once from the command line and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentConfig {
    /// Gateway ticker (e.g. `"IBM US Equity"`).
    pub ticker: String,
    /// Order quantity for every generated order.
    pub amount: u32,
    /// Quote side used to price BUY orders.
    pub buy_at: PricePoint,
    /// Quote side used to price SELL orders.
    pub sell_at: PricePoint,
}

impl InstrumentConfig {
    /// Validate and build an instrument configuration.
    pub fn new(
        ticker: impl Into<String>,
        amount: u32,
        buy_at: PricePoint,
        sell_at: PricePoint,
    ) -> Result<Self, EtError> {
        let ticker = ticker.into();
        if ticker.trim().is_empty() {
            return Err(EtError::InvalidArgument("ticker must not be empty".into()));
        }
        if amount == 0 {
            return Err(EtError::InvalidArgument("amount must be a positive integer".into()));
        }
        Ok(Self { ticker, amount, buy_at, sell_at })
    }

    /// Reference price point for the given side.
    pub fn price_point(&self, side: Side) -> PricePoint {
        match side {
            Side::Buy => self.buy_at,
            Side::Sell => self.sell_at,
        }
    }

    /// The startup parameter report, one `NAME: value` line per parameter.
    pub fn report(&self) -> Vec<String> {
        vec![
            format!("SELLAT: {}", self.sell_at),
            format!("BUYAT: {}", self.buy_at),
            format!("AMOUNT: {}", self.amount),
            format!("TICKER: {}", self.ticker),
        ]
    }
}

// ---------------------------------------------------------------------------
// Order request (trigger → dispatcher → gateway)
// ---------------------------------------------------------------------------

/// One create-order-and-route request. Immutable once enqueued.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRequest {
    pub side: Side,
    pub ticker: String,
    pub amount: u32,
    pub order_type: OrderType,
    pub limit_price: f64,
    pub time_in_force: TimeInForce,
    pub broker: String,
    pub hand_instruction: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exec_instruction: Option<String>,
}

impl OrderRequest {
    /// Build an order for `side`, priced from `quote` at the instrument's
    /// configured reference point.
    pub fn priced_from(
        side: Side,
        instrument: &InstrumentConfig,
        quote: Quote,
        defaults: &OrderDefaults,
    ) -> Self {
        Self {
            side,
            ticker: instrument.ticker.clone(),
            amount: instrument.amount,
            order_type: defaults.order_type,
            limit_price: quote.price_at(instrument.price_point(side)),
            time_in_force: defaults.time_in_force,
            broker: defaults.broker.clone(),
            hand_instruction: defaults.hand_instruction.clone(),
            exec_instruction: defaults.exec_instruction.clone(),
        }
    }
}

impl std::fmt::Display for OrderRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {} {} @ {:.4} {} {}",
            self.side, self.amount, self.ticker, self.limit_price, self.order_type, self.time_in_force,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instrument_validation() {
        assert!(InstrumentConfig::new("IBM US Equity", 1000, PricePoint::Bid, PricePoint::Ask).is_ok());
        assert!(InstrumentConfig::new("  ", 1000, PricePoint::Bid, PricePoint::Ask).is_err());
        assert!(InstrumentConfig::new("IBM US Equity", 0, PricePoint::Bid, PricePoint::Ask).is_err());
    }

    #[test]
    fn report_echoes_parameters() {
        let cfg = InstrumentConfig::new("VOD LN Equity", 250, PricePoint::Ask, PricePoint::Bid).unwrap();
        assert_eq!(
            cfg.report(),
            vec!["SELLAT: BID", "BUYAT: ASK", "AMOUNT: 250", "TICKER: VOD LN Equity"]
        );
    }

    #[test]
    fn order_priced_from_configured_point() {
        let cfg = InstrumentConfig::new("IBM US Equity", 1000, PricePoint::Bid, PricePoint::Ask).unwrap();
        let quote = Quote { bid: 100.00, ask: 100.05 };
        let defaults = OrderDefaults::default();

        let buy = OrderRequest::priced_from(Side::Buy, &cfg, quote, &defaults);
        let sell = OrderRequest::priced_from(Side::Sell, &cfg, quote, &defaults);

        assert_eq!(buy.limit_price, 100.00);
        assert_eq!(sell.limit_price, 100.05);
        assert_eq!(buy.amount, 1000);
        assert_eq!(buy.order_type, OrderType::Limit);
        assert_eq!(buy.broker, "BB");
    }
}
