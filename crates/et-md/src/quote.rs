//! Last-known top of book.

use et_core::types::{Quote, Tick};

/// Last bid and ask seen on the market-data subscription.
///
/// Sides update independently and are kept until overwritten, so the pair is
/// not a point-in-time quote. Owned by the event loop; never shared.
#[derive(Debug, Clone, Copy, Default)]
pub struct QuoteSnapshot {
    bid: Option<f64>,
    ask: Option<f64>,
}

impl QuoteSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge one tick into the snapshot.
    ///
    /// Returns the resulting quote when the tick carried at least one usable
    /// side and both sides are now known. Non-positive values never overwrite.
    pub fn apply(&mut self, tick: Tick) -> Option<Quote> {
        let mut updated = false;
        if let Some(bid) = tick.bid.filter(|v| *v > 0.0) {
            self.bid = Some(bid);
            updated = true;
        }
        if let Some(ask) = tick.ask.filter(|v| *v > 0.0) {
            self.ask = Some(ask);
            updated = true;
        }
        if updated { self.current() } else { None }
    }

    /// The quote, if both sides have been seen.
    pub fn current(&self) -> Option<Quote> {
        Some(Quote { bid: self.bid?, ask: self.ask? })
    }

    pub fn bid(&self) -> Option<f64> {
        self.bid
    }

    pub fn ask(&self) -> Option<f64> {
        self.ask
    }
}
