//! Market-data structures.

use serde::{Deserialize, Serialize};

use super::enums::PricePoint;

/// A fully-known top of book. Both sides are strictly positive.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub bid: f64,
    pub ask: f64,
}

impl Quote {
    #[inline]
    pub fn price_at(&self, point: PricePoint) -> f64 {
        match point {
            PricePoint::Bid => self.bid,
            PricePoint::Ask => self.ask,
        }
    }
}

/// Fields carried by one market-data tick. Either side may be absent.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Tick {
    pub bid: Option<f64>,
    pub ask: Option<f64>,
}

impl Tick {
    pub fn is_empty(&self) -> bool {
        self.bid.is_none() && self.ask.is_none()
    }
}
