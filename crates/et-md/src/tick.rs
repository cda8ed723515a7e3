//! Bid/ask extraction from market-data messages.

use et_core::config::MarketDataFields;
use et_core::json_util::f64_field;
use et_core::types::Tick;
use serde_json::{Map, Value};

/// Pull the configured bid and ask fields out of a message payload.
///
/// Absent or unparseable fields come back as `None`. Non-positive values are
/// treated the same way: a zero bid is how feeds say "no bid".
pub fn parse_tick(fields: &Map<String, Value>, names: &MarketDataFields) -> Tick {
    Tick {
        bid: f64_field(fields, &names.bid).filter(|v| *v > 0.0),
        ask: f64_field(fields, &names.ask).filter(|v| *v > 0.0),
    }
}
