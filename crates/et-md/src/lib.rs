//! # et-md
//!
//! Market-data side of the trigger.
//!
//! ```text
//! SUBSCRIPTION_DATA (token C) ──► tick::parse_tick ──► QuoteSnapshot::apply
//!                                                      │ both sides known
//!                                                      ▼
//!                                        MarketTrigger::on_quote ──► [BUY, SELL]
//! ```
//!
//! - [`tick`]: bid/ask extraction from a market-data message
//! - [`quote`]: last-known bid/ask with stale-but-valid semantics
//! - [`trigger`]: builds the order pair for a fully-known quote

pub mod quote;
pub mod tick;
pub mod trigger;

pub use quote::QuoteSnapshot;
pub use tick::parse_tick;
pub use trigger::MarketTrigger;
