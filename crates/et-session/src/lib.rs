//! # et-session
//!
//! Session lifecycle and event routing.
//!
//! ## Architecture
//!
//! ```text
//! Transport ──► EventReceiver ──► Engine::on_event
//!                                   │
//!                                   ├─► Router::handle(event, outstanding) ──► Vec<Effect>
//!                                   │     ├─ Lifecycle (session/service/subscription status)
//!                                   │     ├─ QuoteSnapshot + MarketTrigger (token C)
//!                                   │     └─ order/route projection (tokens A, B)
//!                                   │
//!                                   └─► apply effects: Transport ops, DispatchHandle submit/resolve
//! ```
//!
//! The router performs no I/O; everything it wants done is returned as an
//! [`Effect`], which keeps it testable without a live transport.

pub mod effect;
pub mod engine;
pub mod lifecycle;
pub mod router;

pub use effect::Effect;
pub use engine::Engine;
pub use lifecycle::{Channel, Lifecycle, SessionState};
pub use router::Router;
