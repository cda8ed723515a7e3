//! # et-td
//!
//! Order side of the trigger: the dispatch pipeline and the payloads the
//! order-gateway sends back.
//!
//! ```text
//! MarketTrigger ──► DispatchHandle::submit ──► [crossbeam queue] ──► Dispatcher thread
//!                                                    ▲                 │ token → registry
//! Router (RESPONSE) ──► DispatchHandle::resolve ─────┘                 ▼
//!                                                               Transport::send_request
//! ```
//!
//! - [`registry`]: in-flight orders keyed by correlation token
//! - [`dispatcher`]: the single owner of the registry and its worker thread
//! - [`response`]: acknowledgement / rejection parsing
//! - [`update`]: order and route subscription payload projection
//! - [`latency`]: acknowledgement round-trip histogram

pub mod dispatcher;
pub mod latency;
pub mod registry;
pub mod response;
pub mod update;

pub use dispatcher::{
    DispatchCommand, DispatchHandle, Dispatcher, DispatcherOutcome, DispatcherStats, DispatcherTask,
};
pub use registry::{CorrelationRegistry, PendingOrder};
pub use response::Resolution;
pub use update::{OrderRouteUpdate, UpdateKind};
