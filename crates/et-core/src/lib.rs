//! # et-core
//!
//! Core crate for the EMSX trigger system, providing:
//!
//! - **Types** (`types`): enums, instrument config, order request, quote/tick
//! - **Tokens** (`token`): correlation tokens and the process-wide token source
//! - **Events** (`event`): the inbound event model multiplexed by the transport
//! - **Requests** (`request`): subscriptions and one-shot outbound requests
//! - **Transport** (`transport`): the session boundary trait + recording double
//! - **WebSocket** (`ws`): live bridge transport
//! - **Configuration** (`config`): JSON config deserialization
//! - **Error types** (`error`): domain-specific `EtError` via thiserror
//! - **CPU affinity** (`cpu_affinity`): pinning the dispatcher thread
//! - **JSON helpers** (`json_util`): lenient numeric field access
//! - **Logging** (`logging`): tracing-based structured logging

pub mod config;
pub mod cpu_affinity;
pub mod error;
pub mod event;
pub mod json_util;
pub mod logging;
pub mod request;
pub mod token;
pub mod transport;
pub mod types;
pub mod ws;

// Re-export types at crate root for convenience.
pub use types::*;
