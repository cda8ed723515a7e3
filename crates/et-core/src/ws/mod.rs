//! WebSocket bridge transport (live mode).

pub mod bridge;

pub use bridge::WsBridge;
