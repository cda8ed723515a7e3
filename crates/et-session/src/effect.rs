//! Side effects requested by the router.

use et_core::request::{OutboundRequest, Subscription};
use et_core::token::CorrelationToken;
use et_core::types::OrderRequest;
use et_td::Resolution;

/// One action for the engine to carry out, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Ask the transport to activate a service.
    OpenService(String),
    /// Create and activate subscriptions.
    Subscribe(Vec<Subscription>),
    /// Send a lifecycle request (the reference-data lookup).
    SendRequest { token: CorrelationToken, request: OutboundRequest },
    /// Queue an order for the dispatcher.
    Submit(OrderRequest),
    /// Hand a response to the dispatcher for correlation.
    Resolve { token: CorrelationToken, resolution: Resolution },
}
