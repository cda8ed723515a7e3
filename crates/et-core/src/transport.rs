//! The session transport boundary.
//!
//! A transport opens services, creates subscriptions and sends requests on
//! behalf of the core. Every operation is fire-and-forget: the `Result` only
//! reports whether the transport *accepted* the operation locally. Outcomes
//! (service opened, subscription started, response) arrive later as
//! [`Event`](crate::event::Event)s on the inbound event channel.
//!
//! Two implementations ship with the crate:
//! - [`WsBridge`](crate::ws::WsBridge): live WebSocket bridge to a gateway.
//! - [`RecordingTransport`]: records every call; used for replay and tests.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::error::EtError;
use crate::request::{OutboundRequest, Subscription};
use crate::token::CorrelationToken;
use crate::types::OrderRequest;

/// Operations the core needs from the session layer.
///
/// Implementations must be callable from both the event loop and the
/// dispatcher thread.
pub trait Transport: Send + Sync {
    /// Human-readable transport name.
    fn name(&self) -> &str;

    /// Ask the session to activate a named service.
    fn open_service(&self, service: &str) -> Result<(), EtError>;

    /// Create and activate subscriptions.
    fn subscribe(&self, subscriptions: &[Subscription]) -> Result<(), EtError>;

    /// Send a request tagged with `token`.
    fn send_request(&self, request: &OutboundRequest, token: CorrelationToken) -> Result<(), EtError>;
}

// ---------------------------------------------------------------------------
// RecordingTransport
// ---------------------------------------------------------------------------

/// One call accepted by a [`RecordingTransport`].
#[derive(Debug, Clone, PartialEq)]
pub enum TransportCall {
    OpenService(String),
    Subscribe(Vec<Subscription>),
    SendRequest { token: CorrelationToken, request: OutboundRequest },
}

/// In-memory transport that records every accepted call in order.
///
/// Request sends can be made to fail on demand to exercise the dispatcher's
/// drop-on-failure path; failed sends are counted but not recorded.
#[derive(Debug, Default)]
pub struct RecordingTransport {
    calls: Mutex<Vec<TransportCall>>,
    fail_requests: AtomicBool,
    failed_requests: AtomicU64,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent `send_request` calls fail (`true`) or succeed.
    pub fn set_fail_requests(&self, fail: bool) {
        self.fail_requests.store(fail, Ordering::SeqCst);
    }

    /// Snapshot of all recorded calls.
    pub fn calls(&self) -> Vec<TransportCall> {
        self.calls.lock().clone()
    }

    /// Orders sent so far, with their tokens, in send order.
    pub fn sent_orders(&self) -> Vec<(CorrelationToken, OrderRequest)> {
        self.calls
            .lock()
            .iter()
            .filter_map(|c| match c {
                TransportCall::SendRequest { token, request } => request.order().map(|o| (*token, o.clone())),
                _ => None,
            })
            .collect()
    }

    /// Services opened so far, in order.
    pub fn opened_services(&self) -> Vec<String> {
        self.calls
            .lock()
            .iter()
            .filter_map(|c| match c {
                TransportCall::OpenService(s) => Some(s.clone()),
                _ => None,
            })
            .collect()
    }

    /// Number of `send_request` calls that were refused.
    pub fn failed_requests(&self) -> u64 {
        self.failed_requests.load(Ordering::SeqCst)
    }
}

impl Transport for RecordingTransport {
    fn name(&self) -> &str {
        "recording"
    }

    fn open_service(&self, service: &str) -> Result<(), EtError> {
        self.calls.lock().push(TransportCall::OpenService(service.to_string()));
        Ok(())
    }

    fn subscribe(&self, subscriptions: &[Subscription]) -> Result<(), EtError> {
        self.calls.lock().push(TransportCall::Subscribe(subscriptions.to_vec()));
        Ok(())
    }

    fn send_request(&self, request: &OutboundRequest, token: CorrelationToken) -> Result<(), EtError> {
        if self.fail_requests.load(Ordering::SeqCst) {
            self.failed_requests.fetch_add(1, Ordering::SeqCst);
            return Err(EtError::Transport(format!("send of request {token} refused")));
        }
        self.calls.lock().push(TransportCall::SendRequest { token, request: request.clone() });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ref_request() -> OutboundRequest {
        OutboundRequest::ReferenceData {
            service: "//blp/refdata".into(),
            securities: vec!["IBM US Equity".into()],
            fields: vec!["PARSEKYABLE_DES_SOURCE".into()],
        }
    }

    #[test]
    fn records_calls_in_order() {
        let t = RecordingTransport::new();
        t.open_service("//blp/refdata").unwrap();
        t.send_request(&ref_request(), CorrelationToken(1)).unwrap();
        t.open_service("//blp/emapisvc_beta").unwrap();

        let calls = t.calls();
        assert_eq!(calls.len(), 3);
        assert_eq!(t.opened_services(), vec!["//blp/refdata", "//blp/emapisvc_beta"]);
        assert!(matches!(calls[1], TransportCall::SendRequest { token: CorrelationToken(1), .. }));
        assert!(t.sent_orders().is_empty());
    }

    #[test]
    fn failing_sends_are_counted_not_recorded() {
        let t = RecordingTransport::new();
        t.set_fail_requests(true);
        assert!(t.send_request(&ref_request(), CorrelationToken(1)).is_err());
        assert_eq!(t.failed_requests(), 1);
        assert!(t.calls().is_empty());

        t.set_fail_requests(false);
        assert!(t.send_request(&ref_request(), CorrelationToken(2)).is_ok());
        assert_eq!(t.calls().len(), 1);
    }
}
