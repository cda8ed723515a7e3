//! Applies router effects to the transport and the dispatcher.

use std::sync::Arc;

use et_core::event::Event;
use et_core::transport::Transport;
use et_td::DispatchHandle;
use tracing::{error, warn};

use crate::effect::Effect;
use crate::lifecycle::SessionState;
use crate::router::Router;

/// The event-loop side of the system.
///
/// Handles one event at a time, synchronously; never blocks. Order requests
/// go to the dispatcher queue, everything else straight to the transport.
pub struct Engine {
    router: Router,
    transport: Arc<dyn Transport>,
    dispatch: DispatchHandle,
}

impl Engine {
    pub fn new(router: Router, transport: Arc<dyn Transport>, dispatch: DispatchHandle) -> Self {
        Self { router, transport, dispatch }
    }

    /// Route one event and carry out the resulting effects. Returns the
    /// lifecycle state afterwards.
    pub fn on_event(&mut self, event: &Event) -> SessionState {
        let effects = self.router.handle(event, self.dispatch.outstanding());
        for effect in effects {
            self.apply(effect);
        }
        self.router.lifecycle().state()
    }

    fn apply(&self, effect: Effect) {
        match effect {
            Effect::OpenService(service) => {
                if let Err(e) = self.transport.open_service(&service) {
                    error!("[session] could not request {service}: {e}");
                }
            }
            Effect::Subscribe(subs) => {
                if let Err(e) = self.transport.subscribe(&subs) {
                    let topics: Vec<&str> = subs.iter().map(|s| s.topic.as_str()).collect();
                    error!("[session] could not subscribe {topics:?}: {e}");
                }
            }
            Effect::SendRequest { token, request } => {
                if let Err(e) = self.transport.send_request(&request, token) {
                    error!("[session] could not send {} request {token}: {e}", request.service());
                }
            }
            Effect::Submit(order) => {
                if let Err(e) = self.dispatch.submit(order) {
                    error!("[session] order not queued: {e}");
                }
            }
            Effect::Resolve { token, resolution } => {
                if let Err(e) = self.dispatch.resolve(token, resolution) {
                    warn!("[session] response {token} not forwarded: {e}");
                }
            }
        }
    }

    pub fn state(&self) -> SessionState {
        self.router.lifecycle().state()
    }
}
