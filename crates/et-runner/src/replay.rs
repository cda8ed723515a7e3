//! Replay mode: drive the engine from a file of recorded events.
//!
//! One JSON [`Event`] per line; blank lines and `#` comments are skipped.
//! Outbound calls are captured by a [`RecordingTransport`] and listed at the
//! end.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use et_core::config::AppConfig;
use et_core::event::Event;
use et_core::transport::{RecordingTransport, Transport, TransportCall};
use et_core::types::InstrumentConfig;
use et_session::SessionState;
use tracing::{info, warn};

pub fn run(path: &Path, config: &AppConfig, instrument: InstrumentConfig) -> Result<()> {
    let content = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let events = parse_events(&content, path);
    info!("[runner] replaying {} event(s) from {}", events.len(), path.display());

    let recorder = Arc::new(RecordingTransport::new());
    let transport: Arc<dyn Transport> = recorder.clone();
    let (mut engine, task) = crate::assemble(config, instrument, transport)?;

    let mut state = engine.state();
    for event in &events {
        state = engine.on_event(event);
        if state == SessionState::Aborted {
            warn!("[runner] session aborted, remaining events skipped");
            break;
        }
    }
    info!("[runner] replay finished in state {state}");

    // With the engine gone the dispatcher drains its queue and exits.
    drop(engine);
    let outcome = task.join(Duration::from_millis(config.dispatcher.shutdown_timeout_ms));

    for call in recorder.calls() {
        info!("[runner] >> {}", describe(&call));
    }
    if recorder.failed_requests() > 0 {
        warn!("[runner] {} request(s) refused by the transport", recorder.failed_requests());
    }
    crate::report_outcome(outcome.as_ref());

    if state == SessionState::Aborted {
        bail!("session aborted");
    }
    Ok(())
}

/// Parse the event file, reporting and skipping bad lines.
fn parse_events(content: &str, path: &Path) -> Vec<Event> {
    content
        .lines()
        .enumerate()
        .filter_map(|(i, line)| {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                return None;
            }
            match serde_json::from_str::<Event>(line) {
                Ok(ev) => Some(ev),
                Err(e) => {
                    warn!("[runner] {}:{}: skipping malformed event: {e}", path.display(), i + 1);
                    None
                }
            }
        })
        .collect()
}

fn describe(call: &TransportCall) -> String {
    match call {
        TransportCall::OpenService(service) => format!("openService {service}"),
        TransportCall::Subscribe(subs) => {
            let topics: Vec<String> = subs.iter().map(|s| format!("{} {}", s.correlation_id, s.topic)).collect();
            format!("subscribe {}", topics.join(", "))
        }
        TransportCall::SendRequest { token, request } => match request.order() {
            Some(order) => format!("sendRequest {token} {} {order}", request.service()),
            None => format!("sendRequest {token} {}", serde_json::to_string(request).unwrap_or_default()),
        },
    }
}
