//! Live mode: the WebSocket bridge feeds the event loop.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Result, bail};
use et_core::config::AppConfig;
use et_core::transport::Transport;
use et_core::types::InstrumentConfig;
use et_core::ws::WsBridge;
use et_session::SessionState;
use tracing::{info, warn};

pub async fn run(config: &AppConfig, instrument: InstrumentConfig) -> Result<()> {
    let (event_tx, mut event_rx) = tokio::sync::mpsc::unbounded_channel();
    let bridge = Arc::new(WsBridge::start(config.bridge.clone(), event_tx));
    let transport: Arc<dyn Transport> = bridge.clone();
    let (mut engine, task) = crate::assemble(config, instrument, transport)?;

    info!("[runner] started against {}, press Ctrl+C to stop", config.bridge.url);

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let aborted = loop {
        tokio::select! {
            ev = event_rx.recv() => match ev {
                Some(ev) => {
                    if engine.on_event(&ev) == SessionState::Aborted {
                        break true;
                    }
                }
                None => {
                    warn!("[runner] event stream closed");
                    break true;
                }
            },
            _ = &mut ctrl_c => {
                info!("[runner] shutdown signal received");
                break false;
            }
        }
    };

    // Dropping the engine drops the last dispatch handle.
    drop(engine);
    bridge.stop().await;

    let timeout = Duration::from_millis(config.dispatcher.shutdown_timeout_ms);
    let outcome = tokio::task::spawn_blocking(move || task.shutdown(timeout)).await?;
    crate::report_outcome(outcome.as_ref());

    if aborted {
        bail!("session aborted");
    }
    info!("[runner] stopped");
    Ok(())
}
