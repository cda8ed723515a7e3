//! # emsx-trigger
//!
//! Entry point: parses the instrument parameters, loads the optional JSON
//! config, initializes logging, then runs either against the live WebSocket
//! bridge or over a recorded event file.
//!
//! # Usage
//!
//! ```bash
//! emsx-trigger --sellat ASK --buyat BID --amount 1000 --ticker "IBM US Equity" --config trigger.json
//! emsx-trigger SELLAT=ASK BUYAT=BID AMOUNT=1000 TICKER="IBM US Equity"
//! emsx-trigger SELLAT=ASK BUYAT=BID AMOUNT=1000 TICKER="IBM US Equity" --replay demos/session.jsonl
//! ```
//!
//! Exits nonzero when the session aborts so a supervisor can restart it.

mod cli;
mod live;
mod replay;

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use et_core::config::AppConfig;
use et_core::token::TokenSource;
use et_core::transport::Transport;
use et_core::types::InstrumentConfig;
use et_session::{Engine, Router};
use et_td::{Dispatcher, DispatcherOutcome, DispatcherTask};
use tracing::{info, warn};

use crate::cli::{Cli, normalize_args};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse_from(normalize_args(std::env::args()));

    // 1. Configuration (defaults when no file is given)
    let config = match &cli.config {
        Some(path) => et_core::config::load_config(path)?,
        None => AppConfig::default(),
    };

    // 2. Logging
    let module_name = config.logging.module_name.clone().unwrap_or_else(|| "emsx_trigger".into());
    let log_dir = cli.log_dir.clone().or_else(|| config.logging.log_dir.clone());
    let _log_guard =
        et_core::logging::init_logging(&cli.log_level, log_dir.as_deref(), &module_name, config.logging.format);

    // 3. Instrument parameters, echoed back
    let instrument = InstrumentConfig::new(cli.ticker.clone(), cli.amount, cli.buyat, cli.sellat)?;
    for line in instrument.report() {
        info!("[runner] {line}");
    }

    // 4. Run
    match &cli.replay {
        Some(path) => replay::run(path, &config, instrument),
        None => live::run(&config, instrument).await,
    }
}

/// Build the engine and start the dispatcher over `transport`.
///
/// The lifecycle and the dispatcher draw from one token source, so no token
/// is ever issued twice.
pub(crate) fn assemble(
    config: &AppConfig,
    instrument: InstrumentConfig,
    transport: Arc<dyn Transport>,
) -> Result<(Engine, DispatcherTask)> {
    let tokens = Arc::new(TokenSource::default());
    let dispatcher = Dispatcher::new(Arc::clone(&transport), Arc::clone(&tokens), &config.services.order_gateway);
    let (handle, task) = dispatcher.spawn(config.dispatcher.cpu_core)?;
    let router = Router::from_config(config, instrument, tokens);
    Ok((Engine::new(router, transport, handle), task))
}

/// Log the dispatcher's final state.
pub(crate) fn report_outcome(outcome: Option<&DispatcherOutcome>) {
    match outcome {
        Some(outcome) => {
            info!("[runner] dispatcher: {}", outcome.stats);
            for token in outcome.registry.tokens() {
                if let Some(pending) = outcome.registry.get(token) {
                    warn!("[runner] unanswered {token}: {}", pending.request);
                }
            }
        }
        None => warn!("[runner] dispatcher statistics unavailable"),
    }
}
