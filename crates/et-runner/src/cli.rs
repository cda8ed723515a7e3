//! Command-line surface.

use std::path::PathBuf;

use clap::Parser;
use et_core::types::PricePoint;

/// Watches one instrument's quotes and sends a BUY/SELL limit order pair on
/// every tick that completes the quote.
#[derive(Parser, Debug)]
#[command(
    name = "emsx-trigger",
    about = "Market-data driven order trigger",
    after_help = "Legacy form is accepted too: SELLAT=ASK BUYAT=BID AMOUNT=1000 TICKER=\"IBM US Equity\""
)]
pub struct Cli {
    /// Quote side SELL orders are priced at (BID or ASK).
    #[arg(long)]
    pub sellat: PricePoint,

    /// Quote side BUY orders are priced at (BID or ASK).
    #[arg(long)]
    pub buyat: PricePoint,

    /// Order quantity (positive integer).
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    pub amount: u32,

    /// Instrument ticker, e.g. "IBM US Equity".
    #[arg(long)]
    pub ticker: String,

    /// Optional JSON configuration file.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info")]
    pub log_level: String,

    /// Optional log directory for file output.
    #[arg(long)]
    pub log_dir: Option<String>,

    /// Replay newline-delimited JSON events from a file instead of connecting.
    #[arg(long)]
    pub replay: Option<PathBuf>,
}

/// Rewrite legacy `KEY=VALUE` arguments as `--key=VALUE`.
///
/// The program name, anything already starting with `-`, and the value that
/// follows a bare `--flag` are left alone. Unknown keys are not filtered here;
/// clap rejects them.
pub fn normalize_args<I>(args: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut out = Vec::new();
    let mut expects_value = false;

    for (i, arg) in args.into_iter().enumerate() {
        if i == 0 || expects_value || arg.starts_with('-') {
            expects_value = (arg.starts_with("--") && !arg.contains('=')) || (arg.len() == 2 && arg.starts_with('-'));
            out.push(arg);
            continue;
        }
        match arg.split_once('=') {
            Some((key, value)) if is_legacy_key(key) => {
                out.push(format!("--{}={value}", key.to_ascii_lowercase().replace('_', "-")));
            }
            _ => out.push(arg),
        }
    }
    out
}

fn is_legacy_key(key: &str) -> bool {
    !key.is_empty() && key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}
