//! Configuration for the trigger process.
//!
//! The instrument itself comes from the command line; everything about *how*
//! to talk to the gateway lives in an optional JSON file. Every section and
//! field has a default, so an empty object (or no file at all) yields a
//! working configuration against a local bridge.
//!
//! # Example config
//!
//! ```json
//! {
//!   "bridge": { "url": "ws://gateway-bridge:8194/session", "ping_interval_secs": 30 },
//!   "services": { "order_gateway": "//blp/emapisvc" },
//!   "orders": { "order_type": "LMT", "time_in_force": "DAY", "broker": "BB" },
//!   "trigger": { "suppress_while_pending": true },
//!   "dispatcher": { "shutdown_timeout_ms": 2000, "cpu_core": 3 },
//!   "logging": { "module_name": "emsx_trigger", "log_dir": "/var/log/trigger" }
//! }
//! ```

use std::collections::HashMap;

use serde::Deserialize;

use crate::error::EtError;
use crate::types::{OrderType, TimeInForce};

/// Top-level application config, deserialized from a JSON file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub bridge: BridgeConfig,
    pub services: ServiceNames,
    pub fields: FieldLists,
    pub orders: OrderDefaults,
    pub trigger: TriggerConfig,
    pub dispatcher: DispatcherConfig,
    pub logging: LoggingMeta,
}

impl AppConfig {
    /// Check cross-field constraints that serde cannot express.
    pub fn validate(&self) -> Result<(), EtError> {
        self.bridge.validate()?;
        for (label, name) in [
            ("services.reference_data", &self.services.reference_data),
            ("services.order_gateway", &self.services.order_gateway),
            ("services.market_data", &self.services.market_data),
        ] {
            if name.trim().is_empty() {
                return Err(EtError::Config(format!("{label} must not be empty")));
            }
        }
        if self.fields.market_data.bid == self.fields.market_data.ask {
            return Err(EtError::Config("market data bid and ask fields must differ".into()));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Bridge (transport endpoint)
// ---------------------------------------------------------------------------

/// WebSocket gateway bridge endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// `ws://` or `wss://` URL of the session bridge.
    pub url: String,
    /// Keep-alive ping interval; `None` disables pinging.
    pub ping_interval_secs: Option<u64>,
    /// Extra HTTP headers for the WebSocket handshake (e.g. an auth token).
    pub extra_headers: HashMap<String, String>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            url: "ws://localhost:8194/session".into(),
            ping_interval_secs: None,
            extra_headers: HashMap::new(),
        }
    }
}

impl BridgeConfig {
    pub fn validate(&self) -> Result<(), EtError> {
        let url = url::Url::parse(&self.url)
            .map_err(|e| EtError::Config(format!("bridge.url '{}': {e}", self.url)))?;
        if !matches!(url.scheme(), "ws" | "wss") {
            return Err(EtError::Config(format!("bridge.url scheme must be ws or wss, got '{}'", url.scheme())));
        }
        if self.ping_interval_secs == Some(0) {
            return Err(EtError::Config("bridge.ping_interval_secs must be positive".into()));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Services and field lists
// ---------------------------------------------------------------------------

/// Channel (service) names. Opaque to the core; only compared for equality.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServiceNames {
    pub reference_data: String,
    pub order_gateway: String,
    pub market_data: String,
}

impl Default for ServiceNames {
    fn default() -> Self {
        Self {
            reference_data: "//blp/refdata".into(),
            order_gateway: "//blp/emapisvc_beta".into(),
            market_data: "//blp/mktdata".into(),
        }
    }
}

/// Field names requested on each subscription.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FieldLists {
    pub order: Vec<String>,
    pub route: Vec<String>,
    /// Reference-data field holding the instrument description.
    pub reference: String,
    pub market_data: MarketDataFields,
}

impl Default for FieldLists {
    fn default() -> Self {
        Self {
            order: to_strings(DEFAULT_ORDER_FIELDS),
            route: to_strings(DEFAULT_ROUTE_FIELDS),
            reference: "PARSEKYABLE_DES_SOURCE".into(),
            market_data: MarketDataFields::default(),
        }
    }
}

/// Names of the bid/ask fields on market-data ticks.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MarketDataFields {
    pub bid: String,
    pub ask: String,
}

impl Default for MarketDataFields {
    fn default() -> Self {
        Self { bid: "BID".into(), ask: "ASK".into() }
    }
}

impl MarketDataFields {
    pub fn as_list(&self) -> Vec<String> {
        vec![self.bid.clone(), self.ask.clone()]
    }
}

const DEFAULT_ORDER_FIELDS: &[&str] = &[
    "API_SEQ_NUM",
    "EMSX_ACCOUNT",
    "EMSX_AMOUNT",
    "EMSX_AVG_PRICE",
    "EMSX_BROKER",
    "EMSX_EXEC_INSTRUCTION",
    "EMSX_FILLED",
    "EMSX_HAND_INSTRUCTION",
    "EMSX_IDLE_AMOUNT",
    "EMSX_LIMIT_PRICE",
    "EMSX_ORDER_TYPE",
    "EMSX_REASON_CODE",
    "EMSX_REASON_DESC",
    "EMSX_SEQUENCE",
    "EMSX_SIDE",
    "EMSX_START_AMOUNT",
    "EMSX_STATUS",
    "EMSX_TICKER",
    "EMSX_TIF",
    "EMSX_TIME_STAMP",
    "EMSX_WORKING",
];

const DEFAULT_ROUTE_FIELDS: &[&str] = &[
    "API_SEQ_NUM",
    "EMSX_AMOUNT",
    "EMSX_AVG_PRICE",
    "EMSX_BROKER",
    "EMSX_FILLED",
    "EMSX_LAST_PRICE",
    "EMSX_LAST_SHARES",
    "EMSX_LIMIT_PRICE",
    "EMSX_ORDER_TYPE",
    "EMSX_REASON_CODE",
    "EMSX_REASON_DESC",
    "EMSX_ROUTE_ID",
    "EMSX_SEQUENCE",
    "EMSX_STATUS",
    "EMSX_TIF",
    "EMSX_TIME_STAMP",
    "EMSX_WORKING",
];

fn to_strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_string()).collect()
}

// ---------------------------------------------------------------------------
// Order / trigger / dispatcher
// ---------------------------------------------------------------------------

/// Static parameters stamped on every generated order.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OrderDefaults {
    pub order_type: OrderType,
    pub time_in_force: TimeInForce,
    pub broker: String,
    pub hand_instruction: String,
    pub exec_instruction: Option<String>,
}

impl Default for OrderDefaults {
    fn default() -> Self {
        Self {
            order_type: OrderType::Limit,
            time_in_force: TimeInForce::Day,
            broker: "BB".into(),
            hand_instruction: "ANY".into(),
            exec_instruction: None,
        }
    }
}

/// Market trigger behaviour.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TriggerConfig {
    /// Skip new order pairs while earlier orders are still unresolved.
    pub suppress_while_pending: bool,
}

/// Dispatcher worker settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DispatcherConfig {
    /// Upper bound on waiting for the worker at shutdown.
    pub shutdown_timeout_ms: u64,
    /// CPU core to pin the worker thread to.
    pub cpu_core: Option<i32>,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self { shutdown_timeout_ms: 2000, cpu_core: None }
    }
}

/// Logging metadata.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LoggingMeta {
    pub module_name: Option<String>,
    pub log_dir: Option<String>,
    pub format: crate::logging::LogFormat,
}

/// Load and parse a JSON config file.
pub fn load_config(path: &std::path::Path) -> anyhow::Result<AppConfig> {
    let content = std::fs::read_to_string(path)?;
    let config: AppConfig = serde_json::from_str(&content)?;
    config.validate()?;
    Ok(config)
}
