//! Inbound events delivered by the session transport.
//!
//! The transport multiplexes everything onto one stream: session lifecycle,
//! service activation, subscription status and data, and request responses.
//! Each [`Event`] carries a category and one or more [`Message`]s; a message
//! names its type, may carry the correlation token it belongs to, and holds
//! its payload as a flat JSON object of which only a few fields are read.
//!
//! # Wire format
//!
//! ```json
//! {"type": "SUBSCRIPTION_DATA",
//!  "messages": [{"messageType": "MarketDataEvents", "correlationId": 7,
//!                "fields": {"BID": 100.00, "ASK": 100.05}}]}
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::token::CorrelationToken;

/// Event category.
///
/// Categories this system does not handle keep their wire name so they can
/// be logged as received.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EventType {
    Admin,
    SessionStatus,
    ServiceStatus,
    SubscriptionStatus,
    SubscriptionData,
    Response,
    PartialResponse,
    /// Any other category; logged and ignored.
    Unknown(String),
}

impl EventType {
    pub fn as_str(&self) -> &str {
        match self {
            EventType::Admin => "ADMIN",
            EventType::SessionStatus => "SESSION_STATUS",
            EventType::ServiceStatus => "SERVICE_STATUS",
            EventType::SubscriptionStatus => "SUBSCRIPTION_STATUS",
            EventType::SubscriptionData => "SUBSCRIPTION_DATA",
            EventType::Response => "RESPONSE",
            EventType::PartialResponse => "PARTIAL_RESPONSE",
            EventType::Unknown(name) => name,
        }
    }
}

impl From<String> for EventType {
    fn from(name: String) -> Self {
        match name.as_str() {
            "ADMIN" => EventType::Admin,
            "SESSION_STATUS" => EventType::SessionStatus,
            "SERVICE_STATUS" => EventType::ServiceStatus,
            "SUBSCRIPTION_STATUS" => EventType::SubscriptionStatus,
            "SUBSCRIPTION_DATA" => EventType::SubscriptionData,
            "RESPONSE" => EventType::Response,
            "PARTIAL_RESPONSE" => EventType::PartialResponse,
            _ => EventType::Unknown(name),
        }
    }
}

impl From<EventType> for String {
    fn from(t: EventType) -> Self {
        match t {
            EventType::Unknown(name) => name,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One inbound event: a category plus the messages it carries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    #[serde(rename = "type")]
    pub event_type: EventType,
    #[serde(default)]
    pub messages: Vec<Message>,
}

impl Event {
    /// Convenience for the common single-message event.
    pub fn single(event_type: EventType, message: Message) -> Self {
        Self { event_type, messages: vec![message] }
    }
}

/// One message within an event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub message_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<CorrelationToken>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub fields: Map<String, Value>,
}

impl Message {
    pub fn new(message_type: impl Into<String>) -> Self {
        Self { message_type: message_type.into(), correlation_id: None, fields: Map::new() }
    }

    pub fn with_token(mut self, token: CorrelationToken) -> Self {
        self.correlation_id = Some(token);
        self
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    pub fn is(&self, name: &str) -> bool {
        self.message_type == name
    }
}

impl fmt::Display for Message {
    /// The message as a compact JSON line, for verbatim logging.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match serde_json::to_string(self) {
            Ok(s) => f.write_str(&s),
            Err(_) => write!(f, "{} (unserializable)", self.message_type),
        }
    }
}

/// Sender half of the inbound event channel (transport → event loop).
pub type EventSender = tokio::sync::mpsc::UnboundedSender<Event>;

/// Receiver half of the inbound event channel.
pub type EventReceiver = tokio::sync::mpsc::UnboundedReceiver<Event>;

/// Message-type and field names read by the core.
pub mod names {
    // ADMIN
    pub const SLOW_CONSUMER_WARNING: &str = "SlowConsumerWarning";
    pub const SLOW_CONSUMER_WARNING_CLEARED: &str = "SlowConsumerWarningCleared";

    // SESSION_STATUS
    pub const SESSION_STARTED: &str = "SessionStarted";
    pub const SESSION_TERMINATED: &str = "SessionTerminated";
    pub const SESSION_STARTUP_FAILURE: &str = "SessionStartupFailure";
    pub const SESSION_CONNECTION_UP: &str = "SessionConnectionUp";
    pub const SESSION_CONNECTION_DOWN: &str = "SessionConnectionDown";

    // SERVICE_STATUS
    pub const SERVICE_OPENED: &str = "ServiceOpened";
    pub const SERVICE_OPEN_FAILURE: &str = "ServiceOpenFailure";
    pub const SERVICE_NAME: &str = "serviceName";

    // SUBSCRIPTION_STATUS
    pub const SUBSCRIPTION_STARTED: &str = "SubscriptionStarted";
    pub const SUBSCRIPTION_FAILURE: &str = "SubscriptionFailure";
    pub const SUBSCRIPTION_TERMINATED: &str = "SubscriptionTerminated";

    // RESPONSE
    pub const ERROR_INFO: &str = "ErrorInfo";
    pub const CREATE_ORDER_AND_ROUTE: &str = "CreateOrderAndRoute";
    pub const ERROR_CODE: &str = "ERROR_CODE";
    pub const ERROR_MESSAGE: &str = "ERROR_MESSAGE";
    pub const MESSAGE: &str = "MESSAGE";

    // Reference data response
    pub const SECURITY_DATA: &str = "securityData";
    pub const FIELD_DATA: &str = "fieldData";

    // Order / route subscription payload
    pub const EVENT_STATUS: &str = "EVENT_STATUS";
    pub const MSG_SUB_TYPE: &str = "MSG_SUB_TYPE";
    pub const EMSX_SEQUENCE: &str = "EMSX_SEQUENCE";
    pub const EMSX_ROUTE_ID: &str = "EMSX_ROUTE_ID";
    pub const EMSX_STATUS: &str = "EMSX_STATUS";
    pub const EMSX_TICKER: &str = "EMSX_TICKER";
    pub const EMSX_AMOUNT: &str = "EMSX_AMOUNT";
    pub const EMSX_WORKING: &str = "EMSX_WORKING";
    pub const EMSX_FILLED: &str = "EMSX_FILLED";
    pub const EMSX_AVG_PRICE: &str = "EMSX_AVG_PRICE";

    /// `EVENT_STATUS` value of a keep-alive with no payload.
    pub const HEARTBEAT_STATUS: i64 = 1;
}
