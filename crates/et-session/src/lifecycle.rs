//! Session lifecycle: activates services and subscriptions in dependency
//! order.
//!
//! ```text
//! Disconnected ──SessionStarted──► (open refdata)
//!   ──ServiceOpened(refdata)──► ReferenceDataPending      (lookup sent)
//!   ──lookup response────────► ReferenceDataReceived     (open order gateway)
//!   ──ServiceOpened(gateway)─► OrderChannelPending       (subscribe orders, A)
//!   ──SubscriptionStarted(A)─► RouteChannelPending       (subscribe routes, B)
//!   ──SubscriptionStarted(B)─► MarketDataPending         (open mktdata)
//!   ──ServiceOpened(mktdata)─► MarketDataActive          (subscribe ticks, C)
//!
//! SessionStartupFailure | SessionTerminated | SessionConnectionDown ──► Aborted
//! ```
//!
//! Every transition is guarded by the current state. An event that arrives
//! out of order is logged and ignored, so the market-data subscription can
//! only ever be created after both gateway subscriptions are confirmed.

use std::fmt;
use std::sync::Arc;

use et_core::config::{FieldLists, ServiceNames};
use et_core::event::{Message, names};
use et_core::json_util::str_field;
use et_core::request::{OutboundRequest, Subscription};
use et_core::token::{CorrelationToken, TokenSource};
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::effect::Effect;

/// Lifecycle states, in activation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    Disconnected,
    ReferenceDataPending,
    ReferenceDataReceived,
    OrderChannelPending,
    OrderChannelActive,
    RouteChannelPending,
    RouteChannelActive,
    MarketDataPending,
    MarketDataActive,
    Aborted,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// What a channel-scoped token routes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    /// The one-shot reference-data lookup.
    ReferenceData,
    /// Order updates (token A).
    Orders,
    /// Route updates (token B).
    Routes,
    /// Market-data ticks (token C).
    MarketData,
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReferenceData => write!(f, "refdata"),
            Self::Orders => write!(f, "order"),
            Self::Routes => write!(f, "route"),
            Self::MarketData => write!(f, "mktdata"),
        }
    }
}

/// Tokens assigned as the lifecycle advances. Never cleared.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChannelTokens {
    pub reference_request: Option<CorrelationToken>,
    pub orders: Option<CorrelationToken>,
    pub routes: Option<CorrelationToken>,
    pub market_data: Option<CorrelationToken>,
}

/// Explicit lifecycle context, owned by the router.
#[derive(Debug)]
pub struct Lifecycle {
    state: SessionState,
    session_started: bool,
    services: ServiceNames,
    fields: FieldLists,
    ticker: String,
    tokens: Arc<TokenSource>,
    channels: ChannelTokens,
    description: Option<String>,
}

impl Lifecycle {
    pub fn new(
        services: ServiceNames,
        fields: FieldLists,
        ticker: impl Into<String>,
        tokens: Arc<TokenSource>,
    ) -> Self {
        Self {
            state: SessionState::Disconnected,
            session_started: false,
            services,
            fields,
            ticker: ticker.into(),
            tokens,
            channels: ChannelTokens::default(),
            description: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_live(&self) -> bool {
        self.state == SessionState::MarketDataActive
    }

    pub fn is_aborted(&self) -> bool {
        self.state == SessionState::Aborted
    }

    pub fn channels(&self) -> ChannelTokens {
        self.channels
    }

    /// Instrument description from the reference-data lookup, once received.
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Which channel `token` was assigned to, if any.
    pub fn channel_of(&self, token: CorrelationToken) -> Option<Channel> {
        let c = &self.channels;
        if c.orders == Some(token) {
            Some(Channel::Orders)
        } else if c.routes == Some(token) {
            Some(Channel::Routes)
        } else if c.market_data == Some(token) {
            Some(Channel::MarketData)
        } else if c.reference_request == Some(token) {
            Some(Channel::ReferenceData)
        } else {
            None
        }
    }

    fn transition(&mut self, next: SessionState) {
        info!("[session] {} -> {}", self.state, next);
        self.state = next;
    }

    // -----------------------------------------------------------------------
    // SESSION_STATUS
    // -----------------------------------------------------------------------

    pub fn on_session_status(&mut self, msg: &Message) -> Vec<Effect> {
        let reason = str_field(&msg.fields, "reason");
        match msg.message_type.as_str() {
            names::SESSION_STARTED => {
                if self.is_aborted() || self.session_started {
                    warn!("[session] ignoring {} in state {}", msg.message_type, self.state);
                    return Vec::new();
                }
                self.session_started = true;
                info!("[session] session started, opening {}", self.services.reference_data);
                vec![Effect::OpenService(self.services.reference_data.clone())]
            }
            names::SESSION_CONNECTION_UP => {
                info!("[session] connection up");
                Vec::new()
            }
            names::SESSION_STARTUP_FAILURE | names::SESSION_TERMINATED | names::SESSION_CONNECTION_DOWN => {
                error!(
                    "[session] {}{}: session is unusable",
                    msg.message_type,
                    reason.map(|r| format!(" ({r})")).unwrap_or_default()
                );
                if !self.is_aborted() {
                    self.transition(SessionState::Aborted);
                }
                Vec::new()
            }
            _ => {
                info!("[session] unhandled session status: {msg}");
                Vec::new()
            }
        }
    }

    // -----------------------------------------------------------------------
    // SERVICE_STATUS
    // -----------------------------------------------------------------------

    pub fn on_service_status(&mut self, msg: &Message) -> Vec<Effect> {
        let service = str_field(&msg.fields, names::SERVICE_NAME).unwrap_or_default();
        match msg.message_type.as_str() {
            names::SERVICE_OPENED => self.on_service_opened(&service),
            names::SERVICE_OPEN_FAILURE => {
                error!("[session] service {service} failed to open: {msg}");
                Vec::new()
            }
            _ => {
                info!("[session] unhandled service status: {msg}");
                Vec::new()
            }
        }
    }

    fn on_service_opened(&mut self, service: &str) -> Vec<Effect> {
        let state = self.state;

        if service == self.services.reference_data && state == SessionState::Disconnected && self.session_started {
            let token = self.tokens.next_token();
            self.channels.reference_request = Some(token);
            info!("[session] {service} opened, requesting description of {} ({token})", self.ticker);
            self.transition(SessionState::ReferenceDataPending);
            return vec![Effect::SendRequest {
                token,
                request: OutboundRequest::ReferenceData {
                    service: service.to_string(),
                    securities: vec![self.ticker.clone()],
                    fields: vec![self.fields.reference.clone()],
                },
            }];
        }

        if service == self.services.order_gateway && state == SessionState::ReferenceDataReceived {
            let token = self.tokens.next_token();
            self.channels.orders = Some(token);
            info!("[session] {service} opened, subscribing to orders ({token})");
            self.transition(SessionState::OrderChannelPending);
            return vec![Effect::Subscribe(vec![Subscription::gateway_topic(
                service,
                "order",
                &self.fields.order,
                token,
            )])];
        }

        if service == self.services.market_data && state == SessionState::MarketDataPending {
            let token = self.tokens.next_token();
            self.channels.market_data = Some(token);
            info!("[session] {service} opened, subscribing to {} ({token})", self.ticker);
            self.transition(SessionState::MarketDataActive);
            return vec![Effect::Subscribe(vec![Subscription::market_data_topic(
                service,
                &self.ticker,
                &self.fields.market_data.as_list(),
                token,
            )])];
        }

        warn!("[session] ignoring ServiceOpened for '{service}' in state {state}");
        Vec::new()
    }

    // -----------------------------------------------------------------------
    // SUBSCRIPTION_STATUS
    // -----------------------------------------------------------------------

    pub fn on_subscription_status(&mut self, msg: &Message) -> Vec<Effect> {
        let channel = msg.correlation_id.and_then(|t| self.channel_of(t));
        let label = match (channel, msg.correlation_id) {
            (Some(c), Some(t)) => format!("{c} subscription {t}"),
            (None, Some(t)) => format!("unknown subscription {t}"),
            _ => "subscription without token".to_string(),
        };

        match msg.message_type.as_str() {
            names::SUBSCRIPTION_STARTED => self.on_subscription_started(channel, &label),
            names::SUBSCRIPTION_FAILURE | names::SUBSCRIPTION_TERMINATED => {
                error!("[session] {label}: {}: {msg}", msg.message_type);
                Vec::new()
            }
            _ => {
                info!("[session] unhandled subscription status: {msg}");
                Vec::new()
            }
        }
    }

    fn on_subscription_started(&mut self, channel: Option<Channel>, label: &str) -> Vec<Effect> {
        match (channel, self.state) {
            (Some(Channel::Orders), SessionState::OrderChannelPending) => {
                self.transition(SessionState::OrderChannelActive);
                let token = self.tokens.next_token();
                self.channels.routes = Some(token);
                info!("[session] {label} started, subscribing to routes ({token})");
                self.transition(SessionState::RouteChannelPending);
                vec![Effect::Subscribe(vec![Subscription::gateway_topic(
                    &self.services.order_gateway,
                    "route",
                    &self.fields.route,
                    token,
                )])]
            }
            (Some(Channel::Routes), SessionState::RouteChannelPending) => {
                self.transition(SessionState::RouteChannelActive);
                info!("[session] {label} started, opening {}", self.services.market_data);
                self.transition(SessionState::MarketDataPending);
                vec![Effect::OpenService(self.services.market_data.clone())]
            }
            (Some(Channel::MarketData), SessionState::MarketDataActive) => {
                info!("[session] {label} started, trigger is live");
                Vec::new()
            }
            (_, state) => {
                warn!("[session] ignoring SubscriptionStarted for {label} in state {state}");
                Vec::new()
            }
        }
    }

    // -----------------------------------------------------------------------
    // Reference-data response
    // -----------------------------------------------------------------------

    /// Handle the response to the reference-data lookup.
    pub fn on_reference_response(&mut self, msg: &Message) -> Vec<Effect> {
        if self.state != SessionState::ReferenceDataPending {
            debug!("[session] reference response in state {}, ignoring", self.state);
            return Vec::new();
        }

        match self.parse_description(msg) {
            Some(desc) => {
                info!("[session] ticker description: {desc}");
                self.description = Some(desc);
            }
            None => warn!("[session] reference response carried no {}: {msg}", self.fields.reference),
        }

        self.transition(SessionState::ReferenceDataReceived);
        info!("[session] opening {}", self.services.order_gateway);
        vec![Effect::OpenService(self.services.order_gateway.clone())]
    }

    /// `securityData[0].fieldData.<reference field>`; `securityData` may also
    /// arrive as a single object.
    fn parse_description(&self, msg: &Message) -> Option<String> {
        let security = match msg.fields.get(names::SECURITY_DATA)? {
            Value::Array(items) => items.first()?,
            obj @ Value::Object(_) => obj,
            _ => return None,
        };
        let field_data = security.get(names::FIELD_DATA)?.as_object()?;
        str_field(field_data, &self.fields.reference)
    }
}
