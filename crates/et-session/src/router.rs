//! Event classifier: demultiplexes the inbound stream by category, then by
//! correlation token.

use std::sync::Arc;

use et_core::config::{AppConfig, MarketDataFields};
use et_core::event::{Event, EventType, Message, names};
use et_core::token::{CorrelationToken, TokenSource};
use et_core::types::InstrumentConfig;
use et_md::{MarketTrigger, QuoteSnapshot, parse_tick};
use et_td::update::{OrderRouteUpdate, UpdateKind, is_heartbeat};
use et_td::Resolution;
use tracing::{debug, info, warn};

use crate::effect::Effect;
use crate::lifecycle::{Channel, Lifecycle};

/// All per-session state the handlers need, in one place.
///
/// `handle` does no I/O: it updates this context and returns the effects to
/// apply.
#[derive(Debug)]
pub struct Router {
    lifecycle: Lifecycle,
    quotes: QuoteSnapshot,
    trigger: MarketTrigger,
    md_fields: MarketDataFields,
}

impl Router {
    pub fn new(lifecycle: Lifecycle, trigger: MarketTrigger, md_fields: MarketDataFields) -> Self {
        Self { lifecycle, quotes: QuoteSnapshot::new(), trigger, md_fields }
    }

    /// Wire up a router from the application config.
    pub fn from_config(config: &AppConfig, instrument: InstrumentConfig, tokens: Arc<TokenSource>) -> Self {
        let lifecycle =
            Lifecycle::new(config.services.clone(), config.fields.clone(), instrument.ticker.clone(), tokens);
        let trigger = MarketTrigger::new(instrument, config.orders.clone(), &config.trigger);
        Self::new(lifecycle, trigger, config.fields.market_data.clone())
    }

    pub fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    pub fn quotes(&self) -> &QuoteSnapshot {
        &self.quotes
    }

    pub fn trigger(&self) -> &MarketTrigger {
        &self.trigger
    }

    /// Classify one event. `outstanding` is the dispatcher's in-flight count.
    pub fn handle(&mut self, event: &Event, outstanding: usize) -> Vec<Effect> {
        let mut effects = Vec::new();
        match &event.event_type {
            EventType::Admin => event.messages.iter().for_each(on_admin),
            EventType::SessionStatus => {
                for msg in &event.messages {
                    effects.extend(self.lifecycle.on_session_status(msg));
                }
            }
            EventType::ServiceStatus => {
                for msg in &event.messages {
                    effects.extend(self.lifecycle.on_service_status(msg));
                }
            }
            EventType::SubscriptionStatus => {
                for msg in &event.messages {
                    effects.extend(self.lifecycle.on_subscription_status(msg));
                }
            }
            EventType::SubscriptionData => {
                let mut outstanding = outstanding;
                for msg in &event.messages {
                    self.on_subscription_data(msg, &mut outstanding, &mut effects);
                }
            }
            EventType::Response | EventType::PartialResponse => {
                for msg in &event.messages {
                    self.on_response(msg, &mut effects);
                }
            }
            EventType::Unknown(name) => {
                info!("[router] unhandled {name} event ({} message(s))", event.messages.len());
                for msg in &event.messages {
                    info!("[router] unhandled {name} message: {msg}");
                }
            }
        }
        effects
    }

    fn on_subscription_data(&mut self, msg: &Message, outstanding: &mut usize, effects: &mut Vec<Effect>) {
        let channel = msg.correlation_id.and_then(|t| self.lifecycle.channel_of(t));
        match channel {
            Some(Channel::Orders) => on_order_route(UpdateKind::Order, msg),
            Some(Channel::Routes) => on_order_route(UpdateKind::Route, msg),
            Some(Channel::MarketData) => {
                let tick = parse_tick(&msg.fields, &self.md_fields);
                let Some(quote) = self.quotes.apply(tick) else {
                    debug!("[router] tick without full quote: {msg}");
                    return;
                };
                if let Some([buy, sell]) = self.trigger.on_quote(quote, *outstanding) {
                    *outstanding += 2;
                    effects.push(Effect::Submit(buy));
                    effects.push(Effect::Submit(sell));
                }
            }
            Some(Channel::ReferenceData) | None => warn!("[router] unexpected subscription data: {msg}"),
        }
    }

    fn on_response(&mut self, msg: &Message, effects: &mut Vec<Effect>) {
        let Some(token) = msg.correlation_id else {
            warn!("[router] response without correlation token: {msg}");
            return;
        };
        if self.lifecycle.channels().reference_request == Some(token) {
            effects.extend(self.lifecycle.on_reference_response(msg));
            return;
        }
        effects.push(resolve(token, msg));
    }
}

fn resolve(token: CorrelationToken, msg: &Message) -> Effect {
    Effect::Resolve { token, resolution: Resolution::from_message(msg) }
}

fn on_admin(msg: &Message) {
    match msg.message_type.as_str() {
        names::SLOW_CONSUMER_WARNING => warn!("[router] slow consumer warning: events are backing up"),
        names::SLOW_CONSUMER_WARNING_CLEARED => info!("[router] slow consumer warning cleared"),
        _ => info!("[router] admin: {msg}"),
    }
}

fn on_order_route(kind: UpdateKind, msg: &Message) {
    if is_heartbeat(&msg.fields) {
        debug!("[router] {kind} subscription heartbeat");
        return;
    }
    info!("[router] {}", OrderRouteUpdate::from_fields(kind, &msg.fields));
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use et_core::config::TriggerConfig;
    use et_core::types::{PricePoint, Side};
    use serde_json::json;

    use super::*;
    use crate::lifecycle::SessionState;

    const A: u64 = 2;
    const B: u64 = 3;
    const C: u64 = 4;

    fn router_with(suppress: bool) -> Router {
        let mut config = AppConfig::default();
        config.trigger = TriggerConfig { suppress_while_pending: suppress };
        let instrument = InstrumentConfig::new("IBM US Equity", 1000, PricePoint::Bid, PricePoint::Ask).unwrap();
        Router::from_config(&config, instrument, Arc::new(TokenSource::default()))
    }

    fn status(event_type: EventType, msg: Message) -> Event {
        Event::single(event_type, msg)
    }

    fn opened(service: &str) -> Event {
        status(EventType::ServiceStatus, Message::new(names::SERVICE_OPENED).with_field(names::SERVICE_NAME, service))
    }

    fn started(token: u64) -> Event {
        status(
            EventType::SubscriptionStatus,
            Message::new(names::SUBSCRIPTION_STARTED).with_token(CorrelationToken(token)),
        )
    }

    fn tick(fields: serde_json::Value) -> Event {
        let mut msg = Message::new("MarketDataEvents").with_token(CorrelationToken(C));
        msg.fields = fields.as_object().cloned().unwrap();
        Event::single(EventType::SubscriptionData, msg)
    }

    /// Drive a router to `MarketDataActive`.
    fn live_router(suppress: bool) -> Router {
        let mut r = router_with(suppress);
        for ev in [
            status(EventType::SessionStatus, Message::new(names::SESSION_STARTED)),
            opened("//blp/refdata"),
            status(EventType::Response, Message::new("ReferenceDataResponse").with_token(CorrelationToken(1))),
            opened("//blp/emapisvc_beta"),
            started(A),
            started(B),
            opened("//blp/mktdata"),
        ] {
            r.handle(&ev, 0);
        }
        assert_eq!(r.lifecycle().state(), SessionState::MarketDataActive);
        r
    }

    fn submits(effects: &[Effect]) -> Vec<(Side, f64, u32)> {
        effects
            .iter()
            .filter_map(|e| match e {
                Effect::Submit(o) => Some((o.side, o.limit_price, o.amount)),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn full_quote_tick_submits_buy_then_sell() {
        let mut r = live_router(false);
        let fx = r.handle(&tick(json!({"BID": 100.00, "ASK": 100.05})), 0);
        assert_eq!(submits(&fx), vec![(Side::Buy, 100.00, 1000), (Side::Sell, 100.05, 1000)]);
        assert_eq!(fx.len(), 2);
    }

    #[test]
    fn bid_only_ticks_wait_for_ask() {
        let mut r = live_router(false);
        assert!(r.handle(&tick(json!({"BID": 100.00})), 0).is_empty());
        assert!(r.handle(&tick(json!({"BID": 100.01, "LAST_PRICE": 100.0})), 0).is_empty());
        let fx = r.handle(&tick(json!({"ASK": 100.05})), 0);
        assert_eq!(submits(&fx), vec![(Side::Buy, 100.01, 1000), (Side::Sell, 100.05, 1000)]);
    }

    #[test]
    fn one_pair_per_message_not_per_field() {
        let mut r = live_router(false);
        let mut ev = tick(json!({"BID": 1.0, "ASK": 2.0}));
        ev.messages.push(ev.messages[0].clone());
        let fx = r.handle(&ev, 0);
        assert_eq!(submits(&fx).len(), 4);
    }

    #[test]
    fn suppression_counts_pairs_from_same_event() {
        let mut r = live_router(true);
        let mut ev = tick(json!({"BID": 1.0, "ASK": 2.0}));
        ev.messages.push(ev.messages[0].clone());
        assert_eq!(submits(&r.handle(&ev, 0)).len(), 2);
        assert!(r.handle(&tick(json!({"BID": 1.1})), 2).is_empty());
        assert_eq!(r.trigger().suppressed(), 2);
    }

    #[test]
    fn order_and_route_updates_have_no_effects() {
        let mut r = live_router(false);
        for token in [A, B] {
            let heartbeat = Message::new("OrderRouteFields")
                .with_token(CorrelationToken(token))
                .with_field("EVENT_STATUS", 1);
            assert!(r.handle(&Event::single(EventType::SubscriptionData, heartbeat), 0).is_empty());
            let update = Message::new("OrderRouteFields")
                .with_token(CorrelationToken(token))
                .with_field("EVENT_STATUS", 6)
                .with_field("EMSX_SEQUENCE", 42);
            assert!(r.handle(&Event::single(EventType::SubscriptionData, update), 0).is_empty());
        }
        assert!(r.quotes().current().is_none());
    }

    #[test]
    fn responses_resolve_by_token() {
        let mut r = live_router(false);
        let ack = Message::new(names::CREATE_ORDER_AND_ROUTE)
            .with_token(CorrelationToken(5))
            .with_field(names::EMSX_SEQUENCE, 100)
            .with_field(names::EMSX_ROUTE_ID, 1);
        let fx = r.handle(&Event::single(EventType::Response, ack), 0);
        assert!(matches!(
            &fx[..],
            [Effect::Resolve { token: CorrelationToken(5), resolution: Resolution::Acked { sequence: Some(100), .. } }]
        ));

        let err = Message::new(names::ERROR_INFO).with_token(CorrelationToken(6)).with_field(names::ERROR_CODE, 9);
        let fx = r.handle(&Event::single(EventType::PartialResponse, err), 0);
        assert!(matches!(
            &fx[..],
            [Effect::Resolve { token: CorrelationToken(6), resolution: Resolution::Rejected { .. } }]
        ));
    }

    #[test]
    fn tokenless_and_unknown_are_discarded() {
        let mut r = live_router(false);
        let fx = r.handle(&Event::single(EventType::Response, Message::new(names::CREATE_ORDER_AND_ROUTE)), 0);
        assert!(fx.is_empty());

        let stray = Message::new("MarketDataEvents").with_token(CorrelationToken(77)).with_field("BID", 5.0);
        assert!(r.handle(&Event::single(EventType::SubscriptionData, stray), 0).is_empty());
        assert!(r.quotes().bid().is_none());

        let weird = Event::single(EventType::Unknown("REQUEST_STATUS".into()), Message::new("RequestTimeout"));
        assert!(r.handle(&weird, 0).is_empty());

        let admin = Event::single(EventType::Admin, Message::new(names::SLOW_CONSUMER_WARNING));
        assert!(r.handle(&admin, 0).is_empty());
    }

    /// Log sink shared with a scoped subscriber.
    #[derive(Clone, Default)]
    struct LogBuffer(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for LogBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn unknown_category_without_messages_is_logged_by_name() {
        let mut r = live_router(false);
        let logs = LogBuffer::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();

        let ev: Event = serde_json::from_str(r#"{"type":"REQUEST_STATUS","messages":[]}"#).unwrap();
        let fx = tracing::subscriber::with_default(subscriber, || r.handle(&ev, 0));
        assert!(fx.is_empty());

        let out = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
        assert!(out.contains("unhandled REQUEST_STATUS event (0 message(s))"), "log was: {out}");
    }

    #[test]
    fn late_reference_response_is_ignored() {
        let mut r = live_router(false);
        let again = Message::new("ReferenceDataResponse").with_token(CorrelationToken(1));
        assert!(r.handle(&Event::single(EventType::Response, again), 0).is_empty());
        assert_eq!(r.lifecycle().state(), SessionState::MarketDataActive);
    }

    // -----------------------------------------------------------------------
    // Activation order under every interleaving of the status events
    // -----------------------------------------------------------------------

    fn lifecycle_events() -> Vec<(&'static str, Event)> {
        vec![
            ("session", status(EventType::SessionStatus, Message::new(names::SESSION_STARTED))),
            ("refdata", opened("//blp/refdata")),
            (
                "lookup",
                status(EventType::Response, Message::new("ReferenceDataResponse").with_token(CorrelationToken(1))),
            ),
            ("gateway", opened("//blp/emapisvc_beta")),
            ("orders", started(A)),
            ("routes", started(B)),
            ("mktdata", opened("//blp/mktdata")),
        ]
    }

    /// Heap's algorithm, collecting every permutation of `0..n`.
    fn permutations(n: usize) -> Vec<Vec<usize>> {
        fn heap(k: usize, items: &mut Vec<usize>, out: &mut Vec<Vec<usize>>) {
            if k == 1 {
                out.push(items.clone());
                return;
            }
            heap(k - 1, items, out);
            for i in 0..k - 1 {
                if k % 2 == 0 {
                    items.swap(i, k - 1);
                } else {
                    items.swap(0, k - 1);
                }
                heap(k - 1, items, out);
            }
        }
        let mut items: Vec<usize> = (0..n).collect();
        let mut out = Vec::new();
        heap(n, &mut items, &mut out);
        out
    }

    #[test]
    fn market_data_never_subscribed_before_order_and_route() {
        let events = lifecycle_events();
        let perms = permutations(events.len());
        assert_eq!(perms.len(), 5040);

        let mut went_live = 0;
        for perm in &perms {
            let mut r = router_with(false);
            let mut delivered: Vec<&str> = Vec::new();
            for &i in perm {
                let (label, ev) = &events[i];
                delivered.push(*label);
                for fx in r.handle(ev, 0) {
                    let Effect::Subscribe(subs) = fx else { continue };
                    if subs.iter().any(|s| s.topic.starts_with("//blp/mktdata/")) {
                        assert!(
                            delivered.contains(&"orders") && delivered.contains(&"routes"),
                            "market data subscribed after {delivered:?}"
                        );
                        let c = r.lifecycle().channels();
                        assert!(c.orders.is_some() && c.routes.is_some());
                    }
                }
            }
            if r.lifecycle().is_live() {
                went_live += 1;
            }
        }
        // Only the in-order delivery reaches the live state.
        assert_eq!(went_live, 1);
    }
}
