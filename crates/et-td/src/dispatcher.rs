//! Order dispatch: queue, worker thread and the registry it owns.
//!
//! Producers (the market trigger and the response router, both on the event
//! loop) never touch the registry. They send [`DispatchCommand`]s through a
//! [`DispatchHandle`]; one dedicated thread drains the queue in FIFO order
//! and is the only code that inserts into or removes from the
//! [`CorrelationRegistry`].
//!
//! For each submitted order the worker:
//! 1. Takes a fresh token from the shared [`TokenSource`].
//! 2. Registers `{token → order}`.
//! 3. Hands the request to the transport.
//! 4. On a local send failure, removes the entry again and drops the order.
//!
//! Shutdown is cooperative: a stop signal is checked on every iteration and
//! the owner waits a bounded time for the worker to hand back its registry
//! and statistics. Dropping every handle lets the worker drain the queue and
//! finish on its own.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError};
use et_core::error::EtError;
use et_core::request::OutboundRequest;
use et_core::token::{CorrelationToken, TokenSource};
use et_core::transport::Transport;
use et_core::types::OrderRequest;
use tracing::{debug, error, info, warn};

use crate::latency::{AckLatency, AckLatencyStats};
use crate::registry::{CorrelationRegistry, PendingOrder};
use crate::response::Resolution;

/// Work item for the dispatcher thread.
#[derive(Debug, Clone)]
pub enum DispatchCommand {
    /// Register and transmit a new order.
    Submit(OrderRequest),
    /// A response arrived for `token`.
    Resolve { token: CorrelationToken, resolution: Resolution },
}

/// Counters kept by the dispatcher.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DispatcherStats {
    pub submitted: u64,
    pub sent: u64,
    pub send_failed: u64,
    pub acknowledged: u64,
    pub rejected: u64,
    /// Responses whose token was not (or no longer) registered.
    pub unmatched: u64,
    /// Orders still queued when the worker was told to stop.
    pub abandoned: u64,
    pub ack_latency: Option<AckLatencyStats>,
}

impl fmt::Display for DispatcherStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "submitted={} sent={} send_failed={} acknowledged={} rejected={} unmatched={} abandoned={}",
            self.submitted,
            self.sent,
            self.send_failed,
            self.acknowledged,
            self.rejected,
            self.unmatched,
            self.abandoned,
        )?;
        if let Some(lat) = &self.ack_latency {
            write!(f, " ack_latency[{lat}]")?;
        }
        Ok(())
    }
}

/// What the worker hands back when it finishes.
#[derive(Debug)]
pub struct DispatcherOutcome {
    /// Orders still awaiting a response.
    pub registry: CorrelationRegistry,
    pub stats: DispatcherStats,
}

// ---------------------------------------------------------------------------
// Dispatcher: synchronous core, runs on the worker thread
// ---------------------------------------------------------------------------

/// Owner of the correlation registry.
pub struct Dispatcher {
    transport: Arc<dyn Transport>,
    tokens: Arc<TokenSource>,
    /// Order-gateway service the requests are addressed to.
    service: String,
    registry: CorrelationRegistry,
    outstanding: Arc<AtomicUsize>,
    stats: DispatcherStats,
    latency: AckLatency,
}

impl Dispatcher {
    pub fn new(transport: Arc<dyn Transport>, tokens: Arc<TokenSource>, service: impl Into<String>) -> Self {
        Self {
            transport,
            tokens,
            service: service.into(),
            registry: CorrelationRegistry::new(),
            outstanding: Arc::new(AtomicUsize::new(0)),
            stats: DispatcherStats::default(),
            latency: AckLatency::new(),
        }
    }

    /// Process one command to completion.
    pub fn handle(&mut self, cmd: DispatchCommand) {
        match cmd {
            DispatchCommand::Submit(order) => self.send(order),
            DispatchCommand::Resolve { token, resolution } => self.resolve(token, resolution),
        }
    }

    fn send(&mut self, order: OrderRequest) {
        self.stats.submitted += 1;
        let token = self.tokens.next_token();

        if let Err(e) = self.registry.insert(token, PendingOrder::new(order.clone())) {
            error!("[dispatcher] {e}, order dropped: {order}");
            self.stats.send_failed += 1;
            self.release();
            return;
        }

        let request = OutboundRequest::CreateOrderAndRoute { service: self.service.clone(), order };
        match self.transport.send_request(&request, token) {
            Ok(()) => {
                self.stats.sent += 1;
                if let Some(order) = request.order() {
                    info!("[dispatcher] sent {token}: {order}");
                }
            }
            Err(e) => {
                self.registry.remove(token);
                self.stats.send_failed += 1;
                self.release();
                error!("[dispatcher] send of {token} failed, order dropped: {e}");
            }
        }
    }

    fn resolve(&mut self, token: CorrelationToken, resolution: Resolution) {
        let Some(pending) = self.registry.remove(token) else {
            self.stats.unmatched += 1;
            warn!("[dispatcher] response for unknown request {token}, ignoring: {resolution}");
            return;
        };

        self.release();
        self.latency.record(pending.registered_at.elapsed());
        if resolution.is_rejected() {
            self.stats.rejected += 1;
            warn!("[dispatcher] {token} ({}) {resolution}", pending.request);
        } else {
            self.stats.acknowledged += 1;
            info!("[dispatcher] {token} ({}) {resolution}", pending.request);
        }
    }

    /// One order left the in-flight set.
    fn release(&self) {
        let _ = self.outstanding.fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));
    }

    pub fn registry(&self) -> &CorrelationRegistry {
        &self.registry
    }

    pub fn stats(&self) -> DispatcherStats {
        DispatcherStats { ack_latency: self.latency.stats(), ..self.stats }
    }

    fn into_outcome(self) -> DispatcherOutcome {
        let stats = self.stats();
        DispatcherOutcome { registry: self.registry, stats }
    }

    /// Start the worker thread, optionally pinned to `cpu_core`.
    pub fn spawn(self, cpu_core: Option<i32>) -> anyhow::Result<(DispatchHandle, DispatcherTask)> {
        let (cmd_tx, cmd_rx) = crossbeam_channel::unbounded::<DispatchCommand>();
        let (stop_tx, stop_rx) = crossbeam_channel::bounded::<()>(1);
        let (done_tx, done_rx) = crossbeam_channel::bounded::<DispatcherOutcome>(1);
        let outstanding = Arc::clone(&self.outstanding);

        let thread = std::thread::Builder::new().name("dispatcher".into()).spawn(move || {
            et_core::cpu_affinity::pin_current_thread("dispatcher", cpu_core);
            let outcome = run_loop(self, cmd_rx, stop_rx);
            let _ = done_tx.send(outcome);
        })?;

        let handle = DispatchHandle { tx: cmd_tx, outstanding };
        let task = DispatcherTask { stop_tx, done_rx, thread: Some(thread) };
        Ok((handle, task))
    }
}

enum Step {
    Command(DispatchCommand),
    Drained,
    Stop,
}

/// Drain commands until stopped or every handle is gone.
fn run_loop(
    mut dispatcher: Dispatcher,
    cmd_rx: Receiver<DispatchCommand>,
    stop_rx: Receiver<()>,
) -> DispatcherOutcome {
    info!("[dispatcher] started (service {}, transport {})", dispatcher.service, dispatcher.transport.name());

    let stopped = loop {
        match stop_rx.try_recv() {
            Ok(()) | Err(TryRecvError::Disconnected) => break true,
            Err(TryRecvError::Empty) => {}
        }

        let step = crossbeam_channel::select! {
            recv(cmd_rx) -> cmd => cmd.map_or(Step::Drained, Step::Command),
            recv(stop_rx) -> _ => Step::Stop,
        };
        match step {
            Step::Command(cmd) => dispatcher.handle(cmd),
            Step::Drained => break false,
            Step::Stop => break true,
        }
    };

    if stopped {
        let mut abandoned_resolves = 0u64;
        for cmd in cmd_rx.try_iter() {
            match cmd {
                DispatchCommand::Submit(order) => {
                    dispatcher.stats.abandoned += 1;
                    dispatcher.release();
                    warn!("[dispatcher] abandoned unsent order: {order}");
                }
                DispatchCommand::Resolve { .. } => abandoned_resolves += 1,
            }
        }
        if abandoned_resolves > 0 {
            debug!("[dispatcher] {abandoned_resolves} queued response(s) not processed");
        }
        info!("[dispatcher] stopped");
    } else {
        info!("[dispatcher] all producers gone, queue drained");
    }

    let outcome = dispatcher.into_outcome();
    info!("[dispatcher] {} | {} order(s) awaiting response", outcome.stats, outcome.registry.len());
    outcome
}

// ---------------------------------------------------------------------------
// Producer / owner handles
// ---------------------------------------------------------------------------

/// Producer side of the dispatch queue. Cheap to clone; never blocks.
#[derive(Clone)]
pub struct DispatchHandle {
    tx: Sender<DispatchCommand>,
    outstanding: Arc<AtomicUsize>,
}

impl DispatchHandle {
    /// Queue an order for transmission.
    pub fn submit(&self, order: OrderRequest) -> Result<(), EtError> {
        self.outstanding.fetch_add(1, Ordering::AcqRel);
        if self.tx.send(DispatchCommand::Submit(order)).is_err() {
            self.outstanding.fetch_sub(1, Ordering::AcqRel);
            return Err(EtError::Dispatch("dispatcher has stopped".into()));
        }
        Ok(())
    }

    /// Queue a response for correlation.
    pub fn resolve(&self, token: CorrelationToken, resolution: Resolution) -> Result<(), EtError> {
        self.tx
            .send(DispatchCommand::Resolve { token, resolution })
            .map_err(|_| EtError::Dispatch("dispatcher has stopped".into()))
    }

    /// Orders submitted and not yet acknowledged, rejected or dropped.
    #[inline]
    pub fn outstanding(&self) -> usize {
        self.outstanding.load(Ordering::Acquire)
    }
}

/// Owner side of the worker thread.
pub struct DispatcherTask {
    stop_tx: Sender<()>,
    done_rx: Receiver<DispatcherOutcome>,
    thread: Option<JoinHandle<()>>,
}

impl DispatcherTask {
    /// Signal the worker to stop, then wait up to `timeout` for it.
    pub fn shutdown(self, timeout: Duration) -> Option<DispatcherOutcome> {
        let _ = self.stop_tx.try_send(());
        self.join(timeout)
    }

    /// Wait up to `timeout` for the worker to finish without signalling it.
    ///
    /// Returns `None` if the worker did not finish in time; it is then
    /// detached.
    pub fn join(mut self, timeout: Duration) -> Option<DispatcherOutcome> {
        match self.done_rx.recv_timeout(timeout) {
            Ok(outcome) => {
                if let Some(thread) = self.thread.take() {
                    let _ = thread.join();
                }
                Some(outcome)
            }
            Err(RecvTimeoutError::Timeout) => {
                warn!("[dispatcher] did not finish within {timeout:?}, detaching");
                None
            }
            Err(RecvTimeoutError::Disconnected) => {
                error!("[dispatcher] worker exited without reporting");
                if let Some(thread) = self.thread.take() {
                    let _ = thread.join();
                }
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicU64;

    use et_core::config::OrderDefaults;
    use et_core::request::Subscription;
    use et_core::transport::{RecordingTransport, TransportCall};
    use et_core::types::{InstrumentConfig, PricePoint, Quote, Side};

    use super::*;

    const WAIT: Duration = Duration::from_secs(5);

    fn order(side: Side, amount: u32) -> OrderRequest {
        let cfg = InstrumentConfig::new("IBM US Equity", amount, PricePoint::Bid, PricePoint::Ask).unwrap();
        OrderRequest::priced_from(side, &cfg, Quote { bid: 100.00, ask: 100.05 }, &OrderDefaults::default())
    }

    fn dispatcher(transport: &Arc<RecordingTransport>) -> Dispatcher {
        let transport: Arc<dyn Transport> = transport.clone();
        Dispatcher::new(transport, Arc::new(TokenSource::default()), "//blp/emapisvc_beta")
    }

    fn ack() -> Resolution {
        Resolution::Acked { sequence: Some(1), route_id: Some(1), message: None }
    }

    #[test]
    fn registers_then_sends() {
        let transport = Arc::new(RecordingTransport::new());
        let mut d = dispatcher(&transport);

        d.handle(DispatchCommand::Submit(order(Side::Buy, 1000)));
        d.handle(DispatchCommand::Submit(order(Side::Sell, 1000)));

        let sent = transport.sent_orders();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].1.side, Side::Buy);
        assert_eq!(sent[1].1.side, Side::Sell);
        assert_ne!(sent[0].0, sent[1].0);
        assert_eq!(d.registry().tokens(), vec![sent[0].0, sent[1].0]);

        match &transport.calls()[0] {
            TransportCall::SendRequest { request, .. } => assert_eq!(request.service(), "//blp/emapisvc_beta"),
            other => panic!("unexpected call {other:?}"),
        }
    }

    #[test]
    fn response_removes_entry() {
        let transport = Arc::new(RecordingTransport::new());
        let mut d = dispatcher(&transport);
        d.handle(DispatchCommand::Submit(order(Side::Buy, 10)));
        d.handle(DispatchCommand::Submit(order(Side::Sell, 10)));
        let tokens = d.registry().tokens();

        d.handle(DispatchCommand::Resolve { token: tokens[0], resolution: ack() });
        d.handle(DispatchCommand::Resolve {
            token: tokens[1],
            resolution: Resolution::Rejected { code: Some(23), message: None },
        });

        assert!(d.registry().is_empty());
        let stats = d.stats();
        assert_eq!(stats.acknowledged, 1);
        assert_eq!(stats.rejected, 1);
        assert_eq!(stats.ack_latency.map(|l| l.count), Some(2));
    }

    #[test]
    fn send_failure_drops_without_retry() {
        let transport = Arc::new(RecordingTransport::new());
        transport.set_fail_requests(true);
        let mut d = dispatcher(&transport);

        d.handle(DispatchCommand::Submit(order(Side::Buy, 1000)));

        assert!(d.registry().is_empty());
        assert_eq!(transport.failed_requests(), 1);
        assert!(transport.calls().is_empty());
        assert_eq!(d.stats().send_failed, 1);

        // A late response for the dropped request is benign.
        d.handle(DispatchCommand::Resolve { token: CorrelationToken(1), resolution: ack() });
        assert_eq!(d.stats().unmatched, 1);
        assert_eq!(transport.failed_requests(), 1);
    }

    #[test]
    fn unknown_token_leaves_registry_unchanged() {
        let transport = Arc::new(RecordingTransport::new());
        let mut d = dispatcher(&transport);
        d.handle(DispatchCommand::Submit(order(Side::Buy, 1)));
        let before = d.registry().tokens();

        for _ in 0..2 {
            d.handle(DispatchCommand::Resolve { token: CorrelationToken(9_999), resolution: ack() });
        }

        assert_eq!(d.registry().tokens(), before);
        assert_eq!(d.stats().unmatched, 2);
    }

    #[test]
    fn tokens_never_reused_across_failures() {
        let transport = Arc::new(RecordingTransport::new());
        let mut d = dispatcher(&transport);
        d.handle(DispatchCommand::Submit(order(Side::Buy, 1)));
        transport.set_fail_requests(true);
        d.handle(DispatchCommand::Submit(order(Side::Sell, 1)));
        transport.set_fail_requests(false);
        d.handle(DispatchCommand::Submit(order(Side::Buy, 2)));

        let tokens: Vec<_> = transport.sent_orders().into_iter().map(|(t, _)| t).collect();
        assert_eq!(tokens, vec![CorrelationToken(1), CorrelationToken(3)]);
    }

    #[test]
    fn worker_preserves_fifo_and_drains_on_drop() {
        let transport = Arc::new(RecordingTransport::new());
        let (handle, task) = dispatcher(&transport).spawn(None).unwrap();

        for amount in 1..=200 {
            handle.submit(order(Side::Buy, amount)).unwrap();
        }
        drop(handle);

        let outcome = task.join(WAIT).expect("worker finished");
        assert_eq!(outcome.stats.sent, 200);
        assert_eq!(outcome.registry.len(), 200);

        let sent = transport.sent_orders();
        let amounts: Vec<u32> = sent.iter().map(|(_, o)| o.amount).collect();
        assert_eq!(amounts, (1..=200).collect::<Vec<_>>());
        assert!(sent.windows(2).all(|w| w[0].0 < w[1].0));
    }

    #[test]
    fn outstanding_gauge_tracks_resolution() {
        let transport = Arc::new(RecordingTransport::new());
        let (handle, task) = dispatcher(&transport).spawn(None).unwrap();
        let gauge = Arc::clone(&handle.outstanding);

        handle.submit(order(Side::Buy, 1)).unwrap();
        handle.submit(order(Side::Sell, 1)).unwrap();
        assert!(handle.outstanding() >= 1);
        handle.resolve(CorrelationToken(1), ack()).unwrap();
        drop(handle);

        let outcome = task.join(WAIT).expect("worker finished");
        assert_eq!(outcome.registry.tokens(), vec![CorrelationToken(2)]);
        assert_eq!(gauge.load(Ordering::Acquire), 1);
    }

    #[test]
    fn stop_signal_ends_idle_worker() {
        let transport = Arc::new(RecordingTransport::new());
        let (handle, task) = dispatcher(&transport).spawn(None).unwrap();

        let outcome = task.shutdown(WAIT).expect("worker stopped");
        assert_eq!(outcome.stats.submitted, 0);
        assert!(handle.submit(order(Side::Buy, 1)).is_err());
        assert_eq!(handle.outstanding(), 0);
    }

    /// Transport whose sends block until the test lets them through.
    struct GatedTransport {
        entered: Sender<()>,
        release: Receiver<()>,
        sent: AtomicU64,
    }

    impl GatedTransport {
        fn new() -> (Arc<Self>, Receiver<()>, Sender<()>) {
            let (entered_tx, entered_rx) = crossbeam_channel::unbounded();
            let (release_tx, release_rx) = crossbeam_channel::unbounded();
            let transport = Arc::new(Self { entered: entered_tx, release: release_rx, sent: AtomicU64::new(0) });
            (transport, entered_rx, release_tx)
        }
    }

    impl Transport for GatedTransport {
        fn name(&self) -> &str {
            "gated"
        }

        fn open_service(&self, _service: &str) -> Result<(), EtError> {
            Ok(())
        }

        fn subscribe(&self, _subscriptions: &[Subscription]) -> Result<(), EtError> {
            Ok(())
        }

        fn send_request(&self, _request: &OutboundRequest, _token: CorrelationToken) -> Result<(), EtError> {
            let _ = self.entered.send(());
            let _ = self.release.recv();
            self.sent.fetch_add(1, Ordering::AcqRel);
            Ok(())
        }
    }

    fn gated_dispatcher(transport: &Arc<GatedTransport>) -> Dispatcher {
        let transport: Arc<dyn Transport> = transport.clone();
        Dispatcher::new(transport, Arc::new(TokenSource::default()), "//blp/emapisvc_beta")
    }

    #[test]
    fn queued_orders_are_abandoned_on_stop() {
        let (transport, entered, release) = GatedTransport::new();
        let (handle, task) = gated_dispatcher(&transport).spawn(None).unwrap();

        for amount in 1..=5 {
            handle.submit(order(Side::Buy, amount)).unwrap();
        }
        entered.recv_timeout(WAIT).expect("first send started");

        // Let the in-progress send finish only after the stop signal is queued.
        let releaser = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(100));
            let _ = release.send(());
        });
        let outcome = task.shutdown(WAIT).expect("worker stopped");
        releaser.join().unwrap();

        assert_eq!(outcome.stats.submitted, 1);
        assert_eq!(outcome.stats.sent, 1);
        assert_eq!(outcome.stats.abandoned, 4);
        assert_eq!(outcome.registry.len(), 1);
        assert_eq!(transport.sent.load(Ordering::Acquire), 1);
        // Only the order that went out is still in flight.
        assert_eq!(handle.outstanding(), 1);
    }

    #[test]
    fn busy_worker_is_detached_after_timeout() {
        let (transport, entered, release) = GatedTransport::new();
        let (handle, task) = gated_dispatcher(&transport).spawn(None).unwrap();

        handle.submit(order(Side::Sell, 1)).unwrap();
        entered.recv_timeout(WAIT).expect("send started");

        assert!(task.join(Duration::from_millis(10)).is_none());

        // The detached worker still finishes its send once unblocked.
        release.send(()).unwrap();
        drop(handle);
        let deadline = std::time::Instant::now() + WAIT;
        while transport.sent.load(Ordering::Acquire) == 0 && std::time::Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(transport.sent.load(Ordering::Acquire), 1);
    }
}
