use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex};
use std::thread;

use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use sagabus_events::{BusEnvelope, Message, ServiceBus, Subscription};

use crate::config::WorkerConfig;
use crate::pipeline::{MessageSink, deliver};

/// Handle to control and join a running saga worker.
#[derive(Debug)]
pub struct WorkerHandle {
    shutdown: mpsc::Sender<()>,
    joins: Vec<thread::JoinHandle<()>>,
    stats: Arc<Mutex<WorkerStats>>,
}

impl WorkerHandle {
    /// Request graceful shutdown and wait for every worker thread to stop.
    ///
    /// Messages already accepted by the receiver are delivered before the
    /// consumers exit.
    pub fn shutdown(self) {
        let _ = self.shutdown.send(());
        for join in self.joins {
            let _ = join.join();
        }
    }

    /// Get current worker statistics.
    pub fn stats(&self) -> WorkerStats {
        self.stats.lock().map(|s| *s).unwrap_or_default()
    }
}

/// Worker runtime statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct WorkerStats {
    /// Envelopes of the worker's message type decoded successfully.
    pub received: u64,
    /// Envelopes of the worker's message type that could not be decoded.
    pub rejected: u64,
    /// Messages whose actions all completed.
    pub delivered: u64,
    /// Messages where an action failed.
    pub failed: u64,
}

/// Receive endpoint that feeds one message type from a bus into a sink.
///
/// - One receiver thread reads the bus subscription and decodes envelopes of
///   type `M`; other message types are skipped
/// - `concurrent_consumer_limit` consumer threads deliver decoded messages
///   through the sink
/// - Delivery is at-least-once upstream, so sagas must tolerate duplicates
#[derive(Debug)]
pub struct SagaWorker;

impl SagaWorker {
    /// Subscribe to `bus` and spawn the worker threads.
    ///
    /// The subscription is taken before this returns, so anything published
    /// afterwards reaches the worker.
    pub fn spawn<M, K, B>(config: WorkerConfig, bus: &B, sink: Arc<K>) -> WorkerHandle
    where
        M: Message + DeserializeOwned,
        K: MessageSink<M> + Send + Sync + 'static,
        B: ServiceBus + ?Sized,
    {
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();
        let (work_tx, work_rx) = mpsc::channel::<M>();
        let work_rx = Arc::new(Mutex::new(work_rx));
        let stats = Arc::new(Mutex::new(WorkerStats::default()));
        let sub = bus.subscribe();

        info!(
            worker = %config.name,
            bus = bus.address(),
            message_type = M::message_type(),
            consumers = config.concurrent_consumer_limit,
            "starting saga worker"
        );

        let mut joins = Vec::with_capacity(config.concurrent_consumer_limit + 1);

        let receiver = {
            let config = config.clone();
            let stats = stats.clone();
            thread::Builder::new()
                .name(format!("{}-receive", config.name))
                .spawn(move || receive_loop(&config, sub, shutdown_rx, work_tx, &stats))
                .expect("failed to spawn saga worker receive thread")
        };
        joins.push(receiver);

        for index in 0..config.concurrent_consumer_limit.max(1) {
            let name = config.name.clone();
            let work_rx = work_rx.clone();
            let sink = sink.clone();
            let stats = stats.clone();
            let join = thread::Builder::new()
                .name(format!("{name}-consume-{index}"))
                .spawn(move || consume_loop(&name, &work_rx, sink.as_ref(), &stats))
                .expect("failed to spawn saga worker consumer thread");
            joins.push(join);
        }

        WorkerHandle {
            shutdown: shutdown_tx,
            joins,
            stats,
        }
    }
}

fn receive_loop<M>(
    config: &WorkerConfig,
    sub: Subscription<BusEnvelope>,
    shutdown_rx: mpsc::Receiver<()>,
    work_tx: mpsc::Sender<M>,
    stats: &Mutex<WorkerStats>,
) where
    M: Message + DeserializeOwned,
{
    loop {
        // Shutdown check (non-blocking)
        if shutdown_rx.try_recv().is_ok() {
            break;
        }

        let envelope = match sub.recv_timeout(config.receive_timeout) {
            Ok(envelope) => envelope,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        };

        if !envelope.is::<M>() {
            continue;
        }

        match envelope.decode::<M>() {
            Ok(message) => {
                record(stats, |s| s.received += 1);
                if work_tx.send(message).is_err() {
                    break;
                }
            }
            Err(err) => {
                record(stats, |s| s.rejected += 1);
                warn!(
                    worker = %config.name,
                    message_id = %envelope.message_id(),
                    correlation_id = %envelope.correlation_id(),
                    error = %err,
                    "failed to decode message"
                );
            }
        }
    }

    debug!(worker = %config.name, "saga worker receiver stopped");
    // Dropping `work_tx` lets the consumers drain and exit.
}

fn consume_loop<M, K>(name: &str, work_rx: &Mutex<mpsc::Receiver<M>>, sink: &K, stats: &Mutex<WorkerStats>)
where
    M: Message,
    K: MessageSink<M> + ?Sized,
{
    loop {
        let next = match work_rx.lock() {
            Ok(rx) => rx.recv(),
            Err(_) => break,
        };
        let Ok(message) = next else {
            break;
        };

        match deliver(sink, &message) {
            Ok(_) => record(stats, |s| s.delivered += 1),
            Err(err) => {
                record(stats, |s| s.failed += 1);
                warn!(
                    worker = name,
                    message_type = M::message_type(),
                    error = %err,
                    "saga dispatch failed"
                );
            }
        }
    }
}

fn record(stats: &Mutex<WorkerStats>, update: impl FnOnce(&mut WorkerStats)) {
    if let Ok(mut stats) = stats.lock() {
        update(&mut stats);
    }
}
