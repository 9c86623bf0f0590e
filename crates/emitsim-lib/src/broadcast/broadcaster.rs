use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::clock::QueueClock;
use super::queue::{epoch_seconds, ControlNotice, QueueBackend, QueueDefinition, QueueEntry};
use super::retry::with_backoff;
use super::sink::MessageSink;
use crate::config::{BroadcastConfig, RetryConfig};
use crate::error::{Error, Result};

const MIN_IDLE_POLL: Duration = Duration::from_millis(10);

/// Lifecycle of a running broadcaster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BroadcasterState {
    Sending,
    PausedForTrim,
    PausedForReset,
    Stopped,
}

/// Point-in-time view of a broadcaster.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BroadcastStats {
    pub queue: String,
    pub state: BroadcasterState,
    pub speed: f64,
    /// Virtual time, epoch seconds.
    pub queue_time: f64,
    pub timeshift: f64,
    pub total_sent: u64,
    pub dropped: u64,
    pub trimmed: u64,
}

impl BroadcastStats {
    pub fn queue_datetime(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis((self.queue_time * 1000.0).round() as i64)
    }
}

#[derive(Debug, Clone, PartialEq)]
enum PauseReason {
    /// Entries changed; an in-flight entry of `discard` is dropped, not requeued.
    Trim { discard: Option<String> },
    Reset { speed: f64, start: Option<f64> },
    Quit,
}

/// Sent by the trimmer before cancelling the sender's wake token.
///
/// The sender acknowledges on `stopped` once its popped entry is back in
/// the queue (or discarded), then waits on `resume` for a fresh wake token.
struct PauseRequest {
    reason: PauseReason,
    stopped: oneshot::Sender<()>,
    resume: oneshot::Receiver<CancellationToken>,
}

enum Resumed {
    Continue { token: CancellationToken, reset: bool },
    Quit,
}

struct Shared {
    name: String,
    clock: Mutex<QueueClock>,
    state: Mutex<BroadcasterState>,
    total_sent: AtomicU64,
    dropped: AtomicU64,
    trimmed: AtomicU64,
}

impl Shared {
    fn clock(&self) -> std::sync::MutexGuard<'_, QueueClock> {
        self.clock.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn now(&self) -> f64 {
        self.clock().now()
    }

    fn state(&self) -> BroadcasterState {
        *self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn set_state(&self, to: BroadcasterState) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if *state != to {
            debug!(queue = %self.name, from = ?*state, to = ?to, "broadcaster state");
            *state = to;
        }
    }

    fn reset_clock(&self, speed: f64, start: Option<f64>) {
        match self.clock().reset(speed, start) {
            Ok(()) => info!(queue = %self.name, speed, start = ?start, "queue clock reset"),
            Err(err) => warn!(queue = %self.name, error = %err, "ignoring invalid reset"),
        }
    }

    fn stats(&self) -> BroadcastStats {
        let (speed, queue_time, timeshift) = {
            let clock = self.clock();
            (clock.speed(), clock.now(), clock.timeshift())
        };
        BroadcastStats {
            queue: self.name.clone(),
            state: self.state(),
            speed,
            queue_time,
            timeshift,
            total_sent: self.total_sent.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            trimmed: self.trimmed.load(Ordering::Relaxed),
        }
    }
}

/// State shared by the sender, the trimmer and the handle.
#[derive(Clone)]
struct Context {
    shared: Arc<Shared>,
    backend: Arc<dyn QueueBackend>,
    retry: RetryConfig,
    shutdown: CancellationToken,
}

impl Context {
    fn name(&self) -> &str {
        &self.shared.name
    }

    /// Remove every entry scheduled at or before the current virtual time.
    async fn trim(&self, why: &str) -> Result<usize> {
        let now = self.shared.now();
        let backend = &self.backend;
        let name = self.name();
        let removed = with_backoff(name, &self.retry, move || {
            backend.remove_range_by_score(name, f64::MIN, now)
        })
        .await?;
        self.shared.trimmed.fetch_add(removed as u64, Ordering::Relaxed);
        if removed > 0 {
            info!(queue = name, why, removed, now, "trimmed stale entries");
        } else {
            debug!(queue = name, why, now, "nothing to trim");
        }
        Ok(removed)
    }

    async fn publish(&self, notice: ControlNotice) -> Result<()> {
        let backend = &self.backend;
        let name = self.name();
        with_backoff(name, &self.retry, move || backend.publish(name, notice.clone())).await
    }
}

/// Replays a queue at its virtual time.
///
/// [`Broadcaster::start`] spawns two cooperating tasks. The sender pops the
/// earliest entry, sleeps until it is due and hands it to the sink. The
/// trimmer listens on the control channel and, for every notice, pauses the
/// sender, applies the change and removes stale entries before resuming it.
pub struct Broadcaster {
    definition: QueueDefinition,
    backend: Arc<dyn QueueBackend>,
    sink: Arc<dyn MessageSink>,
    config: BroadcastConfig,
}

impl Broadcaster {
    pub fn new(
        definition: QueueDefinition,
        backend: Arc<dyn QueueBackend>,
        sink: Arc<dyn MessageSink>,
        config: BroadcastConfig,
    ) -> Self {
        Self {
            definition,
            backend,
            sink,
            config,
        }
    }

    pub async fn start(self) -> Result<BroadcasterHandle> {
        let clock = QueueClock::new(self.definition.speed, self.definition.start_epoch())?;
        let shared = Arc::new(Shared {
            name: self.definition.name.clone(),
            clock: Mutex::new(clock),
            state: Mutex::new(BroadcasterState::Sending),
            total_sent: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
            trimmed: AtomicU64::new(0),
        });
        let ctx = Context {
            shared,
            backend: self.backend,
            retry: self.config.retry,
            shutdown: CancellationToken::new(),
        };

        // Subscribe first so no notice published after the initial trim is lost.
        let notices = ctx.backend.subscribe(ctx.name());
        ctx.trim("init").await?;

        let token = CancellationToken::new();
        let wake = Arc::new(Mutex::new(token.clone()));
        let (pause_tx, pause_rx) = mpsc::channel(1);

        let sender = Sender {
            ctx: ctx.clone(),
            sink: self.sink,
            max_backlog: self.config.max_backlog_secs,
            idle_poll: self.config.idle_poll().max(MIN_IDLE_POLL),
        };
        let trimmer = Trimmer {
            ctx: ctx.clone(),
            wake,
        };

        info!(
            queue = ctx.name(),
            speed = self.definition.speed,
            start = ?self.definition.start_time,
            "broadcaster started"
        );
        Ok(BroadcasterHandle {
            sender: tokio::spawn(sender.run(token, pause_rx)),
            trimmer: tokio::spawn(trimmer.run(notices, pause_tx)),
            ctx,
        })
    }
}

struct Sender {
    ctx: Context,
    sink: Arc<dyn MessageSink>,
    max_backlog: f64,
    idle_poll: Duration,
}

impl Sender {
    async fn run(self, token: CancellationToken, pause_rx: mpsc::Receiver<PauseRequest>) -> Result<()> {
        let result = self.send_loop(token, pause_rx).await;
        self.ctx.shared.set_state(BroadcasterState::Stopped);
        match &result {
            Ok(()) => info!(
                queue = self.ctx.name(),
                sent = self.ctx.shared.total_sent.load(Ordering::Relaxed),
                "sender stopped"
            ),
            Err(err) => {
                error!(queue = self.ctx.name(), error = %err, "sender failed");
                self.ctx.shutdown.cancel();
            }
        }
        result
    }

    async fn send_loop(
        &self,
        mut token: CancellationToken,
        mut pause_rx: mpsc::Receiver<PauseRequest>,
    ) -> Result<()> {
        let shared = &self.ctx.shared;
        let backend = &self.ctx.backend;
        let name = self.ctx.name();
        let mut last_delivered = f64::NEG_INFINITY;
        // Popped entry interrupted by a pause, settled once the reason is known.
        let mut held: Option<QueueEntry> = None;

        loop {
            if self.ctx.shutdown.is_cancelled() {
                if let Some(entry) = held.take() {
                    self.push_back(&entry).await?;
                }
                return Ok(());
            }
            if token.is_cancelled() {
                match self.pause(&mut pause_rx, held.take()).await? {
                    Resumed::Continue { token: fresh, reset } => {
                        token = fresh;
                        if reset {
                            last_delivered = f64::NEG_INFINITY;
                        }
                        continue;
                    }
                    Resumed::Quit => return Ok(()),
                }
            }

            let popped = with_backoff(name, &self.ctx.retry, move || backend.pop_min(name)).await?;
            let Some(entry) = popped else {
                tokio::select! {
                    biased;
                    _ = self.ctx.shutdown.cancelled() => {}
                    _ = token.cancelled() => {}
                    _ = tokio::time::sleep(self.idle_poll) => {}
                }
                continue;
            };

            let now = shared.now();
            if entry.score < now - self.max_backlog {
                warn!(
                    queue = name,
                    ident = %entry.ident,
                    late_secs = now - entry.score,
                    "entry too late, dropped"
                );
                shared.dropped.fetch_add(1, Ordering::Relaxed);
                self.ctx.trim("backlog").await?;
                continue;
            }
            if entry.score < last_delivered {
                warn!(
                    queue = name,
                    ident = %entry.ident,
                    score = entry.score,
                    last_delivered,
                    "entry older than last delivery, dropped"
                );
                shared.dropped.fetch_add(1, Ordering::Relaxed);
                continue;
            }

            let wait = shared.clock().real_wait(entry.score);
            tokio::select! {
                biased;
                _ = self.ctx.shutdown.cancelled() => {
                    self.push_back(&entry).await?;
                    return Ok(());
                }
                _ = token.cancelled() => {
                    held = Some(entry);
                }
                _ = tokio::time::sleep(wait) => {
                    if let Err(err) = self.sink.send(name, &entry).await {
                        self.push_back(&entry).await?;
                        return Err(err);
                    }
                    last_delivered = entry.score;
                    let sent = shared.total_sent.fetch_add(1, Ordering::Relaxed) + 1;
                    debug!(queue = name, ident = %entry.ident, score = entry.score, sent, "sent");
                }
            }
        }
    }

    async fn push_back(&self, entry: &QueueEntry) -> Result<()> {
        let backend = &self.ctx.backend;
        let name = self.ctx.name();
        with_backoff(name, &self.ctx.retry, move || {
            backend.push(name, vec![entry.clone()])
        })
        .await?;
        debug!(queue = name, ident = %entry.ident, score = entry.score, "entry pushed back");
        Ok(())
    }

    async fn pause(
        &self,
        pause_rx: &mut mpsc::Receiver<PauseRequest>,
        held: Option<QueueEntry>,
    ) -> Result<Resumed> {
        let request = tokio::select! {
            biased;
            _ = self.ctx.shutdown.cancelled() => None,
            request = pause_rx.recv() => request,
        };
        let Some(PauseRequest {
            reason,
            stopped,
            resume,
        }) = request
        else {
            if let Some(entry) = held {
                self.push_back(&entry).await?;
            }
            return Ok(Resumed::Quit);
        };

        if let Some(entry) = held {
            match &reason {
                PauseReason::Trim { discard: Some(ident) } if *ident == entry.ident => debug!(
                    queue = self.ctx.name(),
                    ident = %entry.ident,
                    score = entry.score,
                    "in-flight entry rescheduled, discarded"
                ),
                _ => self.push_back(&entry).await?,
            }
        }

        self.ctx.shared.set_state(match reason {
            PauseReason::Trim { .. } => BroadcasterState::PausedForTrim,
            PauseReason::Reset { .. } => BroadcasterState::PausedForReset,
            PauseReason::Quit => BroadcasterState::Stopped,
        });
        let _ = stopped.send(());
        if reason == PauseReason::Quit {
            return Ok(Resumed::Quit);
        }

        let token = tokio::select! {
            biased;
            _ = self.ctx.shutdown.cancelled() => return Ok(Resumed::Quit),
            token = resume => match token {
                Ok(token) => token,
                Err(_) => return Ok(Resumed::Quit),
            },
        };
        self.ctx.shared.set_state(BroadcasterState::Sending);
        Ok(Resumed::Continue {
            token,
            reset: matches!(reason, PauseReason::Reset { .. }),
        })
    }
}

struct Trimmer {
    ctx: Context,
    /// The sender's current wake token.
    wake: Arc<Mutex<CancellationToken>>,
}

impl Trimmer {
    async fn run(
        self,
        mut notices: broadcast::Receiver<ControlNotice>,
        pause_tx: mpsc::Sender<PauseRequest>,
    ) -> Result<()> {
        debug!(queue = self.ctx.name(), "trimmer listening");
        let result = self.listen(&mut notices, &pause_tx).await;
        if let Err(err) = &result {
            error!(queue = self.ctx.name(), error = %err, "trimmer failed");
            self.ctx.shutdown.cancel();
        }
        result
    }

    async fn listen(
        &self,
        notices: &mut broadcast::Receiver<ControlNotice>,
        pause_tx: &mpsc::Sender<PauseRequest>,
    ) -> Result<()> {
        loop {
            let notice = tokio::select! {
                biased;
                _ = self.ctx.shutdown.cancelled() => return Ok(()),
                notice = notices.recv() => notice,
            };
            let reason = match notice {
                Ok(ControlNotice::NewData) => PauseReason::Trim { discard: None },
                Ok(ControlNotice::Rescheduled { ident }) => PauseReason::Trim { discard: Some(ident) },
                Err(RecvError::Lagged(skipped)) => {
                    debug!(queue = self.ctx.name(), skipped, "control notices lagged");
                    PauseReason::Trim { discard: None }
                }
                Ok(ControlNotice::Reset { speed, start_time }) => PauseReason::Reset {
                    speed,
                    start: start_time,
                },
                Ok(ControlNotice::Quit) => PauseReason::Quit,
                Err(RecvError::Closed) => return Ok(()),
            };
            if !self.pause_sender(reason, pause_tx).await? {
                return Ok(());
            }
        }
    }

    /// Run one pause cycle. Returns false once the sender is gone.
    async fn pause_sender(&self, reason: PauseReason, pause_tx: &mpsc::Sender<PauseRequest>) -> Result<bool> {
        let (stopped_tx, stopped_rx) = oneshot::channel();
        let (resume_tx, resume_rx) = oneshot::channel();
        let request = PauseRequest {
            reason: reason.clone(),
            stopped: stopped_tx,
            resume: resume_rx,
        };
        if pause_tx.send(request).await.is_err() {
            return Ok(false);
        }
        self.wake.lock().unwrap_or_else(|e| e.into_inner()).cancel();

        let acknowledged = tokio::select! {
            biased;
            _ = self.ctx.shutdown.cancelled() => false,
            ack = stopped_rx => ack.is_ok(),
        };
        if !acknowledged {
            return Ok(false);
        }

        match reason {
            PauseReason::Quit => {
                info!(queue = self.ctx.name(), "quit received");
                return Ok(false);
            }
            PauseReason::Reset { speed, start } => {
                self.ctx.shared.reset_clock(speed, start);
                self.ctx.trim("reset").await?;
            }
            PauseReason::Trim { .. } => {
                self.ctx.trim("new data").await?;
            }
        }

        let fresh = CancellationToken::new();
        *self.wake.lock().unwrap_or_else(|e| e.into_inner()) = fresh.clone();
        let _ = resume_tx.send(fresh);
        Ok(true)
    }
}

async fn join(handle: JoinHandle<Result<()>>, task: &'static str) -> Result<()> {
    handle.await.map_err(|err| Error::TaskFailed {
        task,
        message: err.to_string(),
    })?
}

/// Control surface of a started [`Broadcaster`].
pub struct BroadcasterHandle {
    ctx: Context,
    sender: JoinHandle<Result<()>>,
    trimmer: JoinHandle<Result<()>>,
}

impl BroadcasterHandle {
    pub fn name(&self) -> &str {
        self.ctx.name()
    }

    pub fn state(&self) -> BroadcasterState {
        self.ctx.shared.state()
    }

    pub fn stats(&self) -> BroadcastStats {
        self.ctx.shared.stats()
    }

    /// Change speed and optionally restart virtual time at `start_time`.
    ///
    /// Entries that end up in the past are trimmed.
    pub async fn reset(&self, speed: f64, start_time: Option<DateTime<Utc>>) -> Result<()> {
        if !(speed.is_finite() && speed > 0.0) {
            return Err(Error::InvalidSpeed { speed });
        }
        self.ctx
            .publish(ControlNotice::Reset {
                speed,
                start_time: start_time.map(epoch_seconds),
            })
            .await
    }

    /// Resolves once either task has stopped on its own, typically after
    /// a substrate or sink failure.
    pub async fn stopped(&self) {
        self.ctx.shutdown.cancelled().await
    }

    /// Stop both tasks, leaving any undelivered entry in the queue.
    pub async fn shutdown(self) -> Result<BroadcastStats> {
        if let Err(err) = self.ctx.publish(ControlNotice::Quit).await {
            warn!(queue = self.ctx.name(), error = %err, "could not publish quit, cancelling");
            self.ctx.shutdown.cancel();
        }
        let sender = join(self.sender, "sender").await;
        let trimmer = join(self.trimmer, "trimmer").await;
        self.ctx.shutdown.cancel();
        self.ctx.shared.set_state(BroadcasterState::Stopped);
        sender?;
        trimmer?;

        let stats = self.ctx.shared.stats();
        info!(
            queue = %stats.queue,
            sent = stats.total_sent,
            dropped = stats.dropped,
            trimmed = stats.trimmed,
            "broadcaster stopped"
        );
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broadcast::queue::{Enqueuer, MemoryQueueBackend};
    use crate::broadcast::sink::ChannelSink;
    use tokio::sync::mpsc::UnboundedReceiver;
    use tokio::time::Instant;

    const START: f64 = 1000.0;

    fn start_time() -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(START as i64, 0)
    }

    async fn launch(
        backend: Arc<MemoryQueueBackend>,
        speed: f64,
    ) -> (BroadcasterHandle, UnboundedReceiver<QueueEntry>) {
        let (sink, rx) = ChannelSink::new();
        let definition = QueueDefinition::new("wire", speed, start_time()).unwrap();
        let handle = Broadcaster::new(definition, backend, Arc::new(sink), BroadcastConfig::default())
            .start()
            .await
            .unwrap();
        (handle, rx)
    }

    fn secs_since(t0: Instant) -> f64 {
        t0.elapsed().as_secs_f64()
    }

    #[tokio::test(start_paused = true)]
    async fn delivers_in_order_at_virtual_time() {
        let backend = Arc::new(MemoryQueueBackend::new());
        Enqueuer::new(backend.clone())
            .enqueue(
                "wire",
                "AF1",
                vec![(1006.0, "c".into()), (1001.0, "a".into()), (1003.0, "b".into())],
            )
            .await
            .unwrap();

        let t0 = Instant::now();
        let (handle, mut rx) = launch(backend, 1.0).await;

        for (payload, at) in [("a", 1.0), ("b", 3.0), ("c", 6.0)] {
            let entry = rx.recv().await.unwrap();
            assert_eq!(entry.payload, payload);
            assert!((secs_since(t0) - at).abs() < 0.01, "{payload} at {}", secs_since(t0));
        }

        let stats = handle.shutdown().await.unwrap();
        assert_eq!(stats.total_sent, 3);
        assert_eq!(stats.state, BroadcasterState::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn stale_entries_are_trimmed_on_new_data() {
        let backend = Arc::new(MemoryQueueBackend::new());
        let enqueuer = Enqueuer::new(backend.clone());
        enqueuer
            .enqueue("wire", "AF1", vec![(1010.0, "late".into())])
            .await
            .unwrap();

        let t0 = Instant::now();
        let (handle, mut rx) = launch(backend.clone(), 1.0).await;
        tokio::time::sleep(Duration::from_secs(2)).await;
        enqueuer
            .enqueue("wire", "BA2", vec![(995.0, "old".into())])
            .await
            .unwrap();

        let entry = rx.recv().await.unwrap();
        assert_eq!(entry.payload, "late");
        assert!((secs_since(t0) - 10.0).abs() < 0.01);

        let stats = handle.shutdown().await.unwrap();
        assert_eq!(stats.total_sent, 1);
        assert_eq!(stats.trimmed, 1);
        assert_eq!(backend.len("wire").await.unwrap(), 0);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn rescheduled_in_flight_entry_is_not_delivered() {
        let backend = Arc::new(MemoryQueueBackend::new());
        let enqueuer = Enqueuer::new(backend.clone());
        enqueuer
            .enqueue("wire", "AF1", vec![(1005.0, "old slot".into())])
            .await
            .unwrap();

        let t0 = Instant::now();
        let (handle, mut rx) = launch(backend.clone(), 1.0).await;
        tokio::time::sleep(Duration::from_secs(2)).await;
        enqueuer
            .enqueue("wire", "AF1", vec![(1008.0, "new slot".into())])
            .await
            .unwrap();

        let entry = rx.recv().await.unwrap();
        assert_eq!(entry.payload, "new slot");
        assert!((secs_since(t0) - 8.0).abs() < 0.01);

        let stats = handle.shutdown().await.unwrap();
        assert_eq!(stats.total_sent, 1);
        assert_eq!(backend.len("wire").await.unwrap(), 0);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn entries_past_backlog_are_dropped() {
        let backend = Arc::new(MemoryQueueBackend::new());
        let t0 = Instant::now();
        let (handle, mut rx) = launch(backend.clone(), 1.0).await;

        // Inserted behind the trimmer's back.
        backend
            .push(
                "wire",
                vec![
                    QueueEntry::new("X", 900.0, "ancient"),
                    QueueEntry::new("Y", 1008.0, "fresh"),
                ],
            )
            .await
            .unwrap();

        let entry = rx.recv().await.unwrap();
        assert_eq!(entry.payload, "fresh");
        assert!((secs_since(t0) - 8.0).abs() < 0.01);

        let stats = handle.shutdown().await.unwrap();
        assert_eq!(stats.dropped, 1);
        assert_eq!(stats.total_sent, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn entries_older_than_last_delivery_are_dropped() {
        let backend = Arc::new(MemoryQueueBackend::new());
        backend
            .push("wire", vec![QueueEntry::new("A", 1002.0, "first")])
            .await
            .unwrap();
        let (handle, mut rx) = launch(backend.clone(), 1.0).await;

        assert_eq!(rx.recv().await.unwrap().payload, "first");
        backend
            .push(
                "wire",
                vec![
                    QueueEntry::new("B", 1001.0, "behind"),
                    QueueEntry::new("C", 1010.0, "ahead"),
                ],
            )
            .await
            .unwrap();
        assert_eq!(rx.recv().await.unwrap().payload, "ahead");

        let stats = handle.shutdown().await.unwrap();
        assert_eq!(stats.dropped, 1);
        assert_eq!(stats.total_sent, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn reset_changes_speed_without_jumping() {
        let backend = Arc::new(MemoryQueueBackend::new());
        backend
            .push("wire", vec![QueueEntry::new("A", 1060.0, "minute")])
            .await
            .unwrap();

        let t0 = Instant::now();
        let (handle, mut rx) = launch(backend, 1.0).await;
        handle.reset(60.0, None).await.unwrap();

        assert_eq!(rx.recv().await.unwrap().payload, "minute");
        assert!((secs_since(t0) - 1.0).abs() < 0.01);
        assert_eq!(handle.stats().speed, 60.0);
        handle.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn reset_rejects_bad_speed() {
        let backend = Arc::new(MemoryQueueBackend::new());
        let (handle, _rx) = launch(backend, 1.0).await;
        assert!(matches!(
            handle.reset(0.0, None).await,
            Err(Error::InvalidSpeed { .. })
        ));
        handle.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_keeps_pending_entry() {
        let backend = Arc::new(MemoryQueueBackend::new());
        backend
            .push("wire", vec![QueueEntry::new("A", 1010.0, "pending")])
            .await
            .unwrap();
        let (handle, _rx) = launch(backend.clone(), 1.0).await;
        tokio::time::sleep(Duration::from_secs(1)).await;

        let stats = handle.shutdown().await.unwrap();
        assert_eq!(stats.total_sent, 0);
        assert_eq!(backend.len("wire").await.unwrap(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn sink_failure_stops_broadcaster() {
        let backend = Arc::new(MemoryQueueBackend::new());
        backend
            .push("wire", vec![QueueEntry::new("A", 1001.0, "lost")])
            .await
            .unwrap();
        let (handle, rx) = launch(backend.clone(), 1.0).await;
        drop(rx);

        handle.stopped().await;
        assert_eq!(handle.state(), BroadcasterState::Stopped);
        assert!(handle.shutdown().await.is_err());
        // The undelivered entry goes back to the queue.
        assert_eq!(backend.len("wire").await.unwrap(), 1);
        assert_eq!(backend.pop_min("wire").await.unwrap().unwrap().payload, "lost");
    }
}
