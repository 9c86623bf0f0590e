//! Queue substrate: a per-queue sorted set plus a control channel.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::config::BroadcastConfig;
use crate::error::{Error, Result};
use crate::path::FloatOrd;

/// Queue name reserved for the shutdown sentinel.
pub const QUIT_QUEUE: &str = "quit";

const CONTROL_CAPACITY: usize = 64;

/// How often a SQLite handle looks for notices published by other handles.
const NOTICE_POLL: Duration = Duration::from_millis(50);

/// Notices kept per queue in SQLite; older rows are pruned on publish.
const NOTICE_RETENTION: i64 = 256;

/// A pending message and its absolute emission time in epoch seconds.
///
/// The payload is the member of the sorted set: pushing the same payload
/// twice keeps a single entry with the latest score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueEntry {
    pub ident: String,
    pub score: f64,
    pub payload: String,
}

impl QueueEntry {
    pub fn new(ident: impl Into<String>, score: f64, payload: impl Into<String>) -> Self {
        Self {
            ident: ident.into(),
            score,
            payload: payload.into(),
        }
    }
}

/// Out-of-band notification published on a queue's control channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControlNotice {
    /// Entries were inserted or removed.
    NewData,
    /// Every entry of `ident` was replaced or removed; a copy already
    /// popped by a sender must not be delivered.
    Rescheduled { ident: String },
    /// Restart the queue clock; `start_time` in epoch seconds.
    Reset { speed: f64, start_time: Option<f64> },
    /// Stop the queue.
    Quit,
}

/// Reject names the queue substrate reserves.
pub fn validate_queue_name(name: &str) -> Result<()> {
    if name.trim().is_empty() || name.eq_ignore_ascii_case(QUIT_QUEUE) {
        return Err(Error::ReservedQueueName {
            name: name.to_string(),
        });
    }
    Ok(())
}

/// Speed and start time of a broadcast queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueDefinition {
    pub name: String,
    pub speed: f64,
    pub start_time: Option<DateTime<Utc>>,
}

impl QueueDefinition {
    pub fn new(name: impl Into<String>, speed: f64, start_time: Option<DateTime<Utc>>) -> Result<Self> {
        let name = name.into();
        validate_queue_name(&name)?;
        if !(speed.is_finite() && speed > 0.0) {
            return Err(Error::InvalidSpeed { speed });
        }
        Ok(Self {
            name,
            speed,
            start_time,
        })
    }

    pub fn from_config(name: impl Into<String>, config: &BroadcastConfig) -> Result<Self> {
        Self::new(name, config.speed, config.start_time)
    }

    /// Start time in epoch seconds.
    pub fn start_epoch(&self) -> Option<f64> {
        self.start_time.map(epoch_seconds)
    }
}

pub fn epoch_seconds(time: DateTime<Utc>) -> f64 {
    time.timestamp_millis() as f64 / 1000.0
}

/// Sorted set and pub/sub primitives the broadcaster runs on.
#[async_trait]
pub trait QueueBackend: Send + Sync {
    /// Insert entries, replacing the score of payloads already present.
    async fn push(&self, queue: &str, entries: Vec<QueueEntry>) -> Result<()>;

    /// Remove and return the entry with the lowest score.
    async fn pop_min(&self, queue: &str) -> Result<Option<QueueEntry>>;

    /// Remove entries whose score lies in `[min, max]`.
    async fn remove_range_by_score(&self, queue: &str, min: f64, max: f64) -> Result<usize>;

    /// Remove every entry enqueued under `ident`.
    async fn remove_ident(&self, queue: &str, ident: &str) -> Result<usize>;

    async fn len(&self, queue: &str) -> Result<usize>;

    async fn publish(&self, queue: &str, notice: ControlNotice) -> Result<()>;

    fn subscribe(&self, queue: &str) -> broadcast::Receiver<ControlNotice>;
}

/// In-process control channels, one per queue name.
#[derive(Debug, Default)]
pub struct ControlBus {
    channels: Mutex<HashMap<String, broadcast::Sender<ControlNotice>>>,
}

impl ControlBus {
    fn sender(&self, queue: &str) -> broadcast::Sender<ControlNotice> {
        let mut channels = self.channels.lock().unwrap_or_else(|e| e.into_inner());
        channels
            .entry(queue.to_string())
            .or_insert_with(|| broadcast::channel(CONTROL_CAPACITY).0)
            .clone()
    }

    /// Publish to current subscribers; nobody listening is not an error.
    pub fn publish(&self, queue: &str, notice: ControlNotice) {
        let receivers = self.sender(queue).send(notice.clone()).unwrap_or(0);
        debug!(queue, ?notice, receivers, "control notice published");
    }

    pub fn subscribe(&self, queue: &str) -> broadcast::Receiver<ControlNotice> {
        self.sender(queue).subscribe()
    }
}

#[derive(Debug, Default)]
struct SortedQueue {
    by_score: BTreeMap<(FloatOrd, String), String>,
    scores: HashMap<String, FloatOrd>,
}

impl SortedQueue {
    fn insert(&mut self, entry: QueueEntry) {
        if let Some(previous) = self.scores.remove(&entry.payload) {
            self.by_score.remove(&(previous, entry.payload.clone()));
        }
        self.scores.insert(entry.payload.clone(), FloatOrd(entry.score));
        self.by_score
            .insert((FloatOrd(entry.score), entry.payload), entry.ident);
    }

    fn pop_min(&mut self) -> Option<QueueEntry> {
        let ((score, payload), ident) = self.by_score.pop_first()?;
        self.scores.remove(&payload);
        Some(QueueEntry {
            ident,
            score: score.0,
            payload,
        })
    }

    fn remove_where(&mut self, predicate: impl Fn(f64, &str) -> bool) -> usize {
        let doomed: Vec<(FloatOrd, String)> = self
            .by_score
            .iter()
            .filter(|((score, _), ident)| predicate(score.0, ident))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &doomed {
            self.by_score.remove(key);
            self.scores.remove(&key.1);
        }
        doomed.len()
    }
}

/// Sorted sets held in memory.
#[derive(Debug, Default)]
pub struct MemoryQueueBackend {
    queues: Mutex<HashMap<String, SortedQueue>>,
    bus: ControlBus,
}

impl MemoryQueueBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_queue<T>(&self, queue: &str, f: impl FnOnce(&mut SortedQueue) -> T) -> T {
        let mut queues = self.queues.lock().unwrap_or_else(|e| e.into_inner());
        f(queues.entry(queue.to_string()).or_default())
    }
}

#[async_trait]
impl QueueBackend for MemoryQueueBackend {
    async fn push(&self, queue: &str, entries: Vec<QueueEntry>) -> Result<()> {
        self.with_queue(queue, |q| entries.into_iter().for_each(|e| q.insert(e)));
        Ok(())
    }

    async fn pop_min(&self, queue: &str) -> Result<Option<QueueEntry>> {
        Ok(self.with_queue(queue, SortedQueue::pop_min))
    }

    async fn remove_range_by_score(&self, queue: &str, min: f64, max: f64) -> Result<usize> {
        Ok(self.with_queue(queue, |q| {
            q.remove_where(|score, _| score >= min && score <= max)
        }))
    }

    async fn remove_ident(&self, queue: &str, ident: &str) -> Result<usize> {
        Ok(self.with_queue(queue, |q| q.remove_where(|_, owner| owner == ident)))
    }

    async fn len(&self, queue: &str) -> Result<usize> {
        Ok(self.with_queue(queue, |q| q.by_score.len()))
    }

    async fn publish(&self, queue: &str, notice: ControlNotice) -> Result<()> {
        self.bus.publish(queue, notice);
        Ok(())
    }

    fn subscribe(&self, queue: &str) -> broadcast::Receiver<ControlNotice> {
        self.bus.subscribe(queue)
    }
}

const QUEUE_SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS queue_entries (
    queue  TEXT NOT NULL,
    member TEXT NOT NULL,
    ident  TEXT NOT NULL,
    score  REAL NOT NULL,
    PRIMARY KEY (queue, member)
);
CREATE INDEX IF NOT EXISTS queue_entries_score ON queue_entries (queue, score, member);
CREATE TABLE IF NOT EXISTS queue_notices (
    seq    INTEGER PRIMARY KEY AUTOINCREMENT,
    queue  TEXT NOT NULL,
    notice TEXT NOT NULL
);";

/// Sorted sets persisted in SQLite.
///
/// Entries survive restarts. Control notices are rows of `queue_notices`,
/// so every handle opened on the same file sees them: each handle polls
/// the table for the queues it has subscribers on and fans new rows out
/// to them.
pub struct SqliteQueueBackend {
    connection: Arc<Mutex<Connection>>,
    bus: Arc<ControlBus>,
    pollers: Arc<Mutex<HashSet<String>>>,
}

impl SqliteQueueBackend {
    pub fn open(path: &Path) -> Result<Self> {
        Self::from_connection(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(connection: Connection) -> Result<Self> {
        connection.execute_batch(QUEUE_SCHEMA)?;
        Ok(Self {
            connection: Arc::new(Mutex::new(connection)),
            bus: Arc::new(ControlBus::default()),
            pollers: Arc::new(Mutex::new(HashSet::new())),
        })
    }

    fn connection(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.connection.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Start forwarding stored notices of `queue` unless a poller already runs.
    fn ensure_poller(&self, queue: &str) {
        let mut pollers = self.pollers.lock().unwrap_or_else(|e| e.into_inner());
        if pollers.contains(queue) {
            return;
        }
        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(runtime) => runtime,
            Err(_) => {
                warn!(queue, "no async runtime, notices from other handles will not be delivered");
                return;
            }
        };
        let cursor = match last_notice_seq(&self.connection(), queue) {
            Ok(cursor) => cursor,
            Err(err) => {
                warn!(queue, error = %err, "cannot read control notice cursor");
                return;
            }
        };

        pollers.insert(queue.to_string());
        let poller = NoticePoller {
            queue: queue.to_string(),
            connection: Arc::clone(&self.connection),
            sender: self.bus.sender(queue),
            pollers: Arc::clone(&self.pollers),
        };
        runtime.spawn(poller.run(cursor));
    }
}

fn last_notice_seq(connection: &Connection, queue: &str) -> Result<i64> {
    let seq = connection.query_row(
        "SELECT COALESCE(MAX(seq), 0) FROM queue_notices WHERE queue = ?1",
        params![queue],
        |row| row.get(0),
    )?;
    Ok(seq)
}

/// Forwards notices stored after `cursor` to local subscribers of one queue.
///
/// Stops once the queue has no subscribers left on this handle.
struct NoticePoller {
    queue: String,
    connection: Arc<Mutex<Connection>>,
    sender: broadcast::Sender<ControlNotice>,
    pollers: Arc<Mutex<HashSet<String>>>,
}

impl NoticePoller {
    async fn run(self, mut cursor: i64) {
        debug!(queue = %self.queue, cursor, "notice poller started");
        loop {
            tokio::time::sleep(NOTICE_POLL).await;
            {
                let mut pollers = self.pollers.lock().unwrap_or_else(|e| e.into_inner());
                if self.sender.receiver_count() == 0 {
                    pollers.remove(&self.queue);
                    debug!(queue = %self.queue, "notice poller stopped");
                    return;
                }
            }

            let rows = match self.fetch(cursor) {
                Ok(rows) => rows,
                Err(err) => {
                    warn!(queue = %self.queue, error = %err, "reading control notices failed");
                    continue;
                }
            };
            for (seq, body) in rows {
                cursor = seq;
                match serde_json::from_str::<ControlNotice>(&body) {
                    Ok(notice) => {
                        let _ = self.sender.send(notice);
                    }
                    Err(err) => warn!(queue = %self.queue, seq, error = %err, "skipping undecodable notice"),
                }
            }
        }
    }

    fn fetch(&self, cursor: i64) -> Result<Vec<(i64, String)>> {
        let connection = self.connection.lock().unwrap_or_else(|e| e.into_inner());
        let mut stmt =
            connection.prepare("SELECT seq, notice FROM queue_notices WHERE queue = ?1 AND seq > ?2 ORDER BY seq")?;
        let rows = stmt
            .query_map(params![self.queue, cursor], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }
}

#[async_trait]
impl QueueBackend for SqliteQueueBackend {
    async fn push(&self, queue: &str, entries: Vec<QueueEntry>) -> Result<()> {
        let mut connection = self.connection();
        let tx = connection.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT OR REPLACE INTO queue_entries (queue, member, ident, score) VALUES (?1, ?2, ?3, ?4)",
            )?;
            for entry in &entries {
                stmt.execute(params![queue, entry.payload, entry.ident, entry.score])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    async fn pop_min(&self, queue: &str) -> Result<Option<QueueEntry>> {
        let mut connection = self.connection();
        let tx = connection.transaction()?;
        let entry = tx
            .query_row(
                "SELECT member, ident, score FROM queue_entries WHERE queue = ?1 ORDER BY score, member LIMIT 1",
                params![queue],
                |row| {
                    Ok(QueueEntry {
                        payload: row.get(0)?,
                        ident: row.get(1)?,
                        score: row.get(2)?,
                    })
                },
            )
            .optional()?;
        if let Some(entry) = &entry {
            tx.execute(
                "DELETE FROM queue_entries WHERE queue = ?1 AND member = ?2",
                params![queue, entry.payload],
            )?;
        }
        tx.commit()?;
        Ok(entry)
    }

    async fn remove_range_by_score(&self, queue: &str, min: f64, max: f64) -> Result<usize> {
        let removed = self.connection().execute(
            "DELETE FROM queue_entries WHERE queue = ?1 AND score >= ?2 AND score <= ?3",
            params![queue, min, max],
        )?;
        Ok(removed)
    }

    async fn remove_ident(&self, queue: &str, ident: &str) -> Result<usize> {
        let removed = self.connection().execute(
            "DELETE FROM queue_entries WHERE queue = ?1 AND ident = ?2",
            params![queue, ident],
        )?;
        Ok(removed)
    }

    async fn len(&self, queue: &str) -> Result<usize> {
        let count: i64 = self.connection().query_row(
            "SELECT COUNT(*) FROM queue_entries WHERE queue = ?1",
            params![queue],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    async fn publish(&self, queue: &str, notice: ControlNotice) -> Result<()> {
        let body = serde_json::to_string(&notice)?;
        let connection = self.connection();
        connection.execute(
            "INSERT INTO queue_notices (queue, notice) VALUES (?1, ?2)",
            params![queue, body],
        )?;
        let seq = connection.last_insert_rowid();
        connection.execute(
            "DELETE FROM queue_notices WHERE queue = ?1 AND seq <= ?2",
            params![queue, seq - NOTICE_RETENTION],
        )?;
        debug!(queue, ?notice, seq, "control notice stored");
        Ok(())
    }

    fn subscribe(&self, queue: &str) -> broadcast::Receiver<ControlNotice> {
        let receiver = self.bus.subscribe(queue);
        self.ensure_poller(queue);
        receiver
    }
}

/// Producer side of a queue, used by the emit pipeline.
#[derive(Clone)]
pub struct Enqueuer {
    backend: Arc<dyn QueueBackend>,
}

impl Enqueuer {
    pub fn new(backend: Arc<dyn QueueBackend>) -> Self {
        Self { backend }
    }

    /// Replace everything enqueued under `ident` with `entries`, then
    /// notify the queue so stale entries get trimmed and an in-flight
    /// copy of the old schedule is discarded.
    pub async fn enqueue(&self, queue: &str, ident: &str, entries: Vec<(f64, String)>) -> Result<usize> {
        validate_queue_name(queue)?;
        let removed = self.backend.remove_ident(queue, ident).await?;
        let count = entries.len();
        let entries = entries
            .into_iter()
            .map(|(score, payload)| QueueEntry::new(ident, score, payload))
            .collect();
        self.backend.push(queue, entries).await?;
        self.backend.publish(queue, rescheduled(ident)).await?;
        debug!(queue, ident, removed, added = count, "enqueued");
        Ok(count)
    }

    /// Remove everything enqueued under `ident`.
    pub async fn dequeue(&self, queue: &str, ident: &str) -> Result<usize> {
        validate_queue_name(queue)?;
        let removed = self.backend.remove_ident(queue, ident).await?;
        self.backend.publish(queue, rescheduled(ident)).await?;
        debug!(queue, ident, removed, "dequeued");
        Ok(removed)
    }
}

fn rescheduled(ident: &str) -> ControlNotice {
    ControlNotice::Rescheduled {
        ident: ident.to_string(),
    }
}
