//! Scheduling messages on a queue and replaying them.

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Args;
use emitsim_cli::output::{render_stats, OutputFormat};
use emitsim_lib::broadcast::epoch_seconds;
use emitsim_lib::{
    BroadcastConfig, Broadcaster, Enqueuer, QueueDefinition, SqliteQueueBackend, WriterSink,
};
use serde::Deserialize;
use tracing::info;

/// Arguments for the enqueue command.
#[derive(Args, Debug, Clone)]
pub struct EnqueueArgs {
    /// SQLite database holding the queues.
    #[arg(long)]
    pub db: PathBuf,
    /// Queue name.
    #[arg(long)]
    pub queue: String,
    /// Owner of the messages; enqueuing again replaces them.
    #[arg(long)]
    pub ident: String,
    /// JSON lines file of `{"ts": "<RFC 3339>", "payload": ...}` records.
    #[arg(long, required_unless_present = "remove")]
    pub file: Option<PathBuf>,
    /// Remove every message of `--ident` instead.
    #[arg(long, conflicts_with = "file")]
    pub remove: bool,
}

/// Arguments for the broadcast command.
#[derive(Args, Debug, Clone)]
pub struct BroadcastArgs {
    /// SQLite database holding the queues.
    #[arg(long)]
    pub db: PathBuf,
    /// Queue name.
    #[arg(long)]
    pub queue: String,
    /// Time compression factor; overrides `broadcast.speed`.
    #[arg(long)]
    pub speed: Option<f64>,
    /// Virtual start time (RFC 3339); overrides `broadcast.start_time`.
    #[arg(long)]
    pub start: Option<DateTime<Utc>>,
    /// Stop after this many real seconds instead of waiting for Ctrl-C.
    #[arg(long)]
    pub duration: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct ScheduledMessage {
    ts: DateTime<Utc>,
    payload: serde_json::Value,
}

impl ScheduledMessage {
    fn into_entry(self) -> (f64, String) {
        let payload = match self.payload {
            serde_json::Value::String(text) => text,
            other => other.to_string(),
        };
        (epoch_seconds(self.ts), payload)
    }
}

fn read_messages(path: &Path) -> Result<Vec<(f64, String)>> {
    let file = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    let mut entries = Vec::new();
    for (index, line) in BufReader::new(file).lines().enumerate() {
        let line = line.with_context(|| format!("failed to read {}", path.display()))?;
        if line.trim().is_empty() {
            continue;
        }
        let message: ScheduledMessage = serde_json::from_str(&line)
            .with_context(|| format!("{}:{}: invalid message", path.display(), index + 1))?;
        entries.push(message.into_entry());
    }
    Ok(entries)
}

fn open_backend(path: &Path) -> Result<Arc<SqliteQueueBackend>> {
    let backend = SqliteQueueBackend::open(path)
        .with_context(|| format!("failed to open queue database {}", path.display()))?;
    Ok(Arc::new(backend))
}

/// Handle the enqueue subcommand.
pub async fn handle_enqueue_command(args: &EnqueueArgs) -> Result<()> {
    let enqueuer = Enqueuer::new(open_backend(&args.db)?);

    match &args.file {
        Some(file) if !args.remove => {
            let entries = read_messages(file)?;
            let count = enqueuer.enqueue(&args.queue, &args.ident, entries).await?;
            println!("enqueued {count} messages for {} on {}", args.ident, args.queue);
        }
        _ => {
            let removed = enqueuer.dequeue(&args.queue, &args.ident).await?;
            println!("removed {removed} messages for {} from {}", args.ident, args.queue);
        }
    }
    Ok(())
}

/// Handle the broadcast subcommand.
///
/// Payloads go to stdout one per line; the run summary goes to stderr.
pub async fn handle_broadcast_command(
    args: &BroadcastArgs,
    config: &BroadcastConfig,
    format: OutputFormat,
) -> Result<()> {
    let definition = QueueDefinition::new(
        &args.queue,
        args.speed.unwrap_or(config.speed),
        args.start.or(config.start_time),
    )?;
    let sink = Arc::new(WriterSink::new(io::stdout()));
    let handle = Broadcaster::new(definition, open_backend(&args.db)?, sink, config.clone())
        .start()
        .await
        .context("failed to start broadcaster")?;

    let limit = async {
        match args.duration {
            Some(secs) => tokio::time::sleep(Duration::from_secs_f64(secs.max(0.0))).await,
            None => std::future::pending::<()>().await,
        }
    };
    tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal.context("failed to listen for Ctrl-C")?;
            info!(queue = %args.queue, "interrupted");
        }
        _ = handle.stopped() => {}
        _ = limit => {}
    }

    let stats = handle.shutdown().await.context("broadcaster stopped with an error")?;
    let mut stderr = io::stderr().lock();
    render_stats(&mut stderr, &stats, format)
}
