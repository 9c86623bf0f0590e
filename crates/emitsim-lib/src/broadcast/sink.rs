//! Destinations for delivered queue entries.

use std::io::{ErrorKind, Write};
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::queue::QueueEntry;
use crate::error::{Error, Result};

/// Receives each entry at its emission time.
///
/// A failing sink stops the broadcaster.
#[async_trait]
pub trait MessageSink: Send + Sync {
    async fn send(&self, queue: &str, entry: &QueueEntry) -> Result<()>;
}

/// Forwards entries to an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<QueueEntry>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<QueueEntry>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait]
impl MessageSink for ChannelSink {
    async fn send(&self, _queue: &str, entry: &QueueEntry) -> Result<()> {
        self.tx.send(entry.clone()).map_err(|_| {
            Error::Io(std::io::Error::new(
                ErrorKind::BrokenPipe,
                "broadcast receiver dropped",
            ))
        })
    }
}

/// Writes one payload per line.
pub struct WriterSink<W: Write + Send> {
    writer: Mutex<W>,
}

impl<W: Write + Send> WriterSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    pub fn into_inner(self) -> W {
        self.writer.into_inner().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl<W: Write + Send> MessageSink for WriterSink<W> {
    async fn send(&self, _queue: &str, entry: &QueueEntry) -> Result<()> {
        let mut writer = self.writer.lock().unwrap_or_else(|e| e.into_inner());
        writeln!(writer, "{}", entry.payload)?;
        writer.flush()?;
        Ok(())
    }
}
