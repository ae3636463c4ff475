//! Global writer: batched appends to log and index files.
//!
//! Two writer singletons run per broker, identical in structure: one owns
//! every log file, the other every index file. Each is an actor draining
//! a command channel, grouping entries by target file, and flushing a
//! file's batch when it reaches the configured size or on the periodic
//! tick, whichever comes first.
//!
//! ```text
//! consumer(t, 0) ──┐
//!                  │     ┌────────────┐   append   ┌──────────────┐
//! consumer(t, 1) ──┼────►│ log writer │───────────►│ <t>-<p>.log  │
//!                  │     └────────────┘  (batched) └──────────────┘
//! consumer(u, 0) ──┘
//! ```
//!
//! For one file, entries are appended in enqueue order. Across files
//! there is no ordering. File handles open lazily in append-create mode
//! and stay open for the writer's lifetime. Failures are logged and the
//! affected batch dropped; the writer keeps serving other files.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use bytes::Bytes;
use thiserror::Error;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info};

/// Which record stream a writer owns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriterKind {
    /// Log-file appends.
    Log,
    /// Index-file appends.
    Index,
}

impl WriterKind {
    /// Label used in logging.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Log => "log",
            Self::Index => "index",
        }
    }
}

/// The writer this entry was bound for has shut down.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("{kind:?} writer has shut down")]
pub struct WriterClosed {
    /// Which writer refused the entry.
    pub kind: WriterKind,
}

/// Configuration for a global writer.
#[derive(Debug, Clone, Copy)]
pub struct WriterConfig {
    /// Flush a file's batch when it reaches this many entries.
    pub batch_size: usize,
    /// Flush every non-empty batch at this interval.
    pub tick: Duration,
    /// Whether a flush also fsyncs the file.
    pub sync_on_flush: bool,
    /// Command channel capacity.
    pub channel_capacity: usize,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            batch_size: 200,
            tick: Duration::from_millis(5),
            sync_on_flush: false,
            channel_capacity: 10_000,
        }
    }
}

/// Commands accepted by a writer task.
enum WriterCommand {
    /// Append one entry to the batch for `path`.
    Append { path: PathBuf, entry: Bytes },
    /// Flush every pending batch, then acknowledge.
    Flush { reply: oneshot::Sender<()> },
    /// Drain the channel, flush everything, acknowledge, and exit.
    Shutdown { reply: oneshot::Sender<()> },
}

/// Handle for enqueuing entries on a writer.
#[derive(Debug, Clone)]
pub struct WriterHandle {
    kind: WriterKind,
    tx: mpsc::Sender<WriterCommand>,
}

impl WriterHandle {
    /// Enqueues `entry` for appending to `path`.
    ///
    /// Applies backpressure when the writer's channel is full.
    ///
    /// # Errors
    /// Returns [`WriterClosed`] if the writer has shut down.
    pub async fn append(&self, path: PathBuf, entry: Bytes) -> Result<(), WriterClosed> {
        self.tx
            .send(WriterCommand::Append { path, entry })
            .await
            .map_err(|_| WriterClosed { kind: self.kind })
    }

    /// Flushes every pending batch and waits for the acknowledgment.
    ///
    /// # Errors
    /// Returns [`WriterClosed`] if the writer has shut down.
    pub async fn flush(&self) -> Result<(), WriterClosed> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(WriterCommand::Flush { reply: reply_tx })
            .await
            .map_err(|_| WriterClosed { kind: self.kind })?;
        reply_rx.await.map_err(|_| WriterClosed { kind: self.kind })
    }

    /// Asks the writer to drain, flush, and exit; waits for completion.
    pub async fn shutdown(&self) {
        let (reply_tx, reply_rx) = oneshot::channel();
        if self
            .tx
            .send(WriterCommand::Shutdown { reply: reply_tx })
            .await
            .is_ok()
        {
            let _ = reply_rx.await;
        }
    }
}

/// Spawns a global writer task and returns its handle.
#[must_use]
pub fn spawn_writer(kind: WriterKind, config: WriterConfig) -> WriterHandle {
    let (tx, rx) = mpsc::channel(config.channel_capacity);

    let task = WriterTask {
        kind,
        config,
        files: HashMap::new(),
        pending: HashMap::new(),
    };
    tokio::spawn(task.run(rx));

    WriterHandle { kind, tx }
}

/// State owned exclusively by a writer task.
struct WriterTask {
    kind: WriterKind,
    config: WriterConfig,
    /// Open file handles, one per target path, kept for the task's life.
    files: HashMap<PathBuf, BufWriter<File>>,
    /// Entries accumulated per path since the last flush.
    pending: HashMap<PathBuf, Vec<Bytes>>,
}

impl WriterTask {
    async fn run(mut self, mut rx: mpsc::Receiver<WriterCommand>) {
        info!(
            writer = self.kind.as_str(),
            batch_size = self.config.batch_size,
            tick_ms = self.config.tick.as_millis() as u64,
            "Writer started"
        );

        let mut tick = tokio::time::interval(self.config.tick);
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                command = rx.recv() => match command {
                    Some(WriterCommand::Append { path, entry }) => {
                        let batch = self.pending.entry(path.clone()).or_default();
                        batch.push(entry);
                        if batch.len() >= self.config.batch_size {
                            self.flush_path(&path).await;
                        }
                    }
                    Some(WriterCommand::Flush { reply }) => {
                        self.flush_all().await;
                        let _ = reply.send(());
                    }
                    Some(WriterCommand::Shutdown { reply }) => {
                        self.drain(&mut rx);
                        self.flush_all().await;
                        let _ = reply.send(());
                        break;
                    }
                    None => {
                        self.flush_all().await;
                        break;
                    }
                },
                _ = tick.tick() => {
                    self.flush_all().await;
                }
            }
        }

        info!(writer = self.kind.as_str(), "Writer stopped");
    }

    /// Moves every command already sitting in the channel into the
    /// pending batches so shutdown loses nothing that was enqueued.
    fn drain(&mut self, rx: &mut mpsc::Receiver<WriterCommand>) {
        while let Ok(command) = rx.try_recv() {
            match command {
                WriterCommand::Append { path, entry } => {
                    self.pending.entry(path).or_default().push(entry);
                }
                WriterCommand::Flush { reply } | WriterCommand::Shutdown { reply } => {
                    let _ = reply.send(());
                }
            }
        }
    }

    async fn flush_all(&mut self) {
        let paths: Vec<PathBuf> = self
            .pending
            .iter()
            .filter(|(_, batch)| !batch.is_empty())
            .map(|(path, _)| path.clone())
            .collect();
        for path in paths {
            self.flush_path(&path).await;
        }
    }

    /// Writes one path's pending batch through its buffered appender.
    ///
    /// On open or write failure the batch is dropped and the writer keeps
    /// running; only the entries for this path in this batch are lost.
    async fn flush_path(&mut self, path: &Path) {
        let Some(entries) = self.pending.remove(path) else {
            return;
        };
        if entries.is_empty() {
            return;
        }
        let count = entries.len();

        let writer = match self.files.entry(path.to_path_buf()) {
            Entry::Occupied(occupied) => occupied.into_mut(),
            Entry::Vacant(vacant) => match open_append(path).await {
                Ok(file) => vacant.insert(BufWriter::new(file)),
                Err(e) => {
                    error!(
                        writer = self.kind.as_str(),
                        path = %path.display(),
                        error = %e,
                        dropped = count,
                        "Failed to open file, dropping batch"
                    );
                    return;
                }
            },
        };

        for entry in &entries {
            if let Err(e) = writer.write_all(entry).await {
                error!(
                    writer = self.kind.as_str(),
                    path = %path.display(),
                    error = %e,
                    dropped = count,
                    "Write failed, abandoning batch"
                );
                return;
            }
        }

        if let Err(e) = writer.flush().await {
            error!(
                writer = self.kind.as_str(),
                path = %path.display(),
                error = %e,
                dropped = count,
                "Flush failed, abandoning batch"
            );
            return;
        }

        if self.config.sync_on_flush {
            if let Err(e) = writer.get_ref().sync_all().await {
                error!(
                    writer = self.kind.as_str(),
                    path = %path.display(),
                    error = %e,
                    "Fsync failed"
                );
                return;
            }
        }

        debug!(
            writer = self.kind.as_str(),
            path = %path.display(),
            entries = count,
            "Flushed batch"
        );
    }
}

async fn open_append(path: &Path) -> std::io::Result<File> {
    let mut options = OpenOptions::new();
    options.append(true).create(true);
    #[cfg(unix)]
    options.mode(0o666);
    options.open(path).await
}
