//! Partition queues and their consumer tasks.
//!
//! Every (topic, partition) pair owns one bounded multi-producer channel
//! and exactly one consumer task. Because a partition has a single
//! consumer, offsets and byte ranges are assigned serially within the
//! partition, which alone guarantees dense offsets and contiguous,
//! non-overlapping byte ranges regardless of how the writers batch.
//!
//! The consumer stamps each dequeued message in a fixed order: offset,
//! then timestamp (both acknowledged to the producer if requested), then
//! the log line and its byte range, then one enqueue on each global
//! writer. Coordinator failures inside the consumer cannot be surfaced
//! to the producer; they are logged and the message is dropped.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use timber_coordinator::{offset_key, OffsetCoordinator};
use timber_core::{IndexRecord, LogRecord, Offset, PartitionIndex, Timestamp};
use timber_topic::TopicLayout;
use tokio::fs;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::writer::WriterHandle;

/// The stamp a queue consumer committed to a record pair, reported back
/// to a producer that asked for an acknowledgment.
///
/// Both values are exactly what the log and index records carry; the
/// facade must not resample the clock for its metadata.
#[derive(Debug, Clone, Copy)]
pub(crate) struct CommitAck {
    /// Assigned offset.
    pub offset: Offset,
    /// Timestamp written into both records.
    pub timestamp: Timestamp,
}

/// A message accepted by the facade, awaiting its stamp.
pub(crate) struct PendingMessage {
    /// Serialized payload (compact JSON, newline-free).
    pub payload: String,
    /// Optional channel on which the committed stamp is reported.
    pub ack: Option<oneshot::Sender<CommitAck>>,
}

/// What travels through a partition queue.
pub(crate) enum Envelope {
    /// A message to stamp and forward to the writers.
    Message(PendingMessage),
    /// Acknowledged once every earlier envelope has been forwarded.
    Barrier(oneshot::Sender<()>),
}

type QueueKey = (String, u32);

/// The registry of partition queues and their consumer tasks.
pub(crate) struct PartitionPipeline {
    coordinator: Arc<dyn OffsetCoordinator>,
    log_writer: WriterHandle,
    index_writer: WriterHandle,
    layout: TopicLayout,
    queue_capacity: usize,
    queues: Mutex<HashMap<QueueKey, mpsc::Sender<Envelope>>>,
    consumers: Mutex<Vec<JoinHandle<()>>>,
}

impl PartitionPipeline {
    pub(crate) fn new(
        coordinator: Arc<dyn OffsetCoordinator>,
        log_writer: WriterHandle,
        index_writer: WriterHandle,
        layout: TopicLayout,
        queue_capacity: usize,
    ) -> Self {
        Self {
            coordinator,
            log_writer,
            index_writer,
            layout,
            queue_capacity,
            queues: Mutex::new(HashMap::new()),
            consumers: Mutex::new(Vec::new()),
        }
    }

    /// Creates the queues and consumer tasks for a topic's partitions.
    ///
    /// Idempotent: partitions that already have a queue are left alone.
    /// For partitions with existing data the offset counter resumes from
    /// the last index record and the byte position from the log length,
    /// so a restarted broker keeps offsets dense and ranges contiguous.
    pub(crate) async fn init_queues(
        &self,
        topic: &str,
        partitions: u32,
    ) -> Result<(), timber_coordinator::CoordinatorError> {
        let mut queues = self.queues.lock().await;
        let mut consumers = self.consumers.lock().await;

        for i in 0..partitions {
            let key = (topic.to_string(), i);
            if queues.contains_key(&key) {
                continue;
            }
            let partition = PartitionIndex::new(i);

            let log_path = self.layout.log_path(topic, partition);
            let index_path = self.layout.index_path(topic, partition);

            let (last_offset, log_len) = recover_partition_state(&log_path, &index_path).await;
            self.coordinator
                .seed(&offset_key(topic, i), last_offset)
                .await?;

            let (tx, rx) = mpsc::channel(self.queue_capacity);
            let consumer = QueueConsumer {
                topic: topic.to_string(),
                partition,
                offset_key: offset_key(topic, i),
                coordinator: Arc::clone(&self.coordinator),
                log_writer: self.log_writer.clone(),
                index_writer: self.index_writer.clone(),
                log_path,
                index_path,
                cumulative_bytes: log_len,
            };
            consumers.push(tokio::spawn(consumer.run(rx)));
            queues.insert(key, tx);

            debug!(
                topic = %topic,
                partition = i,
                resumed_offset = last_offset,
                resumed_bytes = log_len,
                "Partition queue initialized"
            );
        }

        info!(topic = %topic, partitions, "Queues ready");
        Ok(())
    }

    /// Returns the sender for a partition queue, if one exists.
    pub(crate) async fn sender(
        &self,
        topic: &str,
        partition: u32,
    ) -> Option<mpsc::Sender<Envelope>> {
        let queues = self.queues.lock().await;
        queues.get(&(topic.to_string(), partition)).cloned()
    }

    /// Waits until every queue has forwarded everything enqueued so far.
    pub(crate) async fn barrier(&self) {
        let senders: Vec<mpsc::Sender<Envelope>> = {
            let queues = self.queues.lock().await;
            queues.values().cloned().collect()
        };

        let mut acks = Vec::with_capacity(senders.len());
        for sender in senders {
            let (tx, rx) = oneshot::channel();
            if sender.send(Envelope::Barrier(tx)).await.is_ok() {
                acks.push(rx);
            }
        }
        for ack in acks {
            let _ = ack.await;
        }
    }

    /// Closes every queue and waits for the consumers to drain.
    pub(crate) async fn shutdown(&self) {
        self.queues.lock().await.clear();

        let mut consumers = self.consumers.lock().await;
        for handle in consumers.drain(..) {
            if let Err(e) = handle.await {
                warn!(error = %e, "Queue consumer task panicked");
            }
        }
    }
}

/// Reads back a partition's on-disk position: the offset of its last
/// index record and the byte length of its log file.
///
/// A fresh partition (or one whose index holds only the header line)
/// resumes from offset 0 and byte 0.
async fn recover_partition_state(log_path: &Path, index_path: &Path) -> (u64, u64) {
    let log_len = fs::metadata(log_path).await.map_or(0, |m| m.len());

    let last_offset = match fs::read_to_string(index_path).await {
        Ok(contents) => contents
            .lines()
            .rev()
            .find_map(|line| IndexRecord::parse(line).ok())
            .map_or(0, |record| record.offset.get()),
        Err(_) => 0,
    };

    (last_offset, log_len)
}

/// The single consumer for one partition's queue.
struct QueueConsumer {
    topic: String,
    partition: PartitionIndex,
    offset_key: String,
    coordinator: Arc<dyn OffsetCoordinator>,
    log_writer: WriterHandle,
    index_writer: WriterHandle,
    log_path: PathBuf,
    index_path: PathBuf,
    /// Byte position at the end of the last stamped record. Owned by
    /// this task, so range assignment is serial by construction.
    cumulative_bytes: u64,
}

impl QueueConsumer {
    async fn run(mut self, mut rx: mpsc::Receiver<Envelope>) {
        debug!(topic = %self.topic, partition = %self.partition, "Queue consumer started");

        while let Some(envelope) = rx.recv().await {
            match envelope {
                Envelope::Message(message) => self.process(message).await,
                Envelope::Barrier(reply) => {
                    let _ = reply.send(());
                }
            }
        }

        debug!(topic = %self.topic, partition = %self.partition, "Queue consumer stopped");
    }

    /// Stamps one message and forwards its two record lines.
    async fn process(&mut self, message: PendingMessage) {
        let offset = match self.coordinator.next(&self.offset_key).await {
            Ok(value) => Offset::new(value),
            Err(e) => {
                error!(
                    topic = %self.topic,
                    partition = %self.partition,
                    error = %e,
                    "Offset assignment failed, dropping message"
                );
                return;
            }
        };

        let timestamp = Timestamp::now();
        if let Some(ack) = message.ack {
            let _ = ack.send(CommitAck { offset, timestamp });
        }

        let record = match LogRecord::new(timestamp, self.partition, offset, message.payload) {
            Ok(record) => record,
            Err(e) => {
                // The facade rejects newline payloads before enqueue.
                error!(
                    topic = %self.topic,
                    partition = %self.partition,
                    offset = %offset,
                    error = %e,
                    "Unstorable payload, dropping message"
                );
                return;
            }
        };

        let line = record.encode();
        let start_byte = self.cumulative_bytes;
        let end_byte = start_byte + line.len() as u64;
        self.cumulative_bytes = end_byte;

        let index = IndexRecord::new(timestamp, start_byte, end_byte, offset);

        if let Err(e) = self
            .log_writer
            .append(self.log_path.clone(), Bytes::from(line))
            .await
        {
            error!(
                topic = %self.topic,
                partition = %self.partition,
                offset = %offset,
                error = %e,
                "Log writer rejected entry"
            );
            return;
        }
        if let Err(e) = self
            .index_writer
            .append(self.index_path.clone(), Bytes::from(index.encode()))
            .await
        {
            error!(
                topic = %self.topic,
                partition = %self.partition,
                offset = %offset,
                error = %e,
                "Index writer rejected entry"
            );
        }
    }
}
