//! The broker handle and producer facade.
//!
//! All process-wide state (the queue registry, the two global writers,
//! the topic caches, the coordinator client) hangs off an explicit
//! [`Broker`] value with a start/shutdown lifecycle instead of leaking as
//! globals.

use std::sync::Arc;

use serde::Serialize;
use timber_coordinator::OffsetCoordinator;
use timber_core::{partition_for_key, Limits, Timestamp};
use timber_topic::{TopicConfig, TopicLayout, TopicManager, TopicManagerConfig};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::BrokerConfig;
use crate::error::{BrokerError, BrokerResult};
use crate::queue::{CommitAck, Envelope, PartitionPipeline, PendingMessage};
use crate::writer::{spawn_writer, WriterConfig, WriterHandle, WriterKind};

/// How much of the write path a produce call waits for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Ack {
    /// Return as soon as the message is owned by its partition queue.
    /// The metadata carries the `-1` offset sentinel.
    #[default]
    None,
    /// Wait for the queue consumer to assign the offset and return it.
    Offset,
}

/// Metadata returned to the producer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProduceMetadata {
    /// Assigned offset, or `-1` when the produce was accepted for
    /// asynchronous commit without an offset acknowledgment.
    pub offset: i64,
    /// Partition the key routed to.
    pub partition: u32,
    /// Nanoseconds since the Unix epoch. With [`Ack::Offset`] this is the
    /// timestamp written into the committed log and index records; with
    /// [`Ack::None`] it is the acceptance time.
    pub timestamp: u64,
}

/// A running broker: topic manager, partition queues, and both global
/// writers.
pub struct Broker {
    config: BrokerConfig,
    limits: Limits,
    topics: TopicManager,
    pipeline: PartitionPipeline,
    log_writer: WriterHandle,
    index_writer: WriterHandle,
}

impl Broker {
    /// Starts a broker: spawns the global writers and initializes queues
    /// for every topic already on disk.
    ///
    /// # Errors
    /// Returns an error if the configuration is invalid or existing
    /// topics cannot be enumerated.
    pub async fn start(
        config: BrokerConfig,
        coordinator: Arc<dyn OffsetCoordinator>,
    ) -> BrokerResult<Self> {
        config
            .validate()
            .map_err(|message| BrokerError::Config { message })?;

        let layout = TopicLayout::new(&config.base_dir);
        let topics = TopicManager::new(
            layout.clone(),
            TopicManagerConfig {
                config_ttl: config.config_ttl,
                exists_ttl: config.exists_ttl,
            },
        );

        let writer_config = WriterConfig {
            batch_size: config.writer_batch_size,
            tick: config.writer_tick,
            sync_on_flush: config.sync_on_flush,
            channel_capacity: config.queue_capacity,
        };
        let log_writer = spawn_writer(WriterKind::Log, writer_config);
        let index_writer = spawn_writer(WriterKind::Index, writer_config);

        let pipeline = PartitionPipeline::new(
            Arc::clone(&coordinator),
            log_writer.clone(),
            index_writer.clone(),
            layout,
            config.queue_capacity,
        );

        let broker = Self {
            config,
            limits: Limits::new(),
            topics,
            pipeline,
            log_writer,
            index_writer,
        };

        // Re-arm queues for topics that already exist on disk.
        for topic in broker.topics.list_topics().await? {
            match broker.topics.load_config(&topic).await {
                Ok(topic_config) => {
                    broker
                        .pipeline
                        .init_queues(&topic, topic_config.num_partitions)
                        .await?;
                }
                Err(e) => {
                    warn!(topic = %topic, error = %e, "Skipping topic with unreadable config");
                }
            }
        }

        info!(
            base_dir = %broker.config.base_dir.display(),
            queue_capacity = broker.config.queue_capacity,
            writer_batch_size = broker.config.writer_batch_size,
            "Broker started"
        );

        Ok(broker)
    }

    /// Returns the topic manager.
    #[must_use]
    pub fn topics(&self) -> &TopicManager {
        &self.topics
    }

    /// Creates a topic and arms its partition queues.
    ///
    /// # Errors
    /// Propagates validation and filesystem errors from the topic
    /// manager; see [`TopicError`](timber_topic::TopicError).
    pub async fn create_topic(&self, name: &str, config: &TopicConfig) -> BrokerResult<()> {
        self.topics.create_topic(name, config).await?;
        self.pipeline
            .init_queues(name, config.num_partitions)
            .await?;
        Ok(())
    }

    /// Produces a message to `topic`, routed by `key`.
    ///
    /// The message is serialized to compact JSON and enqueued on the
    /// partition's queue. With [`Ack::None`] the call returns as soon as
    /// the queue owns the message; with [`Ack::Offset`] it waits for the
    /// committed stamp: the assigned offset and the timestamp written
    /// into the record pair. Enqueueing blocks under backpressure until
    /// the queue has room or `token` is cancelled; cancellation after
    /// the message is enqueued has no effect.
    ///
    /// # Errors
    /// - [`BrokerError::TopicNotFound`] if no topic directory exists
    /// - [`BrokerError::SerializationFailed`] for unserializable or
    ///   oversized messages
    /// - [`BrokerError::QueueMissing`] if the partition has no queue
    /// - [`BrokerError::Cancelled`] if `token` fires while blocked
    /// - [`BrokerError::AckDropped`] / [`BrokerError::AckTimeout`] when an
    ///   offset acknowledgment was requested but never arrived
    pub async fn produce<T: Serialize + ?Sized>(
        &self,
        topic: &str,
        key: &str,
        message: &T,
        ack: Ack,
        token: &CancellationToken,
    ) -> BrokerResult<ProduceMetadata> {
        if !self.topics.topic_exists(topic).await {
            return Err(BrokerError::TopicNotFound {
                topic: topic.to_string(),
            });
        }

        let topic_config = self.topics.load_config(topic).await?;
        let partition = partition_for_key(key, topic_config.num_partitions);

        let payload =
            serde_json::to_string(message).map_err(|e| BrokerError::SerializationFailed {
                message: e.to_string(),
            })?;
        if payload.len() > self.limits.payload_size_bytes_max as usize {
            return Err(BrokerError::SerializationFailed {
                message: format!(
                    "payload of {} bytes exceeds maximum {}",
                    payload.len(),
                    self.limits.payload_size_bytes_max
                ),
            });
        }
        // JSON string escaping keeps newlines out of compact output; a
        // raw newline here would corrupt the line-framed log format.
        if payload.contains('\n') {
            return Err(BrokerError::SerializationFailed {
                message: "payload contains a literal newline".to_string(),
            });
        }

        let sender = self
            .pipeline
            .sender(topic, partition.get())
            .await
            .ok_or_else(|| BrokerError::QueueMissing {
                topic: topic.to_string(),
                partition: partition.get(),
            })?;

        let (ack_tx, ack_rx) = match ack {
            Ack::None => (None, None),
            Ack::Offset => {
                let (tx, rx) = oneshot::channel();
                (Some(tx), Some(rx))
            }
        };

        let envelope = Envelope::Message(PendingMessage {
            payload,
            ack: ack_tx,
        });

        tokio::select! {
            biased;
            () = token.cancelled() => {
                return Err(BrokerError::Cancelled);
            }
            sent = sender.send(envelope) => {
                if sent.is_err() {
                    return Err(BrokerError::QueueMissing {
                        topic: topic.to_string(),
                        partition: partition.get(),
                    });
                }
            }
        }

        match ack_rx {
            None => Ok(ProduceMetadata {
                offset: -1,
                partition: partition.get(),
                timestamp: Timestamp::now().as_nanos(),
            }),
            // The consumer reports the stamp it actually committed; the
            // metadata must not resample the clock here.
            Some(rx) => match tokio::time::timeout(self.config.ack_timeout, rx).await {
                Ok(Ok(CommitAck { offset, timestamp })) => {
                    // Offsets stay far below i64::MAX.
                    #[allow(clippy::cast_possible_wrap)]
                    let assigned = offset.get() as i64;
                    Ok(ProduceMetadata {
                        offset: assigned,
                        partition: partition.get(),
                        timestamp: timestamp.as_nanos(),
                    })
                }
                Ok(Err(_)) => Err(BrokerError::AckDropped),
                Err(_) => {
                    #[allow(clippy::cast_possible_truncation)]
                    let waited_ms = self.config.ack_timeout.as_millis() as u64;
                    Err(BrokerError::AckTimeout { waited_ms })
                }
            },
        }
    }

    /// Drains the whole write path: waits for every queue consumer to
    /// forward what it has, then flushes both writers to disk.
    pub async fn flush(&self) {
        self.pipeline.barrier().await;
        let _ = self.log_writer.flush().await;
        let _ = self.index_writer.flush().await;
    }

    /// Stops the broker: closes the queues, waits for the consumers to
    /// drain, and shuts both writers down after a final flush.
    pub async fn shutdown(self) {
        self.pipeline.shutdown().await;
        self.log_writer.shutdown().await;
        self.index_writer.shutdown().await;
        info!("Broker stopped");
    }
}
