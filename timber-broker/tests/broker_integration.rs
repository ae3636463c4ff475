//! End-to-end tests for the produce pipeline: facade through partition
//! queues and global writers down to the on-disk log and index files.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;
use timber_broker::{Ack, Broker, BrokerConfig, BrokerError};
use timber_coordinator::{
    CoordinatorResult, LocalCoordinator, MemoryKvStore, OffsetCoordinator,
};
use timber_core::{IndexRecord, LogRecord};
use timber_topic::{TopicConfig, TopicError};
use tokio_util::sync::CancellationToken;

async fn start_broker(dir: &TempDir) -> Broker {
    Broker::start(
        BrokerConfig::new(dir.path()).with_writer_tick(Duration::from_millis(1)),
        Arc::new(LocalCoordinator::new()),
    )
    .await
    .unwrap()
}

fn read_index(broker: &Broker, topic: &str, partition: u32) -> Vec<IndexRecord> {
    let path = broker
        .topics()
        .layout()
        .index_path(topic, partition.into());
    let contents = std::fs::read_to_string(path).unwrap();
    let mut lines = contents.lines();

    // First line is the human-readable header, not data.
    assert_eq!(lines.next().unwrap(), "timestamp--start--end--offset");

    lines.map(|line| IndexRecord::parse(line).unwrap()).collect()
}

fn read_log(broker: &Broker, topic: &str, partition: u32) -> Vec<u8> {
    let path = broker.topics().layout().log_path(topic, partition.into());
    std::fs::read(path).unwrap()
}

/// Asserts offsets 1..=expected with contiguous ranges covering the log.
fn assert_dense(records: &[IndexRecord], expected: u64, log: &[u8]) {
    assert_eq!(records.len() as u64, expected);
    let mut next_start = 0;
    for (i, record) in records.iter().enumerate() {
        assert_eq!(record.offset.get(), i as u64 + 1, "offset gap at {i}");
        assert_eq!(record.start_byte, next_start, "range gap at offset {}", i + 1);
        assert!(record.end_byte > record.start_byte);
        next_start = record.end_byte;
    }
    assert_eq!(next_start, log.len() as u64, "ranges must cover the log file");
}

#[tokio::test]
async fn test_single_partition_ordering() {
    let dir = TempDir::new().unwrap();
    let broker = start_broker(&dir).await;
    let token = CancellationToken::new();

    broker
        .create_topic("t1", &TopicConfig::new(1))
        .await
        .unwrap();

    for i in 0..1000 {
        broker
            .produce("t1", "k", &format!("m-{i}"), Ack::None, &token)
            .await
            .unwrap();
    }
    broker.flush().await;

    let records = read_index(&broker, "t1", 0);
    let log = read_log(&broker, "t1", 0);
    assert_dense(&records, 1000, &log);

    // Every index range decodes to exactly its log record, with the
    // same timestamp and offset on both sides.
    for record in &records {
        let slice = &log[record.start_byte as usize..record.end_byte as usize];
        let line = std::str::from_utf8(slice).unwrap();
        assert!(line.ends_with('\n'));

        let parsed = LogRecord::parse(line).unwrap();
        assert_eq!(parsed.timestamp, record.timestamp);
        assert_eq!(parsed.offset, record.offset);
        assert_eq!(parsed.partition.get(), 0);
    }

    // Payloads arrive in produce order.
    let first = &log[records[0].start_byte as usize..records[0].end_byte as usize];
    let parsed = LogRecord::parse(std::str::from_utf8(first).unwrap()).unwrap();
    assert_eq!(parsed.payload, "\"m-0\"");

    broker.shutdown().await;
}

#[tokio::test]
async fn test_hash_stability() {
    let dir = TempDir::new().unwrap();
    let broker = start_broker(&dir).await;
    let token = CancellationToken::new();

    broker
        .create_topic("t2", &TopicConfig::new(4))
        .await
        .unwrap();

    for key in ["alpha", "beta"] {
        let mut partitions = Vec::new();
        for i in 0..10 {
            let metadata = broker
                .produce("t2", key, &format!("{key}-{i}"), Ack::None, &token)
                .await
                .unwrap();
            partitions.push(metadata.partition);
        }
        assert!(
            partitions.windows(2).all(|pair| pair[0] == pair[1]),
            "key {key} routed to multiple partitions: {partitions:?}"
        );
    }

    broker.shutdown().await;
}

#[tokio::test]
async fn test_duplicate_topic_leaves_tree_unchanged() {
    let dir = TempDir::new().unwrap();
    let broker = start_broker(&dir).await;

    broker
        .create_topic("t3", &TopicConfig::new(3))
        .await
        .unwrap();

    let config_path = broker.topics().layout().config_path("t3");
    let before_config = std::fs::read_to_string(&config_path).unwrap();
    let before_entries = list_tree(dir.path());

    let err = broker
        .create_topic("t3", &TopicConfig::new(5))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        BrokerError::Topic(TopicError::AlreadyExists { .. })
    ));

    assert_eq!(std::fs::read_to_string(&config_path).unwrap(), before_config);
    assert_eq!(list_tree(dir.path()), before_entries);

    broker.shutdown().await;
}

#[tokio::test]
async fn test_invalid_partition_count_creates_nothing() {
    let dir = TempDir::new().unwrap();
    let broker = start_broker(&dir).await;

    let err = broker
        .create_topic("t4", &TopicConfig::new(0))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        BrokerError::Topic(TopicError::InvalidConfig { .. })
    ));
    assert!(!broker.topics().layout().topic_dir("t4").exists());

    broker.shutdown().await;
}

#[tokio::test]
async fn test_produce_to_missing_topic() {
    let dir = TempDir::new().unwrap();
    let broker = start_broker(&dir).await;
    let token = CancellationToken::new();

    let err = broker
        .produce("nope", "k", "v", Ack::None, &token)
        .await
        .unwrap_err();
    assert!(matches!(err, BrokerError::TopicNotFound { .. }));
    assert!(!broker.topics().layout().topic_dir("nope").exists());

    broker.shutdown().await;
}

/// NOTE: Uses multi-threaded runtime to expose race conditions that would
/// be hidden by single-threaded Tokio's serialization of spawned tasks.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_producers_single_partition() {
    let dir = TempDir::new().unwrap();
    let broker = Arc::new(start_broker(&dir).await);

    broker
        .create_topic("t5", &TopicConfig::new(1))
        .await
        .unwrap();

    let mut handles = Vec::new();
    for producer in 0..8 {
        let broker = Arc::clone(&broker);
        handles.push(tokio::spawn(async move {
            let token = CancellationToken::new();
            for i in 0..1000 {
                broker
                    .produce("t5", "k", &format!("p{producer}-m{i}"), Ack::None, &token)
                    .await
                    .unwrap();
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }
    broker.flush().await;

    let records = read_index(&broker, "t5", 0);
    let log = read_log(&broker, "t5", 0);
    assert_dense(&records, 8000, &log);

    if let Ok(broker) = Arc::try_unwrap(broker) {
        broker.shutdown().await;
    }
}

#[tokio::test]
async fn test_ack_offset_reports_assigned_offsets() {
    let dir = TempDir::new().unwrap();
    let broker = start_broker(&dir).await;
    let token = CancellationToken::new();

    broker
        .create_topic("acked", &TopicConfig::new(1))
        .await
        .unwrap();

    let first = broker
        .produce("acked", "k", "one", Ack::Offset, &token)
        .await
        .unwrap();
    let second = broker
        .produce("acked", "k", "two", Ack::Offset, &token)
        .await
        .unwrap();

    assert_eq!(first.offset, 1);
    assert_eq!(second.offset, 2);

    // The acknowledged metadata carries the committed records' stamps,
    // not a clock sample taken in the facade.
    broker.flush().await;
    let records = read_index(&broker, "acked", 0);
    let log = read_log(&broker, "acked", 0);
    for (metadata, record) in [first, second].iter().zip(&records) {
        assert_eq!(metadata.timestamp, record.timestamp.as_nanos());

        let slice = &log[record.start_byte as usize..record.end_byte as usize];
        let parsed = LogRecord::parse(std::str::from_utf8(slice).unwrap()).unwrap();
        assert_eq!(metadata.timestamp, parsed.timestamp.as_nanos());
    }

    // Without an acknowledgment the offset is the accepted sentinel.
    let fire_and_forget = broker
        .produce("acked", "k", "three", Ack::None, &token)
        .await
        .unwrap();
    assert_eq!(fire_and_forget.offset, -1);

    broker.shutdown().await;
}

#[tokio::test]
async fn test_distributed_coordinator_pipeline() {
    let dir = TempDir::new().unwrap();
    let broker = Broker::start(
        BrokerConfig::new(dir.path()).with_writer_tick(Duration::from_millis(1)),
        Arc::new(timber_coordinator::CasCoordinator::new(MemoryKvStore::new())),
    )
    .await
    .unwrap();
    let token = CancellationToken::new();

    broker
        .create_topic("cas", &TopicConfig::new(2))
        .await
        .unwrap();

    for i in 0..20 {
        broker
            .produce("cas", &format!("key-{i}"), &i, Ack::None, &token)
            .await
            .unwrap();
    }
    broker.flush().await;

    let total: usize = (0..2)
        .map(|p| read_index(&broker, "cas", p).len())
        .sum();
    assert_eq!(total, 20);

    broker.shutdown().await;
}

#[tokio::test]
async fn test_restart_resumes_offsets_and_ranges() {
    let dir = TempDir::new().unwrap();

    let broker = start_broker(&dir).await;
    let token = CancellationToken::new();
    broker
        .create_topic("t6", &TopicConfig::new(1))
        .await
        .unwrap();
    for i in 0..3 {
        broker
            .produce("t6", "k", &format!("before-{i}"), Ack::None, &token)
            .await
            .unwrap();
    }
    broker.flush().await;
    broker.shutdown().await;

    // A fresh broker over the same directory picks up where the log ends.
    let broker = start_broker(&dir).await;
    let metadata = broker
        .produce("t6", "k", "after", Ack::Offset, &token)
        .await
        .unwrap();
    assert_eq!(metadata.offset, 4);
    broker.flush().await;

    let records = read_index(&broker, "t6", 0);
    let log = read_log(&broker, "t6", 0);
    assert_dense(&records, 4, &log);

    broker.shutdown().await;
}

/// Coordinator whose offset assignment never completes, pinning the
/// queue consumer so backpressure can be observed.
struct HangingCoordinator;

#[async_trait]
impl OffsetCoordinator for HangingCoordinator {
    async fn next(&self, _key: &str) -> CoordinatorResult<u64> {
        std::future::pending().await
    }

    async fn reserve(&self, _key: &str, _size: u64) -> CoordinatorResult<(u64, u64)> {
        std::future::pending().await
    }

    async fn seed(&self, _key: &str, _floor: u64) -> CoordinatorResult<()> {
        Ok(())
    }
}

#[tokio::test]
async fn test_backpressure_blocks_then_cancellation_fires() {
    let dir = TempDir::new().unwrap();
    let broker = Broker::start(
        BrokerConfig::new(dir.path()).with_queue_capacity(1),
        Arc::new(HangingCoordinator),
    )
    .await
    .unwrap();
    let token = CancellationToken::new();

    broker
        .create_topic("full", &TopicConfig::new(1))
        .await
        .unwrap();

    // First message is dequeued and pins the consumer on the hanging
    // coordinator call.
    broker
        .produce("full", "k", "occupies-consumer", Ack::None, &token)
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    // Second message fills the single queue slot.
    broker
        .produce("full", "k", "fills-queue", Ack::None, &token)
        .await
        .unwrap();

    // Third message has nowhere to go: the produce call must block, not
    // drop the message.
    let blocked = broker.produce("full", "k", "blocked", Ack::None, &token);
    let result = tokio::time::timeout(Duration::from_millis(100), blocked).await;
    assert!(result.is_err(), "produce into a saturated queue must block");

    // A cancelled caller is released with `Cancelled`.
    let cancel_token = CancellationToken::new();
    let trigger = cancel_token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });
    let err = broker
        .produce("full", "k", "cancelled", Ack::None, &cancel_token)
        .await
        .unwrap_err();
    assert!(matches!(err, BrokerError::Cancelled));

    // A pre-cancelled token never enqueues.
    let dead_token = CancellationToken::new();
    dead_token.cancel();
    let err = broker
        .produce("full", "k", "never", Ack::None, &dead_token)
        .await
        .unwrap_err();
    assert!(matches!(err, BrokerError::Cancelled));
}

#[tokio::test]
async fn test_escaped_newline_in_payload_is_accepted() {
    let dir = TempDir::new().unwrap();
    let broker = start_broker(&dir).await;
    let token = CancellationToken::new();

    broker
        .create_topic("framed", &TopicConfig::new(1))
        .await
        .unwrap();

    // JSON serialization escapes the newline, so the message is safe to
    // frame and must be accepted.
    broker
        .produce("framed", "k", "line1\nline2", Ack::Offset, &token)
        .await
        .unwrap();
    broker.flush().await;

    let records = read_index(&broker, "framed", 0);
    let log = read_log(&broker, "framed", 0);
    assert_dense(&records, 1, &log);

    broker.shutdown().await;
}

fn list_tree(root: &std::path::Path) -> Vec<String> {
    let mut entries = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        for entry in std::fs::read_dir(&dir).unwrap() {
            let entry = entry.unwrap();
            let path = entry.path();
            entries.push(path.display().to_string());
            if path.is_dir() {
                stack.push(path);
            }
        }
    }
    entries.sort();
    entries
}
