//! Textual log and index record formats.
//!
//! Every produced message yields exactly two newline-terminated lines:
//!
//! ```text
//! log:   <timestamp_ns>--<partition>--<offset>--<payload>\n
//! index: <timestamp_ns>--<start_byte>--<end_byte>--<offset>\n
//! ```
//!
//! The `[start_byte, end_byte)` range is the half-open byte span of the
//! log line (newline included) inside the partition's log file, so a
//! consumer can seek to any offset in constant time. The timestamp in a
//! log record is identical to the timestamp in its paired index record.
//!
//! The format is newline-framed with no escaping, so payloads must not
//! contain a literal newline. Compact JSON encoding already escapes them;
//! [`LogRecord::new`] rejects any payload that slips through.

use thiserror::Error;

use crate::{Offset, PartitionIndex, Timestamp};

/// Field separator inside a record line.
pub const FIELD_SEPARATOR: &str = "--";

/// Column legend written as the first line of every index file.
///
/// Not data: readers skip it, writers emit it exactly once at creation.
pub const INDEX_HEADER: &str = "timestamp--start--end--offset\n";

/// Result type for record parsing.
pub type RecordResult<T> = Result<T, RecordError>;

/// Errors from building or parsing record lines.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RecordError {
    /// Payload contains a literal newline, which would break line framing.
    #[error("payload contains a literal newline at byte {position}")]
    PayloadContainsNewline {
        /// Byte position of the first newline.
        position: usize,
    },

    /// A record line did not have the expected number of fields.
    #[error("malformed {kind} record: expected {expected} fields, found {found}")]
    MissingFields {
        /// Which record kind was being parsed.
        kind: &'static str,
        /// Expected field count.
        expected: usize,
        /// Fields actually present.
        found: usize,
    },

    /// A numeric field failed to parse.
    #[error("malformed {kind} record: field '{field}' is not an integer: {value:?}")]
    InvalidField {
        /// Which record kind was being parsed.
        kind: &'static str,
        /// Name of the offending field.
        field: &'static str,
        /// The raw field text.
        value: String,
    },
}

fn parse_u64(kind: &'static str, field: &'static str, value: &str) -> RecordResult<u64> {
    value.parse().map_err(|_| RecordError::InvalidField {
        kind,
        field,
        value: value.to_string(),
    })
}

fn parse_u32(kind: &'static str, field: &'static str, value: &str) -> RecordResult<u32> {
    value.parse().map_err(|_| RecordError::InvalidField {
        kind,
        field,
        value: value.to_string(),
    })
}

/// One log-file line: a stamped message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    /// Capture time, shared with the paired index record.
    pub timestamp: Timestamp,
    /// Partition the message was routed to.
    pub partition: PartitionIndex,
    /// Logical offset within the partition.
    pub offset: Offset,
    /// Serialized message payload (compact JSON, no newline).
    pub payload: String,
}

impl LogRecord {
    /// Builds a log record, rejecting payloads that would corrupt framing.
    ///
    /// # Errors
    /// Returns [`RecordError::PayloadContainsNewline`] if the payload
    /// contains `\n`.
    pub fn new(
        timestamp: Timestamp,
        partition: PartitionIndex,
        offset: Offset,
        payload: String,
    ) -> RecordResult<Self> {
        if let Some(position) = payload.find('\n') {
            return Err(RecordError::PayloadContainsNewline { position });
        }
        Ok(Self {
            timestamp,
            partition,
            offset,
            payload,
        })
    }

    /// Encodes the record as its newline-terminated line.
    #[must_use]
    pub fn encode(&self) -> String {
        format!(
            "{ts}{sep}{p}{sep}{o}{sep}{payload}\n",
            ts = self.timestamp,
            p = self.partition,
            o = self.offset,
            payload = self.payload,
            sep = FIELD_SEPARATOR,
        )
    }

    /// Length in bytes of the encoded line, newline included.
    ///
    /// Equals `end_byte - start_byte` of the paired index record.
    #[must_use]
    pub fn encoded_len(&self) -> u64 {
        self.encode().len() as u64
    }

    /// Parses a log line (with or without its trailing newline).
    ///
    /// The first three `--`-separated fields are numeric; the remainder of
    /// the line is the payload, which may itself contain `--`.
    ///
    /// # Errors
    /// Returns an error if fields are missing or non-numeric.
    pub fn parse(line: &str) -> RecordResult<Self> {
        const KIND: &str = "log";
        let line = line.strip_suffix('\n').unwrap_or(line);

        let mut fields = line.splitn(4, FIELD_SEPARATOR);
        let (Some(ts), Some(partition), Some(offset), Some(payload)) = (
            fields.next(),
            fields.next(),
            fields.next(),
            fields.next(),
        ) else {
            let found = line.split(FIELD_SEPARATOR).count();
            return Err(RecordError::MissingFields {
                kind: KIND,
                expected: 4,
                found,
            });
        };

        Ok(Self {
            timestamp: Timestamp::from_nanos(parse_u64(KIND, "timestamp", ts)?),
            partition: PartitionIndex::new(parse_u32(KIND, "partition", partition)?),
            offset: Offset::new(parse_u64(KIND, "offset", offset)?),
            payload: payload.to_string(),
        })
    }
}

/// One index-file line: the byte range of a log record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexRecord {
    /// Capture time, shared with the paired log record.
    pub timestamp: Timestamp,
    /// First byte of the log line in the partition's log file.
    pub start_byte: u64,
    /// One past the last byte of the log line (half-open).
    pub end_byte: u64,
    /// Logical offset of the paired log record.
    pub offset: Offset,
}

impl IndexRecord {
    /// Creates an index record for a byte range.
    #[must_use]
    pub const fn new(timestamp: Timestamp, start_byte: u64, end_byte: u64, offset: Offset) -> Self {
        Self {
            timestamp,
            start_byte,
            end_byte,
            offset,
        }
    }

    /// Length in bytes of the referenced log line.
    #[must_use]
    pub const fn len(&self) -> u64 {
        self.end_byte - self.start_byte
    }

    /// Returns true if the referenced range is empty.
    ///
    /// Never the case for a well-formed record; a log line is at least
    /// its newline.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.end_byte == self.start_byte
    }

    /// Encodes the record as its newline-terminated line.
    #[must_use]
    pub fn encode(&self) -> String {
        format!(
            "{ts}{sep}{start}{sep}{end}{sep}{o}\n",
            ts = self.timestamp,
            start = self.start_byte,
            end = self.end_byte,
            o = self.offset,
            sep = FIELD_SEPARATOR,
        )
    }

    /// Parses an index line (with or without its trailing newline).
    ///
    /// # Errors
    /// Returns an error unless the line is exactly four integer fields.
    pub fn parse(line: &str) -> RecordResult<Self> {
        const KIND: &str = "index";
        let line = line.strip_suffix('\n').unwrap_or(line);

        let fields: Vec<&str> = line.split(FIELD_SEPARATOR).collect();
        if fields.len() != 4 {
            return Err(RecordError::MissingFields {
                kind: KIND,
                expected: 4,
                found: fields.len(),
            });
        }

        Ok(Self {
            timestamp: Timestamp::from_nanos(parse_u64(KIND, "timestamp", fields[0])?),
            start_byte: parse_u64(KIND, "start", fields[1])?,
            end_byte: parse_u64(KIND, "end", fields[2])?,
            offset: Offset::new(parse_u64(KIND, "offset", fields[3])?),
        })
    }
}
