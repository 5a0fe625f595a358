//! Log record types.
//!
//! A `LogRecord` is the atomic unit of the system: an immutable value with
//! exactly four fields. Equality is field-wise, and the canonical encoding
//! of those four fields is the only input to hashing. A record has no
//! identity beyond its field values until it is sealed into a batch, at
//! which point it gains a `RecordId` unique within that batch.

use std::fmt;
use std::str::FromStr;

use chrono::DateTime;
use serde::{Deserialize, Serialize};

use crate::crypto::{keccak256, Hash};
use crate::error::{Error, Result};

/// Maximum length of a record message, in characters.
pub const MAX_MESSAGE_LEN: usize = 10_000;

/// Maximum length of a record source, in characters.
pub const MAX_SOURCE_LEN: usize = 200;

/// Severity level of a log record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    /// The canonical uppercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Error => "ERROR",
            LogLevel::Warn => "WARN",
            LogLevel::Info => "INFO",
            LogLevel::Debug => "DEBUG",
            LogLevel::Trace => "TRACE",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "ERROR" => Ok(LogLevel::Error),
            "WARN" => Ok(LogLevel::Warn),
            "INFO" => Ok(LogLevel::Info),
            "DEBUG" => Ok(LogLevel::Debug),
            "TRACE" => Ok(LogLevel::Trace),
            other => Err(Error::InvalidLevel(other.to_string())),
        }
    }
}

/// An immutable log record.
///
/// The timestamp is kept as the original RFC 3339 string rather than a
/// parsed `DateTime`: hashing and field-wise equality must be byte-exact,
/// and re-serializing a parsed timestamp could normalize it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRecord {
    /// RFC 3339 timestamp, verbatim as ingested.
    pub timestamp: String,
    /// Severity level.
    pub level: LogLevel,
    /// Free-form message, at most [`MAX_MESSAGE_LEN`] characters.
    pub message: String,
    /// Emitting service or component, at most [`MAX_SOURCE_LEN`] characters.
    pub source: String,
}

/// Canonical hashing view of a record: exactly the four fields, in this
/// order, and nothing else. A later-assigned record id must never leak
/// into the hash or verification of a bare candidate would never match.
#[derive(Serialize)]
struct CanonicalRecord<'a> {
    timestamp: &'a str,
    level: LogLevel,
    message: &'a str,
    source: &'a str,
}

impl LogRecord {
    /// Create a validated record.
    pub fn new(
        timestamp: impl Into<String>,
        level: LogLevel,
        message: impl Into<String>,
        source: impl Into<String>,
    ) -> Result<Self> {
        let timestamp = timestamp.into();
        let message = message.into();
        let source = source.into();

        if DateTime::parse_from_rfc3339(&timestamp).is_err() {
            return Err(Error::invalid_timestamp(format!(
                "not RFC 3339: {timestamp:?}"
            )));
        }
        if message.chars().count() > MAX_MESSAGE_LEN {
            return Err(Error::invalid_record(format!(
                "message exceeds {MAX_MESSAGE_LEN} characters"
            )));
        }
        if source.chars().count() > MAX_SOURCE_LEN {
            return Err(Error::invalid_record(format!(
                "source exceeds {MAX_SOURCE_LEN} characters"
            )));
        }

        Ok(Self {
            timestamp,
            level,
            message,
            source,
        })
    }

    /// The canonical byte encoding fed to the hash function.
    pub fn canonical_bytes(&self) -> Vec<u8> {
        let canonical = CanonicalRecord {
            timestamp: &self.timestamp,
            level: self.level,
            message: &self.message,
            source: &self.source,
        };
        serde_json::to_vec(&canonical).expect("canonical record encoding cannot fail")
    }

    /// Keccak-256 of the canonical encoding; the record's Merkle leaf.
    pub fn leaf_hash(&self) -> Hash {
        keccak256(&self.canonical_bytes())
    }

    /// Names of fields that differ between this record and `other`,
    /// with both values, in field order.
    pub fn diff(&self, other: &LogRecord) -> Vec<FieldDiff> {
        let mut diffs = Vec::new();
        if self.timestamp != other.timestamp {
            diffs.push(FieldDiff::new("timestamp", &other.timestamp, &self.timestamp));
        }
        if self.level != other.level {
            diffs.push(FieldDiff::new("level", other.level.as_str(), self.level.as_str()));
        }
        if self.message != other.message {
            diffs.push(FieldDiff::new("message", &other.message, &self.message));
        }
        if self.source != other.source {
            diffs.push(FieldDiff::new("source", &other.source, &self.source));
        }
        diffs
    }
}

/// A single field-level difference between a candidate and a stored record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDiff {
    /// Field name.
    pub field: String,
    /// Value held by the stored record.
    pub expected: String,
    /// Value supplied by the candidate.
    pub received: String,
}

impl FieldDiff {
    fn new(field: &str, expected: impl Into<String>, received: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            expected: expected.into(),
            received: received.into(),
        }
    }
}

/// Identifier of a record within its batch, e.g. `log_1`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RecordId(pub String);

impl RecordId {
    /// Id for the record at `position` in drain order (1-based suffix).
    pub fn from_position(position: usize) -> Self {
        Self(format!("log_{}", position + 1))
    }

    /// Get the id as a string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A record sealed into a batch: the record plus its batch-local id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealedRecord {
    /// Batch-local identifier.
    pub id: RecordId,
    /// The underlying record. Flattened so the archived form reads as one
    /// object with five fields.
    #[serde(flatten)]
    pub record: LogRecord,
}

impl SealedRecord {
    /// Seal a record with the id for `position` in drain order.
    pub fn new(position: usize, record: LogRecord) -> Self {
        Self {
            id: RecordId::from_position(position),
            record,
        }
    }

    /// Seal a slice of records in order.
    pub fn seal_all(records: Vec<LogRecord>) -> Vec<SealedRecord> {
        records
            .into_iter()
            .enumerate()
            .map(|(i, r)| SealedRecord::new(i, r))
            .collect()
    }
}
