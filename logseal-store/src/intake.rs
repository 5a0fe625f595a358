//! Intake spool for records awaiting batch commitment.
//!
//! Records are spooled one file per record. The aggregator reads them with
//! [`IntakeQueue::drain`], which takes a snapshot without modifying the
//! spool, and removes them with [`IntakeQueue::consume`] only after the
//! batch has been anchored and archived. A crash between the two leaves
//! the records in place for the next cycle instead of losing them.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use logseal_core::record::LogRecord;
use tempfile::TempDir;
use tracing::{debug, warn};

use crate::{Result, StoreError};

const SPOOL_EXT: &str = "json";
const TMP_EXT: &str = "tmp";

/// Snapshot handle returned by [`IntakeQueue::drain`].
///
/// Holds the spool files backing one drained record set. Passing it to
/// [`IntakeQueue::consume`] removes exactly those files; records appended
/// after the drain are untouched.
#[derive(Debug)]
pub struct DrainReceipt {
    files: Vec<PathBuf>,
}

impl DrainReceipt {
    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// Filesystem-backed intake spool.
#[derive(Debug)]
pub struct IntakeQueue {
    dir: PathBuf,
    seq: AtomicU64,
    // Keeps the backing directory alive for spools created by `open_temp`.
    _temp: Option<TempDir>,
}

impl IntakeQueue {
    /// Open the spool at `dir`, creating the directory if needed.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| StoreError::io(&dir, e))?;
        Ok(Self {
            dir,
            seq: AtomicU64::new(0),
            _temp: None,
        })
    }

    /// Open a spool in a fresh temporary directory, removed on drop.
    pub fn open_temp() -> Result<Self> {
        let temp = TempDir::new().map_err(|e| StoreError::io("<tempdir>", e))?;
        let mut queue = Self::new(temp.path())?;
        queue._temp = Some(temp);
        Ok(queue)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Append one record to the spool.
    ///
    /// The record is serialized to a temporary file and renamed into place,
    /// so a partially written file is never picked up by a drain.
    pub fn append(&self, record: &LogRecord) -> Result<PathBuf> {
        let name = self.next_name();
        let tmp = self.dir.join(format!("{name}.{TMP_EXT}"));
        let path = self.dir.join(format!("{name}.{SPOOL_EXT}"));

        let bytes = serde_json::to_vec(record)?;
        fs::write(&tmp, bytes).map_err(|e| StoreError::io(&tmp, e))?;
        fs::rename(&tmp, &path).map_err(|e| StoreError::io(&path, e))?;

        debug!(file = %path.display(), "spooled record");
        Ok(path)
    }

    /// Snapshot the spool without modifying it.
    ///
    /// Returns the pending records in spool order and a receipt naming the
    /// files they came from. Files that fail to parse are skipped with a
    /// warning and stay in the spool.
    pub fn drain(&self) -> Result<(Vec<LogRecord>, DrainReceipt)> {
        let mut names: Vec<PathBuf> = Vec::new();
        let entries = fs::read_dir(&self.dir).map_err(|e| StoreError::io(&self.dir, e))?;
        for entry in entries {
            let entry = entry.map_err(|e| StoreError::io(&self.dir, e))?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some(SPOOL_EXT) {
                names.push(path);
            }
        }
        names.sort();

        let mut records = Vec::with_capacity(names.len());
        let mut files = Vec::with_capacity(names.len());
        for path in names {
            let bytes = match fs::read(&path) {
                Ok(b) => b,
                Err(e) => return Err(StoreError::io(&path, e)),
            };
            match serde_json::from_slice::<LogRecord>(&bytes) {
                Ok(record) => {
                    records.push(record);
                    files.push(path);
                }
                Err(e) => {
                    warn!(file = %path.display(), error = %e, "skipping unparseable spool file");
                }
            }
        }

        Ok((records, DrainReceipt { files }))
    }

    /// Remove the spool files named by a drain receipt.
    ///
    /// Called once the drained records are archived. A file already gone
    /// is not an error.
    pub fn consume(&self, receipt: DrainReceipt) -> Result<()> {
        for path in &receipt.files {
            match fs::remove_file(path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(StoreError::io(path, e)),
            }
        }
        debug!(count = receipt.files.len(), "consumed spool files");
        Ok(())
    }

    /// Number of spool files currently pending.
    pub fn pending_files(&self) -> Result<usize> {
        let entries = fs::read_dir(&self.dir).map_err(|e| StoreError::io(&self.dir, e))?;
        let mut count = 0;
        for entry in entries {
            let entry = entry.map_err(|e| StoreError::io(&self.dir, e))?;
            if entry.path().extension().and_then(|e| e.to_str()) == Some(SPOOL_EXT) {
                count += 1;
            }
        }
        Ok(count)
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.pending_files()? == 0)
    }

    /// Spool file names sort by creation: nanosecond timestamp first, then
    /// a per-process counter to break ties within one tick.
    fn next_name(&self) -> String {
        let nanos = Utc::now().timestamp_nanos_opt().unwrap_or(i64::MAX);
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        format!("{nanos:020}-{seq:08}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use logseal_core::record::LogLevel;

    fn record(message: &str) -> LogRecord {
        LogRecord::new(
            "2025-03-31T10:00:00Z",
            LogLevel::Info,
            message,
            "intake-test",
        )
        .unwrap()
    }

    #[test]
    fn test_append_and_drain_in_order() {
        let queue = IntakeQueue::open_temp().unwrap();
        queue.append(&record("first")).unwrap();
        queue.append(&record("second")).unwrap();
        queue.append(&record("third")).unwrap();

        let (records, receipt) = queue.drain().unwrap();
        assert_eq!(receipt.len(), 3);
        let messages: Vec<_> = records.iter().map(|r| r.message.as_str()).collect();
        assert_eq!(messages, ["first", "second", "third"]);
    }

    #[test]
    fn test_drain_leaves_spool_intact() {
        let queue = IntakeQueue::open_temp().unwrap();
        queue.append(&record("pending")).unwrap();

        let (_, receipt) = queue.drain().unwrap();
        assert_eq!(receipt.len(), 1);
        // The snapshot must not remove or rename anything.
        assert_eq!(queue.pending_files().unwrap(), 1);

        let (again, _) = queue.drain().unwrap();
        assert_eq!(again.len(), 1);
    }

    #[test]
    fn test_consume_removes_only_receipt_files() {
        let queue = IntakeQueue::open_temp().unwrap();
        queue.append(&record("batched")).unwrap();

        let (_, receipt) = queue.drain().unwrap();
        queue.append(&record("late arrival")).unwrap();

        queue.consume(receipt).unwrap();
        let (remaining, _) = queue.drain().unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].message, "late arrival");
    }

    #[test]
    fn test_consume_tolerates_missing_files() {
        let queue = IntakeQueue::open_temp().unwrap();
        queue.append(&record("going away")).unwrap();

        let (_, receipt) = queue.drain().unwrap();
        for path in fs::read_dir(queue.dir()).unwrap() {
            fs::remove_file(path.unwrap().path()).unwrap();
        }
        queue.consume(receipt).unwrap();
    }

    #[test]
    fn test_drain_skips_unparseable_files() {
        let queue = IntakeQueue::open_temp().unwrap();
        queue.append(&record("good")).unwrap();
        fs::write(queue.dir().join("99999999999999999999-00000000.json"), b"not json").unwrap();

        let (records, receipt) = queue.drain().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(receipt.len(), 1);
        // The bad file stays behind for operator inspection.
        assert_eq!(queue.pending_files().unwrap(), 2);
    }

    #[test]
    fn test_tmp_files_invisible_to_drain() {
        let queue = IntakeQueue::open_temp().unwrap();
        fs::write(queue.dir().join("00000000000000000001-00000000.tmp"), b"{}").unwrap();

        let (records, receipt) = queue.drain().unwrap();
        assert!(records.is_empty());
        assert!(receipt.is_empty());
        assert!(queue.is_empty().unwrap());
    }
}
