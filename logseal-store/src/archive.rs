//! Immutable per-batch artifact store.
//!
//! Each committed batch occupies one directory, `batch_<id>`, holding
//! three artifacts:
//!
//! - `metadata.json` - the [`Batch`] metadata
//! - `logs.json` - the sealed record list in drain order
//! - `proofs.json` - the proof table keyed by record id
//!
//! Publish is atomic: artifacts are written into `batch_<id>.tmp` and the
//! directory is renamed into place in one step. Readers therefore never
//! see a partially written batch, and a crash mid-publish leaves only a
//! stale `.tmp` directory that the next open sweeps away. Once published,
//! a batch is never modified; a second write for the same id is refused.

use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use logseal_core::batch::Batch;
use logseal_core::proof::ProofEntry;
use logseal_core::record::{RecordId, SealedRecord};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tempfile::TempDir;
use tracing::{info, warn};

use crate::{Result, StoreError};

const METADATA_FILE: &str = "metadata.json";
const RECORDS_FILE: &str = "logs.json";
const PROOFS_FILE: &str = "proofs.json";
const BATCH_PREFIX: &str = "batch_";
const TMP_SUFFIX: &str = ".tmp";

/// Filesystem-backed archive of committed batches.
#[derive(Debug)]
pub struct BatchArchive {
    dir: PathBuf,
    _temp: Option<TempDir>,
}

impl BatchArchive {
    /// Open the archive at `dir`, creating the directory if needed and
    /// removing any `.tmp` directories left by an interrupted publish.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| StoreError::io(&dir, e))?;

        let archive = Self { dir, _temp: None };
        archive.sweep_stale_tmp()?;
        Ok(archive)
    }

    /// Open an archive in a fresh temporary directory, removed on drop.
    pub fn open_temp() -> Result<Self> {
        let temp = TempDir::new().map_err(|e| StoreError::io("<tempdir>", e))?;
        let mut archive = Self::new(temp.path())?;
        archive._temp = Some(temp);
        Ok(archive)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Publish a batch's three artifacts atomically.
    ///
    /// Validates the artifacts against the metadata first, refuses an id
    /// that is already archived, and makes the batch visible only once all
    /// three files are fully written.
    pub fn write(
        &self,
        batch: &Batch,
        records: &[SealedRecord],
        proofs: &HashMap<RecordId, ProofEntry>,
    ) -> Result<()> {
        batch.validate_artifacts(records, proofs)?;

        let final_dir = self.batch_dir(batch.batch_id);
        if final_dir.exists() {
            return Err(StoreError::BatchExists(batch.batch_id));
        }

        let tmp_dir = self.tmp_dir(batch.batch_id);
        if tmp_dir.exists() {
            fs::remove_dir_all(&tmp_dir).map_err(|e| StoreError::io(&tmp_dir, e))?;
        }
        fs::create_dir_all(&tmp_dir).map_err(|e| StoreError::io(&tmp_dir, e))?;

        write_json(&tmp_dir.join(METADATA_FILE), batch)?;
        write_json(&tmp_dir.join(RECORDS_FILE), &records)?;
        write_json(&tmp_dir.join(PROOFS_FILE), proofs)?;

        match fs::rename(&tmp_dir, &final_dir) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::AlreadyExists || final_dir.exists() => {
                let _ = fs::remove_dir_all(&tmp_dir);
                return Err(StoreError::BatchExists(batch.batch_id));
            }
            Err(e) => return Err(StoreError::io(&final_dir, e)),
        }

        info!(
            batch_id = batch.batch_id,
            record_count = batch.record_count,
            merkle_root = %batch.merkle_root,
            "archived batch"
        );
        Ok(())
    }

    /// Read a batch's metadata. `None` if the batch is not archived.
    pub fn read_metadata(&self, batch_id: u64) -> Result<Option<Batch>> {
        read_json(&self.batch_dir(batch_id).join(METADATA_FILE))
    }

    /// Read a batch's sealed record list, in drain order.
    pub fn read_records(&self, batch_id: u64) -> Result<Option<Vec<SealedRecord>>> {
        read_json(&self.batch_dir(batch_id).join(RECORDS_FILE))
    }

    /// Read a batch's full proof table.
    pub fn read_proofs(&self, batch_id: u64) -> Result<Option<HashMap<RecordId, ProofEntry>>> {
        read_json(&self.batch_dir(batch_id).join(PROOFS_FILE))
    }

    /// Read the proof for one record of a batch.
    pub fn read_proof(&self, batch_id: u64, record_id: &RecordId) -> Result<Option<ProofEntry>> {
        Ok(self
            .read_proofs(batch_id)?
            .and_then(|mut proofs| proofs.remove(record_id)))
    }

    /// Whether a batch with this id has been published.
    pub fn contains(&self, batch_id: u64) -> bool {
        self.batch_dir(batch_id).join(METADATA_FILE).is_file()
    }

    /// Ids of all archived batches, newest first.
    pub fn list_batches(&self) -> Result<Vec<u64>> {
        let mut ids = Vec::new();
        let entries = fs::read_dir(&self.dir).map_err(|e| StoreError::io(&self.dir, e))?;
        for entry in entries {
            let entry = entry.map_err(|e| StoreError::io(&self.dir, e))?;
            if !entry.path().is_dir() {
                continue;
            }
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if name.ends_with(TMP_SUFFIX) {
                continue;
            }
            if let Some(id) = name.strip_prefix(BATCH_PREFIX) {
                match id.parse::<u64>() {
                    Ok(id) => ids.push(id),
                    Err(_) => warn!(dir = name, "ignoring unrecognized archive entry"),
                }
            }
        }
        ids.sort_unstable_by(|a, b| b.cmp(a));
        Ok(ids)
    }

    fn batch_dir(&self, batch_id: u64) -> PathBuf {
        self.dir.join(format!("{BATCH_PREFIX}{batch_id}"))
    }

    fn tmp_dir(&self, batch_id: u64) -> PathBuf {
        self.dir.join(format!("{BATCH_PREFIX}{batch_id}{TMP_SUFFIX}"))
    }

    fn sweep_stale_tmp(&self) -> Result<()> {
        let entries = fs::read_dir(&self.dir).map_err(|e| StoreError::io(&self.dir, e))?;
        for entry in entries {
            let entry = entry.map_err(|e| StoreError::io(&self.dir, e))?;
            let path = entry.path();
            let is_tmp = path
                .file_name()
                .and_then(|n| n.to_str())
                .map(|n| n.starts_with(BATCH_PREFIX) && n.ends_with(TMP_SUFFIX))
                .unwrap_or(false);
            if is_tmp && path.is_dir() {
                warn!(dir = %path.display(), "removing stale publish directory");
                fs::remove_dir_all(&path).map_err(|e| StoreError::io(&path, e))?;
            }
        }
        Ok(())
    }
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let bytes = serde_json::to_vec_pretty(value)?;
    fs::write(path, bytes).map_err(|e| StoreError::io(path, e))
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    let bytes = match fs::read(path) {
        Ok(b) => b,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(StoreError::io(path, e)),
    };
    Ok(Some(serde_json::from_slice(&bytes)?))
}
