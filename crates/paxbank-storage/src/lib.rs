//! paxbank storage
//!
//! Durable snapshot of a peer's entire state: balance table, chain, and
//! every per-slot Paxos variable. One JSON file per peer,
//! `node_<id>_state.json`, written crash-atomically (temp file, fsync,
//! rename) so a restart always sees either the old snapshot or the new one.

#![forbid(unsafe_code)]

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use paxbank_types::{Ballot, Block, Transfer};

/// Storage operation errors.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// The full durable state of one peer, in the on-disk JSON schema.
///
/// Per-depth maps are keyed by slot number; JSON object keys are strings and
/// serde_json maps integer keys onto them. Unset ballots and values persist
/// as `null` and rehydrate as `None`, never as zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Account balances, peer id -> balance.
    pub table: BTreeMap<u64, i64>,
    /// The chain, oldest block first, tags included.
    pub blockchain: Vec<Block>,
    /// Proposer attempt counter per depth.
    pub seq_num: BTreeMap<u64, i64>,
    /// Highest promised ballot per depth.
    pub promised_ballot: BTreeMap<u64, Option<Ballot>>,
    /// Ballot of the last accepted value per depth.
    pub accepted_ballot: BTreeMap<u64, Option<Ballot>>,
    /// Last accepted value per depth.
    pub accepted_val: BTreeMap<u64, Option<Transfer>>,
}

/// Handle to one peer's snapshot file.
#[derive(Debug, Clone)]
pub struct Store {
    path: PathBuf,
}

impl Store {
    /// Snapshot handle for `node_<id>_state.json` under `data_dir`.
    pub fn new(data_dir: impl AsRef<Path>, node_id: u64) -> Self {
        Self {
            path: data_dir.as_ref().join(format!("node_{node_id}_state.json")),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Atomically overwrites the snapshot: write `<file>.tmp`, fsync, rename.
    pub fn persist(&self, snapshot: &Snapshot) -> StorageResult<()> {
        let tmp = self.path.with_extension("json.tmp");
        let bytes = serde_json::to_vec_pretty(snapshot)?;

        let mut file = File::create(&tmp)?;
        file.write_all(&bytes)?;
        file.sync_all()?;
        drop(file);

        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    /// Loads the snapshot if one exists.
    ///
    /// A missing file is a fresh start, not an error. A corrupt file is
    /// logged and treated the same; the peer restarts from defaults, which
    /// is documented data loss.
    pub fn load(&self) -> Option<Snapshot> {
        match self.try_load() {
            Ok(snapshot) => snapshot,
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "corrupt snapshot, starting from defaults");
                None
            }
        }
    }

    /// Strict variant of [`Store::load`]: corrupt snapshots surface as
    /// errors instead of defaults.
    pub fn try_load(&self) -> StorageResult<Option<Snapshot>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let bytes = fs::read(&self.path)?;
        Ok(Some(serde_json::from_slice(&bytes)?))
    }
}
