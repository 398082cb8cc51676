//! Ledger persistence layer
//!
//! Saves the ledger and its treasury together as one JSON snapshot.

use crate::host::Treasury;
use crate::ledger::Ledger;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::PathBuf;
use thiserror::Error;

/// Storage errors
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
    #[error("Invalid data: {0}")]
    InvalidData(String),
}

/// Storage configuration
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
    pub snapshot_file: String,
    pub backup_enabled: bool,
    pub max_backups: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(".ledger_data"),
            snapshot_file: "ledger.json".to_string(),
            backup_enabled: true,
            max_backups: 5,
        }
    }
}

/// Everything persisted for one ledger
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Snapshot {
    pub ledger: Ledger,
    pub treasury: Treasury,
    pub saved_at: DateTime<Utc>,
}

impl Snapshot {
    /// Reject snapshots whose principal set was edited into an invalid state
    fn validate(&self) -> Result<(), StorageError> {
        let threshold = self.ledger.threshold();
        let count = self.ledger.principal_set().len();
        if threshold == 0 || threshold > count {
            return Err(StorageError::InvalidData(format!(
                "threshold {} invalid for {} principals",
                threshold, count
            )));
        }
        Ok(())
    }
}

/// Snapshot storage manager
pub struct Storage {
    config: StorageConfig,
}

impl Storage {
    /// Create a new storage manager
    pub fn new(config: StorageConfig) -> Result<Self, StorageError> {
        fs::create_dir_all(&config.data_dir)?;
        Ok(Self { config })
    }

    fn snapshot_path(&self) -> PathBuf {
        self.config.data_dir.join(&self.config.snapshot_file)
    }

    fn temp_path(&self) -> PathBuf {
        self.config
            .data_dir
            .join(format!("{}.tmp", self.config.snapshot_file))
    }

    fn backup_path(&self, index: usize) -> PathBuf {
        self.config
            .data_dir
            .join(format!("{}.backup.{}", self.config.snapshot_file, index))
    }

    /// Save ledger and treasury to disk
    pub fn save(&self, ledger: &Ledger, treasury: &Treasury) -> Result<(), StorageError> {
        let path = self.snapshot_path();

        if self.config.backup_enabled && self.config.max_backups > 0 && path.exists() {
            self.rotate_backups()?;
            fs::copy(&path, self.backup_path(0))?;
        }

        // Write to a temporary file, then rename over the snapshot
        let temp_path = self.temp_path();
        let file = fs::File::create(&temp_path)?;
        let mut writer = BufWriter::new(file);

        let snapshot = SnapshotRef {
            ledger,
            treasury,
            saved_at: Utc::now(),
        };
        serde_json::to_writer_pretty(&mut writer, &snapshot)?;

        // The snapshot must be fully on disk before it replaces the old one
        writer.flush()?;
        writer.into_inner().map_err(|e| e.into_error())?.sync_all()?;

        fs::rename(&temp_path, &path)?;
        log::debug!("Saved snapshot of {} to {}", ledger.address(), path.display());

        Ok(())
    }

    /// Load the snapshot from disk
    pub fn load(&self) -> Result<Snapshot, StorageError> {
        let path = self.snapshot_path();

        if !path.exists() {
            return Err(StorageError::InvalidData(format!(
                "No ledger found in {}",
                self.config.data_dir.display()
            )));
        }

        read_snapshot(&path)
    }

    /// Check if a saved snapshot exists
    pub fn exists(&self) -> bool {
        self.snapshot_path().exists()
    }

    fn rotate_backups(&self) -> Result<(), StorageError> {
        let oldest = self.backup_path(self.config.max_backups - 1);
        if oldest.exists() {
            fs::remove_file(&oldest)?;
        }

        for i in (0..self.config.max_backups - 1).rev() {
            let current = self.backup_path(i);
            if current.exists() {
                fs::rename(&current, self.backup_path(i + 1))?;
            }
        }

        Ok(())
    }

    /// Load a backup; 0 is the most recent
    pub fn restore_backup(&self, backup_index: usize) -> Result<Snapshot, StorageError> {
        let backup_path = self.backup_path(backup_index);

        if !backup_path.exists() {
            return Err(StorageError::InvalidData(format!(
                "Backup {} not found",
                backup_index
            )));
        }

        read_snapshot(&backup_path)
    }

    /// List available backups
    pub fn list_backups(&self) -> Vec<usize> {
        (0..self.config.max_backups)
            .filter(|i| self.backup_path(*i).exists())
            .collect()
    }

    /// Get storage statistics
    pub fn stats(&self) -> Result<StorageStats, StorageError> {
        let path = self.snapshot_path();

        let file_size = if path.exists() {
            fs::metadata(&path)?.len()
        } else {
            0
        };

        Ok(StorageStats {
            file_size,
            backup_count: self.list_backups().len(),
            data_dir: self.config.data_dir.clone(),
        })
    }
}

/// Borrowed form of [`Snapshot`] so saving does not clone the ledger
#[derive(Serialize)]
struct SnapshotRef<'a> {
    ledger: &'a Ledger,
    treasury: &'a Treasury,
    saved_at: DateTime<Utc>,
}

fn read_snapshot(path: &std::path::Path) -> Result<Snapshot, StorageError> {
    let file = fs::File::open(path)?;
    let reader = BufReader::new(file);
    let snapshot: Snapshot = serde_json::from_reader(reader)?;
    snapshot.validate()?;
    Ok(snapshot)
}

/// Storage statistics
#[derive(Debug)]
pub struct StorageStats {
    pub file_size: u64,
    pub backup_count: usize,
    pub data_dir: PathBuf,
}
