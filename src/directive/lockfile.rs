//! Lockfile tracking for registry-installed directives.
//!
//! `~/.dirigent/directives.lock.json` records what was downloaded into the
//! user tier: version, a truncated content hash, origin, and timestamp. The
//! sync engine consults it to decide whether a directive needs re-download
//! and to detect local edits to installed files.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::error::DirigentError;

pub const LOCKFILE_VERSION: u32 = 1;
pub const LOCKFILE_NAME: &str = "directives.lock.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockFile {
    pub lockfile_version: u32,
    /// Keyed by directive name. BTreeMap keeps the serialized file diffable.
    pub directives: BTreeMap<String, LockEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LockEntry {
    pub version: String,
    /// `sha256:` + first 16 hex chars of the content digest.
    pub hash: String,
    /// Where the content came from, e.g. `registry`.
    pub source: String,
    pub downloaded_at: String,
}

impl Default for LockFile {
    fn default() -> Self {
        Self {
            lockfile_version: LOCKFILE_VERSION,
            directives: BTreeMap::new(),
        }
    }
}

/// Why a directive does or does not need a re-download.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateReason {
    NotInstalled,
    VersionChanged,
    ContentChanged,
    UpToDate,
}

impl UpdateReason {
    pub fn needs_update(&self) -> bool {
        !matches!(self, Self::UpToDate)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotInstalled => "not_installed",
            Self::VersionChanged => "version_changed",
            Self::ContentChanged => "content_changed",
            Self::UpToDate => "up_to_date",
        }
    }
}

/// Outcome of checking an installed file against its lock entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileStatus {
    NotInLockfile,
    FileMissing,
    /// On-disk content no longer matches the recorded hash (local edit).
    HashMismatch,
    Valid,
}

impl FileStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotInLockfile => "not_in_lockfile",
            Self::FileMissing => "file_missing",
            Self::HashMismatch => "hash_mismatch",
            Self::Valid => "valid",
        }
    }
}

/// Truncated content hash in the lockfile format.
pub fn compute_content_hash(content: &str) -> String {
    let digest = Sha256::digest(content.as_bytes());
    format!("sha256:{}", &hex::encode(digest)[..16])
}

impl LockFile {
    /// Load from `path`. Missing, corrupt, or version-mismatched files reset
    /// to an empty lockfile rather than blocking sync.
    pub fn load(path: &Path) -> Self {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(_) => return Self::default(),
        };
        match serde_json::from_str::<LockFile>(&raw) {
            Ok(lock) if lock.lockfile_version == LOCKFILE_VERSION => lock,
            Ok(lock) => {
                warn!(
                    found = lock.lockfile_version,
                    expected = LOCKFILE_VERSION,
                    "lockfile version mismatch, resetting"
                );
                Self::default()
            }
            Err(err) => {
                warn!(error = %err, path = %path.display(), "corrupt lockfile, resetting");
                Self::default()
            }
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), DirigentError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(anyhow::Error::from)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&LockEntry> {
        self.directives.get(name)
    }

    /// Record an installed directive, stamping the current time.
    pub fn set(&mut self, name: &str, version: &str, hash: &str, source: &str) {
        self.directives.insert(
            name.to_string(),
            LockEntry {
                version: version.to_string(),
                hash: hash.to_string(),
                source: source.to_string(),
                downloaded_at: Utc::now().to_rfc3339(),
            },
        );
    }

    /// Remove an entry; returns whether it existed.
    pub fn remove(&mut self, name: &str) -> bool {
        self.directives.remove(name).is_some()
    }

    /// Compare a registry version/hash pair against the recorded entry.
    pub fn needs_update(&self, name: &str, registry_version: &str, registry_hash: &str) -> UpdateReason {
        match self.get(name) {
            None => UpdateReason::NotInstalled,
            Some(entry) if entry.version != registry_version => UpdateReason::VersionChanged,
            Some(entry) if entry.hash != registry_hash => UpdateReason::ContentChanged,
            Some(_) => UpdateReason::UpToDate,
        }
    }

    /// Check the installed file at `path` against the lock entry for `name`.
    pub fn verify_local_file(&self, name: &str, path: &Path) -> FileStatus {
        let Some(entry) = self.get(name) else {
            return FileStatus::NotInLockfile;
        };
        let Ok(content) = std::fs::read_to_string(path) else {
            return FileStatus::FileMissing;
        };
        if compute_content_hash(&content) == entry.hash {
            FileStatus::Valid
        } else {
            FileStatus::HashMismatch
        }
    }
}

/// Default lockfile path alongside the user tier.
pub fn default_lockfile_path(dirigent_dir: &Path) -> PathBuf {
    dirigent_dir.join(LOCKFILE_NAME)
}
