//! Tag backups.
//!
//! A backup is the list of `{id, tags}` pairs of the matched resources, read
//! fresh from the provider right before a mutating run. Restoring replays it:
//! every listed resource gets exactly the recorded tag map back.
//!
//! On disk a backup is a JSON array:
//!
//! ```json
//! [
//!   { "id": "/subscriptions/.../disks/d1", "tags": { "env": "prod", "flag": null } }
//! ]
//! ```

use crate::error::{Error, Result};
use crate::matcher::MatchTable;
use crate::routing::TagWriter;
use armkit::retry::{LogCallback, with_retry};
use armkit::{CallContext, Resource, ResourceProvider, RetryConfig, Tags};
use chrono::Utc;
use serde::{Deserialize, Deserializer, Serialize};
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Prefix of every backup file name.
pub const BACKUP_PREFIX: &str = "tagwarden";

const MAX_NAME_ATTEMPTS: u32 = 1000;

/// Recorded tags of one resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupEntry {
    pub id: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub tags: Tags,
}

/// `"tags": null` is written by older tools for untagged resources.
fn null_as_empty<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Tags, D::Error> {
    Ok(Option::<Tags>::deserialize(deserializer)?.unwrap_or_default())
}

/// An ordered tag snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Backup {
    entries: Vec<BackupEntry>,
}

impl Backup {
    pub fn new(entries: Vec<BackupEntry>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[BackupEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Read a backup file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| Error::BackupFormat {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        serde_json::from_str(&content).map_err(|e| Error::BackupFormat {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| Error::BackupFormat {
            path: PathBuf::new(),
            message: e.to_string(),
        })
    }

    /// Write the backup into `dir` under a fresh file name and return its path.
    ///
    /// Never overwrites an existing file: a name collision gets a numeric suffix.
    pub fn persist(&self, dir: &Path) -> Result<PathBuf> {
        fs::create_dir_all(dir).map_err(|e| Error::io(dir, e))?;
        let json = self.to_json()?;
        let stamp = Utc::now().format("%Y%m%dT%H%M%SZ").to_string();

        for attempt in 0..MAX_NAME_ATTEMPTS {
            let name = if attempt == 0 {
                format!("{BACKUP_PREFIX}.{stamp}.json")
            } else {
                format!("{BACKUP_PREFIX}.{stamp}.{attempt}.json")
            };
            let path = dir.join(name);

            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(file) => {
                    write_or_discard(&path, file, json.as_bytes())?;
                    log::info!("Backup of {} resource(s) written to {}", self.len(), path.display());
                    return Ok(path);
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {}
                Err(e) => return Err(Error::io(&path, e)),
            }
        }

        Err(Error::io(
            dir,
            io::Error::new(io::ErrorKind::AlreadyExists, "no free backup file name"),
        ))
    }
}

/// Write `content` to the freshly created `path`, removing the file if the
/// write fails.
fn write_or_discard<W: Write>(path: &Path, mut out: W, content: &[u8]) -> Result<()> {
    let written = out.write_all(content).and_then(|()| out.flush());
    drop(out);

    if let Err(e) = written {
        if let Err(remove) = fs::remove_file(path) {
            log::warn!("Could not remove partial backup {}: {remove}", path.display());
        }
        return Err(Error::io(path, e));
    }
    Ok(())
}

/// Outcome of a completed restore.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RestoreSummary {
    /// Entries whose tags were written back.
    pub restored: usize,
}

/// Takes and replays backups against a provider.
pub struct BackupManager<'p, P: ResourceProvider + ?Sized> {
    provider: &'p P,
    writer: TagWriter,
    retry: RetryConfig,
}

impl<'p, P: ResourceProvider + ?Sized> BackupManager<'p, P> {
    pub fn new(provider: &'p P) -> Self {
        Self {
            provider,
            writer: TagWriter::default(),
            retry: RetryConfig::default(),
        }
    }

    #[must_use]
    pub fn with_writer(mut self, writer: TagWriter) -> Self {
        self.writer = writer;
        self
    }

    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Read the current tags of every resource in `table`, in id order.
    pub fn snapshot(&self, ctx: &CallContext, table: &MatchTable) -> Result<Backup> {
        let mut entries = Vec::with_capacity(table.len());
        for (id, _) in table {
            let resource = self.fetch(ctx, id).map_err(|source| Error::Snapshot {
                resource_id: id.clone(),
                source,
            })?;
            entries.push(BackupEntry {
                id: id.clone(),
                tags: resource.tags,
            });
        }
        Ok(Backup::new(entries))
    }

    /// Snapshot `table` and persist it into `dir`.
    pub fn create(&self, ctx: &CallContext, table: &MatchTable, dir: &Path) -> Result<PathBuf> {
        self.snapshot(ctx, table)?.persist(dir)
    }

    /// Replace the tags of every entry with the recorded ones, in order.
    ///
    /// Stops at the first failure. Entries restored before it stay restored.
    pub fn restore(&self, ctx: &CallContext, backup: &Backup) -> Result<RestoreSummary> {
        for (restored, entry) in backup.entries().iter().enumerate() {
            log::info!("Restoring tags of {}", entry.id);
            self.restore_entry(ctx, entry)
                .map_err(|source| Error::Restore {
                    resource_id: entry.id.clone(),
                    restored,
                    source,
                })?;
        }
        Ok(RestoreSummary {
            restored: backup.len(),
        })
    }

    fn restore_entry(&self, ctx: &CallContext, entry: &BackupEntry) -> armkit::Result<()> {
        let current = self.fetch(ctx, &entry.id)?;
        self.writer
            .write(self.provider, ctx, &entry.id, &current.kind, &entry.tags)
    }

    fn fetch(&self, ctx: &CallContext, id: &str) -> armkit::Result<Resource> {
        let api_version = self.writer.api_version(id);
        with_retry(&self.retry, ctx, Some(&LogCallback), || {
            self.provider.get_resource_by_id(ctx, id, api_version)
        })
    }
}
