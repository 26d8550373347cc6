//! Flat-file persistence for moderation lists.
//!
//! The on-disk format is JSON lines, one record per line:
//!
//! ```text
//! {"address":"*@spam.example","create_time":1700000000,"duration":24,"creator":"root","reason":"spam"}
//! ```
//!
//! Q-lines use `nick` instead of `address`. Adds append a line; removes, and
//! adds that dropped expired records, rewrite the whole file through a
//! temporary sibling and a rename.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

use super::moderation::{ModerationKind, ModerationRecord};

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("moderation file I/O: {0}")]
    Io(#[from] io::Error),
    #[error("{path}:{line}: corrupt record: {reason}")]
    Corrupt {
        path: String,
        line: usize,
        reason: String,
    },
}

/// Storage behind a moderation list.
pub trait ModerationPersist: Send + Sync + fmt::Debug {
    /// Read every stored record.
    fn load(&self) -> Result<Vec<ModerationRecord>, PersistError>;
    /// Store one additional record.
    fn append(&self, record: &ModerationRecord) -> Result<(), PersistError>;
    /// Replace the stored set.
    fn rewrite(&self, records: &[ModerationRecord]) -> Result<(), PersistError>;
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredRecord {
    #[serde(alias = "nick")]
    address: String,
    create_time: i64,
    duration: u32,
    creator: String,
    reason: String,
}

/// JSON-lines file backend.
#[derive(Debug, Clone)]
pub struct JsonLinesFile {
    path: PathBuf,
    kind: ModerationKind,
}

impl JsonLinesFile {
    pub fn new(path: impl Into<PathBuf>, kind: ModerationKind) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn encode(&self, record: &ModerationRecord) -> Result<String, PersistError> {
        let mut map = serde_json::Map::new();
        map.insert(self.kind.target_field().into(), record.target.clone().into());
        map.insert("create_time".into(), record.created_at.into());
        map.insert("duration".into(), record.duration_hours.into());
        map.insert("creator".into(), record.creator.clone().into());
        map.insert("reason".into(), record.reason.clone().into());
        serde_json::to_string(&map).map_err(|e| PersistError::Io(io::Error::other(e)))
    }
}

impl ModerationPersist for JsonLinesFile {
    fn load(&self) -> Result<Vec<ModerationRecord>, PersistError> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut records = Vec::new();
        for (index, line) in text.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let stored: StoredRecord =
                serde_json::from_str(line).map_err(|e| PersistError::Corrupt {
                    path: self.path.display().to_string(),
                    line: index + 1,
                    reason: e.to_string(),
                })?;
            records.push(ModerationRecord {
                target: stored.address,
                created_at: stored.create_time,
                duration_hours: stored.duration,
                creator: stored.creator,
                reason: stored.reason,
            });
        }
        Ok(records)
    }

    fn append(&self, record: &ModerationRecord) -> Result<(), PersistError> {
        let line = self.encode(record)?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{line}")?;
        Ok(())
    }

    fn rewrite(&self, records: &[ModerationRecord]) -> Result<(), PersistError> {
        let mut body = String::new();
        for record in records {
            body.push_str(&self.encode(record)?);
            body.push('\n');
        }
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, body)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}
