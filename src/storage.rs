//! Flat-file cache of scraped pages.
//!
//! The cache is a single JSON array of [`PageRecord`]s. Appends splice the new
//! record in before the closing bracket and replace the file atomically, so a
//! reader never sees a half-written document. A store-wide lock serializes
//! lookups and appends within the process.
//!
//! Elements that no longer decode as a record are skipped with a warning rather
//! than failing the whole document.

use crate::record::{normalize_website, PageRecord};
use serde_json::Value;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tempfile::NamedTempFile;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("cache io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("cache serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("cache file {0} is not a JSON array")]
    Corrupt(PathBuf),
    #[error("cache task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Result of an append
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    /// The record was written
    Appended,
    /// A record for the same website already existed; the earlier one wins
    AlreadyPresent,
}

/// JSON-file cache of page records keyed by normalized website.
pub struct CacheStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl CacheStore {
    /// Open the cache at `path`. The file is created lazily on first append.
    pub fn open<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Find the first record stored for `website`
    pub fn lookup(&self, website: &str) -> Result<Option<PageRecord>, CacheError> {
        let key = normalize_website(website);
        let _guard = self.guard();

        Ok(self
            .read_records()?
            .into_iter()
            .find(|record| record.website == key))
    }

    /// Append `record` unless a record for the same website is already stored.
    ///
    /// The record's website is normalized before it is written.
    pub fn append(&self, record: &PageRecord) -> Result<AppendOutcome, CacheError> {
        let mut record = record.clone();
        record.website = normalize_website(&record.website);

        let _guard = self.guard();

        let existing = self.read_text()?;
        let records = self.decode(Self::parse(&self.path, &existing)?);
        if records.iter().any(|r| r.website == record.website) {
            return Ok(AppendOutcome::AlreadyPresent);
        }

        let document = splice(&existing, &serde_json::to_string(&record)?);
        self.replace(&document)?;

        Ok(AppendOutcome::Appended)
    }

    /// All stored records in file order
    pub fn list(&self) -> Result<Vec<PageRecord>, CacheError> {
        let _guard = self.guard();
        self.read_records()
    }

    /// Number of stored records
    pub fn count(&self) -> Result<usize, CacheError> {
        Ok(self.list()?.len())
    }

    fn guard(&self) -> MutexGuard<'_, ()> {
        // The guarded data is (), so a poisoned lock carries no broken state
        self.lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn read_records(&self) -> Result<Vec<PageRecord>, CacheError> {
        let text = self.read_text()?;
        Ok(self.decode(Self::parse(&self.path, &text)?))
    }

    fn decode(&self, entries: Vec<Value>) -> Vec<PageRecord> {
        entries
            .into_iter()
            .enumerate()
            .filter_map(|(idx, entry)| match serde_json::from_value(entry) {
                Ok(record) => Some(record),
                Err(e) => {
                    tracing::warn!("Skipping cache entry {} in {}: {}", idx, self.path.display(), e);
                    None
                }
            })
            .collect()
    }

    /// Current file contents; a missing file reads as empty
    fn read_text(&self) -> Result<String, CacheError> {
        match std::fs::read_to_string(&self.path) {
            Ok(text) => Ok(text),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(String::new()),
            Err(e) => Err(e.into()),
        }
    }

    /// Validate the document as a JSON array and return its raw elements
    fn parse(path: &Path, text: &str) -> Result<Vec<Value>, CacheError> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(Vec::new());
        }
        if !(text.starts_with('[') && text.ends_with(']')) {
            return Err(CacheError::Corrupt(path.to_path_buf()));
        }
        Ok(serde_json::from_str(text)?)
    }

    /// Write `document` to a temporary file beside the cache and rename it into place
    fn replace(&self, document: &str) -> Result<(), CacheError> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir)?;

        let mut file = NamedTempFile::new_in(&dir)?;
        file.write_all(document.as_bytes())?;
        file.as_file().sync_all()?;
        file.persist(&self.path).map_err(|e| CacheError::Io(e.error))?;
        Ok(())
    }
}

/// Insert `entry` as the last element of the JSON array in `existing`.
///
/// Earlier records are carried over byte-for-byte.
fn splice(existing: &str, entry: &str) -> String {
    let body = existing.trim();
    let Some(open) = body.strip_suffix(']') else {
        return format!("[{entry}]");
    };

    let open = open.trim_end();
    if open.ends_with('[') {
        format!("{open}{entry}]")
    } else {
        format!("{open},\n{entry}]")
    }
}
