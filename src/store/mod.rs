//! Capsule persistence.
//!
//! The tool handlers only see the [`CapsuleStore`] trait. Two backends implement
//! it: [`SqliteStore`] for on-disk collections and [`MemoryStore`] for cache mode
//! and tests.

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

use crate::error::Result;

/// A stored capsule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capsule {
    /// Store-assigned identifier, never reused.
    pub id: String,
    /// Trimmed note text.
    pub content: String,
    /// Free-form tags in insertion order.
    pub tags: Vec<String>,
    /// Creation time in epoch milliseconds. Sole ordering key.
    pub timestamp: i64,
    /// Store-assigned audit timestamp (RFC 3339). Display only.
    pub created_at: String,
}

/// Fields supplied by a creating handler.
///
/// The handler stamps `timestamp`; the store assigns `id` and `created_at`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCapsule {
    /// Already-trimmed content.
    pub content: String,
    /// Tags, possibly empty.
    pub tags: Vec<String>,
    /// Creation time in epoch milliseconds.
    pub timestamp: i64,
}

/// Partial update. `None` leaves the field unchanged; `timestamp` is never touched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapsulePatch {
    /// Replacement content.
    pub content: Option<String>,
    /// Replacement tag list.
    pub tags: Option<Vec<String>>,
}

/// Row filter. Every populated field must match.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapsuleFilter {
    /// Case-insensitive substring match on `content`.
    pub content_contains: Option<String>,
    /// Tag overlap: at least one of these tags is present.
    pub tags_any: Option<Vec<String>>,
    /// Tag containment: all of these tags are present.
    pub tags_all: Option<Vec<String>>,
    /// Inclusive lower bound on `timestamp`.
    pub since: Option<i64>,
}

impl CapsuleFilter {
    /// Evaluate the filter against one capsule.
    pub fn matches(&self, capsule: &Capsule) -> bool {
        if let Some(needle) = &self.content_contains {
            if !capsule
                .content
                .to_lowercase()
                .contains(&needle.to_lowercase())
            {
                return false;
            }
        }
        if let Some(any) = &self.tags_any {
            if !any.iter().any(|t| capsule.tags.contains(t)) {
                return false;
            }
        }
        if let Some(all) = &self.tags_all {
            if !all.iter().all(|t| capsule.tags.contains(t)) {
                return false;
            }
        }
        if let Some(since) = self.since {
            if capsule.timestamp < since {
                return false;
            }
        }
        true
    }
}

/// A read request: filter plus pagination window.
///
/// Results are always ordered by `timestamp` descending, then `id` ascending.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapsuleQuery {
    /// Row filter.
    pub filter: CapsuleFilter,
    /// Maximum rows to return; `None` means unbounded.
    pub limit: Option<usize>,
    /// Rows to skip before the window starts.
    pub offset: usize,
}

impl CapsuleQuery {
    /// Query matching every capsule.
    pub fn all() -> Self {
        Self::default()
    }

    /// Query with the given filter and no window.
    pub fn filtered(filter: CapsuleFilter) -> Self {
        Self {
            filter,
            ..Self::default()
        }
    }

    /// Restrict the query to `limit` rows starting at `offset`.
    pub fn window(mut self, offset: usize, limit: usize) -> Self {
        self.offset = offset;
        self.limit = Some(limit);
        self
    }
}

/// Query/mutation interface consumed by the tool handlers.
pub trait CapsuleStore: Send + Sync {
    /// Persist a new capsule and return the full record.
    fn insert(&self, capsule: NewCapsule) -> Result<Capsule>;

    /// Return matching capsules, newest first, within the query window.
    fn select(&self, query: &CapsuleQuery) -> Result<Vec<Capsule>>;

    /// Exact number of capsules matching the filter.
    fn count(&self, filter: &CapsuleFilter) -> Result<usize>;

    /// Apply a partial update. Returns `None` when the id is unknown.
    fn update_by_id(&self, id: &str, patch: CapsulePatch) -> Result<Option<Capsule>>;

    /// Remove a capsule. Returns whether it existed.
    fn delete_by_id(&self, id: &str) -> Result<bool>;
}

/// How to open the capsule store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreConfig {
    /// SQLite database file.
    Sqlite {
        /// Database file path; created if missing unless read-only.
        path: PathBuf,
        /// Open without write access.
        read_only: bool,
    },
    /// Non-persistent in-memory collection.
    Memory,
}

impl StoreConfig {
    /// Open the configured backend.
    pub fn open(&self) -> Result<Arc<dyn CapsuleStore>> {
        match self {
            StoreConfig::Sqlite { path, read_only } => {
                let store = if *read_only {
                    SqliteStore::open_read_only(path)?
                } else {
                    SqliteStore::open(path)?
                };
                Ok(Arc::new(store))
            }
            StoreConfig::Memory => Ok(Arc::new(MemoryStore::new())),
        }
    }
}

/// Current wall-clock time as an RFC 3339 string.
pub(crate) fn audit_timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}
