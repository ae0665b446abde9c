//! In-memory capsule store.

use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::{audit_timestamp, Capsule, CapsuleFilter, CapsulePatch, CapsuleQuery, CapsuleStore, NewCapsule};
use crate::error::Result;

/// Capsule collection held in process memory. Data is lost on exit.
#[derive(Debug, Default)]
pub struct MemoryStore {
    capsules: RwLock<Vec<Capsule>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<Capsule>> {
        self.capsules.read().unwrap_or_else(|poisoned| {
            tracing::warn!("capsule store lock was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<Capsule>> {
        self.capsules.write().unwrap_or_else(|poisoned| {
            tracing::warn!("capsule store lock was poisoned, recovering");
            poisoned.into_inner()
        })
    }
}

impl CapsuleStore for MemoryStore {
    fn insert(&self, capsule: NewCapsule) -> Result<Capsule> {
        let record = Capsule {
            id: uuid::Uuid::new_v4().to_string(),
            content: capsule.content,
            tags: capsule.tags,
            timestamp: capsule.timestamp,
            created_at: audit_timestamp(),
        };
        self.write().push(record.clone());
        Ok(record)
    }

    fn select(&self, query: &CapsuleQuery) -> Result<Vec<Capsule>> {
        let guard = self.read();
        let mut matched: Vec<&Capsule> = guard.iter().filter(|c| query.filter.matches(c)).collect();
        matched.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then_with(|| a.id.cmp(&b.id)));

        let window = matched.into_iter().skip(query.offset);
        let rows = match query.limit {
            Some(limit) => window.take(limit).cloned().collect(),
            None => window.cloned().collect(),
        };
        Ok(rows)
    }

    fn count(&self, filter: &CapsuleFilter) -> Result<usize> {
        Ok(self.read().iter().filter(|c| filter.matches(c)).count())
    }

    fn update_by_id(&self, id: &str, patch: CapsulePatch) -> Result<Option<Capsule>> {
        let mut guard = self.write();
        let Some(capsule) = guard.iter_mut().find(|c| c.id == id) else {
            return Ok(None);
        };
        if let Some(content) = patch.content {
            capsule.content = content;
        }
        if let Some(tags) = patch.tags {
            capsule.tags = tags;
        }
        Ok(Some(capsule.clone()))
    }

    fn delete_by_id(&self, id: &str) -> Result<bool> {
        let mut guard = self.write();
        let before = guard.len();
        guard.retain(|c| c.id != id);
        Ok(guard.len() != before)
    }
}
