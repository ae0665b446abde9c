//! MCP session management.
//!
//! Holds the process-lifetime store handle. The store is opened on first use
//! and shared by every later call.

use std::sync::{Arc, OnceLock};

use crate::error::{McpError, Result};
use crate::store::{CapsuleStore, StoreConfig};

/// MCP session state.
///
/// Carries no per-request state: every tool call only reads the shared store
/// handle, so a session can be used from many calls at once.
pub struct McpSession {
    /// How to open the store on first use
    config: StoreConfig,
    /// Opened store, assigned once
    store: OnceLock<Arc<dyn CapsuleStore>>,
}

impl McpSession {
    /// Create a session that opens `config` lazily.
    pub fn new(config: StoreConfig) -> Self {
        Self {
            config,
            store: OnceLock::new(),
        }
    }

    /// Create a session around an already-open store.
    pub fn with_store(store: Arc<dyn CapsuleStore>) -> Self {
        let session = Self::new(StoreConfig::Memory);
        let _ = session.store.set(store);
        session
    }

    /// The store configuration this session was built with.
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Get the shared store, opening it on first use.
    pub fn store(&self) -> Result<&dyn CapsuleStore> {
        if let Some(store) = self.store.get() {
            return Ok(store.as_ref());
        }

        let opened = self.config.open()?;
        // A racing caller may have won; either handle is equivalent.
        let _ = self.store.set(opened);
        self.store
            .get()
            .map(|s| s.as_ref())
            .ok_or_else(|| McpError::Internal("capsule store failed to initialize".to_string()))
    }

    /// Current time in epoch milliseconds.
    pub fn now_millis(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}
