//! Memory engine
//!
//! The public entry point. Wraps [`Storage`] and an injected [`Clock`], and
//! runs every operation in the right transaction: IMMEDIATE for anything that
//! writes, a deferred read transaction for multi-statement reads.

use std::sync::Arc;

use serde_json::Value;

use crate::clock::{Clock, SystemClock};
use crate::config::MnemonicConfig;
use crate::error::Result;
use crate::export::{self, ExportDocument, ImportOptions, ImportSummary};
use crate::intelligence::maintenance::{self, MaintenanceOptions, MaintenanceReport};
use crate::search;
use crate::storage::queries;
use crate::storage::Storage;
use crate::types::*;

/// Default number of memories returned by trigger matching
pub const DEFAULT_TRIGGER_LIMIT: usize = 10;

/// Weighted memory store
#[derive(Clone)]
pub struct MemoryEngine {
    storage: Storage,
    clock: Arc<dyn Clock>,
}

impl MemoryEngine {
    /// Open a store using the system clock
    pub fn open(config: MnemonicConfig) -> Result<Self> {
        Self::open_with_clock(config, Arc::new(SystemClock))
    }

    pub fn open_with_clock(config: MnemonicConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        let storage = Storage::open(config)?;
        if let Some(warning) = storage.storage_mode_warning() {
            tracing::warn!("{}", warning);
        }
        tracing::debug!(path = storage.db_path(), "Opened memory store");
        Ok(Self { storage, clock })
    }

    /// In-memory store, for tests and benchmarks
    pub fn in_memory() -> Result<Self> {
        Self::open(MnemonicConfig::in_memory())
    }

    pub fn in_memory_with_clock(clock: Arc<dyn Clock>) -> Result<Self> {
        Self::open_with_clock(MnemonicConfig::in_memory(), clock)
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    pub fn config(&self) -> &MnemonicConfig {
        self.storage.config()
    }

    fn now(&self) -> chrono::DateTime<chrono::Utc> {
        self.clock.now()
    }

    /// Create a memory
    pub fn create(&self, input: CreateMemoryInput) -> Result<Memory> {
        let now = self.now();
        let memory = self
            .storage
            .with_transaction(|conn| queries::create_memory(conn, &input, now))?;
        tracing::debug!(id = %memory.id, "Created memory");
        Ok(memory)
    }

    /// Fetch a memory, recording one access
    pub fn get(&self, id: &str) -> Result<Memory> {
        let now = self.now();
        let memory = self
            .storage
            .with_transaction(|conn| queries::get_memory(conn, id, now))?;
        tracing::debug!(id, access_count = memory.access_count, "Fetched memory");
        Ok(memory)
    }

    /// Apply a partial update
    pub fn update(&self, id: &str, input: UpdateMemoryInput) -> Result<Memory> {
        let now = self.now();
        let memory = self
            .storage
            .with_transaction(|conn| queries::update_memory(conn, id, &input, now))?;
        tracing::debug!(id, "Updated memory");
        Ok(memory)
    }

    /// Hard-delete a memory. Returns false if it did not exist.
    pub fn delete(&self, id: &str) -> Result<bool> {
        let deleted = self
            .storage
            .with_transaction(|conn| queries::delete_memory(conn, id))?;
        tracing::debug!(id, deleted, "Deleted memory");
        Ok(deleted)
    }

    /// List memories. Never records access.
    pub fn list(&self, options: ListOptions) -> Result<Page<Memory>> {
        let now = self.now();
        let limit = self.config().page_limit(options.limit);
        let offset = options.offset.unwrap_or(0);
        self.storage
            .with_read_transaction(|conn| queries::list_memories(conn, &options, limit, offset, now))
    }

    /// Set or clear the pinned flag; the stored weight is left alone
    pub fn pin(&self, id: &str, pinned: bool) -> Result<Memory> {
        self.update(
            id,
            UpdateMemoryInput {
                pinned: Some(pinned),
                ..Default::default()
            },
        )
    }

    pub fn archive(&self, id: &str) -> Result<Memory> {
        self.set_status(id, MemoryStatus::Archived)
    }

    pub fn restore(&self, id: &str) -> Result<Memory> {
        self.set_status(id, MemoryStatus::Active)
    }

    fn set_status(&self, id: &str, status: MemoryStatus) -> Result<Memory> {
        self.update(
            id,
            UpdateMemoryInput {
                status: Some(status),
                ..Default::default()
            },
        )
    }

    /// Ranked search over text, tags and status
    pub fn search(&self, options: SearchOptions) -> Result<Page<SearchResult>> {
        let now = self.now();
        let limit = self.config().page_limit(options.limit);
        let offset = options.offset.unwrap_or(0);
        let weights = self.config().ranking;

        if !options.track_access {
            return self.storage.with_read_transaction(|conn| {
                search::search_memories(conn, &options, weights, limit, offset, now)
            });
        }

        self.storage.with_transaction(|conn| {
            let mut page = search::search_memories(conn, &options, weights, limit, offset, now)?;
            for result in &mut page.items {
                queries::record_access(conn, &result.memory.id, now)?;
                result.memory.access_count += 1;
                result.memory.last_accessed_at = now;
            }
            Ok(page)
        })
    }

    /// Memories whose trigger phrases occur in `utterance`
    pub fn match_triggers(&self, utterance: &str, limit: Option<usize>) -> Result<Vec<Memory>> {
        let now = self.now();
        let limit = limit
            .unwrap_or(DEFAULT_TRIGGER_LIMIT)
            .clamp(1, self.config().max_limit);
        self.storage
            .with_read_transaction(|conn| search::match_triggers(conn, utterance, limit, now))
    }

    /// Snapshot the whole store
    pub fn export(&self) -> Result<ExportDocument> {
        export::export_document(&self.storage, self.now())
    }

    /// Import a document produced by [`MemoryEngine::export`]
    pub fn import(
        &self,
        document: &Value,
        options: impl Into<ImportOptions>,
    ) -> Result<ImportSummary> {
        export::import_document(&self.storage, document, options.into(), self.now())
    }

    /// Import from an [`ExportDocument`] value
    pub fn import_document(
        &self,
        document: &ExportDocument,
        options: impl Into<ImportOptions>,
    ) -> Result<ImportSummary> {
        let value = serde_json::to_value(document)?;
        self.import(&value, options)
    }

    pub fn stats(&self) -> Result<MemoryStats> {
        let now = self.now();
        self.storage
            .with_read_transaction(|conn| queries::get_stats(conn, now))
    }

    /// Report stale memories and optionally archive them
    pub fn maintenance(&self, options: MaintenanceOptions) -> Result<MaintenanceReport> {
        let now = self.now();
        if options.archive_stale {
            self.storage
                .with_transaction(|conn| maintenance::run_maintenance(conn, &options, now))
        } else {
            self.storage
                .with_read_transaction(|conn| maintenance::run_maintenance(conn, &options, now))
        }
    }
}
