//! Maintenance pass over active memories
//!
//! Runs only when asked. Reports every active memory whose effective weight
//! has fallen below the stale threshold and, if requested, archives the
//! non-pinned ones in the caller's transaction.

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use super::weight::WeightBreakdown;
use crate::error::Result;
use crate::storage::queries;
use crate::types::{MemoryId, MemoryStatus};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MaintenanceOptions {
    /// Move stale, non-pinned memories to `archived`
    #[serde(default)]
    pub archive_stale: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MaintenanceReport {
    /// Active memories examined
    pub scanned: usize,
    /// Stale memories, lowest effective weight first
    pub stale: Vec<WeightBreakdown>,
    /// IDs moved to `archived` by this pass
    pub archived: Vec<MemoryId>,
    pub ran_at: Option<DateTime<Utc>>,
}

/// Scan active memories and optionally archive the stale ones
pub fn run_maintenance(
    conn: &Connection,
    options: &MaintenanceOptions,
    now: DateTime<Utc>,
) -> Result<MaintenanceReport> {
    let active = queries::load_memories(conn, Some(MemoryStatus::Active))?;

    let mut stale: Vec<WeightBreakdown> = active
        .iter()
        .map(|m| WeightBreakdown::of(m, now))
        .filter(|b| b.stale)
        .collect();
    stale.sort_by(|a, b| {
        a.effective_weight
            .total_cmp(&b.effective_weight)
            .then_with(|| a.id.cmp(&b.id))
    });

    let mut archived = Vec::new();
    if options.archive_stale {
        archived = stale
            .iter()
            .filter(|b| !b.pinned)
            .map(|b| b.id.clone())
            .collect();
        queries::set_status(conn, &archived, MemoryStatus::Archived, now)?;
    }

    tracing::info!(
        scanned = active.len(),
        stale = stale.len(),
        archived = archived.len(),
        "Maintenance pass complete"
    );

    Ok(MaintenanceReport {
        scanned: active.len(),
        stale,
        archived,
        ran_at: Some(now),
    })
}
