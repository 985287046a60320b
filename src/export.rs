//! Export and import of the whole store
//!
//! The export document is versioned JSON. Import is record-by-record: each
//! memory commits with its tags and triggers in its own transaction, so a
//! failure part way through leaves every earlier record in place.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{MnemonicError, Result};
use crate::storage::queries;
use crate::storage::Storage;
use crate::types::{Memory, MemoryId, MemoryStatus, MemoryType};

/// Value of the `format` field
pub const EXPORT_FORMAT: &str = "mnemonic";
/// Current document version; any 1.x document can be imported
pub const EXPORT_VERSION: &str = "1.0";

/// Portable snapshot of the store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportDocument {
    pub format: String,
    pub version: String,
    pub exported_at: DateTime<Utc>,
    pub count: usize,
    /// Full tag vocabulary, including unreferenced tags
    pub tags: Vec<String>,
    pub memories: Vec<Memory>,
}

/// What to do when an imported id already exists
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ConflictPolicy {
    #[default]
    Skip,
    Overwrite,
    FailFast,
}

impl std::str::FromStr for ConflictPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "skip" => Ok(ConflictPolicy::Skip),
            "overwrite" => Ok(ConflictPolicy::Overwrite),
            "fail_fast" | "fail-fast" => Ok(ConflictPolicy::FailFast),
            _ => Err(format!("Unknown conflict policy: {}", s)),
        }
    }
}

/// How an import treats the ids in the document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportOptions {
    #[serde(default)]
    pub policy: ConflictPolicy,
    /// Keep document ids. When false every record is inserted as a fresh
    /// copy under a new id, so `policy` never comes into play.
    #[serde(default = "default_preserve_ids")]
    pub preserve_ids: bool,
}

fn default_preserve_ids() -> bool {
    true
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            policy: ConflictPolicy::default(),
            preserve_ids: true,
        }
    }
}

impl From<ConflictPolicy> for ImportOptions {
    fn from(policy: ConflictPolicy) -> Self {
        Self {
            policy,
            ..Default::default()
        }
    }
}

impl ImportOptions {
    /// Import every record as a new memory
    pub fn fresh_ids() -> Self {
        Self {
            preserve_ids: false,
            ..Default::default()
        }
    }
}

/// A record that could not be imported
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ImportError {
    /// Position in the `memories` array
    pub index: usize,
    pub id: Option<MemoryId>,
    pub message: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImportSummary {
    pub total: usize,
    pub created: usize,
    pub overwritten: usize,
    pub skipped: usize,
    pub failed: usize,
    pub errors: Vec<ImportError>,
    /// The record that stopped the import, if it did not run to the end
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stopped_at: Option<ImportError>,
}

/// One memory as it appears in an import document; most fields are optional
#[derive(Debug, Clone, Deserialize)]
struct ImportRecord {
    id: Option<String>,
    #[serde(default, rename = "type")]
    memory_type: MemoryType,
    title: String,
    content: String,
    weight: Option<f64>,
    #[serde(default)]
    pinned: bool,
    #[serde(default)]
    emotional_flag: bool,
    #[serde(default)]
    status: MemoryStatus,
    created_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
    last_accessed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    access_count: i64,
    #[serde(default)]
    metadata: Option<Value>,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    triggers: Vec<String>,
}

impl ImportRecord {
    fn into_memory(self, preserve_ids: bool, now: DateTime<Utc>) -> Result<Memory> {
        let title = queries::validate_title(&self.title)?;
        queries::validate_content(&self.content)?;
        let weight = queries::clamp_weight(self.weight.unwrap_or(crate::types::DEFAULT_WEIGHT))?;

        let id = match self.id {
            Some(id) if preserve_ids && !id.trim().is_empty() => id,
            _ => uuid::Uuid::new_v4().to_string(),
        };
        let created_at = self.created_at.unwrap_or(now);

        Ok(Memory {
            id,
            memory_type: self.memory_type,
            title,
            content: self.content,
            weight,
            pinned: self.pinned,
            emotional_flag: self.emotional_flag,
            status: self.status,
            created_at,
            updated_at: self.updated_at.unwrap_or(created_at),
            last_accessed_at: self.last_accessed_at.unwrap_or(created_at),
            access_count: self.access_count.max(0),
            metadata: self.metadata,
            tags: self.tags,
            triggers: self.triggers,
        })
    }
}

/// Build an export document from the current store
pub fn export_document(storage: &Storage, now: DateTime<Utc>) -> Result<ExportDocument> {
    let (memories, tags) = storage.with_read_transaction(|conn| {
        Ok((
            queries::load_memories(conn, None)?,
            queries::all_tag_names(conn)?,
        ))
    })?;

    tracing::info!(count = memories.len(), "Exported memories");

    Ok(ExportDocument {
        format: EXPORT_FORMAT.to_string(),
        version: EXPORT_VERSION.to_string(),
        exported_at: now,
        count: memories.len(),
        tags,
        memories,
    })
}

fn check_version(document: &Value) -> Result<()> {
    if let Some(format) = document.get("format") {
        if format.as_str() != Some(EXPORT_FORMAT) {
            return Err(MnemonicError::UnsupportedFormat(format!(
                "expected format \"{}\", got {}",
                EXPORT_FORMAT, format
            )));
        }
    }

    let major = match document.get("version") {
        Some(Value::String(v)) => v.trim().split('.').next().and_then(|m| m.parse::<u64>().ok()),
        Some(Value::Number(n)) => n.as_f64().filter(|v| *v >= 0.0).map(|v| v.trunc() as u64),
        Some(other) => {
            return Err(MnemonicError::UnsupportedFormat(format!(
                "version must be a string or number, got {}",
                other
            )))
        }
        None => {
            return Err(MnemonicError::UnsupportedFormat(
                "missing version".to_string(),
            ))
        }
    };

    if major != Some(1) {
        return Err(MnemonicError::UnsupportedFormat(format!(
            "unsupported version {}",
            document["version"]
        )));
    }
    Ok(())
}

/// Validate the envelope and return the raw memory records
pub fn validate_document(document: &Value) -> Result<&[Value]> {
    if !document.is_object() {
        return Err(MnemonicError::UnsupportedFormat(
            "document must be a JSON object".to_string(),
        ));
    }
    check_version(document)?;

    document
        .get("memories")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .ok_or_else(|| MnemonicError::UnsupportedFormat("missing memories array".to_string()))
}

enum Outcome {
    Created,
    Overwritten,
    Skipped,
}

fn import_record(
    storage: &Storage,
    record: &Value,
    options: ImportOptions,
    now: DateTime<Utc>,
) -> Result<Outcome> {
    let memory = serde_json::from_value::<ImportRecord>(record.clone())?
        .into_memory(options.preserve_ids, now)?;

    storage.with_transaction(|conn| {
        if !queries::memory_exists(conn, &memory.id)? {
            queries::insert_memory_record(conn, &memory)?;
            return Ok(Outcome::Created);
        }

        match options.policy {
            ConflictPolicy::Skip => Ok(Outcome::Skipped),
            ConflictPolicy::Overwrite => {
                queries::overwrite_memory_record(conn, &memory)?;
                Ok(Outcome::Overwritten)
            }
            ConflictPolicy::FailFast => Err(MnemonicError::Conflict {
                id: memory.id.clone(),
                message: "memory already exists".to_string(),
            }),
        }
    })
}

/// Import a document.
///
/// Envelope problems fail the whole call before anything is written.
/// Malformed records are counted in the summary. A conflict under
/// [`ConflictPolicy::FailFast`] or an unavailable store stops the import with
/// [`MnemonicError::ImportInterrupted`], which carries the partial summary.
pub fn import_document(
    storage: &Storage,
    document: &Value,
    options: ImportOptions,
    now: DateTime<Utc>,
) -> Result<ImportSummary> {
    let records = validate_document(document)?;

    if let Some(vocabulary) = document.get("tags").and_then(Value::as_array) {
        let names: Vec<String> = vocabulary
            .iter()
            .filter_map(|t| t.as_str().map(String::from))
            .collect();
        storage.with_transaction(|conn| queries::ensure_tags(conn, &names))?;
    }

    let mut summary = ImportSummary {
        total: records.len(),
        ..Default::default()
    };

    for (index, record) in records.iter().enumerate() {
        let id = || record.get("id").and_then(Value::as_str).map(String::from);
        match import_record(storage, record, options, now) {
            Ok(Outcome::Created) => summary.created += 1,
            Ok(Outcome::Overwritten) => summary.overwritten += 1,
            Ok(Outcome::Skipped) => {
                summary.skipped += 1;
                tracing::debug!(index, "Skipped existing memory");
            }
            Err(e @ (MnemonicError::Conflict { .. } | MnemonicError::StorageUnavailable(_))) => {
                tracing::warn!(
                    index,
                    created = summary.created,
                    overwritten = summary.overwritten,
                    error = %e,
                    "Import stopped"
                );
                summary.stopped_at = Some(ImportError {
                    index,
                    id: id(),
                    message: e.to_string(),
                });
                return Err(MnemonicError::ImportInterrupted {
                    summary: Box::new(summary),
                    cause: Box::new(e),
                });
            }
            Err(e) => {
                let id = id();
                tracing::warn!(index, id = ?id, error = %e, "Failed to import memory");
                summary.failed += 1;
                summary.errors.push(ImportError {
                    index,
                    id,
                    message: e.to_string(),
                });
            }
        }
    }

    tracing::info!(
        total = summary.total,
        created = summary.created,
        overwritten = summary.overwritten,
        skipped = summary.skipped,
        failed = summary.failed,
        "Import complete"
    );

    Ok(summary)
}
