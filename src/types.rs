//! Core types for Mnemonic

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Unique identifier for a memory (UUID v4 string)
pub type MemoryId = String;

/// Default base weight for new memories
pub const DEFAULT_WEIGHT: f64 = 0.8;
/// Lowest storable base weight
pub const MIN_WEIGHT: f64 = 0.1;
/// Highest storable base weight
pub const MAX_WEIGHT: f64 = 1.0;
/// Maximum title length in characters
pub const MAX_TITLE_LENGTH: usize = 200;

/// A memory entry in the database
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Memory {
    /// Unique identifier
    pub id: MemoryId,
    #[serde(rename = "type")]
    pub memory_type: MemoryType,
    pub title: String,
    /// Main content of the memory
    pub content: String,
    /// Base importance in [0.1, 1.0]
    pub weight: f64,
    /// Pinned memories never decay
    pub pinned: bool,
    /// Emotionally significant memories decay to a floor
    pub emotional_flag: bool,
    pub status: MemoryStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_accessed_at: DateTime<Utc>,
    /// Number of times accessed
    pub access_count: i64,
    /// Caller-defined extras, stored verbatim
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
    /// Tags in insertion order
    #[serde(default)]
    pub tags: Vec<String>,
    /// Recall phrases in insertion order
    #[serde(default)]
    pub triggers: Vec<String>,
}

/// Memory type classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MemoryType {
    #[default]
    Memory,
    Learning,
    Milestone,
    Reference,
}

impl MemoryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MemoryType::Memory => "memory",
            MemoryType::Learning => "learning",
            MemoryType::Milestone => "milestone",
            MemoryType::Reference => "reference",
        }
    }
}

impl std::fmt::Display for MemoryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for MemoryType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "memory" => Ok(MemoryType::Memory),
            "learning" => Ok(MemoryType::Learning),
            "milestone" => Ok(MemoryType::Milestone),
            "reference" => Ok(MemoryType::Reference),
            _ => Err(format!("Unknown memory type: {}", s)),
        }
    }
}

/// User-visible lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MemoryStatus {
    /// Included in search/list by default
    #[default]
    Active,
    /// Excluded from search/list unless requested
    Archived,
}

impl MemoryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MemoryStatus::Active => "active",
            MemoryStatus::Archived => "archived",
        }
    }
}

impl std::fmt::Display for MemoryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for MemoryStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "active" => Ok(MemoryStatus::Active),
            "archived" => Ok(MemoryStatus::Archived),
            _ => Err(format!("Unknown memory status: {}", s)),
        }
    }
}

/// Status filter for list and search
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StatusFilter {
    #[default]
    Active,
    Archived,
    All,
}

impl StatusFilter {
    /// The single status to filter on, or None for all
    pub fn status(&self) -> Option<MemoryStatus> {
        match self {
            StatusFilter::Active => Some(MemoryStatus::Active),
            StatusFilter::Archived => Some(MemoryStatus::Archived),
            StatusFilter::All => None,
        }
    }
}

impl std::str::FromStr for StatusFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "active" => Ok(StatusFilter::Active),
            "archived" => Ok(StatusFilter::Archived),
            "all" | "any" => Ok(StatusFilter::All),
            _ => Err(format!("Unknown status filter: {}", s)),
        }
    }
}

/// Input for creating a memory
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateMemoryInput {
    pub title: String,
    pub content: String,
    #[serde(default, rename = "type")]
    pub memory_type: MemoryType,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub triggers: Vec<String>,
    /// Defaults to 0.8; clamped into [0.1, 1.0]
    pub weight: Option<f64>,
    #[serde(default)]
    pub pinned: bool,
    #[serde(default)]
    pub emotional_flag: bool,
    pub metadata: Option<serde_json::Value>,
}

impl CreateMemoryInput {
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
            ..Default::default()
        }
    }
}

/// Partial update; omitted fields are left unchanged.
///
/// `tags` and `triggers` replace the whole set when present.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateMemoryInput {
    pub title: Option<String>,
    pub content: Option<String>,
    #[serde(rename = "type")]
    pub memory_type: Option<MemoryType>,
    pub tags: Option<Vec<String>>,
    pub triggers: Option<Vec<String>>,
    pub weight: Option<f64>,
    pub pinned: Option<bool>,
    pub emotional_flag: Option<bool>,
    pub status: Option<MemoryStatus>,
    /// `Some(Value::Null)` clears the metadata
    pub metadata: Option<serde_json::Value>,
}

/// Options for listing memories
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListOptions {
    #[serde(default)]
    pub status: StatusFilter,
    pub sort_by: Option<SortField>,
    pub sort_order: Option<SortOrder>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

/// Fields to sort by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SortField {
    CreatedAt,
    #[default]
    UpdatedAt,
    LastAccessedAt,
    /// Effective weight at the time of the call
    Weight,
    AccessCount,
    Title,
}

impl std::str::FromStr for SortField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "created_at" => Ok(SortField::CreatedAt),
            "updated_at" => Ok(SortField::UpdatedAt),
            "last_accessed_at" => Ok(SortField::LastAccessedAt),
            "weight" => Ok(SortField::Weight),
            "access_count" => Ok(SortField::AccessCount),
            "title" => Ok(SortField::Title),
            _ => Err(format!("Unknown sort field: {}", s)),
        }
    }
}

/// Sort order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

/// Options for search operations
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchOptions {
    /// Full-text query over title and content
    pub query: Option<String>,
    /// Required tags (all must be present)
    pub tags: Option<Vec<String>>,
    #[serde(default)]
    pub status: StatusFilter,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
    /// Record an access for every memory in the returned page
    #[serde(default)]
    pub track_access: bool,
}

/// A ranked search hit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub memory: Memory,
    /// Final ranking score
    pub score: f64,
    /// Normalized full-text relevance in [0, 1], present for text queries
    pub relevance: Option<f64>,
    pub effective_weight: f64,
}

/// One page of results with pagination info
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: usize,
    pub limit: usize,
    pub offset: usize,
    pub has_more: bool,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: usize, limit: usize, offset: usize) -> Self {
        let has_more = offset.saturating_add(items.len()) < total;
        Self {
            items,
            total,
            limit,
            offset,
            has_more,
        }
    }

    /// Slice an already ordered, complete candidate list
    pub fn from_ranked(all: Vec<T>, limit: usize, offset: usize) -> Self {
        let total = all.len();
        let items: Vec<T> = all.into_iter().skip(offset).take(limit).collect();
        Self::new(items, total, limit, offset)
    }
}

/// Memory statistics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryStats {
    pub total_memories: i64,
    pub by_status: BTreeMap<String, i64>,
    /// Base-weight buckets over active memories
    pub weight_distribution: BTreeMap<String, i64>,
    pub average_weight: f64,
    pub pinned_count: i64,
    pub emotional_count: i64,
    /// Active memories whose effective weight is below the stale threshold
    pub stale_count: i64,
    /// Most used tags among active memories, most frequent first
    pub top_tags: Vec<(String, i64)>,
    pub total_tags: i64,
    pub total_triggers: i64,
}

/// How SQLite journals writes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum StorageMode {
    /// WAL journal, for local disks
    #[default]
    Local,
    /// DELETE journal, for folders synced by Dropbox/iCloud/OneDrive
    CloudSafe,
}

impl std::str::FromStr for StorageMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "local" | "wal" => Ok(StorageMode::Local),
            "cloud-safe" | "cloud_safe" => Ok(StorageMode::CloudSafe),
            _ => Err(format!("Unknown storage mode: {}", s)),
        }
    }
}
