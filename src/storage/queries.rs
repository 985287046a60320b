//! Database queries for memory operations
//!
//! Row-level repository functions. Each takes a connection that the caller has
//! already placed inside the right transaction; none of them open or commit
//! transactions themselves.

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use std::collections::{BTreeMap, HashSet};

use crate::error::{MnemonicError, Result};
use crate::intelligence::weight::{effective_weight, is_stale};
use crate::types::*;

const MEMORY_COLUMNS: &str = "m.id, m.memory_type, m.title, m.content, m.weight, m.pinned,
    m.emotional_flag, m.status, m.created_at, m.updated_at, m.last_accessed_at,
    m.access_count, m.metadata";

/// Format a timestamp for storage.
///
/// Fixed microsecond precision with a `Z` suffix keeps stored values
/// lexicographically ordered.
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(idx: usize, value: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn conversion_error(idx: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, message.into())
}

/// Parse a memory from a database row (tags and triggers are loaded separately)
pub fn memory_from_row(row: &Row) -> rusqlite::Result<Memory> {
    let memory_type_str: String = row.get("memory_type")?;
    let status_str: String = row.get("status")?;
    let created_at: String = row.get("created_at")?;
    let updated_at: String = row.get("updated_at")?;
    let last_accessed_at: String = row.get("last_accessed_at")?;
    let metadata_str: Option<String> = row.get("metadata")?;

    let memory_type = memory_type_str
        .parse::<MemoryType>()
        .map_err(|e| conversion_error(1, e))?;
    let status = status_str
        .parse::<MemoryStatus>()
        .map_err(|e| conversion_error(7, e))?;
    let metadata = metadata_str
        .map(|s| serde_json::from_str(&s))
        .transpose()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(12, Type::Text, Box::new(e)))?;

    Ok(Memory {
        id: row.get("id")?,
        memory_type,
        title: row.get("title")?,
        content: row.get("content")?,
        weight: row.get("weight")?,
        pinned: row.get("pinned")?,
        emotional_flag: row.get("emotional_flag")?,
        status,
        created_at: parse_timestamp(8, &created_at)?,
        updated_at: parse_timestamp(9, &updated_at)?,
        last_accessed_at: parse_timestamp(10, &last_accessed_at)?,
        access_count: row.get("access_count")?,
        metadata,
        tags: vec![],
        triggers: vec![],
    })
}

/// Load tags for a memory, in insertion order
pub fn load_tags(conn: &Connection, memory_id: &str) -> Result<Vec<String>> {
    let mut stmt = conn.prepare_cached(
        "SELECT t.name FROM tags t
         JOIN memory_tags mt ON t.id = mt.tag_id
         WHERE mt.memory_id = ?
         ORDER BY mt.position, t.name",
    )?;

    let tags = stmt
        .query_map([memory_id], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<String>>>()?;

    Ok(tags)
}

/// Load trigger phrases for a memory, in insertion order
pub fn load_triggers(conn: &Connection, memory_id: &str) -> Result<Vec<String>> {
    let mut stmt =
        conn.prepare_cached("SELECT phrase FROM memory_triggers WHERE memory_id = ? ORDER BY id")?;

    let triggers = stmt
        .query_map([memory_id], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<String>>>()?;

    Ok(triggers)
}

fn hydrate(conn: &Connection, mut memory: Memory) -> Result<Memory> {
    memory.tags = load_tags(conn, &memory.id)?;
    memory.triggers = load_triggers(conn, &memory.id)?;
    Ok(memory)
}

fn hydrate_all(conn: &Connection, memories: Vec<Memory>) -> Result<Vec<Memory>> {
    memories.into_iter().map(|m| hydrate(conn, m)).collect()
}

/// Normalize a tag name: trimmed and lowercased. Blank names yield None.
pub fn normalize_tag(tag: &str) -> Option<String> {
    let tag = tag.trim().to_lowercase();
    (!tag.is_empty()).then_some(tag)
}

/// Normalize a trigger phrase: trimmed, lowercased, inner whitespace collapsed
pub fn normalize_trigger(phrase: &str) -> Option<String> {
    let phrase = phrase.split_whitespace().collect::<Vec<_>>().join(" ");
    let phrase = phrase.to_lowercase();
    (!phrase.is_empty()).then_some(phrase)
}

fn normalize_list(items: &[String], normalize: fn(&str) -> Option<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    items
        .iter()
        .filter_map(|s| normalize(s))
        .filter(|s| seen.insert(s.clone()))
        .collect()
}

/// Validate and trim a title
pub fn validate_title(title: &str) -> Result<String> {
    let title = title.trim();
    if title.is_empty() {
        return Err(MnemonicError::validation("title", "must not be empty"));
    }
    if title.chars().count() > MAX_TITLE_LENGTH {
        return Err(MnemonicError::validation(
            "title",
            format!("must be at most {} characters", MAX_TITLE_LENGTH),
        ));
    }
    Ok(title.to_string())
}

/// Validate content (stored verbatim)
pub fn validate_content(content: &str) -> Result<()> {
    if content.trim().is_empty() {
        return Err(MnemonicError::validation("content", "must not be empty"));
    }
    Ok(())
}

/// Clamp a weight into [0.1, 1.0]; non-finite values are rejected
pub fn clamp_weight(weight: f64) -> Result<f64> {
    if !weight.is_finite() {
        return Err(MnemonicError::validation(
            "weight",
            format!("must be a finite number (got {})", weight),
        ));
    }
    Ok(weight.clamp(MIN_WEIGHT, MAX_WEIGHT))
}

fn metadata_to_sql(metadata: &Option<serde_json::Value>) -> Result<Option<String>> {
    match metadata {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(value) => Ok(Some(serde_json::to_string(value)?)),
    }
}

/// Ensure a tag exists and return its ID
fn ensure_tag(conn: &Connection, tag: &str) -> Result<i64> {
    conn.execute("INSERT OR IGNORE INTO tags (name) VALUES (?)", params![tag])?;

    let id: i64 = conn.query_row("SELECT id FROM tags WHERE name = ?", params![tag], |row| {
        row.get(0)
    })?;

    Ok(id)
}

/// Ensure every name in the vocabulary exists as a tag row
pub fn ensure_tags(conn: &Connection, tags: &[String]) -> Result<()> {
    for tag in normalize_list(tags, normalize_tag) {
        ensure_tag(conn, &tag)?;
    }
    Ok(())
}

/// Replace the tag set of a memory (delete then insert)
pub fn set_memory_tags(conn: &Connection, memory_id: &str, tags: &[String]) -> Result<()> {
    conn.execute("DELETE FROM memory_tags WHERE memory_id = ?", params![memory_id])?;

    for (position, tag) in normalize_list(tags, normalize_tag).iter().enumerate() {
        let tag_id = ensure_tag(conn, tag)?;
        conn.execute(
            "INSERT INTO memory_tags (memory_id, tag_id, position) VALUES (?, ?, ?)",
            params![memory_id, tag_id, position as i64],
        )?;
    }
    Ok(())
}

/// Replace the trigger phrases of a memory (delete then insert)
pub fn set_memory_triggers(conn: &Connection, memory_id: &str, triggers: &[String]) -> Result<()> {
    conn.execute(
        "DELETE FROM memory_triggers WHERE memory_id = ?",
        params![memory_id],
    )?;

    for phrase in normalize_list(triggers, normalize_trigger) {
        conn.execute(
            "INSERT INTO memory_triggers (memory_id, phrase) VALUES (?, ?)",
            params![memory_id, phrase],
        )?;
    }
    Ok(())
}

/// Check whether a memory row exists
pub fn memory_exists(conn: &Connection, id: &str) -> Result<bool> {
    let found = conn
        .query_row("SELECT 1 FROM memories WHERE id = ?", params![id], |_| Ok(()))
        .optional()?;
    Ok(found.is_some())
}

/// Load a memory with tags and triggers, without touching access bookkeeping
pub fn fetch_memory(conn: &Connection, id: &str) -> Result<Memory> {
    let sql = format!("SELECT {} FROM memories m WHERE m.id = ?", MEMORY_COLUMNS);
    let mut stmt = conn.prepare_cached(&sql)?;

    let memory = stmt
        .query_row(params![id], memory_from_row)
        .optional()?
        .ok_or_else(|| MnemonicError::NotFound(id.to_string()))?;

    hydrate(conn, memory)
}

/// Create a new memory with its tags and triggers
pub fn create_memory(conn: &Connection, input: &CreateMemoryInput, now: DateTime<Utc>) -> Result<Memory> {
    let title = validate_title(&input.title)?;
    validate_content(&input.content)?;
    let weight = clamp_weight(input.weight.unwrap_or(DEFAULT_WEIGHT))?;
    let metadata = metadata_to_sql(&input.metadata)?;

    let id = uuid::Uuid::new_v4().to_string();
    let now_str = format_timestamp(now);

    conn.execute(
        "INSERT INTO memories (
            id, memory_type, title, content, weight, pinned, emotional_flag, status,
            created_at, updated_at, last_accessed_at, access_count, metadata
         ) VALUES (?, ?, ?, ?, ?, ?, ?, 'active', ?, ?, ?, 0, ?)",
        params![
            id,
            input.memory_type.as_str(),
            title,
            input.content,
            weight,
            input.pinned,
            input.emotional_flag,
            now_str,
            now_str,
            now_str,
            metadata,
        ],
    )?;

    set_memory_tags(conn, &id, &input.tags)?;
    set_memory_triggers(conn, &id, &input.triggers)?;

    fetch_memory(conn, &id)
}

/// Record one access: bump `access_count` and set `last_accessed_at`.
///
/// Returns false if the memory does not exist.
pub fn record_access(conn: &Connection, id: &str, now: DateTime<Utc>) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE memories SET access_count = access_count + 1, last_accessed_at = ?
         WHERE id = ?",
        params![format_timestamp(now), id],
    )?;
    Ok(affected > 0)
}

/// Get a memory by ID, recording the access
pub fn get_memory(conn: &Connection, id: &str, now: DateTime<Utc>) -> Result<Memory> {
    if !record_access(conn, id, now)? {
        return Err(MnemonicError::NotFound(id.to_string()));
    }
    fetch_memory(conn, id)
}

/// Apply a partial update
pub fn update_memory(
    conn: &Connection,
    id: &str,
    input: &UpdateMemoryInput,
    now: DateTime<Utc>,
) -> Result<Memory> {
    if !memory_exists(conn, id)? {
        return Err(MnemonicError::NotFound(id.to_string()));
    }

    let mut updates = vec!["updated_at = ?".to_string()];
    let mut values: Vec<Box<dyn rusqlite::ToSql>> = vec![Box::new(format_timestamp(now))];

    if let Some(ref title) = input.title {
        updates.push("title = ?".to_string());
        values.push(Box::new(validate_title(title)?));
    }

    if let Some(ref content) = input.content {
        validate_content(content)?;
        updates.push("content = ?".to_string());
        values.push(Box::new(content.clone()));
    }

    if let Some(memory_type) = input.memory_type {
        updates.push("memory_type = ?".to_string());
        values.push(Box::new(memory_type.as_str()));
    }

    if let Some(weight) = input.weight {
        updates.push("weight = ?".to_string());
        values.push(Box::new(clamp_weight(weight)?));
    }

    if let Some(pinned) = input.pinned {
        updates.push("pinned = ?".to_string());
        values.push(Box::new(pinned));
    }

    if let Some(emotional_flag) = input.emotional_flag {
        updates.push("emotional_flag = ?".to_string());
        values.push(Box::new(emotional_flag));
    }

    if let Some(status) = input.status {
        updates.push("status = ?".to_string());
        values.push(Box::new(status.as_str()));
    }

    if input.metadata.is_some() {
        updates.push("metadata = ?".to_string());
        values.push(Box::new(metadata_to_sql(&input.metadata)?));
    }

    let sql = format!("UPDATE memories SET {} WHERE id = ?", updates.join(", "));
    values.push(Box::new(id.to_string()));

    let params: Vec<&dyn rusqlite::ToSql> = values.iter().map(|b| b.as_ref()).collect();
    conn.execute(&sql, params.as_slice())?;

    if let Some(ref tags) = input.tags {
        set_memory_tags(conn, id, tags)?;
    }

    if let Some(ref triggers) = input.triggers {
        set_memory_triggers(conn, id, triggers)?;
    }

    fetch_memory(conn, id)
}

/// Hard-delete a memory with its tag associations and triggers.
///
/// Tag rows themselves are kept. Returns whether a memory existed.
pub fn delete_memory(conn: &Connection, id: &str) -> Result<bool> {
    conn.execute("DELETE FROM memory_tags WHERE memory_id = ?", params![id])?;
    conn.execute("DELETE FROM memory_triggers WHERE memory_id = ?", params![id])?;
    let affected = conn.execute("DELETE FROM memories WHERE id = ?", params![id])?;
    Ok(affected > 0)
}

/// Set the status of several memories at once. Returns the number changed.
pub fn set_status(
    conn: &Connection,
    ids: &[MemoryId],
    status: MemoryStatus,
    now: DateTime<Utc>,
) -> Result<usize> {
    let now_str = format_timestamp(now);
    let mut changed = 0;
    for id in ids {
        changed += conn.execute(
            "UPDATE memories SET status = ?, updated_at = ? WHERE id = ? AND status != ?",
            params![status.as_str(), now_str, id, status.as_str()],
        )?;
    }
    Ok(changed)
}

/// Load every memory matching `status` (None for all), fully hydrated,
/// ordered by creation time
pub fn load_memories(conn: &Connection, status: Option<MemoryStatus>) -> Result<Vec<Memory>> {
    let mut sql = format!("SELECT {} FROM memories m", MEMORY_COLUMNS);
    let mut params: Vec<String> = vec![];
    if let Some(status) = status {
        sql.push_str(" WHERE m.status = ?");
        params.push(status.as_str().to_string());
    }
    sql.push_str(" ORDER BY m.created_at, m.id");

    let mut stmt = conn.prepare(&sql)?;
    let memories = stmt
        .query_map(params_from_iter(params.iter()), memory_from_row)?
        .collect::<rusqlite::Result<Vec<Memory>>>()?;

    hydrate_all(conn, memories)
}

fn count_memories(conn: &Connection, status: Option<MemoryStatus>) -> Result<usize> {
    let count: i64 = match status {
        Some(status) => conn.query_row(
            "SELECT COUNT(*) FROM memories WHERE status = ?",
            params![status.as_str()],
            |row| row.get(0),
        )?,
        None => conn.query_row("SELECT COUNT(*) FROM memories", [], |row| row.get(0))?,
    };
    Ok(count as usize)
}

/// Sort memories by effective weight in `order`. Ties always fall back to
/// `updated_at` desc then id, whichever direction the weight goes.
pub fn sort_by_effective_weight(memories: &mut [(Memory, f64)], order: SortOrder) {
    memories.sort_by(|(a, wa), (b, wb)| {
        let by_weight = match order {
            SortOrder::Desc => wb.total_cmp(wa),
            SortOrder::Asc => wa.total_cmp(wb),
        };
        by_weight
            .then_with(|| b.updated_at.cmp(&a.updated_at))
            .then_with(|| a.id.cmp(&b.id))
    });
}

/// List memories with filtering and pagination. Never records access.
pub fn list_memories(
    conn: &Connection,
    options: &ListOptions,
    limit: usize,
    offset: usize,
    now: DateTime<Utc>,
) -> Result<Page<Memory>> {
    let status = options.status.status();
    let sort_by = options.sort_by.unwrap_or_default();
    let sort_order = options.sort_order.unwrap_or_default();

    let sort_field = match sort_by {
        SortField::CreatedAt => "m.created_at",
        SortField::UpdatedAt => "m.updated_at",
        SortField::LastAccessedAt => "m.last_accessed_at",
        SortField::AccessCount => "m.access_count",
        SortField::Title => "m.title COLLATE NOCASE",
        // Effective weight depends on `now`, so it cannot be ordered in SQL
        SortField::Weight => {
            let mut weighted: Vec<(Memory, f64)> = load_memories(conn, status)?
                .into_iter()
                .map(|m| {
                    let w = effective_weight(&m, now);
                    (m, w)
                })
                .collect();
            sort_by_effective_weight(&mut weighted, sort_order);
            let ordered = weighted.into_iter().map(|(m, _)| m).collect();
            return Ok(Page::from_ranked(ordered, limit, offset));
        }
    };
    let order = match sort_order {
        SortOrder::Asc => "ASC",
        SortOrder::Desc => "DESC",
    };

    let mut sql = format!("SELECT {} FROM memories m", MEMORY_COLUMNS);
    let mut params: Vec<Box<dyn rusqlite::ToSql>> = vec![];
    if let Some(status) = status {
        sql.push_str(" WHERE m.status = ?");
        params.push(Box::new(status.as_str()));
    }
    sql.push_str(&format!(
        " ORDER BY {} {}, m.id ASC LIMIT ? OFFSET ?",
        sort_field, order
    ));
    params.push(Box::new(i64::try_from(limit).unwrap_or(i64::MAX)));
    // Offsets past i64::MAX would turn negative, which SQLite reads as 0
    params.push(Box::new(i64::try_from(offset).unwrap_or(i64::MAX)));

    let param_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|b| b.as_ref()).collect();
    let mut stmt = conn.prepare(&sql)?;
    let memories = stmt
        .query_map(param_refs.as_slice(), memory_from_row)?
        .collect::<rusqlite::Result<Vec<Memory>>>()?;

    let total = count_memories(conn, status)?;
    Ok(Page::new(hydrate_all(conn, memories)?, total, limit, offset))
}

/// Candidate filter for search
#[derive(Debug, Clone, Default)]
pub struct CandidateFilter {
    /// Pre-built FTS5 MATCH expression
    pub fts_match: Option<String>,
    /// Case-insensitive substring over title/content
    pub substring: Option<String>,
    /// Normalized tag names, all required
    pub tags: Vec<String>,
    pub status: Option<MemoryStatus>,
}

fn escape_like(s: &str) -> String {
    let mut escaped = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Find all memories matching `filter`.
///
/// With an FTS expression, each memory carries its raw BM25 score
/// (negative, closer to zero is worse).
pub fn find_candidates(conn: &Connection, filter: &CandidateFilter) -> Result<Vec<(Memory, Option<f64>)>> {
    let mut sql = if filter.fts_match.is_some() {
        format!(
            "SELECT {}, bm25(memories_fts) AS bm25_score
             FROM memories_fts JOIN memories m ON m.seq = memories_fts.rowid",
            MEMORY_COLUMNS
        )
    } else {
        format!("SELECT {}, NULL AS bm25_score FROM memories m", MEMORY_COLUMNS)
    };

    let mut conditions: Vec<String> = vec![];
    let mut params: Vec<Box<dyn rusqlite::ToSql>> = vec![];

    if let Some(ref expr) = filter.fts_match {
        conditions.push("memories_fts MATCH ?".to_string());
        params.push(Box::new(expr.clone()));
    }

    if let Some(ref substring) = filter.substring {
        let pattern = format!("%{}%", escape_like(substring));
        conditions.push(
            "(m.title LIKE ? ESCAPE '\\' OR m.content LIKE ? ESCAPE '\\')".to_string(),
        );
        params.push(Box::new(pattern.clone()));
        params.push(Box::new(pattern));
    }

    if let Some(status) = filter.status {
        conditions.push("m.status = ?".to_string());
        params.push(Box::new(status.as_str()));
    }

    if !filter.tags.is_empty() {
        let placeholders = vec!["?"; filter.tags.len()].join(", ");
        conditions.push(format!(
            "m.id IN (
                SELECT mt.memory_id FROM memory_tags mt
                JOIN tags t ON t.id = mt.tag_id
                WHERE t.name IN ({})
                GROUP BY mt.memory_id
                HAVING COUNT(DISTINCT t.name) = ?
            )",
            placeholders
        ));
        for tag in &filter.tags {
            params.push(Box::new(tag.clone()));
        }
        params.push(Box::new(filter.tags.len() as i64));
    }

    if !conditions.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&conditions.join(" AND "));
    }

    let param_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|b| b.as_ref()).collect();
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(param_refs.as_slice(), |row| {
            let memory = memory_from_row(row)?;
            let rank: Option<f64> = row.get("bm25_score")?;
            Ok((memory, rank))
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    rows.into_iter()
        .map(|(memory, rank)| Ok((hydrate(conn, memory)?, rank)))
        .collect()
}

/// Active memories with a trigger phrase contained in `utterance`.
///
/// `utterance` must already be normalized with [`normalize_trigger`].
pub fn find_by_trigger(conn: &Connection, utterance: &str) -> Result<Vec<Memory>> {
    let sql = format!(
        "SELECT {} FROM memories m
         WHERE m.status = 'active'
           AND EXISTS (
               SELECT 1 FROM memory_triggers tr
               WHERE tr.memory_id = m.id AND instr(?, tr.phrase) > 0
           )",
        MEMORY_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let memories = stmt
        .query_map(params![utterance], memory_from_row)?
        .collect::<rusqlite::Result<Vec<Memory>>>()?;

    hydrate_all(conn, memories)
}

/// All tag names, alphabetically
pub fn all_tag_names(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt = conn.prepare("SELECT name FROM tags ORDER BY name")?;
    let tags = stmt
        .query_map([], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<String>>>()?;
    Ok(tags)
}

/// Insert a full memory record, keeping its id and timestamps (import)
pub fn insert_memory_record(conn: &Connection, memory: &Memory) -> Result<()> {
    conn.execute(
        "INSERT INTO memories (
            id, memory_type, title, content, weight, pinned, emotional_flag, status,
            created_at, updated_at, last_accessed_at, access_count, metadata
         ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        params![
            memory.id,
            memory.memory_type.as_str(),
            memory.title,
            memory.content,
            memory.weight,
            memory.pinned,
            memory.emotional_flag,
            memory.status.as_str(),
            format_timestamp(memory.created_at),
            format_timestamp(memory.updated_at),
            format_timestamp(memory.last_accessed_at),
            memory.access_count.max(0),
            metadata_to_sql(&memory.metadata)?,
        ],
    )?;

    set_memory_tags(conn, &memory.id, &memory.tags)?;
    set_memory_triggers(conn, &memory.id, &memory.triggers)?;
    Ok(())
}

/// Overwrite an existing memory from a full record (import).
///
/// Access bookkeeping never moves backwards.
pub fn overwrite_memory_record(conn: &Connection, memory: &Memory) -> Result<()> {
    conn.execute(
        "UPDATE memories SET
            memory_type = ?, title = ?, content = ?, weight = ?, pinned = ?,
            emotional_flag = ?, status = ?, created_at = ?, updated_at = ?,
            last_accessed_at = MAX(last_accessed_at, ?),
            access_count = MAX(access_count, ?),
            metadata = ?
         WHERE id = ?",
        params![
            memory.memory_type.as_str(),
            memory.title,
            memory.content,
            memory.weight,
            memory.pinned,
            memory.emotional_flag,
            memory.status.as_str(),
            format_timestamp(memory.created_at),
            format_timestamp(memory.updated_at),
            format_timestamp(memory.last_accessed_at),
            memory.access_count.max(0),
            metadata_to_sql(&memory.metadata)?,
            memory.id,
        ],
    )?;

    set_memory_tags(conn, &memory.id, &memory.tags)?;
    set_memory_triggers(conn, &memory.id, &memory.triggers)?;
    Ok(())
}

fn count(conn: &Connection, sql: &str) -> Result<i64> {
    Ok(conn.query_row(sql, [], |row| row.get(0))?)
}

/// Get memory statistics
pub fn get_stats(conn: &Connection, now: DateTime<Utc>) -> Result<MemoryStats> {
    let mut by_status = BTreeMap::new();
    {
        let mut stmt = conn.prepare("SELECT status, COUNT(*) FROM memories GROUP BY status")?;
        let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?;
        for row in rows {
            let (status, n) = row?;
            by_status.insert(status, n);
        }
    }

    let mut weight_distribution = BTreeMap::new();
    {
        let mut stmt = conn.prepare(
            "SELECT
                CASE
                    WHEN weight >= 0.9 THEN 'high'
                    WHEN weight >= 0.7 THEN 'medium'
                    WHEN weight >= 0.5 THEN 'low'
                    ELSE 'very_low'
                END AS bracket,
                COUNT(*)
             FROM memories
             WHERE status = 'active'
             GROUP BY bracket",
        )?;
        let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?;
        for row in rows {
            let (bracket, n) = row?;
            weight_distribution.insert(bracket, n);
        }
    }

    let average_weight: Option<f64> = conn.query_row(
        "SELECT AVG(weight) FROM memories WHERE status = 'active'",
        [],
        |row| row.get(0),
    )?;

    let top_tags = {
        let mut stmt = conn.prepare(
            "SELECT t.name, COUNT(*) AS uses
             FROM tags t
             JOIN memory_tags mt ON t.id = mt.tag_id
             JOIN memories m ON mt.memory_id = m.id
             WHERE m.status = 'active'
             GROUP BY t.name
             ORDER BY uses DESC, t.name
             LIMIT 10",
        )?;
        let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?;
        rows.collect::<rusqlite::Result<Vec<_>>>()?
    };

    let stale_count = {
        let sql = format!("SELECT {} FROM memories m WHERE m.status = 'active'", MEMORY_COLUMNS);
        let mut stmt = conn.prepare(&sql)?;
        let memories = stmt
            .query_map([], memory_from_row)?
            .collect::<rusqlite::Result<Vec<Memory>>>()?;
        memories
            .iter()
            .filter(|m| is_stale(effective_weight(m, now)))
            .count() as i64
    };

    Ok(MemoryStats {
        total_memories: by_status.values().sum(),
        by_status,
        weight_distribution,
        average_weight: (average_weight.unwrap_or(0.0) * 1000.0).round() / 1000.0,
        pinned_count: count(
            conn,
            "SELECT COUNT(*) FROM memories WHERE pinned = 1 AND status = 'active'",
        )?,
        emotional_count: count(
            conn,
            "SELECT COUNT(*) FROM memories WHERE emotional_flag = 1 AND status = 'active'",
        )?,
        stale_count,
        top_tags,
        total_tags: count(conn, "SELECT COUNT(*) FROM tags")?,
        total_triggers: count(conn, "SELECT COUNT(*) FROM memory_triggers")?,
    })
}
