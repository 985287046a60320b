//! End-to-end scenarios against the memory engine
//!
//! Every test runs on a fresh in-memory store with a fixed clock, so decay and
//! ordering are deterministic.
//!
//! Run with: cargo test --test engine_tests

use std::sync::Arc;

use chrono::{DateTime, Utc};
use pretty_assertions::assert_eq;
use serde_json::json;

use mnemonic::storage::queries;
use mnemonic::*;

fn start() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2026-01-15T09:30:00Z")
        .unwrap()
        .with_timezone(&Utc)
}

fn engine() -> (MemoryEngine, Arc<FixedClock>) {
    let clock = Arc::new(FixedClock::new(start()));
    let engine = MemoryEngine::in_memory_with_clock(clock.clone()).unwrap();
    (engine, clock)
}

fn create(
    engine: &MemoryEngine,
    title: &str,
    content: &str,
    weight: f64,
    tags: &[&str],
) -> Memory {
    engine
        .create(CreateMemoryInput {
            weight: Some(weight),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            ..CreateMemoryInput::new(title, content)
        })
        .unwrap()
}

fn query(text: &str) -> SearchOptions {
    SearchOptions {
        query: Some(text.to_string()),
        ..Default::default()
    }
}

fn tags(names: &[&str]) -> SearchOptions {
    SearchOptions {
        tags: Some(names.iter().map(|t| t.to_string()).collect()),
        ..Default::default()
    }
}

fn ids(page: &Page<SearchResult>) -> Vec<String> {
    page.items.iter().map(|r| r.memory.id.clone()).collect()
}

// ============================================================================
// RANKING
// ============================================================================

#[test]
fn test_weight_orders_equal_text_matches() {
    let (engine, _) = engine();
    let m1 = create(&engine, "A", "alpha", 0.9, &["x"]);
    let m2 = create(&engine, "B", "beta alpha", 0.5, &["x", "y"]);

    let page = engine.search(query("alpha")).unwrap();
    assert_eq!(ids(&page), vec![m1.id.clone(), m2.id.clone()]);
    assert_eq!(page.total, 2);

    // Best text match is normalized to 1.0
    let best = &page.items[0];
    assert_eq!(best.relevance, Some(1.0));
    assert!((best.score - (0.6 + 0.4 * 0.9)).abs() < 1e-9);
    assert!(page.items[1].score < best.score);

    // Same order on every call
    let again = engine.search(query("alpha")).unwrap();
    assert_eq!(ids(&again), ids(&page));
}

#[test]
fn test_special_characters_in_query() {
    let (engine, _) = engine();
    let target = create(&engine, "Test & Example", "ampersand title", 0.8, &[]);
    create(&engine, "Unrelated", "nothing to see", 0.8, &[]);

    let page = engine.search(query("Test & Example")).unwrap();
    assert_eq!(ids(&page), vec![target.id.clone()]);

    for raw in ["title:test", "(example", "test -example", "\"test &", "example*"] {
        let page = engine.search(query(raw)).unwrap();
        assert_eq!(ids(&page), vec![target.id.clone()], "query {:?}", raw);
    }

    // Punctuation only: substring match
    let page = engine.search(query("&")).unwrap();
    assert_eq!(ids(&page), vec![target.id.clone()]);
    let page = engine.search(query("%")).unwrap();
    assert!(page.items.is_empty());
}

#[test]
fn test_phrase_and_stemming() {
    let (engine, _) = engine();
    let deploy = create(&engine, "Release", "deploying the service on fridays", 0.8, &[]);
    create(&engine, "Other", "the service deploying later", 0.8, &[]);

    let page = engine.search(query("\"deploying the service\"")).unwrap();
    assert_eq!(ids(&page), vec![deploy.id.clone()]);

    // Porter stemming: "deploys" matches "deploying"
    assert_eq!(engine.search(query("deploys")).unwrap().total, 2);
}

#[test]
fn test_decay_changes_ranking() {
    let (engine, clock) = engine();
    let old = create(&engine, "Old", "shared keyword", 0.9, &[]);
    clock.advance_days(60);
    let new = create(&engine, "New", "shared keyword", 0.6, &[]);

    // 0.9 * 0.99^60 ≈ 0.49 < 0.6
    let page = engine.search(query("keyword")).unwrap();
    assert_eq!(ids(&page), vec![new.id.clone(), old.id.clone()]);

    // Pinning restores full weight
    engine.pin(&old.id, true).unwrap();
    let page = engine.search(query("keyword")).unwrap();
    assert_eq!(page.items[0].memory.id, old.id);
    assert_eq!(page.items[0].effective_weight, 1.0);
}

// ============================================================================
// TAGS
// ============================================================================

#[test]
fn test_tag_filter_requires_all_tags() {
    let (engine, _) = engine();
    let m1 = create(&engine, "A", "alpha", 0.9, &["x"]);
    let m2 = create(&engine, "B", "beta alpha", 0.5, &["x", "y"]);
    create(&engine, "C", "gamma", 0.7, &["y"]);

    assert_eq!(ids(&engine.search(tags(&["x"])).unwrap()), vec![m1.id.clone(), m2.id.clone()]);
    assert_eq!(ids(&engine.search(tags(&["x", "y"])).unwrap()), vec![m2.id.clone()]);
    assert_eq!(ids(&engine.search(tags(&["X ", "Y"])).unwrap()), vec![m2.id.clone()]);
    assert!(engine.search(tags(&["x", "z"])).unwrap().items.is_empty());

    // Query and tags intersect
    let both = engine
        .search(SearchOptions {
            query: Some("alpha".into()),
            tags: Some(vec!["y".into()]),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(ids(&both), vec![m2.id.clone()]);
}

#[test]
fn test_no_criteria_lists_by_effective_weight() {
    let (engine, _) = engine();
    let low = create(&engine, "low", "a", 0.2, &[]);
    let high = create(&engine, "high", "b", 0.95, &[]);
    let archived = create(&engine, "gone", "c", 1.0, &[]);
    engine.archive(&archived.id).unwrap();

    let page = engine.search(SearchOptions::default()).unwrap();
    assert_eq!(ids(&page), vec![high.id.clone(), low.id.clone()]);

    let all = engine
        .search(SearchOptions {
            status: StatusFilter::All,
            ..Default::default()
        })
        .unwrap();
    assert_eq!(all.items[0].memory.id, archived.id);
}

// ============================================================================
// LIFECYCLE
// ============================================================================

#[test]
fn test_delete_removes_triggers_and_links_but_keeps_tags() {
    let (engine, _) = engine();
    let doomed = engine
        .create(CreateMemoryInput {
            tags: vec!["shared".into(), "solo".into()],
            triggers: vec!["standup notes".into()],
            ..CreateMemoryInput::new("Standup", "daily sync format")
        })
        .unwrap();
    let survivor = create(&engine, "Other", "kept", 0.8, &["shared"]);

    assert!(engine.delete(&doomed.id).unwrap());
    assert!(!engine.delete(&doomed.id).unwrap());

    assert!(engine
        .match_triggers("where are my standup notes", None)
        .unwrap()
        .is_empty());
    assert!(engine.search(tags(&["solo"])).unwrap().items.is_empty());
    assert_eq!(ids(&engine.search(tags(&["shared"])).unwrap()), vec![survivor.id.clone()]);
    assert_eq!(engine.get(&survivor.id).unwrap().tags, vec!["shared"]);

    let vocabulary = engine
        .storage()
        .with_connection(|conn| queries::all_tag_names(conn))
        .unwrap();
    assert_eq!(vocabulary, vec!["shared", "solo"]);
    assert_eq!(engine.stats().unwrap().total_triggers, 0);
}

#[test]
fn test_unknown_id_is_not_found() {
    let (engine, _) = engine();
    assert!(matches!(engine.get("no-such-id"), Err(MnemonicError::NotFound(_))));
    assert!(engine
        .update("no-such-id", UpdateMemoryInput::default())
        .unwrap_err()
        .is_not_found());
    assert!(engine.pin("no-such-id", true).unwrap_err().is_not_found());
}

#[test]
fn test_pin_round_trip_keeps_weight() {
    let (engine, _) = engine();
    let memory = create(&engine, "t", "c", 0.37, &[]);

    let pinned = engine.pin(&memory.id, true).unwrap();
    assert!(pinned.pinned);
    let unpinned = engine.pin(&memory.id, false).unwrap();
    assert!(!unpinned.pinned);
    assert_eq!(unpinned.weight, 0.37);
    assert_eq!(unpinned.access_count, memory.access_count);
}

#[test]
fn test_get_counts_accesses() {
    let (engine, clock) = engine();
    let memory = create(&engine, "t", "c", 0.5, &[]);

    clock.advance_days(3);
    let first = engine.get(&memory.id).unwrap();
    assert_eq!(first.access_count, 1);
    assert_eq!(first.last_accessed_at, clock.now());
    assert_eq!(first.updated_at, memory.updated_at);

    let second = engine.get(&memory.id).unwrap();
    assert_eq!(second.access_count, 2);

    // Listing never counts
    engine.list(ListOptions::default()).unwrap();
    assert_eq!(engine.get(&memory.id).unwrap().access_count, 3);
}

#[test]
fn test_list_pagination() {
    let (engine, clock) = engine();
    for i in 0..25 {
        create(&engine, &format!("m{:02}", i), "body", 0.8, &[]);
        clock.advance(chrono::Duration::seconds(1));
    }

    let first = engine.list(ListOptions::default()).unwrap();
    assert_eq!(first.items.len(), 20);
    assert_eq!(first.total, 25);
    assert!(first.has_more);
    assert_eq!(first.items[0].title, "m24");

    let rest = engine
        .list(ListOptions {
            offset: Some(20),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(rest.items.len(), 5);
    assert!(!rest.has_more);

    let capped = engine
        .list(ListOptions {
            limit: Some(500),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(capped.limit, 100);
    assert_eq!(capped.items.len(), 25);

    let by_title = engine
        .list(ListOptions {
            sort_by: Some(SortField::Title),
            sort_order: Some(SortOrder::Asc),
            limit: Some(3),
            ..Default::default()
        })
        .unwrap();
    let titles: Vec<&str> = by_title.items.iter().map(|m| m.title.as_str()).collect();
    assert_eq!(titles, vec!["m00", "m01", "m02"]);
}

// ============================================================================
// TRIGGERS
// ============================================================================

#[test]
fn test_trigger_matching() {
    let (engine, _) = engine();
    let strong = engine
        .create(CreateMemoryInput {
            weight: Some(0.9),
            triggers: vec!["Good Morning".into(), "morning".into()],
            ..CreateMemoryInput::new("Routine", "coffee first")
        })
        .unwrap();
    let weak = engine
        .create(CreateMemoryInput {
            weight: Some(0.3),
            triggers: vec!["morning".into()],
            ..CreateMemoryInput::new("Alarm", "6am")
        })
        .unwrap();

    let matched = engine.match_triggers("GOOD   morning, team", None).unwrap();
    let matched_ids: Vec<&str> = matched.iter().map(|m| m.id.as_str()).collect();
    assert_eq!(matched_ids, vec![strong.id.as_str(), weak.id.as_str()]);

    assert_eq!(engine.match_triggers("evening", None).unwrap().len(), 0);
    assert_eq!(engine.match_triggers("morning", Some(1)).unwrap().len(), 1);

    engine.archive(&strong.id).unwrap();
    let matched = engine.match_triggers("good morning", None).unwrap();
    assert_eq!(matched.len(), 1);
    assert_eq!(matched[0].id, weak.id);
}

// ============================================================================
// EXPORT / IMPORT
// ============================================================================

#[test]
fn test_export_import_round_trip() {
    let (source, clock) = engine();
    let first = source
        .create(CreateMemoryInput {
            memory_type: MemoryType::Milestone,
            tags: vec!["launch".into(), "v1".into()],
            triggers: vec!["launch day".into()],
            weight: Some(0.95),
            emotional_flag: true,
            metadata: Some(json!({"source": "retro", "score": 4.5})),
            ..CreateMemoryInput::new("Shipped v1", "Launched after six months")
        })
        .unwrap();
    create(&source, "Second", "another", 0.4, &["misc"]);
    clock.advance_days(2);
    source.get(&first.id).unwrap();
    source.archive(&first.id).unwrap();

    let document = source.export().unwrap();
    assert_eq!(document.format, "mnemonic");
    assert_eq!(document.version, "1.0");
    assert_eq!(document.count, 2);
    assert_eq!(document.tags, vec!["launch", "misc", "v1"]);

    let (target, _) = engine();
    let summary = target
        .import_document(&document, ConflictPolicy::Overwrite)
        .unwrap();
    assert_eq!(summary.created, 2);
    assert_eq!(summary.failed, 0);

    let reexported = target.export().unwrap();
    assert_eq!(reexported.memories, document.memories);
    assert_eq!(reexported.tags, document.tags);

    // Importing again under overwrite changes nothing
    let summary = target
        .import_document(&document, ConflictPolicy::Overwrite)
        .unwrap();
    assert_eq!(summary.overwritten, 2);
    assert_eq!(target.export().unwrap().memories, document.memories);
}

#[test]
fn test_import_policies() {
    let (engine, clock) = engine();
    let memory = create(&engine, "Original", "first version", 0.5, &["a"]);
    clock.advance_days(1);
    engine.get(&memory.id).unwrap();
    engine.get(&memory.id).unwrap();

    let document = json!({
        "format": "mnemonic",
        "version": "1.0",
        "memories": [
            {"id": memory.id, "title": "Replaced", "content": "second version", "tags": ["b"], "access_count": 0},
            {"title": "No id", "content": "gets a fresh one"},
            {"id": "broken", "title": "   ", "content": "blank title"}
        ]
    });

    let summary = engine.import(&document, ConflictPolicy::Skip).unwrap();
    assert_eq!(summary.total, 3);
    assert_eq!(summary.created, 1);
    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.errors[0].index, 2);
    assert_eq!(summary.errors[0].id.as_deref(), Some("broken"));
    assert_eq!(engine.get(&memory.id).unwrap().title, "Original");

    let summary = engine.import(&document, ConflictPolicy::Overwrite).unwrap();
    assert_eq!(summary.overwritten, 1);
    let replaced = engine.get(&memory.id).unwrap();
    assert_eq!(replaced.title, "Replaced");
    assert_eq!(replaced.tags, vec!["b"]);
    // 3 earlier gets plus this one; the document's 0 never lowers it
    assert_eq!(replaced.access_count, 4);

    let err = engine.import(&document, ConflictPolicy::FailFast).unwrap_err();
    assert!(matches!(err.root_cause(), MnemonicError::Conflict { id, .. } if *id == memory.id));
}

#[test]
fn test_fail_fast_keeps_earlier_records() {
    let (engine, _) = engine();
    let existing = create(&engine, "Existing", "x", 0.5, &[]);

    let document = json!({
        "version": "1.0",
        "memories": [
            {"id": "fresh-1", "title": "One", "content": "first"},
            {"id": existing.id, "title": "Clash", "content": "conflict"},
            {"id": "fresh-2", "title": "Two", "content": "never reached"}
        ]
    });

    let err = engine.import(&document, ConflictPolicy::FailFast).unwrap_err();
    assert!(matches!(err.root_cause(), MnemonicError::Conflict { .. }));
    assert_eq!(err.code(), -32005);

    let summary = err.import_summary().unwrap();
    assert_eq!(summary.total, 3);
    assert_eq!(summary.created, 1);
    assert_eq!(summary.failed, 0);
    let stopped = summary.stopped_at.as_ref().unwrap();
    assert_eq!(stopped.index, 1);
    assert_eq!(stopped.id.as_deref(), Some(existing.id.as_str()));

    assert_eq!(engine.get("fresh-1").unwrap().title, "One");
    assert!(engine.get("fresh-2").unwrap_err().is_not_found());
}

#[test]
fn test_import_as_fresh_copies() {
    let (engine, _) = engine();
    let original = create(&engine, "Shared", "same text twice", 0.6, &["copy"]);
    let document = engine.export().unwrap();

    let summary = engine
        .import_document(&document, ImportOptions::fresh_ids())
        .unwrap();
    assert_eq!(summary.created, 1);
    assert_eq!(summary.skipped, 0);

    let page = engine.search(tags(&["copy"])).unwrap();
    assert_eq!(page.total, 2);
    let copy = page
        .items
        .iter()
        .map(|r| &r.memory)
        .find(|m| m.id != original.id)
        .unwrap();
    assert_eq!(copy.title, "Shared");
    assert_eq!(copy.weight, 0.6);

    // Ids are kept by default, so the same document now only skips
    let summary = engine.import_document(&document, ConflictPolicy::Skip).unwrap();
    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.created, 0);
}

#[test]
fn test_import_rejects_unknown_versions() {
    let (engine, _) = engine();
    for document in [
        json!({"version": "2.0", "memories": []}),
        json!({"memories": []}),
        json!({"version": "1.0", "items": []}),
    ] {
        assert!(matches!(
            engine.import(&document, ConflictPolicy::Skip),
            Err(MnemonicError::UnsupportedFormat(_))
        ));
    }
    assert_eq!(engine.stats().unwrap().total_memories, 0);
}

// ============================================================================
// STATS / MAINTENANCE
// ============================================================================

#[test]
fn test_stats() {
    let (engine, clock) = engine();
    create(&engine, "a", "x", 0.95, &["rust", "cli"]);
    create(&engine, "b", "x", 0.75, &["rust"]);
    create(&engine, "c", "x", 0.2, &[]);
    let archived = create(&engine, "d", "x", 0.55, &["rust"]);
    engine.archive(&archived.id).unwrap();
    engine
        .create(CreateMemoryInput {
            pinned: true,
            emotional_flag: true,
            weight: Some(0.6),
            ..CreateMemoryInput::new("e", "x")
        })
        .unwrap();

    clock.advance_days(10);
    let stats = engine.stats().unwrap();
    assert_eq!(stats.total_memories, 5);
    assert_eq!(stats.by_status.get("active"), Some(&4));
    assert_eq!(stats.by_status.get("archived"), Some(&1));
    assert_eq!(stats.weight_distribution.get("high"), Some(&1));
    assert_eq!(stats.weight_distribution.get("medium"), Some(&1));
    assert_eq!(stats.weight_distribution.get("low"), Some(&1));
    assert_eq!(stats.weight_distribution.get("very_low"), Some(&1));
    assert_eq!(stats.pinned_count, 1);
    assert_eq!(stats.emotional_count, 1);
    assert_eq!(stats.stale_count, 1);
    assert_eq!(stats.top_tags[0], ("rust".to_string(), 2));
    assert_eq!(stats.total_tags, 2);
    assert!((stats.average_weight - 0.625).abs() < 1e-9);
}

#[test]
fn test_maintenance_only_archives_when_asked() {
    let (engine, clock) = engine();
    let fading = create(&engine, "fading", "x", 0.3, &[]);
    create(&engine, "fresh", "y", 0.9, &[]);
    clock.advance_days(5);

    let report = engine.maintenance(MaintenanceOptions::default()).unwrap();
    assert_eq!(report.stale.len(), 1);
    assert!(report.archived.is_empty());
    assert_eq!(engine.list(ListOptions::default()).unwrap().total, 2);

    let report = engine
        .maintenance(MaintenanceOptions {
            archive_stale: true,
        })
        .unwrap();
    assert_eq!(report.archived, vec![fading.id.clone()]);
    assert_eq!(engine.list(ListOptions::default()).unwrap().total, 1);
}

#[test]
fn test_file_backed_store_persists() {
    let dir = tempfile::tempdir().unwrap();
    let config = MnemonicConfig::new(dir.path().join("memories.db").to_string_lossy());

    let id = {
        let engine = MemoryEngine::open(config.clone()).unwrap();
        engine
            .create(CreateMemoryInput::new("Durable", "survives reopen"))
            .unwrap()
            .id
    };

    let engine = MemoryEngine::open(config).unwrap();
    assert_eq!(engine.get(&id).unwrap().title, "Durable");
    assert_eq!(engine.search(query("survives")).unwrap().total, 1);
}

// ============================================================================
// CONCURRENCY
// ============================================================================

#[test]
fn test_locked_database_is_storage_unavailable() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("memories.db");
    let mut config = MnemonicConfig::new(path.to_string_lossy());
    config.busy_timeout_ms = 200;
    let engine = MemoryEngine::open(config).unwrap();

    // Another process holding the write lock
    let other = rusqlite::Connection::open(&path).unwrap();
    other.execute_batch("BEGIN IMMEDIATE").unwrap();

    let started = std::time::Instant::now();
    let err = engine
        .create(CreateMemoryInput::new("Blocked", "waits for the lock"))
        .unwrap_err();
    let waited = started.elapsed();

    assert!(matches!(err, MnemonicError::StorageUnavailable(_)), "{err:?}");
    assert!(err.is_retryable());
    assert!(waited >= std::time::Duration::from_millis(150), "{waited:?}");
    assert!(waited < std::time::Duration::from_secs(5), "{waited:?}");

    // Reads still work under WAL while the writer holds its lock
    assert_eq!(engine.list(ListOptions::default()).unwrap().total, 0);

    other.execute_batch("ROLLBACK").unwrap();
    engine
        .create(CreateMemoryInput::new("Unblocked", "lock released"))
        .unwrap();
}

#[test]
fn test_concurrent_creates_on_cloned_engines() {
    let dir = tempfile::tempdir().unwrap();
    let config = MnemonicConfig::new(dir.path().join("memories.db").to_string_lossy());
    let engine = MemoryEngine::open(config).unwrap();

    let handles: Vec<_> = (0..8)
        .map(|t| {
            let engine = engine.clone();
            std::thread::spawn(move || {
                for i in 0..20 {
                    engine
                        .create(CreateMemoryInput {
                            tags: vec![format!("thread{}", t)],
                            ..CreateMemoryInput::new(
                                format!("Note {} from {}", i, t),
                                "parallel writer",
                            )
                        })
                        .unwrap();
                    engine.search(query("parallel")).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let all = engine
        .list(ListOptions {
            limit: Some(100),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(all.total, 160);
    assert_eq!(engine.search(query("parallel")).unwrap().total, 160);
    assert_eq!(engine.search(tags(&["thread3"])).unwrap().total, 20);
}
