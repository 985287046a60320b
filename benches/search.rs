//! Performance benchmarks for search operations

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use mnemonic::search::plan_query;
use mnemonic::types::*;
use mnemonic::MemoryEngine;

fn setup_engine_with_data(count: usize) -> MemoryEngine {
    let engine = MemoryEngine::in_memory().unwrap();

    let sample_contents = [
        "Authentication using JWT tokens and refresh mechanism",
        "Database migration strategy for PostgreSQL",
        "React component lifecycle and hooks optimization",
        "API rate limiting implementation with Redis",
        "Docker container orchestration with Kubernetes",
        "GraphQL schema design best practices",
        "Microservices communication patterns",
        "CI/CD pipeline configuration with GitHub Actions",
        "Memory leak detection in Node.js applications",
        "Rust ownership and borrowing concepts",
    ];

    for i in 0..count {
        let content = format!(
            "{} - variation {} with additional context about software development",
            sample_contents[i % sample_contents.len()],
            i
        );

        engine
            .create(CreateMemoryInput {
                title: format!("Note {}", i),
                content,
                tags: vec![format!("topic{}", i % 5), "development".to_string()],
                triggers: vec![format!("topic {} review", i % 5)],
                weight: Some(0.1 + (i % 10) as f64 / 11.0),
                ..Default::default()
            })
            .unwrap();
    }

    engine
}

fn bench_text_search(c: &mut Criterion) {
    let mut group = c.benchmark_group("text_search");

    for size in [100, 1000, 5000] {
        let engine = setup_engine_with_data(size);
        group.throughput(Throughput::Elements(size as u64));

        group.bench_with_input(BenchmarkId::new("single_term", size), &size, |b, _| {
            b.iter(|| {
                engine
                    .search(SearchOptions {
                        query: Some(black_box("authentication").to_string()),
                        ..Default::default()
                    })
                    .unwrap()
            })
        });

        group.bench_with_input(BenchmarkId::new("punctuated", size), &size, |b, _| {
            b.iter(|| {
                engine
                    .search(SearchOptions {
                        query: Some(black_box("CI/CD & \"GitHub Actions\"").to_string()),
                        ..Default::default()
                    })
                    .unwrap()
            })
        });
    }

    group.finish();
}

fn bench_tag_search(c: &mut Criterion) {
    let engine = setup_engine_with_data(1000);

    c.bench_function("tag_search_and", |b| {
        b.iter(|| {
            engine
                .search(SearchOptions {
                    tags: Some(vec!["topic1".to_string(), "development".to_string()]),
                    ..Default::default()
                })
                .unwrap()
        })
    });

    c.bench_function("list_by_effective_weight", |b| {
        b.iter(|| {
            engine
                .list(ListOptions {
                    sort_by: Some(SortField::Weight),
                    ..Default::default()
                })
                .unwrap()
        })
    });
}

fn bench_triggers(c: &mut Criterion) {
    let engine = setup_engine_with_data(1000);

    c.bench_function("match_triggers", |b| {
        b.iter(|| {
            engine
                .match_triggers(black_box("time for the topic 3 review today"), None)
                .unwrap()
        })
    });
}

fn bench_query_planning(c: &mut Criterion) {
    c.bench_function("plan_query", |b| {
        b.iter(|| plan_query(black_box("\"exact phrase\" deploy* title:(weird) & more")))
    });
}

criterion_group!(
    benches,
    bench_text_search,
    bench_tag_search,
    bench_triggers,
    bench_query_planning
);
criterion_main!(benches);
