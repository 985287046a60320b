//! Mnemonic CLI
//!
//! Command-line interface for memory management.

use std::io::Read;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use mnemonic::config::{db_path_in, MnemonicConfig};
use mnemonic::error::{MnemonicError, Result};
use mnemonic::types::*;
use mnemonic::{ConflictPolicy, ImportOptions, MaintenanceOptions, MemoryEngine};

#[derive(Parser)]
#[command(name = "mnemonic")]
#[command(about = "Weighted memory store CLI")]
#[command(version)]
struct Cli {
    /// Data directory holding memories.db
    #[arg(long, env = "MNEMONIC_DATA_DIR")]
    data_dir: Option<String>,

    /// Database path (overrides --data-dir)
    #[arg(long, env = "MNEMONIC_DB_PATH")]
    db_path: Option<String>,

    /// Storage mode (local or cloud-safe)
    #[arg(long, env = "MNEMONIC_STORAGE_MODE", default_value = "local")]
    storage_mode: StorageMode,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new memory
    Create {
        /// Short title
        title: String,
        /// Content to remember
        content: String,
        /// Memory type
        #[arg(short, long, default_value = "memory")]
        r#type: MemoryType,
        /// Tags (comma-separated)
        #[arg(short = 'T', long)]
        tags: Option<String>,
        /// Trigger phrases (comma-separated)
        #[arg(long)]
        triggers: Option<String>,
        /// Base weight (0.1-1)
        #[arg(short, long)]
        weight: Option<f64>,
        /// Pin the memory
        #[arg(long)]
        pinned: bool,
        /// Mark as emotionally significant
        #[arg(long)]
        emotional: bool,
    },
    /// Get a memory by ID (counts as an access)
    Get {
        /// Memory ID
        id: String,
    },
    /// Update fields of a memory
    Update {
        /// Memory ID
        id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        content: Option<String>,
        #[arg(short, long)]
        r#type: Option<MemoryType>,
        /// Replacement tags (comma-separated)
        #[arg(short = 'T', long)]
        tags: Option<String>,
        /// Replacement trigger phrases (comma-separated)
        #[arg(long)]
        triggers: Option<String>,
        #[arg(short, long)]
        weight: Option<f64>,
        #[arg(long)]
        emotional: Option<bool>,
    },
    /// Delete a memory
    Delete {
        /// Memory ID
        id: String,
    },
    /// List memories
    List {
        /// Maximum number to return
        #[arg(short, long, default_value = "20")]
        limit: usize,
        #[arg(long, default_value = "0")]
        offset: usize,
        /// active, archived or all
        #[arg(short, long, default_value = "active")]
        status: StatusFilter,
        /// created_at, updated_at, last_accessed_at, weight, access_count, title
        #[arg(long, default_value = "updated_at")]
        sort: SortField,
        /// Sort ascending
        #[arg(long)]
        asc: bool,
    },
    /// Search memories
    Search {
        /// Search query
        query: Option<String>,
        /// Required tags (comma-separated)
        #[arg(short = 'T', long)]
        tags: Option<String>,
        /// Maximum results
        #[arg(short, long, default_value = "10")]
        limit: usize,
        #[arg(short, long, default_value = "active")]
        status: StatusFilter,
        /// Count returned memories as accessed
        #[arg(long)]
        track: bool,
    },
    /// Pin a memory
    Pin { id: String },
    /// Unpin a memory
    Unpin { id: String },
    /// Archive a memory
    Archive { id: String },
    /// Restore an archived memory
    Restore { id: String },
    /// Find memories whose trigger phrases occur in the text
    Triggers {
        text: String,
        #[arg(short, long)]
        limit: Option<usize>,
    },
    /// Export all memories as JSON
    Export {
        /// Output file (- for stdout)
        #[arg(short, long, default_value = "-")]
        output: String,
    },
    /// Import memories from an export file
    Import {
        /// Input file (- for stdin)
        input: String,
        /// skip, overwrite or fail_fast
        #[arg(short, long, default_value = "skip")]
        policy: ConflictPolicy,
        /// Give every imported memory a new ID instead of keeping the document's
        #[arg(long)]
        fresh_ids: bool,
    },
    /// Show statistics
    Stats,
    /// Report stale memories
    Maintenance {
        /// Archive stale, non-pinned memories
        #[arg(long)]
        archive: bool,
    },
}

fn split_list(list: Option<String>) -> Option<Vec<String>> {
    list.map(|t| t.split(',').map(|s| s.trim().to_string()).collect())
}

fn print_json(value: &impl serde::Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let db_path = match cli.db_path {
        Some(path) => shellexpand::tilde(&path).to_string(),
        None => db_path_in(cli.data_dir.as_deref()),
    };
    let mut config = MnemonicConfig::new(db_path);
    config.storage_mode = cli.storage_mode;

    let engine = MemoryEngine::open(config)?;

    match cli.command {
        Commands::Create {
            title,
            content,
            r#type,
            tags,
            triggers,
            weight,
            pinned,
            emotional,
        } => {
            let input = CreateMemoryInput {
                title,
                content,
                memory_type: r#type,
                tags: split_list(tags).unwrap_or_default(),
                triggers: split_list(triggers).unwrap_or_default(),
                weight,
                pinned,
                emotional_flag: emotional,
                metadata: None,
            };

            let memory = engine.create(input)?;
            println!("Created memory {}", memory.id);
            print_json(&memory)?;
        }

        Commands::Get { id } => {
            print_json(&engine.get(&id)?)?;
        }

        Commands::Update {
            id,
            title,
            content,
            r#type,
            tags,
            triggers,
            weight,
            emotional,
        } => {
            let input = UpdateMemoryInput {
                title,
                content,
                memory_type: r#type,
                tags: split_list(tags),
                triggers: split_list(triggers),
                weight,
                emotional_flag: emotional,
                ..Default::default()
            };
            print_json(&engine.update(&id, input)?)?;
        }

        Commands::Delete { id } => {
            if engine.delete(&id)? {
                println!("Deleted memory {}", id);
            } else {
                println!("Memory {} did not exist", id);
            }
        }

        Commands::List {
            limit,
            offset,
            status,
            sort,
            asc,
        } => {
            let options = ListOptions {
                status,
                sort_by: Some(sort),
                sort_order: Some(if asc { SortOrder::Asc } else { SortOrder::Desc }),
                limit: Some(limit),
                offset: Some(offset),
            };

            let page = engine.list(options)?;
            for memory in &page.items {
                println!(
                    "{} [{}] w={:.2}{} {} - {}",
                    memory.id,
                    memory.memory_type,
                    memory.weight,
                    if memory.pinned { " *" } else { "" },
                    memory.title,
                    truncate(&memory.content, 60)
                );
            }
            println!("{} of {} memories", page.items.len(), page.total);
        }

        Commands::Search {
            query,
            tags,
            limit,
            status,
            track,
        } => {
            let options = SearchOptions {
                query,
                tags: split_list(tags),
                status,
                limit: Some(limit),
                offset: None,
                track_access: track,
            };

            let page = engine.search(options)?;
            for result in &page.items {
                println!(
                    "{} (score: {:.3}, weight: {:.3}) {} - {}",
                    result.memory.id,
                    result.score,
                    result.effective_weight,
                    result.memory.title,
                    truncate(&result.memory.content, 60)
                );
            }
        }

        Commands::Pin { id } => {
            engine.pin(&id, true)?;
            println!("Pinned memory {}", id);
        }

        Commands::Unpin { id } => {
            engine.pin(&id, false)?;
            println!("Unpinned memory {}", id);
        }

        Commands::Archive { id } => {
            engine.archive(&id)?;
            println!("Archived memory {}", id);
        }

        Commands::Restore { id } => {
            engine.restore(&id)?;
            println!("Restored memory {}", id);
        }

        Commands::Triggers { text, limit } => {
            for memory in engine.match_triggers(&text, limit)? {
                println!(
                    "{} {} [{}]",
                    memory.id,
                    memory.title,
                    memory.triggers.join(", ")
                );
            }
        }

        Commands::Export { output } => {
            let document = engine.export()?;
            let json = serde_json::to_string_pretty(&document)?;
            if output == "-" {
                println!("{}", json);
            } else {
                std::fs::write(&output, json)?;
                eprintln!("Exported {} memories to {}", document.count, output);
            }
        }

        Commands::Import {
            input,
            policy,
            fresh_ids,
        } => {
            let raw = if input == "-" {
                let mut buf = String::new();
                std::io::stdin().read_to_string(&mut buf)?;
                buf
            } else {
                std::fs::read_to_string(&input)?
            };
            let document: serde_json::Value = serde_json::from_str(&raw)
                .map_err(|e| MnemonicError::UnsupportedFormat(e.to_string()))?;

            let options = ImportOptions {
                policy,
                preserve_ids: !fresh_ids,
            };
            match engine.import(&document, options) {
                Ok(summary) => print_json(&summary)?,
                Err(e) => {
                    if let Some(summary) = e.import_summary() {
                        print_json(summary)?;
                    }
                    return Err(e);
                }
            }
        }

        Commands::Stats => {
            print_json(&engine.stats()?)?;
        }

        Commands::Maintenance { archive } => {
            let report = engine.maintenance(MaintenanceOptions {
                archive_stale: archive,
            })?;
            for stale in &report.stale {
                println!(
                    "{} {:.3} (base {:.2}, {} days idle) {}",
                    stale.id,
                    stale.effective_weight,
                    stale.base_weight,
                    stale.days_since_access,
                    stale.title
                );
            }
            println!(
                "{} stale of {} active, {} archived",
                report.stale.len(),
                report.scanned,
                report.archived.len()
            );
        }
    }

    Ok(())
}

fn truncate(s: &str, max: usize) -> String {
    let first_line = s.lines().next().unwrap_or(s);
    if first_line.chars().count() <= max {
        first_line.to_string()
    } else {
        let cut: String = first_line.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", cut)
    }
}
