//! Mnemonic - weighted memory store for AI agents
//!
//! Persistent memories with importance weights that decay with disuse,
//! full-text search blended with effective weight, recall triggers, and
//! versioned export/import.

pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod export;
pub mod intelligence;
pub mod mcp;
pub mod search;
pub mod storage;
pub mod types;

pub use clock::{Clock, FixedClock, SystemClock};
pub use config::MnemonicConfig;
pub use engine::MemoryEngine;
pub use error::{MnemonicError, Result};
pub use export::{ConflictPolicy, ExportDocument, ImportOptions, ImportSummary};
pub use intelligence::{MaintenanceOptions, MaintenanceReport};
pub use storage::Storage;
pub use types::*;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
