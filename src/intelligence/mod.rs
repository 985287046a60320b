//! Weight intelligence
//!
//! Provides:
//! - Effective weight computation (decay, emotional floor, access boost)
//! - Explicit maintenance pass over stale memories

pub mod maintenance;
pub mod weight;

pub use maintenance::{run_maintenance, MaintenanceOptions, MaintenanceReport};
pub use weight::{effective_weight, is_stale, WeightBreakdown, STALE_THRESHOLD};
