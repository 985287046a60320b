//! Effective weight computation
//!
//! A memory's effective weight is recomputed from its stored fields every time
//! it is asked for. Nothing here is persisted, so the result depends only on
//! the inputs and `now`:
//!
//! ```text
//! pinned                 -> 1.0
//! time_decay             = 0.99 ^ whole_days_since_last_access
//! emotional_flag         -> time_decay = max(time_decay, 0.8)
//! frequency_boost        = min(access_count * 0.02, 0.3)
//! effective              = min(weight * time_decay + frequency_boost, 1.0)
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{Memory, MemoryId};

/// Per-day multiplier applied to the base weight
pub const DECAY_RATE: f64 = 0.99;
/// Lowest time decay for emotionally flagged memories
pub const EMOTIONAL_DECAY_FLOOR: f64 = 0.8;
/// Boost contributed by each recorded access
pub const BOOST_PER_ACCESS: f64 = 0.02;
/// Ceiling on the total access boost
pub const MAX_FREQUENCY_BOOST: f64 = 0.3;
/// Effective weight below which a memory is reported as stale
pub const STALE_THRESHOLD: f64 = 0.3;

/// Whole days elapsed between `last_accessed_at` and `now`, never negative
pub fn days_since(last_accessed_at: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    (now - last_accessed_at).num_days().max(0)
}

/// Multiplicative decay for `days` without access
pub fn time_decay(days: i64, emotional_flag: bool) -> f64 {
    let decay = DECAY_RATE.powf(days.max(0) as f64);
    if emotional_flag {
        decay.max(EMOTIONAL_DECAY_FLOOR)
    } else {
        decay
    }
}

/// Additive boost from access frequency, capped at [`MAX_FREQUENCY_BOOST`]
pub fn frequency_boost(access_count: i64) -> f64 {
    (access_count.max(0) as f64 * BOOST_PER_ACCESS).min(MAX_FREQUENCY_BOOST)
}

/// Effective weight from raw fields
pub fn compute_effective_weight(
    weight: f64,
    pinned: bool,
    emotional_flag: bool,
    access_count: i64,
    days: i64,
) -> f64 {
    if pinned {
        return 1.0;
    }
    let decayed = weight * time_decay(days, emotional_flag);
    (decayed + frequency_boost(access_count)).min(1.0)
}

/// Effective weight of `memory` at `now`
pub fn effective_weight(memory: &Memory, now: DateTime<Utc>) -> f64 {
    compute_effective_weight(
        memory.weight,
        memory.pinned,
        memory.emotional_flag,
        memory.access_count,
        days_since(memory.last_accessed_at, now),
    )
}

/// Advisory classification; never changes status by itself
pub fn is_stale(effective_weight: f64) -> bool {
    effective_weight < STALE_THRESHOLD
}

/// Effective weight with its inputs, for reports
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeightBreakdown {
    pub id: MemoryId,
    pub title: String,
    pub base_weight: f64,
    pub days_since_access: i64,
    pub time_decay: f64,
    pub frequency_boost: f64,
    pub effective_weight: f64,
    pub pinned: bool,
    pub stale: bool,
}

impl WeightBreakdown {
    pub fn of(memory: &Memory, now: DateTime<Utc>) -> Self {
        let days = days_since(memory.last_accessed_at, now);
        let effective = effective_weight(memory, now);
        Self {
            id: memory.id.clone(),
            title: memory.title.clone(),
            base_weight: memory.weight,
            days_since_access: days,
            time_decay: time_decay(days, memory.emotional_flag),
            frequency_boost: frequency_boost(memory.access_count),
            effective_weight: effective,
            pinned: memory.pinned,
            stale: is_stale(effective),
        }
    }
}
