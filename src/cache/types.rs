use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Instant;

use crate::intent::IntentLabel;
use crate::planner::Plan;
use crate::snapshot::TimeOfDay;

/// How cache keys are derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CacheStrategy {
    /// Never cache. Queries miss, stores are no-ops.
    Disabled,
    /// One plan per intent, environment ignored.
    Simple,
    /// Intent plus environment fingerprint.
    #[default]
    ContextAware,
}

impl FromStr for CacheStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "disabled" | "none" | "off" => Ok(CacheStrategy::Disabled),
            "simple" => Ok(CacheStrategy::Simple),
            "context-aware" | "context" => Ok(CacheStrategy::ContextAware),
            other => Err(format!("unknown cache strategy '{}'", other)),
        }
    }
}

/// Digest of the reduced snapshot, plus the one field fuzzy matching needs in clear.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EnvironmentFingerprint {
    /// Hex SHA-256 of the canonical reduced snapshot.
    pub digest: String,
    pub time_of_day: TimeOfDay,
}

impl EnvironmentFingerprint {
    /// Short form used inside cache keys.
    pub fn short(&self) -> &str {
        &self.digest[..self.digest.len().min(16)]
    }
}

/// Stored unit of the plan cache.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub key: String,
    pub intent: IntentLabel,
    pub plan: Plan,
    pub fingerprint: Option<EnvironmentFingerprint>,
    pub last_used: Instant,
    pub usage_count: u64,
    /// 0.0 - 1.0
    pub success_rate: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissReason {
    Disabled,
    NotFound,
    Expired,
    /// Found, but the caller's validation turned it down.
    Rejected,
}

impl fmt::Display for MissReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MissReason::Disabled => f.write_str("caching disabled"),
            MissReason::NotFound => f.write_str("not found"),
            MissReason::Expired => f.write_str("expired"),
            MissReason::Rejected => f.write_str("rejected"),
        }
    }
}

/// Result of [`PlanCache::query`](super::PlanCache::query).
#[derive(Debug, Clone)]
pub struct CacheLookup {
    pub hit: bool,
    /// Copy of the entry as it stands after the hit was recorded.
    pub entry: Option<CacheEntry>,
    pub reason: Option<MissReason>,
}

impl CacheLookup {
    pub fn hit(entry: CacheEntry) -> Self {
        Self { hit: true, entry: Some(entry), reason: None }
    }

    pub fn miss(reason: MissReason) -> Self {
        Self { hit: false, entry: None, reason: Some(reason) }
    }
}

/// Effect of one success-rate report.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RateUpdate {
    Updated(f32),
    /// Rate collapsed below the retention floor; the entry is gone.
    Removed(f32),
    NotFound,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CacheStats {
    pub size: usize,
    pub capacity: usize,
    pub strategy: CacheStrategy,
}
