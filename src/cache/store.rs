use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Instant;
use tracing::debug;

use super::fingerprint::fingerprint;
use super::types::{
    CacheEntry, CacheLookup, CacheStats, CacheStrategy, EnvironmentFingerprint, MissReason,
    RateUpdate,
};
use crate::config::CacheConfig;
use crate::intent::IntentLabel;
use crate::planner::Plan;
use crate::snapshot::{EnvironmentSnapshot, TimeOfDay};

/// Entries above this success rate are offered on fuzzy lookups even when the
/// time-of-day bucket differs.
pub const FUZZY_TRUST_THRESHOLD: f32 = 0.8;
/// Entries whose success rate falls below this are dropped.
pub const RETENTION_FLOOR: f32 = 0.3;
pub const SUCCESS_REWARD: f32 = 0.1;
pub const FAILURE_PENALTY: f32 = 0.2;

/// In-memory, process-lifetime plan cache shared by all in-flight requests.
///
/// Every read-modify-write runs under one mutex. Nothing here awaits, so the
/// lock is never held across collaborator I/O.
pub struct PlanCache {
    config: CacheConfig,
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl PlanCache {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn strategy(&self) -> CacheStrategy {
        self.config.strategy
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, CacheEntry>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Key and fingerprint for an (intent, snapshot) pair. `None` when caching is disabled.
    pub fn derive_key(
        &self,
        intent: IntentLabel,
        snapshot: Option<&EnvironmentSnapshot>,
    ) -> Option<(String, Option<EnvironmentFingerprint>)> {
        match self.config.strategy {
            CacheStrategy::Disabled => None,
            CacheStrategy::Simple => Some((intent.as_str().to_string(), None)),
            CacheStrategy::ContextAware => match snapshot.map(fingerprint) {
                Some(fp) => Some((format!("{}:{}", intent, fp.short()), Some(fp))),
                None => Some((format!("{}:none", intent), None)),
            },
        }
    }

    pub fn query(&self, intent: IntentLabel, snapshot: Option<&EnvironmentSnapshot>) -> CacheLookup {
        self.query_at(intent, snapshot, Instant::now())
    }

    pub fn query_at(
        &self,
        intent: IntentLabel,
        snapshot: Option<&EnvironmentSnapshot>,
        now: Instant,
    ) -> CacheLookup {
        self.query_where_at(intent, snapshot, now, |_| true)
    }

    /// Like [`query`](Self::query), but the candidate must also pass `accept`.
    /// A rejected candidate is reported as a miss and left exactly as it was.
    pub fn query_where<F>(
        &self,
        intent: IntentLabel,
        snapshot: Option<&EnvironmentSnapshot>,
        accept: F,
    ) -> CacheLookup
    where
        F: Fn(&CacheEntry) -> bool,
    {
        self.query_where_at(intent, snapshot, Instant::now(), accept)
    }

    pub fn query_where_at<F>(
        &self,
        intent: IntentLabel,
        snapshot: Option<&EnvironmentSnapshot>,
        now: Instant,
        accept: F,
    ) -> CacheLookup
    where
        F: Fn(&CacheEntry) -> bool,
    {
        let Some((key, fp)) = self.derive_key(intent, snapshot) else {
            return CacheLookup::miss(MissReason::Disabled);
        };

        let mut entries = self.lock();

        // 1. Exact key, then (context-aware only) the fuzzy fallback.
        let found = if entries.contains_key(&key) {
            Some(key)
        } else if self.config.strategy == CacheStrategy::ContextAware {
            let requested_bucket = fp.as_ref().map(|f| f.time_of_day);
            fuzzy_match(&entries, intent, requested_bucket)
        } else {
            None
        };

        let Some(found) = found else {
            debug!(intent = %intent, "Plan cache miss");
            return CacheLookup::miss(MissReason::NotFound);
        };

        // 2. Lazy expiry.
        let expired = entries
            .get(&found)
            .map(|e| now.saturating_duration_since(e.last_used) > self.config.ttl)
            .unwrap_or(true);
        if expired {
            entries.remove(&found);
            debug!(key = %found, "Plan cache entry expired");
            return CacheLookup::miss(MissReason::Expired);
        }

        // 3. Caller validation, before anything is recorded.
        match entries.get_mut(&found) {
            Some(entry) if !accept(&*entry) => {
                debug!(key = %found, "Plan cache candidate rejected");
                CacheLookup::miss(MissReason::Rejected)
            }
            Some(entry) => {
                entry.usage_count += 1;
                entry.last_used = now;
                debug!(key = %found, usage = entry.usage_count, "Plan cache hit");
                CacheLookup::hit(entry.clone())
            }
            None => CacheLookup::miss(MissReason::NotFound),
        }
    }

    /// Stores a plan. Returns the key it was stored under, or `None` when nothing was stored.
    pub fn store(
        &self,
        intent: IntentLabel,
        plan: &Plan,
        snapshot: Option<&EnvironmentSnapshot>,
    ) -> Option<String> {
        self.store_at(intent, plan, snapshot, Instant::now())
    }

    pub fn store_at(
        &self,
        intent: IntentLabel,
        plan: &Plan,
        snapshot: Option<&EnvironmentSnapshot>,
        now: Instant,
    ) -> Option<String> {
        if !plan.cacheable || self.config.max_size == 0 {
            return None;
        }
        let (key, fp) = self.derive_key(intent, snapshot)?;

        let mut entries = self.lock();

        // Overwriting an existing key never needs room.
        if !entries.contains_key(&key) && entries.len() >= self.config.max_size {
            if let Some(victim) = eviction_candidate(&entries, now) {
                entries.remove(&victim);
                debug!(key = %victim, "Evicted plan cache entry");
            }
        }

        entries.insert(
            key.clone(),
            CacheEntry {
                key: key.clone(),
                intent,
                plan: plan.clone(),
                fingerprint: fp,
                last_used: now,
                usage_count: 1,
                success_rate: 1.0,
            },
        );
        debug!(key = %key, size = entries.len(), "Stored plan");

        Some(key)
    }

    /// Feeds one execution outcome back into an entry's success rate.
    ///
    /// Success adds 0.1, failure subtracts 0.2, clamped to [0, 1]. An entry that
    /// ends up below 0.3 is removed on the spot.
    pub fn update_success_rate(&self, key: &str, success: bool) -> RateUpdate {
        let mut entries = self.lock();

        let Some(entry) = entries.get_mut(key) else {
            return RateUpdate::NotFound;
        };

        entry.success_rate = if success {
            (entry.success_rate + SUCCESS_REWARD).min(1.0)
        } else {
            (entry.success_rate - FAILURE_PENALTY).max(0.0)
        };
        let rate = entry.success_rate;

        if rate < RETENTION_FLOOR {
            entries.remove(key);
            debug!(key = %key, rate, "Dropped unreliable cached plan");
            RateUpdate::Removed(rate)
        } else {
            RateUpdate::Updated(rate)
        }
    }

    /// Read-only copies of every entry stored for `intent`, best success rate first.
    pub fn find_candidates(&self, intent: IntentLabel) -> Vec<CacheEntry> {
        let entries = self.lock();
        let mut found: Vec<CacheEntry> = entries
            .values()
            .filter(|e| e.intent == intent)
            .cloned()
            .collect();
        found.sort_by(|a, b| {
            b.success_rate
                .total_cmp(&a.success_rate)
                .then_with(|| a.key.cmp(&b.key))
        });
        found
    }

    pub fn get(&self, key: &str) -> Option<CacheEntry> {
        self.lock().get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            size: self.len(),
            capacity: self.config.max_size,
            strategy: self.config.strategy,
        }
    }
}

/// Among entries for the same intent, accept those sharing the requested
/// time-of-day bucket or with a success rate above the trust threshold.
/// Ties go to the higher success rate, then the most recently used, then the key.
fn fuzzy_match(
    entries: &HashMap<String, CacheEntry>,
    intent: IntentLabel,
    bucket: Option<TimeOfDay>,
) -> Option<String> {
    entries
        .values()
        .filter(|e| e.intent == intent)
        .filter(|e| {
            let same_bucket = match (bucket, e.fingerprint.as_ref()) {
                (Some(b), Some(fp)) => fp.time_of_day == b,
                _ => false,
            };
            same_bucket || e.success_rate > FUZZY_TRUST_THRESHOLD
        })
        .max_by(|a, b| {
            a.success_rate
                .total_cmp(&b.success_rate)
                .then_with(|| a.last_used.cmp(&b.last_used))
                .then_with(|| b.key.cmp(&a.key))
        })
        .map(|e| e.key.clone())
}

/// utility = usage * success_rate / (1 + ms since last use); lowest goes.
pub fn utility_score(entry: &CacheEntry, now: Instant) -> f64 {
    let idle_ms = now.saturating_duration_since(entry.last_used).as_millis() as f64;
    (entry.usage_count as f64 * entry.success_rate as f64) / (1.0 + idle_ms)
}

fn eviction_candidate(entries: &HashMap<String, CacheEntry>, now: Instant) -> Option<String> {
    entries
        .values()
        .min_by(|a, b| {
            utility_score(a, now)
                .total_cmp(&utility_score(b, now))
                .then_with(|| a.key.cmp(&b.key))
        })
        .map(|e| e.key.clone())
}
