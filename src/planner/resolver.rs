use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::fallback::fallback_plan;
use super::refine::refine;
use super::types::Plan;
use crate::cache::{CacheEntry, PlanCache};
use crate::error::PlanError;
use crate::intent::Intent;
use crate::snapshot::EnvironmentSnapshot;

/// Maximum number of cached plans handed to the generator as grounding.
pub const SIMILAR_PLAN_LIMIT: usize = 3;
/// Minimum similarity score for a cached plan to be offered as grounding.
pub const SIMILARITY_THRESHOLD: f32 = 0.5;

/// Produces a fresh plan for an intent, optionally grounded on similar cached plans.
#[async_trait]
pub trait PlanGenerator: Send + Sync {
    async fn generate(
        &self,
        intent: &Intent,
        snapshot: &EnvironmentSnapshot,
        similar: &[CacheEntry],
    ) -> Result<Plan, PlanError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanSource {
    Generated,
    Fallback,
}

#[derive(Debug, Clone)]
pub struct ResolvedPlan {
    /// Already refined against the snapshot it was resolved for.
    pub plan: Plan,
    pub source: PlanSource,
    /// Key the plan was written under, if it was cached.
    pub cache_key: Option<String>,
}

/// Builds plans on a cache miss and writes them back.
pub struct PlanResolver {
    cache: Arc<PlanCache>,
    generator: Option<Arc<dyn PlanGenerator>>,
}

impl PlanResolver {
    pub fn new(cache: Arc<PlanCache>, generator: Option<Arc<dyn PlanGenerator>>) -> Self {
        Self { cache, generator }
    }

    /// Cached plans for the same intent scored by
    /// `0.3 * same time-of-day + 0.4 * success rate + 0.3 * intent confidence`.
    pub fn similar_plans(&self, intent: &Intent, snapshot: &EnvironmentSnapshot) -> Vec<CacheEntry> {
        let mut scored: Vec<(f32, CacheEntry)> = self
            .cache
            .find_candidates(intent.label)
            .into_iter()
            .map(|entry| (similarity(&entry, intent, snapshot), entry))
            .filter(|(score, _)| *score > SIMILARITY_THRESHOLD)
            .collect();

        scored.sort_by(|a, b| b.0.total_cmp(&a.0).then_with(|| a.1.key.cmp(&b.1.key)));
        scored
            .into_iter()
            .take(SIMILAR_PLAN_LIMIT)
            .map(|(_, entry)| entry)
            .collect()
    }

    /// Generate (or fall back), refine, and cache.
    ///
    /// An unreachable generator yields the canned plan; a malformed plan is an error.
    pub async fn resolve(
        &self,
        intent: &Intent,
        snapshot: &EnvironmentSnapshot,
    ) -> Result<ResolvedPlan, PlanError> {
        let (mut plan, source) = match &self.generator {
            Some(generator) => {
                let similar = self.similar_plans(intent, snapshot);
                debug!(intent = %intent.label, grounding = similar.len(), "Requesting plan");

                match generator.generate(intent, snapshot, &similar).await {
                    Ok(plan) => {
                        validate_shape(&plan)?;
                        (plan, PlanSource::Generated)
                    }
                    Err(PlanError::Unavailable(reason)) => {
                        warn!(intent = %intent.label, "Plan generator unavailable ({}), using fallback", reason);
                        (fallback_plan(intent.label), PlanSource::Fallback)
                    }
                    Err(e) => return Err(e),
                }
            }
            None => (fallback_plan(intent.label), PlanSource::Fallback),
        };

        refine(&mut plan, snapshot);

        let cache_key = if plan.cacheable {
            self.cache.store(intent.label, &plan, Some(snapshot))
        } else {
            None
        };

        info!(
            intent = %intent.label,
            steps = plan.steps.len(),
            source = ?source,
            cached = cache_key.is_some(),
            "Plan resolved"
        );

        Ok(ResolvedPlan { plan, source, cache_key })
    }
}

fn similarity(entry: &CacheEntry, intent: &Intent, snapshot: &EnvironmentSnapshot) -> f32 {
    let same_bucket = entry
        .fingerprint
        .as_ref()
        .map_or(false, |fp| fp.time_of_day == snapshot.time_of_day);

    let time_score = if same_bucket { 1.0 } else { 0.0 };
    0.3 * time_score + 0.4 * entry.success_rate + 0.3 * intent.confidence
}

/// Rejects plans whose steps cannot be dispatched at all.
pub fn validate_shape(plan: &Plan) -> Result<(), PlanError> {
    for (i, step) in plan.steps.iter().enumerate() {
        let well_formed = step
            .service
            .split_once('.')
            .map_or(false, |(domain, action)| !domain.is_empty() && !action.is_empty());
        if !well_formed {
            return Err(PlanError::InvalidShape(format!(
                "step {} has invalid service '{}'",
                i, step.service
            )));
        }
        if step.entity_id.trim().is_empty() {
            return Err(PlanError::InvalidShape(format!("step {} has no target entity", i)));
        }
    }
    Ok(())
}
