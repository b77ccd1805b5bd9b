use std::sync::Arc;
use tracing::{debug, info, warn};

use super::stats::{PipelineEvent, PipelineStats, StatsRecorder};
use super::types::{ExecutionOutcome, ExecutionStatus, PipelineOutcome, PipelineStage};
use crate::cache::{PlanCache, RateUpdate};
use crate::config::ExecutionMode;
use crate::error::PipelineError;
use crate::intent::{Intent, IntentResolver};
use crate::planner::{check_feasibility, refine, Plan, PlanGenerator, PlanResolver, PlanSource};
use crate::services::hub::{DeviceController, ServiceCall, StepResult};
use crate::snapshot::{EnvironmentSnapshot, SnapshotProvider};

/// Intent -> snapshot -> plan (cached or generated) -> execution.
///
/// Collaborators are injected; the pipeline itself holds no global state and can
/// be shared by concurrent request handlers.
pub struct Pipeline {
    intents: Arc<dyn IntentResolver>,
    controller: Arc<dyn DeviceController>,
    snapshots: SnapshotProvider,
    cache: Arc<PlanCache>,
    resolver: PlanResolver,
    mode: ExecutionMode,
    stats: StatsRecorder,
}

impl Pipeline {
    pub fn new(
        intents: Arc<dyn IntentResolver>,
        controller: Arc<dyn DeviceController>,
        generator: Option<Arc<dyn PlanGenerator>>,
        cache: Arc<PlanCache>,
        mode: ExecutionMode,
    ) -> Self {
        Self {
            intents,
            snapshots: SnapshotProvider::new(controller.clone()),
            controller,
            resolver: PlanResolver::new(cache.clone(), generator),
            cache,
            mode,
            stats: StatsRecorder::new(),
        }
    }

    pub fn cache(&self) -> &Arc<PlanCache> {
        &self.cache
    }

    pub fn stats(&self) -> PipelineStats {
        self.stats.snapshot()
    }

    pub async fn run(&self, text: &str) -> Result<PipelineOutcome, PipelineError> {
        self.stats.record(PipelineEvent::RequestStarted);
        let result = self.run_stages(text).await;

        match &result {
            Ok(outcome) if outcome.execution.status == ExecutionStatus::Success => {
                self.stats.record(PipelineEvent::Succeeded)
            }
            Ok(outcome) if outcome.execution.status == ExecutionStatus::Failed => {
                self.stats.record(PipelineEvent::Failed)
            }
            Ok(_) => {}
            Err(e) => {
                warn!("Request failed: {}", e);
                self.stats.record(PipelineEvent::Failed);
            }
        }

        result
    }

    async fn run_stages(&self, text: &str) -> Result<PipelineOutcome, PipelineError> {
        let mut stage = PipelineStage::Start;

        // 1. Intent. Never fatal.
        let intent = self.resolve_intent(text).await;
        stage = advance(stage);

        // 2. Snapshot. No state view, no plan.
        let snapshot = self
            .snapshots
            .capture()
            .await
            .map_err(PipelineError::SnapshotUnavailable)?;
        stage = advance(stage);

        // 3. Plan: validated cache hit, otherwise resolve and write back.
        let cached = self.lookup_cached(&intent, &snapshot);
        let cache_hit = cached.is_some();
        let (plan, hit_key, plan_source) = match cached {
            Some((plan, key)) => {
                self.stats.record(PipelineEvent::CacheHit);
                (plan, Some(key), None)
            }
            None => {
                let resolved = self.resolver.resolve(&intent, &snapshot).await?;
                if resolved.source == PlanSource::Fallback {
                    self.stats.record(PipelineEvent::FallbackPlan);
                }
                (resolved.plan, None, Some(resolved.source))
            }
        };

        let feasibility = check_feasibility(&plan, &snapshot);
        for issue in &feasibility {
            warn!(plan = %plan.id, "Plan may not be feasible: {}", issue);
        }
        stage = advance(stage);

        // 4. Execute, then feed the outcome back if the plan came from the cache.
        let execution = self.execute(&plan).await;
        stage = advance(stage);

        if let Some(key) = hit_key {
            if execution.simulated {
                debug!(key = %key, "Simulated run, success rate left untouched");
            } else {
                let success = execution.status == ExecutionStatus::Success;
                match self.cache.update_success_rate(&key, success) {
                    RateUpdate::Updated(rate) => debug!(key = %key, rate, "Success rate updated"),
                    RateUpdate::Removed(rate) => {
                        info!(key = %key, rate, "Cached plan dropped after repeated failures")
                    }
                    RateUpdate::NotFound => debug!(key = %key, "Cached plan gone before feedback"),
                }
            }
        }

        info!(
            intent = %intent.label,
            cache_hit,
            status = ?execution.status,
            dispatched = execution.dispatched,
            "Request complete"
        );

        Ok(PipelineOutcome {
            intent,
            snapshot,
            plan,
            execution,
            cache_hit,
            plan_source,
            feasibility,
            stage: advance(stage),
        })
    }

    async fn resolve_intent(&self, text: &str) -> Intent {
        match self.intents.resolve(text).await {
            Ok(intent) => intent,
            Err(e) => {
                warn!("Intent resolution failed ({}), defaulting to status query", e);
                Intent::fallback(text)
            }
        }
    }

    /// A hit only counts if every target still exists; a rejected entry is not
    /// touched. The returned plan is refined against the fresh snapshot.
    fn lookup_cached(&self, intent: &Intent, snapshot: &EnvironmentSnapshot) -> Option<(Plan, String)> {
        let lookup = self.cache.query_where(intent.label, Some(snapshot), |entry| {
            match entry.plan.steps.iter().find(|s| !snapshot.has_device(&s.entity_id)) {
                Some(missing) => {
                    warn!(
                        key = %entry.key,
                        device = %missing.entity_id,
                        "Cached plan references a missing device, treating as miss"
                    );
                    false
                }
                None => true,
            }
        });

        let Some(entry) = lookup.entry else {
            if let Some(reason) = lookup.reason {
                debug!(intent = %intent.label, "Cache miss: {}", reason);
            }
            return None;
        };

        let mut plan = entry.plan;
        refine(&mut plan, snapshot);
        Some((plan, entry.key))
    }

    /// Dispatches every step refinement left as `Normal`.
    pub async fn execute(&self, plan: &Plan) -> ExecutionOutcome {
        let calls: Vec<ServiceCall> = plan.dispatchable_steps().map(|s| s.service_call()).collect();
        let held_back = plan.steps.len() - calls.len();

        if self.mode == ExecutionMode::Simulate {
            let results = calls
                .iter()
                .map(|c| StepResult {
                    entity_id: c.entity_id.clone(),
                    service: c.service.clone(),
                    success: true,
                    message: Some("simulated".to_string()),
                })
                .collect();
            return ExecutionOutcome {
                status: ExecutionStatus::Partial,
                results,
                dispatched: 0,
                held_back,
                simulated: true,
                error: None,
            };
        }

        if calls.is_empty() {
            return ExecutionOutcome {
                status: ExecutionStatus::Success,
                results: Vec::new(),
                dispatched: 0,
                held_back,
                simulated: false,
                error: None,
            };
        }

        match self.controller.execute(&calls).await {
            Ok(results) => {
                let succeeded = results.iter().filter(|r| r.success).count();
                let status = if succeeded == calls.len() && results.len() == calls.len() {
                    ExecutionStatus::Success
                } else if succeeded > 0 {
                    ExecutionStatus::Partial
                } else {
                    ExecutionStatus::Failed
                };
                ExecutionOutcome {
                    status,
                    results,
                    dispatched: calls.len(),
                    held_back,
                    simulated: false,
                    error: None,
                }
            }
            Err(e) => {
                warn!(plan = %plan.id, "Dispatch failed: {}", e);
                ExecutionOutcome {
                    status: ExecutionStatus::Failed,
                    results: Vec::new(),
                    dispatched: calls.len(),
                    held_back,
                    simulated: false,
                    error: Some(e.to_string()),
                }
            }
        }
    }
}

fn advance(stage: PipelineStage) -> PipelineStage {
    let next = stage.next();
    debug!(from = ?stage, to = ?next, "Pipeline stage");
    next
}
