use serde::{Deserialize, Serialize};

use crate::intent::Intent;
use crate::planner::{Infeasibility, Plan, PlanSource};
use crate::services::hub::StepResult;
use crate::snapshot::EnvironmentSnapshot;

/// Per-request stages. Strictly forward; there is no path back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PipelineStage {
    Start,
    IntentResolved,
    SnapshotTaken,
    PlanResolved,
    Executed,
    Done,
}

impl PipelineStage {
    pub fn next(self) -> Self {
        match self {
            PipelineStage::Start => PipelineStage::IntentResolved,
            PipelineStage::IntentResolved => PipelineStage::SnapshotTaken,
            PipelineStage::SnapshotTaken => PipelineStage::PlanResolved,
            PipelineStage::PlanResolved => PipelineStage::Executed,
            PipelineStage::Executed | PipelineStage::Done => PipelineStage::Done,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionStatus {
    /// Every dispatched step succeeded (vacuously true when nothing needed dispatching).
    Success,
    /// Mixed results, or a simulated run.
    Partial,
    /// The dispatch call itself failed, or no dispatched step succeeded.
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionOutcome {
    pub status: ExecutionStatus,
    pub results: Vec<StepResult>,
    pub dispatched: usize,
    /// Steps held back by refinement (already satisfied or missing target).
    pub held_back: usize,
    pub simulated: bool,
    pub error: Option<String>,
}

/// Everything a request produced. Either all of it exists or the request failed.
#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    pub intent: Intent,
    pub snapshot: EnvironmentSnapshot,
    pub plan: Plan,
    pub execution: ExecutionOutcome,
    pub cache_hit: bool,
    /// `None` for cache hits.
    pub plan_source: Option<PlanSource>,
    pub feasibility: Vec<Infeasibility>,
    pub stage: PipelineStage,
}
