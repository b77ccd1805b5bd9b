use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::intent::IntentLabel;
use crate::services::hub::{entity_domain, ServiceCall};

/// Seconds budgeted per device operation when estimating plan duration.
pub const SECONDS_PER_STEP: u64 = 2;

/// Outcome of refining a step against the current environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    #[default]
    Normal,
    /// Device is already in the requested state; not dispatched.
    SkippedAlreadySatisfied,
    /// Target entity is not in the snapshot; kept for visibility, not dispatched.
    TargetMissing,
}

/// One device operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionStep {
    /// `domain.action`, e.g. `light.turn_on`.
    pub service: String,
    pub entity_id: String,
    pub target_name: String,
    pub description: String,
    #[serde(default)]
    pub status: StepStatus,
}

impl ActionStep {
    pub fn new(service: &str, entity_id: &str, target_name: &str, description: &str) -> Self {
        Self {
            service: service.to_string(),
            entity_id: entity_id.to_string(),
            target_name: target_name.to_string(),
            description: description.to_string(),
            status: StepStatus::Normal,
        }
    }

    pub fn action(&self) -> &str {
        self.service
            .split_once('.')
            .map(|(_, action)| action)
            .unwrap_or(&self.service)
    }

    pub fn domain(&self) -> &str {
        entity_domain(&self.entity_id)
    }

    pub fn is_turn_on(&self) -> bool {
        self.action() == "turn_on"
    }

    pub fn is_turn_off(&self) -> bool {
        self.action() == "turn_off"
    }

    pub fn is_dispatchable(&self) -> bool {
        self.status == StepStatus::Normal
    }

    pub fn service_call(&self) -> ServiceCall {
        ServiceCall {
            service: self.service.clone(),
            entity_id: self.entity_id.clone(),
        }
    }
}

/// Ordered device operations answering one intent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub id: String,
    pub intent: IntentLabel,
    pub steps: Vec<ActionStep>,
    pub estimated_duration_secs: u64,
    /// 0.0 - 1.0
    pub confidence: f32,
    /// Set by the generator. Plans built on contingent reasoning must not be reused.
    pub cacheable: bool,
}

impl Plan {
    pub fn new(intent: IntentLabel, steps: Vec<ActionStep>, confidence: f32, cacheable: bool) -> Self {
        let estimated_duration_secs = steps.len() as u64 * SECONDS_PER_STEP;
        Self {
            id: Uuid::new_v4().to_string(),
            intent,
            steps,
            estimated_duration_secs,
            confidence: confidence.clamp(0.0, 1.0),
            cacheable,
        }
    }

    /// Empty, non-cacheable plan that only reports state.
    pub fn status_only(intent: IntentLabel) -> Self {
        Self::new(intent, Vec::new(), 1.0, false)
    }

    pub fn dispatchable_steps(&self) -> impl Iterator<Item = &ActionStep> {
        self.steps.iter().filter(|s| s.is_dispatchable())
    }
}
