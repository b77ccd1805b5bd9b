use std::fmt;

use crate::planner::types::{Plan, StepStatus};
use crate::snapshot::EnvironmentSnapshot;

/// Plans below this confidence are reported as infeasible.
pub const MIN_FEASIBLE_CONFIDENCE: f32 = 0.6;

/// Annotates each step against the snapshot. Never reorders or removes steps.
///
/// Status is recomputed from scratch on every call, so refining a cached plan
/// against a newer snapshot can clear an earlier skip, and refining twice against
/// the same snapshot changes nothing.
pub fn refine(plan: &mut Plan, snapshot: &EnvironmentSnapshot) {
    for step in plan.steps.iter_mut() {
        let Some(device) = snapshot.device(&step.entity_id) else {
            step.status = StepStatus::TargetMissing;
            continue;
        };

        if step.target_name.is_empty() {
            step.target_name = device.name.clone();
        }

        let satisfied = (step.is_turn_on() && device.state == "on")
            || (step.is_turn_off() && device.state == "off");

        step.status = if satisfied {
            StepStatus::SkippedAlreadySatisfied
        } else {
            StepStatus::Normal
        };
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Infeasibility {
    NoSteps,
    MissingDevice(String),
    LowConfidence(f32),
}

impl fmt::Display for Infeasibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Infeasibility::NoSteps => write!(f, "plan has no steps"),
            Infeasibility::MissingDevice(id) => write!(f, "device {} not found", id),
            Infeasibility::LowConfidence(c) => {
                write!(f, "confidence {:.2} below {:.2}", c, MIN_FEASIBLE_CONFIDENCE)
            }
        }
    }
}

/// Advisory check. Returns every reason the plan looks unworkable; empty means feasible.
pub fn check_feasibility(plan: &Plan, snapshot: &EnvironmentSnapshot) -> Vec<Infeasibility> {
    let mut issues = Vec::new();

    if plan.steps.is_empty() {
        issues.push(Infeasibility::NoSteps);
    }
    for step in &plan.steps {
        if !snapshot.has_device(&step.entity_id) {
            issues.push(Infeasibility::MissingDevice(step.entity_id.clone()));
        }
    }
    if plan.confidence < MIN_FEASIBLE_CONFIDENCE {
        issues.push(Infeasibility::LowConfidence(plan.confidence));
    }

    issues
}
