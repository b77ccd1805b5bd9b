use chrono::{Local, TimeZone};
use hearth::intent::IntentLabel;
use hearth::planner::{
    check_feasibility, fallback_plan, refine, ActionStep, Infeasibility, Plan, StepStatus,
};
use hearth::services::hub::DeviceState;
use hearth::snapshot::{build_snapshot, EnvironmentSnapshot};

fn home(devices: &[(&str, &str)]) -> EnvironmentSnapshot {
    let states: Vec<DeviceState> = devices
        .iter()
        .map(|(id, s)| DeviceState::new(id, s).named(&format!("{} device", id)))
        .collect();
    build_snapshot(&states, Local.with_ymd_and_hms(2024, 3, 2, 21, 0, 0).unwrap())
}

#[test]
fn test_prepare_bath_all_off_keeps_every_step_active() {
    let snap = home(&[
        ("switch.water_heater", "off"),
        ("switch.bathroom_heater", "off"),
        ("light.bathroom_light", "off"),
    ]);
    let mut plan = fallback_plan(IntentLabel::PrepareBath);
    refine(&mut plan, &snap);

    assert_eq!(plan.steps.len(), 3);
    assert_eq!(plan.dispatchable_steps().count(), 3, "Nothing is satisfied yet");
    let targets: Vec<&str> = plan.steps.iter().map(|s| s.entity_id.as_str()).collect();
    assert_eq!(
        targets,
        vec!["switch.water_heater", "switch.bathroom_heater", "light.bathroom_light"]
    );
}

#[test]
fn test_prepare_bath_skips_heater_already_on() {
    let snap = home(&[
        ("switch.water_heater", "on"),
        ("switch.bathroom_heater", "off"),
        ("light.bathroom_light", "off"),
    ]);
    let mut plan = fallback_plan(IntentLabel::PrepareBath);
    let description_before = plan.steps[0].description.clone();
    refine(&mut plan, &snap);

    assert_eq!(plan.steps.len(), 3, "Skipped steps are kept");
    assert_eq!(plan.steps[0].status, StepStatus::SkippedAlreadySatisfied);
    assert_eq!(plan.steps[0].description, description_before, "Descriptions stay plain text");
    assert_eq!(plan.steps[1].status, StepStatus::Normal);
    assert_eq!(plan.steps[2].status, StepStatus::Normal);
}

#[test]
fn test_turn_off_already_off_is_skipped() {
    let snap = home(&[("light.bedroom_light", "off"), ("light.living_room_light", "on")]);
    let mut plan = Plan::new(
        IntentLabel::Sleep,
        vec![
            ActionStep::new("light.turn_off", "light.bedroom_light", "Bedroom", "off"),
            ActionStep::new("light.turn_off", "light.living_room_light", "Living room", "off"),
        ],
        0.9,
        true,
    );
    refine(&mut plan, &snap);

    assert_eq!(plan.steps[0].status, StepStatus::SkippedAlreadySatisfied);
    assert_eq!(plan.steps[1].status, StepStatus::Normal);
}

#[test]
fn test_missing_target_is_flagged_not_dropped() {
    let snap = home(&[("switch.water_heater", "off"), ("switch.bathroom_heater", "off")]);
    let mut plan = fallback_plan(IntentLabel::PrepareBath);
    refine(&mut plan, &snap);

    assert_eq!(plan.steps.len(), 3);
    assert_eq!(plan.steps[2].entity_id, "light.bathroom_light");
    assert_eq!(plan.steps[2].status, StepStatus::TargetMissing);
    assert_eq!(plan.dispatchable_steps().count(), 2);
}

#[test]
fn test_refinement_is_idempotent() {
    let snap = home(&[
        ("switch.water_heater", "on"),
        ("switch.bathroom_heater", "off"),
    ]);
    let mut once = fallback_plan(IntentLabel::PrepareBath);
    refine(&mut once, &snap);
    let mut twice = once.clone();
    refine(&mut twice, &snap);

    assert_eq!(once, twice, "A second pass must change nothing");
}

#[test]
fn test_refinement_clears_stale_skip() {
    let mut plan = fallback_plan(IntentLabel::PrepareBath);
    refine(&mut plan, &home(&[("switch.water_heater", "on")]));
    assert_eq!(plan.steps[0].status, StepStatus::SkippedAlreadySatisfied);

    refine(&mut plan, &home(&[("switch.water_heater", "off")]));
    assert_eq!(plan.steps[0].status, StepStatus::Normal, "Newer state must win");
}

#[test]
fn test_refinement_fills_missing_target_name() {
    let snap = home(&[("fan.bedroom_fan", "off")]);
    let mut plan = Plan::new(
        IntentLabel::AdjustTemperature,
        vec![ActionStep::new("fan.turn_on", "fan.bedroom_fan", "", "Start the fan")],
        0.9,
        true,
    );
    refine(&mut plan, &snap);
    assert_eq!(plan.steps[0].target_name, "fan.bedroom_fan device");
}

#[test]
fn test_feasibility_reports_all_reasons() {
    let snap = home(&[("switch.water_heater", "off")]);

    let mut weak = fallback_plan(IntentLabel::PrepareBath);
    weak.confidence = 0.4;
    let issues = check_feasibility(&weak, &snap);
    assert!(issues.contains(&Infeasibility::MissingDevice("switch.bathroom_heater".to_string())));
    assert!(issues.contains(&Infeasibility::MissingDevice("light.bathroom_light".to_string())));
    assert!(issues.iter().any(|i| matches!(i, Infeasibility::LowConfidence(_))));

    let empty = Plan::status_only(IntentLabel::GetStatus);
    assert_eq!(check_feasibility(&empty, &snap), vec![Infeasibility::NoSteps]);

    let full = home(&[
        ("switch.water_heater", "off"),
        ("switch.bathroom_heater", "off"),
        ("light.bathroom_light", "off"),
    ]);
    assert!(check_feasibility(&fallback_plan(IntentLabel::PrepareBath), &full).is_empty());
}

#[test]
fn test_fallback_table_coverage() {
    for label in IntentLabel::ALL {
        let plan = fallback_plan(label);
        assert_eq!(plan.intent, label);
        if label == IntentLabel::GetStatus {
            assert!(plan.steps.is_empty());
            assert!(!plan.cacheable, "Status plans are never cached");
        } else {
            assert!(!plan.steps.is_empty(), "{} needs a canned plan", label);
            assert!(plan.cacheable);
            assert_eq!(plan.estimated_duration_secs, plan.steps.len() as u64 * 2);
        }
    }
}
