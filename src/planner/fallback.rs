use crate::intent::IntentLabel;
use crate::planner::types::{ActionStep, Plan};

/// Confidence assigned to canned plans.
pub const FALLBACK_CONFIDENCE: f32 = 0.7;

/// Deterministic plan used when the generator is missing or unreachable.
///
/// Intents without a canned sequence get the empty status plan.
pub fn fallback_plan(intent: IntentLabel) -> Plan {
    let steps: Vec<ActionStep> = canned_steps(intent)
        .iter()
        .map(|(service, entity_id, name, description)| {
            ActionStep::new(service, entity_id, name, description)
        })
        .collect();

    if steps.is_empty() {
        return Plan::status_only(intent);
    }
    Plan::new(intent, steps, FALLBACK_CONFIDENCE, true)
}

type CannedStep = (&'static str, &'static str, &'static str, &'static str);

fn canned_steps(intent: IntentLabel) -> &'static [CannedStep] {
    match intent {
        IntentLabel::PrepareBath => &[
            ("switch.turn_on", "switch.water_heater", "Water heater", "Turn on the water heater"),
            ("switch.turn_on", "switch.bathroom_heater", "Bathroom heater", "Warm up the bathroom"),
            ("light.turn_on", "light.bathroom_light", "Bathroom light", "Turn on the bathroom light"),
        ],
        IntentLabel::Sleep => &[
            ("light.turn_off", "light.living_room_light", "Living room light", "Turn off the living room light"),
            ("light.turn_off", "light.bedroom_light", "Bedroom light", "Turn off the bedroom light"),
            ("cover.close_cover", "cover.bedroom_curtain", "Bedroom curtain", "Close the bedroom curtain"),
            ("lock.lock", "lock.front_door", "Front door", "Lock the front door"),
        ],
        IntentLabel::LeaveHome => &[
            ("light.turn_off", "light.living_room_light", "Living room light", "Turn off the living room light"),
            ("light.turn_off", "light.bedroom_light", "Bedroom light", "Turn off the bedroom light"),
            ("climate.turn_off", "climate.living_room", "Living room climate", "Turn off the heating"),
            ("lock.lock", "lock.front_door", "Front door", "Lock the front door"),
        ],
        IntentLabel::ArriveHome => &[
            ("lock.unlock", "lock.front_door", "Front door", "Unlock the front door"),
            ("light.turn_on", "light.entrance_light", "Entrance light", "Turn on the entrance light"),
            ("climate.turn_on", "climate.living_room", "Living room climate", "Turn on the heating"),
        ],
        IntentLabel::AdjustTemperature => &[
            ("climate.turn_on", "climate.living_room", "Living room climate", "Turn on climate control"),
        ],
        IntentLabel::GetStatus => &[],
    }
}
