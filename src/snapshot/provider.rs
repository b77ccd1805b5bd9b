use chrono::{DateTime, Local};
use std::sync::Arc;
use tracing::debug;

use super::types::{DeviceRecord, EnvironmentSnapshot, TimeOfDay};
use crate::error::UpstreamError;
use crate::services::hub::{DeviceController, DeviceState};

/// Device domains that matter for actuation. Everything else is dropped to keep
/// snapshots (and therefore fingerprints) small.
pub const ACTUATION_DOMAINS: &[&str] = &[
    "switch",
    "light",
    "climate",
    "fan",
    "cover",
    "lock",
    "sensor",
    "binary_sensor",
];

pub struct SnapshotProvider {
    controller: Arc<dyn DeviceController>,
}

impl SnapshotProvider {
    pub fn new(controller: Arc<dyn DeviceController>) -> Self {
        Self { controller }
    }

    /// Reads the hub and normalizes the result. Hub failures are not masked.
    pub async fn capture(&self) -> Result<EnvironmentSnapshot, UpstreamError> {
        let states = self.controller.list_device_states().await?;
        let snapshot = build_snapshot(&states, Local::now());
        debug!(
            devices = snapshot.devices.len(),
            time_of_day = ?snapshot.time_of_day,
            "Environment snapshot taken"
        );
        Ok(snapshot)
    }
}

/// PURE FUNCTION: raw hub states + wall clock -> snapshot.
pub fn build_snapshot(states: &[DeviceState], now: DateTime<Local>) -> EnvironmentSnapshot {
    // Ambient signals are derived from the full list; presence entities
    // (person.*, device_tracker.*) are outside the actuation allow-list.
    let presence = detect_presence(states);
    let temperature = mean_reading(states, "temperature");
    let humidity = mean_reading(states, "humidity");

    let mut devices: Vec<DeviceRecord> = states
        .iter()
        .filter(|s| ACTUATION_DOMAINS.contains(&s.domain()))
        .map(|s| DeviceRecord {
            entity_id: s.entity_id.clone(),
            name: display_name(s),
            state: s.state.clone(),
            attributes: s.attributes.clone(),
        })
        .collect();
    devices.sort_by(|a, b| a.entity_id.cmp(&b.entity_id));
    devices.dedup_by(|a, b| a.entity_id == b.entity_id);

    EnvironmentSnapshot {
        timestamp: now,
        devices,
        time_of_day: TimeOfDay::of(&now),
        presence,
        temperature,
        humidity,
    }
}

fn display_name(state: &DeviceState) -> String {
    if !state.name.is_empty() && state.name != state.entity_id {
        return state.name.clone();
    }
    state
        .attributes
        .get("friendly_name")
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .unwrap_or_else(|| state.entity_id.clone())
}

fn detect_presence(states: &[DeviceState]) -> Option<bool> {
    let mut seen = false;
    for s in states {
        let indicates = match s.domain() {
            "person" | "device_tracker" => Some(s.state == "home"),
            "binary_sensor"
                if ["occupancy", "presence", "motion"]
                    .iter()
                    .any(|k| s.entity_id.contains(k)) =>
            {
                Some(s.state == "on")
            }
            _ => None,
        };
        match indicates {
            Some(true) => return Some(true),
            Some(false) => seen = true,
            None => {}
        }
    }
    if seen {
        Some(false)
    } else {
        None
    }
}

fn mean_reading(states: &[DeviceState], class: &str) -> Option<f64> {
    let values: Vec<f64> = states
        .iter()
        .filter(|s| s.domain() == "sensor")
        .filter(|s| {
            s.attributes.get("device_class").and_then(|v| v.as_str()) == Some(class)
                || s.entity_id.contains(class)
        })
        .filter_map(|s| s.state.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite())
        .collect();

    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}
