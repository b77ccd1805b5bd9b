use serde::Serialize;
use sha2::{Digest, Sha256};

use super::types::EnvironmentFingerprint;
use crate::services::hub::entity_domain;
use crate::snapshot::{DeviceRecord, EnvironmentSnapshot, TimeOfDay};

/// Reduced view that goes into the digest. Sensor readings are kept as integer
/// tenths so rounding, not float formatting, decides equality.
#[derive(Serialize)]
struct CanonicalSnapshot<'a> {
    time_of_day: TimeOfDay,
    presence: Option<bool>,
    temperature_tenths: Option<i64>,
    humidity_tenths: Option<i64>,
    devices: Vec<(&'a str, String)>,
}

fn tenths(value: Option<f64>) -> Option<i64> {
    value.map(|v| (v * 10.0).round() as i64)
}

/// Numeric sensor states get the same one-decimal rounding as the ambient readings.
fn canonical_state(device: &DeviceRecord) -> String {
    if entity_domain(&device.entity_id) == "sensor" {
        if let Ok(v) = device.state.trim().parse::<f64>() {
            return format!("{:.1}", (v * 10.0).round() / 10.0);
        }
    }
    device.state.clone()
}

/// Device order and sub-0.1 sensor noise do not change the result.
pub fn fingerprint(snapshot: &EnvironmentSnapshot) -> EnvironmentFingerprint {
    let mut devices: Vec<(&str, String)> = snapshot
        .devices
        .iter()
        .map(|d| (d.entity_id.as_str(), canonical_state(d)))
        .collect();
    devices.sort();

    let canonical = CanonicalSnapshot {
        time_of_day: snapshot.time_of_day,
        presence: snapshot.presence,
        temperature_tenths: tenths(snapshot.temperature),
        humidity_tenths: tenths(snapshot.humidity),
        devices,
    };

    let mut hasher = Sha256::new();
    hasher.update(serde_json::to_vec(&canonical).unwrap_or_default());

    EnvironmentFingerprint {
        digest: format!("{:x}", hasher.finalize()),
        time_of_day: snapshot.time_of_day,
    }
}
