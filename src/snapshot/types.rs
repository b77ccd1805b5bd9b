use chrono::{DateTime, Local, Timelike};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Coarse wall-clock bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeOfDay {
    /// 05:00 - 11:59
    Morning,
    /// 12:00 - 16:59
    Afternoon,
    /// 17:00 - 21:59
    Evening,
    /// 22:00 - 04:59
    Night,
}

impl TimeOfDay {
    pub fn from_hour(hour: u32) -> Self {
        match hour {
            5..=11 => TimeOfDay::Morning,
            12..=16 => TimeOfDay::Afternoon,
            17..=21 => TimeOfDay::Evening,
            _ => TimeOfDay::Night,
        }
    }

    pub fn of(time: &DateTime<Local>) -> Self {
        Self::from_hour(time.hour())
    }
}

/// Normalized device record kept in a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceRecord {
    pub entity_id: String,
    pub name: String,
    pub state: String,
    pub attributes: Map<String, Value>,
}

/// Read of the world at one instant. Built per request, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentSnapshot {
    pub timestamp: DateTime<Local>,
    /// Ordered by entity id when built by the provider.
    pub devices: Vec<DeviceRecord>,
    pub time_of_day: TimeOfDay,
    pub presence: Option<bool>,
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
}

impl EnvironmentSnapshot {
    pub fn device(&self, entity_id: &str) -> Option<&DeviceRecord> {
        self.devices.iter().find(|d| d.entity_id == entity_id)
    }

    pub fn has_device(&self, entity_id: &str) -> bool {
        self.device(entity_id).is_some()
    }

    pub fn device_state(&self, entity_id: &str) -> Option<&str> {
        self.device(entity_id).map(|d| d.state.as_str())
    }
}
