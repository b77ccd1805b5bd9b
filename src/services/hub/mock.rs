use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use super::{DeviceController, DeviceState, ServiceCall, StepResult};
use crate::error::UpstreamError;

#[derive(Debug, Default)]
struct MockState {
    devices: BTreeMap<String, DeviceState>,
    dispatched: Vec<ServiceCall>,
    failing_entities: HashSet<String>,
    reads_fail: bool,
    dispatch_fails: bool,
}

/// In-memory hub. Applies commands to its own device table so consecutive
/// requests observe each other's effects.
#[derive(Debug, Default)]
pub struct MockHub {
    state: Mutex<MockState>,
}

impl MockHub {
    pub fn new(devices: Vec<DeviceState>) -> Self {
        let hub = Self::default();
        {
            let mut state = hub.lock();
            for device in devices {
                state.devices.insert(device.entity_id.clone(), device);
            }
        }
        hub
    }

    /// A small apartment covering every fallback plan.
    pub fn demo_home() -> Self {
        Self::new(vec![
            DeviceState::new("switch.water_heater", "off").named("Water heater"),
            DeviceState::new("switch.bathroom_heater", "off").named("Bathroom heater"),
            DeviceState::new("light.bathroom_light", "off").named("Bathroom light"),
            DeviceState::new("light.living_room_light", "on").named("Living room light"),
            DeviceState::new("light.bedroom_light", "off").named("Bedroom light"),
            DeviceState::new("light.entrance_light", "off").named("Entrance light"),
            DeviceState::new("cover.bedroom_curtain", "open").named("Bedroom curtain"),
            DeviceState::new("lock.front_door", "unlocked").named("Front door"),
            DeviceState::new("climate.living_room", "off").named("Living room climate"),
            DeviceState::new("sensor.living_room_temperature", "21.4")
                .with_attribute("device_class", "temperature".into()),
            DeviceState::new("sensor.living_room_humidity", "48")
                .with_attribute("device_class", "humidity".into()),
            DeviceState::new("person.resident", "home"),
        ])
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn set_state(&self, entity_id: &str, value: &str) {
        let mut state = self.lock();
        state
            .devices
            .entry(entity_id.to_string())
            .and_modify(|d| d.state = value.to_string())
            .or_insert_with(|| DeviceState::new(entity_id, value));
    }

    pub fn remove_device(&self, entity_id: &str) {
        self.lock().devices.remove(entity_id);
    }

    pub fn state_of(&self, entity_id: &str) -> Option<String> {
        self.lock().devices.get(entity_id).map(|d| d.state.clone())
    }

    /// Commands against this entity report failure.
    pub fn fail_entity(&self, entity_id: &str) {
        self.lock().failing_entities.insert(entity_id.to_string());
    }

    pub fn set_reads_fail(&self, fail: bool) {
        self.lock().reads_fail = fail;
    }

    pub fn set_dispatch_fails(&self, fail: bool) {
        self.lock().dispatch_fails = fail;
    }

    pub fn dispatched(&self) -> Vec<ServiceCall> {
        self.lock().dispatched.clone()
    }
}

fn resulting_state(action: &str) -> Option<&'static str> {
    match action {
        "turn_on" => Some("on"),
        "turn_off" => Some("off"),
        "lock" => Some("locked"),
        "unlock" => Some("unlocked"),
        "open_cover" => Some("open"),
        "close_cover" => Some("closed"),
        _ => None,
    }
}

#[async_trait]
impl DeviceController for MockHub {
    async fn list_device_states(&self) -> Result<Vec<DeviceState>, UpstreamError> {
        let state = self.lock();
        if state.reads_fail {
            return Err(UpstreamError::unavailable("hub", "mock hub offline"));
        }
        Ok(state.devices.values().cloned().collect())
    }

    async fn execute(&self, calls: &[ServiceCall]) -> Result<Vec<StepResult>, UpstreamError> {
        let mut state = self.lock();
        if state.dispatch_fails {
            return Err(UpstreamError::unavailable("hub", "mock hub rejected dispatch"));
        }

        let mut results = Vec::with_capacity(calls.len());
        for call in calls {
            state.dispatched.push(call.clone());

            let known = state.devices.contains_key(&call.entity_id);
            let failing = state.failing_entities.contains(&call.entity_id);
            let success = known && !failing;

            if success {
                let action = call.service.split_once('.').map_or("", |(_, a)| a);
                if let (Some(next), Some(device)) =
                    (resulting_state(action), state.devices.get_mut(&call.entity_id))
                {
                    device.state = next.to_string();
                }
            }

            results.push(StepResult {
                entity_id: call.entity_id.clone(),
                service: call.service.clone(),
                success,
                message: (!success).then(|| "device did not respond".to_string()),
            });
        }
        Ok(results)
    }
}
