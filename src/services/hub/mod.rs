pub mod client;
pub mod mock;

pub use client::HubClient;
pub use mock::MockHub;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::UpstreamError;

/// Raw device record as reported by the hub.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceState {
    pub entity_id: String,
    #[serde(default)]
    pub name: String,
    pub state: String,
    #[serde(default)]
    pub attributes: Map<String, Value>,
}

impl DeviceState {
    pub fn new(entity_id: &str, state: &str) -> Self {
        Self {
            entity_id: entity_id.to_string(),
            name: entity_id.to_string(),
            state: state.to_string(),
            attributes: Map::new(),
        }
    }

    pub fn named(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    pub fn with_attribute(mut self, key: &str, value: Value) -> Self {
        self.attributes.insert(key.to_string(), value);
        self
    }

    /// Domain prefix of the entity id ("light" for "light.kitchen").
    pub fn domain(&self) -> &str {
        entity_domain(&self.entity_id)
    }
}

pub fn entity_domain(entity_id: &str) -> &str {
    entity_id.split('.').next().unwrap_or_default()
}

/// One device command: `domain.action` against an entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceCall {
    pub service: String,
    pub entity_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepResult {
    pub entity_id: String,
    pub service: String,
    pub success: bool,
    pub message: Option<String>,
}

/// Device-state reads and command dispatch against the home-automation hub.
#[async_trait]
pub trait DeviceController: Send + Sync {
    async fn list_device_states(&self) -> Result<Vec<DeviceState>, UpstreamError>;

    /// Dispatches every call and reports one result per call.
    /// An `Err` means the dispatch itself failed, not an individual device.
    async fn execute(&self, calls: &[ServiceCall]) -> Result<Vec<StepResult>, UpstreamError>;
}
