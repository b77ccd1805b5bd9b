use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, warn};

use super::{DeviceController, DeviceState, ServiceCall, StepResult};
use crate::error::UpstreamError;

const SERVICE: &str = "hub";

/// REST client for a Home-Assistant style hub (`/api/states`, `/api/services/<domain>/<action>`).
#[derive(Clone)]
pub struct HubClient {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl HubClient {
    pub fn new(base_url: &str, token: Option<String>) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(5))
                .build()
                .unwrap_or_default(),
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        }
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn call_service(&self, call: &ServiceCall) -> Result<StepResult, UpstreamError> {
        let Some((domain, action)) = call.service.split_once('.') else {
            return Ok(StepResult {
                entity_id: call.entity_id.clone(),
                service: call.service.clone(),
                success: false,
                message: Some("service must be domain.action".to_string()),
            });
        };

        let url = format!("{}/api/services/{}/{}", self.base_url, domain, action);
        let response = self
            .authorized(self.client.post(url))
            .json(&json!({ "entity_id": call.entity_id }))
            .send()
            .await
            .map_err(|e| UpstreamError::unavailable(SERVICE, e))?;

        let status = response.status();
        Ok(StepResult {
            entity_id: call.entity_id.clone(),
            service: call.service.clone(),
            success: status.is_success(),
            message: (!status.is_success()).then(|| format!("hub returned {}", status)),
        })
    }
}

#[async_trait]
impl DeviceController for HubClient {
    async fn list_device_states(&self) -> Result<Vec<DeviceState>, UpstreamError> {
        let response = self
            .authorized(self.client.get(format!("{}/api/states", self.base_url)))
            .send()
            .await
            .map_err(|e| UpstreamError::unavailable(SERVICE, e))?;

        if !response.status().is_success() {
            return Err(UpstreamError::unavailable(
                SERVICE,
                format!("state read returned {}", response.status()),
            ));
        }

        let states: Vec<DeviceState> = response
            .json()
            .await
            .map_err(|e| UpstreamError::InvalidResponse(e.to_string()))?;
        debug!(count = states.len(), "Read device states");
        Ok(states)
    }

    /// Calls run in plan order. A transport failure aborts the dispatch; a
    /// rejected call only fails its own step.
    async fn execute(&self, calls: &[ServiceCall]) -> Result<Vec<StepResult>, UpstreamError> {
        let mut results = Vec::with_capacity(calls.len());
        for call in calls {
            let result = self.call_service(call).await?;
            if !result.success {
                warn!(entity = %call.entity_id, service = %call.service, "Hub rejected call");
            }
            results.push(result);
        }
        Ok(results)
    }
}
