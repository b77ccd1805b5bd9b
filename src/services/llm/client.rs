use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use crate::cache::CacheEntry;
use crate::error::{PlanError, UpstreamError};
use crate::intent::{Intent, IntentLabel, IntentResolver, UnknownIntentLabel};
use crate::planner::{ActionStep, Plan, PlanGenerator};
use crate::snapshot::EnvironmentSnapshot;

const SERVICE: &str = "llm";

/// Client for a llama-server style `/completion` endpoint.
#[derive(Clone)]
pub struct LlmService {
    client: Client,
    base_url: String,
}

#[derive(Serialize)]
struct CompletionRequest {
    prompt: String,
    stream: bool,
    n_predict: usize,
    temperature: f32,
    stop: Vec<String>,
}

#[derive(Deserialize)]
struct CompletionResponse {
    content: String,
}

#[derive(Deserialize)]
struct IntentReply {
    intent: String,
    #[serde(default)]
    confidence: Option<f32>,
    #[serde(default)]
    time_hint: Option<String>,
}

#[derive(Deserialize)]
struct StepReply {
    service: String,
    entity_id: String,
    #[serde(default)]
    target_name: String,
    #[serde(default)]
    description: String,
}

impl LlmService {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(10))
                .build()
                .unwrap_or_default(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    async fn complete(&self, prompt: String, n_predict: usize) -> Result<String, UpstreamError> {
        let request_body = CompletionRequest {
            prompt,
            stream: false,
            n_predict,
            temperature: 0.2,
            stop: vec!["User:".to_string()],
        };

        let response = self
            .client
            .post(format!("{}/completion", self.base_url))
            .json(&request_body)
            .send()
            .await
            .map_err(|e| UpstreamError::unavailable(SERVICE, e))?;

        if !response.status().is_success() {
            return Err(UpstreamError::unavailable(
                SERVICE,
                format!("server returned {}", response.status()),
            ));
        }

        let body: CompletionResponse = response
            .json()
            .await
            .map_err(|e| UpstreamError::InvalidResponse(e.to_string()))?;
        Ok(body.content)
    }
}

#[async_trait]
impl IntentResolver for LlmService {
    async fn resolve(&self, text: &str) -> Result<Intent, UpstreamError> {
        let labels: Vec<&str> = IntentLabel::ALL.iter().map(|l| l.as_str()).collect();
        let prompt = format!(
            "System: Classify the smart-home request. Reply with JSON only: \
             {{\"intent\": one of [{}], \"confidence\": 0..1, \"time_hint\": string or null}}\n\
             User: {}\nAssistant:",
            labels.join(", "),
            text
        );

        let content = self.complete(prompt, 64).await?;
        parse_intent(&content, text)
    }
}

#[async_trait]
impl PlanGenerator for LlmService {
    async fn generate(
        &self,
        intent: &Intent,
        snapshot: &EnvironmentSnapshot,
        similar: &[CacheEntry],
    ) -> Result<Plan, PlanError> {
        let prompt = plan_prompt(intent, snapshot, similar);
        let content = self.complete(prompt, 512).await?;
        debug!(intent = %intent.label, "Plan generator replied");
        parse_plan(&content, intent.label)
    }
}

fn plan_prompt(intent: &Intent, snapshot: &EnvironmentSnapshot, similar: &[CacheEntry]) -> String {
    let devices: Vec<String> = snapshot
        .devices
        .iter()
        .map(|d| format!("{} ({}) = {}", d.entity_id, d.name, d.state))
        .collect();

    let mut prompt = format!(
        "System: You control a smart home. Produce a JSON plan: \
         {{\"steps\": [{{\"service\": \"domain.action\", \"entity_id\": ..., \"target_name\": ..., \"description\": ...}}], \
         \"confidence\": 0..1, \"cacheable\": bool}}. Only use listed devices. \
         Mark plans that depend on one-off reasoning as not cacheable.\n\
         Time of day: {:?}. Presence: {:?}. Temperature: {:?}. Humidity: {:?}.\n\
         Devices:\n{}\n",
        snapshot.time_of_day,
        snapshot.presence,
        snapshot.temperature,
        snapshot.humidity,
        devices.join("\n")
    );

    for (i, entry) in similar.iter().enumerate() {
        let steps = serde_json::to_string(&entry.plan.steps).unwrap_or_default();
        prompt.push_str(&format!(
            "Example {} (success rate {:.2}): {}\n",
            i + 1,
            entry.success_rate,
            steps
        ));
    }

    prompt.push_str(&format!(
        "User: {} (intent: {})\nAssistant:",
        intent.raw_text, intent.label
    ));
    prompt
}

/// Models wrap JSON in prose or code fences; take the outermost object.
fn extract_json(content: &str) -> Option<&str> {
    let start = content.find('{')?;
    let end = content.rfind('}')?;
    (end > start).then(|| &content[start..=end])
}

pub fn parse_intent(content: &str, raw_text: &str) -> Result<Intent, UpstreamError> {
    let json = extract_json(content)
        .ok_or_else(|| UpstreamError::InvalidResponse("no JSON object in reply".to_string()))?;
    let reply: IntentReply =
        serde_json::from_str(json).map_err(|e| UpstreamError::InvalidResponse(e.to_string()))?;
    let label: IntentLabel = reply
        .intent
        .parse()
        .map_err(|e: UnknownIntentLabel| UpstreamError::InvalidResponse(e.to_string()))?;

    let mut intent = Intent::new(label, reply.confidence.unwrap_or(0.5), raw_text);
    if let Some(hint) = reply.time_hint.filter(|h| !h.trim().is_empty()) {
        intent = intent.with_time_hint(hint);
    }
    Ok(intent)
}

/// A reply without a `steps` array is malformed; nothing partial is accepted.
pub fn parse_plan(content: &str, intent: IntentLabel) -> Result<Plan, PlanError> {
    let json = extract_json(content)
        .ok_or_else(|| PlanError::InvalidShape("no JSON object in reply".to_string()))?;
    let value: Value =
        serde_json::from_str(json).map_err(|e| PlanError::InvalidShape(e.to_string()))?;

    let steps_value = value
        .get("steps")
        .cloned()
        .ok_or_else(|| PlanError::InvalidShape("missing steps field".to_string()))?;
    let steps: Vec<StepReply> = serde_json::from_value(steps_value)
        .map_err(|e| PlanError::InvalidShape(format!("bad steps: {}", e)))?;

    let steps: Vec<ActionStep> = steps
        .into_iter()
        .map(|s| ActionStep::new(&s.service, &s.entity_id, &s.target_name, &s.description))
        .collect();

    let confidence = value
        .get("confidence")
        .and_then(Value::as_f64)
        .unwrap_or(0.8) as f32;
    // Reuse is opt-in. Status answers depend on the moment they were produced.
    let cacheable = value
        .get("cacheable")
        .and_then(Value::as_bool)
        .unwrap_or(false)
        && intent != IntentLabel::GetStatus;

    let mut plan = Plan::new(intent, steps, confidence, cacheable);
    if let Some(secs) = value.get("estimated_duration").and_then(Value::as_u64) {
        plan.estimated_duration_secs = secs;
    }
    Ok(plan)
}
