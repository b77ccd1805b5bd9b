use async_trait::async_trait;

use super::types::{Intent, IntentLabel};
use crate::error::UpstreamError;

/// Turns free text into a classified [`Intent`].
#[async_trait]
pub trait IntentResolver: Send + Sync {
    async fn resolve(&self, text: &str) -> Result<Intent, UpstreamError>;
}

/// Offline keyword classifier.
///
/// Used when no inference backend is configured. Keyword hits score 0.8 (0.9 when
/// more than one keyword of the same intent matches); anything unrecognised becomes
/// a low-confidence status query.
pub struct KeywordIntentResolver {
    rules: Vec<(IntentLabel, &'static [&'static str])>,
}

impl Default for KeywordIntentResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl KeywordIntentResolver {
    pub fn new() -> Self {
        Self {
            rules: vec![
                (IntentLabel::PrepareBath, &["bath", "shower", "tub"]),
                (IntentLabel::Sleep, &["sleep", "bed", "good night", "goodnight"]),
                (IntentLabel::LeaveHome, &["leaving", "leave", "going out", "bye"]),
                (IntentLabel::ArriveHome, &["home", "arrived", "back", "i'm here"]),
                (
                    IntentLabel::AdjustTemperature,
                    &["temperature", "warmer", "cooler", "cold", "hot", "heating"],
                ),
                (IntentLabel::GetStatus, &["status", "what's on", "check"]),
            ],
        }
    }

    pub fn classify(&self, text: &str) -> Intent {
        let lower = text.to_lowercase();

        // Rules are ordered; the first label with the most hits wins.
        let mut best: Option<(IntentLabel, usize)> = None;
        for (label, keywords) in &self.rules {
            let hits = keywords.iter().filter(|k| lower.contains(*k)).count();
            if hits > 0 && best.map_or(true, |(_, h)| hits > h) {
                best = Some((*label, hits));
            }
        }

        let mut intent = match best {
            Some((label, hits)) => Intent::new(label, if hits > 1 { 0.9 } else { 0.8 }, text),
            None => Intent::new(IntentLabel::GetStatus, 0.3, text),
        };

        for hint in ["tonight", "now", "morning", "later", "in an hour"] {
            if lower.contains(hint) {
                intent = intent.with_time_hint(hint);
                break;
            }
        }

        intent
    }
}

#[async_trait]
impl IntentResolver for KeywordIntentResolver {
    async fn resolve(&self, text: &str) -> Result<Intent, UpstreamError> {
        Ok(self.classify(text))
    }
}
