use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Closed set of request categories the hub knows how to plan for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IntentLabel {
    PrepareBath,
    Sleep,
    LeaveHome,
    ArriveHome,
    AdjustTemperature,
    GetStatus,
}

impl IntentLabel {
    pub const ALL: [IntentLabel; 6] = [
        IntentLabel::PrepareBath,
        IntentLabel::Sleep,
        IntentLabel::LeaveHome,
        IntentLabel::ArriveHome,
        IntentLabel::AdjustTemperature,
        IntentLabel::GetStatus,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            IntentLabel::PrepareBath => "prepare-bath",
            IntentLabel::Sleep => "sleep",
            IntentLabel::LeaveHome => "leave-home",
            IntentLabel::ArriveHome => "arrive-home",
            IntentLabel::AdjustTemperature => "adjust-temperature",
            IntentLabel::GetStatus => "get-status",
        }
    }
}

impl fmt::Display for IntentLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownIntentLabel(pub String);

impl fmt::Display for UnknownIntentLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown intent label '{}'", self.0)
    }
}

impl std::error::Error for UnknownIntentLabel {}

impl FromStr for IntentLabel {
    type Err = UnknownIntentLabel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Backends are loose about separators ("prepare_bath", "Prepare Bath").
        let normalized = s.trim().to_ascii_lowercase().replace(['_', ' '], "-");
        IntentLabel::ALL
            .iter()
            .copied()
            .find(|label| label.as_str() == normalized)
            .ok_or_else(|| UnknownIntentLabel(s.to_string()))
    }
}

/// A classified user request. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Intent {
    pub label: IntentLabel,
    /// 0.0 - 1.0
    pub confidence: f32,
    pub raw_text: String,
    pub time_hint: Option<String>,
}

impl Intent {
    pub fn new(label: IntentLabel, confidence: f32, raw_text: impl Into<String>) -> Self {
        Self {
            label,
            confidence: confidence.clamp(0.0, 1.0),
            raw_text: raw_text.into(),
            time_hint: None,
        }
    }

    pub fn with_time_hint(mut self, hint: impl Into<String>) -> Self {
        self.time_hint = Some(hint.into());
        self
    }

    /// Used when intent resolution fails: a status query with no confidence at all.
    pub fn fallback(raw_text: impl Into<String>) -> Self {
        Self::new(IntentLabel::GetStatus, 0.0, raw_text)
    }
}
