use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Fixed `source` tag stamped on every outbound event body.
pub const EVENT_SOURCE: &str = "CLIENT";

/// Key/value merged into every event's detail map at send time, marking the
/// event as originating from the extension side.
pub const DETAIL_SRC_KEY: &str = "_src";
pub const DETAIL_SRC_VALUE: &str = "ext";

/// Open string-keyed map carrying event-specific context (URL, reason,
/// severity, counts).
pub type Detail = serde_json::Map<String, Value>;

/// Builds a detail map from literal key/value pairs.
pub fn detail<const N: usize>(pairs: [(&str, Value); N]) -> Detail {
    pairs
        .into_iter()
        .map(|(key, value)| (key.to_string(), value))
        .collect()
}

/// Every event the monitor can emit, by wire name.
///
/// `KeyShortcut` is a historical name kept for backend compatibility; it is
/// emitted on tab activation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    VisibilityHidden,
    FocusReturn,
    KeyShortcut,
    TabBlur,
    SecondDisplaySuspected,
    Heartbeat,
    ScreenShareStarted,
    ScreenShareStopped,
    ScreenShareError,
    FullscreenChange,
}

/// Advisory classification attached to violation-like events. Not enforced
/// anywhere in this system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

impl From<Severity> for Value {
    fn from(severity: Severity) -> Value {
        Value::String(severity.as_str().to_string())
    }
}

/// Body of `POST {base_url}/api/proctor/event`.
///
/// The identifier fields are copied from the monitoring config at send time;
/// `timestamp` is epoch milliseconds at capture time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventBody {
    pub submission_id: String,
    pub assessment_id: String,
    pub candidate_id: String,
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub detail: Detail,
    pub source: String,
    pub timestamp: i64,
}
