//! Wire protocol between the page bridge and the monitor.
//!
//! Commands are request/response and sequence-numbered; browser events are
//! fire-and-forget notifications; browser queries travel the opposite
//! direction and are answered with query results. Everything rides the same
//! WebSocket connection wrapped in a [`Frame`] envelope.

use serde::{Deserialize, Serialize};

/// Monitoring configuration. `is_active` is derived from identifier
/// presence on every update; callers never set it directly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitoringConfig {
    pub base_url: String,
    pub assessment_id: String,
    pub candidate_id: String,
    pub submission_id: String,
    pub is_active: bool,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000".to_string(),
            assessment_id: String::new(),
            candidate_id: String::new(),
            submission_id: String::new(),
            is_active: false,
        }
    }
}

impl MonitoringConfig {
    /// True iff every correlation identifier is present.
    pub fn derive_active(&self) -> bool {
        !self.assessment_id.is_empty()
            && !self.candidate_id.is_empty()
            && !self.submission_id.is_empty()
    }
}

/// Partial configuration carried by `SET_CONFIG`. Missing identifiers clear
/// to empty; a missing (or empty) base URL keeps the previous one.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assessment_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub candidate_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submission_id: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartCaptureRequest {
    /// Window the chooser should be scoped to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window_id: Option<u32>,
}

/// Fullscreen state observed by the page bridge. The bridge forwards one
/// unconditional report at page-ready time (`initial: true`) and only state
/// transitions after that.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FullscreenNotice {
    pub fullscreen: bool,
    #[serde(default)]
    pub initial: bool,
}

/// Inbound commands, routed by the dispatcher. One reply per command.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Command {
    Ping,
    SetConfig(ConfigUpdate),
    StartCapture(StartCaptureRequest),
    StopCapture,
    GetStatus,
    FullscreenChange(FullscreenNotice),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigReply {
    pub ok: bool,
    pub config: MonitoringConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AckReply {
    pub ok: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureReply {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusReply {
    pub ok: bool,
    pub captured_count: usize,
    pub active_url: String,
    pub window_focused: bool,
    /// Whether the three identifiers are configured.
    pub active: bool,
    /// Whether the probe loop is currently armed.
    pub monitoring: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorReply {
    pub ok: bool,
    pub error: String,
}

/// Command replies. Serialized untagged so each lands on the wire as a bare
/// `{ok, ...payload}` object. Variant order matters for deserialization:
/// field-richer shapes first.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Reply {
    Status(StatusReply),
    Config(ConfigReply),
    Error(ErrorReply),
    Capture(CaptureReply),
    Ack(AckReply),
}

impl Reply {
    pub fn ack() -> Self {
        Reply::Ack(AckReply { ok: true })
    }

    /// Reply for inbound text that did not decode to a known command.
    pub fn unknown_message() -> Self {
        Reply::Error(ErrorReply {
            ok: false,
            error: "unknown_message".to_string(),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FocusChange {
    /// Absent when focus left every browser window.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window_id: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TabActivation {
    pub tab_id: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TabNavigation {
    pub tab_id: u32,
    pub url: String,
}

/// Browser-side occurrences the bridge forwards without expecting a reply.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BrowserEvent {
    FocusChanged(FocusChange),
    TabActivated(TabActivation),
    TabNavigated(TabNavigation),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TabUrlRequest {
    pub tab_id: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChooseCaptureRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window_id: Option<u32>,
}

/// Probe queries the monitor sends to the bridge.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BrowserQuery {
    CapturedTabCount,
    WindowFocused,
    ActiveTabUrl,
    TabUrl(TabUrlRequest),
    ChooseCaptureSource(ChooseCaptureRequest),
}

/// Bridge answers to [`BrowserQuery`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum QueryOutcome {
    Count { count: usize },
    Flag { value: bool },
    Url { url: String },
    #[serde(rename_all = "camelCase")]
    Stream { stream_id: Option<String> },
    Failed { message: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandFrame {
    pub seq: u64,
    /// Left untyped so unrecognized commands can be answered with a
    /// structured error instead of failing the whole frame.
    pub command: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplyFrame {
    pub seq: u64,
    pub reply: Reply,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventFrame {
    pub event: BrowserEvent,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryFrame {
    pub seq: u64,
    pub query: BrowserQuery,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResultFrame {
    pub seq: u64,
    pub outcome: QueryOutcome,
}

/// Envelope for every WebSocket text message in either direction.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "frame", rename_all = "snake_case")]
pub enum Frame {
    Command(CommandFrame),
    Reply(ReplyFrame),
    Event(EventFrame),
    Query(QueryFrame),
    QueryResult(QueryResultFrame),
}
