use thiserror::Error;

/// Errors surfaced by a `Browser` implementation.
///
/// Callers at the probe and listener level swallow these; they exist so the
/// log line can say what actually went wrong.
#[derive(Debug, Error, Clone)]
pub enum BrowserError {
    #[error("No page bridge connected")]
    NotConnected,

    #[error("Bridge connection lost")]
    ConnectionLost,

    #[error("Tab {id} not found")]
    TabNotFound { id: u32 },

    #[error("Capture chooser failed: {0}")]
    Chooser(String),

    #[error("Browser query failed: {0}")]
    Query(String),
}
