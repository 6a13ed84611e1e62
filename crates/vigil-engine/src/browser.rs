use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;

pub use vigil_common::error::BrowserError;

pub type WindowId = u32;
pub type TabId = u32;

/// The seam between coordinator logic and the actual browser.
///
/// The production implementation proxies each call to the connected page
/// bridge; tests substitute a mock so every upstream source can be driven
/// in isolation.
#[async_trait]
pub trait Browser: Send + Sync {
    /// Number of tabs currently being captured in the browser.
    async fn captured_tab_count(&mut self) -> Result<usize, BrowserError>;

    /// Whether any browser window currently has focus.
    async fn window_focused(&mut self) -> Result<bool, BrowserError>;

    /// URL of the focused window's active tab.
    async fn active_tab_url(&mut self) -> Result<String, BrowserError>;

    /// URL of a specific tab. Fails when the tab is already gone (tab-close
    /// races are expected and swallowed by callers).
    async fn tab_url(&mut self, tab: TabId) -> Result<String, BrowserError>;

    /// Run the user-facing capture chooser (screen/window/tab), scoped to
    /// `window` when given. `Ok(None)` means the user cancelled.
    async fn choose_capture_source(
        &mut self,
        window: Option<WindowId>,
    ) -> Result<Option<String>, BrowserError>;
}

/// Shared handle letting the dispatcher and the probe loop talk to the same
/// browser without overlapping calls.
pub type SharedBrowser = Arc<Mutex<dyn Browser>>;

pub fn shared<B: Browser + 'static>(browser: B) -> SharedBrowser {
    Arc::new(Mutex::new(browser))
}
