//! One named handler per upstream browser signal.
//!
//! Each handler classifies its occurrence and forwards one event (or none)
//! to the reporter. Handlers are stateless; transient browser failures are
//! swallowed here so a mid-close tab race never produces anything worse
//! than a missing event.

use tracing::debug;
use vigil_common::event::{detail, EventType, Severity};
use vigil_common::protocol::FullscreenNotice;

use crate::browser::{SharedBrowser, TabId, WindowId};
use crate::exam::ExamContext;
use crate::reporter::EventReporter;

/// Window focus changed. `window` is absent when focus left every browser
/// window.
pub async fn on_focus_changed(reporter: &EventReporter, window: Option<WindowId>) {
    match window {
        None => {
            reporter
                .report(
                    EventType::VisibilityHidden,
                    detail([
                        ("reason", "window_blur".into()),
                        ("severity", Severity::High.into()),
                    ]),
                )
                .await
        }
        Some(_) => {
            reporter
                .report(
                    EventType::FocusReturn,
                    detail([("reason", "window_focus".into())]),
                )
                .await
        }
    }
}

/// The active tab within a window changed. The tab may already be gone by
/// the time we look it up; that occurrence simply produces no event.
pub async fn on_tab_activated(
    browser: &SharedBrowser,
    reporter: &EventReporter,
    exam: &ExamContext,
    tab: TabId,
) {
    let url = match browser.lock().await.tab_url(tab).await {
        Ok(url) => url,
        Err(e) => {
            debug!("tab lookup failed: {}", e);
            return;
        }
    };
    if url.is_empty() {
        return;
    }

    let exam_tab = exam.is_exam_url(&url);
    let severity = if exam_tab {
        Severity::Low
    } else {
        Severity::High
    };
    reporter
        .report(
            EventType::KeyShortcut,
            detail([
                ("activatedTab", url.into()),
                ("examTab", exam_tab.into()),
                ("reason", "tab_activated".into()),
                ("severity", severity.into()),
            ]),
        )
        .await;
}

/// A tab's URL changed. Navigating within the exam context is not notable;
/// leaving it is critical.
pub async fn on_tab_navigated(reporter: &EventReporter, exam: &ExamContext, url: &str) {
    if exam.is_exam_url(url) {
        return;
    }
    reporter
        .report(
            EventType::TabBlur,
            detail([
                ("url", url.into()),
                ("reason", "navigated_away".into()),
                ("severity", Severity::Critical.into()),
            ]),
        )
        .await;
}

/// Fullscreen state relayed by the page bridge. The bridge sends one
/// unconditional report at page-ready time and only transitions afterwards;
/// this end re-emits whatever arrives.
pub async fn on_fullscreen(reporter: &EventReporter, notice: &FullscreenNotice) {
    reporter
        .report(
            EventType::FullscreenChange,
            detail([
                ("fullscreen", notice.fullscreen.into()),
                ("initial", notice.initial.into()),
            ]),
        )
        .await;
}
