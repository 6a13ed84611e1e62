//! The periodic probe loop.
//!
//! Armed means exactly one chained probe task is live; the `Option` handle
//! is the whole state, so the at-most-one invariant is structural. The
//! chain schedules each iteration only after the previous probes finish,
//! which rules out overlap no matter how slow a probe is.

use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info};
use vigil_common::event::{detail, EventType};

use crate::browser::SharedBrowser;
use crate::config::ConfigStore;
use crate::reporter::EventReporter;

pub const DEFAULT_PROBE_INTERVAL: Duration = Duration::from_secs(10);

pub struct MonitorLoop {
    interval: Duration,
    handle: Option<JoinHandle<()>>,
}

impl MonitorLoop {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            handle: None,
        }
    }

    pub fn is_armed(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Start the probe chain. No-op while a live chain exists. The first
    /// probe runs immediately, not after the first interval.
    pub fn arm(&mut self, browser: SharedBrowser, config: ConfigStore, reporter: EventReporter) {
        if self.is_armed() {
            return;
        }
        info!("monitor loop armed ({}s interval)", self.interval.as_secs());
        let interval = self.interval;
        self.handle = Some(tokio::spawn(async move {
            loop {
                if !config.get().await.is_active {
                    debug!("monitor loop self-disarmed");
                    break;
                }
                probe_cycle(&browser, &reporter).await;
                tokio::time::sleep(interval).await;
            }
        }));
    }

    /// Cancel the pending chain, if any.
    pub fn disarm(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
            info!("monitor loop disarmed");
        }
    }
}

impl Drop for MonitorLoop {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

/// One probe invocation: the multi-capture heuristic, then the focus
/// heartbeat. Each sub-probe swallows its own failure so the other still
/// runs and the chain still reschedules.
async fn probe_cycle(browser: &SharedBrowser, reporter: &EventReporter) {
    match browser.lock().await.captured_tab_count().await {
        Ok(count) if count > 1 => {
            // Heuristic signal for multi-monitor or multi-tab capture, not
            // a hard detector.
            reporter
                .report(
                    EventType::SecondDisplaySuspected,
                    detail([
                        ("reason", "multiple_tab_captures".into()),
                        ("count", count.into()),
                    ]),
                )
                .await;
            reporter
                .report(
                    EventType::ScreenShareStarted,
                    detail([("otherCaptures", count.into())]),
                )
                .await;
        }
        Ok(_) => {}
        Err(e) => debug!("capture probe failed: {}", e),
    }

    // OS-level shares are invisible from here; the heartbeat at least
    // proves the monitor is alive while the window has focus.
    match browser.lock().await.window_focused().await {
        Ok(true) => {
            reporter
                .report(
                    EventType::Heartbeat,
                    detail([("at", chrono::Utc::now().timestamp_millis().into())]),
                )
                .await;
        }
        Ok(false) => {}
        Err(e) => debug!("focus probe failed: {}", e),
    }
}
