//! Command dispatch and monitoring-state coordination.
//!
//! The coordinator is the sole owner of the config store's mutation surface
//! and the monitor loop's arm/disarm transitions, keeping "an assessment is
//! active" and "the loop is running" in step. It is driven from a single
//! dispatch task, so command handling is serialized.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};
use vigil_common::protocol::{BrowserEvent, Command, ConfigReply, Reply, StatusReply};

use crate::browser::SharedBrowser;
use crate::capture;
use crate::config::ConfigStore;
use crate::exam::ExamContext;
use crate::listener;
use crate::monitor::{MonitorLoop, DEFAULT_PROBE_INTERVAL};
use crate::reporter::{EventReporter, EventSink};

pub struct Coordinator {
    browser: SharedBrowser,
    config: ConfigStore,
    reporter: EventReporter,
    exam: ExamContext,
    monitor: MonitorLoop,
}

impl Coordinator {
    pub fn new(
        browser: SharedBrowser,
        config: ConfigStore,
        exam: ExamContext,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        let reporter = EventReporter::new(config.clone(), sink);
        Self {
            browser,
            config,
            reporter,
            exam,
            monitor: MonitorLoop::new(DEFAULT_PROBE_INTERVAL),
        }
    }

    /// Override the probe interval (tests, ad-hoc runs). Must be called
    /// before the loop first arms.
    pub fn with_probe_interval(mut self, interval: Duration) -> Self {
        self.monitor = MonitorLoop::new(interval);
        self
    }

    pub fn monitoring(&self) -> bool {
        self.monitor.is_armed()
    }

    /// Route one inbound command to its component and produce its reply.
    pub async fn handle_command(&mut self, command: Command) -> Reply {
        match command {
            Command::Ping => Reply::Config(ConfigReply {
                ok: true,
                config: self.config.get().await,
            }),
            Command::SetConfig(update) => {
                let config = self.config.update(update).await;
                if config.is_active {
                    info!("monitoring activated for submission {}", config.submission_id);
                    self.monitor.arm(
                        self.browser.clone(),
                        self.config.clone(),
                        self.reporter.clone(),
                    );
                } else {
                    self.monitor.disarm();
                }
                Reply::ack()
            }
            Command::StartCapture(request) => {
                capture::start_capture(&self.browser, &self.reporter, request.window_id).await
            }
            Command::StopCapture => capture::stop_capture(&self.reporter).await,
            Command::GetStatus => self.status().await,
            Command::FullscreenChange(notice) => {
                listener::on_fullscreen(&self.reporter, &notice).await;
                Reply::ack()
            }
        }
    }

    /// Route one browser-event notification to its listener.
    pub async fn handle_event(&self, event: BrowserEvent) {
        match event {
            BrowserEvent::FocusChanged(change) => {
                listener::on_focus_changed(&self.reporter, change.window_id).await
            }
            BrowserEvent::TabActivated(activation) => {
                listener::on_tab_activated(
                    &self.browser,
                    &self.reporter,
                    &self.exam,
                    activation.tab_id,
                )
                .await
            }
            BrowserEvent::TabNavigated(navigation) => {
                listener::on_tab_navigated(&self.reporter, &self.exam, &navigation.url).await
            }
        }
    }

    /// Gather the status snapshot. Each browser sub-query degrades
    /// independently so the reply always arrives, even mid tab-close or
    /// with no bridge connected.
    async fn status(&mut self) -> Reply {
        let mut browser = self.browser.lock().await;
        let captured_count = browser.captured_tab_count().await.unwrap_or_else(|e| {
            debug!("status capture query failed: {}", e);
            0
        });
        let active_url = browser.active_tab_url().await.unwrap_or_else(|e| {
            debug!("status tab query failed: {}", e);
            String::new()
        });
        let window_focused = browser.window_focused().await.unwrap_or_else(|e| {
            debug!("status focus query failed: {}", e);
            false
        });
        drop(browser);

        let config = self.config.get().await;
        Reply::Status(StatusReply {
            ok: true,
            captured_count,
            active_url,
            window_focused,
            active: config.is_active,
            monitoring: self.monitor.is_armed(),
        })
    }
}
