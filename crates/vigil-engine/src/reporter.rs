use std::sync::Arc;
use tracing::debug;
use vigil_common::event::{
    Detail, EventBody, EventType, DETAIL_SRC_KEY, DETAIL_SRC_VALUE, EVENT_SOURCE,
};

use crate::config::ConfigStore;

/// Delivery half of the reporter. The production sink posts to the backend;
/// tests substitute a recording sink.
pub trait EventSink: Send + Sync {
    fn deliver(&self, base_url: &str, body: EventBody);
}

/// Fire-and-forget HTTP delivery to `{base_url}/api/proctor/event`.
///
/// Delivery runs on a spawned task: callers never wait on the backend, there
/// is no retry, and the response body is ignored. Proctoring events are
/// advisory, so a dead backend must never surface as an error here.
pub struct HttpSink {
    client: reqwest::Client,
}

impl HttpSink {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for HttpSink {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSink for HttpSink {
    fn deliver(&self, base_url: &str, body: EventBody) {
        let client = self.client.clone();
        let endpoint = format!("{}/api/proctor/event", base_url.trim_end_matches('/'));
        tokio::spawn(async move {
            if let Err(e) = client.post(&endpoint).json(&body).send().await {
                debug!("event delivery failed: {}", e);
            }
        });
    }
}

/// Gates, stamps and forwards proctor events.
///
/// `report` is a no-op while the monitoring config is inactive; when active
/// it copies the correlation identifiers from the config at send time, tags
/// the detail map, and hands the body to the sink.
#[derive(Clone)]
pub struct EventReporter {
    config: ConfigStore,
    sink: Arc<dyn EventSink>,
}

impl EventReporter {
    pub fn new(config: ConfigStore, sink: Arc<dyn EventSink>) -> Self {
        Self { config, sink }
    }

    pub async fn report(&self, event_type: EventType, mut detail: Detail) {
        let config = self.config.get().await;
        if !config.is_active {
            return;
        }

        detail.insert(DETAIL_SRC_KEY.to_string(), DETAIL_SRC_VALUE.into());
        let body = EventBody {
            submission_id: config.submission_id,
            assessment_id: config.assessment_id,
            candidate_id: config.candidate_id,
            event_type,
            detail,
            source: EVENT_SOURCE.to_string(),
            timestamp: chrono::Utc::now().timestamp_millis(),
        };
        self.sink.deliver(&config.base_url, body);
    }
}
