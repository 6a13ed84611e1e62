use tracing::debug;
use vigil_common::event::{detail, EventType};
use vigil_common::protocol::{CaptureReply, Reply};

use crate::browser::{SharedBrowser, WindowId};
use crate::reporter::EventReporter;

/// Run the capture chooser and reply once its outcome is known.
///
/// The user declining (or the chooser failing outright) is a structured
/// failure, not an error: it produces one `SCREEN_SHARE_ERROR` event and a
/// negative reply.
pub async fn start_capture(
    browser: &SharedBrowser,
    reporter: &EventReporter,
    window: Option<WindowId>,
) -> Reply {
    match browser.lock().await.choose_capture_source(window).await {
        Ok(Some(stream_id)) => {
            reporter
                .report(
                    EventType::ScreenShareStarted,
                    detail([("chooser", true.into())]),
                )
                .await;
            Reply::Capture(CaptureReply {
                ok: true,
                stream_id: Some(stream_id),
            })
        }
        Ok(None) => cancelled(reporter).await,
        Err(e) => {
            debug!("capture chooser failed: {}", e);
            cancelled(reporter).await
        }
    }
}

async fn cancelled(reporter: &EventReporter) -> Reply {
    reporter
        .report(
            EventType::ScreenShareError,
            detail([("reason", "user_cancelled".into())]),
        )
        .await;
    Reply::Capture(CaptureReply {
        ok: false,
        stream_id: None,
    })
}

/// Record the intent to stop sharing. A page-held capture stream cannot be
/// terminated from here; the advisory event is all this end can do.
pub async fn stop_capture(reporter: &EventReporter) -> Reply {
    reporter
        .report(
            EventType::ScreenShareStopped,
            detail([("via", "ext_request".into())]),
        )
        .await;
    Reply::ack()
}
