use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, Mutex};
use tracing::debug;
use vigil_common::protocol::{
    BrowserQuery, ChooseCaptureRequest, Frame, QueryFrame, QueryOutcome, QueryResultFrame,
    TabUrlRequest,
};
use vigil_engine::browser::{Browser, BrowserError, TabId, WindowId};

const QUERY_TIMEOUT: Duration = Duration::from_secs(5);
/// The chooser waits on a human; give them time.
const CHOOSER_TIMEOUT: Duration = Duration::from_secs(120);

/// `Browser` implementation that proxies every call to the connected page
/// bridge as a query frame and awaits the matching result.
///
/// One query is in flight at a time; stale answers (from a timed-out
/// predecessor) are recognized by sequence number and discarded.
pub struct RemoteBrowser {
    outbound_tx: broadcast::Sender<Frame>,
    query_rx: Arc<Mutex<mpsc::Receiver<QueryResultFrame>>>,
    next_seq: u64,
}

impl RemoteBrowser {
    pub fn new(
        outbound_tx: broadcast::Sender<Frame>,
        query_rx: Arc<Mutex<mpsc::Receiver<QueryResultFrame>>>,
    ) -> Self {
        Self {
            outbound_tx,
            query_rx,
            next_seq: 0,
        }
    }

    async fn send_query(
        &mut self,
        query: BrowserQuery,
        timeout: Duration,
    ) -> Result<QueryOutcome, BrowserError> {
        // Probes and listeners swallow this; no point queueing work for a
        // bridge that is not there.
        if self.outbound_tx.receiver_count() == 0 {
            return Err(BrowserError::NotConnected);
        }

        self.next_seq += 1;
        let seq = self.next_seq;
        self.outbound_tx
            .send(Frame::Query(QueryFrame { seq, query }))
            .map_err(|_| BrowserError::NotConnected)?;

        let mut rx = self.query_rx.lock().await;
        loop {
            match tokio::time::timeout(timeout, rx.recv()).await {
                Ok(Some(frame)) if frame.seq == seq => return Ok(frame.outcome),
                Ok(Some(frame)) => {
                    debug!("discarding stale query result (seq {})", frame.seq);
                }
                Ok(None) => return Err(BrowserError::ConnectionLost),
                Err(_) => {
                    return Err(BrowserError::Query(format!(
                        "no answer within {}s",
                        timeout.as_secs()
                    )))
                }
            }
        }
    }
}

#[async_trait]
impl Browser for RemoteBrowser {
    async fn captured_tab_count(&mut self) -> Result<usize, BrowserError> {
        match self
            .send_query(BrowserQuery::CapturedTabCount, QUERY_TIMEOUT)
            .await?
        {
            QueryOutcome::Count { count } => Ok(count),
            QueryOutcome::Failed { message } => Err(BrowserError::Query(message)),
            other => Err(unexpected(other)),
        }
    }

    async fn window_focused(&mut self) -> Result<bool, BrowserError> {
        match self
            .send_query(BrowserQuery::WindowFocused, QUERY_TIMEOUT)
            .await?
        {
            QueryOutcome::Flag { value } => Ok(value),
            QueryOutcome::Failed { message } => Err(BrowserError::Query(message)),
            other => Err(unexpected(other)),
        }
    }

    async fn active_tab_url(&mut self) -> Result<String, BrowserError> {
        match self
            .send_query(BrowserQuery::ActiveTabUrl, QUERY_TIMEOUT)
            .await?
        {
            QueryOutcome::Url { url } => Ok(url),
            QueryOutcome::Failed { message } => Err(BrowserError::Query(message)),
            other => Err(unexpected(other)),
        }
    }

    async fn tab_url(&mut self, tab: TabId) -> Result<String, BrowserError> {
        let query = BrowserQuery::TabUrl(TabUrlRequest { tab_id: tab });
        match self.send_query(query, QUERY_TIMEOUT).await? {
            QueryOutcome::Url { url } => Ok(url),
            QueryOutcome::Failed { .. } => Err(BrowserError::TabNotFound { id: tab }),
            other => Err(unexpected(other)),
        }
    }

    async fn choose_capture_source(
        &mut self,
        window: Option<WindowId>,
    ) -> Result<Option<String>, BrowserError> {
        let query = BrowserQuery::ChooseCaptureSource(ChooseCaptureRequest { window_id: window });
        match self.send_query(query, CHOOSER_TIMEOUT).await? {
            QueryOutcome::Stream { stream_id } => Ok(stream_id),
            QueryOutcome::Failed { message } => Err(BrowserError::Chooser(message)),
            other => Err(unexpected(other)),
        }
    }
}

fn unexpected(outcome: QueryOutcome) -> BrowserError {
    BrowserError::Query(format!("unexpected query outcome: {:?}", outcome))
}
