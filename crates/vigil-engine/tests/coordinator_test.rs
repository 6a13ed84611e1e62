use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use vigil_engine::browser::{self, Browser, BrowserError, TabId, WindowId};
use vigil_engine::config::ConfigStore;
use vigil_engine::coordinator::Coordinator;
use vigil_engine::event::{EventBody, EventType, EVENT_SOURCE};
use vigil_engine::exam::ExamContext;
use vigil_engine::protocol::{
    BrowserEvent, Command, ConfigUpdate, FocusChange, FullscreenNotice, Reply, StartCaptureRequest,
    TabActivation, TabNavigation,
};
use vigil_engine::reporter::EventSink;

const EXAM_URL: &str = "https://localhost:4200/exam/1";
const FOREIGN_URL: &str = "https://evil.example/answers";

#[derive(Default)]
struct BrowserState {
    captured: usize,
    focused: bool,
    active_url: String,
    tabs: HashMap<TabId, String>,
    chooser: Option<String>,
    chooser_fails: bool,
    fail_queries: bool,
}

struct MockBrowser {
    state: Arc<Mutex<BrowserState>>,
}

#[async_trait::async_trait]
impl Browser for MockBrowser {
    async fn captured_tab_count(&mut self) -> Result<usize, BrowserError> {
        let state = self.state.lock().unwrap();
        if state.fail_queries {
            return Err(BrowserError::Query("mock failure".into()));
        }
        Ok(state.captured)
    }

    async fn window_focused(&mut self) -> Result<bool, BrowserError> {
        let state = self.state.lock().unwrap();
        if state.fail_queries {
            return Err(BrowserError::Query("mock failure".into()));
        }
        Ok(state.focused)
    }

    async fn active_tab_url(&mut self) -> Result<String, BrowserError> {
        let state = self.state.lock().unwrap();
        if state.fail_queries {
            return Err(BrowserError::Query("mock failure".into()));
        }
        Ok(state.active_url.clone())
    }

    async fn tab_url(&mut self, tab: TabId) -> Result<String, BrowserError> {
        let state = self.state.lock().unwrap();
        state
            .tabs
            .get(&tab)
            .cloned()
            .ok_or(BrowserError::TabNotFound { id: tab })
    }

    async fn choose_capture_source(
        &mut self,
        _window: Option<WindowId>,
    ) -> Result<Option<String>, BrowserError> {
        let state = self.state.lock().unwrap();
        if state.chooser_fails {
            return Err(BrowserError::Chooser("mock chooser crashed".into()));
        }
        Ok(state.chooser.clone())
    }
}

#[derive(Default)]
struct RecordingSink {
    events: Mutex<Vec<(String, EventBody)>>,
}

impl RecordingSink {
    fn types(&self) -> Vec<EventType> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .map(|(_, body)| body.event_type)
            .collect()
    }

    fn of_type(&self, event_type: EventType) -> Vec<EventBody> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, body)| body.event_type == event_type)
            .map(|(_, body)| body.clone())
            .collect()
    }

    fn len(&self) -> usize {
        self.events.lock().unwrap().len()
    }
}

impl EventSink for RecordingSink {
    fn deliver(&self, base_url: &str, body: EventBody) {
        self.events
            .lock()
            .unwrap()
            .push((base_url.to_string(), body));
    }
}

fn fixture() -> (Coordinator, Arc<RecordingSink>, Arc<Mutex<BrowserState>>) {
    let state = Arc::new(Mutex::new(BrowserState::default()));
    let sink = Arc::new(RecordingSink::default());
    let coordinator = Coordinator::new(
        browser::shared(MockBrowser {
            state: state.clone(),
        }),
        ConfigStore::in_memory(),
        ExamContext::default(),
        sink.clone(),
    );
    (coordinator, sink, state)
}

fn activate() -> Command {
    Command::SetConfig(ConfigUpdate {
        base_url: Some("http://backend:3000".into()),
        assessment_id: Some("a1".into()),
        candidate_id: Some("c1".into()),
        submission_id: Some("s1".into()),
    })
}

fn deactivate() -> Command {
    Command::SetConfig(ConfigUpdate {
        assessment_id: Some("a1".into()),
        candidate_id: Some("c1".into()),
        ..ConfigUpdate::default()
    })
}

fn blur() -> BrowserEvent {
    BrowserEvent::FocusChanged(FocusChange { window_id: None })
}

fn focus(window: WindowId) -> BrowserEvent {
    BrowserEvent::FocusChanged(FocusChange {
        window_id: Some(window),
    })
}

#[tokio::test]
async fn inactive_config_suppresses_all_events() {
    let (mut coordinator, sink, _state) = fixture();

    coordinator.handle_event(blur()).await;
    coordinator
        .handle_event(BrowserEvent::TabNavigated(TabNavigation {
            tab_id: 1,
            url: FOREIGN_URL.into(),
        }))
        .await;
    coordinator
        .handle_command(Command::FullscreenChange(FullscreenNotice {
            fullscreen: false,
            initial: true,
        }))
        .await;
    coordinator.handle_command(Command::StopCapture).await;

    assert_eq!(sink.len(), 0);
}

#[tokio::test]
async fn ping_echoes_current_config() {
    let (mut coordinator, _sink, _state) = fixture();
    coordinator.handle_command(activate()).await;

    let Reply::Config(reply) = coordinator.handle_command(Command::Ping).await else {
        panic!("expected config reply");
    };
    assert!(reply.ok);
    assert!(reply.config.is_active);
    assert_eq!(reply.config.base_url, "http://backend:3000");
    assert_eq!(reply.config.candidate_id, "c1");
}

#[tokio::test]
async fn focus_cycle_end_to_end() {
    let (mut coordinator, sink, _state) = fixture();
    coordinator.handle_command(activate()).await;

    coordinator.handle_event(blur()).await;
    let hidden = sink.of_type(EventType::VisibilityHidden);
    assert_eq!(hidden.len(), 1);
    assert_eq!(hidden[0].detail["reason"], "window_blur");
    assert_eq!(hidden[0].detail["severity"], "high");
    assert_eq!(hidden[0].detail["_src"], "ext");
    assert_eq!(hidden[0].submission_id, "s1");
    assert_eq!(hidden[0].assessment_id, "a1");
    assert_eq!(hidden[0].candidate_id, "c1");
    assert_eq!(hidden[0].source, EVENT_SOURCE);
    assert!(hidden[0].timestamp > 0);

    coordinator.handle_event(focus(3)).await;
    let returned = sink.of_type(EventType::FocusReturn);
    assert_eq!(returned.len(), 1);
    assert_eq!(returned[0].detail["reason"], "window_focus");

    // Clearing one identifier deactivates and suppresses everything after.
    coordinator.handle_command(deactivate()).await;
    let count = sink.len();
    coordinator.handle_event(blur()).await;
    coordinator.handle_event(focus(3)).await;
    assert_eq!(sink.len(), count);
}

#[tokio::test]
async fn navigation_away_is_critical_once() {
    let (mut coordinator, sink, _state) = fixture();
    coordinator.handle_command(activate()).await;

    coordinator
        .handle_event(BrowserEvent::TabNavigated(TabNavigation {
            tab_id: 1,
            url: FOREIGN_URL.into(),
        }))
        .await;
    let blurs = sink.of_type(EventType::TabBlur);
    assert_eq!(blurs.len(), 1);
    assert_eq!(blurs[0].detail["url"], FOREIGN_URL);
    assert_eq!(blurs[0].detail["reason"], "navigated_away");
    assert_eq!(blurs[0].detail["severity"], "critical");

    // Navigation within the exam context is not notable.
    coordinator
        .handle_event(BrowserEvent::TabNavigated(TabNavigation {
            tab_id: 1,
            url: EXAM_URL.into(),
        }))
        .await;
    assert_eq!(sink.of_type(EventType::TabBlur).len(), 1);
}

#[tokio::test]
async fn tab_activation_classifies_exam_context() {
    let (mut coordinator, sink, state) = fixture();
    coordinator.handle_command(activate()).await;
    {
        let mut state = state.lock().unwrap();
        state.tabs.insert(7, EXAM_URL.into());
        state.tabs.insert(8, FOREIGN_URL.into());
    }

    coordinator
        .handle_event(BrowserEvent::TabActivated(TabActivation { tab_id: 7 }))
        .await;
    coordinator
        .handle_event(BrowserEvent::TabActivated(TabActivation { tab_id: 8 }))
        .await;

    let activations = sink.of_type(EventType::KeyShortcut);
    assert_eq!(activations.len(), 2);
    assert_eq!(activations[0].detail["activatedTab"], EXAM_URL);
    assert_eq!(activations[0].detail["examTab"], true);
    assert_eq!(activations[0].detail["severity"], "low");
    assert_eq!(activations[1].detail["examTab"], false);
    assert_eq!(activations[1].detail["severity"], "high");
}

#[tokio::test]
async fn tab_activation_swallows_lookup_races() {
    let (mut coordinator, sink, _state) = fixture();
    coordinator.handle_command(activate()).await;

    // Tab 99 closed before the lookup: no event, no error.
    coordinator
        .handle_event(BrowserEvent::TabActivated(TabActivation { tab_id: 99 }))
        .await;
    assert_eq!(sink.of_type(EventType::KeyShortcut).len(), 0);
}

#[tokio::test]
async fn fullscreen_notice_is_reemitted() {
    let (mut coordinator, sink, _state) = fixture();
    coordinator.handle_command(activate()).await;

    let reply = coordinator
        .handle_command(Command::FullscreenChange(FullscreenNotice {
            fullscreen: false,
            initial: true,
        }))
        .await;
    assert!(matches!(reply, Reply::Ack(ack) if ack.ok));

    let changes = sink.of_type(EventType::FullscreenChange);
    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0].detail["fullscreen"], false);
    assert_eq!(changes[0].detail["initial"], true);
}

#[tokio::test]
async fn capture_selection_and_cancellation() {
    let (mut coordinator, sink, state) = fixture();
    coordinator.handle_command(activate()).await;

    state.lock().unwrap().chooser = Some("stream-42".into());
    let Reply::Capture(reply) = coordinator
        .handle_command(Command::StartCapture(StartCaptureRequest {
            window_id: Some(1),
        }))
        .await
    else {
        panic!("expected capture reply");
    };
    assert!(reply.ok);
    assert_eq!(reply.stream_id.as_deref(), Some("stream-42"));
    let started = sink.of_type(EventType::ScreenShareStarted);
    assert_eq!(started.len(), 1);
    assert_eq!(started[0].detail["chooser"], true);

    // User cancelled: negative reply plus exactly one error event.
    state.lock().unwrap().chooser = None;
    let Reply::Capture(reply) = coordinator
        .handle_command(Command::StartCapture(StartCaptureRequest::default()))
        .await
    else {
        panic!("expected capture reply");
    };
    assert!(!reply.ok);
    assert!(reply.stream_id.is_none());
    let errors = sink.of_type(EventType::ScreenShareError);
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].detail["reason"], "user_cancelled");

    // A chooser failure takes the same path as cancellation.
    state.lock().unwrap().chooser_fails = true;
    let Reply::Capture(reply) = coordinator
        .handle_command(Command::StartCapture(StartCaptureRequest::default()))
        .await
    else {
        panic!("expected capture reply");
    };
    assert!(!reply.ok);
    assert_eq!(sink.of_type(EventType::ScreenShareError).len(), 2);
}

#[tokio::test]
async fn stop_capture_is_advisory() {
    let (mut coordinator, sink, _state) = fixture();
    coordinator.handle_command(activate()).await;

    let reply = coordinator.handle_command(Command::StopCapture).await;
    assert!(matches!(reply, Reply::Ack(ack) if ack.ok));
    let stopped = sink.of_type(EventType::ScreenShareStopped);
    assert_eq!(stopped.len(), 1);
    assert_eq!(stopped[0].detail["via"], "ext_request");
}

#[tokio::test]
async fn status_gathers_browser_snapshot() {
    let (mut coordinator, _sink, state) = fixture();
    coordinator.handle_command(activate()).await;
    {
        let mut state = state.lock().unwrap();
        state.captured = 1;
        state.active_url = EXAM_URL.into();
        state.focused = true;
    }

    let Reply::Status(status) = coordinator.handle_command(Command::GetStatus).await else {
        panic!("expected status reply");
    };
    assert!(status.ok);
    assert_eq!(status.captured_count, 1);
    assert_eq!(status.active_url, EXAM_URL);
    assert!(status.window_focused);
    assert!(status.active);
    assert!(status.monitoring);
}

#[tokio::test]
async fn status_degrades_per_query() {
    let (mut coordinator, _sink, state) = fixture();
    state.lock().unwrap().fail_queries = true;

    let Reply::Status(status) = coordinator.handle_command(Command::GetStatus).await else {
        panic!("expected status reply");
    };
    assert!(status.ok);
    assert_eq!(status.captured_count, 0);
    assert_eq!(status.active_url, "");
    assert!(!status.window_focused);
    assert!(!status.active);
    assert!(!status.monitoring);
}

#[tokio::test(start_paused = true)]
async fn arming_is_idempotent_and_chained() {
    let (coordinator, sink, state) = fixture();
    let mut coordinator = coordinator.with_probe_interval(Duration::from_secs(10));
    state.lock().unwrap().focused = true;

    coordinator.handle_command(activate()).await;
    tokio::time::sleep(Duration::from_millis(10)).await;
    // The first probe runs immediately on arm.
    assert_eq!(sink.of_type(EventType::Heartbeat).len(), 1);
    assert!(coordinator.monitoring());

    // Re-activating while armed must not start a second chain.
    coordinator.handle_command(activate()).await;
    tokio::time::sleep(Duration::from_secs(25)).await;
    assert_eq!(sink.of_type(EventType::Heartbeat).len(), 3);
}

#[tokio::test(start_paused = true)]
async fn deactivation_disarms_within_one_dispatch() {
    let (coordinator, sink, state) = fixture();
    let mut coordinator = coordinator.with_probe_interval(Duration::from_secs(10));
    state.lock().unwrap().focused = true;

    coordinator.handle_command(activate()).await;
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(coordinator.monitoring());

    coordinator.handle_command(deactivate()).await;
    assert!(!coordinator.monitoring());

    let count = sink.len();
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(sink.len(), count);
}

#[tokio::test(start_paused = true)]
async fn probe_reports_suspected_second_display() {
    let (coordinator, sink, state) = fixture();
    let mut coordinator = coordinator.with_probe_interval(Duration::from_secs(10));
    state.lock().unwrap().captured = 2;

    coordinator.handle_command(activate()).await;
    tokio::time::sleep(Duration::from_millis(10)).await;

    let suspected = sink.of_type(EventType::SecondDisplaySuspected);
    assert_eq!(suspected.len(), 1);
    assert_eq!(suspected[0].detail["reason"], "multiple_tab_captures");
    assert_eq!(suspected[0].detail["count"], 2);
    let started = sink.of_type(EventType::ScreenShareStarted);
    assert_eq!(started.len(), 1);
    assert_eq!(started[0].detail["otherCaptures"], 2);

    // Unfocused, so no heartbeat alongside the capture heuristic.
    assert_eq!(sink.of_type(EventType::Heartbeat).len(), 0);
}

#[tokio::test(start_paused = true)]
async fn probe_failures_do_not_stop_the_chain() {
    let (coordinator, sink, state) = fixture();
    let mut coordinator = coordinator.with_probe_interval(Duration::from_secs(10));
    state.lock().unwrap().fail_queries = true;

    coordinator.handle_command(activate()).await;
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(sink.len(), 0);

    // Queries recover; the chain is still alive and probing.
    {
        let mut state = state.lock().unwrap();
        state.fail_queries = false;
        state.focused = true;
    }
    tokio::time::sleep(Duration::from_secs(15)).await;
    assert!(sink.of_type(EventType::Heartbeat).len() >= 1);
}

#[tokio::test(start_paused = true)]
async fn loop_self_disarms_when_config_goes_inactive() {
    use vigil_engine::monitor::MonitorLoop;
    use vigil_engine::reporter::EventReporter;

    let state = Arc::new(Mutex::new(BrowserState {
        focused: true,
        ..BrowserState::default()
    }));
    let sink = Arc::new(RecordingSink::default());
    let store = ConfigStore::in_memory();
    store
        .update(ConfigUpdate {
            base_url: Some("http://backend:3000".into()),
            assessment_id: Some("a1".into()),
            candidate_id: Some("c1".into()),
            submission_id: Some("s1".into()),
        })
        .await;

    let mut monitor = MonitorLoop::new(Duration::from_secs(10));
    monitor.arm(
        browser::shared(MockBrowser {
            state: state.clone(),
        }),
        store.clone(),
        EventReporter::new(store.clone(), sink.clone()),
    );
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(monitor.is_armed());
    assert_eq!(sink.of_type(EventType::Heartbeat).len(), 1);

    // The dispatcher normally disarms; if it does not, the next iteration
    // observes the inactive config and exits on its own.
    store.update(ConfigUpdate::default()).await;
    tokio::time::sleep(Duration::from_secs(15)).await;
    assert!(!monitor.is_armed());
    assert_eq!(sink.of_type(EventType::Heartbeat).len(), 1);
}
