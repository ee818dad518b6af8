use super::*;
use crate::{gateway::GatewayError, state::SessionEvent};
use async_trait::async_trait;
use shared::protocol::{HealthStatus, InventoryEntry, Product};
use std::{collections::VecDeque, sync::Mutex as StdMutex};
use tokio::sync::broadcast::error::TryRecvError;

const EAN: &str = "4006381333931";

enum Reply {
    Entry(InventoryEntry),
    Deleted,
    Fail(GatewayError),
}

struct ScriptedGateway {
    replies: StdMutex<VecDeque<(Duration, Reply)>>,
    calls: StdMutex<Vec<(&'static str, String)>>,
}

impl ScriptedGateway {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            replies: StdMutex::new(VecDeque::new()),
            calls: StdMutex::new(Vec::new()),
        })
    }

    fn reply(self: &Arc<Self>, reply: Reply) -> Arc<Self> {
        self.reply_after(Duration::ZERO, reply)
    }

    fn reply_after(self: &Arc<Self>, delay: Duration, reply: Reply) -> Arc<Self> {
        self.replies
            .lock()
            .expect("replies")
            .push_back((delay, reply));
        Arc::clone(self)
    }

    fn calls(&self) -> Vec<(&'static str, String)> {
        self.calls.lock().expect("calls").clone()
    }

    async fn next(&self, op: &'static str, ean: &Ean) -> Reply {
        self.calls
            .lock()
            .expect("calls")
            .push((op, ean.to_string()));
        let (delay, reply) = self
            .replies
            .lock()
            .expect("replies")
            .pop_front()
            .expect("unscripted gateway call");
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        reply
    }
}

#[async_trait]
impl InventoryGateway for ScriptedGateway {
    async fn add_unit(&self, ean: &Ean) -> std::result::Result<InventoryEntry, GatewayError> {
        match self.next("add", ean).await {
            Reply::Entry(entry) => Ok(entry),
            Reply::Deleted => Err(GatewayError::MalformedBody {
                status: 200,
                detail: "empty response body".to_string(),
            }),
            Reply::Fail(err) => Err(err),
        }
    }

    async fn remove_unit(
        &self,
        ean: &Ean,
    ) -> std::result::Result<Option<InventoryEntry>, GatewayError> {
        match self.next("remove", ean).await {
            Reply::Entry(entry) => Ok(Some(entry)),
            Reply::Deleted => Ok(None),
            Reply::Fail(err) => Err(err),
        }
    }

    async fn list_inventory(&self) -> std::result::Result<Vec<InventoryEntry>, GatewayError> {
        Ok(Vec::new())
    }

    async fn check_health(&self) -> std::result::Result<HealthStatus, GatewayError> {
        Ok(HealthStatus {
            status: "ok".to_string(),
        })
    }
}

fn entry(quantity: i64) -> InventoryEntry {
    InventoryEntry {
        id: 11,
        product: Some(Product {
            ean: EAN.to_string(),
            name: "Pencil".to_string(),
            category: Some("en:office".to_string()),
            image_url: None,
            resolved: true,
        }),
        quantity,
        expiry_date: None,
        low_stock_threshold: 1,
    }
}

fn session_with(gateway: &Arc<ScriptedGateway>) -> Arc<ScanSession> {
    let gateway: Arc<dyn InventoryGateway> = gateway.clone();
    ScanSession::new_with_gateway(SessionConfig::default(), Some(gateway))
}

fn rejected(status: u16, body: &str) -> Reply {
    Reply::Fail(GatewayError::Rejected {
        status,
        body: body.to_string(),
    })
}

#[tokio::test]
async fn starts_in_remove_mode_without_countdown() {
    let session = ScanSession::new(SessionConfig::default());
    assert_eq!(session.mode().await, Mode::Remove);
    assert_eq!(session.state().mode(), Mode::Remove);
    assert!(session.state().countdown().is_none());
    assert!(!session.state().is_loading());
    assert!(!session.is_configured().await);
}

#[tokio::test]
async fn blank_scans_are_ignored_without_emissions() {
    let gateway = ScriptedGateway::new();
    let session = session_with(&gateway);
    let mut entry_rx = session.state().subscribe_current_entry();
    let mut loading_rx = session.state().subscribe_loading();
    let mut errors = session.state().subscribe_errors();
    let mut events = session.state().subscribe_events();
    entry_rx.mark_unchanged();
    loading_rx.mark_unchanged();

    for raw in ["", "   ", "\t\r\n"] {
        assert!(matches!(
            session.handle_scan(raw).await,
            ScanDispatch::Ignored
        ));
    }

    assert!(gateway.calls().is_empty());
    assert!(!entry_rx.has_changed().expect("entry channel"));
    assert!(!loading_rx.has_changed().expect("loading channel"));
    assert!(matches!(errors.try_recv(), Err(TryRecvError::Empty)));
    assert!(matches!(events.try_recv(), Err(TryRecvError::Empty)));
}

#[tokio::test]
async fn scan_without_backend_reports_configuration_error() {
    let session = ScanSession::new(SessionConfig::default());
    let mut errors = session.state().subscribe_errors();
    let mut loading_rx = session.state().subscribe_loading();
    loading_rx.mark_unchanged();

    let dispatch = session.handle_scan(EAN).await;
    let outcome = dispatch.outcome().await.expect("outcome");

    assert_eq!(
        outcome,
        OperationOutcome::Failed(CONFIGURATION_REQUIRED_MESSAGE.to_string())
    );
    assert_eq!(
        errors.try_recv().expect("error published"),
        CONFIGURATION_REQUIRED_MESSAGE
    );
    assert!(!loading_rx.has_changed().expect("loading channel"));
}

#[tokio::test]
async fn add_scan_publishes_updated_entry() {
    let gateway = ScriptedGateway::new().reply(Reply::Entry(entry(3)));
    let session = session_with(&gateway);
    session.select_mode(Mode::Add).await;

    let outcome = session
        .handle_scan(&format!("  {EAN}\n"))
        .await
        .outcome()
        .await
        .expect("outcome");

    assert_eq!(outcome, OperationOutcome::EntryUpdated(entry(3)));
    assert_eq!(session.state().current_entry().map(|e| e.quantity), Some(3));
    assert!(!session.state().is_loading());
    assert_eq!(gateway.calls(), vec![("add", EAN.to_string())]);
    session.shutdown().await;
}

#[tokio::test]
async fn remove_scan_with_body_updates_entry() {
    let gateway = ScriptedGateway::new().reply(Reply::Entry(entry(1)));
    let session = session_with(&gateway);
    let mut deleted = session.state().subscribe_entry_deleted();

    let outcome = session.handle_scan(EAN).await.outcome().await;

    assert_eq!(outcome, Some(OperationOutcome::EntryUpdated(entry(1))));
    assert_eq!(session.state().current_entry(), Some(entry(1)));
    assert!(matches!(deleted.try_recv(), Err(TryRecvError::Empty)));
    assert_eq!(gateway.calls(), vec![("remove", EAN.to_string())]);
}

#[tokio::test]
async fn remove_scan_without_body_signals_deletion() {
    let gateway = ScriptedGateway::new()
        .reply(Reply::Entry(entry(1)))
        .reply(Reply::Deleted);
    let session = session_with(&gateway);
    let mut deleted = session.state().subscribe_entry_deleted();

    session.handle_scan(EAN).await.outcome().await;
    assert!(session.state().current_entry().is_some());

    let outcome = session.handle_scan(EAN).await.outcome().await;

    assert_eq!(outcome, Some(OperationOutcome::EntryDeleted(EAN.to_string())));
    assert_eq!(deleted.try_recv().expect("deleted"), EAN);
    assert!(session.state().current_entry().is_none());
    assert!(!session.state().is_loading());
}

#[tokio::test]
async fn failures_publish_classified_messages_and_return_to_idle() {
    let gateway = ScriptedGateway::new()
        .reply(rejected(422, r#"{"code":"INVALID_EAN","message":"EAN must be 8 or 13 digits"}"#))
        .reply(rejected(404, "{}"))
        .reply(rejected(502, "<html>upstream down</html>"))
        .reply(Reply::Fail(GatewayError::Transport(
            "connection refused".to_string(),
        )));
    let session = session_with(&gateway);
    let mut errors = session.state().subscribe_errors();

    let mut messages = Vec::new();
    for _ in 0..4 {
        let outcome = session.handle_scan(EAN).await.outcome().await;
        assert!(outcome.as_ref().is_some_and(OperationOutcome::is_failure));
        assert!(!session.state().is_loading());
        assert_eq!(session.mode().await, Mode::Remove);
        messages.push(errors.try_recv().expect("error message"));
    }

    assert_eq!(messages[0], "EAN must be 8 or 13 digits");
    assert!(messages[1].contains("404"), "{}", messages[1]);
    assert_eq!(messages[2], "Server error 502");
    assert_eq!(messages[3], "Network error: connection refused");
}

#[tokio::test(start_paused = true)]
async fn loading_spans_the_dispatch() {
    let gateway =
        ScriptedGateway::new().reply_after(Duration::from_secs(2), rejected(500, "{}"));
    let session = session_with(&gateway);
    let mut events = session.state().subscribe_events();

    let dispatch = session.handle_scan(EAN).await;
    assert!(session.state().is_loading());

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert!(session.state().is_loading());

    dispatch.outcome().await.expect("outcome");
    assert!(!session.state().is_loading());

    let mut seen = Vec::new();
    while let Ok(event) = events.try_recv() {
        seen.push(event);
    }
    assert_eq!(
        seen,
        vec![
            SessionEvent::LoadingChanged(true),
            SessionEvent::Error("Server error 500".to_string()),
            SessionEvent::LoadingChanged(false),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn add_mode_reverts_to_remove_after_timeout() {
    let gateway = ScriptedGateway::new().reply(Reply::Entry(entry(2)));
    let session = session_with(&gateway);
    session.select_mode(Mode::Add).await;
    assert_eq!(
        session.state().countdown().map(|c| c.remaining_secs),
        Some(300)
    );

    session.handle_scan(EAN).await.outcome().await;
    assert!(session.state().current_entry().is_some());

    tokio::time::sleep(Duration::from_millis(299_500)).await;
    assert_eq!(session.mode().await, Mode::Add);
    assert_eq!(
        session.state().countdown().map(|c| c.remaining_secs),
        Some(1)
    );

    let mut mode_rx = session.state().subscribe_mode();
    mode_rx.mark_unchanged();
    tokio::time::sleep(Duration::from_secs(1)).await;

    assert_eq!(session.mode().await, Mode::Remove);
    assert_eq!(*mode_rx.borrow_and_update(), Mode::Remove);
    assert!(session.state().countdown().is_none());
    assert!(session.state().current_entry().is_none());

    tokio::time::sleep(Duration::from_secs(600)).await;
    assert!(!mode_rx.has_changed().expect("mode channel"));
    assert_eq!(session.mode().await, Mode::Remove);
}

#[tokio::test(start_paused = true)]
async fn timeout_announces_countdown_end_on_event_stream() {
    let session = ScanSession::new(SessionConfig::default());
    session.select_mode(Mode::Add).await;

    tokio::time::sleep(Duration::from_millis(299_500)).await;
    let mut events = session.state().subscribe_events();
    tokio::time::sleep(Duration::from_secs(1)).await;

    let mut seen = Vec::new();
    while let Ok(event) = events.try_recv() {
        seen.push(event);
    }
    assert_eq!(
        seen,
        vec![
            SessionEvent::CountdownCleared,
            SessionEvent::ModeChanged(Mode::Remove),
            SessionEvent::EntryCleared,
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn reselecting_add_restarts_the_single_countdown() {
    let session = ScanSession::new(SessionConfig::default());
    session.select_mode(Mode::Add).await;
    let first = session.state().countdown().expect("countdown").timer_id;

    tokio::time::sleep(Duration::from_secs(200)).await;
    session.select_mode(Mode::Add).await;
    let second = session.state().countdown().expect("countdown");
    assert_ne!(second.timer_id, first);
    assert_eq!(second.remaining_secs, 300);

    // The first countdown would have expired here.
    tokio::time::sleep(Duration::from_millis(200_500)).await;
    assert_eq!(session.mode().await, Mode::Add);
    assert_eq!(
        session.state().countdown().map(|c| (c.timer_id, c.remaining_secs)),
        Some((second.timer_id, 100))
    );

    tokio::time::sleep(Duration::from_secs(100)).await;
    assert_eq!(session.mode().await, Mode::Remove);
}

#[tokio::test(start_paused = true)]
async fn selecting_remove_cancels_the_countdown() {
    let session = ScanSession::new(SessionConfig::default());
    session.select_mode(Mode::Add).await;
    tokio::time::sleep(Duration::from_millis(10_500)).await;
    assert_eq!(
        session.state().countdown().map(|c| c.remaining_secs),
        Some(290)
    );

    session.select_mode(Mode::Remove).await;
    let mut countdown_rx = session.state().subscribe_countdown();
    let mut mode_rx = session.state().subscribe_mode();
    countdown_rx.mark_unchanged();
    mode_rx.mark_unchanged();

    tokio::time::sleep(Duration::from_secs(400)).await;
    assert!(session.state().countdown().is_none());
    assert!(!countdown_rx.has_changed().expect("countdown channel"));
    assert!(!mode_rx.has_changed().expect("mode channel"));
    assert_eq!(session.mode().await, Mode::Remove);
}

#[tokio::test(start_paused = true)]
async fn custom_timeout_is_honoured() {
    let session = ScanSession::new(SessionConfig {
        add_mode_timeout: Duration::from_secs(3),
        ..SessionConfig::default()
    });
    session.select_mode(Mode::Add).await;
    tokio::time::sleep(Duration::from_millis(2_500)).await;
    assert_eq!(session.mode().await, Mode::Add);
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(session.mode().await, Mode::Remove);
}

#[tokio::test(start_paused = true)]
async fn mode_switch_does_not_cancel_inflight_dispatch() {
    let gateway =
        ScriptedGateway::new().reply_after(Duration::from_secs(3), Reply::Entry(entry(4)));
    let session = session_with(&gateway);
    session.select_mode(Mode::Add).await;

    let dispatch = session.handle_scan(EAN).await;
    session.select_mode(Mode::Remove).await;
    assert!(session.state().current_entry().is_none());

    let outcome = dispatch.outcome().await;
    assert_eq!(outcome, Some(OperationOutcome::EntryUpdated(entry(4))));
    assert_eq!(session.state().current_entry(), Some(entry(4)));
    assert_eq!(session.mode().await, Mode::Remove);
    assert_eq!(gateway.calls(), vec![("add", EAN.to_string())]);
}

#[tokio::test(start_paused = true)]
async fn overlapping_dispatches_publish_in_response_order() {
    let gateway = ScriptedGateway::new()
        .reply_after(Duration::from_secs(3), Reply::Entry(entry(1)))
        .reply_after(Duration::from_secs(1), Reply::Entry(entry(2)));
    let session = session_with(&gateway);
    let mut events = session.state().subscribe_events();

    let first = session.handle_scan(EAN).await;
    let second = session.handle_scan(EAN).await;
    let (first, second) = futures::join!(first.outcome(), second.outcome());

    assert_eq!(first, Some(OperationOutcome::EntryUpdated(entry(1))));
    assert_eq!(second, Some(OperationOutcome::EntryUpdated(entry(2))));

    let mut updates = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let SessionEvent::EntryUpdated(entry) = event {
            updates.push(entry.quantity);
        }
    }
    assert_eq!(updates, vec![2, 1]);
    assert_eq!(session.state().current_entry().map(|e| e.quantity), Some(1));
    assert!(!session.state().is_loading());
}

#[tokio::test]
async fn configure_rebuilds_or_clears_the_gateway() {
    let session = ScanSession::new(SessionConfig::default());

    session
        .configure("http://192.168.1.20:8080")
        .await
        .expect("configure");
    assert!(session.is_configured().await);

    assert!(session.configure("ftp://example.com").await.is_err());
    assert!(session.is_configured().await);

    session.configure("   ").await.expect("clear");
    assert!(!session.is_configured().await);
    let outcome = session.handle_scan(EAN).await.outcome().await;
    assert_eq!(
        outcome,
        Some(OperationOutcome::Failed(
            CONFIGURATION_REQUIRED_MESSAGE.to_string()
        ))
    );
}
