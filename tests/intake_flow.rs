//! End-to-end intake scenarios: a full walk through the flow against mock
//! sinks, storage-failure retry, branch and restart invariants.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use intake_bot::error::SinkError;
use intake_bot::flow::step::{BACK_TO_DATES, CONSENT_OPTIONS, SERVICE_OPTIONS};
use intake_bot::flow::{
    AttachmentRef, BranchTable, Catalog, Event, Finalizer, Outcome, RejectReason, SessionEngine,
    SessionStore, Submission,
};
use intake_bot::sinks::{AttachmentFetcher, NotificationSink, StorageSink};

// ── Mock sinks ──────────────────────────────────────────────────────

#[derive(Default)]
struct MockNotifier {
    payloads: Mutex<Vec<Submission>>,
    fail: AtomicBool,
}

#[async_trait]
impl NotificationSink for MockNotifier {
    async fn notify(&self, submission: &Submission) -> Result<(), SinkError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(SinkError::Notify("operator unreachable".into()));
        }
        self.payloads.lock().await.push(submission.clone());
        Ok(())
    }
}

#[derive(Default)]
struct MockStorage {
    uploads: AtomicUsize,
    rows: Mutex<Vec<(Vec<(String, String)>, String)>>,
    fail_uploads: AtomicBool,
}

#[async_trait]
impl StorageSink for MockStorage {
    async fn store_attachment(&self, _bytes: Vec<u8>, label: &str) -> Result<String, SinkError> {
        if self.fail_uploads.load(Ordering::SeqCst) {
            return Err(SinkError::Storage("blob store down".into()));
        }
        self.uploads.fetch_add(1, Ordering::SeqCst);
        Ok(format!("https://blob.test/{label}"))
    }

    async fn append_row(
        &self,
        fields: &[(String, String)],
        attachment_link: &str,
    ) -> Result<(), SinkError> {
        self.rows
            .lock()
            .await
            .push((fields.to_vec(), attachment_link.to_string()));
        Ok(())
    }
}

struct MockFetcher;

#[async_trait]
impl AttachmentFetcher for MockFetcher {
    async fn fetch(&self, _handle: &AttachmentRef) -> Result<Vec<u8>, SinkError> {
        Ok(vec![0xFF, 0xD8, 0xFF])
    }
}

// ── Harness ─────────────────────────────────────────────────────────

struct Harness {
    engine: SessionEngine,
    notifier: Arc<MockNotifier>,
    storage: Arc<MockStorage>,
}

fn branches() -> BranchTable {
    BranchTable::new(vec![
        ("D1".into(), vec!["T1".into(), "T2".into()]),
        ("D2".into(), vec!["T1".into()]),
    ])
}

fn harness() -> Harness {
    let notifier = Arc::new(MockNotifier::default());
    let storage = Arc::new(MockStorage::default());
    let catalog = Catalog::new(branches());
    let finalizer = Finalizer::new(
        Some(Arc::clone(&notifier) as Arc<dyn NotificationSink>),
        Arc::new(MockFetcher),
        Arc::clone(&storage) as Arc<dyn StorageSink>,
        catalog.fields(),
    );
    Harness {
        engine: SessionEngine::new(Arc::new(SessionStore::new()), catalog, finalizer),
        notifier,
        storage,
    }
}

/// Walk a user up to (but not including) the payment-proof attachment.
async fn walk_to_payment(h: &Harness, user: i64) {
    let steps = [
        Event::Start,
        Event::Text("A".into()),
        Event::Text("B".into()),
        Event::Selection("D1".into()),
        Event::Selection("T1".into()),
        Event::Selection("Нет".into()),
        Event::Selection(SERVICE_OPTIONS[0].into()),
    ];
    for event in steps {
        let outcome = h.engine.handle(user, event.clone()).await;
        assert!(
            matches!(outcome, Outcome::Prompt { .. }),
            "expected prompt after {event:?}, got {outcome:?}"
        );
    }
}

fn answer<'a>(fields: &'a [(String, String)], key: &str) -> Option<&'a str> {
    fields
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
}

// ── Scenarios ───────────────────────────────────────────────────────

#[tokio::test]
async fn happy_path_produces_exactly_one_submission() {
    let h = harness();
    walk_to_payment(&h, 10).await;

    let outcome = h
        .engine
        .handle(10, Event::Attachment(AttachmentRef("proof-x".into())))
        .await;
    let Outcome::Completed(submission) = outcome else {
        panic!("expected completion, got {outcome:?}");
    };
    assert_eq!(submission.attachment, AttachmentRef("proof-x".into()));

    // Exactly one notification payload with the collected answers.
    let payloads = h.notifier.payloads.lock().await;
    assert_eq!(payloads.len(), 1);
    let notified = &payloads[0].answers;
    assert_eq!(answer(notified, "name"), Some("A"));
    assert_eq!(answer(notified, "contact"), Some("B"));
    assert_eq!(answer(notified, "date"), Some("D1"));
    assert_eq!(answer(notified, "time"), Some("T1"));
    assert_eq!(answer(notified, "contraindications"), Some("Нет"));

    // Exactly one storage row with the same fields plus a resolved reference.
    let rows = h.storage.rows.lock().await;
    assert_eq!(rows.len(), 1);
    let (fields, link) = &rows[0];
    assert_eq!(answer(fields, "name"), Some("A"));
    assert_eq!(answer(fields, "time"), Some("T1"));
    assert!(link.starts_with("https://blob.test/proof-10-"));
    assert_eq!(h.storage.uploads.load(Ordering::SeqCst), 1);

    // Session is absent afterward.
    assert!(h.engine.store().get(10).await.is_none());
    let after = h.engine.handle(10, Event::Text("hi".into())).await;
    assert!(matches!(
        after,
        Outcome::Rejected(RejectReason::NoActiveSession)
    ));
}

#[tokio::test]
async fn storage_failure_keeps_session_and_retry_resends_identical_answers() {
    let h = harness();
    walk_to_payment(&h, 11).await;

    h.storage.fail_uploads.store(true, Ordering::SeqCst);
    let outcome = h
        .engine
        .handle(11, Event::Attachment(AttachmentRef("proof-y".into())))
        .await;
    assert!(matches!(
        outcome,
        Outcome::Rejected(RejectReason::StorageUnavailable(_))
    ));

    // Session survived with its answers intact.
    let session = h.engine.store().get(11).await.unwrap();
    assert_eq!(session.answers.get("name").unwrap(), "A");
    assert_eq!(session.answers.get("date").unwrap(), "D1");

    // Resend after recovery: second storage attempt, identical answer set.
    h.storage.fail_uploads.store(false, Ordering::SeqCst);
    let outcome = h
        .engine
        .handle(11, Event::Attachment(AttachmentRef("proof-y".into())))
        .await;
    assert!(matches!(outcome, Outcome::Completed(_)));

    let rows = h.storage.rows.lock().await;
    assert_eq!(rows.len(), 1);
    assert_eq!(answer(&rows[0].0, "time"), Some("T1"));
    assert!(h.engine.store().get(11).await.is_none());

    // Notification was attempted on both tries; at-least-once is documented.
    assert_eq!(h.notifier.payloads.lock().await.len(), 2);
}

#[tokio::test]
async fn notification_failure_never_blocks_completion() {
    let h = harness();
    walk_to_payment(&h, 12).await;

    h.notifier.fail.store(true, Ordering::SeqCst);
    let outcome = h
        .engine
        .handle(12, Event::Attachment(AttachmentRef("proof-z".into())))
        .await;
    assert!(matches!(outcome, Outcome::Completed(_)));
    assert_eq!(h.storage.rows.lock().await.len(), 1);
    assert!(h.engine.store().get(12).await.is_none());
}

#[tokio::test]
async fn time_valid_for_another_date_is_rejected() {
    let h = harness();
    h.engine.handle(13, Event::Start).await;
    h.engine.handle(13, Event::Text("A".into())).await;
    h.engine.handle(13, Event::Text("B".into())).await;
    h.engine.handle(13, Event::Selection("D2".into())).await;

    // T2 exists only in D1's option list.
    let outcome = h.engine.handle(13, Event::Selection("T2".into())).await;
    assert!(matches!(
        outcome,
        Outcome::Rejected(RejectReason::UnknownOption(_))
    ));

    let session = h.engine.store().get(13).await.unwrap();
    assert_eq!(session.answers.get("date").unwrap(), "D2");
    assert_eq!(session.step.to_string(), "time");
}

#[tokio::test]
async fn restart_mid_flow_leaks_no_prior_answers() {
    let h = harness();
    h.engine.handle(14, Event::Start).await;
    h.engine.handle(14, Event::Text("Старое имя".into())).await;
    h.engine.handle(14, Event::Text("+70000000000".into())).await;

    h.engine.handle(14, Event::Start).await;
    walk_to_payment(&h, 14).await; // includes another Start; still fine
    h.engine
        .handle(14, Event::Attachment(AttachmentRef("p".into())))
        .await;

    let rows = h.storage.rows.lock().await;
    assert_eq!(rows.len(), 1);
    assert_eq!(answer(&rows[0].0, "name"), Some("A"));
    assert_eq!(answer(&rows[0].0, "contact"), Some("B"));
}

#[tokio::test]
async fn validation_failure_never_advances_or_mutates() {
    let h = harness();
    h.engine.handle(15, Event::Start).await;
    h.engine.handle(15, Event::Text("A".into())).await;

    let before = h.engine.store().get(15).await.unwrap();
    for event in [
        Event::Text("   ".into()),
        Event::Attachment(AttachmentRef("early".into())),
    ] {
        let outcome = h.engine.handle(15, event).await;
        assert!(matches!(outcome, Outcome::Rejected(_)));
    }
    let after = h.engine.store().get(15).await.unwrap();
    assert_eq!(after.step, before.step);
    assert_eq!(after.answers, before.answers);
}

#[tokio::test]
async fn back_to_dates_then_new_branch_validates_against_new_date() {
    let h = harness();
    h.engine.handle(16, Event::Start).await;
    h.engine.handle(16, Event::Text("A".into())).await;
    h.engine.handle(16, Event::Text("B".into())).await;
    h.engine.handle(16, Event::Selection("D1".into())).await;
    h.engine
        .handle(16, Event::Selection(BACK_TO_DATES.into()))
        .await;
    h.engine.handle(16, Event::Selection("D2".into())).await;

    // T2 was valid under D1 but is not under D2.
    let rejected = h.engine.handle(16, Event::Selection("T2".into())).await;
    assert!(matches!(rejected, Outcome::Rejected(_)));
    let accepted = h.engine.handle(16, Event::Selection("T1".into())).await;
    assert!(matches!(accepted, Outcome::Prompt { .. }));
}

#[tokio::test]
async fn prompts_carry_branch_resolved_options() {
    let h = harness();
    h.engine.handle(17, Event::Start).await;
    h.engine.handle(17, Event::Text("A".into())).await;

    let Outcome::Prompt { options, .. } = h.engine.handle(17, Event::Text("B".into())).await
    else {
        panic!("expected date prompt");
    };
    assert_eq!(options, ["D1", "D2"]);

    let Outcome::Prompt { options, .. } = h.engine.handle(17, Event::Selection("D2".into())).await
    else {
        panic!("expected time prompt");
    };
    assert_eq!(options, ["T1", BACK_TO_DATES]);
}

#[tokio::test]
async fn consent_options_are_enforced() {
    let h = harness();
    h.engine.handle(18, Event::Start).await;
    h.engine.handle(18, Event::Text("A".into())).await;
    h.engine.handle(18, Event::Text("B".into())).await;
    h.engine.handle(18, Event::Selection("D1".into())).await;
    h.engine.handle(18, Event::Selection("T1".into())).await;

    let rejected = h
        .engine
        .handle(18, Event::Text("не читал(а)".into()))
        .await;
    assert!(matches!(rejected, Outcome::Rejected(_)));

    let accepted = h
        .engine
        .handle(18, Event::Selection(CONSENT_OPTIONS[1].into()))
        .await;
    assert!(matches!(accepted, Outcome::Prompt { .. }));
}

#[tokio::test]
async fn concurrent_users_do_not_interfere() {
    let h = Arc::new(harness());
    let mut handles = Vec::new();
    for user in 100..110 {
        let h = Arc::clone(&h);
        handles.push(tokio::spawn(async move {
            walk_to_payment(&h, user).await;
            let outcome = h
                .engine
                .handle(user, Event::Attachment(AttachmentRef(format!("p-{user}"))))
                .await;
            assert!(matches!(outcome, Outcome::Completed(_)));
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }
    assert_eq!(h.storage.rows.lock().await.len(), 10);
    assert_eq!(h.notifier.payloads.lock().await.len(), 10);
}
