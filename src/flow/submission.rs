//! Submission snapshot and the finalizer that hands it to the sinks.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::SinkError;
use crate::flow::event::AttachmentRef;
use crate::flow::session::Session;
use crate::sinks::{AttachmentFetcher, NotificationSink, StorageSink};

/// Immutable completed-intake record. Built once, at the moment a session
/// reaches the terminal step with a valid final attachment; never mutated
/// afterward and handed to sinks at most once per session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Submission {
    pub id: Uuid,
    pub user_id: i64,
    /// Collected answers in catalog order.
    pub answers: Vec<(String, String)>,
    /// Opaque handle to the proof-of-payment attachment; resolved lazily by
    /// the storage sink.
    pub attachment: AttachmentRef,
    pub created_at: DateTime<Utc>,
}

impl Submission {
    /// Snapshot a session's answers, ordered by the catalog's field order.
    /// Fields the session never answered (the attachment field) are skipped.
    pub fn from_session(
        session: &Session,
        attachment: AttachmentRef,
        field_order: &[&'static str],
    ) -> Self {
        let answers = field_order
            .iter()
            .filter_map(|field| {
                session
                    .answers
                    .get(*field)
                    .map(|value| (field.to_string(), value.clone()))
            })
            .collect();
        Self {
            id: Uuid::new_v4(),
            user_id: session.user_id,
            answers,
            attachment,
            created_at: Utc::now(),
        }
    }
}

/// Forwards a completed session to the two external sinks.
///
/// Delivery order: operator notification first (best-effort, failures are
/// logged and swallowed), then storage — attachment upload before the row
/// append so the row always carries a resolved reference. A storage failure
/// propagates so the engine keeps the session alive; resending the final
/// event retries the whole storage path. The guarantee is at-least-once:
/// a retry after a partial failure may upload the attachment again.
pub struct Finalizer {
    notify: Option<Arc<dyn NotificationSink>>,
    fetcher: Arc<dyn AttachmentFetcher>,
    storage: Arc<dyn StorageSink>,
    field_order: Vec<&'static str>,
}

impl Finalizer {
    pub fn new(
        notify: Option<Arc<dyn NotificationSink>>,
        fetcher: Arc<dyn AttachmentFetcher>,
        storage: Arc<dyn StorageSink>,
        field_order: Vec<&'static str>,
    ) -> Self {
        Self {
            notify,
            fetcher,
            storage,
            field_order,
        }
    }

    pub async fn finalize(
        &self,
        session: &Session,
        attachment: AttachmentRef,
    ) -> Result<Submission, SinkError> {
        let submission = Submission::from_session(session, attachment, &self.field_order);

        if let Some(notify) = &self.notify {
            if let Err(e) = notify.notify(&submission).await {
                tracing::warn!(user_id = session.user_id, error = %e, "Operator notification failed");
            }
        }

        let bytes = self.fetcher.fetch(&submission.attachment).await?;
        let label = format!(
            "proof-{}-{}.jpg",
            submission.user_id,
            submission.created_at.timestamp()
        );
        let link = self.storage.store_attachment(bytes, &label).await?;
        self.storage.append_row(&submission.answers, &link).await?;

        tracing::info!(
            user_id = session.user_id,
            submission_id = %submission.id,
            "Submission stored"
        );
        Ok(submission)
    }
}
