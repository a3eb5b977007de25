//! Session engine — the state machine that drives one user through the
//! intake flow.
//!
//! States are the catalog's step ids plus Absent (no session) and the
//! terminal marker. Absent transitions to the initial step only via the
//! start event; the terminal marker is never persisted — completion clears
//! the session in the same logical operation as finalizing the submission.

use std::sync::Arc;

use crate::flow::event::{Event, Outcome, RejectReason};
use crate::flow::session::SessionStore;
use crate::flow::step::{Catalog, NextStep, Projected, Step};
use crate::flow::submission::Finalizer;

/// Приветствие при старте записи.
pub const WELCOME_TEXT: &str = "✨ Добро пожаловать!\n\n\
Здесь вы можете записаться на телесные правки и огненный массаж.\n\
Ответьте на несколько вопросов, чтобы оформить запись.";

/// Финальное сообщение после успешной отправки заявки.
pub const COMPLETED_TEXT: &str = "✨ Спасибо!\n\n\
Ваша заявка принята. Мы свяжемся с вами для подтверждения записи 💬";

/// The state machine. One instance serves all users; per-user mutual
/// exclusion comes from the store's user locks.
pub struct SessionEngine {
    store: Arc<SessionStore>,
    catalog: Catalog,
    finalizer: Finalizer,
}

impl SessionEngine {
    pub fn new(store: Arc<SessionStore>, catalog: Catalog, finalizer: Finalizer) -> Self {
        Self {
            store,
            catalog,
            finalizer,
        }
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    /// Handle one inbound event for `user_id`.
    ///
    /// Serialized per user: concurrent calls for the same user queue on the
    /// store's per-user lock (held through finalization, since completion is
    /// terminal for that user); different users proceed in parallel.
    pub async fn handle(&self, user_id: i64, event: Event) -> Outcome {
        let lock = self.store.user_lock(user_id).await;
        let _guard = lock.lock().await;
        self.handle_serialized(user_id, event).await
    }

    async fn handle_serialized(&self, user_id: i64, event: Event) -> Outcome {
        if matches!(event, Event::Start) {
            return self.restart(user_id).await;
        }

        let Some(mut session) = self.store.get(user_id).await else {
            return Outcome::Rejected(RejectReason::NoActiveSession);
        };

        let Some(step) = self.catalog.step_for(session.step) else {
            // Unreachable by the session invariant; recover by dropping the
            // orphaned session.
            tracing::warn!(user_id, step = %session.step, "Session points at unknown step");
            self.store.clear(user_id).await;
            return Outcome::Rejected(RejectReason::NoActiveSession);
        };

        let projected = match step.validate(&event, &session.answers, self.catalog.branches()) {
            Ok(projected) => projected,
            Err(reason) => {
                // Session untouched: the same prompt stays re-presentable.
                tracing::debug!(user_id, step = %step.id, reason = ?reason, "Event rejected");
                return Outcome::Rejected(reason);
            }
        };

        match &projected {
            Projected::Value(value) => {
                session
                    .answers
                    .insert(step.field.to_string(), value.clone());
            }
            Projected::Back | Projected::Attachment(_) => {}
        }

        match step.next(&projected) {
            NextStep::Step(next_id) => {
                let Some(next_step) = self.catalog.step_for(next_id) else {
                    tracing::warn!(user_id, step = %next_id, "Next step missing from catalog");
                    return Outcome::Rejected(RejectReason::NoActiveSession);
                };
                session.step = next_id;
                session.touch();
                let (text, options) = self.prompt_for(next_step, &session.answers);
                self.store.save(session).await;
                tracing::info!(user_id, step = %next_id, "Session advanced");
                Outcome::Prompt { text, options }
            }
            NextStep::Done => {
                let Projected::Attachment(handle) = projected else {
                    // The catalog only reaches Done through the attachment
                    // step; treat anything else as a validation failure.
                    return Outcome::Rejected(RejectReason::AttachmentRequired);
                };
                match self.finalizer.finalize(&session, handle).await {
                    Ok(submission) => {
                        // Clear only after the sinks accepted the submission.
                        self.store.clear(user_id).await;
                        tracing::info!(user_id, submission_id = %submission.id, "Intake completed");
                        Outcome::Completed(submission)
                    }
                    Err(e) => {
                        // Session stays at the final step so a resend retries
                        // storage with the identical answer set.
                        tracing::warn!(user_id, error = %e, "Finalize failed, session kept");
                        Outcome::Rejected(RejectReason::StorageUnavailable(e.to_string()))
                    }
                }
            }
        }
    }

    /// Start (or restart) the intake: any existing session is discarded —
    /// users restart flows by design, so this is never an error.
    async fn restart(&self, user_id: i64) -> Outcome {
        self.store.clear(user_id).await;
        let initial = self.catalog.initial();
        match self.store.create(user_id, initial.id).await {
            Ok(session) => {
                tracing::info!(user_id, "Session started");
                let (text, options) = self.prompt_for(initial, &session.answers);
                Outcome::Prompt {
                    text: format!("{WELCOME_TEXT}\n\n{text}"),
                    options,
                }
            }
            // Cannot happen after the clear above while the per-user lock is
            // held, but the store contract says so; surface it as a no-op.
            Err(e) => {
                tracing::warn!(user_id, error = %e, "Restart raced a live session");
                Outcome::Rejected(RejectReason::NoActiveSession)
            }
        }
    }

    fn prompt_for(
        &self,
        step: &Step,
        answers: &std::collections::HashMap<String, String>,
    ) -> (String, Vec<String>) {
        (
            step.prompt.to_string(),
            step.options(answers, self.catalog.branches()),
        )
    }
}
