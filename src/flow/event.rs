//! Inbound events, rejection reasons, and engine outcomes.

use serde::{Deserialize, Serialize};

use crate::flow::submission::Submission;

/// Opaque handle to a user-supplied attachment (the transport's file id).
/// Resolved to bytes lazily, only when the storage sink needs them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentRef(pub String);

impl std::fmt::Display for AttachmentRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One inbound user event, already tagged with a stable user identity by
/// the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// The designated "start intake" event (`/start` or the start button).
    Start,
    /// Free-text message.
    Text(String),
    /// Button/selection callback payload.
    Selection(String),
    /// An attachment (proof-of-payment photo).
    Attachment(AttachmentRef),
}

/// Why an event was rejected. Ordinary return value, never an error type;
/// the transport renders it back to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    /// Mid-flow event with no session in progress.
    NoActiveSession,
    /// Free-text input failed validation (empty, too long).
    InvalidInput(&'static str),
    /// A selection that is not among the currently valid options.
    UnknownOption(String),
    /// The current step requires an attachment, not text.
    AttachmentRequired,
    /// The current step expects text or a selection, not an attachment.
    TextRequired,
    /// Finalization failed at the storage sink; the session stays alive so
    /// the user can resend the final event.
    StorageUnavailable(String),
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoActiveSession => write!(f, "Нажмите /start, чтобы начать запись."),
            Self::InvalidInput(msg) => write!(f, "{msg}"),
            Self::UnknownOption(opt) => {
                write!(f, "«{opt}» нет среди доступных вариантов. Выберите кнопкой ниже.")
            }
            Self::AttachmentRequired => {
                write!(f, "Пришлите, пожалуйста, скриншот чека фотографией.")
            }
            Self::TextRequired => write!(f, "Ответьте, пожалуйста, текстом."),
            Self::StorageUnavailable(_) => write!(
                f,
                "Не удалось сохранить заявку. Пришлите скриншот ещё раз через минуту."
            ),
        }
    }
}

/// Result of handling one event.
#[derive(Debug, Clone)]
pub enum Outcome {
    /// Ask the user the next question, with an optional fixed option set.
    Prompt { text: String, options: Vec<String> },
    /// The event was rejected; the session is unchanged.
    Rejected(RejectReason),
    /// The intake completed and the submission was forwarded.
    Completed(Submission),
}
