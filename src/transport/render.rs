//! Rendering of engine outcomes into Bot API message payloads.

use crate::flow::engine::COMPLETED_TEXT;
use crate::flow::event::{Outcome, RejectReason};

/// Reply-keyboard markup for a fixed option set, one button per row.
/// An empty option set removes any previous keyboard.
pub fn reply_markup(options: &[String]) -> serde_json::Value {
    if options.is_empty() {
        return serde_json::json!({ "remove_keyboard": true });
    }
    let keyboard: Vec<Vec<serde_json::Value>> = options
        .iter()
        .map(|option| vec![serde_json::json!({ "text": option })])
        .collect();
    serde_json::json!({
        "keyboard": keyboard,
        "resize_keyboard": true,
        "one_time_keyboard": false,
    })
}

/// The user-facing message for an outcome: text plus an optional keyboard.
/// `None` markup leaves the current keyboard in place so a rejected event
/// keeps the same prompt re-presentable.
pub fn outcome_message(outcome: &Outcome) -> (String, Option<serde_json::Value>) {
    match outcome {
        Outcome::Prompt { text, options } => (text.clone(), Some(reply_markup(options))),
        Outcome::Rejected(RejectReason::NoActiveSession) => (
            RejectReason::NoActiveSession.to_string(),
            Some(reply_markup(&[])),
        ),
        Outcome::Rejected(reason) => (reason.to_string(), None),
        Outcome::Completed(_) => (COMPLETED_TEXT.to_string(), Some(reply_markup(&[]))),
    }
}
