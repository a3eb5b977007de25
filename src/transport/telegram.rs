//! Telegram transport — long-polls the Bot API for updates and feeds them
//! to the session engine, one spawned task per inbound event. Per-user
//! ordering is preserved by the engine's per-user locks.

use std::sync::Arc;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};

use crate::error::{SinkError, TransportError};
use crate::flow::event::{AttachmentRef, Event};
use crate::flow::SessionEngine;
use crate::sinks::AttachmentFetcher;
use crate::transport::render;

/// One parsed inbound event, tagged with where to reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inbound {
    pub user_id: i64,
    pub chat_id: i64,
    pub event: Event,
    /// Present for callback-query updates; must be acknowledged.
    pub callback_id: Option<String>,
}

/// Long-polling Bot API transport.
pub struct TelegramTransport {
    bot_token: SecretString,
    client: reqwest::Client,
}

impl TelegramTransport {
    pub fn new(bot_token: SecretString) -> Self {
        Self {
            bot_token,
            client: reqwest::Client::new(),
        }
    }

    fn api_url(&self, method: &str) -> String {
        format!(
            "https://api.telegram.org/bot{}/{method}",
            self.bot_token.expose_secret()
        )
    }

    async fn call(&self, method: &str, body: serde_json::Value) -> Result<serde_json::Value, TransportError> {
        let resp = self
            .client
            .post(self.api_url(method))
            .json(&body)
            .send()
            .await
            .map_err(|e| TransportError::Http(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let detail = resp.text().await.unwrap_or_default();
            return Err(TransportError::Api {
                method: method.to_string(),
                detail: format!("{status}: {detail}"),
            });
        }
        resp.json()
            .await
            .map_err(|e| TransportError::Http(e.to_string()))
    }

    /// Send a message, optionally with a reply-keyboard markup.
    pub async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        reply_markup: Option<serde_json::Value>,
    ) -> Result<(), TransportError> {
        let mut body = serde_json::json!({
            "chat_id": chat_id,
            "text": text,
        });
        if let Some(markup) = reply_markup {
            body["reply_markup"] = markup;
        }
        self.call("sendMessage", body).await.map(|_| ())
    }

    async fn answer_callback(&self, callback_id: &str) {
        let body = serde_json::json!({ "callback_query_id": callback_id });
        if let Err(e) = self.call("answerCallbackQuery", body).await {
            tracing::debug!(error = %e, "answerCallbackQuery failed");
        }
    }

    /// Run the long-poll loop forever, dispatching each event to the engine.
    pub async fn run(self: Arc<Self>, engine: Arc<SessionEngine>) -> Result<(), TransportError> {
        // Drop any backlog accumulated while the process was down.
        self.call(
            "deleteWebhook",
            serde_json::json!({ "drop_pending_updates": true }),
        )
        .await?;

        tracing::info!("Telegram transport polling for updates...");
        let mut offset: i64 = 0;

        loop {
            let body = serde_json::json!({
                "offset": offset,
                "timeout": 30,
                "allowed_updates": ["message", "callback_query"],
            });
            let data = match self.call("getUpdates", body).await {
                Ok(data) => data,
                Err(e) => {
                    tracing::warn!(error = %e, "Poll error");
                    tokio::time::sleep(std::time::Duration::from_secs(5)).await;
                    continue;
                }
            };

            let Some(updates) = data.get("result").and_then(serde_json::Value::as_array) else {
                continue;
            };

            for update in updates {
                if let Some(update_id) = update.get("update_id").and_then(serde_json::Value::as_i64)
                {
                    offset = update_id + 1;
                }

                let Some(inbound) = parse_update(update) else {
                    continue;
                };

                let transport = Arc::clone(&self);
                let engine = Arc::clone(&engine);
                tokio::spawn(async move {
                    if let Some(callback_id) = &inbound.callback_id {
                        transport.answer_callback(callback_id).await;
                    }
                    let outcome = engine.handle(inbound.user_id, inbound.event).await;
                    let (text, markup) = render::outcome_message(&outcome);
                    if let Err(e) = transport.send_message(inbound.chat_id, &text, markup).await {
                        tracing::warn!(
                            user_id = inbound.user_id,
                            error = %e,
                            "Failed to deliver reply"
                        );
                    }
                });
            }
        }
    }
}

#[async_trait]
impl AttachmentFetcher for TelegramTransport {
    /// Resolve a file id to its bytes: getFile for the path, then download
    /// from the file endpoint.
    async fn fetch(&self, handle: &AttachmentRef) -> Result<Vec<u8>, SinkError> {
        let info = self
            .call("getFile", serde_json::json!({ "file_id": handle.0 }))
            .await
            .map_err(|e| SinkError::AttachmentFetch(e.to_string()))?;

        let file_path = info
            .get("result")
            .and_then(|r| r.get("file_path"))
            .and_then(serde_json::Value::as_str)
            .ok_or_else(|| SinkError::AttachmentFetch("getFile response missing file_path".into()))?;

        let url = format!(
            "https://api.telegram.org/file/bot{}/{file_path}",
            self.bot_token.expose_secret()
        );
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| SinkError::AttachmentFetch(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(SinkError::AttachmentFetch(format!(
                "file download returned {}",
                resp.status()
            )));
        }
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| SinkError::AttachmentFetch(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}

/// Map one raw update to an inbound event, or `None` for updates the intake
/// flow does not care about.
pub fn parse_update(update: &serde_json::Value) -> Option<Inbound> {
    if let Some(message) = update.get("message") {
        let user_id = message.get("from")?.get("id")?.as_i64()?;
        let chat_id = message.get("chat")?.get("id")?.as_i64()?;

        // Photos carry an array of sizes; the largest is last.
        if let Some(photos) = message.get("photo").and_then(serde_json::Value::as_array) {
            let file_id = photos.last()?.get("file_id")?.as_str()?;
            return Some(Inbound {
                user_id,
                chat_id,
                event: Event::Attachment(AttachmentRef(file_id.to_string())),
                callback_id: None,
            });
        }

        let text = message.get("text")?.as_str()?;
        // Deep links arrive as "/start <payload>"; the command is the first
        // token either way.
        let event = if text.split_whitespace().next() == Some("/start") {
            Event::Start
        } else {
            Event::Text(text.to_string())
        };
        return Some(Inbound {
            user_id,
            chat_id,
            event,
            callback_id: None,
        });
    }

    if let Some(callback) = update.get("callback_query") {
        let user_id = callback.get("from")?.get("id")?.as_i64()?;
        let chat_id = callback
            .get("message")?
            .get("chat")?
            .get("id")?
            .as_i64()?;
        let data = callback.get("data")?.as_str()?;
        let callback_id = callback.get("id")?.as_str()?.to_string();
        return Some(Inbound {
            user_id,
            chat_id,
            event: Event::Selection(data.to_string()),
            callback_id: Some(callback_id),
        });
    }

    None
}
