//! Operator notification over the Bot API — a flat key-value report of the
//! completed submission plus the original proof photo, sent to a single
//! fixed operator chat.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};

use crate::error::SinkError;
use crate::flow::submission::Submission;
use crate::sinks::NotificationSink;

/// Sends completed-intake reports to the operator chat.
pub struct OperatorNotifier {
    bot_token: SecretString,
    operator_chat_id: i64,
    client: reqwest::Client,
}

impl OperatorNotifier {
    pub fn new(bot_token: SecretString, operator_chat_id: i64) -> Self {
        Self {
            bot_token,
            operator_chat_id,
            client: reqwest::Client::new(),
        }
    }

    fn api_url(&self, method: &str) -> String {
        format!(
            "https://api.telegram.org/bot{}/{method}",
            self.bot_token.expose_secret()
        )
    }

    /// Flat key-value report of the submission's answers.
    fn report(submission: &Submission) -> String {
        let mut lines = vec!["🔥 НОВАЯ ЗАЯВКА".to_string()];
        for (field, value) in &submission.answers {
            lines.push(format!("{}: {value}", field_label(field)));
        }
        lines.push(format!("ID: {}", submission.user_id));
        lines.join("\n")
    }

    /// Best-effort "bot started" ping, sent once at startup.
    pub async fn startup_ping(&self) {
        let body = serde_json::json!({
            "chat_id": self.operator_chat_id,
            "text": "✅ Бот запущен и может отправлять сообщения оператору",
        });
        match self.client.post(self.api_url("sendMessage")).json(&body).send().await {
            Ok(resp) if resp.status().is_success() => {
                tracing::info!("Operator startup ping delivered");
            }
            Ok(resp) => {
                tracing::warn!(status = ?resp.status(), "Operator startup ping rejected");
            }
            Err(e) => {
                tracing::warn!(error = %e, "Operator startup ping failed");
            }
        }
    }

    async fn send(&self, method: &str, body: serde_json::Value) -> Result<(), SinkError> {
        let resp = self
            .client
            .post(self.api_url(method))
            .json(&body)
            .send()
            .await
            .map_err(|e| SinkError::Notify(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let detail = resp.text().await.unwrap_or_default();
            return Err(SinkError::Notify(format!("{method} returned {status}: {detail}")));
        }
        Ok(())
    }
}

#[async_trait]
impl NotificationSink for OperatorNotifier {
    async fn notify(&self, submission: &Submission) -> Result<(), SinkError> {
        self.send(
            "sendMessage",
            serde_json::json!({
                "chat_id": self.operator_chat_id,
                "text": Self::report(submission),
            }),
        )
        .await?;

        // Forward the proof photo by file id; Telegram resolves it itself.
        self.send(
            "sendPhoto",
            serde_json::json!({
                "chat_id": self.operator_chat_id,
                "photo": submission.attachment.0,
                "caption": format!("Чек от {}", submission.user_id),
            }),
        )
        .await
    }
}

/// Human-readable label for a report line.
fn field_label(field: &str) -> &str {
    match field {
        "name" => "👤 ФИО",
        "contact" => "📞 Контакт",
        "date" => "🗓 Дата",
        "time" => "🕐 Время",
        "contraindications" => "⚠️ Противопоказания",
        "service" => "💆 Услуга",
        other => other,
    }
}
