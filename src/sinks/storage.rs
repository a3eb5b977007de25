//! Durable-storage adapters: a Drive-style blob store for proof uploads and
//! a Sheets-style append log for submission rows.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};

use crate::error::SinkError;
use crate::sinks::StorageSink;

/// Remote storage over the Google Drive + Sheets REST APIs.
pub struct GoogleStorage {
    api_token: SecretString,
    sheet_id: String,
    drive_folder_id: String,
    client: reqwest::Client,
}

impl GoogleStorage {
    pub fn new(api_token: SecretString, sheet_id: String, drive_folder_id: String) -> Self {
        Self {
            api_token,
            sheet_id,
            drive_folder_id,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl StorageSink for GoogleStorage {
    async fn store_attachment(&self, bytes: Vec<u8>, label: &str) -> Result<String, SinkError> {
        let metadata = serde_json::json!({
            "name": label,
            "parents": [self.drive_folder_id],
        });
        let form = reqwest::multipart::Form::new()
            .part(
                "metadata",
                reqwest::multipart::Part::text(metadata.to_string())
                    .mime_str("application/json")
                    .map_err(|e| SinkError::Storage(e.to_string()))?,
            )
            .part(
                "media",
                reqwest::multipart::Part::bytes(bytes).file_name(label.to_string()),
            );

        let resp = self
            .client
            .post("https://www.googleapis.com/upload/drive/v3/files?uploadType=multipart")
            .bearer_auth(self.api_token.expose_secret())
            .multipart(form)
            .send()
            .await
            .map_err(|e| SinkError::Storage(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let detail = resp.text().await.unwrap_or_default();
            return Err(SinkError::Storage(format!(
                "drive upload returned {status}: {detail}"
            )));
        }

        let body: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| SinkError::Storage(e.to_string()))?;
        let file_id = body
            .get("id")
            .and_then(serde_json::Value::as_str)
            .ok_or_else(|| SinkError::Storage("drive upload response missing file id".into()))?;

        Ok(format!("https://drive.google.com/file/d/{file_id}/view"))
    }

    async fn append_row(
        &self,
        fields: &[(String, String)],
        attachment_link: &str,
    ) -> Result<(), SinkError> {
        let mut row: Vec<&str> = fields.iter().map(|(_, value)| value.as_str()).collect();
        row.push(attachment_link);

        let url = format!(
            "https://sheets.googleapis.com/v4/spreadsheets/{}/values/A1:append?valueInputOption=RAW",
            self.sheet_id
        );
        let resp = self
            .client
            .post(&url)
            .bearer_auth(self.api_token.expose_secret())
            .json(&serde_json::json!({ "values": [row] }))
            .send()
            .await
            .map_err(|e| SinkError::Storage(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let detail = resp.text().await.unwrap_or_default();
            return Err(SinkError::Storage(format!(
                "sheets append returned {status}: {detail}"
            )));
        }
        Ok(())
    }
}

/// Local fallback used when the Google credentials are not configured:
/// logs the row instead of storing it. Useful for local runs; never a
/// substitute for the remote sink in production.
pub struct LogStorage;

#[async_trait]
impl StorageSink for LogStorage {
    async fn store_attachment(&self, bytes: Vec<u8>, label: &str) -> Result<String, SinkError> {
        tracing::info!(label, size = bytes.len(), "Attachment received (log-only storage)");
        Ok(format!("log-only://{label}"))
    }

    async fn append_row(
        &self,
        fields: &[(String, String)],
        attachment_link: &str,
    ) -> Result<(), SinkError> {
        tracing::info!(?fields, attachment_link, "Submission row (log-only storage)");
        Ok(())
    }
}
