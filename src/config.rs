//! Process configuration, read from the environment at startup.

use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;

/// Runtime configuration for the intake bot.
#[derive(Debug, Clone)]
pub struct Config {
    /// Bot API token. Required; startup fails without it.
    pub bot_token: SecretString,
    /// Operator chat id for completed-intake notifications.
    /// `None` disables notification delivery (not an error).
    pub operator_chat_id: Option<i64>,
    /// Port for the liveness endpoint.
    pub port: u16,
    /// Google API bearer token for the storage sinks.
    pub google_api_token: Option<SecretString>,
    /// Destination spreadsheet id for submission rows.
    pub sheet_id: Option<String>,
    /// Destination Drive folder id for proof-of-payment uploads.
    pub drive_folder_id: Option<String>,
    /// Optional JSON schedule overriding the built-in date→time table.
    /// Format: `[["date label", ["10:00", "14:00"]], ...]`.
    pub schedule_json: Option<String>,
    /// Sessions idle longer than this are evicted.
    pub session_idle_timeout: Duration,
}

impl Config {
    /// Read configuration from the environment.
    ///
    /// `BOT_TOKEN` is required. `ADMIN_CHAT_ID` absence disables the
    /// notification sink; absence of any of the Google credentials disables
    /// the remote storage adapter.
    pub fn from_env() -> Result<Self, ConfigError> {
        let bot_token = std::env::var("BOT_TOKEN")
            .map_err(|_| ConfigError::MissingEnvVar("BOT_TOKEN".into()))?;

        let operator_chat_id = match std::env::var("ADMIN_CHAT_ID") {
            Ok(raw) => Some(raw.parse::<i64>().map_err(|e| ConfigError::InvalidValue {
                key: "ADMIN_CHAT_ID".into(),
                message: e.to_string(),
            })?),
            Err(_) => None,
        };

        let port = match std::env::var("PORT") {
            Ok(raw) => raw.parse::<u16>().map_err(|e| ConfigError::InvalidValue {
                key: "PORT".into(),
                message: e.to_string(),
            })?,
            Err(_) => 8080,
        };

        let idle_hours = match std::env::var("SESSION_IDLE_HOURS") {
            Ok(raw) => raw.parse::<u64>().map_err(|e| ConfigError::InvalidValue {
                key: "SESSION_IDLE_HOURS".into(),
                message: e.to_string(),
            })?,
            Err(_) => 24,
        };

        Ok(Self {
            bot_token: SecretString::from(bot_token),
            operator_chat_id,
            port,
            google_api_token: std::env::var("GOOGLE_API_TOKEN")
                .ok()
                .map(SecretString::from),
            sheet_id: std::env::var("SHEET_ID").ok(),
            drive_folder_id: std::env::var("DRIVE_FOLDER_ID").ok(),
            schedule_json: std::env::var("INTAKE_SCHEDULE").ok(),
            session_idle_timeout: Duration::from_secs(idle_hours * 3600),
        })
    }

    /// Whether all three storage credentials are present.
    pub fn storage_configured(&self) -> bool {
        self.google_api_token.is_some() && self.sheet_id.is_some() && self.drive_folder_id.is_some()
    }
}
