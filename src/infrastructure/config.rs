use crate::infrastructure::error::InfraError;
use chrono_tz::Tz;
use std::path::PathBuf;

pub const DEFAULT_REDIRECT_URI: &str = "http://127.0.0.1:8080/api/auth/google/callback";
pub const DEFAULT_SCOPES: &[&str] = &[
    "openid",
    "email",
    "profile",
    "https://www.googleapis.com/auth/calendar.readonly",
    "https://www.googleapis.com/auth/calendar.events.readonly",
];
pub const DEFAULT_SYNC_DAYS: u32 = 1;
pub const MAX_SYNC_DAYS: u32 = 31;
pub const DEFAULT_PORT: u16 = 8080;

const CLIENT_ID_KEYS: &[&str] = &["TASKBOARD_GOOGLE_CLIENT_ID", "GOOGLE_CLIENT_ID"];
const CLIENT_SECRET_KEYS: &[&str] = &["TASKBOARD_GOOGLE_CLIENT_SECRET", "GOOGLE_CLIENT_SECRET"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoogleCredentials {
    pub client_id: String,
    pub client_secret: String,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub redirect_uri: String,
    pub scopes: Vec<String>,
    pub timezone: Tz,
    pub sync_days: u32,
    pub workspace_root: PathBuf,
    pub port: u16,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            redirect_uri: DEFAULT_REDIRECT_URI.to_string(),
            scopes: DEFAULT_SCOPES.iter().map(|scope| (*scope).to_string()).collect(),
            timezone: Tz::UTC,
            sync_days: DEFAULT_SYNC_DAYS,
            workspace_root: PathBuf::from("."),
            port: DEFAULT_PORT,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, InfraError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Missing Google credentials are not an error here; they surface when an
    /// auth operation calls [`AppConfig::google_credentials`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, InfraError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let redirect_uri = optional_lookup_value(
            &lookup,
            &["TASKBOARD_GOOGLE_REDIRECT_URI", "GOOGLE_REDIRECT_URI"],
        )
        .unwrap_or(defaults.redirect_uri);
        let scopes = optional_lookup_value(&lookup, &["TASKBOARD_GOOGLE_SCOPES", "GOOGLE_SCOPES"])
            .map(|raw| parse_scope_list(&raw))
            .filter(|scopes| !scopes.is_empty())
            .unwrap_or(defaults.scopes);

        let timezone = match optional_lookup_value(&lookup, &["TASKBOARD_TIMEZONE"]) {
            Some(raw) => raw.parse::<Tz>().map_err(|error| {
                InfraError::InvalidConfig(format!("TASKBOARD_TIMEZONE is not an IANA zone: {error}"))
            })?,
            None => defaults.timezone,
        };
        let sync_days = match optional_lookup_value(&lookup, &["TASKBOARD_SYNC_DAYS"]) {
            Some(raw) => parse_sync_days(&raw)?,
            None => defaults.sync_days,
        };
        let port = match optional_lookup_value(&lookup, &["PORT"]) {
            Some(raw) => raw
                .parse::<u16>()
                .map_err(|error| InfraError::InvalidConfig(format!("PORT is invalid: {error}")))?,
            None => defaults.port,
        };
        let workspace_root = optional_lookup_value(&lookup, &["TASKBOARD_WORKSPACE"])
            .map(PathBuf::from)
            .unwrap_or(defaults.workspace_root);

        Ok(Self {
            client_id: optional_lookup_value(&lookup, CLIENT_ID_KEYS),
            client_secret: optional_lookup_value(&lookup, CLIENT_SECRET_KEYS),
            redirect_uri,
            scopes,
            timezone,
            sync_days,
            workspace_root,
            port,
        })
    }

    pub fn google_credentials(&self) -> Result<GoogleCredentials, InfraError> {
        Ok(GoogleCredentials {
            client_id: required_value(self.client_id.as_deref(), CLIENT_ID_KEYS, "google client id")?,
            client_secret: required_value(
                self.client_secret.as_deref(),
                CLIENT_SECRET_KEYS,
                "google client secret",
            )?,
        })
    }
}

/// Validates a requested event window in days.
pub fn parse_sync_days(raw: &str) -> Result<u32, InfraError> {
    let days = raw
        .trim()
        .parse::<u32>()
        .map_err(|error| InfraError::InvalidConfig(format!("days must be a positive integer: {error}")))?;
    if days == 0 || days > MAX_SYNC_DAYS {
        return Err(InfraError::InvalidConfig(format!(
            "days must be between 1 and {MAX_SYNC_DAYS}, got {days}"
        )));
    }
    Ok(days)
}

fn required_value(value: Option<&str>, keys: &[&str], field_name: &str) -> Result<String, InfraError> {
    value.map(ToOwned::to_owned).ok_or_else(|| {
        InfraError::InvalidConfig(format!(
            "missing {} (set one of: {})",
            field_name,
            keys.join(", ")
        ))
    })
}

fn optional_lookup_value<F>(lookup: &F, keys: &[&str]) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    for key in keys {
        if let Some(value) = lookup(key) {
            let normalized = value.trim();
            if !normalized.is_empty() {
                return Some(normalized.to_string());
            }
        }
    }
    None
}

fn parse_scope_list(raw: &str) -> Vec<String> {
    raw.split([',', ' ', '\n', '\t'])
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(ToOwned::to_owned)
        .collect()
}
