use serde::{Deserialize, Serialize};

pub const CALENDAR_TASK_ID_PREFIX: &str = "cal_";
pub const PRIMARY_CALENDAR_ID: &str = "primary";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum TaskStatus {
    #[serde(rename = "To_Do")]
    ToDo,
    #[serde(rename = "Doing")]
    Doing,
    #[serde(rename = "Done")]
    Done,
}

impl TaskStatus {
    pub const ALL: [TaskStatus; 3] = [Self::ToDo, Self::Doing, Self::Done];

    /// Column order on the board.
    pub fn rank(self) -> u8 {
        match self {
            Self::ToDo => 0,
            Self::Doing => 1,
            Self::Done => 2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::ToDo => "To_Do",
            Self::Doing => "Doing",
            Self::Done => "Done",
        }
    }

    pub fn parse(value: &str) -> Result<Self, String> {
        match value.trim() {
            "To_Do" => Ok(Self::ToDo),
            "Doing" => Ok(Self::Doing),
            "Done" => Ok(Self::Done),
            other => Err(format!("unknown task status: {other}")),
        }
    }
}

/// A board entry. Calendar-derived tasks carry `event_id`; manual tasks do not.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub text: String,
    pub status: TaskStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calendar_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub foreground_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<i64>,
}

impl Task {
    pub fn is_calendar_derived(&self) -> bool {
        self.event_id.is_some()
    }

    pub fn validate(&self) -> Result<(), String> {
        validate_non_empty(&self.id, "task.id")?;
        if let Some(event_id) = self.event_id.as_deref() {
            validate_non_empty(event_id, "task.event_id")?;
        }
        if let Some(position) = self.position {
            if position < 0 {
                return Err("task.position must be >= 0".to_string());
            }
        }
        Ok(())
    }
}

/// Eisenhower matrix cell, 1 (urgent & important) through 4.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(try_from = "u8", into = "u8")]
pub struct Quadrant(u8);

impl Quadrant {
    pub const DO_FIRST: Quadrant = Quadrant(1);
    pub const SCHEDULE: Quadrant = Quadrant(2);
    pub const DELEGATE: Quadrant = Quadrant(3);
    pub const ELIMINATE: Quadrant = Quadrant(4);

    pub fn new(value: u8) -> Result<Self, String> {
        if (1..=4).contains(&value) {
            Ok(Self(value))
        } else {
            Err(format!("quadrant must be between 1 and 4, got {value}"))
        }
    }

    pub fn value(self) -> u8 {
        self.0
    }

    pub fn title(self) -> &'static str {
        match self.0 {
            1 => "Urgent & Important",
            2 => "Not Urgent & Important",
            3 => "Urgent & Not Important",
            _ => "Not Urgent & Not Important",
        }
    }
}

impl Default for Quadrant {
    fn default() -> Self {
        Self::ELIMINATE
    }
}

impl TryFrom<u8> for Quadrant {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Quadrant> for u8 {
    fn from(value: Quadrant) -> Self {
        value.0
    }
}

/// Entry of the manual board, persisted under the `tasks` key.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ManualTask {
    pub id: String,
    pub text: String,
    pub status: TaskStatus,
    #[serde(default)]
    pub quadrant: Quadrant,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TokenError {
    RefreshAccessTokenError,
}

impl TokenError {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::RefreshAccessTokenError => "RefreshAccessTokenError",
        }
    }
}

/// One-time bundle issued by the provider at sign-in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthGrant {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at_epoch_seconds: Option<i64>,
}

/// Internal authentication record. The refresh token never leaves this type
/// except through the credential store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AuthToken {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub access_token_expires_at_ms: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<TokenError>,
}

impl AuthToken {
    pub fn from_grant(grant: AuthGrant) -> Self {
        Self {
            access_token: grant.access_token,
            refresh_token: grant.refresh_token,
            access_token_expires_at_ms: grant
                .expires_at_epoch_seconds
                .map(|seconds| seconds.saturating_mul(1000))
                .unwrap_or(0),
            error: None,
        }
    }

    pub fn is_fresh_at(&self, now_ms: i64) -> bool {
        now_ms < self.access_token_expires_at_ms
    }

    /// Usable means: no refresh failure recorded and a non-empty access token.
    pub fn is_usable(&self) -> bool {
        self.error.is_none() && !self.access_token.trim().is_empty()
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.error.is_none() {
            validate_non_empty(&self.access_token, "token.access_token")?;
        }
        Ok(())
    }
}

/// Client-visible projection of [`AuthToken`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<TokenError>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum AppMode {
    #[default]
    Simple,
    Calendar,
    Matrix,
}

impl AppMode {
    pub fn toggled(self) -> Self {
        match self {
            Self::Simple => Self::Calendar,
            Self::Calendar | Self::Matrix => Self::Simple,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct AppSettings {
    #[serde(default)]
    pub mode: AppMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_used_calendar: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_sync: Option<bool>,
}

fn validate_non_empty(value: &str, field_name: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        return Err(format!("{field_name} must not be empty"));
    }
    Ok(())
}
