use thiserror::Error;

#[derive(Debug, Error)]
pub enum InfraError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Invalid config: {0}")]
    InvalidConfig(String),
    #[error("OAuth error: {0}")]
    OAuth(String),
    #[error("Credential store error: {0}")]
    Credential(String),
    #[error("Authentication required: {0}")]
    AuthExpired(String),
    #[error("Access token refresh failed; sign in again")]
    RefreshFailed,
    #[error("Calendar fetch failed: {0}")]
    FetchFailed(String),
    /// Network failure, throttling or a provider 5xx; worth another attempt.
    #[error("Calendar fetch failed: {0}")]
    FetchTransient(String),
    #[error("Storage write failed: {0}")]
    StorageFailed(String),
}

impl InfraError {
    /// Stable identifier the client uses to choose between "sign in" and "retry".
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Io(_) => "io",
            Self::Sqlite(_) => "sqlite",
            Self::InvalidConfig(_) => "invalid_config",
            Self::OAuth(_) => "oauth",
            Self::Credential(_) => "credential",
            Self::AuthExpired(_) => "auth_expired",
            Self::RefreshFailed => "refresh_failed",
            Self::FetchFailed(_) | Self::FetchTransient(_) => "fetch_failed",
            Self::StorageFailed(_) => "storage_failed",
        }
    }

    pub fn requires_sign_in(&self) -> bool {
        matches!(self, Self::AuthExpired(_) | Self::RefreshFailed)
    }
}
