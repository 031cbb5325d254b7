use crate::application::calendar_fetch::RetryPolicy;
use crate::application::commands::{AppServices, AppState};
use crate::domain::models::AuthToken;
use crate::infrastructure::config::AppConfig;
use crate::infrastructure::credential_store::{CredentialStore, InMemoryCredentialStore};
use crate::infrastructure::error::InfraError;
use crate::infrastructure::event_mapper::{CalendarEventDateTime, ColorPalette, GoogleCalendarEvent};
use crate::infrastructure::google_calendar_client::{GoogleCalendarClient, ListEventsRequest};
use crate::infrastructure::oauth_client::{
    OAuthCodeExchangeRequest, OAuthHttpClient, OAuthRefreshRequest, OAuthTokenResponse,
};
use crate::infrastructure::storage::InMemoryKeyValueStore;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub fn fixed_now() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2026-02-16T12:00:00Z")
        .expect("valid timestamp")
        .with_timezone(&Utc)
}

pub fn event(id: &str, summary: &str, end: &str) -> GoogleCalendarEvent {
    GoogleCalendarEvent {
        id: Some(id.to_string()),
        summary: Some(summary.to_string()),
        status: Some("confirmed".to_string()),
        start: CalendarEventDateTime::default(),
        end: CalendarEventDateTime {
            date_time: Some(end.to_string()),
            ..CalendarEventDateTime::default()
        },
        color_id: None,
        background_color: None,
        foreground_color: None,
    }
}

#[derive(Debug, Default)]
pub struct StubCalendarClient {
    events: Mutex<Vec<GoogleCalendarEvent>>,
    failure: Mutex<Option<InfraError>>,
    pub list_calls: AtomicUsize,
}

impl StubCalendarClient {
    pub fn set_events(&self, events: Vec<GoogleCalendarEvent>) {
        *self.events.lock().expect("events lock") = events;
    }

    pub fn fail_upstream(&self) {
        *self.failure.lock().expect("failure lock") =
            Some(InfraError::FetchFailed("google calendar api returned http 403".to_string()));
    }

    pub fn fail_unauthorized(&self) {
        *self.failure.lock().expect("failure lock") = Some(InfraError::AuthExpired(
            "google calendar api returned http 401".to_string(),
        ));
    }

    fn current_failure(&self) -> Option<InfraError> {
        match self.failure.lock().expect("failure lock").as_ref() {
            Some(InfraError::AuthExpired(message)) => Some(InfraError::AuthExpired(message.clone())),
            Some(InfraError::FetchFailed(message)) => Some(InfraError::FetchFailed(message.clone())),
            Some(other) => Some(InfraError::FetchFailed(other.to_string())),
            None => None,
        }
    }
}

#[async_trait]
impl GoogleCalendarClient for StubCalendarClient {
    async fn list_events(
        &self,
        _access_token: &str,
        _calendar_id: &str,
        _request: ListEventsRequest,
    ) -> Result<Vec<GoogleCalendarEvent>, InfraError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = self.current_failure() {
            return Err(error);
        }
        Ok(self.events.lock().expect("events lock").clone())
    }

    async fn get_colors(&self, _access_token: &str) -> Result<ColorPalette, InfraError> {
        Ok(ColorPalette::default())
    }
}

#[derive(Debug, Default)]
pub struct StubOAuthClient {
    pub exchange_calls: AtomicUsize,
    pub refresh_calls: AtomicUsize,
    refresh_fails: AtomicBool,
}

impl StubOAuthClient {
    pub fn fail_refresh(&self) {
        self.refresh_fails.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl OAuthHttpClient for StubOAuthClient {
    async fn exchange_authorization_code(
        &self,
        _request: OAuthCodeExchangeRequest,
    ) -> Result<OAuthTokenResponse, InfraError> {
        self.exchange_calls.fetch_add(1, Ordering::SeqCst);
        Ok(OAuthTokenResponse {
            access_token: "access-from-code".to_string(),
            refresh_token: Some("refresh-from-code".to_string()),
            expires_in: 3600,
        })
    }

    async fn refresh_access_token(
        &self,
        _request: OAuthRefreshRequest,
    ) -> Result<OAuthTokenResponse, InfraError> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        if self.refresh_fails.load(Ordering::SeqCst) {
            return Err(InfraError::OAuth("invalid_grant".to_string()));
        }
        Ok(OAuthTokenResponse {
            access_token: "access-refreshed".to_string(),
            refresh_token: None,
            expires_in: 3600,
        })
    }
}

pub struct TestHarness {
    pub state: Arc<AppState>,
    pub calendar: Arc<StubCalendarClient>,
    pub oauth: Arc<StubOAuthClient>,
    pub credentials: Arc<InMemoryCredentialStore>,
    pub kv: Arc<InMemoryKeyValueStore>,
}

impl TestHarness {
    pub fn new() -> Self {
        Self::with_config(AppConfig {
            client_id: Some("client-id".to_string()),
            client_secret: Some("client-secret".to_string()),
            timezone: chrono_tz::UTC,
            ..AppConfig::default()
        })
    }

    pub fn without_credentials() -> Self {
        Self::with_config(AppConfig {
            timezone: chrono_tz::UTC,
            ..AppConfig::default()
        })
    }

    fn with_config(config: AppConfig) -> Self {
        let calendar = Arc::new(StubCalendarClient::default());
        let oauth = Arc::new(StubOAuthClient::default());
        let kv = Arc::new(InMemoryKeyValueStore::default());
        let credentials = Arc::new(InMemoryCredentialStore::new(Arc::clone(&kv)));

        let services = AppServices {
            credential_store: Arc::clone(&credentials) as Arc<dyn CredentialStore>,
            oauth_client: Arc::clone(&oauth) as Arc<dyn OAuthHttpClient>,
            calendar_client: Arc::clone(&calendar) as Arc<dyn GoogleCalendarClient>,
            kv: kv.clone(),
            retry_policy: RetryPolicy {
                max_attempts: 1,
                base_delay_ms: 0,
            },
            now_provider: Arc::new(fixed_now),
        };

        Self {
            state: Arc::new(AppState::with_services(config, services)),
            calendar,
            oauth,
            credentials,
            kv,
        }
    }

    /// Stores a token as if the user had just completed sign-in.
    pub fn sign_in(&self, expires_at: DateTime<Utc>) {
        self.credentials
            .save_token(&AuthToken {
                access_token: "access-1".to_string(),
                refresh_token: Some("refresh-1".to_string()),
                access_token_expires_at_ms: expires_at.timestamp_millis(),
                error: None,
            })
            .expect("save token");
    }
}
