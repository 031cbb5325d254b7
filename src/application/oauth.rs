use crate::domain::models::{AuthGrant, AuthToken, Session, TokenError};
use crate::infrastructure::config::AppConfig;
use crate::infrastructure::credential_store::CredentialStore;
use crate::infrastructure::error::InfraError;
use crate::infrastructure::oauth_client::{
    OAuthCodeExchangeRequest, OAuthHttpClient, OAuthRefreshRequest,
};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use url::Url;

const DEFAULT_TOKEN_ENDPOINT: &str = "https://oauth2.googleapis.com/token";
const DEFAULT_AUTHORIZATION_ENDPOINT: &str = "https://accounts.google.com/o/oauth2/v2/auth";

#[derive(Debug, Clone)]
pub struct OAuthConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub scopes: Vec<String>,
    pub token_endpoint: String,
    pub authorization_endpoint: String,
}

impl OAuthConfig {
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        redirect_uri: impl Into<String>,
        scopes: Vec<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            redirect_uri: redirect_uri.into(),
            scopes,
            token_endpoint: DEFAULT_TOKEN_ENDPOINT.to_string(),
            authorization_endpoint: DEFAULT_AUTHORIZATION_ENDPOINT.to_string(),
        }
    }

    pub fn from_app_config(config: &AppConfig) -> Result<Self, InfraError> {
        let credentials = config.google_credentials()?;
        Ok(Self::new(
            credentials.client_id,
            credentials.client_secret,
            config.redirect_uri.clone(),
            config.scopes.clone(),
        ))
    }

    pub fn with_token_endpoint(mut self, token_endpoint: impl Into<String>) -> Self {
        self.token_endpoint = token_endpoint.into();
        self
    }
}

/// Result of checking the stored token before a provider call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnsureTokenResult {
    Existing(AuthToken),
    Refreshed(AuthToken),
    RefreshFailed(AuthToken),
    SignInRequired,
}

impl EnsureTokenResult {
    pub fn token(&self) -> Option<&AuthToken> {
        match self {
            Self::Existing(token) | Self::Refreshed(token) | Self::RefreshFailed(token) => Some(token),
            Self::SignInRequired => None,
        }
    }
}

pub type NowProvider = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Keeps the single stored [`AuthToken`] usable, refreshing it on expiry.
pub struct TokenRefreshManager<S, C>
where
    S: CredentialStore + ?Sized,
    C: OAuthHttpClient + ?Sized,
{
    config: OAuthConfig,
    credential_store: Arc<S>,
    oauth_client: Arc<C>,
    now_provider: NowProvider,
}

impl<S, C> TokenRefreshManager<S, C>
where
    S: CredentialStore + ?Sized,
    C: OAuthHttpClient + ?Sized,
{
    pub fn new(config: OAuthConfig, credential_store: Arc<S>, oauth_client: Arc<C>) -> Self {
        Self {
            config,
            credential_store,
            oauth_client,
            now_provider: Arc::new(Utc::now),
        }
    }

    pub fn with_now_provider(mut self, now_provider: NowProvider) -> Self {
        self.now_provider = now_provider;
        self
    }

    fn now_ms(&self) -> i64 {
        (self.now_provider)().timestamp_millis()
    }

    pub fn build_authorization_url(&self, state: &str) -> Result<String, InfraError> {
        if state.trim().is_empty() {
            return Err(InfraError::OAuth("state must not be empty".to_string()));
        }
        if self.config.scopes.is_empty() {
            return Err(InfraError::OAuth("at least one scope is required".to_string()));
        }

        let mut url = Url::parse(&self.config.authorization_endpoint)
            .map_err(|error| InfraError::OAuth(format!("invalid authorization endpoint: {error}")))?;
        let scope = self.config.scopes.join(" ");

        url.query_pairs_mut()
            .append_pair("response_type", "code")
            .append_pair("client_id", &self.config.client_id)
            .append_pair("redirect_uri", &self.config.redirect_uri)
            .append_pair("scope", &scope)
            .append_pair("access_type", "offline")
            .append_pair("prompt", "consent")
            .append_pair("state", state);

        Ok(url.to_string())
    }

    /// Initial sign-in: replaces any stored record with one built from `grant`.
    pub fn sign_in(&self, grant: AuthGrant) -> Result<AuthToken, InfraError> {
        let token = AuthToken::from_grant(grant);
        token.validate().map_err(InfraError::OAuth)?;
        self.credential_store.save_token(&token)?;
        Ok(token)
    }

    pub async fn authenticate_with_code(&self, authorization_code: &str) -> Result<AuthToken, InfraError> {
        if authorization_code.trim().is_empty() {
            return Err(InfraError::OAuth("authorization code must not be empty".to_string()));
        }

        let response = self
            .oauth_client
            .exchange_authorization_code(OAuthCodeExchangeRequest {
                token_endpoint: self.config.token_endpoint.clone(),
                client_id: self.config.client_id.clone(),
                client_secret: self.config.client_secret.clone(),
                redirect_uri: self.config.redirect_uri.clone(),
                authorization_code: authorization_code.trim().to_string(),
            })
            .await?;

        let now_seconds = (self.now_provider)().timestamp();
        self.sign_in(AuthGrant {
            access_token: response.access_token,
            refresh_token: response.refresh_token,
            expires_at_epoch_seconds: Some(now_seconds.saturating_add(response.expires_in.max(0))),
        })
    }

    /// Returns `token` untouched while it is unexpired, without any network
    /// call. Otherwise exchanges the refresh token once. A failed exchange
    /// never errors: the previous token comes back flagged.
    pub async fn refresh_if_expired(&self, token: AuthToken) -> AuthToken {
        let now_ms = self.now_ms();
        if token.is_fresh_at(now_ms) {
            return token;
        }

        let Some(refresh_token) = token.refresh_token.clone() else {
            tracing::warn!("access token expired and no refresh token is stored");
            return flagged(token);
        };

        let refreshed = self
            .oauth_client
            .refresh_access_token(OAuthRefreshRequest {
                token_endpoint: self.config.token_endpoint.clone(),
                client_id: self.config.client_id.clone(),
                client_secret: self.config.client_secret.clone(),
                refresh_token,
            })
            .await;

        match refreshed {
            Ok(response) => AuthToken {
                access_token: response.access_token,
                refresh_token: response.refresh_token.or(token.refresh_token),
                access_token_expires_at_ms: now_ms
                    .saturating_add(response.expires_in.max(0).saturating_mul(1000)),
                error: None,
            },
            Err(error) => {
                tracing::warn!(%error, "access token refresh failed");
                flagged(token)
            }
        }
    }

    /// Loads the stored record and runs [`Self::refresh_if_expired`] on it,
    /// persisting the outcome whenever it changed.
    pub async fn ensure_access_token(&self) -> Result<EnsureTokenResult, InfraError> {
        let Some(stored) = self.credential_store.load_token()? else {
            return Ok(EnsureTokenResult::SignInRequired);
        };
        if stored.is_fresh_at(self.now_ms()) && stored.is_usable() {
            return Ok(EnsureTokenResult::Existing(stored));
        }

        let token = self.refresh_if_expired(stored.clone()).await;
        if token != stored {
            self.credential_store.save_token(&token)?;
        }
        if token.error.is_some() {
            Ok(EnsureTokenResult::RefreshFailed(token))
        } else {
            Ok(EnsureTokenResult::Refreshed(token))
        }
    }

    /// Access token for a provider call, or the error the caller must surface.
    pub async fn require_access_token(&self) -> Result<String, InfraError> {
        match self.ensure_access_token().await? {
            EnsureTokenResult::Existing(token) | EnsureTokenResult::Refreshed(token) => {
                Ok(token.access_token)
            }
            EnsureTokenResult::RefreshFailed(_) => Err(InfraError::RefreshFailed),
            EnsureTokenResult::SignInRequired => Err(InfraError::AuthExpired(
                "google authentication required; sign in first".to_string(),
            )),
        }
    }

    pub async fn current_session(&self) -> Result<Option<Session>, InfraError> {
        let result = self.ensure_access_token().await?;
        Ok(result.token().map(project_session))
    }

    pub fn sign_out(&self) -> Result<(), InfraError> {
        self.credential_store.delete_token()
    }
}

fn flagged(token: AuthToken) -> AuthToken {
    AuthToken {
        error: Some(TokenError::RefreshAccessTokenError),
        ..token
    }
}

/// Client-visible view of a token. The refresh token never crosses this line.
pub fn project_session(token: &AuthToken) -> Session {
    Session {
        access_token: Some(token.access_token.clone()).filter(|value| !value.is_empty()),
        error: token.error,
    }
}
