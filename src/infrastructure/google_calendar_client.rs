use crate::infrastructure::error::InfraError;
use crate::infrastructure::event_mapper::{ColorPalette, GoogleCalendarEvent};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use url::Url;

const CALENDAR_API_BASE: &str = "https://www.googleapis.com/calendar/v3/";
const MAX_RESULTS_PER_PAGE: &str = "250";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListEventsRequest {
    pub time_min: DateTime<Utc>,
    pub time_max: DateTime<Utc>,
}

#[async_trait]
pub trait GoogleCalendarClient: Send + Sync {
    /// Lists single (recurrence-expanded) events in the window, ordered by start.
    async fn list_events(
        &self,
        access_token: &str,
        calendar_id: &str,
        request: ListEventsRequest,
    ) -> Result<Vec<GoogleCalendarEvent>, InfraError>;

    async fn get_colors(&self, access_token: &str) -> Result<ColorPalette, InfraError>;
}

#[derive(Debug, Clone)]
pub struct ReqwestGoogleCalendarClient {
    client: Client,
    api_base: String,
}

impl Default for ReqwestGoogleCalendarClient {
    fn default() -> Self {
        Self::new()
    }
}

impl ReqwestGoogleCalendarClient {
    pub fn new() -> Self {
        Self::with_api_base(CALENDAR_API_BASE)
    }

    pub fn with_api_base(api_base: impl Into<String>) -> Self {
        let mut api_base = api_base.into();
        if !api_base.ends_with('/') {
            api_base.push('/');
        }
        Self {
            client: Client::new(),
            api_base,
        }
    }

    fn ensure_access_token(access_token: &str) -> Result<(), InfraError> {
        if access_token.trim().is_empty() {
            return Err(InfraError::AuthExpired("access token is missing".to_string()));
        }
        Ok(())
    }

    fn http_error(status: StatusCode, body: &str) -> InfraError {
        if status == StatusCode::UNAUTHORIZED {
            return InfraError::AuthExpired("google calendar rejected the access token".to_string());
        }
        let message = if body.trim().is_empty() {
            format!("google calendar api error: http {}", status.as_u16())
        } else {
            format!("google calendar api error: http {}; body={body}", status.as_u16())
        };
        if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
            InfraError::FetchTransient(message)
        } else {
            InfraError::FetchFailed(message)
        }
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, InfraError> {
        let mut url = Url::parse(&self.api_base)
            .map_err(|error| InfraError::InvalidConfig(format!("invalid calendar api base url: {error}")))?;
        {
            let mut path = url.path_segments_mut().map_err(|_| {
                InfraError::InvalidConfig("calendar api base URL cannot be a base".to_string())
            })?;
            path.pop_if_empty();
            for segment in segments {
                path.push(segment);
            }
        }
        Ok(url)
    }

    async fn get_body(&self, request: reqwest::RequestBuilder, what: &str) -> Result<String, InfraError> {
        let response = request
            .send()
            .await
            .map_err(|error| InfraError::FetchTransient(format!("network error while {what}: {error}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|error| InfraError::FetchTransient(format!("failed reading response while {what}: {error}")))?;

        if !status.is_success() {
            return Err(Self::http_error(status, &body));
        }
        Ok(body)
    }
}

#[derive(Debug, serde::Deserialize)]
struct EventsPageResponse {
    items: Option<Vec<GoogleCalendarEvent>>,
    #[serde(rename = "nextPageToken")]
    next_page_token: Option<String>,
}

#[async_trait]
impl GoogleCalendarClient for ReqwestGoogleCalendarClient {
    async fn list_events(
        &self,
        access_token: &str,
        calendar_id: &str,
        request: ListEventsRequest,
    ) -> Result<Vec<GoogleCalendarEvent>, InfraError> {
        Self::ensure_access_token(access_token)?;
        if calendar_id.trim().is_empty() {
            return Err(InfraError::InvalidConfig("calendar id must not be empty".to_string()));
        }

        let endpoint = self.endpoint(&["calendars", calendar_id.trim(), "events"])?;
        let mut page_token: Option<String> = None;
        let mut events = Vec::new();

        loop {
            let mut req = self
                .client
                .get(endpoint.clone())
                .bearer_auth(access_token)
                .query(&[
                    ("timeMin", request.time_min.to_rfc3339()),
                    ("timeMax", request.time_max.to_rfc3339()),
                ])
                .query(&[
                    ("singleEvents", "true"),
                    ("orderBy", "startTime"),
                    ("maxResults", MAX_RESULTS_PER_PAGE),
                ]);
            if let Some(page_token) = page_token.as_deref() {
                req = req.query(&[("pageToken", page_token)]);
            }

            let body = self.get_body(req, "listing calendar events").await?;
            let mut parsed: EventsPageResponse = serde_json::from_str(&body).map_err(|error| {
                InfraError::FetchFailed(format!("invalid events list payload: {error}"))
            })?;

            events.extend(parsed.items.take().unwrap_or_default());
            match parsed.next_page_token.take() {
                Some(next) => page_token = Some(next),
                None => break,
            }
        }

        Ok(events)
    }

    async fn get_colors(&self, access_token: &str) -> Result<ColorPalette, InfraError> {
        Self::ensure_access_token(access_token)?;

        let endpoint = self.endpoint(&["colors"])?;
        let req = self.client.get(endpoint).bearer_auth(access_token);
        let body = self.get_body(req, "loading calendar colors").await?;
        serde_json::from_str(&body)
            .map_err(|error| InfraError::FetchFailed(format!("invalid colors payload: {error}")))
    }
}
