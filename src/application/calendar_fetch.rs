use crate::domain::models::PRIMARY_CALENDAR_ID;
use crate::infrastructure::error::InfraError;
use crate::infrastructure::event_mapper::{ColorPalette, GoogleCalendarEvent, apply_display_colors};
use crate::infrastructure::google_calendar_client::{GoogleCalendarClient, ListEventsRequest};
use chrono::{DateTime, Days, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use std::sync::Arc;
use tokio::time::{Duration as TokioDuration, sleep};

pub type NowProvider = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u8,
    pub base_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 200,
        }
    }
}

/// Payload of the event listing endpoint.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CalendarEvents {
    pub events: Vec<GoogleCalendarEvent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub colors: Option<ColorPalette>,
}

pub struct CalendarEventFetcher<C>
where
    C: GoogleCalendarClient + ?Sized,
{
    calendar_client: Arc<C>,
    timezone: Tz,
    retry_policy: RetryPolicy,
    now_provider: NowProvider,
}

impl<C> CalendarEventFetcher<C>
where
    C: GoogleCalendarClient + ?Sized,
{
    pub fn new(calendar_client: Arc<C>, timezone: Tz) -> Self {
        Self {
            calendar_client,
            timezone,
            retry_policy: RetryPolicy::default(),
            now_provider: Arc::new(Utc::now),
        }
    }

    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    pub fn with_now_provider(mut self, now_provider: NowProvider) -> Self {
        self.now_provider = now_provider;
        self
    }

    /// Lists events starting in `[start of today, start of today + days)` on
    /// the primary calendar, annotated with display colours.
    ///
    /// `AuthExpired` and the fetch errors stay distinct so the caller can offer
    /// "sign in" or "retry". A palette failure other than auth only costs the
    /// custom colours.
    pub async fn fetch(&self, access_token: &str, days: u32) -> Result<CalendarEvents, InfraError> {
        let window = fetch_window((self.now_provider)(), self.timezone, days);

        let colors = match self.calendar_client.get_colors(access_token).await {
            Ok(palette) => Some(palette),
            Err(error) if error.requires_sign_in() => return Err(error),
            Err(error) => {
                tracing::warn!(%error, "calendar colour palette unavailable; using default colours");
                None
            }
        };

        let events = self.list_events_with_retry(access_token, window).await?;
        Ok(CalendarEvents {
            events: apply_display_colors(events, colors.as_ref()),
            colors,
        })
    }

    async fn list_events_with_retry(
        &self,
        access_token: &str,
        request: ListEventsRequest,
    ) -> Result<Vec<GoogleCalendarEvent>, InfraError> {
        let max_attempts = self.retry_policy.max_attempts.max(1);
        let mut attempt: u8 = 0;

        loop {
            match self
                .calendar_client
                .list_events(access_token, PRIMARY_CALENDAR_ID, request.clone())
                .await
            {
                Ok(events) => return Ok(events),
                Err(error) if should_retry(&error) && attempt + 1 < max_attempts => {
                    let delay = self
                        .retry_policy
                        .base_delay_ms
                        .saturating_mul(2u64.saturating_pow(u32::from(attempt)));
                    tracing::debug!(%error, attempt, delay_ms = delay, "retrying event listing");
                    sleep(TokioDuration::from_millis(delay)).await;
                    attempt = attempt.saturating_add(1);
                }
                Err(error) => return Err(error),
            }
        }
    }
}

fn should_retry(error: &InfraError) -> bool {
    matches!(error, InfraError::FetchTransient(_))
}

/// The fetch window in UTC, anchored on the local calendar day in `timezone`.
pub fn fetch_window(now: DateTime<Utc>, timezone: Tz, days: u32) -> ListEventsRequest {
    let today = now.with_timezone(&timezone).date_naive();
    let end_date = today
        .checked_add_days(Days::new(u64::from(days.max(1))))
        .unwrap_or(today);
    ListEventsRequest {
        time_min: start_of_day(timezone, today),
        time_max: start_of_day(timezone, end_date),
    }
}

// A zone may skip local midnight; the first hour that exists starts the day.
fn start_of_day(timezone: Tz, date: NaiveDate) -> DateTime<Utc> {
    (0..24)
        .find_map(|hour| {
            let local = date.and_hms_opt(hour, 0, 0)?;
            timezone.from_local_datetime(&local).earliest()
        })
        .map(|start| start.with_timezone(&Utc))
        .unwrap_or_else(|| date.and_time(chrono::NaiveTime::MIN).and_utc())
}
