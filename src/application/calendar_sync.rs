use crate::application::calendar_fetch::{CalendarEventFetcher, NowProvider};
use crate::domain::models::Task;
use crate::domain::reconciliation::{is_recently_edited, merge_tasks, sort_for_display};
use crate::infrastructure::error::InfraError;
use crate::infrastructure::event_mapper::convert_event_to_task;
use crate::infrastructure::google_calendar_client::GoogleCalendarClient;
use crate::infrastructure::task_store::{TaskStore, assign_positions};
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub fetched_events: usize,
    pub added: usize,
    /// Matched tasks left untouched because they were edited within the recency window.
    pub protected: usize,
    pub persisted: bool,
    pub tasks: Vec<Task>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    Completed(SyncReport),
    /// Another sync was already running; this request was dropped.
    Skipped,
}

pub struct CalendarSyncService<C, T>
where
    C: GoogleCalendarClient + ?Sized,
    T: TaskStore + ?Sized,
{
    fetcher: Arc<CalendarEventFetcher<C>>,
    task_store: Arc<T>,
    in_progress: AtomicBool,
    now_provider: NowProvider,
}

struct InProgressGuard<'a>(&'a AtomicBool);

impl<'a> InProgressGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for InProgressGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl<C, T> CalendarSyncService<C, T>
where
    C: GoogleCalendarClient + ?Sized,
    T: TaskStore + ?Sized,
{
    pub fn new(fetcher: Arc<CalendarEventFetcher<C>>, task_store: Arc<T>) -> Self {
        Self {
            fetcher,
            task_store,
            in_progress: AtomicBool::new(false),
            now_provider: Arc::new(Utc::now),
        }
    }

    pub fn with_now_provider(mut self, now_provider: NowProvider) -> Self {
        self.now_provider = now_provider;
        self
    }

    pub fn is_syncing(&self) -> bool {
        self.in_progress.load(Ordering::Acquire)
    }

    pub async fn sync(&self, access_token: &str, days: u32) -> Result<SyncOutcome, InfraError> {
        let access_token = access_token.to_string();
        self.sync_with(move || async move { Ok(access_token) }, days)
            .await
    }

    /// Claims the in-progress flag, then resolves the access token, fetches
    /// the window, converts events against the stored board, merges and
    /// stores. A dropped request never calls `access_token`. A failed write
    /// is logged and the merged board is still returned.
    pub async fn sync_with<F, Fut>(&self, access_token: F, days: u32) -> Result<SyncOutcome, InfraError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<String, InfraError>>,
    {
        let Some(_guard) = InProgressGuard::acquire(&self.in_progress) else {
            tracing::info!("calendar sync already in progress; dropping request");
            return Ok(SyncOutcome::Skipped);
        };

        let access_token = access_token().await?;
        let fetched = self.fetcher.fetch(&access_token, days).await?;
        let now_ms = (self.now_provider)().timestamp_millis();
        let existing = self.task_store.load();

        let incoming: Vec<Task> = fetched
            .events
            .iter()
            .filter_map(|event| convert_event_to_task(event, &existing, now_ms))
            .collect();
        let protected = incoming
            .iter()
            .filter(|draft| {
                existing.iter().any(|task| {
                    task.event_id.is_some()
                        && task.event_id == draft.event_id
                        && is_recently_edited(task, now_ms)
                })
            })
            .count();

        let merged = merge_tasks(&existing, &incoming, now_ms);
        let added = merged.len().saturating_sub(existing.len());
        let persisted = match self.task_store.store(&merged) {
            Ok(()) => true,
            Err(error) => {
                tracing::warn!(%error, "calendar tasks not persisted; keeping merged board in memory");
                false
            }
        };

        let mut tasks = assign_positions(&merged);
        sort_for_display(&mut tasks);
        Ok(SyncOutcome::Completed(SyncReport {
            fetched_events: fetched.events.len(),
            added,
            protected,
            persisted,
            tasks,
        }))
    }
}
