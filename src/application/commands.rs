use crate::application::board::BoardService;
use crate::application::bootstrap::bootstrap_workspace;
use crate::application::calendar_fetch::{CalendarEventFetcher, CalendarEvents, NowProvider, RetryPolicy};
use crate::application::calendar_sync::{CalendarSyncService, SyncOutcome, SyncReport};
use crate::application::oauth::{OAuthConfig, TokenRefreshManager, project_session};
use crate::domain::models::{AppSettings, ManualTask, Quadrant, Session, Task, TaskStatus};
use crate::infrastructure::config::{AppConfig, parse_sync_days};
use crate::infrastructure::credential_store::{CredentialStore, KeyValueCredentialStore};
use crate::infrastructure::error::InfraError;
use crate::infrastructure::google_calendar_client::{GoogleCalendarClient, ReqwestGoogleCalendarClient};
use crate::infrastructure::oauth_client::{OAuthHttpClient, ReqwestOAuthClient};
use crate::infrastructure::storage::{KeyValueStore, SqliteKeyValueStore};
use crate::infrastructure::task_store::LocalTaskStore;
use chrono::Utc;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

fn next_id(prefix: &str) -> String {
    let sequence = NEXT_ID.fetch_add(1, Ordering::Relaxed);
    format!("{prefix}-{}-{sequence}", Utc::now().timestamp_micros())
}

type DynTokenManager = TokenRefreshManager<dyn CredentialStore, dyn OAuthHttpClient>;
type DynTaskStore = LocalTaskStore<dyn KeyValueStore>;

/// Collaborators behind every command; production wires reqwest and SQLite.
pub struct AppServices {
    pub credential_store: Arc<dyn CredentialStore>,
    pub oauth_client: Arc<dyn OAuthHttpClient>,
    pub calendar_client: Arc<dyn GoogleCalendarClient>,
    pub kv: Arc<dyn KeyValueStore>,
    pub retry_policy: RetryPolicy,
    pub now_provider: NowProvider,
}

pub struct AppState {
    config: AppConfig,
    credential_store: Arc<dyn CredentialStore>,
    oauth_client: Arc<dyn OAuthHttpClient>,
    fetcher: Arc<CalendarEventFetcher<dyn GoogleCalendarClient>>,
    sync_service: CalendarSyncService<dyn GoogleCalendarClient, DynTaskStore>,
    board: BoardService<dyn KeyValueStore, DynTaskStore>,
    pending_oauth_state: Mutex<Option<String>>,
    now_provider: NowProvider,
}

impl AppState {
    pub fn new(config: AppConfig) -> Result<Self, InfraError> {
        let bootstrap = bootstrap_workspace(&config.workspace_root)?;
        let kv: Arc<dyn KeyValueStore> = Arc::new(SqliteKeyValueStore::new(&bootstrap.database_path));
        let services = AppServices {
            credential_store: Arc::new(KeyValueCredentialStore::new(Arc::clone(&kv))),
            oauth_client: Arc::new(ReqwestOAuthClient::new()),
            calendar_client: Arc::new(ReqwestGoogleCalendarClient::new()),
            kv,
            retry_policy: RetryPolicy::default(),
            now_provider: Arc::new(Utc::now),
        };
        Ok(Self::with_services(config, services))
    }

    pub fn with_services(config: AppConfig, services: AppServices) -> Self {
        let task_store: Arc<DynTaskStore> = Arc::new(LocalTaskStore::new(Arc::clone(&services.kv)));
        let fetcher = Arc::new(
            CalendarEventFetcher::new(services.calendar_client, config.timezone)
                .with_retry_policy(services.retry_policy)
                .with_now_provider(Arc::clone(&services.now_provider)),
        );
        let sync_service = CalendarSyncService::new(Arc::clone(&fetcher), Arc::clone(&task_store))
            .with_now_provider(Arc::clone(&services.now_provider));
        let board = BoardService::new(services.kv, task_store)
            .with_now_provider(Arc::clone(&services.now_provider));

        Self {
            config,
            credential_store: services.credential_store,
            oauth_client: services.oauth_client,
            fetcher,
            sync_service,
            board,
            pending_oauth_state: Mutex::new(None),
            now_provider: services.now_provider,
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn is_syncing(&self) -> bool {
        self.sync_service.is_syncing()
    }

    pub fn log_info(&self, command: &str, message: &str) {
        tracing::info!(command, "{message}");
    }

    pub fn log_error(&self, command: &str, error: &InfraError) {
        tracing::error!(command, kind = error.kind(), "{error}");
    }

    pub fn command_error(&self, command: &str, error: InfraError) -> InfraError {
        self.log_error(command, &error);
        error
    }

    fn token_manager(&self) -> Result<DynTokenManager, InfraError> {
        let oauth_config = OAuthConfig::from_app_config(&self.config)?;
        Ok(TokenRefreshManager::new(
            oauth_config,
            Arc::clone(&self.credential_store),
            Arc::clone(&self.oauth_client),
        )
        .with_now_provider(Arc::clone(&self.now_provider)))
    }

    fn remember_oauth_state(&self, value: &str) -> Result<(), InfraError> {
        let mut guard = self
            .pending_oauth_state
            .lock()
            .map_err(|error| InfraError::OAuth(format!("oauth state lock poisoned: {error}")))?;
        *guard = Some(value.to_string());
        Ok(())
    }

    fn take_oauth_state(&self) -> Result<Option<String>, InfraError> {
        let mut guard = self
            .pending_oauth_state
            .lock()
            .map_err(|error| InfraError::OAuth(format!("oauth state lock poisoned: {error}")))?;
        Ok(guard.take())
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub is_authenticated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session: Option<Session>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizeResponse {
    pub authorization_url: String,
    pub state: String,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    Completed,
    Skipped,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SyncCalendarResponse {
    pub status: SyncStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<SyncReport>,
}

pub async fn get_session_impl(state: &AppState) -> Result<SessionResponse, InfraError> {
    let manager = match state.token_manager() {
        Ok(manager) => manager,
        Err(InfraError::InvalidConfig(_)) => {
            return Ok(SessionResponse {
                is_authenticated: false,
                session: None,
            });
        }
        Err(error) => return Err(error),
    };

    let session = manager.current_session().await?;
    Ok(SessionResponse {
        is_authenticated: session.is_some(),
        session,
    })
}

pub fn authorize_url_impl(state: &AppState) -> Result<AuthorizeResponse, InfraError> {
    let manager = state.token_manager()?;
    let oauth_state = next_id("oauth-state");
    let authorization_url = manager.build_authorization_url(&oauth_state)?;
    state.remember_oauth_state(&oauth_state)?;
    state.log_info("authorize_url", "issued google consent url");
    Ok(AuthorizeResponse {
        authorization_url,
        state: oauth_state,
    })
}

pub async fn complete_sign_in_impl(
    state: &AppState,
    authorization_code: String,
    oauth_state: Option<String>,
) -> Result<SessionResponse, InfraError> {
    let code = authorization_code.trim();
    if code.is_empty() {
        return Err(InfraError::InvalidConfig(
            "authorization code must not be empty".to_string(),
        ));
    }
    let manager = state.token_manager()?;

    // The issued state is single use, consumed whether or not it matches.
    let expected = state.take_oauth_state()?;
    let received = oauth_state.as_deref().map(str::trim).filter(|value| !value.is_empty());
    if received.is_none() || expected.as_deref() != received {
        return Err(InfraError::OAuth("oauth state mismatch".to_string()));
    }

    let token = manager.authenticate_with_code(code).await?;
    state.log_info("complete_sign_in", "exchanged authorization code and stored token");
    Ok(SessionResponse {
        is_authenticated: true,
        session: Some(project_session(&token)),
    })
}

pub fn sign_out_impl(state: &AppState) -> Result<(), InfraError> {
    state.credential_store.delete_token()?;
    state.log_info("sign_out", "deleted stored token");
    Ok(())
}

fn resolve_days(state: &AppState, days: Option<String>) -> Result<u32, InfraError> {
    match days.as_deref().map(str::trim).filter(|value| !value.is_empty()) {
        Some(raw) => parse_sync_days(raw),
        None => Ok(state.config.sync_days),
    }
}

pub async fn list_calendar_events_impl(
    state: &AppState,
    days: Option<String>,
) -> Result<CalendarEvents, InfraError> {
    let days = resolve_days(state, days)?;
    let access_token = state.token_manager()?.require_access_token().await?;
    let events = state.fetcher.fetch(&access_token, days).await?;
    state.log_info(
        "list_calendar_events",
        &format!("listed events days={days} count={}", events.events.len()),
    );
    Ok(events)
}

pub async fn sync_calendar_impl(
    state: &AppState,
    days: Option<String>,
) -> Result<SyncCalendarResponse, InfraError> {
    let days = resolve_days(state, days)?;
    let outcome = state
        .sync_service
        .sync_with(
            || async { Ok::<_, InfraError>(state.token_manager()?.require_access_token().await?) },
            days,
        )
        .await?;
    match outcome {
        SyncOutcome::Completed(report) => {
            state.log_info(
                "sync_calendar",
                &format!(
                    "synchronized days={days} fetched={} added={} protected={} persisted={}",
                    report.fetched_events, report.added, report.protected, report.persisted
                ),
            );
            Ok(SyncCalendarResponse {
                status: SyncStatus::Completed,
                report: Some(report),
            })
        }
        SyncOutcome::Skipped => {
            state.log_info("sync_calendar", "sync already in progress; request dropped");
            Ok(SyncCalendarResponse {
                status: SyncStatus::Skipped,
                report: None,
            })
        }
    }
}

pub fn list_calendar_tasks_impl(state: &AppState) -> Vec<Task> {
    state.board.list_calendar_tasks()
}

pub fn move_calendar_task_impl(
    state: &AppState,
    task_id: String,
    status: String,
    index: usize,
) -> Result<Vec<Task>, InfraError> {
    let task_id = required_id(&task_id)?;
    let status = parse_task_status(&status)?;
    let tasks = state.board.move_calendar_task(task_id, status, index)?;
    state.log_info(
        "move_calendar_task",
        &format!("moved task_id={task_id} status={} index={index}", status.as_str()),
    );
    Ok(tasks)
}

pub fn list_tasks_impl(state: &AppState) -> Result<Vec<ManualTask>, InfraError> {
    state.board.list_manual_tasks()
}

pub fn add_task_impl(state: &AppState, text: String) -> Result<ManualTask, InfraError> {
    let task = state.board.add_manual_task(&text)?;
    state.log_info("add_task", &format!("created task_id={}", task.id));
    Ok(task)
}

pub fn move_task_impl(
    state: &AppState,
    task_id: String,
    status: String,
    index: usize,
) -> Result<Vec<ManualTask>, InfraError> {
    let task_id = required_id(&task_id)?;
    let status = parse_task_status(&status)?;
    let tasks = state.board.move_manual_task(task_id, status, index)?;
    state.log_info(
        "move_task",
        &format!("moved task_id={task_id} status={} index={index}", status.as_str()),
    );
    Ok(tasks)
}

pub fn set_task_quadrant_impl(
    state: &AppState,
    task_id: String,
    quadrant: u8,
) -> Result<ManualTask, InfraError> {
    let task_id = required_id(&task_id)?;
    let quadrant = Quadrant::new(quadrant).map_err(InfraError::InvalidConfig)?;
    let task = state.board.set_quadrant(task_id, quadrant)?;
    state.log_info(
        "set_task_quadrant",
        &format!("task_id={task_id} quadrant={}", quadrant.value()),
    );
    Ok(task)
}

pub fn delete_task_impl(state: &AppState, task_id: String) -> Result<bool, InfraError> {
    let task_id = required_id(&task_id)?;
    let removed = state.board.delete_manual_task(task_id)?;
    if removed {
        state.log_info("delete_task", &format!("deleted task_id={task_id}"));
    }
    Ok(removed)
}

pub fn clear_done_tasks_impl(state: &AppState) -> Result<usize, InfraError> {
    let removed = state.board.clear_done_tasks()?;
    state.log_info("clear_done_tasks", &format!("removed={removed}"));
    Ok(removed)
}

pub fn clear_all_tasks_impl(state: &AppState) -> Result<(), InfraError> {
    state.board.clear_all_tasks()?;
    state.log_info("clear_all_tasks", "cleared manual board");
    Ok(())
}

pub fn reset_tasks_impl(state: &AppState) -> Result<Vec<ManualTask>, InfraError> {
    let tasks = state.board.reset_all_tasks()?;
    state.log_info("reset_tasks", &format!("reset count={}", tasks.len()));
    Ok(tasks)
}

pub fn get_settings_impl(state: &AppState) -> AppSettings {
    state.board.settings()
}

pub fn update_settings_impl(state: &AppState, settings: AppSettings) -> Result<AppSettings, InfraError> {
    let settings = state.board.update_settings(settings)?;
    state.log_info("update_settings", &format!("mode={:?}", settings.mode));
    Ok(settings)
}

pub fn toggle_mode_impl(state: &AppState) -> Result<AppSettings, InfraError> {
    let settings = state.board.toggle_mode()?;
    state.log_info("toggle_mode", &format!("mode={:?}", settings.mode));
    Ok(settings)
}

fn required_id(task_id: &str) -> Result<&str, InfraError> {
    let task_id = task_id.trim();
    if task_id.is_empty() {
        return Err(InfraError::InvalidConfig(
            "task_id must not be empty".to_string(),
        ));
    }
    Ok(task_id)
}

fn parse_task_status(value: &str) -> Result<TaskStatus, InfraError> {
    TaskStatus::parse(value).map_err(InfraError::InvalidConfig)
}
