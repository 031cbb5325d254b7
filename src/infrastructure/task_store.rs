use crate::domain::models::{AppSettings, ManualTask, Quadrant, Task, TaskStatus};
use crate::domain::reconciliation::sort_for_display;
use crate::infrastructure::error::InfraError;
use crate::infrastructure::storage::KeyValueStore;
use serde::Deserialize;
use std::sync::Arc;

pub const CALENDAR_TASKS_KEY: &str = "calendarTasks";
pub const MANUAL_TASKS_KEY: &str = "tasks";
pub const SETTINGS_KEY: &str = "appSettings";

/// Persistence seam for calendar tasks.
pub trait TaskStore: Send + Sync {
    /// Returns the stored tasks in display order. Absent or unreadable state is empty.
    fn load(&self) -> Vec<Task>;

    /// Rewrites every position to its index in `tasks`, then persists.
    fn store(&self, tasks: &[Task]) -> Result<(), InfraError>;
}

pub fn assign_positions(tasks: &[Task]) -> Vec<Task> {
    tasks
        .iter()
        .enumerate()
        .map(|(index, task)| Task {
            position: Some(i64::try_from(index).unwrap_or(i64::MAX)),
            ..task.clone()
        })
        .collect()
}

pub struct LocalTaskStore<K>
where
    K: KeyValueStore + ?Sized,
{
    kv: Arc<K>,
}

impl<K> LocalTaskStore<K>
where
    K: KeyValueStore + ?Sized,
{
    pub fn new(kv: Arc<K>) -> Self {
        Self { kv }
    }
}

impl<K> TaskStore for LocalTaskStore<K>
where
    K: KeyValueStore + ?Sized,
{
    fn load(&self) -> Vec<Task> {
        let Some(raw) = read_key(self.kv.as_ref(), CALENDAR_TASKS_KEY) else {
            return Vec::new();
        };
        let Some(entries) = parse_array(&raw, CALENDAR_TASKS_KEY) else {
            return Vec::new();
        };

        let mut tasks: Vec<Task> = entries
            .into_iter()
            .filter_map(|entry| match serde_json::from_value::<Task>(entry) {
                Ok(task) => Some(task),
                Err(error) => {
                    tracing::warn!(key = CALENDAR_TASKS_KEY, %error, "skipping unreadable stored task");
                    None
                }
            })
            .collect();
        sort_for_display(&mut tasks);
        tasks
    }

    fn store(&self, tasks: &[Task]) -> Result<(), InfraError> {
        write_json(self.kv.as_ref(), CALENDAR_TASKS_KEY, &assign_positions(tasks))
    }
}

#[derive(Debug, Deserialize)]
struct StoredManualTask {
    id: Option<String>,
    text: String,
    status: String,
    quadrant: Option<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedManualTasks {
    pub tasks: Vec<ManualTask>,
    /// Some entry was dropped, given an id, or given a quadrant while loading.
    pub repaired: bool,
}

/// The manual board (`tasks`) and app settings share the calendar task backend.
pub struct BoardStore<K>
where
    K: KeyValueStore + ?Sized,
{
    kv: Arc<K>,
}

impl<K> BoardStore<K>
where
    K: KeyValueStore + ?Sized,
{
    pub fn new(kv: Arc<K>) -> Self {
        Self { kv }
    }

    /// Loads manual tasks, repairing legacy entries: a missing id is generated
    /// from `id_seed`, a missing or invalid quadrant becomes 4, and entries with
    /// an unknown status are dropped.
    pub fn load_manual_tasks(&self, id_seed: i64) -> LoadedManualTasks {
        let empty = LoadedManualTasks {
            tasks: Vec::new(),
            repaired: false,
        };
        let Some(raw) = read_key(self.kv.as_ref(), MANUAL_TASKS_KEY) else {
            return empty;
        };
        let Some(entries) = parse_array(&raw, MANUAL_TASKS_KEY) else {
            return empty;
        };

        let total = entries.len();
        let mut repaired = false;
        let tasks: Vec<ManualTask> = entries
            .into_iter()
            .enumerate()
            .filter_map(|(index, entry)| {
                let stored = match serde_json::from_value::<StoredManualTask>(entry) {
                    Ok(stored) => stored,
                    Err(error) => {
                        tracing::warn!(key = MANUAL_TASKS_KEY, %error, "skipping unreadable manual task");
                        return None;
                    }
                };
                let status = match TaskStatus::parse(&stored.status) {
                    Ok(status) => status,
                    Err(error) => {
                        tracing::warn!(key = MANUAL_TASKS_KEY, %error, "skipping manual task");
                        return None;
                    }
                };
                let id = match stored
                    .id
                    .map(|value| value.trim().to_string())
                    .filter(|value| !value.is_empty())
                {
                    Some(id) => id,
                    None => {
                        repaired = true;
                        format!("task-{id_seed}-{index}")
                    }
                };
                let quadrant = match stored.quadrant.and_then(|value| Quadrant::new(value).ok()) {
                    Some(quadrant) => quadrant,
                    None => {
                        repaired = true;
                        Quadrant::default()
                    }
                };
                Some(ManualTask {
                    id,
                    text: stored.text,
                    status,
                    quadrant,
                })
            })
            .collect();

        LoadedManualTasks {
            repaired: repaired || tasks.len() != total,
            tasks,
        }
    }

    pub fn store_manual_tasks(&self, tasks: &[ManualTask]) -> Result<(), InfraError> {
        write_json(self.kv.as_ref(), MANUAL_TASKS_KEY, tasks)
    }

    pub fn clear_manual_tasks(&self) -> Result<(), InfraError> {
        self.kv
            .remove(MANUAL_TASKS_KEY)
            .map_err(|error| InfraError::StorageFailed(error.to_string()))
    }

    pub fn load_settings(&self) -> AppSettings {
        read_key(self.kv.as_ref(), SETTINGS_KEY)
            .and_then(|raw| match serde_json::from_str::<AppSettings>(&raw) {
                Ok(settings) => Some(settings),
                Err(error) => {
                    tracing::warn!(key = SETTINGS_KEY, %error, "stored settings unreadable; using defaults");
                    None
                }
            })
            .unwrap_or_default()
    }

    pub fn store_settings(&self, settings: &AppSettings) -> Result<(), InfraError> {
        write_json(self.kv.as_ref(), SETTINGS_KEY, settings)
    }
}

fn read_key<K: KeyValueStore + ?Sized>(kv: &K, key: &str) -> Option<String> {
    match kv.get(key) {
        Ok(value) => value,
        Err(error) => {
            tracing::warn!(key, %error, "failed reading stored state; treating as empty");
            None
        }
    }
}

fn parse_array(raw: &str, key: &str) -> Option<Vec<serde_json::Value>> {
    match serde_json::from_str::<Vec<serde_json::Value>>(raw) {
        Ok(entries) => Some(entries),
        Err(error) => {
            tracing::warn!(key, %error, "stored state is corrupt; treating as empty");
            None
        }
    }
}

fn write_json<K, T>(kv: &K, key: &str, value: &T) -> Result<(), InfraError>
where
    K: KeyValueStore + ?Sized,
    T: serde::Serialize + ?Sized,
{
    let payload = serde_json::to_string(value)
        .map_err(|error| InfraError::StorageFailed(format!("serializing {key}: {error}")))?;
    kv.set(key, &payload)
        .map_err(|error| InfraError::StorageFailed(format!("writing {key}: {error}")))
}
