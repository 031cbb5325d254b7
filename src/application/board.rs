use crate::application::calendar_fetch::NowProvider;
use crate::domain::models::{AppMode, AppSettings, ManualTask, Quadrant, Task, TaskStatus};
use crate::infrastructure::error::InfraError;
use crate::infrastructure::storage::KeyValueStore;
use crate::infrastructure::task_store::{BoardStore, TaskStore, assign_positions};
use chrono::Utc;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_TASK_SEQUENCE: AtomicU64 = AtomicU64::new(1);

/// Board editing for both the manual `tasks` list and the calendar task list.
pub struct BoardService<K, T>
where
    K: KeyValueStore + ?Sized,
    T: TaskStore + ?Sized,
{
    board_store: BoardStore<K>,
    task_store: Arc<T>,
    now_provider: NowProvider,
}

impl<K, T> BoardService<K, T>
where
    K: KeyValueStore + ?Sized,
    T: TaskStore + ?Sized,
{
    pub fn new(kv: Arc<K>, task_store: Arc<T>) -> Self {
        Self {
            board_store: BoardStore::new(kv),
            task_store,
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

    /// Manual tasks grouped by column. Legacy entries repaired on load are
    /// written back so generated ids stay stable.
    pub fn list_manual_tasks(&self) -> Result<Vec<ManualTask>, InfraError> {
        let loaded = self.board_store.load_manual_tasks(self.now_ms());
        let tasks = group_by_status(loaded.tasks);
        if loaded.repaired {
            self.board_store.store_manual_tasks(&tasks)?;
        }
        Ok(tasks)
    }

    pub fn add_manual_task(&self, text: &str) -> Result<ManualTask, InfraError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(InfraError::InvalidConfig("task text must not be empty".to_string()));
        }

        let task = ManualTask {
            id: next_task_id(self.now_ms()),
            text: text.to_string(),
            status: TaskStatus::ToDo,
            quadrant: Quadrant::default(),
        };
        let mut tasks = self.list_manual_tasks()?;
        tasks.push(task.clone());
        self.board_store
            .store_manual_tasks(&group_by_status(tasks))?;
        Ok(task)
    }

    /// Moves a manual task to `index` within the `status` column.
    pub fn move_manual_task(
        &self,
        task_id: &str,
        status: TaskStatus,
        index: usize,
    ) -> Result<Vec<ManualTask>, InfraError> {
        let tasks = self.list_manual_tasks()?;
        let tasks = move_within_columns(tasks, task_id, status, index, |task, status| {
            task.status = status;
        })?;
        self.board_store.store_manual_tasks(&tasks)?;
        Ok(tasks)
    }

    pub fn set_quadrant(&self, task_id: &str, quadrant: Quadrant) -> Result<ManualTask, InfraError> {
        let mut tasks = self.list_manual_tasks()?;
        let task = tasks
            .iter_mut()
            .find(|task| task.id == task_id.trim())
            .ok_or_else(|| InfraError::InvalidConfig(format!("task not found: {}", task_id.trim())))?;
        task.quadrant = quadrant;
        let updated = task.clone();
        self.board_store.store_manual_tasks(&tasks)?;
        Ok(updated)
    }

    pub fn delete_manual_task(&self, task_id: &str) -> Result<bool, InfraError> {
        let mut tasks = self.list_manual_tasks()?;
        let before = tasks.len();
        tasks.retain(|task| task.id != task_id.trim());
        if tasks.len() == before {
            return Ok(false);
        }
        self.board_store.store_manual_tasks(&tasks)?;
        Ok(true)
    }

    /// Removes every task in the Done column; returns how many were removed.
    pub fn clear_done_tasks(&self) -> Result<usize, InfraError> {
        let mut tasks = self.list_manual_tasks()?;
        let before = tasks.len();
        tasks.retain(|task| task.status != TaskStatus::Done);
        self.board_store.store_manual_tasks(&tasks)?;
        Ok(before - tasks.len())
    }

    pub fn clear_all_tasks(&self) -> Result<(), InfraError> {
        self.board_store.clear_manual_tasks()
    }

    /// Moves every manual task back to To_Do, keeping board order.
    pub fn reset_all_tasks(&self) -> Result<Vec<ManualTask>, InfraError> {
        let mut tasks = self.list_manual_tasks()?;
        for task in &mut tasks {
            task.status = TaskStatus::ToDo;
        }
        self.board_store.store_manual_tasks(&tasks)?;
        Ok(tasks)
    }

    pub fn list_calendar_tasks(&self) -> Vec<Task> {
        self.task_store.load()
    }

    /// Drag of a calendar task. The move stamps `last_updated`, which is what
    /// shields it from the next sync for the recency window.
    pub fn move_calendar_task(
        &self,
        task_id: &str,
        status: TaskStatus,
        index: usize,
    ) -> Result<Vec<Task>, InfraError> {
        let now_ms = self.now_ms();
        let tasks = self.task_store.load();
        let tasks = move_within_columns(tasks, task_id, status, index, |task, status| {
            task.status = status;
            task.last_updated = Some(now_ms);
        })?;
        self.task_store.store(&tasks)?;
        Ok(assign_positions(&tasks))
    }

    pub fn settings(&self) -> AppSettings {
        self.board_store.load_settings()
    }

    pub fn update_settings(&self, settings: AppSettings) -> Result<AppSettings, InfraError> {
        self.board_store.store_settings(&settings)?;
        Ok(settings)
    }

    pub fn set_mode(&self, mode: AppMode) -> Result<AppSettings, InfraError> {
        let settings = AppSettings {
            mode,
            ..self.settings()
        };
        self.update_settings(settings)
    }

    pub fn toggle_mode(&self) -> Result<AppSettings, InfraError> {
        let current = self.settings();
        self.set_mode(current.mode.toggled())
    }
}

fn next_task_id(now_ms: i64) -> String {
    let sequence = NEXT_TASK_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    format!("task-{now_ms}-{sequence}")
}

trait BoardEntry {
    fn id(&self) -> &str;
    fn status(&self) -> TaskStatus;
}

impl BoardEntry for ManualTask {
    fn id(&self) -> &str {
        &self.id
    }

    fn status(&self) -> TaskStatus {
        self.status
    }
}

impl BoardEntry for Task {
    fn id(&self) -> &str {
        &self.id
    }

    fn status(&self) -> TaskStatus {
        self.status
    }
}

/// Stable regrouping into To_Do, Doing, Done order.
fn group_by_status<E: BoardEntry>(mut items: Vec<E>) -> Vec<E> {
    items.sort_by_key(|item| item.status().rank());
    items
}

fn move_within_columns<E: BoardEntry>(
    items: Vec<E>,
    item_id: &str,
    status: TaskStatus,
    index: usize,
    mut relocate: impl FnMut(&mut E, TaskStatus),
) -> Result<Vec<E>, InfraError> {
    let item_id = item_id.trim();
    let mut columns: [Vec<E>; 3] = [Vec::new(), Vec::new(), Vec::new()];
    let mut moved = None;
    for item in items {
        if moved.is_none() && item.id() == item_id {
            moved = Some(item);
        } else {
            columns[usize::from(item.status().rank())].push(item);
        }
    }

    let mut item = moved.ok_or_else(|| InfraError::InvalidConfig(format!("task not found: {item_id}")))?;
    relocate(&mut item, status);
    let column = &mut columns[usize::from(status.rank())];
    column.insert(index.min(column.len()), item);

    Ok(columns.into_iter().flatten().collect())
}
