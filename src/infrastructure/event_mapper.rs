use crate::domain::models::{
    CALENDAR_TASK_ID_PREFIX, PRIMARY_CALENDAR_ID, Task, TaskStatus,
};
use std::collections::HashMap;

pub const DEFAULT_BACKGROUND_COLOR: &str = "#265073";
pub const DEFAULT_FOREGROUND_COLOR: &str = "#FFFFFF";

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq, Default)]
pub struct CalendarEventDateTime {
    #[serde(rename = "dateTime", default, skip_serializing_if = "Option::is_none")]
    pub date_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(rename = "timeZone", default, skip_serializing_if = "Option::is_none")]
    pub time_zone: Option<String>,
}

/// Event as listed by the provider, optionally annotated with display colours.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct GoogleCalendarEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default)]
    pub start: CalendarEventDateTime,
    #[serde(default)]
    pub end: CalendarEventDateTime,
    #[serde(rename = "colorId", default, skip_serializing_if = "Option::is_none")]
    pub color_id: Option<String>,
    #[serde(rename = "backgroundColor", default, skip_serializing_if = "Option::is_none")]
    pub background_color: Option<String>,
    #[serde(rename = "foregroundColor", default, skip_serializing_if = "Option::is_none")]
    pub foreground_color: Option<String>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct ColorDefinition {
    pub background: String,
    pub foreground: String,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq, Default)]
pub struct ColorPalette {
    #[serde(default)]
    pub calendar: HashMap<String, ColorDefinition>,
    #[serde(default)]
    pub event: HashMap<String, ColorDefinition>,
}

/// Annotates each event with the palette colours for its `colorId`, falling
/// back to the brand pair when the id is absent or unknown.
pub fn apply_display_colors(
    events: Vec<GoogleCalendarEvent>,
    palette: Option<&ColorPalette>,
) -> Vec<GoogleCalendarEvent> {
    events
        .into_iter()
        .map(|mut event| {
            let resolved = event
                .color_id
                .as_deref()
                .and_then(|color_id| palette.and_then(|palette| palette.event.get(color_id.trim())));
            event.background_color = Some(
                resolved
                    .map(|color| color.background.clone())
                    .unwrap_or_else(|| DEFAULT_BACKGROUND_COLOR.to_string()),
            );
            event.foreground_color = Some(
                resolved
                    .map(|color| color.foreground.clone())
                    .unwrap_or_else(|| DEFAULT_FOREGROUND_COLOR.to_string()),
            );
            event
        })
        .collect()
}

/// Builds the board draft for one event.
///
/// `stored` is the current calendar task list; an entry with the same event id
/// donates its status, `last_updated` and position. Events without an id have
/// no stable task identity and yield `None`.
pub fn convert_event_to_task(
    event: &GoogleCalendarEvent,
    stored: &[Task],
    now_ms: i64,
) -> Option<Task> {
    let event_id = event
        .id
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())?;
    let existing = stored
        .iter()
        .find(|task| task.event_id.as_deref() == Some(event_id));

    Some(Task {
        id: format!("{CALENDAR_TASK_ID_PREFIX}{event_id}"),
        text: event.summary.clone().unwrap_or_default(),
        status: existing.map(|task| task.status).unwrap_or(TaskStatus::ToDo),
        due_date: event.end.date_time.clone(),
        event_id: Some(event_id.to_string()),
        calendar_id: Some(PRIMARY_CALENDAR_ID.to_string()),
        background_color: event.background_color.clone(),
        foreground_color: event.foreground_color.clone(),
        last_updated: existing
            .and_then(|task| task.last_updated)
            .or(Some(now_ms)),
        position: existing.and_then(|task| task.position),
    })
}
