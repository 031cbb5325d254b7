use crate::domain::models::Task;
use chrono::DateTime;
use std::cmp::Ordering;

/// Local edits younger than this are never overwritten by a sync.
pub const RECENCY_THRESHOLD_MS: i64 = 2 * 60 * 60 * 1000;

/// Merges freshly converted calendar drafts into the stored task list.
///
/// Every existing entry is kept in place. An incoming draft whose event is
/// unknown is appended with `position` set to the list length at that moment.
/// A known event refreshes its content (text, due date, colours) only when the
/// stored entry has no `last_updated` or was last touched more than
/// [`RECENCY_THRESHOLD_MS`] before `now_ms`; status, position and
/// `last_updated` always stay with the stored entry.
///
/// Drafts without an `event_id` are not calendar drafts and are skipped.
pub fn merge_tasks(existing: &[Task], incoming: &[Task], now_ms: i64) -> Vec<Task> {
    let mut merged = existing.to_vec();

    for draft in incoming {
        let Some(event_id) = draft.event_id.as_deref() else {
            continue;
        };

        let found = merged
            .iter()
            .position(|task| task.event_id.as_deref() == Some(event_id));

        match found {
            None => {
                let position = i64::try_from(merged.len()).unwrap_or(i64::MAX);
                merged.push(Task {
                    position: Some(position),
                    ..draft.clone()
                });
            }
            Some(index) => {
                let current = &mut merged[index];
                if is_recently_edited(current, now_ms) {
                    continue;
                }
                *current = Task {
                    status: current.status,
                    position: current.position,
                    last_updated: current.last_updated,
                    ..draft.clone()
                };
            }
        }
    }

    merged
}

pub fn is_recently_edited(task: &Task, now_ms: i64) -> bool {
    match task.last_updated {
        Some(last_updated) => now_ms.saturating_sub(last_updated) <= RECENCY_THRESHOLD_MS,
        None => false,
    }
}

/// Board display order: status column, then position, then due date.
///
/// Entries with a position sort ahead of entries without one inside the same
/// column so the comparison stays a total order for mixed legacy data.
pub fn compare_for_display(left: &Task, right: &Task) -> Ordering {
    left.status
        .rank()
        .cmp(&right.status.rank())
        .then_with(|| match (left.position, right.position) {
            (Some(a), Some(b)) => a.cmp(&b),
            // Falling through to due dates here would make the order intransitive.
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        })
        .then_with(|| compare_due_dates(left, right))
}

pub fn sort_for_display(tasks: &mut [Task]) {
    tasks.sort_by(compare_for_display);
}

fn compare_due_dates(left: &Task, right: &Task) -> Ordering {
    match (due_date_millis(left), due_date_millis(right)) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

fn due_date_millis(task: &Task) -> Option<i64> {
    task.due_date
        .as_deref()
        .and_then(|value| DateTime::parse_from_rfc3339(value.trim()).ok())
        .map(|value| value.timestamp_millis())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::TaskStatus;
    use proptest::prelude::*;

    const NOW: i64 = 1_771_200_000_000;
    const MINUTE: i64 = 60 * 1000;
    const HOUR: i64 = 60 * MINUTE;

    fn calendar_task(event_id: &str, text: &str) -> Task {
        Task {
            id: format!("cal_{event_id}"),
            text: text.to_string(),
            status: TaskStatus::ToDo,
            due_date: Some("2026-02-16T10:00:00Z".to_string()),
            event_id: Some(event_id.to_string()),
            calendar_id: Some("primary".to_string()),
            background_color: None,
            foreground_color: None,
            last_updated: None,
            position: None,
        }
    }

    fn manual_task(id: &str, text: &str, status: TaskStatus) -> Task {
        Task {
            id: id.to_string(),
            text: text.to_string(),
            status,
            due_date: None,
            event_id: None,
            calendar_id: None,
            background_color: None,
            foreground_color: None,
            last_updated: None,
            position: None,
        }
    }

    #[test]
    fn stale_entry_takes_new_content_but_keeps_status() {
        let mut existing = calendar_task("e1", "Old title");
        existing.status = TaskStatus::Doing;
        existing.position = Some(0);
        existing.last_updated = Some(NOW - 3 * HOUR);

        let incoming = calendar_task("e1", "Updated title");
        let merged = merge_tasks(&[existing], &[incoming], NOW);

        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].text, "Updated title");
        assert_eq!(merged[0].status, TaskStatus::Doing);
        assert_eq!(merged[0].position, Some(0));
        assert_eq!(merged[0].last_updated, Some(NOW - 3 * HOUR));
    }

    #[test]
    fn recent_edit_is_left_untouched() {
        let mut existing = calendar_task("e1", "Original");
        existing.last_updated = Some(NOW - MINUTE);
        existing.status = TaskStatus::Doing;

        let merged = merge_tasks(&[existing.clone()], &[calendar_task("e1", "Renamed")], NOW);
        assert_eq!(merged, vec![existing]);
    }

    #[test]
    fn entry_without_last_updated_is_refreshed() {
        let existing = calendar_task("e1", "Original");
        let merged = merge_tasks(&[existing], &[calendar_task("e1", "Renamed")], NOW);
        assert_eq!(merged[0].text, "Renamed");
    }

    #[test]
    fn threshold_boundary_still_protects() {
        let mut existing = calendar_task("e1", "Original");
        existing.last_updated = Some(NOW - RECENCY_THRESHOLD_MS);
        let merged = merge_tasks(&[existing], &[calendar_task("e1", "Renamed")], NOW);
        assert_eq!(merged[0].text, "Original");
    }

    #[test]
    fn unseen_event_is_appended_with_position() {
        let existing = vec![
            manual_task("task-1", "Laundry", TaskStatus::ToDo),
            calendar_task("e1", "Standup"),
        ];
        let merged = merge_tasks(&existing, &[calendar_task("e2", "Review")], NOW);

        assert_eq!(merged.len(), 3);
        assert_eq!(merged[2].event_id.as_deref(), Some("e2"));
        assert_eq!(merged[2].position, Some(2));
    }

    #[test]
    fn events_missing_from_fetch_are_not_purged() {
        let existing = vec![calendar_task("gone", "Yesterday's meeting")];
        let merged = merge_tasks(&existing, &[], NOW);
        assert_eq!(merged, existing);
    }

    #[test]
    fn drafts_without_event_id_are_ignored() {
        let existing = vec![manual_task("task-1", "Laundry", TaskStatus::Done)];
        let merged = merge_tasks(
            &existing,
            &[manual_task("task-2", "Not a draft", TaskStatus::ToDo)],
            NOW,
        );
        assert_eq!(merged, existing);
    }

    #[test]
    fn display_order_groups_by_status_then_position() {
        let mut done = manual_task("a", "done", TaskStatus::Done);
        done.position = Some(0);
        let mut todo_late = manual_task("b", "todo late", TaskStatus::ToDo);
        todo_late.position = Some(5);
        let mut todo_early = manual_task("c", "todo early", TaskStatus::ToDo);
        todo_early.position = Some(1);
        let mut doing = manual_task("d", "doing", TaskStatus::Doing);
        doing.position = Some(2);

        let mut tasks = vec![done, todo_late, doing, todo_early];
        sort_for_display(&mut tasks);
        let ids: Vec<_> = tasks.iter().map(|task| task.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "b", "d", "a"]);
    }

    #[test]
    fn display_order_falls_back_to_due_date() {
        let mut later = calendar_task("e1", "later");
        later.due_date = Some("2026-02-16T15:00:00Z".to_string());
        let mut sooner = calendar_task("e2", "sooner");
        sooner.due_date = Some("2026-02-16T09:00:00+00:00".to_string());
        let mut undated = calendar_task("e3", "undated");
        undated.due_date = None;

        let mut tasks = vec![undated, later, sooner];
        sort_for_display(&mut tasks);
        let texts: Vec<_> = tasks.iter().map(|task| task.text.as_str()).collect();
        assert_eq!(texts, vec!["sooner", "later", "undated"]);
    }

    #[test]
    fn equal_positions_tie_break_on_due_date() {
        let mut later = calendar_task("e1", "later");
        later.position = Some(1);
        later.due_date = Some("2026-02-16T15:00:00Z".to_string());
        let mut sooner = calendar_task("e2", "sooner");
        sooner.position = Some(1);
        sooner.due_date = Some("2026-02-16T08:00:00Z".to_string());

        assert_eq!(compare_for_display(&sooner, &later), Ordering::Less);
    }

    #[test]
    fn positioned_entry_precedes_unpositioned_regardless_of_due_date() {
        let mut positioned = calendar_task("e1", "positioned");
        positioned.position = Some(3);
        positioned.due_date = Some("2026-02-16T09:00:00Z".to_string());
        let mut legacy = calendar_task("e2", "legacy");
        legacy.due_date = Some("2026-02-16T08:00:00Z".to_string());
        let mut earliest = calendar_task("e3", "earliest");
        earliest.position = Some(0);
        earliest.due_date = Some("2026-02-16T10:00:00Z".to_string());

        assert_eq!(compare_for_display(&positioned, &legacy), Ordering::Less);
        assert_eq!(compare_for_display(&legacy, &positioned), Ordering::Greater);

        let mut tasks = vec![legacy, positioned, earliest];
        sort_for_display(&mut tasks);
        let texts: Vec<_> = tasks.iter().map(|task| task.text.as_str()).collect();
        assert_eq!(texts, vec!["earliest", "positioned", "legacy"]);
    }

    fn arb_status() -> impl Strategy<Value = TaskStatus> {
        prop_oneof![
            Just(TaskStatus::ToDo),
            Just(TaskStatus::Doing),
            Just(TaskStatus::Done)
        ]
    }

    fn arb_last_updated() -> impl Strategy<Value = Option<i64>> {
        prop::option::of((0i64..6 * HOUR).prop_map(|age| NOW - age))
    }

    fn arb_existing() -> impl Strategy<Value = Vec<Task>> {
        prop::collection::vec(
            (
                prop::option::of(0u8..8),
                "[a-z ]{1,12}",
                arb_status(),
                arb_last_updated(),
            ),
            0..8,
        )
        .prop_map(|rows| {
            let mut seen = std::collections::HashSet::new();
            rows.into_iter()
                .enumerate()
                .filter_map(|(index, (event, text, status, last_updated))| {
                    let event_id = event.map(|value| format!("e{value}"));
                    if let Some(event_id) = event_id.as_ref() {
                        if !seen.insert(event_id.clone()) {
                            return None;
                        }
                    }
                    Some(Task {
                        id: event_id
                            .as_ref()
                            .map(|value| format!("cal_{value}"))
                            .unwrap_or_else(|| format!("task-{index}")),
                        text,
                        status,
                        due_date: None,
                        event_id,
                        calendar_id: None,
                        background_color: None,
                        foreground_color: None,
                        last_updated,
                        position: Some(index as i64),
                    })
                })
                .collect()
        })
    }

    fn arb_incoming() -> impl Strategy<Value = Vec<Task>> {
        prop::collection::vec((0u8..8, "[a-z ]{1,12}", arb_last_updated()), 0..8).prop_map(
            |rows| {
                rows.into_iter()
                    .map(|(event, text, last_updated)| {
                        let mut task = calendar_task(&format!("e{event}"), &text);
                        task.last_updated = last_updated;
                        task
                    })
                    .collect()
            },
        )
    }

    proptest! {
        #[test]
        fn merge_is_idempotent(existing in arb_existing(), incoming in arb_incoming()) {
            let once = merge_tasks(&existing, &incoming, NOW);
            let twice = merge_tasks(&once, &incoming, NOW);
            prop_assert_eq!(twice, once);
        }

        #[test]
        fn merge_preserves_manual_tasks(existing in arb_existing(), incoming in arb_incoming()) {
            let merged = merge_tasks(&existing, &incoming, NOW);
            for manual in existing.iter().filter(|task| task.event_id.is_none()) {
                prop_assert!(merged.contains(manual));
            }
        }

        #[test]
        fn merge_keeps_stored_status(existing in arb_existing(), incoming in arb_incoming()) {
            let merged = merge_tasks(&existing, &incoming, NOW);
            for stored in existing.iter().filter(|task| task.event_id.is_some()) {
                let after = merged
                    .iter()
                    .find(|task| task.event_id == stored.event_id)
                    .expect("stored calendar task survives merge");
                prop_assert_eq!(after.status, stored.status);
                prop_assert_eq!(after.position, stored.position);
            }
        }

        #[test]
        fn merge_assigns_position_to_every_new_event(existing in arb_existing(), incoming in arb_incoming()) {
            let merged = merge_tasks(&existing, &incoming, NOW);
            for draft in &incoming {
                let found = merged
                    .iter()
                    .find(|task| task.event_id == draft.event_id)
                    .expect("incoming event present after merge");
                prop_assert!(found.position.is_some());
            }
        }
    }
}
