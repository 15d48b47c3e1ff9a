use crate::model::{Snapshot, TaskRecord};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskUpdate {
    pub identity: String,
    pub previous: TaskRecord,
    pub current: TaskRecord,
}

/// Result of comparing two snapshots. Each group is ordered by identity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    pub added: Vec<TaskRecord>,
    pub removed: Vec<String>,
    pub updated: Vec<TaskUpdate>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Added,
    Removed,
    Updated,
}

impl EventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Added => "added",
            Self::Removed => "removed",
            Self::Updated => "updated",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeEvent<'a> {
    Added(&'a TaskRecord),
    Removed(&'a str),
    Updated(&'a TaskUpdate),
}

impl ChangeEvent<'_> {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Added(_) => EventKind::Added,
            Self::Removed(_) => EventKind::Removed,
            Self::Updated(_) => EventKind::Updated,
        }
    }

    pub fn identity(&self) -> &str {
        match self {
            Self::Added(task) => &task.identity,
            Self::Removed(identity) => identity,
            Self::Updated(update) => &update.identity,
        }
    }
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.updated.is_empty()
    }

    pub fn len(&self) -> usize {
        self.added.len() + self.removed.len() + self.updated.len()
    }

    /// Added entries first, then removed, then updated.
    pub fn events(&self) -> impl Iterator<Item = ChangeEvent<'_>> {
        self.added
            .iter()
            .map(ChangeEvent::Added)
            .chain(self.removed.iter().map(|id| ChangeEvent::Removed(id)))
            .chain(self.updated.iter().map(ChangeEvent::Updated))
    }
}

/// Compares `current` against `previous`.
///
/// Only the comparison key (trigger and command) decides whether a task that
/// exists in both snapshots was updated; run times, state and path changes are
/// carried in the update for context but never produce one on their own.
pub fn diff(previous: &Snapshot, current: &Snapshot) -> ChangeSet {
    let mut changes = ChangeSet::default();

    for task in current.tasks() {
        match previous.get(&task.identity) {
            None => changes.added.push(task.clone()),
            Some(before) if before.comparison_key() != task.comparison_key() => {
                changes.updated.push(TaskUpdate {
                    identity: task.identity.clone(),
                    previous: before.clone(),
                    current: task.clone(),
                });
            }
            Some(_) => {}
        }
    }

    changes.removed = previous
        .identities()
        .filter(|identity| !current.contains(identity))
        .map(str::to_string)
        .collect();

    changes
}

#[cfg(test)]
mod tests {
    use super::{ChangeEvent, EventKind, diff};
    use crate::model::{Snapshot, TaskRecord};
    use std::collections::BTreeSet;
    use time::macros::datetime;

    fn snapshot(records: Vec<TaskRecord>) -> Snapshot {
        Snapshot::from_records(records, datetime!(2024-01-01 12:00 UTC))
    }

    fn cron(identity: &str, trigger: &str, command: &str) -> TaskRecord {
        TaskRecord::new(identity)
            .with_trigger(trigger)
            .with_command(command)
    }

    #[test]
    fn identical_snapshots_produce_no_changes() {
        let tasks = snapshot(vec![
            cron("a", "0 5 * * *", "backup.sh"),
            cron("b", "@reboot", "mount.sh"),
        ]);

        assert!(diff(&tasks, &tasks).is_empty());
        let empty = snapshot(Vec::new());
        assert!(diff(&empty, &empty).is_empty());
    }

    #[test]
    fn added_and_removed_are_key_differences() {
        let before = snapshot(vec![
            cron("a", "* * * * *", "a"),
            cron("b", "* * * * *", "b"),
            cron("c", "* * * * *", "c"),
        ]);
        let after = snapshot(vec![
            cron("b", "* * * * *", "b"),
            cron("d", "* * * * *", "d"),
            cron("e", "* * * * *", "e"),
        ]);

        let changes = diff(&before, &after);
        let added: BTreeSet<_> = changes.added.iter().map(|t| t.identity.as_str()).collect();
        let removed: BTreeSet<_> = changes.removed.iter().map(String::as_str).collect();

        let before_keys: BTreeSet<_> = before.identities().collect();
        let after_keys: BTreeSet<_> = after.identities().collect();
        assert_eq!(added, &after_keys - &before_keys);
        assert_eq!(removed, &before_keys - &after_keys);
        assert!(changes.updated.is_empty());
    }

    #[test]
    fn execution_status_alone_is_not_an_update() {
        let before = snapshot(vec![
            cron("a", "0 5 * * *", "backup.sh").with_state("Ready"),
        ]);
        let after = snapshot(vec![
            cron("a", "0 5 * * *", "backup.sh")
                .with_state("Running")
                .with_last_run_time("2024-01-01 05:00:00")
                .with_path("\\Moved\\"),
        ]);

        assert!(diff(&before, &after).is_empty());
    }

    #[test]
    fn trigger_or_command_change_is_an_update() {
        let before = snapshot(vec![
            cron("a", "0 5 * * *", "backup.sh"),
            cron("b", "0 1 * * *", "rotate.sh"),
        ]);
        let after = snapshot(vec![
            cron("a", "0 6 * * *", "backup.sh"),
            cron("b", "0 1 * * *", "rotate.sh --all").with_state("Ready"),
        ]);

        let changes = diff(&before, &after);
        let updated: Vec<_> = changes.updated.iter().map(|u| u.identity.as_str()).collect();
        assert_eq!(updated, vec!["a", "b"]);
        assert_eq!(changes.updated[1].previous.command.as_deref(), Some("rotate.sh"));
        assert_eq!(changes.updated[1].current.state.as_deref(), Some("Ready"));
    }

    #[test]
    fn last_run_change_with_new_task_reports_only_addition() {
        let before = snapshot(vec![cron("A", "0 5 * * *", "backup.sh")]);
        let after = snapshot(vec![
            cron("A", "0 5 * * *", "backup.sh").with_last_run_time("2024-01-01"),
            cron("B", "0 0 * * *", "cleanup.sh"),
        ]);

        let changes = diff(&before, &after);
        assert_eq!(changes.added.len(), 1);
        assert_eq!(changes.added[0].identity, "B");
        assert!(changes.removed.is_empty());
        assert!(changes.updated.is_empty());
    }

    #[test]
    fn removal_and_command_change_together() {
        let before = snapshot(vec![
            cron("A", "0 5 * * *", "backup.sh"),
            cron("B", "0 0 * * *", "cleanup.sh"),
        ]);
        let after = snapshot(vec![cron("A", "0 5 * * *", "backup-v2.sh")]);

        let changes = diff(&before, &after);
        assert!(changes.added.is_empty());
        assert_eq!(changes.removed, vec!["B".to_string()]);
        assert_eq!(changes.updated.len(), 1);
        assert_eq!(changes.updated[0].identity, "A");
    }

    #[test]
    fn empty_baseline_reports_everything_added() {
        let empty = snapshot(Vec::new());
        let current = snapshot(vec![cron("a", "@daily", "a"), cron("b", "@hourly", "b")]);

        let changes = diff(&empty, &current);
        assert_eq!(changes.added.len(), 2);
        assert!(changes.removed.is_empty() && changes.updated.is_empty());

        let changes = diff(&current, &empty);
        assert_eq!(changes.removed, vec!["a".to_string(), "b".to_string()]);
        assert!(changes.added.is_empty() && changes.updated.is_empty());
    }

    #[test]
    fn events_are_ordered_by_group_then_identity() {
        let before = snapshot(vec![cron("z", "@daily", "z"), cron("m", "@daily", "old")]);
        let after = snapshot(vec![
            cron("m", "@daily", "new"),
            cron("c", "@daily", "c"),
            cron("b", "@daily", "b"),
        ]);

        let changes = diff(&before, &after);
        let seen: Vec<_> = changes
            .events()
            .map(|event| (event.kind(), event.identity().to_string()))
            .collect();
        assert_eq!(
            seen,
            vec![
                (EventKind::Added, "b".to_string()),
                (EventKind::Added, "c".to_string()),
                (EventKind::Removed, "z".to_string()),
                (EventKind::Updated, "m".to_string()),
            ]
        );
        assert!(matches!(changes.events().next(), Some(ChangeEvent::Added(_))));
        assert_eq!(changes.len(), 4);
    }
}
