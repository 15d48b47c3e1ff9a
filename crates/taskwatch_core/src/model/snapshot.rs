use crate::model::TaskRecord;
use std::collections::BTreeMap;
use time::OffsetDateTime;
use tracing::warn;

/// Point-in-time view of every task a source reported, keyed by identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    tasks: BTreeMap<String, TaskRecord>,
    captured_at: OffsetDateTime,
}

impl Snapshot {
    pub fn empty(captured_at: OffsetDateTime) -> Self {
        Self {
            tasks: BTreeMap::new(),
            captured_at,
        }
    }

    /// Builds a snapshot from collected records. Records with an empty identity
    /// are dropped and a repeated identity keeps the last record seen.
    pub fn from_records<I>(records: I, captured_at: OffsetDateTime) -> Self
    where
        I: IntoIterator<Item = TaskRecord>,
    {
        let mut tasks = BTreeMap::new();
        for record in records {
            if record.identity.trim().is_empty() {
                warn!("dropping task record without identity");
                continue;
            }
            if let Some(previous) = tasks.insert(record.identity.clone(), record) {
                warn!(identity = %previous.identity, "duplicate task identity, keeping last");
            }
        }
        Self { tasks, captured_at }
    }

    pub fn captured_at(&self) -> OffsetDateTime {
        self.captured_at
    }

    pub fn get(&self, identity: &str) -> Option<&TaskRecord> {
        self.tasks.get(identity)
    }

    pub fn contains(&self, identity: &str) -> bool {
        self.tasks.contains_key(identity)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn identities(&self) -> impl Iterator<Item = &str> {
        self.tasks.keys().map(String::as_str)
    }

    /// Records in identity order.
    pub fn tasks(&self) -> impl Iterator<Item = &TaskRecord> {
        self.tasks.values()
    }
}

#[cfg(test)]
mod tests {
    use super::Snapshot;
    use crate::model::TaskRecord;
    use time::macros::datetime;

    #[test]
    fn last_duplicate_wins() {
        let snapshot = Snapshot::from_records(
            [
                TaskRecord::new("a").with_command("first"),
                TaskRecord::new("b"),
                TaskRecord::new("a").with_command("second"),
            ],
            datetime!(2024-01-01 00:00 UTC),
        );

        assert_eq!(snapshot.len(), 2);
        assert_eq!(
            snapshot.get("a").and_then(|task| task.command.as_deref()),
            Some("second")
        );
    }

    #[test]
    fn blank_identities_are_dropped() {
        let snapshot = Snapshot::from_records(
            [TaskRecord::new("  "), TaskRecord::new("kept")],
            datetime!(2024-01-01 00:00 UTC),
        );

        assert_eq!(snapshot.identities().collect::<Vec<_>>(), vec!["kept"]);
    }
}
