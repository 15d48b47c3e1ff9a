use serde::{Deserialize, Serialize};

/// One scheduled task, normalized across cron tables and the Windows Task Scheduler.
///
/// Every field but `identity` is optional: `None` means the platform did not
/// report the field, `Some("")` means it reported an empty value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub identity: String,
    #[serde(default)]
    pub trigger_spec: Option<String>,
    #[serde(default)]
    pub command: Option<String>,
    #[serde(default)]
    pub last_run_time: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub raw_actions: Option<String>,
}

impl TaskRecord {
    pub fn new<I: Into<String>>(identity: I) -> Self {
        Self {
            identity: identity.into(),
            trigger_spec: None,
            command: None,
            last_run_time: None,
            path: None,
            state: None,
            raw_actions: None,
        }
    }

    pub fn with_trigger<T: Into<String>>(mut self, trigger_spec: T) -> Self {
        self.trigger_spec = Some(trigger_spec.into());
        self
    }

    pub fn with_command<T: Into<String>>(mut self, command: T) -> Self {
        self.command = Some(command.into());
        self
    }

    pub fn with_last_run_time<T: Into<String>>(mut self, last_run_time: T) -> Self {
        self.last_run_time = Some(last_run_time.into());
        self
    }

    pub fn with_path<T: Into<String>>(mut self, path: T) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_state<T: Into<String>>(mut self, state: T) -> Self {
        self.state = Some(state.into());
        self
    }

    pub fn with_raw_actions<T: Into<String>>(mut self, raw_actions: T) -> Self {
        self.raw_actions = Some(raw_actions.into());
        self
    }

    /// The fields describing what the task is, as opposed to how it last ran.
    pub fn comparison_key(&self) -> (Option<&str>, Option<&str>) {
        (self.trigger_spec.as_deref(), self.command.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::TaskRecord;

    #[test]
    fn comparison_key_ignores_execution_status() {
        let before = TaskRecord::new("backup")
            .with_trigger("0 5 * * *")
            .with_command("backup.sh")
            .with_state("Ready");
        let after = before
            .clone()
            .with_state("Running")
            .with_last_run_time("2024-01-01")
            .with_path("\\Ops\\");

        assert_ne!(before, after);
        assert_eq!(before.comparison_key(), after.comparison_key());
    }

    #[test]
    fn empty_value_differs_from_absent_value() {
        let absent = TaskRecord::new("job");
        let empty = TaskRecord::new("job").with_command("");
        assert_ne!(absent.comparison_key(), empty.comparison_key());
    }
}
