use crate::config::SourceSettings;
use crate::error::WatchError;
use crate::model::{Snapshot, TaskRecord};
use crate::source::{TaskSource, run_command};
use serde::Deserialize;
use std::time::Duration;
use time::OffsetDateTime;

/// Flattens every registered task into one JSON row per task.
const LISTING_SCRIPT: &str = r#"$ErrorActionPreference = 'Stop'
Get-ScheduledTask | ForEach-Object {
  $info = $_ | Get-ScheduledTaskInfo -ErrorAction SilentlyContinue
  [pscustomobject]@{
    TaskName    = $_.TaskName
    TaskPath    = $_.TaskPath
    State       = [string]$_.State
    LastRunTime = if ($info -and $info.LastRunTime) { $info.LastRunTime.ToString('o') } else { $null }
    Command     = ($_.Actions | ForEach-Object { (@($_.Execute, $_.Arguments) | Where-Object { $_ }) -join ' ' }) -join '; '
    Triggers    = ($_.Triggers | ForEach-Object { (@($_.CimClass.CimClassName, $_.StartBoundary, $_.Repetition.Interval) | Where-Object { $_ }) -join ' ' }) -join '; '
    Actions     = ($_.Actions | Out-String).Trim()
  }
} | ConvertTo-Json -Depth 3 -Compress
"#;

/// Queries the Windows Task Scheduler through PowerShell.
#[derive(Debug, Clone)]
pub struct TaskSchedulerSource {
    command: Vec<String>,
    timeout: Duration,
}

impl TaskSchedulerSource {
    pub fn new(settings: &SourceSettings) -> Self {
        Self {
            command: vec![
                settings.powershell.clone(),
                "-NoProfile".to_string(),
                "-NonInteractive".to_string(),
                "-Command".to_string(),
                LISTING_SCRIPT.to_string(),
            ],
            timeout: settings.collect_timeout,
        }
    }
}

impl TaskSource for TaskSchedulerSource {
    async fn collect(&mut self) -> Result<Snapshot, WatchError> {
        let output = run_command(&self.command, self.timeout).await?;
        if !output.status.success() {
            return Err(WatchError::collection(format!(
                "Get-ScheduledTask exited with {}: {}",
                output.status,
                output.stderr.trim()
            )));
        }

        let records = parse_task_listing(&output.stdout)?;
        Ok(Snapshot::from_records(records, OffsetDateTime::now_utc()))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct TaskRow {
    task_name: Option<String>,
    #[serde(default)]
    task_path: Option<String>,
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    last_run_time: Option<String>,
    #[serde(default)]
    command: Option<String>,
    #[serde(default)]
    triggers: Option<String>,
    #[serde(default)]
    actions: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Listing {
    Many(Vec<TaskRow>),
    One(TaskRow),
}

/// Parses the JSON emitted by the listing script. PowerShell prints nothing
/// for zero tasks and a bare object for exactly one.
pub fn parse_task_listing(stdout: &str) -> Result<Vec<TaskRecord>, WatchError> {
    let trimmed = stdout.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }

    let listing: Listing = serde_json::from_str(trimmed)
        .map_err(|err| WatchError::collection(format!("unreadable task listing: {err}")))?;
    let rows = match listing {
        Listing::Many(rows) => rows,
        Listing::One(row) => vec![row],
    };

    Ok(rows.into_iter().filter_map(into_record).collect())
}

fn into_record(row: TaskRow) -> Option<TaskRecord> {
    let name = row.task_name.filter(|name| !name.trim().is_empty())?;
    let identity = match row.task_path.as_deref() {
        Some(folder) => format!("{folder}{name}"),
        None => name,
    };

    Some(TaskRecord {
        identity,
        trigger_spec: row.triggers,
        command: row.command,
        last_run_time: row.last_run_time,
        path: row.task_path,
        state: row.state,
        raw_actions: row.actions,
    })
}

#[cfg(test)]
mod tests {
    use super::parse_task_listing;

    #[test]
    fn parses_array_listing() {
        let stdout = r#"[
            {"TaskName":"Backup","TaskPath":"\\Ops\\","State":"Ready","LastRunTime":"2024-01-01T05:00:00.0000000+00:00","Command":"C:\\backup.exe /full","Triggers":"MSFT_TaskDailyTrigger 2024-01-01T05:00:00","Actions":"backup.exe"},
            {"TaskName":"Updater","TaskPath":"\\","State":"Disabled","LastRunTime":null,"Command":"","Triggers":"","Actions":""}
        ]"#;

        let tasks = parse_task_listing(stdout).unwrap();
        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[0].identity, "\\Ops\\Backup");
        assert_eq!(tasks[0].command.as_deref(), Some("C:\\backup.exe /full"));
        assert_eq!(tasks[0].path.as_deref(), Some("\\Ops\\"));
        assert_eq!(tasks[1].identity, "\\Updater");
        assert!(tasks[1].last_run_time.is_none());
        assert_eq!(tasks[1].command.as_deref(), Some(""));
        assert_eq!(tasks[1].state.as_deref(), Some("Disabled"));
    }

    #[test]
    fn parses_single_object_listing() {
        let tasks =
            parse_task_listing(r#"{"TaskName":"Only","TaskPath":"\\","State":"Ready"}"#).unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].identity, "\\Only");
        assert!(tasks[0].command.is_none());
    }

    #[test]
    fn empty_output_means_no_tasks() {
        assert!(parse_task_listing("  \r\n").unwrap().is_empty());
    }

    #[test]
    fn garbage_is_a_collection_failure() {
        let err = parse_task_listing("TaskName  State\n--------  -----").unwrap_err();
        assert_eq!(err.code(), "collection_failed");
    }

    #[test]
    fn rows_without_name_are_skipped() {
        let tasks = parse_task_listing(r#"[{"TaskName":null},{"TaskName":"Kept"}]"#).unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].identity, "Kept");
    }
}
