use crate::config::SourceSettings;
use crate::error::WatchError;
use crate::model::{Snapshot, TaskRecord};
use crate::source::{TaskSource, run_command};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;
use time::OffsetDateTime;
use tracing::debug;

const NICKNAMES: &[&str] = &[
    "@reboot",
    "@yearly",
    "@annually",
    "@monthly",
    "@weekly",
    "@daily",
    "@midnight",
    "@hourly",
];

const EMPTY_TABLE_MARKER: &str = "no crontab for";

/// Reads the invoking user's crontab and, optionally, system crontab files.
#[derive(Debug, Clone)]
pub struct CronSource {
    command: Vec<String>,
    system_tables: Vec<PathBuf>,
    timeout: Duration,
}

impl CronSource {
    pub fn new(settings: &SourceSettings) -> Self {
        Self {
            command: settings.cron_command.clone(),
            system_tables: settings.cron_tables.clone(),
            timeout: settings.collect_timeout,
        }
    }

    async fn user_table(&self) -> Result<Vec<TaskRecord>, WatchError> {
        let output = run_command(&self.command, self.timeout).await?;
        if output.status.success() {
            return Ok(parse_user_crontab(&output.stdout));
        }

        // crontab exits non-zero when the user simply has no table.
        if output.stderr.contains(EMPTY_TABLE_MARKER) {
            debug!("user has no crontab");
            return Ok(Vec::new());
        }

        Err(WatchError::collection(format!(
            "`{}` exited with {}: {}",
            self.command.join(" "),
            output.status,
            output.stderr.trim()
        )))
    }

    async fn system_table(&self, path: &Path) -> Result<Vec<TaskRecord>, WatchError> {
        match tokio::fs::read_to_string(path).await {
            Ok(text) => Ok(parse_system_crontab(&text, &path.display().to_string())),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!(path = %path.display(), "system crontab not present");
                Ok(Vec::new())
            }
            Err(err) => Err(WatchError::collection(format!(
                "cannot read {}: {}",
                path.display(),
                err
            ))),
        }
    }
}

impl TaskSource for CronSource {
    async fn collect(&mut self) -> Result<Snapshot, WatchError> {
        let mut records = self.user_table().await?;
        for path in &self.system_tables {
            let table = tokio::time::timeout(self.timeout, self.system_table(path))
                .await
                .map_err(|_| WatchError::Timeout(self.timeout))??;
            records.extend(table);
        }
        Ok(Snapshot::from_records(records, OffsetDateTime::now_utc()))
    }
}

/// Parses `crontab -l` output. The command line doubles as the identity since
/// cron entries carry no name.
pub fn parse_user_crontab(text: &str) -> Vec<TaskRecord> {
    entries(text)
        .filter_map(|line| {
            let (trigger, command) = split_schedule(line, 0)?;
            Some(
                TaskRecord::new(command)
                    .with_trigger(trigger)
                    .with_command(command),
            )
        })
        .collect()
}

/// Parses a system table (`/etc/crontab`, `/etc/cron.d/*`), where a user
/// column sits between the schedule and the command.
pub fn parse_system_crontab(text: &str, file: &str) -> Vec<TaskRecord> {
    entries(text)
        .filter_map(|line| {
            let (trigger, rest) = split_schedule(line, 1)?;
            let (user, command) = split_leading(rest)?;
            Some(
                TaskRecord::new(format!("{file}:{user}:{command}"))
                    .with_trigger(trigger)
                    .with_command(command)
                    .with_path(file),
            )
        })
        .collect()
}

fn entries(text: &str) -> impl Iterator<Item = &str> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter(|line| !is_env_assignment(line))
}

fn is_env_assignment(line: &str) -> bool {
    match line.split_once('=') {
        Some((name, _)) => {
            let name = name.trim();
            !name.is_empty()
                && name
                    .chars()
                    .all(|ch| ch.is_ascii_alphanumeric() || ch == '_')
        }
        None => false,
    }
}

/// Splits off the schedule. `extra` is the number of columns that must follow
/// the schedule besides the command itself.
fn split_schedule(line: &str, extra: usize) -> Option<(String, &str)> {
    let field_count = if is_nickname(line) { 1 } else { 5 };
    let mut fields = Vec::with_capacity(field_count);
    let mut rest = line;
    for _ in 0..field_count {
        let (field, remainder) = split_leading(rest)?;
        fields.push(field);
        rest = remainder;
    }

    let rest = rest.trim();
    if rest.split_whitespace().count() <= extra {
        debug!(line = %line, "skipping malformed cron entry");
        return None;
    }
    Some((fields.join(" "), rest))
}

fn split_leading(text: &str) -> Option<(&str, &str)> {
    let text = text.trim_start();
    if text.is_empty() {
        return None;
    }
    match text.find(char::is_whitespace) {
        Some(end) => Some((&text[..end], text[end..].trim_start())),
        None => Some((text, "")),
    }
}

fn is_nickname(line: &str) -> bool {
    let first = line.split_whitespace().next().unwrap_or_default();
    NICKNAMES
        .iter()
        .any(|nickname| first.eq_ignore_ascii_case(nickname))
}
