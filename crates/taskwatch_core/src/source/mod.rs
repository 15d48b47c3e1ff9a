use crate::config::SourceSettings;
use crate::error::WatchError;
use crate::model::Snapshot;
use std::future::Future;
use std::io::ErrorKind;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

mod cron;
mod task_scheduler;

pub use cron::{CronSource, parse_system_crontab, parse_user_crontab};
pub use task_scheduler::{TaskSchedulerSource, parse_task_listing};

/// Anything that can enumerate the host's scheduled tasks.
///
/// Calls are independent of each other; a source keeps no state between them.
pub trait TaskSource {
    fn collect(&mut self) -> impl Future<Output = Result<Snapshot, WatchError>>;
}

/// The platform source picked once at startup.
#[derive(Debug, Clone)]
pub enum HostSource {
    Cron(CronSource),
    TaskScheduler(TaskSchedulerSource),
}

impl HostSource {
    pub fn detect(settings: &SourceSettings) -> Result<Self, WatchError> {
        Self::for_os(std::env::consts::OS, settings)
    }

    pub fn for_os(os: &str, settings: &SourceSettings) -> Result<Self, WatchError> {
        match os {
            "linux" | "macos" | "freebsd" | "openbsd" | "netbsd" | "dragonfly" => {
                Ok(Self::Cron(CronSource::new(settings)))
            }
            "windows" => Ok(Self::TaskScheduler(TaskSchedulerSource::new(settings))),
            other => Err(WatchError::unsupported_platform(other)),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Cron(_) => "cron",
            Self::TaskScheduler(_) => "task_scheduler",
        }
    }
}

impl TaskSource for HostSource {
    async fn collect(&mut self) -> Result<Snapshot, WatchError> {
        match self {
            Self::Cron(source) => source.collect().await,
            Self::TaskScheduler(source) => source.collect().await,
        }
    }
}

#[derive(Debug)]
pub(crate) struct CommandOutput {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

/// Runs `argv` to completion, killing it if it outlives `limit`.
pub(crate) async fn run_command(
    argv: &[String],
    limit: Duration,
) -> Result<CommandOutput, WatchError> {
    let (program, args) = argv
        .split_first()
        .ok_or_else(|| WatchError::invalid_input("source command is empty"))?;

    debug!(program = %program, "running task source command");
    let mut command = Command::new(program);
    command
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let child = command.spawn().map_err(|err| match err.kind() {
        ErrorKind::NotFound => {
            WatchError::source_unavailable(format!("`{program}` not found on PATH"))
        }
        _ => WatchError::collection(format!("failed to start `{program}`: {err}")),
    })?;

    let output = tokio::time::timeout(limit, child.wait_with_output())
        .await
        .map_err(|_| WatchError::Timeout(limit))?
        .map_err(|err| WatchError::collection(format!("`{program}` failed: {err}")))?;

    Ok(CommandOutput {
        status: output.status,
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
}

#[cfg(test)]
mod tests {
    use super::{HostSource, run_command};
    use crate::config::SourceSettings;
    use crate::error::WatchError;
    use std::time::Duration;

    #[test]
    fn selects_source_by_operating_system() {
        let settings = SourceSettings::default();
        assert_eq!(HostSource::for_os("linux", &settings).unwrap().name(), "cron");
        assert_eq!(HostSource::for_os("macos", &settings).unwrap().name(), "cron");
        assert_eq!(
            HostSource::for_os("windows", &settings).unwrap().name(),
            "task_scheduler"
        );
    }

    #[test]
    fn unknown_operating_system_is_unsupported() {
        let err = HostSource::for_os("plan9", &SourceSettings::default()).unwrap_err();
        assert_eq!(err, WatchError::unsupported_platform("plan9"));
    }

    #[tokio::test]
    async fn missing_program_is_source_unavailable() {
        let argv = vec!["taskwatch-no-such-program-7f3a".to_string()];
        let err = run_command(&argv, Duration::from_secs(5)).await.unwrap_err();
        assert_eq!(err.code(), "source_unavailable");
    }

    #[tokio::test]
    async fn empty_command_is_rejected() {
        let err = run_command(&[], Duration::from_secs(5)).await.unwrap_err();
        assert_eq!(err.code(), "invalid_input");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn slow_command_times_out() {
        let argv = vec!["sleep".to_string(), "5".to_string()];
        let err = run_command(&argv, Duration::from_millis(50)).await.unwrap_err();
        assert_eq!(err, WatchError::Timeout(Duration::from_millis(50)));
    }
}
