use crate::error::WatchError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

const CONFIG_FILE_NAME: &str = "config.json";
const CONFIG_ENV_VAR: &str = "TASKWATCH_CONFIG_PATH";

pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 60;
pub const DEFAULT_COLLECT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_LOG_LEVEL: &str = "info";

/// On-disk configuration. Every field is optional; `Settings::resolve` fills defaults.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub poll_interval_secs: Option<u64>,
    #[serde(default)]
    pub collect_timeout_secs: Option<u64>,
    #[serde(default)]
    pub log_level: Option<String>,
    #[serde(default)]
    pub log_format: Option<String>,
    #[serde(default)]
    pub log_file: Option<PathBuf>,
    #[serde(default)]
    pub report_destination: Option<String>,
    #[serde(default)]
    pub report_file: Option<PathBuf>,
    #[serde(default)]
    pub cron_command: Option<Vec<String>>,
    #[serde(default)]
    pub cron_tables: Vec<PathBuf>,
    #[serde(default)]
    pub powershell_command: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ConfigLoad {
    pub config: Config,
    pub error: Option<WatchError>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ConfigOverrides {
    pub poll_interval_secs: Option<u64>,
    pub collect_timeout_secs: Option<u64>,
    pub log_level: Option<String>,
    pub log_format: Option<String>,
    pub log_file: Option<PathBuf>,
    pub report_destination: Option<String>,
    pub report_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn parse(raw: &str) -> Result<Self, WatchError> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "text" | "plain" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(WatchError::invalid_input(format!(
                "unknown format '{other}' (expected text or json)"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportDestination {
    /// Through the diagnostic log stream.
    Log,
    Stdout,
    File(PathBuf),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceSettings {
    pub collect_timeout: Duration,
    pub cron_command: Vec<String>,
    pub cron_tables: Vec<PathBuf>,
    pub powershell: String,
}

impl Default for SourceSettings {
    fn default() -> Self {
        Self {
            collect_timeout: Duration::from_secs(DEFAULT_COLLECT_TIMEOUT_SECS),
            cron_command: vec!["crontab".to_string(), "-l".to_string()],
            cron_tables: Vec::new(),
            powershell: "powershell".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSettings {
    pub level: String,
    pub format: OutputFormat,
    pub file: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportSettings {
    pub destination: ReportDestination,
    pub format: OutputFormat,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub poll_interval: Duration,
    pub source: SourceSettings,
    pub log: LogSettings,
    pub report: ReportSettings,
}

impl Settings {
    pub fn resolve(config: &Config) -> Result<Self, WatchError> {
        let poll_interval = positive_secs(
            "poll_interval_secs",
            config.poll_interval_secs,
            DEFAULT_POLL_INTERVAL_SECS,
        )?;
        let collect_timeout = positive_secs(
            "collect_timeout_secs",
            config.collect_timeout_secs,
            DEFAULT_COLLECT_TIMEOUT_SECS,
        )?;

        let mut source = SourceSettings {
            collect_timeout,
            cron_tables: config.cron_tables.clone(),
            ..SourceSettings::default()
        };
        if let Some(command) = config.cron_command.as_ref() {
            if command.first().is_none_or(|program| program.trim().is_empty()) {
                return Err(WatchError::invalid_input(
                    "cron_command must start with a program name",
                ));
            }
            source.cron_command = command.clone();
        }
        if let Some(powershell) = config.powershell_command.as_ref() {
            if powershell.trim().is_empty() {
                return Err(WatchError::invalid_input(
                    "powershell_command cannot be empty",
                ));
            }
            source.powershell = powershell.clone();
        }

        let format = match config.log_format.as_deref() {
            Some(raw) => OutputFormat::parse(raw)?,
            None => OutputFormat::Text,
        };

        let log = LogSettings {
            level: log_level(config.log_level.as_deref())?,
            format,
            file: config.log_file.clone(),
        };

        let destination = match (
            config.report_destination.as_deref().map(str::trim),
            config.report_file.as_ref(),
        ) {
            (None, None) | (Some("log"), _) => ReportDestination::Log,
            (Some("stdout"), _) => ReportDestination::Stdout,
            (Some("file"), Some(path)) | (None, Some(path)) => {
                ReportDestination::File(path.clone())
            }
            (Some("file"), None) => {
                return Err(WatchError::invalid_input(
                    "report_destination 'file' requires report_file",
                ));
            }
            (Some(other), _) => {
                return Err(WatchError::invalid_input(format!(
                    "unknown report destination '{other}' (expected log, stdout or file)"
                )));
            }
        };

        Ok(Self {
            poll_interval,
            source,
            log,
            report: ReportSettings {
                destination,
                format,
            },
        })
    }
}

fn positive_secs(name: &str, value: Option<u64>, default: u64) -> Result<Duration, WatchError> {
    match value.unwrap_or(default) {
        0 => Err(WatchError::invalid_input(format!(
            "{name} must be greater than zero"
        ))),
        secs => Ok(Duration::from_secs(secs)),
    }
}

/// Only plain level names are accepted: a bare word in an `EnvFilter` is read
/// as a target and would silence every other event.
fn log_level(raw: Option<&str>) -> Result<String, WatchError> {
    let raw = match raw.map(str::trim) {
        Some(raw) if !raw.is_empty() => raw,
        _ => return Ok(DEFAULT_LOG_LEVEL.to_string()),
    };
    let level = raw.to_ascii_lowercase();
    match level.as_str() {
        "off" | "error" | "warn" | "info" | "debug" | "trace" => Ok(level),
        _ => Err(WatchError::invalid_input(format!(
            "unknown log level '{raw}' (expected off, error, warn, info, debug or trace)"
        ))),
    }
}

pub fn config_path() -> Result<PathBuf, WatchError> {
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR)
        && !path.trim().is_empty()
    {
        return Ok(PathBuf::from(path));
    }

    if cfg!(windows) {
        let appdata =
            std::env::var("APPDATA").map_err(|_| WatchError::invalid_data("APPDATA is not set"))?;
        Ok(PathBuf::from(appdata)
            .join("taskwatch")
            .join(CONFIG_FILE_NAME))
    } else {
        let home = std::env::var("HOME").map_err(|_| WatchError::invalid_data("HOME is not set"))?;
        Ok(PathBuf::from(home)
            .join(".config")
            .join("taskwatch")
            .join(CONFIG_FILE_NAME))
    }
}

pub fn load_config_with_fallback() -> ConfigLoad {
    match config_path() {
        Ok(path) => load_config_with_fallback_from_path(&path),
        Err(err) => ConfigLoad {
            config: Config::default(),
            error: Some(err),
        },
    }
}

fn load_config_with_fallback_from_path(path: &Path) -> ConfigLoad {
    if !path.exists() {
        return ConfigLoad {
            config: Config::default(),
            error: None,
        };
    }

    match load_config_from_path(path) {
        Ok(config) => ConfigLoad {
            config,
            error: None,
        },
        Err(err) => ConfigLoad {
            config: Config::default(),
            error: Some(err),
        },
    }
}

fn load_config_from_path(path: &Path) -> Result<Config, WatchError> {
    let content = std::fs::read_to_string(path)
        .map_err(|err| WatchError::io(format!("{}: {}", path.display(), err)))?;
    serde_json::from_str(&content).map_err(|err| {
        WatchError::invalid_data(format!("invalid JSON in {}: {}", path.display(), err))
    })
}

pub fn merge_overrides(base: &Config, overrides: &ConfigOverrides) -> Config {
    let mut merged = base.clone();
    if overrides.poll_interval_secs.is_some() {
        merged.poll_interval_secs = overrides.poll_interval_secs;
    }
    if overrides.collect_timeout_secs.is_some() {
        merged.collect_timeout_secs = overrides.collect_timeout_secs;
    }
    if let Some(level) = overrides.log_level.as_ref() {
        merged.log_level = Some(level.clone());
    }
    if let Some(format) = overrides.log_format.as_ref() {
        merged.log_format = Some(format.clone());
    }
    if let Some(file) = overrides.log_file.as_ref() {
        merged.log_file = Some(file.clone());
    }
    if let Some(destination) = overrides.report_destination.as_ref() {
        merged.report_destination = Some(destination.clone());
    }
    if let Some(file) = overrides.report_file.as_ref() {
        merged.report_file = Some(file.clone());
    }

    merged
}
