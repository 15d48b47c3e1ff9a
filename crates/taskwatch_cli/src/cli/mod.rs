use clap::{Parser, Subcommand};
use std::path::PathBuf;
use taskwatch_core::config::ConfigOverrides;
use taskwatch_core::error::WatchError;

#[derive(Parser, Debug)]
#[command(name = "taskwatch", author, version, long_about = None)]
#[command(about = "Watch the host's scheduled tasks and log additions, removals and changes")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Seconds between polls (default 60)
    #[arg(long, value_name = "SECS", global = true)]
    pub interval: Option<u64>,

    /// Seconds a single collection may take before it counts as failed (default 30)
    #[arg(long, value_name = "SECS", global = true)]
    pub timeout: Option<u64>,

    /// Write diagnostics to this file instead of stderr
    #[arg(long, value_name = "PATH", global = true)]
    pub log_file: Option<PathBuf>,

    /// Diagnostic and report format: text or json
    #[arg(long, value_name = "FORMAT", global = true)]
    pub log_format: Option<String>,

    /// Where change events go: log, stdout or file
    #[arg(long, value_name = "DESTINATION", global = true)]
    pub report: Option<String>,

    /// File receiving change events when reporting to a file
    #[arg(long, value_name = "PATH", global = true)]
    pub report_file: Option<PathBuf>,

    /// Override configuration values (format KEY=VALUE)
    #[arg(long = "config-override", value_name = "KEY=VALUE", global = true)]
    pub config_override: Vec<String>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Monitor scheduled tasks until interrupted (default)
    ///
    /// Example: taskwatch watch --interval 30
    Watch,
    /// Collect scheduled tasks once and print them
    ///
    /// Example: taskwatch snapshot
    /// Example: taskwatch snapshot --json
    Snapshot {
        /// Output JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigOverrideTarget {
    PollInterval,
    CollectTimeout,
    LogLevel,
    LogFormat,
    LogFile,
    ReportDestination,
    ReportFile,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedConfigOverride {
    pub target: ConfigOverrideTarget,
    pub value: String,
}

/// Parse a raw `KEY=VALUE` override string into a structured target.
pub fn parse_config_override(raw: &str) -> Result<ParsedConfigOverride, String> {
    let trimmed = raw.trim();
    let (key_raw, value_raw) = trimmed
        .split_once('=')
        .ok_or_else(|| "override must be in KEY=VALUE format".to_string())?;

    let value = value_raw.trim().to_string();
    let field =
        canonicalize_flag_name(key_raw).ok_or_else(|| "override key cannot be empty".to_string())?;

    let target = match field.as_str() {
        "poll_interval" | "poll_interval_secs" | "interval" => ConfigOverrideTarget::PollInterval,
        "collect_timeout" | "collect_timeout_secs" | "timeout" => {
            ConfigOverrideTarget::CollectTimeout
        }
        "log_level" => ConfigOverrideTarget::LogLevel,
        "log_format" => ConfigOverrideTarget::LogFormat,
        "log_file" => ConfigOverrideTarget::LogFile,
        "report" | "report_destination" => ConfigOverrideTarget::ReportDestination,
        "report_file" => ConfigOverrideTarget::ReportFile,
        other => return Err(format!("unknown config field '{other}'")),
    };

    if value.is_empty() {
        return Err(format!("override '{field}' needs a value"));
    }

    Ok(ParsedConfigOverride { target, value })
}

fn canonicalize_flag_name(name: &str) -> Option<String> {
    let mut cleaned = String::new();
    let mut previous_underscore = false;

    for ch in name.chars() {
        if ch.is_ascii_alphanumeric() {
            cleaned.push(ch.to_ascii_lowercase());
            previous_underscore = false;
        } else if !previous_underscore && !cleaned.is_empty() {
            cleaned.push('_');
            previous_underscore = true;
        }
    }

    let trimmed = cleaned.trim_matches('_');
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn parse_secs(raw: &str) -> Result<u64, WatchError> {
    raw.parse()
        .map_err(|_| WatchError::invalid_input(format!("'{raw}' is not a number of seconds")))
}

fn apply_override(
    overrides: &mut ConfigOverrides,
    parsed: ParsedConfigOverride,
) -> Result<(), WatchError> {
    let ParsedConfigOverride { target, value } = parsed;
    match target {
        ConfigOverrideTarget::PollInterval => {
            overrides.poll_interval_secs = Some(parse_secs(&value)?)
        }
        ConfigOverrideTarget::CollectTimeout => {
            overrides.collect_timeout_secs = Some(parse_secs(&value)?)
        }
        ConfigOverrideTarget::LogLevel => overrides.log_level = Some(value),
        ConfigOverrideTarget::LogFormat => overrides.log_format = Some(value),
        ConfigOverrideTarget::LogFile => overrides.log_file = Some(PathBuf::from(value)),
        ConfigOverrideTarget::ReportDestination => overrides.report_destination = Some(value),
        ConfigOverrideTarget::ReportFile => overrides.report_file = Some(PathBuf::from(value)),
    }
    Ok(())
}

/// Collects `--config-override` values first, then lets dedicated flags win.
pub fn overrides_from_cli(cli: &Cli) -> Result<ConfigOverrides, WatchError> {
    let mut overrides = ConfigOverrides::default();
    for raw in &cli.config_override {
        let parsed = parse_config_override(raw).map_err(WatchError::invalid_input)?;
        apply_override(&mut overrides, parsed)?;
    }

    if cli.interval.is_some() {
        overrides.poll_interval_secs = cli.interval;
    }
    if cli.timeout.is_some() {
        overrides.collect_timeout_secs = cli.timeout;
    }
    if let Some(path) = cli.log_file.as_ref() {
        overrides.log_file = Some(path.clone());
    }
    if let Some(format) = cli.log_format.as_ref() {
        overrides.log_format = Some(format.clone());
    }
    if let Some(destination) = cli.report.as_ref() {
        overrides.report_destination = Some(destination.clone());
    }
    if let Some(path) = cli.report_file.as_ref() {
        overrides.report_file = Some(path.clone());
    }

    Ok(overrides)
}
