use crate::config::{OutputFormat, ReportDestination, ReportSettings};
use crate::diff::ChangeEvent;
use crate::error::WatchError;
use crate::logging::SharedFile;
use crate::model::TaskRecord;
use std::io::Write;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::{info, warn};

const NOT_REPORTED: &str = "N/A";

/// Receives every change found by a poll cycle.
pub trait Reporter {
    fn report(&mut self, event: &ChangeEvent<'_>) -> Result<(), WatchError>;
}

impl<R: Reporter + ?Sized> Reporter for Box<R> {
    fn report(&mut self, event: &ChangeEvent<'_>) -> Result<(), WatchError> {
        (**self).report(event)
    }
}

pub fn build_reporter(settings: &ReportSettings) -> Result<Box<dyn Reporter>, WatchError> {
    match &settings.destination {
        ReportDestination::Log => Ok(Box::new(TracingReporter)),
        ReportDestination::Stdout => Ok(Box::new(WriterReporter::new(
            std::io::stdout(),
            settings.format,
        ))),
        ReportDestination::File(path) => Ok(Box::new(WriterReporter::new(
            SharedFile::open(path)?,
            settings.format,
        ))),
    }
}

fn field(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or(NOT_REPORTED)
}

/// Emits changes as `tracing` events on the diagnostic log stream.
pub struct TracingReporter;

impl Reporter for TracingReporter {
    fn report(&mut self, event: &ChangeEvent<'_>) -> Result<(), WatchError> {
        match event {
            ChangeEvent::Added(task) => info!(
                event_kind = "added",
                identity = %task.identity,
                trigger = field(&task.trigger_spec),
                command = field(&task.command),
                last_run_time = field(&task.last_run_time),
                path = field(&task.path),
                state = field(&task.state),
                actions = field(&task.raw_actions),
                "scheduled task added"
            ),
            ChangeEvent::Removed(identity) => warn!(
                event_kind = "removed",
                identity = %identity,
                "scheduled task removed"
            ),
            ChangeEvent::Updated(update) => info!(
                event_kind = "updated",
                identity = %update.identity,
                old_trigger = field(&update.previous.trigger_spec),
                new_trigger = field(&update.current.trigger_spec),
                old_command = field(&update.previous.command),
                new_command = field(&update.current.command),
                last_run_time = field(&update.current.last_run_time),
                path = field(&update.current.path),
                state = field(&update.current.state),
                actions = field(&update.current.raw_actions),
                "scheduled task updated"
            ),
        }
        Ok(())
    }
}

/// Writes one line per change, as text or JSON, to any writer.
pub struct WriterReporter<W: Write> {
    writer: W,
    format: OutputFormat,
}

impl<W: Write> WriterReporter<W> {
    pub fn new(writer: W, format: OutputFormat) -> Self {
        Self { writer, format }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    fn render(&self, event: &ChangeEvent<'_>, observed_at: &str) -> Result<String, WatchError> {
        match self.format {
            OutputFormat::Text => Ok(render_text(event, observed_at)),
            OutputFormat::Json => {
                let mut payload = serde_json::json!({
                    "observed_at": observed_at,
                    "event_kind": event.kind(),
                    "identity": event.identity(),
                });
                match event {
                    ChangeEvent::Added(task) => {
                        payload["task"] = to_value(task)?;
                    }
                    ChangeEvent::Removed(_) => {}
                    ChangeEvent::Updated(update) => {
                        payload["previous"] = to_value(&update.previous)?;
                        payload["current"] = to_value(&update.current)?;
                    }
                }
                Ok(payload.to_string())
            }
        }
    }
}

impl<W: Write> Reporter for WriterReporter<W> {
    fn report(&mut self, event: &ChangeEvent<'_>) -> Result<(), WatchError> {
        let observed_at = OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .map_err(|err| WatchError::invalid_data(err.to_string()))?;
        let line = self.render(event, &observed_at)?;
        writeln!(self.writer, "{line}").map_err(|err| WatchError::io(err.to_string()))?;
        self.writer
            .flush()
            .map_err(|err| WatchError::io(err.to_string()))
    }
}

fn to_value(task: &TaskRecord) -> Result<serde_json::Value, WatchError> {
    serde_json::to_value(task).map_err(|err| WatchError::invalid_data(err.to_string()))
}

fn render_text(event: &ChangeEvent<'_>, observed_at: &str) -> String {
    match event {
        ChangeEvent::Added(task) => format!(
            "{observed_at} added {:?} trigger={:?} command={:?} last_run_time={:?} path={:?} state={:?} actions={:?}",
            task.identity,
            field(&task.trigger_spec),
            field(&task.command),
            field(&task.last_run_time),
            field(&task.path),
            field(&task.state),
            field(&task.raw_actions),
        ),
        ChangeEvent::Removed(identity) => format!("{observed_at} removed {identity:?}"),
        ChangeEvent::Updated(update) => format!(
            "{observed_at} updated {:?} trigger={:?}->{:?} command={:?}->{:?} last_run_time={:?} path={:?} state={:?} actions={:?}",
            update.identity,
            field(&update.previous.trigger_spec),
            field(&update.current.trigger_spec),
            field(&update.previous.command),
            field(&update.current.command),
            field(&update.current.last_run_time),
            field(&update.current.path),
            field(&update.current.state),
            field(&update.current.raw_actions),
        ),
    }
}
