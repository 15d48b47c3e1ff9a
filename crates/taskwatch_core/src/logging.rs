use crate::config::{LogSettings, OutputFormat};
use crate::error::WatchError;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::MakeWriter;

/// Installs the global `tracing` subscriber. `RUST_LOG` takes precedence over
/// the configured level.
pub fn init_logging(settings: &LogSettings) -> Result<(), WatchError> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&settings.level))
        .map_err(|err| WatchError::invalid_input(format!("invalid log level: {err}")))?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);

    let installed = match (settings.format, settings.file.as_deref()) {
        (OutputFormat::Text, None) => builder.with_writer(std::io::stderr).try_init(),
        (OutputFormat::Json, None) => builder.json().with_writer(std::io::stderr).try_init(),
        (OutputFormat::Text, Some(path)) => builder
            .with_ansi(false)
            .with_writer(SharedFile::open(path)?)
            .try_init(),
        (OutputFormat::Json, Some(path)) => builder
            .json()
            .with_writer(SharedFile::open(path)?)
            .try_init(),
    };

    installed.map_err(|err| WatchError::io(format!("cannot install logger: {err}")))
}

/// Append-mode file shared by every writer handed out to the subscriber.
#[derive(Clone)]
pub struct SharedFile {
    file: Arc<Mutex<File>>,
}

impl SharedFile {
    pub fn open(path: &Path) -> Result<Self, WatchError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)
                .map_err(|err| WatchError::io(format!("{}: {}", parent.display(), err)))?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|err| WatchError::io(format!("{}: {}", path.display(), err)))?;

        Ok(Self {
            file: Arc::new(Mutex::new(file)),
        })
    }
}

impl Write for SharedFile {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let mut file = self
            .file
            .lock()
            .map_err(|_| std::io::Error::other("log file mutex poisoned"))?;
        file.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        let mut file = self
            .file
            .lock()
            .map_err(|_| std::io::Error::other("log file mutex poisoned"))?;
        file.flush()
    }
}

impl<'a> MakeWriter<'a> for SharedFile {
    type Writer = SharedFile;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}
