use clap::Parser;
use tabled::{Table, Tabled};
use taskwatch_cli::cli::{Cli, Command, overrides_from_cli};
use taskwatch_core::config::{Settings, load_config_with_fallback, merge_overrides};
use taskwatch_core::error::WatchError;
use taskwatch_core::logging::init_logging;
use taskwatch_core::model::Snapshot;
use taskwatch_core::watch_api;
use time::format_description::well_known::Rfc3339;
use tokio::sync::watch;
use tracing::{error, info, warn};

#[derive(Tabled)]
struct TaskRow {
    #[tabled(rename = "Task")]
    identity: String,
    #[tabled(rename = "Trigger")]
    trigger: String,
    #[tabled(rename = "Command")]
    command: String,
    #[tabled(rename = "State")]
    state: String,
    #[tabled(rename = "Last run")]
    last_run: String,
}

fn cell(value: Option<&str>) -> String {
    value.unwrap_or("-").to_string()
}

fn print_snapshot_plain(snapshot: &Snapshot) {
    if snapshot.is_empty() {
        println!("No scheduled tasks found.");
        return;
    }

    let rows = snapshot.tasks().map(|task| TaskRow {
        identity: task.identity.clone(),
        trigger: cell(task.trigger_spec.as_deref()),
        command: cell(task.command.as_deref()),
        state: cell(task.state.as_deref()),
        last_run: cell(task.last_run_time.as_deref()),
    });
    println!("{}", Table::new(rows));
}

fn print_snapshot_json(snapshot: &Snapshot) -> Result<(), WatchError> {
    let captured_at = snapshot
        .captured_at()
        .format(&Rfc3339)
        .map_err(|err| WatchError::invalid_data(err.to_string()))?;
    let tasks: Vec<_> = snapshot.tasks().collect();
    let json = serde_json::json!({
        "captured_at": captured_at,
        "tasks": tasks,
    });
    println!("{}", json);
    Ok(())
}

fn normalize_parse_error(err: clap::Error) -> WatchError {
    let rendered = err.to_string();
    let first_line = rendered.lines().next().unwrap_or("invalid command").trim();
    let message = first_line
        .strip_prefix("error: ")
        .unwrap_or(first_line)
        .to_string();
    WatchError::invalid_input(message)
}

async fn shutdown_signal(shutdown: watch::Sender<bool>) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut terminate = match signal(SignalKind::terminate()) {
            Ok(terminate) => terminate,
            Err(err) => {
                warn!(error = %err, "cannot listen for SIGTERM");
                if tokio::signal::ctrl_c().await.is_ok() {
                    shutdown.send_replace(true);
                }
                return;
            }
        };
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                if let Err(err) = result {
                    error!(error = %err, "cannot listen for interrupt signal");
                    return;
                }
            }
            _ = terminate.recv() => {}
        }
    }

    #[cfg(not(unix))]
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(error = %err, "cannot listen for interrupt signal");
        return;
    }

    info!("interrupt received, stopping at the next poll boundary");
    shutdown.send_replace(true);
}

async fn watch_until_interrupted(settings: &Settings) -> Result<(), WatchError> {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(shutdown_signal(shutdown_tx));
    watch_api::monitor(settings, shutdown_rx).await?;
    Ok(())
}

fn run(cli: Cli) -> Result<(), WatchError> {
    let overrides = overrides_from_cli(&cli)?;
    let loaded = load_config_with_fallback();
    let config = merge_overrides(&loaded.config, &overrides);
    let settings = Settings::resolve(&config)?;

    init_logging(&settings.log)?;
    if let Some(err) = loaded.error {
        warn!(code = err.code(), error = %err.message(), "ignoring unreadable config file");
    }

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|err| WatchError::io(err.to_string()))?;

    match cli.command.unwrap_or(Command::Watch) {
        Command::Watch => runtime.block_on(watch_until_interrupted(&settings)),
        Command::Snapshot { json } => {
            let snapshot = runtime.block_on(watch_api::collect_snapshot(&settings))?;
            if json {
                print_snapshot_json(&snapshot)
            } else {
                print_snapshot_plain(&snapshot);
                Ok(())
            }
        }
    }
}

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) if !err.use_stderr() => err.exit(),
        Err(err) => {
            eprintln!("ERROR: {}", normalize_parse_error(err));
            std::process::exit(1);
        }
    };

    if let Err(err) = run(cli) {
        eprintln!("ERROR: {}", err);
        std::process::exit(1);
    }
}
