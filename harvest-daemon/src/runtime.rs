use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio::time::{Instant, MissedTickBehavior};

use harvest_core::config;
use harvest_sync::pipeline::{self, RunRequest};
use harvest_sync::RunCounters;

use crate::error::{io_err, DaemonError};

/// File under `~/.harvest` holding the latest scheduled run's summary.
pub const LAST_RUN_FILE: &str = "last-run.json";

/// Outcome of one scheduled run, persisted for `harvest status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub finished_at_unix: u64,
    pub duration_ms: u128,
    pub counters: Option<RunCounters>,
    /// Set when the run failed as a whole.
    pub error: Option<String>,
}

impl RunSummary {
    pub fn path(home: &Path) -> PathBuf {
        config::harvest_root(home).join(LAST_RUN_FILE)
    }

    /// Latest summary, or `None` when the daemon has not completed a run yet.
    pub fn load(home: &Path) -> Result<Option<Self>, DaemonError> {
        let path = Self::path(home);
        if !path.exists() {
            return Ok(None);
        }
        let text = fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
        let summary = serde_json::from_str(&text).map_err(|e| {
            io_err(&path, std::io::Error::new(std::io::ErrorKind::InvalidData, e))
        })?;
        Ok(Some(summary))
    }

    fn save(&self, home: &Path) -> Result<(), DaemonError> {
        let path = Self::path(home);
        let root = config::harvest_root(home);
        fs::create_dir_all(&root).map_err(|e| io_err(&root, e))?;
        let json = serde_json::to_string_pretty(self).map_err(|e| {
            io_err(&path, std::io::Error::new(std::io::ErrorKind::InvalidData, e))
        })?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json).map_err(|e| io_err(&tmp, e))?;
        fs::rename(&tmp, &path).map_err(|e| io_err(&path, e))
    }
}

/// Start the scheduler and block the current thread until ctrl-c.
///
/// `interval` overrides the configured `interval_secs`.
pub fn start_blocking(home: &Path, interval: Option<Duration>) -> Result<(), DaemonError> {
    init_tracing();
    let interval = match interval {
        Some(interval) => interval,
        None => Duration::from_secs(config::load_at(home)?.interval_secs.max(1)),
    };
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| io_err("tokio-runtime", e))?;
    runtime.block_on(run(home.to_path_buf(), interval))
}

/// Run the scheduler until ctrl-c.
pub async fn run(home: PathBuf, interval: Duration) -> Result<(), DaemonError> {
    let (shutdown_tx, _) = broadcast::channel::<()>(4);

    let scheduler_handle = {
        let shutdown = shutdown_tx.clone();
        tokio::spawn(async move {
            let result = scheduler_task(home, interval, shutdown.subscribe()).await;
            let _ = shutdown.send(());
            result.map(|_| ())
        })
    };

    let signal_handle = {
        let shutdown = shutdown_tx.clone();
        tokio::spawn(async move {
            let mut shutdown_rx = shutdown.subscribe();
            tokio::select! {
                _ = shutdown_rx.recv() => Ok(()),
                signal = tokio::signal::ctrl_c() => {
                    match signal {
                        Ok(()) => {
                            tracing::info!("received ctrl-c, shutting down daemon");
                            let _ = shutdown.send(());
                            Ok(())
                        }
                        Err(err) => Err(DaemonError::Signal(err.to_string())),
                    }
                }
            }
        })
    };

    let (scheduler_result, signal_result) = tokio::join!(scheduler_handle, signal_handle);
    handle_join("scheduler", scheduler_result)?;
    handle_join("signal_handler", signal_result)?;
    Ok(())
}

/// Runs on every tick until shutdown. Returns the number of runs started.
async fn scheduler_task(
    home: PathBuf,
    interval: Duration,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<usize, DaemonError> {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    tracing::info!(interval_secs = interval.as_secs(), "scheduler started");

    let mut runs = 0usize;
    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            _ = ticker.tick() => {
                runs += 1;
                let summary = run_once(home.clone()).await?;
                if let Err(err) = summary.save(&home) {
                    tracing::warn!(error = %err, "could not persist run summary");
                }
            }
        }
    }

    tracing::info!(runs, "scheduler stopped");
    Ok(runs)
}

/// Execute one pipeline run on the blocking pool.
///
/// A failed run is reported in the summary, not as an error; only a panicked
/// run task is an error.
pub async fn run_once(home: PathBuf) -> Result<RunSummary, DaemonError> {
    let started = Instant::now();
    let result = tokio::task::spawn_blocking(move || pipeline::run(&home, &RunRequest::default()))
        .await
        .map_err(|err| DaemonError::Join {
            task: "pipeline",
            reason: err.to_string(),
        })?;
    let duration_ms = started.elapsed().as_millis();

    let summary = match result {
        Ok(report) => {
            let c = report.counters;
            tracing::info!(
                total = c.total,
                created = c.created,
                changed = c.changed,
                unchanged = c.unchanged,
                needing_summary = c.needing_summary,
                needing_classification = c.needing_classification,
                errors = c.errors,
                duration_ms = duration_ms as u64,
                "scheduled run finished"
            );
            RunSummary {
                finished_at_unix: unix_seconds_now(),
                duration_ms,
                counters: Some(c),
                error: None,
            }
        }
        Err(err) => {
            tracing::error!(error = %err, duration_ms = duration_ms as u64, "scheduled run failed");
            RunSummary {
                finished_at_unix: unix_seconds_now(),
                duration_ms,
                counters: None,
                error: Some(err.to_string()),
            }
        }
    };
    Ok(summary)
}

fn handle_join(
    task: &'static str,
    result: Result<Result<(), DaemonError>, tokio::task::JoinError>,
) -> Result<(), DaemonError> {
    match result {
        Ok(inner) => inner,
        Err(err) => Err(DaemonError::Join {
            task,
            reason: err.to_string(),
        }),
    }
}

fn unix_seconds_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Install the process-wide subscriber. Records from the library crates'
/// `log` facade are bridged in. Output goes to stderr so stdout stays free
/// for command output.
///
/// `RUST_LOG` selects the filter (default `info`); `HARVEST_LOG_FORMAT=json`
/// switches to JSON lines. Calling it again is a no-op.
pub fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("HARVEST_LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    let _ = if json {
        fmt()
            .json()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .try_init()
    } else {
        fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .try_init()
    };
}
