use std::sync::Arc;

use tokio::signal::unix::{signal, Signal, SignalKind};
use tokio::sync::broadcast;

use lsync_core::Config;
use lsync_policy::{Policy, TemplatePolicy};

use crate::backend;
use crate::engine::Engine;
use crate::error::{io_err, EngineError};
use crate::reset::{ResetFlag, ResetReason};
use crate::spawn::{ProcessTable, Spawner};
use crate::startup::StartupReport;

/// Start the daemon on a fresh multi-threaded tokio runtime and block until
/// it shuts down.
pub fn start_blocking(config: Config) -> Result<(), EngineError> {
    init_tracing();
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| io_err("tokio-runtime", e))?;
    runtime.block_on(run(config))
}

/// Run the daemon: build the watch tree, process events, rebuild on
/// `SIGHUP` or queue overflow, and return on `SIGTERM`/`SIGINT`.
pub async fn run(config: Config) -> Result<(), EngineError> {
    config.validate()?;
    let policy: Arc<dyn Policy> = Arc::new(TemplatePolicy::new(&config)?);
    let reset = ResetFlag::new();
    let (shutdown_tx, _) = broadcast::channel::<()>(1);

    let signals = Signals::install()?;
    let signal_handle = {
        let reset = reset.clone();
        let shutdown_rx = shutdown_tx.subscribe();
        tokio::spawn(async move { signal_task(signals, reset, shutdown_rx).await })
    };

    let result = supervise(&config, policy, reset).await;
    let _ = shutdown_tx.send(());
    handle_join("signal_handler", signal_handle.await)?;
    result
}

/// One engine generation per iteration. Children still running when a
/// generation ends are handed to the next one.
async fn supervise(
    config: &Config,
    policy: Arc<dyn Policy>,
    reset: ResetFlag,
) -> Result<(), EngineError> {
    let mut pending = ProcessTable::new();
    let mut generation: u64 = 0;
    loop {
        generation += 1;
        let (notifier, events) = backend::open()?;
        let spawner = Spawner::new(config.settings.action_log.clone());
        let mut engine =
            Engine::new(notifier, policy.clone(), spawner, reset.clone()).with_pending(pending);

        tracing::info!(generation, roots = config.roots.len(), "building watch tree");
        let report = engine.startup(&config.roots).await?;
        log_report(&report);

        let reason = match reset.take() {
            Some(reason) => reason,
            None => {
                let stopped_by = engine.run(events).await?;
                reset.take().unwrap_or(stopped_by)
            }
        };
        pending = engine.into_pending();

        match reason {
            ResetReason::Shutdown => {
                tracing::info!(running = pending.len(), "shutting down");
                return Ok(());
            }
            ResetReason::Restart => {
                tracing::info!(running = pending.len(), "restarting watch tree");
            }
        }
    }
}

fn log_report(report: &StartupReport) {
    tracing::info!(
        roots = report.roots,
        watched = report.watched,
        spawned = report.spawned,
        skipped = report.skipped.len(),
        failures = report.failures.len(),
        aborted = report.aborted,
        duration_ms = report.duration_ms as u64,
        "startup complete"
    );
    for failure in &report.failures {
        tracing::warn!(label = %failure.label, outcome = %failure.outcome, "startup sync failed");
    }
}

/// Handlers are installed before the first watch so an early signal never
/// hits the default disposition.
struct Signals {
    hangup: Signal,
    terminate: Signal,
    interrupt: Signal,
}

impl Signals {
    fn install() -> Result<Self, EngineError> {
        Ok(Self {
            hangup: signal(SignalKind::hangup()).map_err(|e| io_err("SIGHUP", e))?,
            terminate: signal(SignalKind::terminate()).map_err(|e| io_err("SIGTERM", e))?,
            interrupt: signal(SignalKind::interrupt()).map_err(|e| io_err("SIGINT", e))?,
        })
    }
}

async fn signal_task(
    mut signals: Signals,
    reset: ResetFlag,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), EngineError> {
    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => return Ok(()),
            Some(()) = signals.hangup.recv() => {
                tracing::info!("received SIGHUP, scheduling restart");
                reset.raise(ResetReason::Restart);
            }
            Some(()) = signals.terminate.recv() => {
                tracing::info!("received SIGTERM, shutting down");
                reset.raise(ResetReason::Shutdown);
            }
            Some(()) = signals.interrupt.recv() => {
                tracing::info!("received SIGINT, shutting down");
                reset.raise(ResetReason::Shutdown);
            }
        }
    }
}

fn handle_join(
    task: &str,
    result: Result<Result<(), EngineError>, tokio::task::JoinError>,
) -> Result<(), EngineError> {
    match result {
        Ok(inner) => inner,
        Err(err) => Err(EngineError::Runtime(format!(
            "{task} task join failure: {err}"
        ))),
    }
}

fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).with_target(false).try_init();
}
