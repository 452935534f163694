use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use notify::{recommended_watcher, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::{broadcast, mpsc};

use variants_core::{config, Config};
use variants_sync::timing::SETTLE_WINDOW;

use crate::debounce::Debouncer;
use crate::error::{io_err, join_err, DaemonError};
use crate::open::{Launcher, SystemLauncher};
use crate::orchestrator::{DispatchKey, Orchestrator};
use crate::server::{create_router, AppState};

/// Daemon start-up options; `None` fields fall back to `variants.yaml`.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub root: PathBuf,
    pub port: Option<u16>,
    pub log_json: bool,
}

/// Start the daemon and block the current thread until it exits.
pub fn start_blocking(options: RunOptions) -> Result<(), DaemonError> {
    let config = config::load_at(&options.root)?;
    init_tracing(options.log_json || config.log.json);
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| io_err("tokio-runtime", e))?;
    runtime.block_on(run(options.root, config, options.port))
}

/// Discover units under `root`, then run the watcher, control-plane server
/// and signal handler until one of them stops.
pub async fn run(root: PathBuf, config: Config, port: Option<u16>) -> Result<(), DaemonError> {
    let orchestrator = Arc::new(Orchestrator::new(root, config)?);
    orchestrator.discover().await?;

    let addr = bind_address(orchestrator.config(), port)?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| io_err(addr.to_string(), e))?;
    tracing::info!(addr = %addr, root = %orchestrator.root().display(), "control plane listening");

    let launcher: Arc<dyn Launcher> = Arc::new(SystemLauncher);
    let (shutdown_tx, _) = broadcast::channel::<()>(16);

    let watcher_handle = {
        let shutdown = shutdown_tx.clone();
        let orchestrator = orchestrator.clone();
        tokio::spawn(async move {
            let result = watcher_task(orchestrator, shutdown.subscribe()).await;
            let _ = shutdown.send(());
            result
        })
    };

    let server_handle = {
        let shutdown = shutdown_tx.clone();
        let state = AppState {
            orchestrator: orchestrator.clone(),
            launcher,
        };
        tokio::spawn(async move {
            let mut shutdown_rx = shutdown.subscribe();
            let result = axum::serve(listener, create_router(state))
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.recv().await;
                })
                .await
                .map_err(|e| io_err(addr.to_string(), e));
            let _ = shutdown.send(());
            result
        })
    };

    let signal_handle = {
        let shutdown = shutdown_tx.clone();
        tokio::spawn(async move {
            let mut shutdown_rx = shutdown.subscribe();
            tokio::select! {
                _ = shutdown_rx.recv() => Ok(()),
                signal = tokio::signal::ctrl_c() => {
                    let _ = shutdown.send(());
                    match signal {
                        Ok(()) => {
                            tracing::info!("received ctrl-c, shutting down");
                            Ok(())
                        }
                        Err(err) => Err(io_err("ctrl-c handler", err)),
                    }
                }
            }
        })
    };

    let (watcher_result, server_result, signal_result) =
        tokio::join!(watcher_handle, server_handle, signal_handle);

    handle_join("watcher", watcher_result)?;
    handle_join("server", server_result)?;
    handle_join("signal_handler", signal_result)?;
    Ok(())
}

fn bind_address(config: &Config, port: Option<u16>) -> Result<SocketAddr, DaemonError> {
    let host = config.server.host.trim();
    let port = port.unwrap_or(config.server.port);
    format!("{host}:{port}").parse().map_err(|_| {
        DaemonError::InvalidRequest(format!("invalid server address {host}:{port}"))
    })
}

async fn watcher_task(
    orchestrator: Arc<Orchestrator>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), DaemonError> {
    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<notify::Result<Event>>();
    let mut watcher: RecommendedWatcher = recommended_watcher(move |event| {
        let _ = event_tx.send(event);
    })?;
    watch_root(&mut watcher, orchestrator.root())?;

    let (mut debouncer, mut fired) = Debouncer::<DispatchKey>::new(SETTLE_WINDOW);

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            event = event_rx.recv() => {
                let Some(event) = event else {
                    return Err(DaemonError::ChannelClosed("watcher events"));
                };
                match event {
                    Ok(event) => orchestrator.handle_event(event, &mut debouncer).await,
                    Err(err) => tracing::warn!(error = %err, "watcher event error"),
                }
            }
            key = fired.recv() => {
                let Some(key) = key else { break };
                let orchestrator = orchestrator.clone();
                tokio::spawn(async move {
                    let unit = key.0.clone();
                    if let Err(err) = orchestrator.reconcile(key).await {
                        tracing::error!(unit = %unit, error = %err, "reconcile failed");
                    }
                });
            }
        }
    }

    debouncer.cancel_all();
    Ok(())
}

fn watch_root(watcher: &mut RecommendedWatcher, root: &Path) -> Result<(), DaemonError> {
    watcher.watch(root, RecursiveMode::Recursive)?;
    tracing::debug!(path = %root.display(), "watching root");
    Ok(())
}

fn handle_join(
    task: &'static str,
    result: Result<Result<(), DaemonError>, tokio::task::JoinError>,
) -> Result<(), DaemonError> {
    match result {
        Ok(inner) => inner,
        Err(err) => Err(join_err(task, err)),
    }
}

/// Install the global subscriber. `RUST_LOG` overrides the `info` default.
pub fn init_tracing(json: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = fmt().with_env_filter(filter).with_target(false);
    let _ = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}
