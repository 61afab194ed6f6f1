mod bridge;
mod capture;
mod classify;
mod config;
mod control;
mod error;
mod event;
mod history;
mod model;
mod normalize;
mod paths;
mod permission;
mod sink;
mod status;

use std::io::BufReader;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use crate::bridge::{EventBridge, SessionState};
use crate::control::ControlSurface;
use crate::error::PipelineError;
use crate::event::DaemonEvent;
use crate::permission::{PermissionGate, RegistryFile};
use crate::sink::DaemonSink;
use crate::status::StatusFile;

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();

    // ── App data directory ────────────────────────────────────────────────────
    let app_dir = paths::app_data_dir();
    std::fs::create_dir_all(&app_dir)
        .with_context(|| format!("Failed to create app data directory {}", app_dir.display()))?;

    // ── Configuration ─────────────────────────────────────────────────────────
    let config_path = paths::config_file_path();
    let mut current_config = config::load_or_default(&config_path).unwrap_or_else(|e| {
        error!("Config error (using defaults): {e:#}");
        config::Config::default()
    });

    // ── Initial status ────────────────────────────────────────────────────────
    let status = Arc::new(StatusFile::create(paths::status_file_path()));

    // ── Permission gate, bridge and sink ──────────────────────────────────────
    let global = &current_config.global;
    let registry_path = global.registry_path(paths::registry_file_path());
    let registry = RegistryFile::new(registry_path.clone(), global.settings_command.clone());
    let gate = PermissionGate::new(global.app_id.clone(), Arc::new(registry));
    let bridge = Arc::new(EventBridge::new(gate, global.effective_queue_capacity()));
    let sink = Arc::new(DaemonSink::new(
        Box::new(std::io::stdout()),
        global.effective_history_length(),
        Arc::clone(&status),
    ));
    let control = ControlSurface::new(Arc::clone(&bridge), sink.clone());

    let (event_tx, mut event_rx) = mpsc::channel::<DaemonEvent>(32);

    // ── Background tasks ──────────────────────────────────────────────────────
    tokio::spawn(config::watch_config(config_path, event_tx.clone()));
    tokio::spawn(config::watch_registry(registry_path, event_tx.clone()));

    let capture_thread = capture::spawn(
        BufReader::new(std::io::stdin()),
        Arc::clone(&bridge),
        event_tx.clone(),
    )
    .context("Failed to start capture reader")?;

    // Graceful shutdown on Ctrl+C.
    {
        let tx = event_tx.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                let _ = tx.send(DaemonEvent::Shutdown).await;
            }
        });
    }

    info!(
        app_id = %bridge.gate().app_id(),
        "sentinel-daemon v{} started",
        env!("CARGO_PKG_VERSION")
    );

    let mut want_listening = current_config.global.listening;
    reconcile(&control, &status, want_listening, true).await;

    // ── Event loop ────────────────────────────────────────────────────────────
    let mut capture_closed = false;
    while let Some(evt) = event_rx.recv().await {
        match evt {
            DaemonEvent::ConfigReloaded(new_config) => {
                info!("Config reloaded");
                let (old, new) = (&current_config.global, &new_config.global);
                if old.app_id != new.app_id
                    || old.listeners_registry != new.listeners_registry
                    || old.settings_command != new.settings_command
                    || old.queue_capacity != new.queue_capacity
                {
                    warn!("Changes to app_id, listeners_registry, settings_command or queue_capacity apply after restart");
                }
                sink.resize_history(new.effective_history_length());
                if new.listening != want_listening {
                    want_listening = new.listening;
                    reconcile(&control, &status, want_listening, true).await;
                }
                current_config = new_config;
            }

            DaemonEvent::AccessChanged => {
                let granted = control.is_notification_access_granted().unwrap_or_else(|e| {
                    warn!("{e}");
                    false
                });
                info!(granted, "Notification access changed");
                status.update(|s| s.access_granted = granted);
                if want_listening && granted && !bridge.is_listening() {
                    reconcile(&control, &status, true, false).await;
                }
            }

            DaemonEvent::CaptureClosed => {
                info!("Capture source closed");
                capture_closed = true;
                break;
            }

            DaemonEvent::Shutdown => {
                info!("Shutting down");
                break;
            }
        }
    }

    bridge.teardown().await;
    status.update(|s| {
        s.state = SessionState::Stopped;
        s.error = None;
    });

    let stats = bridge.stats();
    info!(
        delivered = stats.delivered,
        ignored = stats.ignored,
        dropped = stats.dropped,
        failed = stats.failed,
        "Stopped"
    );

    // On Ctrl+C the reader may still be blocked on stdin; it ends with the process.
    if capture_closed && capture_thread.join().is_err() {
        error!("Capture reader panicked");
    }
    Ok(())
}

/// Starts or stops the session to match `want_listening` and records the
/// outcome in the status file.  When access is missing and `request_access`
/// is set, the settings surface is opened.
async fn reconcile(
    control: &ControlSurface,
    status: &StatusFile,
    want_listening: bool,
    request_access: bool,
) {
    let granted = control.bridge().gate().is_granted();

    if !want_listening {
        let message = control.stop_listening().await;
        debug!("{message}");
        status.update(|s| {
            s.state = SessionState::Stopped;
            s.access_granted = granted;
            s.error = None;
        });
        return;
    }

    match control.start_listening() {
        Ok(message) => {
            info!("{message}");
            status.update(|s| {
                s.state = SessionState::Listening;
                s.access_granted = granted;
                s.error = None;
            });
        }
        Err(e @ PipelineError::PermissionDenied) => {
            warn!(code = e.code(), "{e}; waiting for access to be granted");
            if request_access {
                if let Err(settings_err) = control.open_notification_settings() {
                    error!(code = settings_err.code(), "{settings_err}");
                }
            }
            status.update(|s| {
                s.state = SessionState::Stopped;
                s.access_granted = false;
                s.error = Some(e.to_string());
            });
        }
        Err(e) => {
            error!(code = e.code(), "Failed to start listening: {e}");
            status.update(|s| {
                s.state = SessionState::Stopped;
                s.access_granted = granted;
                s.error = Some(e.to_string());
            });
        }
    }
}

fn init_logging() {
    // stdout carries the classified events, so logs go to stderr.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("sentinel_daemon=info"));

    fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .with_target(false)
        .init();
}
