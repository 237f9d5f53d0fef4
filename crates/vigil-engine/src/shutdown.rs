// SPDX-FileCopyrightText: 2026 Vigil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Graceful shutdown coordination with signal handling.
//!
//! SIGTERM and SIGINT (Ctrl+C) cancel a [`CancellationToken`] watched by the
//! scheduler jobs and the gateway listener. Jobs are then given a grace
//! period to finish before they are aborted.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Installs handlers for SIGTERM and SIGINT.
///
/// Returns a token that is cancelled when either signal arrives.
pub fn install_signal_handler() -> CancellationToken {
    let token = CancellationToken::new();
    let token_clone = token.clone();

    tokio::spawn(async move {
        let ctrl_c = tokio::signal::ctrl_c();

        #[cfg(unix)]
        {
            use tokio::signal::unix::{SignalKind, signal};
            match signal(SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    tokio::select! {
                        _ = ctrl_c => info!("received SIGINT (Ctrl+C), initiating shutdown"),
                        _ = sigterm.recv() => info!("received SIGTERM, initiating shutdown"),
                    }
                }
                Err(e) => {
                    error!(error = %e, "failed to install SIGTERM handler, listening for Ctrl+C only");
                    if !ctrl_c_received(ctrl_c.await) {
                        std::future::pending::<()>().await;
                    }
                }
            }
        }

        #[cfg(not(unix))]
        {
            if !ctrl_c_received(ctrl_c.await) {
                std::future::pending::<()>().await;
            }
        }

        token_clone.cancel();
        debug!("shutdown signal handler completed");
    });

    token
}

/// Logs the outcome of waiting for Ctrl+C. Returns whether it arrived.
///
/// On failure no graceful signal can ever arrive, so the caller keeps the
/// token live instead of shutting down at once.
fn ctrl_c_received(result: std::io::Result<()>) -> bool {
    match result {
        Ok(()) => {
            info!("received SIGINT (Ctrl+C), initiating shutdown");
            true
        }
        Err(e) => {
            error!(error = %e, "failed to listen for Ctrl+C, graceful shutdown unavailable");
            false
        }
    }
}

/// Waits up to `grace` for job handles to finish, then aborts the rest.
///
/// Returns how many jobs had to be aborted.
pub async fn drain_jobs(handles: Vec<JoinHandle<()>>, grace: Duration) -> usize {
    if handles.is_empty() {
        info!("no scheduler jobs to drain");
        return 0;
    }

    info!(count = handles.len(), "waiting for scheduler jobs to stop");
    let aborts: Vec<_> = handles.iter().map(JoinHandle::abort_handle).collect();

    match tokio::time::timeout(grace, futures::future::join_all(handles)).await {
        Ok(results) => {
            for result in results {
                if let Err(e) = result
                    && e.is_panic()
                {
                    error!(error = %e, "scheduler job panicked");
                }
            }
            info!("all scheduler jobs stopped");
            0
        }
        Err(_) => {
            let remaining = aborts.iter().filter(|a| !a.is_finished()).count();
            for handle in &aborts {
                handle.abort();
            }
            warn!(remaining, "grace period elapsed, aborting scheduler jobs");
            remaining
        }
    }
}
