//! Signal handling for `sync`.
//!
//! The first SIGINT / SIGTERM / SIGHUP cancels the returned
//! [`CancellationToken`]: the engine stops dispatching assets, lets the
//! in-flight ones finish, and a watch loop exits instead of sleeping. A
//! second signal exits immediately with status 130.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use anyhow::Context;
use tokio_util::sync::CancellationToken;

/// Register the signal listeners and spawn the task that watches them.
///
/// Registration happens before spawning so a failure surfaces here rather
/// than inside the background task.
pub(crate) fn install_signal_handler() -> anyhow::Result<CancellationToken> {
    let token = CancellationToken::new();
    let signals = Arc::new(AtomicU32::new(0));

    #[cfg(unix)]
    let (mut sigterm, mut sighup) = {
        use tokio::signal::unix::{signal, SignalKind};
        (
            signal(SignalKind::terminate()).context("Failed to listen for SIGTERM")?,
            signal(SignalKind::hangup()).context("Failed to listen for SIGHUP")?,
        )
    };

    let handler_token = token.clone();
    tokio::spawn(async move {
        loop {
            #[cfg(unix)]
            {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = sigterm.recv() => {}
                    _ = sighup.recv() => {}
                }
            }

            #[cfg(not(unix))]
            {
                if tokio::signal::ctrl_c().await.is_err() {
                    tracing::warn!("Ctrl+C listener failed; shutdown must come from the process manager");
                    return;
                }
            }

            if signals.fetch_add(1, Ordering::SeqCst) == 0 {
                tracing::info!("Shutdown requested, finishing in-flight assets...");
                tracing::info!("Signal again to exit immediately");
                handler_token.cancel();
            } else {
                tracing::warn!("Exiting without waiting for in-flight assets");
                std::process::exit(130);
            }
        }
    });

    Ok(token)
}
