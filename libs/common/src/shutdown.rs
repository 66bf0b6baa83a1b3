//! Graceful shutdown signal handling

use tracing::info;

/// Resolve when a shutdown signal arrives (Ctrl+C, or SIGTERM on Unix).
///
/// Intended as the future handed to `axum::serve(..).with_graceful_shutdown`:
/// the server stops accepting connections and drains in-flight requests
/// once this returns.
pub async fn wait_for_shutdown() {
    let ctrl_c = async {
        if tokio::signal::ctrl_c().await.is_err() {
            // No signal handler could be installed; park this branch so the
            // sibling (or the server itself) decides when we stop.
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            },
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Ctrl+C received, shutting down"),
        _ = terminate => info!("SIGTERM received, shutting down"),
    }
}
