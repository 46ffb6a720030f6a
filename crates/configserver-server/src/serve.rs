// ABOUTME: Binds the listener and serves the router over plain HTTP or rustls-terminated HTTPS.
// ABOUTME: Also picks which keystore the TLS listener uses once materialization has run.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum_server::Handle;
use axum_server::tls_rustls::RustlsConfig;
use configserver_core::MaterializeOutcome;

/// Pick the keystore for the listener: a freshly materialized file wins over a
/// pre-provisioned one; `None` means plain HTTP.
pub fn resolve_keystore(
    outcome: &MaterializeOutcome,
    fallback: Option<&Path>,
) -> Option<PathBuf> {
    outcome
        .keystore_location()
        .or(fallback)
        .map(Path::to_path_buf)
}

/// How long in-flight HTTPS requests get to finish after Ctrl-C.
const TLS_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Serve `router` on `addr` until Ctrl-C, then drain in-flight requests.
/// With `tls`, connections are terminated by rustls.
pub async fn serve(
    addr: SocketAddr,
    router: Router,
    tls: Option<Arc<rustls::ServerConfig>>,
) -> std::io::Result<()> {
    match tls {
        Some(config) => {
            let rustls = RustlsConfig::from_config(config);
            tracing::info!("listening on https://{}", addr);
            let handle = Handle::new();
            tokio::spawn(drain_on_shutdown(handle.clone()));
            axum_server::bind_rustls(addr, rustls)
                .handle(handle)
                .serve(router.into_make_service())
                .await
        }
        None => {
            tracing::warn!("no keystore available; serving plain HTTP");
            let listener = tokio::net::TcpListener::bind(addr).await?;
            tracing::info!("listening on http://{}", listener.local_addr()?);
            axum::serve(listener, router)
                .with_graceful_shutdown(shutdown_signal())
                .await
        }
    }
}

/// Stop accepting on Ctrl-C and give open connections time to complete.
async fn drain_on_shutdown(handle: Handle<SocketAddr>) {
    shutdown_signal().await;
    handle.graceful_shutdown(Some(TLS_DRAIN_TIMEOUT));
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}
