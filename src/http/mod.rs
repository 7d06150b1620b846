//! HTTP surface: the protection middleware and the admin server.

pub mod admin;
mod middleware;

pub use middleware::{ATTACK_MODE_HEADER, client_source, protect};

use std::net::SocketAddr;
use std::sync::Arc;

use crate::security::Shield;

/// Run the admin server.
///
/// Serves the admin router on `addr`. This is a long-running task that
/// should be spawned in the background.
pub async fn run_admin_server(addr: SocketAddr, shield: Arc<Shield>) {
    let app = admin::router(shield);

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(%addr, error = %e, "Failed to bind admin server");
            return;
        }
    };
    tracing::info!(%addr, "Admin server listening");

    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!(error = %e, "Admin server error");
    }
}
