//! TCP accept loop

use std::future::Future;
use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::{info, warn};

use super::handler::handle_connection;
use crate::app::AppState;

/// Accept connections until `shutdown` resolves, then terminate every session
pub async fn serve<F>(listener: TcpListener, state: AppState, shutdown: F)
where
    F: Future<Output = ()>,
{
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    if let Err(e) = stream.set_nodelay(true) {
                        warn!(peer = %peer, error = %e, "Failed to set TCP_NODELAY");
                    }
                    info!(peer = %peer, "Connection accepted");
                    tokio::spawn(handle_connection(stream, Arc::clone(&state.registry)));
                }
                Err(e) => warn!(error = %e, "Accept failed"),
            },
            _ = &mut shutdown => break,
        }
    }

    info!(sessions = state.registry.len(), "Listener stopped");
    state.registry.shutdown_all();
}
