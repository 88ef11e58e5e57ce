//! Flash cross-domain policy responder.

use log::{debug, info, warn};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpListener;
use tokio::sync::watch;

/// Request the Flash player sends before opening a socket
pub const POLICY_REQUEST: &[u8] = b"<policy-file-request/>\0";

/// Policy document, zero terminated
pub const POLICY_RESPONSE: &[u8] = b"<?xml version=\"1.0\"?><!DOCTYPE cross-domain-policy><cross-domain-policy><allow-access-from domain=\"*\" to-ports=\"*\" /></cross-domain-policy>\0";

/// Serve the policy document on a dedicated port.
///
/// Every accepted socket gets the document immediately and is closed; the
/// request itself is not read.
pub async fn run_policy_listener(listener: TcpListener, mut shutdown: watch::Receiver<bool>) {
    if let Ok(addr) = listener.local_addr() {
        info!("Policy server listening on {}", addr);
    }

    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((mut stream, peer)) => {
                    debug!("Policy request from {}", peer);
                    tokio::spawn(async move {
                        let _ = stream.write_all(POLICY_RESPONSE).await;
                        let _ = stream.shutdown().await;
                    });
                }
                Err(e) => warn!("Policy accept error: {}", e),
            },
            _ = shutdown.changed() => break,
        }
    }

    info!("Policy server stopped");
}
