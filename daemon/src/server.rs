use std::sync::Arc;
use std::time::Duration;

use passage_utils_seqpacket::SeqpacketListener;
use tracing::info;
use tracing::warn;

use crate::connection::Connection;
use crate::executor::ActionExecutor;
use crate::resolver::Resolver;

/// Accepts clients forever, each served on its own task.
pub async fn serve(
    listener: SeqpacketListener,
    resolver: Arc<dyn Resolver>,
    executor: Arc<ActionExecutor>,
) {
    info!("listening on {}", listener.local_path().display());
    loop {
        let socket = match listener.accept().await {
            Ok(socket) => socket,
            Err(err) => {
                warn!("failed to accept connection: {err}");
                // Back off, e.g. on EMFILE.
                tokio::time::sleep(Duration::from_millis(100)).await;
                continue;
            }
        };
        let connection = Connection::new(socket, Arc::clone(&resolver), Arc::clone(&executor));
        tokio::spawn(connection.run());
    }
}
