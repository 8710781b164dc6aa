use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;

use tokio::process::Child;
use tracing::info;
use tracing::warn;

/// Children spawned on behalf of clients. Each one is reaped by a background
/// task which logs how it exited.
#[derive(Clone, Debug, Default)]
pub struct ChildRegistry {
    running: Arc<Mutex<HashMap<u32, String>>>,
}

impl ChildRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, mut child: Child, name: String) {
        let Some(pid) = child.id() else {
            // Already reaped.
            return;
        };
        self.lock().insert(pid, name.clone());

        let running = Arc::clone(&self.running);
        tokio::spawn(async move {
            match child.wait().await {
                Ok(status) if status.success() => info!("{name} (pid {pid}) exited"),
                Ok(status) => warn!("{name} (pid {pid}) {status}"),
                Err(err) => warn!("failed to wait for {name} (pid {pid}): {err}"),
            }
            running
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .remove(&pid);
        });
    }

    /// Pids of children that have not been reaped yet.
    pub fn running(&self) -> Vec<u32> {
        self.lock().keys().copied().collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<u32, String>> {
        self.running
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}
