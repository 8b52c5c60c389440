//! Bounded queue between the services and the notification gateway. Publishing
//! never blocks game state changes; delivery runs on its own task.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::warn;

use crate::notify::{Notification, NotificationGateway};

/// Cloneable producer handle over the dispatch queue.
#[derive(Clone)]
pub struct NotificationOutbox {
    tx: mpsc::Sender<Notification>,
}

impl NotificationOutbox {
    /// Spawn the dispatch worker. The join handle completes once every
    /// producer handle is dropped and the queue has drained.
    pub fn start(capacity: usize, gateway: Arc<dyn NotificationGateway>) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(capacity);
        let worker = tokio::spawn(run_dispatch(rx, gateway));
        (Self { tx }, worker)
    }

    /// Queue a notification. A full or closed queue drops the payload with a
    /// warning; state changes never wait on delivery.
    pub fn publish(&self, notification: Notification) {
        if let Err(err) = self.tx.try_send(notification) {
            warn!(error = %err, "notification dropped");
        }
    }
}

async fn run_dispatch(mut rx: mpsc::Receiver<Notification>, gateway: Arc<dyn NotificationGateway>) {
    while let Some(notification) = rx.recv().await {
        if let Err(err) = gateway.deliver(notification).await {
            warn!(error = %err, "notification delivery failed");
        }
    }
}
