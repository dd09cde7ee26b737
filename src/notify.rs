//! Outbound notifications.
//!
//! The validation and monitor paths report progress through a [`Notifier`].
//! Delivery is best effort: a failing or slow notifier is logged and
//! skipped, never turned into a validation failure.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::types::ValidationEvent;
use crate::{HuginnError, Result};

/// Upper bound on a single delivery.
const DELIVERY_TIMEOUT: Duration = Duration::from_secs(1);

/// Sink for validation events (toasts, status bars, logs, ...).
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, event: &ValidationEvent) -> Result<()>;
}

/// Writes events to the `tracing` log. The default notifier.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

#[async_trait]
impl Notifier for TracingNotifier {
    async fn notify(&self, event: &ValidationEvent) -> Result<()> {
        match event {
            ValidationEvent::Failed {
                model_id,
                base_url,
                category,
                message,
                ..
            } => warn!(model_id, base_url, %category, detail = %message, "model validation failed"),
            ValidationEvent::Succeeded {
                model_id,
                loaded_models,
                ..
            } => info!(model_id, loaded_models, "model ready"),
            other => info!(event = ?other, "validation event"),
        }
        Ok(())
    }
}

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn notify(&self, _event: &ValidationEvent) -> Result<()> {
        Ok(())
    }
}

/// Forwards events into an unbounded channel, e.g. for a UI task.
///
/// Fails once the receiver is dropped.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    tx: mpsc::UnboundedSender<ValidationEvent>,
}

impl ChannelNotifier {
    /// Create a notifier and the receiving end of its channel.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ValidationEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait]
impl Notifier for ChannelNotifier {
    async fn notify(&self, event: &ValidationEvent) -> Result<()> {
        self.tx
            .send(event.clone())
            .map_err(|_| HuginnError::Notify("event receiver dropped".into()))
    }
}

/// Deliver an event, swallowing failures and timeouts.
pub(crate) async fn deliver(notifier: &dyn Notifier, event: ValidationEvent) {
    match tokio::time::timeout(DELIVERY_TIMEOUT, notifier.notify(&event)).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!(error = %e, model_id = event.model_id(), "notifier failed"),
        Err(_) => warn!(model_id = event.model_id(), "notifier timed out"),
    }
}
