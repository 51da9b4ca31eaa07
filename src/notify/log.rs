//! Notifier that writes events to the tracing log

use super::{Event, Notifier};
use async_trait::async_trait;

/// Logs every event at a level matching its severity
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, event: &Event) -> anyhow::Result<()> {
        let order_id = event.order_id().unwrap_or("-");
        match event {
            Event::OrderError { .. } => {
                tracing::warn!(event = event.name(), order_id, "{}", event)
            }
            _ => tracing::info!(event = event.name(), order_id, "{}", event),
        }
        Ok(())
    }
}
