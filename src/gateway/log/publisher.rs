use async_trait::async_trait;
use crate::core::events::DomainEvent;
use crate::core::library::CirculationError;
use crate::gateway::events::EventPublisher;

// LogPublisher emits domain events as structured log lines; the default
// sink when no notification channel is wired in.
#[derive(Debug, Default)]
pub struct LogPublisher {}

impl LogPublisher {
    pub fn new() -> Self {
        Self {}
    }
}

#[async_trait]
impl EventPublisher for LogPublisher {
    async fn publish(&self, event: &DomainEvent) -> Result<(), CirculationError> {
        tracing::info!(
            event_id = %event.event_id,
            name = %event.name,
            group = %event.group,
            key = %event.key,
            "domain event published"
        );
        Ok(())
    }
}
