use async_trait::async_trait;
use crate::core::events::DomainEvent;
use crate::core::library::CirculationError;

// Hook point for the notification collaborator (email/SMS). Publishing is
// fire-and-forget: callers log failures and never abort the operation.
#[async_trait]
pub trait EventPublisher: Sync + Send {
    async fn publish(&self, event: &DomainEvent) -> Result<(), CirculationError>;
}
