use std::sync::Arc;
use async_trait::async_trait;
use tokio::sync::Mutex;
use crate::core::events::DomainEvent;
use crate::core::library::CirculationError;
use crate::gateway::events::EventPublisher;

// MemoryPublisher captures events so tests can assert on notification hooks.
// Clones share the same buffer.
#[derive(Debug, Default, Clone)]
pub struct MemoryPublisher {
    events: Arc<Mutex<Vec<DomainEvent>>>,
}

impl MemoryPublisher {
    pub fn new() -> Self {
        Self { events: Arc::new(Mutex::new(Vec::new())) }
    }

    pub async fn captured_names(&self) -> Vec<String> {
        self.events.lock().await.iter().map(|event| event.name.to_string()).collect()
    }

    pub async fn captured_count(&self) -> usize {
        self.events.lock().await.len()
    }

    pub async fn find_by_name(&self, name: &str) -> Vec<String> {
        self.events
            .lock()
            .await
            .iter()
            .filter(|event| event.name == name)
            .map(|event| event.key.to_string())
            .collect()
    }
}

#[async_trait]
impl EventPublisher for MemoryPublisher {
    async fn publish(&self, event: &DomainEvent) -> Result<(), CirculationError> {
        let copy = serde_json::from_str::<DomainEvent>(
            serde_json::to_string(event)?.as_str())?;
        self.events.lock().await.push(copy);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use crate::core::events::DomainEvent;
    use crate::gateway::events::EventPublisher;
    use crate::gateway::memory::publisher::MemoryPublisher;

    #[tokio::test]
    async fn test_should_capture_events() {
        let publisher = MemoryPublisher::new();
        let clone = publisher.clone();
        let event = DomainEvent::added(
            "hold_placed", "hold", "hold1", &HashMap::new(), &"data").expect("event");
        publisher.publish(&event).await.expect("publish");
        assert_eq!(1, clone.captured_count().await);
        assert_eq!(vec!["hold_placed".to_string()], clone.captured_names().await);
        assert_eq!(vec!["hold1".to_string()], clone.find_by_name("hold_placed").await);
    }
}
