use crate::gateway::GatewayPublisherVia;
use crate::gateway::events::EventPublisher;
use crate::gateway::log::publisher::LogPublisher;
use crate::gateway::memory::publisher::MemoryPublisher;

pub async fn create_publisher(via: GatewayPublisherVia) -> Box<dyn EventPublisher> {
    match via {
        GatewayPublisherVia::Log => Box::new(LogPublisher::new()),
        GatewayPublisherVia::Memory => Box::new(MemoryPublisher::new()),
    }
}
