use std::sync::Arc;
use crate::circulation::domain::CirculationService;
use crate::circulation::domain::service::CirculationServiceImpl;
use crate::core::domain::Configuration;
use crate::gateway::GatewayPublisherVia;
use crate::gateway::factory::create_publisher;
use crate::store::memory::Database;

pub async fn create_circulation_service(config: &Configuration, db: Arc<Database>,
                                        via: GatewayPublisherVia) -> Box<dyn CirculationService> {
    let publisher = create_publisher(via).await;
    Box::new(CirculationServiceImpl::new(config, db, publisher))
}
