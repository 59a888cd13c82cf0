use std::sync::Arc;
use crate::core::domain::Configuration;
use crate::gateway::GatewayPublisherVia;
use crate::gateway::factory::create_publisher;
use crate::hold::domain::HoldService;
use crate::hold::domain::service::HoldServiceImpl;
use crate::store::memory::Database;

pub async fn create_hold_service(config: &Configuration, db: Arc<Database>,
                                 via: GatewayPublisherVia) -> Box<dyn HoldService> {
    let publisher = create_publisher(via).await;
    Box::new(HoldServiceImpl::new(config, db, publisher))
}

#[cfg(test)]
mod tests {
    use crate::core::domain::Configuration;
    use crate::gateway::GatewayPublisherVia;
    use crate::hold::factory::create_hold_service;
    use crate::store::memory::Database;

    #[tokio::test]
    async fn test_should_create_hold_service() {
        let config = Configuration::new("test");
        let db = Database::new();
        let svc = create_hold_service(&config, db, GatewayPublisherVia::Memory).await;
        assert_eq!(0, svc.sweep_expired().await.expect("sweep"));
    }
}
