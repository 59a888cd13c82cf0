use std::sync::Arc;
use crate::gateway::GatewayPublisherVia;
use crate::gateway::factory::create_publisher;
use crate::ledger::domain::LedgerService;
use crate::ledger::domain::service::LedgerServiceImpl;
use crate::store::memory::Database;

pub async fn create_ledger_service(db: Arc<Database>,
                                   via: GatewayPublisherVia) -> Box<dyn LedgerService> {
    let publisher = create_publisher(via).await;
    Box::new(LedgerServiceImpl::new(db, publisher))
}
