pub mod model;
pub mod service;

use async_trait::async_trait;
use rust_decimal::Decimal;
use crate::core::library::CirculationResult;
use crate::ledger::dto::LedgerEntryDto;

// Applies payments against outstanding charges; charges themselves are
// posted by the circulation engine and the fine assessment steps.
#[async_trait]
pub trait LedgerService: Sync + Send {
    async fn pay(&self, entry_id: &str, amount: Decimal) -> CirculationResult<LedgerEntryDto>;
    async fn entries_for_patron(&self, patron_id: &str) -> CirculationResult<Vec<LedgerEntryDto>>;
    async fn outstanding_for_patron(&self, patron_id: &str) -> CirculationResult<Decimal>;
}
