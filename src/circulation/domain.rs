pub mod model;
pub mod service;

use async_trait::async_trait;
use crate::circulation::dto::{LoanDto, ReturnOutcome};
use crate::core::library::CirculationResult;
use crate::ledger::dto::LedgerEntryDto;

// The circulation transaction engine: each operation runs inside one store
// transaction and either commits every effect or none.
#[async_trait]
pub trait CirculationService: Sync + Send {
    async fn checkout(&self, patron_id: &str, item_ref: &str) -> CirculationResult<LoanDto>;
    // loan_ref resolves as loan id, item id or barcode.
    async fn renew(&self, loan_ref: &str) -> CirculationResult<LoanDto>;
    async fn return_item(&self, loan_ref: &str) -> CirculationResult<ReturnOutcome>;
    // Condition changes: post the replacement/damage charge at most once per
    // loan; lost items force-close the open loan.
    async fn mark_item_lost(&self, item_ref: &str) -> CirculationResult<Option<LedgerEntryDto>>;
    async fn mark_item_damaged(&self, item_ref: &str) -> CirculationResult<Option<LedgerEntryDto>>;
    async fn query_overdue(&self) -> CirculationResult<Vec<LoanDto>>;
    // Maintenance sweep for the notification collaborator; returns how many
    // item_overdue events were emitted.
    async fn notify_overdue(&self) -> CirculationResult<usize>;
}
