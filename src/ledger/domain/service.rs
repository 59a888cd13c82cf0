use std::collections::HashMap;
use std::sync::Arc;
use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use crate::core::events::DomainEvent;
use crate::core::library::{CirculationError, CirculationResult, LedgerKind, reason};
use crate::gateway::events::EventPublisher;
use crate::ledger::domain::LedgerService;
use crate::ledger::domain::model::LedgerEntryEntity;
use crate::ledger::dto::LedgerEntryDto;
use crate::store::memory::Database;

pub struct LedgerServiceImpl {
    db: Arc<Database>,
    events_publisher: Box<dyn EventPublisher>,
}

impl LedgerServiceImpl {
    pub fn new(db: Arc<Database>, events_publisher: Box<dyn EventPublisher>) -> Self {
        Self {
            db,
            events_publisher,
        }
    }

    async fn publish(&self, event: serde_json::Result<DomainEvent>) {
        match event {
            Ok(event) => {
                if let Err(err) = self.events_publisher.publish(&event).await {
                    tracing::warn!(error = %err, "failed to publish domain event");
                }
            }
            Err(err) => tracing::warn!(error = %err, "failed to serialize domain event"),
        }
    }
}

#[async_trait]
impl LedgerService for LedgerServiceImpl {
    async fn pay(&self, entry_id: &str, amount: Decimal) -> CirculationResult<LedgerEntryDto> {
        let now = Utc::now().naive_utc();
        let mut tx = self.db.transaction().await;
        let mut entry = tx.ledger_entry(entry_id)?;
        if entry.kind == LedgerKind::Payment {
            return Err(CirculationError::invalid(
                format!("entry {} is a payment line, not a charge", entry_id).as_str(), None));
        }
        if amount <= Decimal::ZERO {
            return Err(CirculationError::invalid(
                format!("payment amount {} must be positive", amount).as_str(), None));
        }
        if entry.is_settled() {
            return Err(CirculationError::invalid(
                format!("entry {} is already settled", entry_id).as_str(), None));
        }
        if amount > entry.amount_outstanding {
            return Err(CirculationError::conflict(
                format!("payment {} exceeds outstanding balance {} on entry {}",
                        amount, entry.amount_outstanding, entry_id).as_str(),
                Some(reason::OVERPAYMENT.to_string())));
        }
        let payment = LedgerEntryEntity::payment_against(&entry, amount);
        entry.apply_payment(amount, now);
        tx.upsert_ledger_entry(&entry);
        tx.upsert_ledger_entry(&payment);
        tx.commit();
        let dto = LedgerEntryDto::from(&entry);
        self.publish(DomainEvent::added(
            "ledger_payment", "ledger", payment.entry_id.as_str(), &HashMap::new(), &dto.clone())).await;
        Ok(dto)
    }

    async fn entries_for_patron(&self, patron_id: &str) -> CirculationResult<Vec<LedgerEntryDto>> {
        let tables = self.db.read().await;
        let _ = tables.patron(patron_id)?;
        Ok(tables.ledger_for_patron(patron_id).iter().map(LedgerEntryDto::from).collect())
    }

    async fn outstanding_for_patron(&self, patron_id: &str) -> CirculationResult<Decimal> {
        let tables = self.db.read().await;
        let _ = tables.patron(patron_id)?;
        let total = tables
            .ledger_for_patron(patron_id)
            .iter()
            .filter(|entry| entry.kind != LedgerKind::Payment)
            .map(|entry| entry.amount_outstanding)
            .sum();
        Ok(total)
    }
}

impl From<&LedgerEntryEntity> for LedgerEntryDto {
    fn from(other: &LedgerEntryEntity) -> LedgerEntryDto {
        LedgerEntryDto {
            entry_id: other.entry_id.to_string(),
            version: other.version,
            branch_id: other.branch_id.to_string(),
            patron_id: other.patron_id.to_string(),
            item_id: other.item_id.clone(),
            loan_id: other.loan_id.clone(),
            settles_entry_id: other.settles_entry_id.clone(),
            kind: other.kind,
            status: other.status,
            amount: other.amount,
            amount_outstanding: other.amount_outstanding,
            description: other.description.to_string(),
            created_at: other.created_at,
            updated_at: other.updated_at,
        }
    }
}
