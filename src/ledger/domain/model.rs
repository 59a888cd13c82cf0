use chrono::{NaiveDateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use crate::core::domain::Identifiable;
use crate::core::library::{LedgerKind, LedgerStatus};
use crate::utils::date::serializer;

// LedgerEntryEntity is one financial line against a patron account. Charges
// carry a positive amount; payments are negative-amount lines that also
// reduce the outstanding balance of the entry they settle.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct LedgerEntryEntity {
    pub entry_id: String,
    pub version: i64,
    pub branch_id: String,
    pub patron_id: String,
    pub item_id: Option<String>,
    pub loan_id: Option<String>,
    // For Payment lines: the charge entry this payment settles.
    pub settles_entry_id: Option<String>,
    pub kind: LedgerKind,
    pub status: LedgerStatus,
    pub amount: Decimal,
    pub amount_outstanding: Decimal,
    pub description: String,
    #[serde(with = "serializer")]
    pub created_at: NaiveDateTime,
    #[serde(with = "serializer")]
    pub updated_at: NaiveDateTime,
}

impl LedgerEntryEntity {
    pub fn charge(branch_id: &str, patron_id: &str, kind: LedgerKind, amount: Decimal,
                  description: &str) -> Self {
        Self {
            entry_id: Uuid::new_v4().to_string(),
            version: 0,
            branch_id: branch_id.to_string(),
            patron_id: patron_id.to_string(),
            item_id: None,
            loan_id: None,
            settles_entry_id: None,
            kind,
            status: LedgerStatus::Open,
            amount,
            amount_outstanding: amount,
            description: description.to_string(),
            created_at: Utc::now().naive_utc(),
            updated_at: Utc::now().naive_utc(),
        }
    }

    pub fn payment_against(charge: &LedgerEntryEntity, amount: Decimal) -> Self {
        Self {
            entry_id: Uuid::new_v4().to_string(),
            version: 0,
            branch_id: charge.branch_id.to_string(),
            patron_id: charge.patron_id.to_string(),
            item_id: charge.item_id.clone(),
            loan_id: charge.loan_id.clone(),
            settles_entry_id: Some(charge.entry_id.to_string()),
            kind: LedgerKind::Payment,
            status: LedgerStatus::Paid,
            amount: -amount,
            amount_outstanding: Decimal::ZERO,
            description: format!("payment against {}", charge.description),
            created_at: Utc::now().naive_utc(),
            updated_at: Utc::now().naive_utc(),
        }
    }

    pub fn linked(mut self, item_id: Option<&str>, loan_id: Option<&str>) -> Self {
        self.item_id = item_id.map(str::to_string);
        self.loan_id = loan_id.map(str::to_string);
        self
    }

    pub fn is_settled(&self) -> bool {
        self.status == LedgerStatus::Paid
    }

    // Reduces the outstanding balance; the caller validates the amount first.
    pub fn apply_payment(&mut self, amount: Decimal, now: NaiveDateTime) {
        self.amount_outstanding -= amount;
        self.status = if self.amount_outstanding.is_zero() {
            LedgerStatus::Paid
        } else {
            LedgerStatus::PartiallyPaid
        };
        self.updated_at = now;
    }
}

impl Identifiable for LedgerEntryEntity {
    fn id(&self) -> String {
        self.entry_id.to_string()
    }

    fn version(&self) -> i64 {
        self.version
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use rust_decimal::Decimal;
    use crate::core::library::{LedgerKind, LedgerStatus};
    use crate::ledger::domain::model::LedgerEntryEntity;

    #[tokio::test]
    async fn test_should_build_charge() {
        let charge = LedgerEntryEntity::charge(
            "main", "patron1", LedgerKind::OverdueFine, Decimal::new(100, 2), "4 days late")
            .linked(Some("item1"), Some("loan1"));
        assert_eq!(LedgerStatus::Open, charge.status);
        assert_eq!(charge.amount, charge.amount_outstanding);
        assert_eq!(Some("item1".to_string()), charge.item_id);
    }

    #[tokio::test]
    async fn test_should_apply_partial_then_full_payment() {
        let mut charge = LedgerEntryEntity::charge(
            "main", "patron1", LedgerKind::LostFee, Decimal::new(2000, 2), "replacement");
        let now = Utc::now().naive_utc();
        charge.apply_payment(Decimal::new(500, 2), now);
        assert_eq!(LedgerStatus::PartiallyPaid, charge.status);
        assert_eq!(Decimal::new(1500, 2), charge.amount_outstanding);
        charge.apply_payment(Decimal::new(1500, 2), now);
        assert_eq!(LedgerStatus::Paid, charge.status);
        assert!(charge.is_settled());
    }

    #[tokio::test]
    async fn test_should_build_payment_line() {
        let charge = LedgerEntryEntity::charge(
            "main", "patron1", LedgerKind::DamageFee, Decimal::new(750, 2), "water damage");
        let payment = LedgerEntryEntity::payment_against(&charge, Decimal::new(750, 2));
        assert_eq!(LedgerKind::Payment, payment.kind);
        assert_eq!(-Decimal::new(750, 2), payment.amount);
        assert_eq!(Some(charge.entry_id), payment.settles_entry_id);
    }
}
