//! Fine assessment: overdue charges computed during return processing and
//! replacement/damage charges posted on item condition changes. These run as
//! ordered steps inside the engine's transaction, so they are plain
//! functions over the transaction tables rather than a service of their own.

use chrono::NaiveDateTime;
use rust_decimal::{Decimal, RoundingStrategy};
use crate::catalog::domain::model::{ItemEntity, TitleEntity};
use crate::circulation::domain::model::LoanEntity;
use crate::core::library::LedgerKind;
use crate::ledger::domain::model::LedgerEntryEntity;
use crate::policy::resolver::PolicySnapshot;
use crate::store::memory::Tables;
use crate::utils::date::days_late;

// Overdue fine for a returned loan: whole days late times the per-day rate,
// rounded half-up to cents. None when the return was on time or the rate
// yields nothing.
pub fn assess_overdue(policy: &PolicySnapshot, loan: &LoanEntity, item: &ItemEntity,
                      returned_at: NaiveDateTime) -> Option<LedgerEntryEntity> {
    let days = days_late(loan.due_at, returned_at);
    if days <= 0 {
        return None;
    }
    let amount = (Decimal::from(days) * policy.fine_per_day)
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    if amount <= Decimal::ZERO {
        return None;
    }
    let entry = LedgerEntryEntity::charge(
        loan.branch_id.as_str(),
        loan.patron_id.as_str(),
        LedgerKind::OverdueFine,
        amount,
        format!("{} day(s) overdue on item {}", days, item.barcode).as_str(),
    )
    .linked(Some(item.item_id.as_str()), Some(loan.loan_id.as_str()));
    Some(entry)
}

// Replacement (lost: full price) or damage (half price) charge for an item
// with an open loan. Idempotent per (loan, kind): a second status change
// finds the existing entry and posts nothing. Items without a price on the
// item or its title produce no charge.
pub fn condition_charge(tables: &Tables, kind: LedgerKind, loan: &LoanEntity,
                        item: &ItemEntity, title: &TitleEntity) -> Option<LedgerEntryEntity> {
    if tables.charge_for_loan(loan.loan_id.as_str(), kind).is_some() {
        return None;
    }
    let price = match item.replacement_cost_or_default(title) {
        Some(price) => price,
        None => {
            tracing::warn!(item_id = %item.item_id, "no replacement cost on item or title, skipping charge");
            return None;
        }
    };
    let (amount, description) = match kind {
        LedgerKind::LostFee => (price, format!("replacement for lost item {}", item.barcode)),
        LedgerKind::DamageFee => (
            (price / Decimal::from(2))
                .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero),
            format!("damage fee for item {}", item.barcode),
        ),
        _ => return None,
    };
    if amount <= Decimal::ZERO {
        return None;
    }
    let entry = LedgerEntryEntity::charge(
        loan.branch_id.as_str(), loan.patron_id.as_str(), kind, amount, description.as_str())
        .linked(Some(item.item_id.as_str()), Some(loan.loan_id.as_str()));
    Some(entry)
}
