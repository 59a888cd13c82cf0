use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use crate::ledger::dto::LedgerEntryDto;
use crate::utils::date::serializer;

// LoanDto is the caller-facing view of one checkout.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct LoanDto {
    pub loan_id: String,
    pub version: i64,
    pub branch_id: String,
    pub item_id: String,
    pub patron_id: String,
    #[serde(with = "serializer")]
    pub issued_at: NaiveDateTime,
    #[serde(with = "serializer")]
    pub due_at: NaiveDateTime,
    pub returned_at: Option<NaiveDateTime>,
    pub renewal_count: i64,
    pub last_renewed_at: Option<NaiveDateTime>,
    #[serde(with = "serializer")]
    pub created_at: NaiveDateTime,
    #[serde(with = "serializer")]
    pub updated_at: NaiveDateTime,
}

// Outcome of return processing: the closed loan plus the overdue fine, if
// one was assessed in the same transaction.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct ReturnOutcome {
    pub loan: LoanDto,
    pub fine_assessed: Option<LedgerEntryDto>,
}
