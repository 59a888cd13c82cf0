use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use crate::core::library::{LedgerKind, LedgerStatus};
use crate::utils::date::serializer;

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct LedgerEntryDto {
    pub entry_id: String,
    pub version: i64,
    pub branch_id: String,
    pub patron_id: String,
    pub item_id: Option<String>,
    pub loan_id: Option<String>,
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
