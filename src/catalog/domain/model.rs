use chrono::{NaiveDateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use crate::core::domain::Identifiable;
use crate::core::library::ItemStatus;
use crate::utils::date::serializer;

// TitleEntity is the bibliographic work; one title owns many physical items.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct TitleEntity {
    pub title_id: String,
    pub version: i64,
    pub title: String,
    pub author: String,
    // Default replacement cost applied when an item carries none of its own.
    pub replacement_cost: Option<Decimal>,
    #[serde(with = "serializer")]
    pub created_at: NaiveDateTime,
    #[serde(with = "serializer")]
    pub updated_at: NaiveDateTime,
}

impl TitleEntity {
    pub fn new(title: &str, author: &str) -> Self {
        Self {
            title_id: Uuid::new_v4().to_string(),
            version: 0,
            title: title.to_string(),
            author: author.to_string(),
            replacement_cost: None,
            created_at: Utc::now().naive_utc(),
            updated_at: Utc::now().naive_utc(),
        }
    }
}

impl Identifiable for TitleEntity {
    fn id(&self) -> String {
        self.title_id.to_string()
    }

    fn version(&self) -> i64 {
        self.version
    }
}

// ItemEntity is one physical copy of a title. The status/due-date mirror and
// the lifetime counters are owned by the circulation engine; nothing else
// writes them.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct ItemEntity {
    pub item_id: String,
    pub version: i64,
    pub title_id: String,
    pub barcode: String,
    pub status: ItemStatus,
    #[serde(with = "serializer")]
    pub status_changed_at: NaiveDateTime,
    pub loanable: bool,
    // Mirror of the open loan's due date, set iff status is OnLoan.
    pub due_at: Option<NaiveDateTime>,
    pub last_borrowed_at: Option<NaiveDateTime>,
    pub times_loaned: i64,
    pub times_renewed: i64,
    pub times_held: i64,
    pub replacement_cost: Option<Decimal>,
    #[serde(with = "serializer")]
    pub created_at: NaiveDateTime,
    #[serde(with = "serializer")]
    pub updated_at: NaiveDateTime,
}

impl ItemEntity {
    pub fn new(title_id: &str, barcode: &str) -> Self {
        Self {
            item_id: Uuid::new_v4().to_string(),
            version: 0,
            title_id: title_id.to_string(),
            barcode: barcode.to_string(),
            status: ItemStatus::Available,
            status_changed_at: Utc::now().naive_utc(),
            loanable: true,
            due_at: None,
            last_borrowed_at: None,
            times_loaned: 0,
            times_renewed: 0,
            times_held: 0,
            replacement_cost: None,
            created_at: Utc::now().naive_utc(),
            updated_at: Utc::now().naive_utc(),
        }
    }

    pub fn set_status(&mut self, status: ItemStatus, now: NaiveDateTime) {
        self.status = status;
        self.status_changed_at = now;
        self.updated_at = now;
    }

    pub fn is_checkout_candidate(&self) -> bool {
        self.loanable && self.status == ItemStatus::Available
    }

    // Per-item price wins; the title default is the fallback.
    pub fn replacement_cost_or_default(&self, title: &TitleEntity) -> Option<Decimal> {
        self.replacement_cost.or(title.replacement_cost)
    }
}

impl Identifiable for ItemEntity {
    fn id(&self) -> String {
        self.item_id.to_string()
    }

    fn version(&self) -> i64 {
        self.version
    }
}
