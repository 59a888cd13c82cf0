use chrono::{NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use crate::core::domain::Identifiable;
use crate::utils::date::serializer;

// LoanEntity abstracts one checkout of a single item. The live row exists
// only while the loan is open; returns archive it into loan history.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct LoanEntity {
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

impl LoanEntity {
    pub fn new(branch_id: &str, item_id: &str, patron_id: &str, due_at: NaiveDateTime) -> Self {
        Self {
            loan_id: Uuid::new_v4().to_string(),
            version: 0,
            branch_id: branch_id.to_string(),
            item_id: item_id.to_string(),
            patron_id: patron_id.to_string(),
            issued_at: Utc::now().naive_utc(),
            due_at,
            returned_at: None,
            renewal_count: 0,
            last_renewed_at: None,
            created_at: Utc::now().naive_utc(),
            updated_at: Utc::now().naive_utc(),
        }
    }

    pub fn is_open(&self) -> bool {
        self.returned_at.is_none()
    }

    pub fn is_overdue(&self, now: NaiveDateTime) -> bool {
        self.is_open() && self.due_at < now
    }
}

impl Identifiable for LoanEntity {
    fn id(&self) -> String {
        self.loan_id.to_string()
    }

    fn version(&self) -> i64 {
        self.version
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use crate::circulation::domain::model::LoanEntity;

    #[tokio::test]
    async fn test_should_build_open_loan() {
        let due = Utc::now().naive_utc() + Duration::days(14);
        let loan = LoanEntity::new("main", "item1", "patron1", due);
        assert_eq!("item1", loan.item_id.as_str());
        assert_eq!("patron1", loan.patron_id.as_str());
        assert!(loan.is_open());
        assert_eq!(0, loan.renewal_count);
        assert!(!loan.is_overdue(Utc::now().naive_utc()));
    }

    #[tokio::test]
    async fn test_should_detect_overdue() {
        let due = Utc::now().naive_utc() - Duration::days(2);
        let mut loan = LoanEntity::new("main", "item1", "patron1", due);
        assert!(loan.is_overdue(Utc::now().naive_utc()));
        loan.returned_at = Some(Utc::now().naive_utc());
        assert!(!loan.is_open());
        assert!(!loan.is_overdue(Utc::now().naive_utc()));
    }
}
