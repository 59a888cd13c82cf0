use chrono::{Duration, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use crate::core::domain::Identifiable;
use crate::core::library::HoldFulfillment;
use crate::utils::date::serializer;

// HoldEntity is a queued request for a title, optionally narrowed to one
// copy. Priority is a monotonically increasing placement counter per title,
// never renumbered on cancellation.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct HoldEntity {
    pub hold_id: String,
    pub version: i64,
    pub branch_id: String,
    pub title_id: String,
    pub item_id: Option<String>,
    pub patron_id: String,
    pub priority: i64,
    pub fulfillment: HoldFulfillment,
    #[serde(with = "serializer")]
    pub placed_at: NaiveDateTime,
    #[serde(with = "serializer")]
    pub expires_at: NaiveDateTime,
    // Set when the hold is promoted to the pickup shelf.
    pub waiting_since: Option<NaiveDateTime>,
    pub canceled_at: Option<NaiveDateTime>,
    pub cancel_reason: Option<String>,
    #[serde(with = "serializer")]
    pub created_at: NaiveDateTime,
    #[serde(with = "serializer")]
    pub updated_at: NaiveDateTime,
}

impl HoldEntity {
    pub fn new(branch_id: &str, title_id: &str, item_id: Option<&str>, patron_id: &str,
               priority: i64, expiry_days: i64) -> Self {
        let now = Utc::now().naive_utc();
        Self {
            hold_id: Uuid::new_v4().to_string(),
            version: 0,
            branch_id: branch_id.to_string(),
            title_id: title_id.to_string(),
            item_id: item_id.map(str::to_string),
            patron_id: patron_id.to_string(),
            priority,
            fulfillment: HoldFulfillment::None,
            placed_at: now,
            expires_at: now + Duration::days(expiry_days),
            waiting_since: None,
            canceled_at: None,
            cancel_reason: None,
            created_at: now,
            updated_at: now,
        }
    }

    // Active means still owed to the patron: not canceled and not yet being
    // converted into a loan at the desk.
    pub fn is_active(&self) -> bool {
        self.canceled_at.is_none() && self.fulfillment != HoldFulfillment::InProcess
    }

    // Waiting holds are the only ones eligible for promotion.
    pub fn is_waiting(&self) -> bool {
        self.is_active() && self.fulfillment == HoldFulfillment::None
    }

    pub fn cancel(&mut self, reason: &str, now: NaiveDateTime) {
        self.canceled_at = Some(now);
        self.cancel_reason = Some(reason.to_string());
        self.updated_at = now;
    }

    pub fn promote(&mut self, pickup_window_days: i64, now: NaiveDateTime) {
        self.fulfillment = HoldFulfillment::ReadyForPickup;
        self.waiting_since = Some(now);
        self.expires_at = now + Duration::days(pickup_window_days);
        self.updated_at = now;
    }
}

impl Identifiable for HoldEntity {
    fn id(&self) -> String {
        self.hold_id.to_string()
    }

    fn version(&self) -> i64 {
        self.version
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use crate::core::library::HoldFulfillment;
    use crate::hold::domain::model::HoldEntity;

    #[tokio::test]
    async fn test_should_build_waiting_hold() {
        let hold = HoldEntity::new("main", "title1", None, "patron1", 1, 7);
        assert_eq!("title1", hold.title_id.as_str());
        assert_eq!(1, hold.priority);
        assert!(hold.is_active());
        assert!(hold.is_waiting());
    }

    #[tokio::test]
    async fn test_should_cancel_hold() {
        let mut hold = HoldEntity::new("main", "title1", None, "patron1", 1, 7);
        hold.cancel("patron request", Utc::now().naive_utc());
        assert!(!hold.is_active());
        assert_eq!(Some("patron request".to_string()), hold.cancel_reason);
    }

    #[tokio::test]
    async fn test_should_promote_hold() {
        let mut hold = HoldEntity::new("main", "title1", Some("item1"), "patron1", 2, 7);
        let now = Utc::now().naive_utc();
        hold.promote(7, now);
        assert_eq!(HoldFulfillment::ReadyForPickup, hold.fulfillment);
        assert_eq!(Some(now), hold.waiting_since);
        // Ready holds still block other patrons but no longer wait in queue.
        assert!(hold.is_active());
        assert!(!hold.is_waiting());
    }
}
