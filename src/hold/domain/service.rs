use std::collections::HashMap;
use std::sync::Arc;
use async_trait::async_trait;
use chrono::{NaiveDateTime, Utc};
use crate::catalog::domain::model::ItemEntity;
use crate::core::domain::Configuration;
use crate::core::events::{DomainEvent, EVENT_HOLD_READY_FOR_PICKUP};
use crate::core::library::{CirculationError, CirculationResult, HoldFulfillment, PatronCategory, reason};
use crate::gateway::events::EventPublisher;
use crate::hold::domain::HoldService;
use crate::hold::domain::model::HoldEntity;
use crate::hold::dto::HoldDto;
use crate::hold::queue;
use crate::policy::resolver::PolicySnapshot;
use crate::store::memory::{Database, Tables};

pub struct HoldServiceImpl {
    branch_id: String,
    db: Arc<Database>,
    events_publisher: Box<dyn EventPublisher>,
}

impl HoldServiceImpl {
    pub fn new(config: &Configuration, db: Arc<Database>,
               events_publisher: Box<dyn EventPublisher>) -> Self {
        Self {
            branch_id: config.branch_id.to_string(),
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

    // The copy a lapsed or canceled shelf hold was keeping aside, if it is
    // still on the shelf: the exact copy for item-level holds, any available
    // copy of the title otherwise.
    fn shelved_copy(tables: &Tables, hold: &HoldEntity) -> Option<ItemEntity> {
        match &hold.item_id {
            Some(item_id) => tables
                .item_by_ref(item_id.as_str())
                .ok()
                .filter(ItemEntity::is_checkout_candidate),
            None => tables
                .items
                .values()
                .find(|item| item.title_id == hold.title_id && item.is_checkout_candidate())
                .cloned(),
        }
    }

    // Hands a freed shelf copy to the next waiter, with the pickup window
    // taken from that waiter's own category policy.
    fn promote_for_copy(tables: &mut Tables, item: &ItemEntity,
                        now: NaiveDateTime) -> Option<HoldEntity> {
        let waiter = queue::next_in_line(tables, item)?;
        let category = tables
            .patron(waiter.patron_id.as_str())
            .map(|patron| patron.category)
            .unwrap_or(PatronCategory::Adult);
        let policy = PolicySnapshot::load(tables, category);
        queue::promote_next(tables, item, policy.hold_expiry_days, now)
    }
}

#[async_trait]
impl HoldService for HoldServiceImpl {
    async fn place(&self, patron_id: &str, title_id: &str,
                   item_id: Option<&str>) -> CirculationResult<HoldDto> {
        let mut tx = self.db.transaction().await;
        let patron = tx.patron(patron_id)?;
        let title = tx.title(title_id)?;
        let item = match item_id {
            Some(item_ref) => {
                let item = tx.item_by_ref(item_ref)?;
                if item.title_id != title.title_id {
                    return Err(CirculationError::invalid(
                        format!("item {} does not belong to title {}",
                                item.barcode, title_id).as_str(), None));
                }
                Some(item)
            }
            None => None,
        };
        let duplicate = tx
            .holds_for_patron(patron_id)
            .into_iter()
            .any(|hold| hold.title_id == title.title_id && hold.is_active());
        if duplicate {
            return Err(CirculationError::conflict(
                format!("patron {} already holds title {}", patron_id, title_id).as_str(),
                Some(reason::DUPLICATE_HOLD.to_string())));
        }
        let policy = PolicySnapshot::load(&tx, patron.category);
        let priority = queue::next_priority(&tx, title.title_id.as_str());
        let hold = HoldEntity::new(
            self.branch_id.as_str(), title.title_id.as_str(),
            item.as_ref().map(|item| item.item_id.as_str()),
            patron_id, priority, policy.hold_expiry_days);
        tx.upsert_hold(&hold);
        if let Some(mut item) = item {
            item.times_held += 1;
            item.updated_at = hold.placed_at;
            tx.upsert_item(&item);
        }
        tx.commit();
        tracing::info!(patron_id, title_id, priority, "hold placed");
        let dto = HoldDto::from(&hold);
        self.publish(DomainEvent::added(
            "hold_placed", "hold", hold.hold_id.as_str(), &HashMap::new(), &dto.clone())).await;
        Ok(dto)
    }

    async fn cancel(&self, hold_id: &str, reason: &str) -> CirculationResult<HoldDto> {
        let now = Utc::now().naive_utc();
        let mut tx = self.db.transaction().await;
        let mut hold = tx.hold(hold_id)?;
        if hold.canceled_at.is_some() {
            return Err(CirculationError::invalid(
                format!("hold {} is already canceled", hold_id).as_str(), None));
        }
        let was_ready = hold.fulfillment == HoldFulfillment::ReadyForPickup;
        hold.cancel(reason, now);
        tx.upsert_hold(&hold);
        // A canceled shelf hold frees its copy for the next waiter.
        let promoted = if was_ready {
            Self::shelved_copy(&tx, &hold)
                .and_then(|item| Self::promote_for_copy(&mut tx, &item, now))
        } else {
            None
        };
        tx.commit();
        tracing::info!(hold_id, reason, "hold canceled");
        let dto = HoldDto::from(&hold);
        self.publish(DomainEvent::updated(
            "hold_canceled", "hold", hold.hold_id.as_str(), &HashMap::new(), &dto.clone())).await;
        if let Some(next) = promoted {
            self.publish(DomainEvent::updated(
                EVENT_HOLD_READY_FOR_PICKUP, "hold", next.hold_id.as_str(),
                &HashMap::new(), &HoldDto::from(&next))).await;
        }
        Ok(dto)
    }

    async fn sweep_expired(&self) -> CirculationResult<usize> {
        let now = Utc::now().naive_utc();
        let mut tx = self.db.transaction().await;
        let lapsed: Vec<HoldEntity> = tx
            .holds
            .values()
            .filter(|hold| {
                hold.canceled_at.is_none()
                    && hold.fulfillment == HoldFulfillment::ReadyForPickup
                    && hold.expires_at <= now
            })
            .cloned()
            .collect();
        let mut expired = Vec::with_capacity(lapsed.len());
        let mut promoted = Vec::new();
        for mut hold in lapsed {
            hold.cancel("pickup window lapsed", now);
            tx.upsert_hold(&hold);
            if let Some(item) = Self::shelved_copy(&tx, &hold) {
                if let Some(next) = Self::promote_for_copy(&mut tx, &item, now) {
                    promoted.push(next);
                }
            }
            expired.push(hold);
        }
        let count = expired.len();
        tx.commit();
        if count > 0 {
            tracing::info!(count, "expired pickup-shelf holds");
        }
        for hold in &expired {
            self.publish(DomainEvent::updated(
                "hold_expired", "hold", hold.hold_id.as_str(),
                &HashMap::new(), &HoldDto::from(hold))).await;
        }
        for next in &promoted {
            self.publish(DomainEvent::updated(
                EVENT_HOLD_READY_FOR_PICKUP, "hold", next.hold_id.as_str(),
                &HashMap::new(), &HoldDto::from(next))).await;
        }
        Ok(count)
    }

    async fn find_by_patron(&self, patron_id: &str) -> CirculationResult<Vec<HoldDto>> {
        let tables = self.db.read().await;
        let _ = tables.patron(patron_id)?;
        Ok(tables.holds_for_patron(patron_id).iter().map(HoldDto::from).collect())
    }

    async fn queue_for_title(&self, title_id: &str) -> CirculationResult<Vec<HoldDto>> {
        let tables = self.db.read().await;
        let _ = tables.title(title_id)?;
        let mut queue: Vec<HoldEntity> = tables
            .holds_for_title(title_id)
            .into_iter()
            .filter(HoldEntity::is_active)
            .collect();
        queue.sort_by(|a, b| a.priority.cmp(&b.priority).then(a.placed_at.cmp(&b.placed_at)));
        Ok(queue.iter().map(HoldDto::from).collect())
    }
}

impl From<&HoldEntity> for HoldDto {
    fn from(other: &HoldEntity) -> HoldDto {
        HoldDto {
            hold_id: other.hold_id.to_string(),
            version: other.version,
            branch_id: other.branch_id.to_string(),
            title_id: other.title_id.to_string(),
            item_id: other.item_id.clone(),
            patron_id: other.patron_id.to_string(),
            priority: other.priority,
            fulfillment: other.fulfillment,
            placed_at: other.placed_at,
            expires_at: other.expires_at,
            waiting_since: other.waiting_since,
            canceled_at: other.canceled_at,
            cancel_reason: other.cancel_reason.clone(),
            created_at: other.created_at,
            updated_at: other.updated_at,
        }
    }
}
