use std::collections::HashMap;
use std::sync::Arc;
use async_trait::async_trait;
use chrono::{Duration, Utc};
use crate::circulation::domain::CirculationService;
use crate::circulation::domain::model::LoanEntity;
use crate::circulation::dto::{LoanDto, ReturnOutcome};
use crate::core::domain::Configuration;
use crate::core::events::{DomainEvent, EVENT_HOLD_READY_FOR_PICKUP, EVENT_ITEM_OVERDUE};
use crate::core::library::{CirculationError, CirculationResult, HoldFulfillment, ItemStatus, LedgerKind, reason};
use crate::fines;
use crate::gateway::events::EventPublisher;
use crate::hold::queue;
use crate::ledger::dto::LedgerEntryDto;
use crate::policy::resolver::PolicySnapshot;
use crate::store::memory::{Database, Tables};

pub struct CirculationServiceImpl {
    branch_id: String,
    db: Arc<Database>,
    events_publisher: Box<dyn EventPublisher>,
}

impl CirculationServiceImpl {
    pub fn new(config: &Configuration, db: Arc<Database>,
               events_publisher: Box<dyn EventPublisher>) -> Self {
        Self {
            branch_id: config.branch_id.to_string(),
            db,
            events_publisher,
        }
    }

    // Open loan by loan id, item id or barcode. A known item without an open
    // loan is an Invalid state, an unknown reference is NotFound.
    fn resolve_open_loan(tables: &Tables, loan_ref: &str) -> CirculationResult<LoanEntity> {
        if let Some(loan) = tables.loan_by_ref(loan_ref) {
            Ok(loan)
        } else if tables.item_by_ref(loan_ref).is_ok() {
            Err(CirculationError::invalid(
                format!("item {} is not on loan", loan_ref).as_str(),
                Some(reason::NOT_ON_LOAN.to_string())))
        } else {
            Err(CirculationError::not_found(
                format!("no loan or item matches {}", loan_ref).as_str()))
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

    // Shared by mark_item_lost/mark_item_damaged: posts the condition charge
    // (at most once per loan), transitions the item, and for lost items
    // force-closes the open loan since the copy is presumed gone.
    async fn change_condition(&self, item_ref: &str, status: ItemStatus,
                              kind: LedgerKind) -> CirculationResult<Option<LedgerEntryDto>> {
        let now = Utc::now().naive_utc();
        let mut tx = self.db.transaction().await;
        let mut item = tx.item_by_ref(item_ref)?;
        let title = tx.title(item.title_id.as_str())?;
        let open_loan = tx.open_loan_for_item(item.item_id.as_str());
        let charge = match &open_loan {
            Some(loan) => fines::condition_charge(&tx, kind, loan, &item, &title),
            None => None,
        };
        if let Some(entry) = &charge {
            tx.upsert_ledger_entry(entry);
        }
        if status == ItemStatus::Lost {
            if let Some(mut loan) = open_loan {
                loan.returned_at = Some(now);
                loan.updated_at = now;
                tx.archive_loan(&loan);
            }
            item.due_at = None;
        }
        item.set_status(status, now);
        tx.upsert_item(&item);
        tx.commit();
        let name = match status {
            ItemStatus::Lost => "item_lost",
            _ => "item_damaged",
        };
        self.publish(DomainEvent::updated(
            name, "item", item.item_id.as_str(), &HashMap::new(), &item.clone())).await;
        let dto = charge.as_ref().map(LedgerEntryDto::from);
        if let Some(entry) = &dto {
            self.publish(DomainEvent::added(
                "condition_charge_posted", "ledger", entry.entry_id.as_str(),
                &HashMap::new(), &entry.clone())).await;
        }
        Ok(dto)
    }
}

#[async_trait]
impl CirculationService for CirculationServiceImpl {
    async fn checkout(&self, patron_id: &str, item_ref: &str) -> CirculationResult<LoanDto> {
        let now = Utc::now().naive_utc();
        let mut tx = self.db.transaction().await;
        let patron = tx.patron(patron_id)?;
        if patron.is_restricted(now) {
            return Err(CirculationError::forbidden(
                format!("patron {} is restricted from borrowing", patron_id).as_str(),
                Some(reason::PATRON_RESTRICTED.to_string())));
        }
        if patron.is_expired(now) {
            return Err(CirculationError::forbidden(
                format!("membership of patron {} has expired", patron_id).as_str(),
                Some(reason::MEMBERSHIP_EXPIRED.to_string())));
        }
        let mut item = tx.item_by_ref(item_ref)?;
        if item.status == ItemStatus::OnLoan {
            return Err(CirculationError::conflict(
                format!("item {} is already on loan", item.barcode).as_str(),
                Some(reason::ALREADY_ON_LOAN.to_string())));
        }
        if !item.is_checkout_candidate() {
            return Err(CirculationError::conflict(
                format!("item {} is not available for checkout", item.barcode).as_str(),
                Some(reason::ITEM_UNAVAILABLE.to_string())));
        }
        if let Some(hold) = queue::blocking_hold(&tx, &item, patron_id) {
            return Err(CirculationError::forbidden(
                format!("item {} is reserved for patron {}", item.barcode, hold.patron_id).as_str(),
                Some(reason::ITEM_RESERVED.to_string())));
        }
        let policy = PolicySnapshot::load(&tx, patron.category);
        let open_count = tx.open_loans_for_patron(patron_id).len() as i64;
        if open_count >= policy.max_checkouts {
            return Err(CirculationError::forbidden(
                format!("patron {} already has {} open loans (limit {})",
                        patron_id, open_count, policy.max_checkouts).as_str(),
                Some(reason::CHECKOUT_LIMIT_REACHED.to_string())));
        }
        let due_at = now + Duration::days(policy.loan_period_days);
        let loan = LoanEntity::new(
            self.branch_id.as_str(), item.item_id.as_str(), patron_id, due_at);
        tx.insert_loan(&loan)?;
        item.set_status(ItemStatus::OnLoan, now);
        item.due_at = Some(due_at);
        item.times_loaned += 1;
        tx.upsert_item(&item);
        // The requesting patron's own holds are satisfied by this checkout.
        for mut hold in queue::holds_fulfilled_by(&tx, &item, patron_id) {
            hold.fulfillment = HoldFulfillment::InProcess;
            hold.updated_at = now;
            tx.upsert_hold(&hold);
        }
        tx.commit();
        tracing::info!(patron_id, item_id = %item.item_id, loan_id = %loan.loan_id, "item checked out");
        let dto = LoanDto::from(&loan);
        self.publish(DomainEvent::added(
            "loan_checked_out", "loan", loan.loan_id.as_str(), &HashMap::new(), &dto.clone())).await;
        Ok(dto)
    }

    async fn renew(&self, loan_ref: &str) -> CirculationResult<LoanDto> {
        let now = Utc::now().naive_utc();
        let mut tx = self.db.transaction().await;
        let mut loan = Self::resolve_open_loan(&tx, loan_ref)?;
        let patron = tx.patron(loan.patron_id.as_str())?;
        let policy = PolicySnapshot::load(&tx, patron.category);
        if loan.renewal_count >= policy.max_renewals {
            return Err(CirculationError::forbidden(
                format!("loan {} reached the renewal limit of {}",
                        loan.loan_id, policy.max_renewals).as_str(),
                Some(reason::RENEWAL_LIMIT_REACHED.to_string())));
        }
        let mut item = tx.item_by_ref(loan.item_id.as_str())?;
        if let Some(hold) = queue::blocking_hold(&tx, &item, loan.patron_id.as_str()) {
            return Err(CirculationError::forbidden(
                format!("item {} is reserved for patron {}", item.barcode, hold.patron_id).as_str(),
                Some(reason::ITEM_RESERVED.to_string())));
        }
        // Extension is additive from the existing due date, not from now; an
        // overdue loan can renew to a due date still in the past.
        loan.due_at += Duration::days(policy.loan_period_days);
        loan.renewal_count += 1;
        loan.last_renewed_at = Some(now);
        loan.updated_at = now;
        tx.update_loan(&loan)?;
        item.due_at = Some(loan.due_at);
        item.times_renewed += 1;
        item.updated_at = now;
        tx.upsert_item(&item);
        tx.commit();
        tracing::info!(loan_id = %loan.loan_id, due_at = %loan.due_at, "loan renewed");
        let dto = LoanDto::from(&loan);
        self.publish(DomainEvent::updated(
            "loan_renewed", "loan", loan.loan_id.as_str(), &HashMap::new(), &dto.clone())).await;
        Ok(dto)
    }

    async fn return_item(&self, loan_ref: &str) -> CirculationResult<ReturnOutcome> {
        let now = Utc::now().naive_utc();
        let mut tx = self.db.transaction().await;
        let mut loan = Self::resolve_open_loan(&tx, loan_ref)?;
        let patron = tx.patron(loan.patron_id.as_str())?;
        let policy = PolicySnapshot::load(&tx, patron.category);
        let mut item = tx.item_by_ref(loan.item_id.as_str())?;
        loan.returned_at = Some(now);
        loan.updated_at = now;
        let fine = fines::assess_overdue(&policy, &loan, &item, now);
        if let Some(entry) = &fine {
            tx.upsert_ledger_entry(entry);
        }
        tx.archive_loan(&loan);
        // A condition applied mid-loan (damaged) survives the return; only a
        // copy that was plainly on loan goes back on the shelf.
        if item.status == ItemStatus::OnLoan {
            item.set_status(ItemStatus::Available, now);
        }
        item.due_at = None;
        item.last_borrowed_at = Some(now);
        tx.upsert_item(&item);
        let promoted = if item.is_checkout_candidate() {
            queue::promote_next(&mut tx, &item, policy.hold_expiry_days, now)
        } else {
            None
        };
        tx.commit();
        tracing::info!(loan_id = %loan.loan_id, item_id = %item.item_id,
            fined = fine.is_some(), "item returned");
        let outcome = ReturnOutcome {
            loan: LoanDto::from(&loan),
            fine_assessed: fine.as_ref().map(LedgerEntryDto::from),
        };
        self.publish(DomainEvent::deleted(
            "loan_returned", "loan", loan.loan_id.as_str(), &HashMap::new(), &outcome.loan.clone())).await;
        if let Some(entry) = &outcome.fine_assessed {
            self.publish(DomainEvent::added(
                "overdue_fine_assessed", "ledger", entry.entry_id.as_str(),
                &HashMap::new(), &entry.clone())).await;
        }
        if let Some(hold) = promoted {
            self.publish(DomainEvent::updated(
                EVENT_HOLD_READY_FOR_PICKUP, "hold", hold.hold_id.as_str(),
                &HashMap::new(), &hold.clone())).await;
        }
        Ok(outcome)
    }

    async fn mark_item_lost(&self, item_ref: &str) -> CirculationResult<Option<LedgerEntryDto>> {
        self.change_condition(item_ref, ItemStatus::Lost, LedgerKind::LostFee).await
    }

    async fn mark_item_damaged(&self, item_ref: &str) -> CirculationResult<Option<LedgerEntryDto>> {
        self.change_condition(item_ref, ItemStatus::Damaged, LedgerKind::DamageFee).await
    }

    async fn query_overdue(&self) -> CirculationResult<Vec<LoanDto>> {
        let now = Utc::now().naive_utc();
        let tables = self.db.read().await;
        let mut overdue: Vec<LoanDto> = tables
            .loans
            .values()
            .filter(|loan| loan.is_overdue(now))
            .map(LoanDto::from)
            .collect();
        overdue.sort_by(|a, b| a.due_at.cmp(&b.due_at));
        Ok(overdue)
    }

    async fn notify_overdue(&self) -> CirculationResult<usize> {
        let overdue = self.query_overdue().await?;
        for loan in &overdue {
            self.publish(DomainEvent::updated(
                EVENT_ITEM_OVERDUE, "loan", loan.loan_id.as_str(), &HashMap::new(), &loan.clone())).await;
        }
        Ok(overdue.len())
    }
}

impl From<&LoanEntity> for LoanDto {
    fn from(other: &LoanEntity) -> LoanDto {
        LoanDto {
            loan_id: other.loan_id.to_string(),
            version: other.version,
            branch_id: other.branch_id.to_string(),
            item_id: other.item_id.to_string(),
            patron_id: other.patron_id.to_string(),
            issued_at: other.issued_at,
            due_at: other.due_at,
            returned_at: other.returned_at,
            renewal_count: other.renewal_count,
            last_renewed_at: other.last_renewed_at,
            created_at: other.created_at,
            updated_at: other.updated_at,
        }
    }
}

// Invariant check used by tests: an item is OnLoan iff exactly one open loan
// references it.
#[cfg(test)]
fn item_loan_invariant_holds(tables: &Tables, item_id: &str) -> bool {
    let open = tables
        .loans
        .values()
        .filter(|loan| loan.item_id == item_id && loan.is_open())
        .count();
    match tables.items.get(item_id) {
        Some(item) if item.status == ItemStatus::OnLoan => open == 1,
        Some(_) => open == 0,
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use chrono::{Duration, Utc};
    use rust_decimal::Decimal;
    use crate::catalog::domain::model::{ItemEntity, TitleEntity};
    use crate::circulation::domain::CirculationService;
    use crate::circulation::domain::service::{item_loan_invariant_holds, CirculationServiceImpl};
    use crate::core::domain::Configuration;
    use crate::core::events::{EVENT_HOLD_READY_FOR_PICKUP, EVENT_ITEM_OVERDUE};
    use crate::core::library::{CirculationError, HoldFulfillment, ItemStatus, LedgerKind, LedgerStatus, PatronCategory, reason};
    use crate::gateway::memory::publisher::MemoryPublisher;
    use crate::hold::domain::model::HoldEntity;
    use crate::patrons::domain::model::PatronEntity;
    use crate::store::memory::Database;
    use crate::utils::telemetry::setup_tracing;

    fn service(db: &Arc<Database>, publisher: &MemoryPublisher) -> CirculationServiceImpl {
        CirculationServiceImpl::new(
            &Configuration::new("test"), db.clone(), Box::new(publisher.clone()))
    }

    async fn fixture() -> (Arc<Database>, MemoryPublisher, CirculationServiceImpl) {
        setup_tracing();
        let db = Database::new();
        let publisher = MemoryPublisher::new();
        let svc = service(&db, &publisher);
        (db, publisher, svc)
    }

    async fn seed_patron(db: &Database, category: PatronCategory) -> PatronEntity {
        let patron = PatronEntity::new("jo reader", category);
        let mut tx = db.transaction().await;
        tx.upsert_patron(&patron);
        tx.commit();
        patron
    }

    async fn seed_title_item(db: &Database, barcode: &str) -> (TitleEntity, ItemEntity) {
        let mut title = TitleEntity::new("dune", "herbert");
        title.replacement_cost = Some(Decimal::new(2500, 2));
        let item = ItemEntity::new(title.title_id.as_str(), barcode);
        let mut tx = db.transaction().await;
        tx.upsert_title(&title);
        tx.upsert_item(&item);
        tx.commit();
        (title, item)
    }

    async fn backdate_due(db: &Database, loan_id: &str, days: i64) {
        let mut tx = db.transaction().await;
        let mut loan = tx.loan(loan_id).expect("loan");
        loan.due_at = Utc::now().naive_utc() - Duration::days(days);
        tx.update_loan(&loan).expect("update");
        let mut item = tx.item_by_ref(loan.item_id.as_str()).expect("item");
        item.due_at = Some(loan.due_at);
        tx.upsert_item(&item);
        tx.commit();
    }

    #[tokio::test]
    async fn test_should_checkout_by_barcode() {
        let (db, _publisher, svc) = fixture().await;
        let patron = seed_patron(&db, PatronCategory::Adult).await;
        let (_title, item) = seed_title_item(&db, "bc-1").await;
        let loan = svc.checkout(patron.patron_id.as_str(), "bc-1").await.expect("checkout");
        assert_eq!(item.item_id, loan.item_id);
        assert_eq!(patron.patron_id, loan.patron_id);
        assert!(loan.returned_at.is_none());
        let tables = db.read().await;
        let stored = tables.item_by_ref("bc-1").expect("item");
        assert_eq!(ItemStatus::OnLoan, stored.status);
        assert_eq!(Some(loan.due_at), stored.due_at);
        assert_eq!(1, stored.times_loaned);
        assert!(item_loan_invariant_holds(&tables, item.item_id.as_str()));
    }

    #[tokio::test]
    async fn test_should_round_trip_on_time_return() {
        let (db, publisher, svc) = fixture().await;
        let patron = seed_patron(&db, PatronCategory::Adult).await;
        let (_title, item) = seed_title_item(&db, "bc-1").await;
        let loan = svc.checkout(patron.patron_id.as_str(), item.item_id.as_str()).await.expect("checkout");
        let outcome = svc.return_item(item.item_id.as_str()).await.expect("return");
        assert_eq!(loan.loan_id, outcome.loan.loan_id);
        assert!(outcome.loan.returned_at.is_some());
        assert!(outcome.fine_assessed.is_none());
        let tables = db.read().await;
        assert_eq!(ItemStatus::Available, tables.item_by_ref("bc-1").expect("item").status);
        assert!(tables.item_by_ref("bc-1").expect("item").due_at.is_none());
        // On-time round trip leaves no ledger entries, archives the loan.
        assert_eq!(0, tables.ledger.len());
        assert_eq!(0, tables.loans.len());
        assert_eq!(1, tables.loan_history.len());
        assert!(item_loan_invariant_holds(&tables, item.item_id.as_str()));
        drop(tables);
        assert_eq!(1, publisher.find_by_name("loan_returned").await.len());
    }

    #[tokio::test]
    async fn test_should_block_checkout_over_limit() {
        let (db, _publisher, svc) = fixture().await;
        let patron = seed_patron(&db, PatronCategory::Adult).await;
        {
            let mut tx = db.transaction().await;
            tx.set_config("policy.adult.max_checkouts", "2");
            tx.commit();
        }
        let (_t1, i1) = seed_title_item(&db, "bc-1").await;
        let (_t2, i2) = seed_title_item(&db, "bc-2").await;
        let (_t3, i3) = seed_title_item(&db, "bc-3").await;
        svc.checkout(patron.patron_id.as_str(), i1.item_id.as_str()).await.expect("first");
        svc.checkout(patron.patron_id.as_str(), i2.item_id.as_str()).await.expect("second");
        let err = svc.checkout(patron.patron_id.as_str(), i3.item_id.as_str()).await.expect_err("limit");
        assert!(matches!(err, CirculationError::Forbidden { .. }));
        assert_eq!(Some(reason::CHECKOUT_LIMIT_REACHED), err.reason_code());
        // Failed precondition leaves no partial writes.
        let tables = db.read().await;
        assert_eq!(2, tables.loans.len());
        let untouched = tables.item_by_ref("bc-3").expect("item");
        assert_eq!(ItemStatus::Available, untouched.status);
        assert_eq!(0, untouched.times_loaned);
    }

    #[tokio::test]
    async fn test_should_conflict_on_double_checkout() {
        let (db, _publisher, svc) = fixture().await;
        let first = seed_patron(&db, PatronCategory::Adult).await;
        let second = seed_patron(&db, PatronCategory::Adult).await;
        let (_title, item) = seed_title_item(&db, "bc-1").await;
        svc.checkout(first.patron_id.as_str(), item.item_id.as_str()).await.expect("checkout");
        let err = svc.checkout(second.patron_id.as_str(), item.item_id.as_str()).await.expect_err("double");
        assert!(matches!(err, CirculationError::Conflict { .. }));
        assert_eq!(Some(reason::ALREADY_ON_LOAN), err.reason_code());
    }

    #[tokio::test]
    async fn test_should_block_restricted_or_expired_patron() {
        let (db, _publisher, svc) = fixture().await;
        let now = Utc::now().naive_utc();
        let mut restricted = PatronEntity::new("deb", PatronCategory::Adult);
        restricted.restricted_until = Some(now + Duration::days(10));
        let mut expired = PatronEntity::new("exp", PatronCategory::Adult);
        expired.expires_at = now - Duration::days(1);
        {
            let mut tx = db.transaction().await;
            tx.upsert_patron(&restricted);
            tx.upsert_patron(&expired);
            tx.commit();
        }
        let (_title, item) = seed_title_item(&db, "bc-1").await;
        let err = svc.checkout(restricted.patron_id.as_str(), item.item_id.as_str()).await.expect_err("restricted");
        assert_eq!(Some(reason::PATRON_RESTRICTED), err.reason_code());
        let err = svc.checkout(expired.patron_id.as_str(), item.item_id.as_str()).await.expect_err("expired");
        assert_eq!(Some(reason::MEMBERSHIP_EXPIRED), err.reason_code());
    }

    #[tokio::test]
    async fn test_should_reject_unloanable_item() {
        let (db, _publisher, svc) = fixture().await;
        let patron = seed_patron(&db, PatronCategory::Adult).await;
        let (_title, mut item) = seed_title_item(&db, "bc-1").await;
        item.loanable = false;
        {
            let mut tx = db.transaction().await;
            tx.upsert_item(&item);
            tx.commit();
        }
        let err = svc.checkout(patron.patron_id.as_str(), item.item_id.as_str()).await.expect_err("unloanable");
        assert_eq!(Some(reason::ITEM_UNAVAILABLE), err.reason_code());
    }

    #[tokio::test]
    async fn test_should_treat_holds_as_reservation_and_fulfillment() {
        // Patron A holds item X; B cannot take it, A can, and A's hold
        // transitions out of the waiting state.
        let (db, _publisher, svc) = fixture().await;
        let patron_a = seed_patron(&db, PatronCategory::Adult).await;
        let patron_b = seed_patron(&db, PatronCategory::Adult).await;
        let (title, item) = seed_title_item(&db, "bc-1").await;
        let hold = HoldEntity::new(
            "test", title.title_id.as_str(), None, patron_a.patron_id.as_str(), 1, 7);
        {
            let mut tx = db.transaction().await;
            tx.upsert_hold(&hold);
            tx.commit();
        }
        let err = svc.checkout(patron_b.patron_id.as_str(), item.item_id.as_str()).await.expect_err("reserved");
        assert!(matches!(err, CirculationError::Forbidden { .. }));
        assert_eq!(Some(reason::ITEM_RESERVED), err.reason_code());
        svc.checkout(patron_a.patron_id.as_str(), item.item_id.as_str()).await.expect("holder checkout");
        let tables = db.read().await;
        let fulfilled = tables.hold(hold.hold_id.as_str()).expect("hold");
        assert_eq!(HoldFulfillment::InProcess, fulfilled.fulfillment);
    }

    #[tokio::test]
    async fn test_should_renew_additively_and_cap_renewals() {
        let (db, _publisher, svc) = fixture().await;
        let patron = seed_patron(&db, PatronCategory::Adult).await;
        let (_title, item) = seed_title_item(&db, "bc-1").await;
        let loan = svc.checkout(patron.patron_id.as_str(), item.item_id.as_str()).await.expect("checkout");
        let renewed = svc.renew(loan.loan_id.as_str()).await.expect("first renewal");
        // Additive extension from the current due date, not from now.
        assert_eq!(loan.due_at + Duration::days(14), renewed.due_at);
        assert_eq!(1, renewed.renewal_count);
        svc.renew(loan.loan_id.as_str()).await.expect("second renewal");
        let third = svc.renew(item.item_id.as_str()).await.expect("third renewal by item ref");
        assert_eq!(3, third.renewal_count);
        let err = svc.renew(loan.loan_id.as_str()).await.expect_err("renewal cap");
        assert!(matches!(err, CirculationError::Forbidden { .. }));
        assert_eq!(Some(reason::RENEWAL_LIMIT_REACHED), err.reason_code());
        let tables = db.read().await;
        let stored = tables.item_by_ref("bc-1").expect("item");
        assert_eq!(3, stored.times_renewed);
        assert_eq!(Some(third.due_at), stored.due_at);
    }

    #[tokio::test]
    async fn test_should_keep_overdue_renewal_in_the_past() {
        let (db, _publisher, svc) = fixture().await;
        let patron = seed_patron(&db, PatronCategory::Adult).await;
        let (_title, item) = seed_title_item(&db, "bc-1").await;
        let loan = svc.checkout(patron.patron_id.as_str(), item.item_id.as_str()).await.expect("checkout");
        backdate_due(&db, loan.loan_id.as_str(), 30).await;
        let renewed = svc.renew(loan.loan_id.as_str()).await.expect("renew overdue");
        // 30 days overdue plus a 14 day period still lands in the past.
        assert!(renewed.due_at < Utc::now().naive_utc());
    }

    #[tokio::test]
    async fn test_should_block_renewal_when_reserved_by_other() {
        let (db, _publisher, svc) = fixture().await;
        let patron = seed_patron(&db, PatronCategory::Adult).await;
        let waiter = seed_patron(&db, PatronCategory::Adult).await;
        let (title, item) = seed_title_item(&db, "bc-1").await;
        let loan = svc.checkout(patron.patron_id.as_str(), item.item_id.as_str()).await.expect("checkout");
        let hold = HoldEntity::new(
            "test", title.title_id.as_str(), None, waiter.patron_id.as_str(), 1, 7);
        {
            let mut tx = db.transaction().await;
            tx.upsert_hold(&hold);
            tx.commit();
        }
        let err = svc.renew(loan.loan_id.as_str()).await.expect_err("reserved");
        assert_eq!(Some(reason::ITEM_RESERVED), err.reason_code());
    }

    #[tokio::test]
    async fn test_should_fail_renew_and_return_when_not_on_loan() {
        let (db, _publisher, svc) = fixture().await;
        let _patron = seed_patron(&db, PatronCategory::Adult).await;
        let (_title, item) = seed_title_item(&db, "bc-1").await;
        let err = svc.renew(item.item_id.as_str()).await.expect_err("not on loan");
        assert!(matches!(err, CirculationError::Invalid { .. }));
        assert_eq!(Some(reason::NOT_ON_LOAN), err.reason_code());
        let err = svc.return_item("bc-1").await.expect_err("not on loan");
        assert_eq!(Some(reason::NOT_ON_LOAN), err.reason_code());
        let err = svc.return_item("no-such-ref").await.expect_err("unknown");
        assert!(matches!(err, CirculationError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_should_assess_fine_for_late_return() {
        // Four days late at the default 0.25/day comes to exactly 1.00.
        let (db, publisher, svc) = fixture().await;
        let patron = seed_patron(&db, PatronCategory::Adult).await;
        let (_title, item) = seed_title_item(&db, "bc-1").await;
        let loan = svc.checkout(patron.patron_id.as_str(), item.item_id.as_str()).await.expect("checkout");
        backdate_due(&db, loan.loan_id.as_str(), 4).await;
        let outcome = svc.return_item(item.item_id.as_str()).await.expect("return");
        let fine = outcome.fine_assessed.expect("fine assessed");
        assert_eq!(LedgerKind::OverdueFine, fine.kind);
        assert_eq!(Decimal::new(100, 2), fine.amount);
        assert_eq!(LedgerStatus::Open, fine.status);
        assert_eq!(Some(loan.loan_id), fine.loan_id);
        let tables = db.read().await;
        assert_eq!(1, tables.ledger.len());
        drop(tables);
        assert_eq!(1, publisher.find_by_name("overdue_fine_assessed").await.len());
    }

    #[tokio::test]
    async fn test_should_promote_next_hold_on_return() {
        let (db, publisher, svc) = fixture().await;
        let borrower = seed_patron(&db, PatronCategory::Adult).await;
        let waiter = seed_patron(&db, PatronCategory::Adult).await;
        let (title, item) = seed_title_item(&db, "bc-1").await;
        svc.checkout(borrower.patron_id.as_str(), item.item_id.as_str()).await.expect("checkout");
        let hold = HoldEntity::new(
            "test", title.title_id.as_str(), None, waiter.patron_id.as_str(), 1, 7);
        {
            let mut tx = db.transaction().await;
            tx.upsert_hold(&hold);
            tx.commit();
        }
        svc.return_item(item.item_id.as_str()).await.expect("return");
        let tables = db.read().await;
        let promoted = tables.hold(hold.hold_id.as_str()).expect("hold");
        assert_eq!(HoldFulfillment::ReadyForPickup, promoted.fulfillment);
        assert!(promoted.waiting_since.is_some());
        drop(tables);
        assert_eq!(
            vec![hold.hold_id.to_string()],
            publisher.find_by_name(EVENT_HOLD_READY_FOR_PICKUP).await);
        // The ready hold now reserves the copy for the waiter.
        let err = svc.checkout(borrower.patron_id.as_str(), item.item_id.as_str()).await.expect_err("reserved");
        assert_eq!(Some(reason::ITEM_RESERVED), err.reason_code());
        svc.checkout(waiter.patron_id.as_str(), item.item_id.as_str()).await.expect("waiter checkout");
    }

    #[tokio::test]
    async fn test_should_post_lost_fee_once_and_close_loan() {
        let (db, _publisher, svc) = fixture().await;
        let patron = seed_patron(&db, PatronCategory::Adult).await;
        let (_title, item) = seed_title_item(&db, "bc-1").await;
        svc.checkout(patron.patron_id.as_str(), item.item_id.as_str()).await.expect("checkout");
        let charge = svc.mark_item_lost(item.item_id.as_str()).await.expect("mark lost")
            .expect("replacement fee");
        assert_eq!(LedgerKind::LostFee, charge.kind);
        assert_eq!(Decimal::new(2500, 2), charge.amount);
        {
            let tables = db.read().await;
            assert_eq!(ItemStatus::Lost, tables.item_by_ref("bc-1").expect("item").status);
            assert_eq!(0, tables.loans.len());
            assert_eq!(1, tables.loan_history.len());
            assert!(tables.loan_history[0].returned_at.is_some());
        }
        // Re-applying the status never duplicates the charge.
        let repeat = svc.mark_item_lost(item.item_id.as_str()).await.expect("repeat");
        assert!(repeat.is_none());
        let tables = db.read().await;
        assert_eq!(1, tables.ledger.len());
    }

    #[tokio::test]
    async fn test_should_post_half_price_damage_fee_once() {
        let (db, _publisher, svc) = fixture().await;
        let patron = seed_patron(&db, PatronCategory::Adult).await;
        let (_title, item) = seed_title_item(&db, "bc-1").await;
        svc.checkout(patron.patron_id.as_str(), item.item_id.as_str()).await.expect("checkout");
        let charge = svc.mark_item_damaged(item.item_id.as_str()).await.expect("mark damaged")
            .expect("damage fee");
        assert_eq!(LedgerKind::DamageFee, charge.kind);
        assert_eq!(Decimal::new(1250, 2), charge.amount);
        let repeat = svc.mark_item_damaged(item.item_id.as_str()).await.expect("repeat");
        assert!(repeat.is_none());
        let tables = db.read().await;
        // The loan stays open for a damaged item.
        assert_eq!(1, tables.loans.len());
        assert_eq!(1, tables.ledger.len());
    }

    #[tokio::test]
    async fn test_should_keep_damaged_status_through_return() {
        let (db, _publisher, svc) = fixture().await;
        let patron = seed_patron(&db, PatronCategory::Adult).await;
        let waiter = seed_patron(&db, PatronCategory::Adult).await;
        let (title, item) = seed_title_item(&db, "bc-1").await;
        svc.checkout(patron.patron_id.as_str(), item.item_id.as_str()).await.expect("checkout");
        svc.mark_item_damaged(item.item_id.as_str()).await.expect("mark damaged");
        let hold = HoldEntity::new(
            "test", title.title_id.as_str(), None, waiter.patron_id.as_str(), 1, 7);
        {
            let mut tx = db.transaction().await;
            tx.upsert_hold(&hold);
            tx.commit();
        }
        svc.return_item(item.item_id.as_str()).await.expect("return");
        let tables = db.read().await;
        let stored = tables.item_by_ref("bc-1").expect("item");
        // Returning a damaged copy does not put it back on the shelf.
        assert_eq!(ItemStatus::Damaged, stored.status);
        assert!(stored.due_at.is_none());
        assert_eq!(0, tables.loans.len());
        // An unloanable copy cannot be promised to the next waiter.
        assert_eq!(
            HoldFulfillment::None,
            tables.hold(hold.hold_id.as_str()).expect("hold").fulfillment);
    }

    #[tokio::test]
    async fn test_should_change_condition_without_open_loan() {
        let (db, _publisher, svc) = fixture().await;
        let (_title, item) = seed_title_item(&db, "bc-1").await;
        let charge = svc.mark_item_damaged(item.item_id.as_str()).await.expect("mark damaged");
        assert!(charge.is_none());
        let tables = db.read().await;
        assert_eq!(ItemStatus::Damaged, tables.item_by_ref("bc-1").expect("item").status);
        assert_eq!(0, tables.ledger.len());
    }

    #[tokio::test]
    async fn test_should_query_and_notify_overdue() {
        let (db, publisher, svc) = fixture().await;
        let patron = seed_patron(&db, PatronCategory::Adult).await;
        let (_t1, i1) = seed_title_item(&db, "bc-1").await;
        let (_t2, i2) = seed_title_item(&db, "bc-2").await;
        let late = svc.checkout(patron.patron_id.as_str(), i1.item_id.as_str()).await.expect("late");
        let _on_time = svc.checkout(patron.patron_id.as_str(), i2.item_id.as_str()).await.expect("on time");
        backdate_due(&db, late.loan_id.as_str(), 3).await;
        let overdue = svc.query_overdue().await.expect("query");
        assert_eq!(1, overdue.len());
        assert_eq!(late.loan_id, overdue[0].loan_id);
        let notified = svc.notify_overdue().await.expect("notify");
        assert_eq!(1, notified);
        assert_eq!(
            vec![late.loan_id],
            publisher.find_by_name(EVENT_ITEM_OVERDUE).await);
    }

    #[tokio::test]
    async fn test_should_serialize_concurrent_checkouts_at_the_limit() {
        // Two desks racing for the last slot: exactly one wins.
        let (db, publisher, _svc) = fixture().await;
        let patron = seed_patron(&db, PatronCategory::Adult).await;
        {
            let mut tx = db.transaction().await;
            tx.set_config("policy.adult.max_checkouts", "1");
            tx.commit();
        }
        let (_t1, i1) = seed_title_item(&db, "bc-1").await;
        let (_t2, i2) = seed_title_item(&db, "bc-2").await;
        let svc_a = Arc::new(service(&db, &publisher));
        let svc_b = Arc::new(service(&db, &publisher));
        let patron_id = patron.patron_id.to_string();
        let a = {
            let svc = svc_a.clone();
            let patron_id = patron_id.clone();
            let item_id = i1.item_id.to_string();
            tokio::spawn(async move { svc.checkout(patron_id.as_str(), item_id.as_str()).await })
        };
        let b = {
            let svc = svc_b.clone();
            let item_id = i2.item_id.to_string();
            tokio::spawn(async move { svc.checkout(patron_id.as_str(), item_id.as_str()).await })
        };
        let results = vec![a.await.expect("join"), b.await.expect("join")];
        let wins = results.iter().filter(|result| result.is_ok()).count();
        assert_eq!(1, wins);
        let loser = results.into_iter().find(|result| result.is_err()).expect("loser").unwrap_err();
        assert_eq!(Some(reason::CHECKOUT_LIMIT_REACHED), loser.reason_code());
        let tables = db.read().await;
        assert_eq!(1, tables.loans.len());
    }
}
