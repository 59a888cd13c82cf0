//! Transactional in-memory store standing in for the relational collaborator.
//!
//! Tables live behind one `tokio::sync::Mutex`. A transaction locks the
//! store, mutates a working copy and publishes it on commit; dropping the
//! transaction without committing discards every write. Holding the lock for
//! the whole count-then-insert sequence is what serializes concurrent
//! checkouts against the per-patron limit.

use std::collections::BTreeMap;
use std::collections::HashMap;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};
use crate::catalog::domain::model::{ItemEntity, TitleEntity};
use crate::circulation::domain::model::LoanEntity;
use crate::core::library::{CirculationError, CirculationResult, LedgerKind, reason};
use crate::hold::domain::model::HoldEntity;
use crate::ledger::domain::model::LedgerEntryEntity;
use crate::patrons::domain::model::PatronEntity;

#[derive(Debug, Default, Clone)]
pub struct Tables {
    pub patrons: BTreeMap<String, PatronEntity>,
    pub titles: BTreeMap<String, TitleEntity>,
    pub items: BTreeMap<String, ItemEntity>,
    pub loans: BTreeMap<String, LoanEntity>,
    pub loan_history: Vec<LoanEntity>,
    pub holds: BTreeMap<String, HoldEntity>,
    pub ledger: BTreeMap<String, LedgerEntryEntity>,
    pub config: HashMap<String, String>,
}

impl Tables {
    pub fn patron(&self, patron_id: &str) -> CirculationResult<PatronEntity> {
        self.patrons.get(patron_id).cloned().ok_or_else(|| {
            CirculationError::not_found(format!("patron with id {} not found", patron_id).as_str())
        })
    }

    pub fn upsert_patron(&mut self, patron: &PatronEntity) {
        self.patrons.insert(patron.patron_id.to_string(), patron.clone());
    }

    pub fn title(&self, title_id: &str) -> CirculationResult<TitleEntity> {
        self.titles.get(title_id).cloned().ok_or_else(|| {
            CirculationError::not_found(format!("title with id {} not found", title_id).as_str())
        })
    }

    pub fn upsert_title(&mut self, title: &TitleEntity) {
        self.titles.insert(title.title_id.to_string(), title.clone());
    }

    // Items are addressable by id or barcode; desks scan whichever they have.
    pub fn item_by_ref(&self, item_ref: &str) -> CirculationResult<ItemEntity> {
        if let Some(item) = self.items.get(item_ref) {
            return Ok(item.clone());
        }
        self.items
            .values()
            .find(|item| item.barcode == item_ref)
            .cloned()
            .ok_or_else(|| {
                CirculationError::not_found(
                    format!("item with id or barcode {} not found", item_ref).as_str())
            })
    }

    pub fn upsert_item(&mut self, item: &ItemEntity) {
        self.items.insert(item.item_id.to_string(), item.clone());
    }

    pub fn loan(&self, loan_id: &str) -> CirculationResult<LoanEntity> {
        self.loans.get(loan_id).cloned().ok_or_else(|| {
            CirculationError::not_found(format!("loan with id {} not found", loan_id).as_str())
        })
    }

    // Resolves a loan by loan id, item id or item barcode (open loans only
    // live in this table, so any match is the open loan).
    pub fn loan_by_ref(&self, loan_ref: &str) -> Option<LoanEntity> {
        if let Some(loan) = self.loans.get(loan_ref) {
            return Some(loan.clone());
        }
        let item_id = match self.item_by_ref(loan_ref) {
            Ok(item) => item.item_id,
            Err(_) => return None,
        };
        self.open_loan_for_item(item_id.as_str())
    }

    pub fn open_loan_for_item(&self, item_id: &str) -> Option<LoanEntity> {
        self.loans
            .values()
            .find(|loan| loan.item_id == item_id && loan.is_open())
            .cloned()
    }

    pub fn open_loans_for_patron(&self, patron_id: &str) -> Vec<LoanEntity> {
        self.loans
            .values()
            .filter(|loan| loan.patron_id == patron_id && loan.is_open())
            .cloned()
            .collect()
    }

    // Storage-layer backstop for "at most one open loan per item": even a
    // caller that skips the service-level checks fails loudly here.
    pub fn insert_loan(&mut self, loan: &LoanEntity) -> CirculationResult<()> {
        if loan.is_open() && self.open_loan_for_item(loan.item_id.as_str()).is_some() {
            return Err(CirculationError::conflict(
                format!("item {} already has an open loan", loan.item_id).as_str(),
                Some(reason::ALREADY_ON_LOAN.to_string())));
        }
        self.loans.insert(loan.loan_id.to_string(), loan.clone());
        Ok(())
    }

    pub fn update_loan(&mut self, loan: &LoanEntity) -> CirculationResult<()> {
        if !self.loans.contains_key(loan.loan_id.as_str()) {
            return Err(CirculationError::not_found(
                format!("loan with id {} not found", loan.loan_id).as_str()));
        }
        self.loans.insert(loan.loan_id.to_string(), loan.clone());
        Ok(())
    }

    // Closes out the live row; history is append-only.
    pub fn archive_loan(&mut self, loan: &LoanEntity) {
        self.loans.remove(loan.loan_id.as_str());
        self.loan_history.push(loan.clone());
    }

    pub fn hold(&self, hold_id: &str) -> CirculationResult<HoldEntity> {
        self.holds.get(hold_id).cloned().ok_or_else(|| {
            CirculationError::not_found(format!("hold with id {} not found", hold_id).as_str())
        })
    }

    pub fn upsert_hold(&mut self, hold: &HoldEntity) {
        self.holds.insert(hold.hold_id.to_string(), hold.clone());
    }

    pub fn holds_for_title(&self, title_id: &str) -> Vec<HoldEntity> {
        self.holds
            .values()
            .filter(|hold| hold.title_id == title_id)
            .cloned()
            .collect()
    }

    pub fn holds_for_patron(&self, patron_id: &str) -> Vec<HoldEntity> {
        self.holds
            .values()
            .filter(|hold| hold.patron_id == patron_id)
            .cloned()
            .collect()
    }

    pub fn ledger_entry(&self, entry_id: &str) -> CirculationResult<LedgerEntryEntity> {
        self.ledger.get(entry_id).cloned().ok_or_else(|| {
            CirculationError::not_found(
                format!("ledger entry with id {} not found", entry_id).as_str())
        })
    }

    pub fn upsert_ledger_entry(&mut self, entry: &LedgerEntryEntity) {
        self.ledger.insert(entry.entry_id.to_string(), entry.clone());
    }

    pub fn ledger_for_patron(&self, patron_id: &str) -> Vec<LedgerEntryEntity> {
        self.ledger
            .values()
            .filter(|entry| entry.patron_id == patron_id)
            .cloned()
            .collect()
    }

    // Charge of a given kind already posted against a loan, settled or not;
    // the idempotency check for condition-change fees.
    pub fn charge_for_loan(&self, loan_id: &str, kind: LedgerKind) -> Option<LedgerEntryEntity> {
        self.ledger
            .values()
            .find(|entry| {
                entry.kind == kind
                    && entry.loan_id.as_deref() == Some(loan_id)
            })
            .cloned()
    }

    pub fn set_config(&mut self, key: &str, value: &str) {
        self.config.insert(key.to_string(), value.to_string());
    }

    pub fn config_value(&self, key: &str) -> Option<&str> {
        self.config.get(key).map(String::as_str)
    }
}

// Database is the shared handle HTTP handlers and the scheduler hold.
#[derive(Debug, Default)]
pub struct Database {
    tables: Mutex<Tables>,
}

impl Database {
    pub fn new() -> Arc<Self> {
        Arc::new(Self { tables: Mutex::new(Tables::default()) })
    }

    // Serializing write transaction over a working copy of all tables.
    pub async fn transaction(&self) -> Transaction<'_> {
        let guard = self.tables.lock().await;
        let working = guard.clone();
        Transaction { guard, working }
    }

    // Consistent read snapshot; holds the lock for the guard's lifetime.
    pub async fn read(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().await
    }
}

pub struct Transaction<'a> {
    guard: MutexGuard<'a, Tables>,
    working: Tables,
}

impl Transaction<'_> {
    // Publishes the working copy. Dropping without commit rolls back.
    pub fn commit(mut self) {
        *self.guard = self.working;
    }
}

impl Deref for Transaction<'_> {
    type Target = Tables;

    fn deref(&self) -> &Tables {
        &self.working
    }
}

impl DerefMut for Transaction<'_> {
    fn deref_mut(&mut self) -> &mut Tables {
        &mut self.working
    }
}
