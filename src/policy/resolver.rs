use rust_decimal::Decimal;
use crate::core::library::PatronCategory;
use crate::store::memory::Tables;

// Fallback values used whenever the config row is absent or unparseable;
// policy resolution must never fail a circulation operation.
pub const DEFAULT_LOAN_PERIOD_DAYS: i64 = 14;
pub const DEFAULT_MAX_CHECKOUTS: i64 = 5;
pub const DEFAULT_MAX_RENEWALS: i64 = 3;
pub const DEFAULT_HOLD_EXPIRY_DAYS: i64 = 7;

pub fn default_fine_per_day() -> Decimal {
    Decimal::new(25, 2) // 0.25 per day
}

// Config keys. Category rows: policy.<category>.<name>; globals: policy.<name>.
fn category_key(category: PatronCategory, name: &str) -> String {
    format!("policy.{}.{}", category.code(), name)
}

fn global_key(name: &str) -> String {
    format!("policy.{}", name)
}

// PolicySnapshot is the set of rules in force for one patron category,
// resolved once at the start of a transaction. Pure lookup, no state.
#[derive(Debug, PartialEq, Clone)]
pub struct PolicySnapshot {
    pub loan_period_days: i64,
    pub max_checkouts: i64,
    pub fine_per_day: Decimal,
    pub max_renewals: i64,
    pub hold_expiry_days: i64,
}

impl PolicySnapshot {
    pub fn load(tables: &Tables, category: PatronCategory) -> Self {
        Self {
            loan_period_days: config_i64(
                tables, category_key(category, "loan_period_days").as_str(), DEFAULT_LOAN_PERIOD_DAYS),
            max_checkouts: config_i64(
                tables, category_key(category, "max_checkouts").as_str(), DEFAULT_MAX_CHECKOUTS),
            fine_per_day: config_decimal(
                tables, global_key("fine_per_day").as_str(), default_fine_per_day()),
            max_renewals: config_i64(
                tables, global_key("max_renewals").as_str(), DEFAULT_MAX_RENEWALS),
            hold_expiry_days: config_i64(
                tables, global_key("hold_expiry_days").as_str(), DEFAULT_HOLD_EXPIRY_DAYS),
        }
    }
}

fn config_i64(tables: &Tables, key: &str, default: i64) -> i64 {
    tables
        .config_value(key)
        .and_then(|value| value.parse::<i64>().ok())
        .unwrap_or(default)
}

fn config_decimal(tables: &Tables, key: &str, default: Decimal) -> Decimal {
    tables
        .config_value(key)
        .and_then(|value| value.parse::<Decimal>().ok())
        .unwrap_or(default)
}
