pub mod core;
pub mod store;
pub mod policy;
pub mod patrons;
pub mod catalog;
pub mod circulation;
pub mod hold;
pub mod fines;
pub mod ledger;
pub mod gateway;
pub mod utils;
