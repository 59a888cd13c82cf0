pub mod events;
pub mod factory;
pub mod log;
pub mod memory;

use serde::{Deserialize, Serialize};

#[derive(Debug, PartialEq, Serialize, Deserialize, Clone, Copy)]
pub enum GatewayPublisherVia {
    Log,
    Memory,
}
