use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use crate::core::library::HoldFulfillment;
use crate::utils::date::serializer;

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct HoldDto {
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
    pub waiting_since: Option<NaiveDateTime>,
    pub canceled_at: Option<NaiveDateTime>,
    pub cancel_reason: Option<String>,
    #[serde(with = "serializer")]
    pub created_at: NaiveDateTime,
    #[serde(with = "serializer")]
    pub updated_at: NaiveDateTime,
}
