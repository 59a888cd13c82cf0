use chrono::{Duration, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use crate::core::domain::Identifiable;
use crate::core::library::PatronCategory;
use crate::utils::date::serializer;

// PatronEntity is read-mostly inside the circulation core: the engine only
// consults category, membership expiry and the restriction date. Everything
// else is owned by the patron-management collaborator.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct PatronEntity {
    pub patron_id: String,
    pub version: i64,
    pub full_name: String,
    pub category: PatronCategory,
    #[serde(with = "serializer")]
    pub enrolled_at: NaiveDateTime,
    #[serde(with = "serializer")]
    pub expires_at: NaiveDateTime,
    // Debarred until this date; checkouts are blocked while it is in the future.
    pub restricted_until: Option<NaiveDateTime>,
    #[serde(with = "serializer")]
    pub created_at: NaiveDateTime,
    #[serde(with = "serializer")]
    pub updated_at: NaiveDateTime,
}

impl PatronEntity {
    pub fn new(full_name: &str, category: PatronCategory) -> Self {
        Self {
            patron_id: Uuid::new_v4().to_string(),
            version: 0,
            full_name: full_name.to_string(),
            category,
            enrolled_at: Utc::now().naive_utc(),
            expires_at: Utc::now().naive_utc() + Duration::days(365),
            restricted_until: None,
            created_at: Utc::now().naive_utc(),
            updated_at: Utc::now().naive_utc(),
        }
    }

    pub fn is_restricted(&self, now: NaiveDateTime) -> bool {
        match self.restricted_until {
            Some(until) => until > now,
            None => false,
        }
    }

    pub fn is_expired(&self, now: NaiveDateTime) -> bool {
        self.expires_at <= now
    }
}

impl Identifiable for PatronEntity {
    fn id(&self) -> String {
        self.patron_id.to_string()
    }

    fn version(&self) -> i64 {
        self.version
    }
}
