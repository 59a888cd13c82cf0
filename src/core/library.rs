use std::fmt;
use std::fmt::{Display, Formatter};
use serde::{Deserialize, Serialize};

#[derive(Debug)]
pub enum CirculationError {
    // Referenced patron/item/title/loan/hold/ledger-entry does not exist.
    NotFound {
        message: String,
    },
    // Operation does not apply to the current entity state, e.g. returning
    // an item that is not on loan.
    Invalid {
        message: String,
        reason_code: Option<String>,
    },
    // Concurrency or uniqueness violation: duplicate checkout, duplicate
    // hold, overpayment.
    Conflict {
        message: String,
        reason_code: Option<String>,
    },
    // A circulation policy blocks the action: limit reached, restricted
    // patron, item reserved for another patron.
    Forbidden {
        message: String,
        reason_code: Option<String>,
    },
    Serialization {
        message: String,
    },
    Internal {
        message: String,
        reason_code: Option<String>,
    },
}

impl CirculationError {
    pub fn not_found(message: &str) -> CirculationError {
        CirculationError::NotFound { message: message.to_string() }
    }

    pub fn invalid(message: &str, reason_code: Option<String>) -> CirculationError {
        CirculationError::Invalid { message: message.to_string(), reason_code }
    }

    pub fn conflict(message: &str, reason_code: Option<String>) -> CirculationError {
        CirculationError::Conflict { message: message.to_string(), reason_code }
    }

    pub fn forbidden(message: &str, reason_code: Option<String>) -> CirculationError {
        CirculationError::Forbidden { message: message.to_string(), reason_code }
    }

    pub fn serialization(message: &str) -> CirculationError {
        CirculationError::Serialization { message: message.to_string() }
    }

    pub fn internal(message: &str, reason_code: Option<String>) -> CirculationError {
        CirculationError::Internal { message: message.to_string(), reason_code }
    }

    pub fn reason_code(&self) -> Option<&str> {
        match self {
            CirculationError::NotFound { .. } => None,
            CirculationError::Invalid { reason_code, .. } => reason_code.as_deref(),
            CirculationError::Conflict { reason_code, .. } => reason_code.as_deref(),
            CirculationError::Forbidden { reason_code, .. } => reason_code.as_deref(),
            CirculationError::Serialization { .. } => None,
            CirculationError::Internal { reason_code, .. } => reason_code.as_deref(),
        }
    }
}

impl From<serde_json::Error> for CirculationError {
    fn from(err: serde_json::Error) -> Self {
        CirculationError::serialization(
            format!("serde json parsing {:?}", err).as_str())
    }
}

impl Display for CirculationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            CirculationError::NotFound { message } => {
                write!(f, "{}", message)
            }
            CirculationError::Invalid { message, reason_code } => {
                write!(f, "{} {:?}", message, reason_code)
            }
            CirculationError::Conflict { message, reason_code } => {
                write!(f, "{} {:?}", message, reason_code)
            }
            CirculationError::Forbidden { message, reason_code } => {
                write!(f, "{} {:?}", message, reason_code)
            }
            CirculationError::Serialization { message } => {
                write!(f, "{}", message)
            }
            CirculationError::Internal { message, reason_code } => {
                write!(f, "{} {:?}", message, reason_code)
            }
        }
    }
}

/// A specialized Result type for circulation operations.
pub type CirculationResult<T> = Result<T, CirculationError>;

#[derive(Debug, PartialEq, Clone, Copy, Serialize, Deserialize)]
pub enum ItemStatus {
    Available,
    OnLoan,
    Lost,
    Damaged,
    Withdrawn,
}

impl From<String> for ItemStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "Available" => ItemStatus::Available,
            "OnLoan" => ItemStatus::OnLoan,
            "Lost" => ItemStatus::Lost,
            "Damaged" => ItemStatus::Damaged,
            "Withdrawn" => ItemStatus::Withdrawn,
            _ => ItemStatus::Available,
        }
    }
}

impl Display for ItemStatus {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            ItemStatus::Available => write!(f, "Available"),
            ItemStatus::OnLoan => write!(f, "OnLoan"),
            ItemStatus::Lost => write!(f, "Lost"),
            ItemStatus::Damaged => write!(f, "Damaged"),
            ItemStatus::Withdrawn => write!(f, "Withdrawn"),
        }
    }
}

// Fulfillment state of a hold: waiting in queue, ready at the pickup shelf,
// or being converted into a loan at the desk.
#[derive(Debug, PartialEq, Clone, Copy, Serialize, Deserialize)]
pub enum HoldFulfillment {
    None,
    ReadyForPickup,
    InProcess,
}

impl From<String> for HoldFulfillment {
    fn from(s: String) -> Self {
        match s.as_str() {
            "None" => HoldFulfillment::None,
            "ReadyForPickup" => HoldFulfillment::ReadyForPickup,
            "InProcess" => HoldFulfillment::InProcess,
            _ => HoldFulfillment::None,
        }
    }
}

impl Display for HoldFulfillment {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            HoldFulfillment::None => write!(f, "None"),
            HoldFulfillment::ReadyForPickup => write!(f, "ReadyForPickup"),
            HoldFulfillment::InProcess => write!(f, "InProcess"),
        }
    }
}

#[derive(Debug, PartialEq, Clone, Copy, Serialize, Deserialize)]
pub enum LedgerKind {
    OverdueFine,
    LostFee,
    DamageFee,
    Rental,
    Payment,
    Credit,
}

impl From<String> for LedgerKind {
    fn from(s: String) -> Self {
        match s.as_str() {
            "OverdueFine" => LedgerKind::OverdueFine,
            "LostFee" => LedgerKind::LostFee,
            "DamageFee" => LedgerKind::DamageFee,
            "Rental" => LedgerKind::Rental,
            "Payment" => LedgerKind::Payment,
            "Credit" => LedgerKind::Credit,
            _ => LedgerKind::OverdueFine,
        }
    }
}

impl Display for LedgerKind {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            LedgerKind::OverdueFine => write!(f, "OverdueFine"),
            LedgerKind::LostFee => write!(f, "LostFee"),
            LedgerKind::DamageFee => write!(f, "DamageFee"),
            LedgerKind::Rental => write!(f, "Rental"),
            LedgerKind::Payment => write!(f, "Payment"),
            LedgerKind::Credit => write!(f, "Credit"),
        }
    }
}

#[derive(Debug, PartialEq, Clone, Copy, Serialize, Deserialize)]
pub enum LedgerStatus {
    Open,
    PartiallyPaid,
    Paid,
}

impl From<String> for LedgerStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "Open" => LedgerStatus::Open,
            "PartiallyPaid" => LedgerStatus::PartiallyPaid,
            "Paid" => LedgerStatus::Paid,
            _ => LedgerStatus::Open,
        }
    }
}

impl Display for LedgerStatus {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            LedgerStatus::Open => write!(f, "Open"),
            LedgerStatus::PartiallyPaid => write!(f, "PartiallyPaid"),
            LedgerStatus::Paid => write!(f, "Paid"),
        }
    }
}

#[derive(Debug, PartialEq, Clone, Copy, Serialize, Deserialize)]
pub enum PatronCategory {
    Adult,
    Student,
    Child,
    Senior,
    Staff,
}

impl PatronCategory {
    // Config key segment for per-category policy rows.
    pub fn code(&self) -> &'static str {
        match self {
            PatronCategory::Adult => "adult",
            PatronCategory::Student => "student",
            PatronCategory::Child => "child",
            PatronCategory::Senior => "senior",
            PatronCategory::Staff => "staff",
        }
    }
}

impl From<String> for PatronCategory {
    fn from(s: String) -> Self {
        match s.as_str() {
            "Adult" => PatronCategory::Adult,
            "Student" => PatronCategory::Student,
            "Child" => PatronCategory::Child,
            "Senior" => PatronCategory::Senior,
            "Staff" => PatronCategory::Staff,
            _ => PatronCategory::Adult,
        }
    }
}

impl Display for PatronCategory {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            PatronCategory::Adult => write!(f, "Adult"),
            PatronCategory::Student => write!(f, "Student"),
            PatronCategory::Child => write!(f, "Child"),
            PatronCategory::Senior => write!(f, "Senior"),
            PatronCategory::Staff => write!(f, "Staff"),
        }
    }
}

// Reason codes carried by policy/state errors so that callers can branch
// without string-matching the human-readable message.
pub mod reason {
    pub const PATRON_RESTRICTED: &str = "PatronRestricted";
    pub const MEMBERSHIP_EXPIRED: &str = "MembershipExpired";
    pub const ITEM_UNAVAILABLE: &str = "ItemUnavailable";
    pub const ALREADY_ON_LOAN: &str = "AlreadyOnLoan";
    pub const CHECKOUT_LIMIT_REACHED: &str = "CheckoutLimitReached";
    pub const NOT_ON_LOAN: &str = "NotOnLoan";
    pub const RENEWAL_LIMIT_REACHED: &str = "RenewalLimitReached";
    pub const ITEM_RESERVED: &str = "ItemReserved";
    pub const DUPLICATE_HOLD: &str = "DuplicateHold";
    pub const OVERPAYMENT: &str = "Overpayment";
}
