use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Identifier wrapper for tenants as issued by the admin backend.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantId(pub String);

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Active room assignment; `rent_date` anchors the reminder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RentRecord {
    pub rent_id: String,
    pub room_id: String,
    pub rent_date: NaiveDate,
    pub rent_out: Option<NaiveDate>,
}

impl RentRecord {
    /// A tenant has moved out once the rent-out day has been reached.
    pub fn moved_out_by(&self, day: NaiveDate) -> bool {
        matches!(self.rent_out, Some(out) if out <= day)
    }
}

/// Tenant row joined with its (at most one) rent record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantRecord {
    pub id: TenantId,
    pub full_name: String,
    pub phone: Option<String>,
    pub rent: Option<RentRecord>,
}

impl TenantRecord {
    pub fn rent_date(&self) -> Option<NaiveDate> {
        self.rent.as_ref().map(|rent| rent.rent_date)
    }

    /// Phone number as stored, `None` when missing or blank.
    pub fn contact_phone(&self) -> Option<&str> {
        self.phone
            .as_deref()
            .map(str::trim)
            .filter(|phone| !phone.is_empty())
    }
}

/// Result of one delivery attempt as far as the counters are concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryOutcome {
    Sent,
    Failed,
}

impl DeliveryOutcome {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Sent => "sent",
            Self::Failed => "failed",
        }
    }
}

/// Why a tenant was left out of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    NoRentRecord,
    NoPhoneNumber,
    MovedOut,
    NotDue,
}

impl SkipReason {
    pub const fn label(self) -> &'static str {
        match self {
            Self::NoRentRecord => "no_rent_record",
            Self::NoPhoneNumber => "no_phone_number",
            Self::MovedOut => "moved_out",
            Self::NotDue => "not_due",
        }
    }
}
