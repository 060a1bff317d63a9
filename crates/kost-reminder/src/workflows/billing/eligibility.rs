use chrono::{Days, NaiveDate};

use super::domain::{SkipReason, TenantRecord};

pub const DEFAULT_REMINDER_OFFSET_DAYS: u32 = 3;

/// `rent_date - offset_days`, `None` if that falls before the calendar start.
pub fn reminder_date(rent_date: NaiveDate, offset_days: u32) -> Option<NaiveDate> {
    rent_date.checked_sub_days(Days::new(u64::from(offset_days)))
}

/// True iff `today` is the same calendar day as the reminder date.
pub fn is_reminder_due(today: NaiveDate, rent_date: NaiveDate, offset_days: u32) -> bool {
    reminder_date(rent_date, offset_days) == Some(today)
}

/// Read-only reminder rule applied to each ledger row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReminderPolicy {
    pub offset_days: u32,
}

impl Default for ReminderPolicy {
    fn default() -> Self {
        Self {
            offset_days: DEFAULT_REMINDER_OFFSET_DAYS,
        }
    }
}

/// A tenant that has everything needed for a send and is due today.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReminderCandidate<'a> {
    pub tenant: &'a TenantRecord,
    pub phone: &'a str,
    pub rent_date: NaiveDate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Eligibility<'a> {
    Due(ReminderCandidate<'a>),
    Skipped(SkipReason),
}

impl ReminderPolicy {
    pub fn new(offset_days: u32) -> Self {
        Self { offset_days }
    }

    /// Missing data short-circuits before any date math.
    pub fn evaluate<'a>(&self, tenant: &'a TenantRecord, today: NaiveDate) -> Eligibility<'a> {
        let Some(rent) = tenant.rent.as_ref() else {
            return Eligibility::Skipped(SkipReason::NoRentRecord);
        };
        let Some(phone) = tenant.contact_phone() else {
            return Eligibility::Skipped(SkipReason::NoPhoneNumber);
        };
        if rent.moved_out_by(today) {
            return Eligibility::Skipped(SkipReason::MovedOut);
        }
        if !is_reminder_due(today, rent.rent_date, self.offset_days) {
            return Eligibility::Skipped(SkipReason::NotDue);
        }

        Eligibility::Due(ReminderCandidate {
            tenant,
            phone,
            rent_date: rent.rent_date,
        })
    }
}
