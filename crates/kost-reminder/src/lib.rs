//! Billing reminder notifier for boarding-house tenants.
//!
//! Reads the tenant/rent ledger once a day, works out which tenants are due a
//! reminder and relays the message through a paired chat channel.

pub mod config;
pub mod error;
pub mod telemetry;
pub mod workflows;
