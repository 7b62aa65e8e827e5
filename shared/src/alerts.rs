//! Alert predicates evaluated by the periodic warehouse checks

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};

/// Shelf-life state of a batch relative to a warning window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpiryState {
    Expired,
    Expiring,
    Ok,
}

pub fn expiry_state(expiry: NaiveDate, today: NaiveDate, window_days: u32) -> ExpiryState {
    if expiry <= today {
        ExpiryState::Expired
    } else if expiry <= add_days(today, window_days) {
        ExpiryState::Expiring
    } else {
        ExpiryState::Ok
    }
}

pub fn is_low_stock(on_hand: i64, minimum_stock: i32) -> bool {
    on_hand < i64::from(minimum_stock)
}

/// Whether an unpaid bill falls due within the window (overdue bills included)
pub fn is_bill_due(due_date: NaiveDate, today: NaiveDate, window_days: u32) -> bool {
    due_date <= add_days(today, window_days)
}

/// Due date of a bill raised on `issued_on` with the given payment term
pub fn bill_due_date(issued_on: NaiveDate, payment_term_days: u32) -> NaiveDate {
    add_days(issued_on, payment_term_days)
}

fn add_days(date: NaiveDate, days: u32) -> NaiveDate {
    date.checked_add_days(Days::new(u64::from(days)))
        .unwrap_or(NaiveDate::MAX)
}
