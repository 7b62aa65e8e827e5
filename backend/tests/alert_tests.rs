//! Tests for the warehouse alert predicates

use chrono::NaiveDate;
use proptest::prelude::*;
use shared::{bill_due_date, expiry_state, is_bill_due, is_low_stock, ExpiryState};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[test]
fn expiry_window_boundaries() {
    let today = date(2026, 10, 19);
    assert_eq!(expiry_state(date(2026, 10, 18), today, 30), ExpiryState::Expired);
    assert_eq!(expiry_state(date(2026, 10, 20), today, 30), ExpiryState::Expiring);
    assert_eq!(expiry_state(date(2026, 11, 18), today, 30), ExpiryState::Expiring);
    assert_eq!(expiry_state(date(2026, 11, 19), today, 30), ExpiryState::Ok);
}

#[test]
fn stock_at_minimum_is_not_low() {
    assert!(is_low_stock(0, 1));
    assert!(!is_low_stock(10, 10));
    assert!(!is_low_stock(0, 0));
}

#[test]
fn bill_due_date_crosses_year_end() {
    assert_eq!(bill_due_date(date(2026, 12, 15), 30), date(2027, 1, 14));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// A bill issued today is due in the window iff its term fits in the window
    #[test]
    fn fresh_bill_due_iff_term_within_window(term in 0u32..120, window in 0u32..120) {
        let today = date(2026, 10, 19);
        let due = bill_due_date(today, term);
        prop_assert_eq!(is_bill_due(due, today, window), term <= window);
    }

    /// Nothing expiring today or earlier is ever reported as fine
    #[test]
    fn past_expiry_is_always_expired(days_ago in 0u64..3650, window in 0u32..365) {
        let today = date(2026, 10, 19);
        let expiry = today - chrono::Days::new(days_ago);
        prop_assert_eq!(expiry_state(expiry, today, window), ExpiryState::Expired);
    }
}
