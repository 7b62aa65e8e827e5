//! Tests for outbound picking: outstanding need, pick validation and completion

use chrono::NaiveDate;
use proptest::prelude::*;
use shared::{
    compute_outstanding, ensure_fully_picked, validate_pick, DomainError, ExportLineProgress,
    StockPackage,
};
use uuid::Uuid;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn today() -> NaiveDate {
    date(2026, 10, 19)
}

fn line(medicine_id: Uuid, expected: i32, picked: i64) -> ExportLineProgress {
    ExportLineProgress {
        detail_id: Uuid::new_v4(),
        medicine_id,
        expected_quantity: expected,
        picked,
    }
}

fn stock(medicine_id: Uuid, on_hand: i32, expiry: NaiveDate) -> StockPackage {
    StockPackage {
        package_id: Uuid::new_v4(),
        batch_id: Uuid::new_v4(),
        batch_code: format!("LOT-{}", on_hand),
        medicine_id,
        on_hand,
        expiry_date: expiry,
        location_id: Some(Uuid::new_v4()),
    }
}

// =============================================================================
// Outstanding need
// =============================================================================

mod outstanding {
    use super::*;

    #[test]
    fn satisfied_lines_are_omitted() {
        let m1 = Uuid::new_v4();
        let lines = [line(m1, 10, 10), line(m1, 10, 4)];
        let result = compute_outstanding(&lines, &[], today());

        assert_eq!(result.len(), 1);
        assert_eq!(result[0].detail_id, lines[1].detail_id);
        assert_eq!(result[0].needed_quantity, 6);
        assert!(result[0].packages.is_empty());
    }

    #[test]
    fn candidates_are_earliest_expiry_first_and_skip_expired() {
        let m1 = Uuid::new_v4();
        let m2 = Uuid::new_v4();
        let late = stock(m1, 50, date(2028, 1, 1));
        let early = stock(m1, 3, date(2027, 3, 1));
        let expired = stock(m1, 40, date(2026, 10, 19));
        let other_medicine = stock(m2, 40, date(2027, 1, 1));
        let empty = stock(m1, 0, date(2027, 1, 1));

        let result = compute_outstanding(
            &[line(m1, 8, 0)],
            &[late.clone(), expired, other_medicine, empty, early.clone()],
            today(),
        );

        let suggested: Vec<Uuid> = result[0].packages.iter().map(|p| p.package_id).collect();
        assert_eq!(suggested, vec![early.package_id, late.package_id]);
        assert_eq!(result[0].packages[0].take_quantity, 3);
        assert_eq!(result[0].packages[1].take_quantity, 8);
    }

    #[test]
    fn same_expiry_prefers_larger_stock() {
        let m1 = Uuid::new_v4();
        let small = stock(m1, 5, date(2027, 6, 1));
        let large = stock(m1, 20, date(2027, 6, 1));

        let result = compute_outstanding(&[line(m1, 10, 0)], &[small.clone(), large.clone()], today());
        assert_eq!(result[0].packages[0].package_id, large.package_id);
        assert_eq!(result[0].packages[1].package_id, small.package_id);
    }
}

// =============================================================================
// Pick validation
// =============================================================================

mod picks {
    use super::*;

    fn field_of(err: DomainError) -> String {
        match err {
            DomainError::Validation { field, .. } => field,
            other => panic!("expected a validation error, got {:?}", other),
        }
    }

    #[test]
    fn valid_pick_is_accepted() {
        let m1 = Uuid::new_v4();
        let package = stock(m1, 10, date(2027, 6, 1));
        let result = validate_pick(&line(m1, 6, 0), &package, package.package_id, 6, today());
        assert!(result.is_ok());
    }

    #[test]
    fn scanned_id_must_match_package() {
        let m1 = Uuid::new_v4();
        let package = stock(m1, 10, date(2027, 6, 1));
        let err = validate_pick(&line(m1, 6, 0), &package, Uuid::new_v4(), 1, today())
            .unwrap_err();
        assert_eq!(field_of(err), "package_id");
    }

    #[test]
    fn wrong_medicine_or_expired_package_is_refused() {
        let m1 = Uuid::new_v4();
        let other = stock(Uuid::new_v4(), 10, date(2027, 6, 1));
        assert!(validate_pick(&line(m1, 6, 0), &other, other.package_id, 1, today()).is_err());

        let expired = stock(m1, 10, date(2026, 10, 1));
        assert!(validate_pick(&line(m1, 6, 0), &expired, expired.package_id, 1, today()).is_err());
    }

    #[test]
    fn quantity_is_capped_by_stock_and_need() {
        let m1 = Uuid::new_v4();
        let package = stock(m1, 4, date(2027, 6, 1));

        let scanned = package.package_id;
        let err = validate_pick(&line(m1, 10, 0), &package, scanned, 5, today()).unwrap_err();
        assert_eq!(field_of(err), "quantity");

        let plenty = stock(m1, 50, date(2027, 6, 1));
        let err = validate_pick(&line(m1, 10, 8), &plenty, plenty.package_id, 3, today())
            .unwrap_err();
        assert_eq!(field_of(err), "quantity");

        assert!(validate_pick(&line(m1, 10, 0), &package, scanned, 0, today()).is_err());
    }

    #[test]
    fn package_still_being_received_is_refused() {
        let m1 = Uuid::new_v4();
        let mut package = stock(m1, 10, date(2027, 6, 1));
        package.location_id = None;

        let err = validate_pick(&line(m1, 6, 0), &package, package.package_id, 1, today())
            .unwrap_err();
        assert_eq!(field_of(err), "package_id");
        assert!(compute_outstanding(&[line(m1, 6, 0)], &[package], today())[0]
            .packages
            .is_empty());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// A pick is accepted exactly when 0 < quantity <= min(on_hand, needed)
        #[test]
        fn pick_bound_is_min_of_stock_and_need(
            on_hand in 0i32..200,
            expected in 1i32..200,
            picked in 0i64..200,
            quantity in -5i32..250,
        ) {
            let m1 = Uuid::new_v4();
            let progress = line(m1, expected, picked);
            let package = stock(m1, on_hand, date(2027, 6, 1));
            let allowed = i64::from(on_hand).min(progress.needed());

            let accepted = validate_pick(&progress, &package, package.package_id, quantity, today()).is_ok();
            prop_assert_eq!(accepted, quantity > 0 && i64::from(quantity) <= allowed);
        }
    }
}

// =============================================================================
// Completion
// =============================================================================

mod completion {
    use super::*;

    #[test]
    fn completion_requires_every_line_exactly_picked() {
        let m1 = Uuid::new_v4();
        assert!(ensure_fully_picked(&[line(m1, 5, 5), line(m1, 2, 2)]).is_ok());
        assert!(matches!(
            ensure_fully_picked(&[line(m1, 5, 5), line(m1, 2, 1)]),
            Err(DomainError::InvalidState(_))
        ));
    }
}
