//! Outbound picking: outstanding need per export line and pick validation

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DomainError;

/// Progress of one export order line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportLineProgress {
    pub detail_id: Uuid,
    pub medicine_id: Uuid,
    pub expected_quantity: i32,
    /// Sum of quantities already recorded against the line
    pub picked: i64,
}

impl ExportLineProgress {
    /// Units still to pick, never negative
    pub fn needed(&self) -> i64 {
        (i64::from(self.expected_quantity) - self.picked).max(0)
    }

    pub fn is_satisfied(&self) -> bool {
        self.picked == i64::from(self.expected_quantity)
    }
}

/// A package holding stock that could be picked
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockPackage {
    pub package_id: Uuid,
    pub batch_id: Uuid,
    pub batch_code: String,
    pub medicine_id: Uuid,
    pub on_hand: i32,
    pub expiry_date: NaiveDate,
    pub location_id: Option<Uuid>,
}

impl StockPackage {
    pub fn is_expired(&self, today: NaiveDate) -> bool {
        self.expiry_date <= today
    }

    /// Put away on a shelf; unlocated packages are still being received
    pub fn is_shelved(&self) -> bool {
        self.location_id.is_some()
    }

    /// Holds unexpired, shelved stock of `medicine_id`
    pub fn is_eligible_for(&self, medicine_id: Uuid, today: NaiveDate) -> bool {
        self.medicine_id == medicine_id
            && self.on_hand > 0
            && self.is_shelved()
            && !self.is_expired(today)
    }
}

/// A recommended package for an outstanding line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageSuggestion {
    pub package_id: Uuid,
    pub batch_code: String,
    pub expiry_date: NaiveDate,
    pub location_id: Option<Uuid>,
    pub on_hand: i32,
    pub take_quantity: i64,
}

/// Remaining need of one export line with candidate packages
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutstandingLine {
    pub detail_id: Uuid,
    pub medicine_id: Uuid,
    pub needed_quantity: i64,
    pub packages: Vec<PackageSuggestion>,
}

/// Compute what is still to be picked for every unsatisfied line
///
/// Candidates are ordered earliest expiry first, then by larger stock.
/// Each candidate's `take_quantity` is `min(on_hand, needed)`.
pub fn compute_outstanding(
    lines: &[ExportLineProgress],
    stock: &[StockPackage],
    today: NaiveDate,
) -> Vec<OutstandingLine> {
    lines
        .iter()
        .filter(|line| line.needed() > 0)
        .map(|line| {
            let needed = line.needed();
            let mut candidates: Vec<&StockPackage> = stock
                .iter()
                .filter(|package| package.is_eligible_for(line.medicine_id, today))
                .collect();
            candidates.sort_by(|a, b| {
                a.expiry_date
                    .cmp(&b.expiry_date)
                    .then_with(|| b.on_hand.cmp(&a.on_hand))
            });

            OutstandingLine {
                detail_id: line.detail_id,
                medicine_id: line.medicine_id,
                needed_quantity: needed,
                packages: candidates
                    .into_iter()
                    .map(|package| PackageSuggestion {
                        package_id: package.package_id,
                        batch_code: package.batch_code.clone(),
                        expiry_date: package.expiry_date,
                        location_id: package.location_id,
                        on_hand: package.on_hand,
                        take_quantity: i64::from(package.on_hand).min(needed),
                    })
                    .collect(),
            }
        })
        .collect()
}

/// Validate a pick of `quantity` units from `package` for `line`
///
/// `scanned_package_id` is the identifier the operator scanned or typed and
/// must match the package being picked.
pub fn validate_pick(
    line: &ExportLineProgress,
    package: &StockPackage,
    scanned_package_id: Uuid,
    quantity: i32,
    today: NaiveDate,
) -> Result<(), DomainError> {
    if scanned_package_id != package.package_id {
        return Err(DomainError::validation(
            "package_id",
            format!(
                "Scanned package {} does not match package {}",
                scanned_package_id, package.package_id
            ),
        ));
    }

    if !package.is_shelved() {
        return Err(DomainError::validation(
            "package_id",
            format!("Package {} has not been put away yet", package.package_id),
        ));
    }

    if package.medicine_id != line.medicine_id {
        return Err(DomainError::validation(
            "package_id",
            format!(
                "Package {} does not hold the medicine of this order line",
                package.package_id
            ),
        ));
    }

    if package.is_expired(today) {
        return Err(DomainError::validation(
            "package_id",
            format!(
                "Package {} expired on {}",
                package.package_id, package.expiry_date
            ),
        ));
    }

    if quantity <= 0 {
        return Err(DomainError::validation(
            "quantity",
            "Pick quantity must be positive",
        ));
    }

    let allowed = i64::from(package.on_hand).min(line.needed());
    if i64::from(quantity) > allowed {
        return Err(DomainError::validation(
            "quantity",
            format!(
                "Pick quantity {} exceeds the allowed {} (on hand {}, still needed {})",
                quantity,
                allowed,
                package.on_hand,
                line.needed()
            ),
        ));
    }

    Ok(())
}

/// Finishing an export order requires every line to be picked exactly
pub fn ensure_fully_picked(lines: &[ExportLineProgress]) -> Result<(), DomainError> {
    let open: Vec<String> = lines
        .iter()
        .filter(|line| !line.is_satisfied())
        .map(|line| format!("{} ({} of {})", line.detail_id, line.picked, line.expected_quantity))
        .collect();

    if open.is_empty() {
        Ok(())
    } else {
        Err(DomainError::InvalidState(format!(
            "Export order still has outstanding lines: {}",
            open.join(", ")
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn stock(medicine_id: Uuid, on_hand: i32, expiry: NaiveDate) -> StockPackage {
        StockPackage {
            package_id: Uuid::new_v4(),
            batch_id: Uuid::new_v4(),
            batch_code: "LOT-1".to_string(),
            medicine_id,
            on_hand,
            expiry_date: expiry,
            location_id: Some(Uuid::new_v4()),
        }
    }

    fn line(medicine_id: Uuid, expected: i32, picked: i64) -> ExportLineProgress {
        ExportLineProgress {
            detail_id: Uuid::new_v4(),
            medicine_id,
            expected_quantity: expected,
            picked,
        }
    }

    #[test]
    fn test_outstanding_skips_expired_and_foreign_stock() {
        let today = date(2026, 1, 10);
        let m1 = Uuid::new_v4();
        let good = stock(m1, 40, date(2027, 1, 1));
        let expired = stock(m1, 100, date(2026, 1, 1));
        let other = stock(Uuid::new_v4(), 100, date(2027, 1, 1));

        let outstanding =
            compute_outstanding(&[line(m1, 30, 10)], &[good.clone(), expired, other], today);

        assert_eq!(outstanding.len(), 1);
        assert_eq!(outstanding[0].needed_quantity, 20);
        assert_eq!(outstanding[0].packages.len(), 1);
        assert_eq!(outstanding[0].packages[0].package_id, good.package_id);
        assert_eq!(outstanding[0].packages[0].take_quantity, 20);
    }

    #[test]
    fn test_outstanding_orders_earliest_expiry_first() {
        let today = date(2026, 1, 10);
        let m1 = Uuid::new_v4();
        let late = stock(m1, 5, date(2028, 1, 1));
        let early = stock(m1, 5, date(2027, 1, 1));

        let outstanding = compute_outstanding(&[line(m1, 8, 0)], &[late, early.clone()], today);
        assert_eq!(outstanding[0].packages[0].package_id, early.package_id);
        assert_eq!(outstanding[0].packages[0].take_quantity, 5);
    }

    #[test]
    fn test_satisfied_lines_are_not_outstanding() {
        let m1 = Uuid::new_v4();
        let outstanding = compute_outstanding(&[line(m1, 8, 8)], &[], date(2026, 1, 1));
        assert!(outstanding.is_empty());
    }

    #[test]
    fn test_pick_cannot_exceed_need_or_stock() {
        let today = date(2026, 1, 10);
        let m1 = Uuid::new_v4();
        let package = stock(m1, 6, date(2027, 1, 1));
        let order_line = line(m1, 10, 0);

        let scanned = package.package_id;
        assert!(validate_pick(&order_line, &package, scanned, 6, today).is_ok());
        assert!(validate_pick(&order_line, &package, scanned, 7, today).is_err());

        let nearly_done = line(m1, 10, 8);
        assert!(validate_pick(&nearly_done, &package, scanned, 3, today).is_err());
        assert!(validate_pick(&nearly_done, &package, scanned, 2, today).is_ok());
    }

    #[test]
    fn test_pick_requires_matching_scan() {
        let today = date(2026, 1, 10);
        let m1 = Uuid::new_v4();
        let package = stock(m1, 6, date(2027, 1, 1));
        let err = validate_pick(&line(m1, 10, 0), &package, Uuid::new_v4(), 1, today)
            .unwrap_err();
        assert!(err.to_string().starts_with("Scanned package"));
    }

    #[test]
    fn test_unshelved_stock_is_not_offered_or_picked() {
        let today = date(2026, 1, 10);
        let m1 = Uuid::new_v4();
        let mut receiving = stock(m1, 6, date(2027, 1, 1));
        receiving.location_id = None;

        assert!(compute_outstanding(&[line(m1, 4, 0)], &[receiving.clone()], today)[0]
            .packages
            .is_empty());
        let err = validate_pick(&line(m1, 4, 0), &receiving, receiving.package_id, 1, today)
            .unwrap_err();
        assert!(err.to_string().contains("has not been put away"));
    }

    #[test]
    fn test_finish_blocked_while_need_remains() {
        let m1 = Uuid::new_v4();
        assert!(ensure_fully_picked(&[line(m1, 10, 10)]).is_ok());
        assert!(ensure_fully_picked(&[line(m1, 10, 10), line(m1, 5, 4)]).is_err());
    }
}
