//! Validation utilities for the Pharmaceutical Warehouse Management System
//!
//! Entry-policy and consistency checks that run before anything is written.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::hash::Hash;

use chrono::{Months, NaiveDate};
use uuid::Uuid;
use validator::Validate;

use crate::error::DomainError;
use crate::models::{InspectionEntry, OrderLine};

/// Maximum length of a batch code
pub const MAX_BATCH_CODE_LEN: usize = 64;

/// Values occurring more than once, in first-repeat order
pub fn find_duplicates<T: Eq + Hash + Copy>(items: impl IntoIterator<Item = T>) -> Vec<T> {
    let mut seen = HashSet::new();
    let mut reported = HashSet::new();
    let mut duplicates = Vec::new();

    for item in items {
        if !seen.insert(item) && reported.insert(item) {
            duplicates.push(item);
        }
    }

    duplicates
}

// ============================================================================
// Order Validations
// ============================================================================

/// Validate the lines of an import order
///
/// `minimums` carries the contract's minimum order quantity per medicine and
/// is `None` for internal orders.
pub fn validate_import_lines(
    lines: &[OrderLine],
    minimums: Option<&HashMap<Uuid, i32>>,
) -> Result<(), DomainError> {
    if lines.is_empty() {
        return Err(DomainError::validation(
            "details",
            "An order needs at least one line",
        ));
    }

    let duplicates = find_duplicates(lines.iter().map(|line| line.medicine_id));
    if !duplicates.is_empty() {
        let ids: Vec<String> = duplicates.iter().map(Uuid::to_string).collect();
        return Err(DomainError::validation(
            "details",
            format!("Duplicate medicine in order details: {}", ids.join(", ")),
        ));
    }

    for line in lines {
        if line.quantity <= 0 {
            return Err(DomainError::validation(
                "quantity",
                format!(
                    "Quantity for medicine {} must be positive",
                    line.medicine_id
                ),
            ));
        }

        if let Some(minimums) = minimums {
            let minimum = minimums.get(&line.medicine_id).ok_or_else(|| {
                DomainError::validation(
                    "medicine_id",
                    format!("Medicine {} is not part of the contract", line.medicine_id),
                )
            })?;

            if line.quantity < *minimum {
                return Err(DomainError::validation(
                    "quantity",
                    format!(
                        "Quantity {} for medicine {} is below the contract minimum order quantity {}",
                        line.quantity, line.medicine_id, minimum
                    ),
                ));
            }
        }
    }

    Ok(())
}

/// Validate the lines of an export order
pub fn validate_export_lines(lines: &[OrderLine]) -> Result<(), DomainError> {
    if lines.is_empty() {
        return Err(DomainError::validation(
            "details",
            "An order needs at least one line",
        ));
    }

    match lines.iter().find(|line| line.quantity <= 0) {
        Some(line) => Err(DomainError::validation(
            "expected_quantity",
            format!(
                "Expected quantity for medicine {} must be positive",
                line.medicine_id
            ),
        )),
        None => Ok(()),
    }
}

// ============================================================================
// Inspection Validations
// ============================================================================

/// Validate one pair of inspection quantities
pub fn validate_inspection_quantities(actual: i32, rejected: i32) -> Result<(), DomainError> {
    if actual < 0 {
        return Err(DomainError::validation(
            "actual_quantity",
            "Actual quantity cannot be negative",
        ));
    }

    if rejected < 0 {
        return Err(DomainError::validation(
            "rejected_quantity",
            "Rejected quantity cannot be negative",
        ));
    }

    if rejected > actual {
        return Err(DomainError::validation(
            "rejected_quantity",
            "Rejected quantity cannot exceed actual quantity",
        ));
    }

    Ok(())
}

/// Validate a whole inspection submission before any record is written
///
/// Duplicates are checked per import order; the error lists the offending
/// medicine ids.
pub fn validate_inspection_submission(entries: &[InspectionEntry]) -> Result<(), DomainError> {
    if entries.is_empty() {
        return Err(DomainError::validation(
            "inspections",
            "At least one inspection is required",
        ));
    }

    let mut by_order: BTreeMap<Uuid, Vec<Uuid>> = BTreeMap::new();
    for entry in entries {
        by_order
            .entry(entry.import_order_id)
            .or_default()
            .push(entry.medicine_id);
    }

    let duplicates: Vec<String> = by_order
        .values()
        .flat_map(|medicines| find_duplicates(medicines.iter().copied()))
        .map(|id| id.to_string())
        .collect();
    if !duplicates.is_empty() {
        return Err(DomainError::DuplicateInRequest(duplicates));
    }

    for entry in entries {
        entry.validate()?;
        validate_inspection_quantities(entry.actual_quantity, entry.rejected_quantity)?;
    }

    Ok(())
}

// ============================================================================
// Batch Validations
// ============================================================================

/// Validate a batch code
pub fn validate_batch_code(code: &str) -> Result<(), DomainError> {
    let trimmed = code.trim();
    if trimmed.is_empty() {
        return Err(DomainError::validation("batch_code", "Batch code is required"));
    }
    if trimmed.len() > MAX_BATCH_CODE_LEN {
        return Err(DomainError::validation(
            "batch_code",
            format!("Batch code must be at most {} characters", MAX_BATCH_CODE_LEN),
        ));
    }
    Ok(())
}

/// Storage invariant: a lot expires after it is produced
pub fn validate_batch_dates(production: NaiveDate, expiry: NaiveDate) -> Result<(), DomainError> {
    if expiry <= production {
        return Err(DomainError::validation(
            "expiry_date",
            "Expiry date must be after production date",
        ));
    }
    Ok(())
}

/// Entry policy for lots declared by warehouse staff
///
/// Production cannot be in the future and the lot must remain valid for at
/// least one year from `today`.
pub fn validate_batch_entry_policy(
    production: NaiveDate,
    expiry: NaiveDate,
    today: NaiveDate,
) -> Result<(), DomainError> {
    validate_batch_dates(production, expiry)?;

    if production > today {
        return Err(DomainError::validation(
            "production_date",
            "Production date cannot be in the future",
        ));
    }

    let one_year_out = today.checked_add_months(Months::new(12)).unwrap_or(today);
    if expiry < one_year_out {
        return Err(DomainError::validation(
            "expiry_date",
            "Expiry date must be at least one year from today",
        ));
    }

    Ok(())
}
