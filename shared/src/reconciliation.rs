//! Package reconciliation against inspection results
//!
//! Packaged totals per medicine must equal the inspected net quantity
//! (`actual - rejected`, summed) exactly. The check is pure so it can run on
//! the server inside the packaging transaction and in the browser before
//! submission.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DomainError;
use crate::models::Inspection;

/// Inspection quantities for one medicine line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InspectedQuantity {
    pub medicine_id: Uuid,
    pub actual_quantity: i32,
    pub rejected_quantity: i32,
}

impl From<&Inspection> for InspectedQuantity {
    fn from(inspection: &Inspection) -> Self {
        Self {
            medicine_id: inspection.medicine_id,
            actual_quantity: inspection.actual_quantity,
            rejected_quantity: inspection.rejected_quantity,
        }
    }
}

/// A proposed package row with its batch already resolved to a medicine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposedPackage {
    /// `None` when no batch was selected for the row
    pub medicine_id: Option<Uuid>,
    pub quantity: i64,
}

/// Largest quantity a package row may carry; matches the stored column
pub const MAX_PACKAGE_QUANTITY: i64 = i32::MAX as i64;

/// A single reconciliation finding
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Diagnostic {
    MissingBatch {
        row: usize,
    },
    NonPositiveQuantity {
        row: usize,
        quantity: i64,
    },
    /// Larger than a single package can hold (`i32::MAX`)
    QuantityTooLarge {
        row: usize,
        quantity: i64,
    },
    /// `delta` is packed minus inspected: positive is over, negative is under
    QuantityMismatch {
        medicine_id: Uuid,
        medicine_name: String,
        delta: i64,
    },
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Diagnostic::MissingBatch { row } => {
                write!(f, "Package row {} has no batch selected", row + 1)
            }
            Diagnostic::NonPositiveQuantity { row, quantity } => write!(
                f,
                "Package row {} has quantity {}, which must be positive",
                row + 1,
                quantity
            ),
            Diagnostic::QuantityTooLarge { row, quantity } => write!(
                f,
                "Package row {} has quantity {}, which exceeds the limit of {}",
                row + 1,
                quantity,
                MAX_PACKAGE_QUANTITY
            ),
            Diagnostic::QuantityMismatch {
                medicine_name,
                delta,
                ..
            } => {
                let direction = if *delta > 0 { "over" } else { "under" };
                write!(f, "{} is {} unit {}", medicine_name, delta.abs(), direction)
            }
        }
    }
}

pub(crate) fn format_diagnostics(diagnostics: &[Diagnostic]) -> String {
    diagnostics
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Outcome of a reconciliation run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationReport {
    pub valid: bool,
    pub net_by_medicine: BTreeMap<Uuid, i64>,
    pub packed_by_medicine: BTreeMap<Uuid, i64>,
    pub diagnostics: Vec<Diagnostic>,
}

impl ReconciliationReport {
    pub fn into_result(self) -> Result<(), DomainError> {
        if self.valid {
            Ok(())
        } else {
            Err(DomainError::Reconciliation(self.diagnostics))
        }
    }
}

/// Compare proposed packages against inspection results
///
/// Medicines whose whole delivery was rejected (net zero) need no package.
/// `names` maps medicine ids to display names for diagnostics; unknown ids
/// fall back to the id itself.
pub fn reconcile(
    inspections: &[InspectedQuantity],
    packages: &[ProposedPackage],
    names: &HashMap<Uuid, String>,
) -> ReconciliationReport {
    let mut net_by_medicine: BTreeMap<Uuid, i64> = BTreeMap::new();
    for inspection in inspections {
        let net = i64::from(inspection.actual_quantity) - i64::from(inspection.rejected_quantity);
        let total = net_by_medicine.entry(inspection.medicine_id).or_default();
        *total = total.saturating_add(net);
    }
    net_by_medicine.retain(|_, net| *net != 0);

    let mut diagnostics = Vec::new();
    let mut packed_by_medicine: BTreeMap<Uuid, i64> = BTreeMap::new();

    for (row, package) in packages.iter().enumerate() {
        let Some(medicine_id) = package.medicine_id else {
            diagnostics.push(Diagnostic::MissingBatch { row });
            continue;
        };

        if package.quantity <= 0 {
            diagnostics.push(Diagnostic::NonPositiveQuantity {
                row,
                quantity: package.quantity,
            });
            continue;
        }

        if package.quantity > MAX_PACKAGE_QUANTITY {
            diagnostics.push(Diagnostic::QuantityTooLarge {
                row,
                quantity: package.quantity,
            });
            continue;
        }

        let total = packed_by_medicine.entry(medicine_id).or_default();
        *total = total.saturating_add(package.quantity);
    }

    let medicines: BTreeSet<Uuid> = net_by_medicine
        .keys()
        .chain(packed_by_medicine.keys())
        .copied()
        .collect();

    for medicine_id in medicines {
        let net = net_by_medicine.get(&medicine_id).copied().unwrap_or(0);
        let packed = packed_by_medicine.get(&medicine_id).copied().unwrap_or(0);
        let delta = packed.saturating_sub(net);

        if delta != 0 {
            let medicine_name = names
                .get(&medicine_id)
                .cloned()
                .unwrap_or_else(|| medicine_id.to_string());
            diagnostics.push(Diagnostic::QuantityMismatch {
                medicine_id,
                medicine_name,
                delta,
            });
        }
    }

    ReconciliationReport {
        valid: diagnostics.is_empty(),
        net_by_medicine,
        packed_by_medicine,
        diagnostics,
    }
}
