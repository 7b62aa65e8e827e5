//! WebAssembly module for the Pharmaceutical Warehouse Management System
//!
//! Exposes the shared order rules to the browser so screens ask the same
//! authoritative code the server runs:
//! - Import/export transition legality
//! - Package reconciliation before submitting the packaging step
//! - Outstanding need and package suggestions for picking
//!
//! Structured arguments and results cross the boundary as JSON strings.

use chrono::NaiveDate;
use serde::Serialize;
use wasm_bindgen::prelude::*;

use shared::{
    compute_outstanding, reconcile, validate_inspection_quantities, ExportLineProgress,
    ExportOrderStatus, ImportOrderStatus, InspectedQuantity, ProposedPackage, StockPackage,
};
use std::collections::HashMap;
use uuid::Uuid;

/// Initialize the WASM module
#[wasm_bindgen(start)]
pub fn init() {
    web_sys::console::debug_1(&JsValue::from_str("pharma-warehouse-wasm loaded"));
}

fn js_error(context: &str, err: impl std::fmt::Display) -> JsValue {
    js_sys::Error::new(&format!("{}: {}", context, err)).into()
}

fn to_json<T: Serialize>(value: &T) -> Result<String, JsValue> {
    serde_json::to_string(value).map_err(|e| js_error("Serialization failed", e))
}

fn parse_import_status(status: &str) -> Result<ImportOrderStatus, JsValue> {
    status
        .parse::<ImportOrderStatus>()
        .map_err(|e| js_error("Invalid status", e))
}

/// Statuses an import order may move to, as a JSON array of strings
#[wasm_bindgen]
pub fn allowed_import_transitions(current: &str) -> Result<String, JsValue> {
    let current = parse_import_status(current)?;
    let next: Vec<&str> = current
        .allowed_transitions()
        .iter()
        .map(ImportOrderStatus::as_str)
        .collect();
    to_json(&next)
}

#[wasm_bindgen]
pub fn is_valid_import_transition(current: &str, requested: &str) -> Result<bool, JsValue> {
    Ok(parse_import_status(current)?.can_transition_to(parse_import_status(requested)?))
}

#[wasm_bindgen]
pub fn is_valid_export_transition(
    current: &str,
    requested: &str,
    is_internal: bool,
) -> Result<bool, JsValue> {
    let current = current
        .parse::<ExportOrderStatus>()
        .map_err(|e| js_error("Invalid status", e))?;
    let requested = requested
        .parse::<ExportOrderStatus>()
        .map_err(|e| js_error("Invalid status", e))?;
    Ok(current.can_transition_to(requested, is_internal))
}

/// Error message for an inspection entry, or `undefined` when it is acceptable
#[wasm_bindgen]
pub fn check_inspection_quantities(actual: i32, rejected: i32) -> Option<String> {
    validate_inspection_quantities(actual, rejected)
        .err()
        .map(|e| e.to_string())
}

/// Run package reconciliation
///
/// `names_json` is an optional object mapping medicine ids to display names.
/// Returns the full report as JSON.
#[wasm_bindgen]
pub fn reconcile_packages(
    inspections_json: &str,
    packages_json: &str,
    names_json: Option<String>,
) -> Result<String, JsValue> {
    let inspections: Vec<InspectedQuantity> = serde_json::from_str(inspections_json)
        .map_err(|e| js_error("Invalid inspections JSON", e))?;
    let packages: Vec<ProposedPackage> = serde_json::from_str(packages_json)
        .map_err(|e| js_error("Invalid packages JSON", e))?;
    let names: HashMap<Uuid, String> = match names_json {
        Some(json) => {
            serde_json::from_str(&json).map_err(|e| js_error("Invalid names JSON", e))?
        }
        None => HashMap::new(),
    };

    let report = reconcile(&inspections, &packages, &names);
    #[cfg(target_arch = "wasm32")]
    if !report.valid {
        web_sys::console::warn_1(&JsValue::from_str(&format!(
            "Reconciliation failed with {} finding(s)",
            report.diagnostics.len()
        )));
    }
    to_json(&report)
}

/// Outstanding lines with package suggestions; `today` is `YYYY-MM-DD`
#[wasm_bindgen]
pub fn outstanding_lines(lines_json: &str, stock_json: &str, today: &str) -> Result<String, JsValue> {
    let lines: Vec<ExportLineProgress> =
        serde_json::from_str(lines_json).map_err(|e| js_error("Invalid lines JSON", e))?;
    let stock: Vec<StockPackage> =
        serde_json::from_str(stock_json).map_err(|e| js_error("Invalid stock JSON", e))?;
    let today = NaiveDate::parse_from_str(today, "%Y-%m-%d")
        .map_err(|e| js_error("Invalid date", e))?;

    to_json(&compute_outstanding(&lines, &stock, today))
}

/// Today's date as seen by the browser, in `YYYY-MM-DD`
#[wasm_bindgen]
pub fn browser_today() -> String {
    let now = js_sys::Date::new_0();
    format!(
        "{:04}-{:02}-{:02}",
        now.get_full_year(),
        now.get_month() + 1,
        now.get_date()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allowed_transitions_from_delivered() {
        let json = allowed_import_transitions("delivered").unwrap();
        let next: Vec<String> = serde_json::from_str(&json).unwrap();
        assert_eq!(next, vec!["approved", "checked", "cancelled"]);
    }

    #[test]
    fn test_transition_legality() {
        assert!(is_valid_import_transition("arranged", "completed").unwrap());
        assert!(!is_valid_import_transition("approved", "checked").unwrap());
        assert!(is_valid_export_transition("approved", "completed", true).unwrap());
        assert!(!is_valid_export_transition("approved", "completed", false).unwrap());
    }

    #[test]
    fn test_inspection_quantities() {
        assert_eq!(check_inspection_quantities(10, 2), None);
        assert_eq!(
            check_inspection_quantities(8, 10).as_deref(),
            Some("Rejected quantity cannot exceed actual quantity")
        );
    }

    #[test]
    fn test_reconcile_packages_reports_under() {
        let m1 = Uuid::new_v4();
        let inspections = serde_json::json!([
            { "medicine_id": m1, "actual_quantity": 20, "rejected_quantity": 0 }
        ]);
        let packages = serde_json::json!([{ "medicine_id": m1, "quantity": 15 }]);
        let names = serde_json::json!({ (m1.to_string()): "M1" });

        let json = reconcile_packages(
            &inspections.to_string(),
            &packages.to_string(),
            Some(names.to_string()),
        )
        .unwrap();
        let report: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(report["valid"], false);
        assert_eq!(report["diagnostics"][0]["kind"], "quantity_mismatch");
        assert_eq!(report["diagnostics"][0]["delta"], -5);
    }

    #[test]
    fn test_outstanding_lines() {
        let m1 = Uuid::new_v4();
        let lines = serde_json::json!([{
            "detail_id": Uuid::new_v4(),
            "medicine_id": m1,
            "expected_quantity": 5,
            "picked": 2
        }]);

        let json = outstanding_lines(&lines.to_string(), "[]", "2026-10-19").unwrap();
        let result: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(result[0]["needed_quantity"], 3);
    }
}
