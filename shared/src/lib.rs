//! Shared types and domain rules for the Pharmaceutical Warehouse Management System
//!
//! This crate holds everything that must behave identically on the server and
//! in the browser (via WASM): order models, the transition tables, package
//! reconciliation, picking rules and entry-policy validation.

pub mod alerts;
pub mod error;
pub mod lifecycle;
pub mod models;
pub mod picking;
pub mod reconciliation;
pub mod types;
pub mod validation;

pub use alerts::*;
pub use error::*;
pub use lifecycle::*;
pub use models::*;
pub use picking::*;
pub use reconciliation::*;
pub use types::*;
pub use validation::*;
