//! Business logic services for the Pharmaceutical Warehouse Management System

pub mod alert;
pub mod batch;
pub mod billing;
pub mod export_order;
pub mod import_order;
pub mod inspection;
pub mod package;
pub mod packaging;
pub mod user;

pub use alert::AlertService;
pub use batch::BatchService;
pub use export_order::ExportOrderService;
pub use import_order::ImportOrderService;
pub use inspection::InspectionService;
pub use package::PackageService;
pub use packaging::PackagingService;
pub use user::UserService;
