//! HTTP request handlers

pub mod alert;
pub mod batch;
pub mod export_order;
pub mod health;
pub mod import_order;
pub mod inspection;
pub mod package;
pub mod user;

pub use alert::*;
pub use batch::*;
pub use export_order::*;
pub use health::*;
pub use import_order::*;
pub use inspection::*;
pub use package::*;
pub use user::*;
