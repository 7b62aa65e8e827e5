//! Domain models for the Pharmaceutical Warehouse Management System

mod batch;
mod inspection;
mod medicine;
mod order;
mod package;
mod user;

pub use batch::*;
pub use inspection::*;
pub use medicine::*;
pub use order::*;
pub use package::*;
pub use user::*;
