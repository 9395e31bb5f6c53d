//! Core data types and structures

pub mod chains;
pub mod route;
pub mod gas;
pub mod risk;
pub mod subscription;
pub mod execution;
pub mod api;

pub use chains::*;
pub use route::*;
pub use gas::*;
pub use risk::*;
pub use subscription::*;
pub use execution::*;
pub use api::*;
