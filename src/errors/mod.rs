//! Error taxonomy and recovery decisions

pub mod autopay_error;
pub mod recovery;

pub use autopay_error::*;
pub use recovery::*;
