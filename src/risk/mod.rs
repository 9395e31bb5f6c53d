//! Transfer risk screening

pub mod rules;
pub mod scanner;

pub use rules::*;
pub use scanner::*;
