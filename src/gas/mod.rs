//! Gas sufficiency checking

pub mod checker;

pub use checker::*;
