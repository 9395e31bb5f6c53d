//! Tool call envelope, manifest and text rendering

pub mod render;
pub mod router;

pub use router::*;
