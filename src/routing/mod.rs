//! Route planning, venue quotes, fallback selection and quote caching

pub mod venues;
pub mod planner;
pub mod fallback;
pub mod cache;

pub use venues::*;
pub use planner::*;
pub use fallback::*;
pub use cache::*;
