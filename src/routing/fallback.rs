//! Fallback route selection

use std::collections::HashSet;
use crate::types::FallbackRoute;

/// The untried alternative with the highest expected output. Earlier entries
/// win ties, so a pre-sorted list keeps its ranking.
pub fn select_fallback<'a>(fallbacks: &'a [FallbackRoute], tried: &HashSet<String>) -> Option<&'a FallbackRoute> {
    fallbacks
        .iter()
        .filter(|f| !tried.contains(&f.via))
        .fold(None, |best: Option<&FallbackRoute>, candidate| match best {
            Some(b) if b.expected_output >= candidate.expected_output => Some(b),
            _ => Some(candidate),
        })
}
