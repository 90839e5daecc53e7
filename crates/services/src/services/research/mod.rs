//! Research & differentiation stages.
//!
//! - [`deep_research`]: trend snapshot -> research briefs
//! - [`competitor`]: research briefs -> competitor analysis

pub mod competitor;
pub mod deep_research;
