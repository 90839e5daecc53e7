//! Script generation and review.

pub mod generator;
pub mod reviewer;
pub mod templates;
