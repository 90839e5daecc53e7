//! Asset briefs and the asset QA gate.

pub mod brief_builder;
pub mod qa_gate;
