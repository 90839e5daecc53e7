//! Every SKYBEAM pipeline stage.
//!
//! Each stage module exposes a pure function over its upstream artifact(s)
//! and an async `run` that resolves upstreams from the store, computes and
//! writes one artifact, and returns a [`context::StageReport`].

pub mod assets;
pub mod config;
pub mod context;
pub mod production;
pub mod publish;
pub mod research;
pub mod scripts;
pub mod trends;
