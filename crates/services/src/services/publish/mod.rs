//! Publish family: packaging, per-platform publishing and metrics.
//!
//! The packager and every publisher share `locks/publish.lock` and the
//! append-only files under `state/`. Metrics only reads them.

pub mod captions;
pub mod connectors;
pub mod credentials;
pub mod metrics;
pub mod packager;
pub mod publisher;
