//! # Artifacts - the hand-off contract between pipeline stages
//!
//! Every stage reads the latest artifact of its upstream, computes a new one
//! and writes it here. There is no other shared state.
//!
//! ```text
//! trends ─▶ research ─▶ competitors ─▶ scripts ─▶ reviews ─▶ asset_briefs
//!                                                               │
//!  metrics ◀─ receipts ◀─ packages ◀─ production/qa ◀─ renders ◀┴─ asset_qa
//! ```
//!
//! - [`envelope`]: the `{id, timestamp, status, source_ref, payload, meta}` wrapper
//! - [`models`]: typed payloads, each with its own invariants
//! - [`store`]: `latest.json` + immutable `history/<id>.json` per kind
//! - [`events`]: best-effort pub/sub mirror of every write
//! - [`bookkeeping`]: append-only idempotency files for the publish family
//! - [`schema`]: JSON Schemas exported by `skybeam schema <kind>`

pub mod bookkeeping;
pub mod envelope;
pub mod events;
pub mod models;
pub mod schema;
pub mod store;

pub use envelope::{
    Artifact, ArtifactKind, ArtifactMeta, ArtifactPayload, ArtifactStatus, SCHEMA_VERSION,
    SchemaError,
};
pub use events::{EventBus, StageEvent};
pub use store::{ArtifactStore, StoreError, Upstream};
