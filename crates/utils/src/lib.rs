//! Shared plumbing for the SKYBEAM content factory.
//!
//! Nothing in here knows about artifact payloads; it only provides the
//! filesystem, hashing, locking and logging primitives every stage relies on.

pub mod assets;
pub mod fs;
pub mod hash;
pub mod ids;
pub mod lock;
pub mod logging;
