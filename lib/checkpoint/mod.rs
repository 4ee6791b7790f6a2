//! Durable sync checkpoint state.
//!
//! Owns the resumability rules: version attribution, idempotent batch
//! append, and commit gating. The store is synchronous; checkpoint writes
//! are tiny metadata updates next to segment downloads.

mod store;
mod types;

pub use store::CheckpointStore;
pub use types::{CheckpointError, SyncState};
