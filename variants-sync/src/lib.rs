//! # variants-sync
//!
//! Per-unit synchronization engine.
//!
//! A [`UnitManager`] keeps one unit's version files and generated manifest in
//! step: discovery, hash-gated regeneration, rename inference in both
//! directions, the mutation commands, promotion and drift diffs.

pub mod diff;
pub mod discover;
pub mod error;
pub mod ops;
pub mod promote;
pub mod timing;
pub mod unit;
pub mod writer;

pub use diff::{diff_unit, ManifestDiff};
pub use error::{ErrorKind, SyncError};
pub use ops::Mutation;
pub use promote::PromoteReport;
pub use unit::{FileReconcile, KeyReconcile, UnitManager, UnitSummary};
pub use writer::{atomic_write, WriteResult};
