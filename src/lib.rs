//! Snapshot-testing state engine.
//!
//! `snaprun` decides, for each assertion made during a test run, whether an
//! actual value matches a previously recorded reference value, manages the
//! introduction of new reference values, and persists an updated reference
//! file consistent with what the run actually exercised.
//!
//! ## Overview
//!
//! The host test framework drives one [`SnapshotSession`] per run through
//! its lifecycle hooks: [`start_test`](SnapshotSession::start_test) before
//! each test, [`compare`](SnapshotSession::compare) per assertion,
//! [`end_test`](SnapshotSession::end_test) after each test, and one
//! [`end_all_tests`](SnapshotSession::end_all_tests) at the end of the run.
//! Comparisons never write anything; new reference values are queued and
//! committed in observation order by that final call, which then persists
//! the snapshot file (or deletes it, when updating left nothing behind).
//!
//! ```no_run
//! use snaprun::{load, LoadOptions, SnapshotSession};
//!
//! # fn main() -> snaprun::SnapResult<()> {
//! let store = load(LoadOptions {
//!     file: "tests/math.rs".into(),
//!     fixed_location: None,
//!     project_dir: ".".into(),
//!     record_new_snapshots: true,
//!     updating: false,
//! })?;
//!
//! let mut session = SnapshotSession::new(false);
//! session.set_store(store);
//!
//! session.start_test("adds numbers")?;
//! let result = session.compare(&(2 + 2), None)?;
//! assert!(result.pass);
//! session.end_test("adds numbers")?;
//! session.end_all_tests()?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`session`] - Run-wide orchestration and count invariants
//! - [`store`] - Old/new recorded entries, comparison, persistence
//! - [`formatter`] - Canonical serialization of runtime values
//! - [`snapfile`] - On-disk key/value codec and file access
//! - [`paths`] - Snapshot directory and file resolution
//! - [`block`] - Entries, blocks, and the ordered title mapping
//! - [`errors`] - Error types for the engine

pub mod block;
pub mod errors;
pub mod formatter;
pub mod paths;
pub mod session;
pub mod snapfile;
pub mod store;

// Re-exports for convenient access to core types
pub use block::{Block, BlockMap, Entry};
pub use errors::{CountScope, Error, SnapResult};
pub use formatter::{DefaultFormatter, FormatterChain, SnapshotFormatter};
pub use paths::{determine_snapshot_dir, determine_snapshot_paths, SnapshotPaths};
pub use session::{CompareResult, SnapshotSession, TestTracker};
pub use store::{
    load, CompareOutcome, DeferredRecording, LoadOptions, SaveReport, SnapshotStore,
};
