//! Session controller for one whole test run.
//!
//! One [`SnapshotSession`] is constructed per run and wired into the host
//! framework's lifecycle hooks: [`start_test`](SnapshotSession::start_test)
//! before each test, [`compare`](SnapshotSession::compare) per assertion,
//! [`end_test`](SnapshotSession::end_test) after each test, and one
//! [`end_all_tests`](SnapshotSession::end_all_tests) once the run is over.
//! The session owns the deferred-recording queue and both count invariants;
//! no ambient global is involved.

use std::collections::HashSet;

use serde::Serialize;

use crate::errors::{CountScope, Error, SnapResult};
use crate::formatter::SnapshotFormatter;
use crate::store::{DeferredRecording, SaveReport, SnapshotStore};

/// Per-test snapshot bookkeeping, created at test start and replaced by the
/// next test's tracker.
#[derive(Debug)]
pub struct TestTracker {
    name: String,
    /// Snapshots this test should compare: the prior block's length, plus
    /// one per reference introduced this run when the title is brand new.
    expected: usize,
    /// Comparisons actually made.
    actual: usize,
    /// Index assigned to the next comparison, in call order.
    next_index: usize,
    /// Whether the title had no prior block. Only such tests grow their
    /// expectation as references are introduced; an established test that
    /// starts producing extra snapshots is drift worth flagging.
    is_new: bool,
}

impl TestTracker {
    fn new(name: &str, expected: usize) -> Self {
        Self {
            name: name.to_string(),
            expected,
            actual: 0,
            next_index: 0,
            is_new: expected == 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn expected(&self) -> usize {
        self.expected
    }

    pub fn actual(&self) -> usize {
        self.actual
    }

    fn counts_match(&self) -> bool {
        self.actual == self.expected
    }
}

/// Result of a comparison as seen by the host framework. Any deferred
/// recording has already been queued by the session.
#[derive(Debug, Clone)]
pub struct CompareResult {
    pub pass: bool,
    /// Stored canonical data, when an entry existed to compare against.
    /// Supplied together with `expected` so callers can render a diff.
    pub actual: Option<String>,
    /// Canonical form of the incoming value, ditto.
    pub expected: Option<String>,
}

/// Orchestrates snapshot bookkeeping across every test of one run.
pub struct SnapshotSession {
    store: Option<SnapshotStore>,
    updating: bool,
    /// Sum of old block lengths, captured when the store is installed.
    starting_count: usize,
    /// Running total of comparisons across all tests.
    total_comparisons: usize,
    /// Recordings queued at comparison time, committed in this exact order
    /// by `end_all_tests`.
    deferred: Vec<DeferredRecording>,
    /// Titles already started, for duplicate detection.
    known_tests: HashSet<String>,
    current: Option<TestTracker>,
    /// Latched by the first invariant failure. A poisoned session abandons
    /// its queue and leaves the persisted file untouched.
    invariant_failed: bool,
    next_task_index: usize,
}

impl SnapshotSession {
    pub fn new(updating: bool) -> Self {
        Self {
            store: None,
            updating,
            starting_count: 0,
            total_comparisons: 0,
            deferred: Vec::new(),
            known_tests: HashSet::new(),
            current: None,
            invariant_failed: false,
            next_task_index: 0,
        }
    }

    /// Install the store for this run and capture its starting count.
    pub fn set_store(&mut self, store: SnapshotStore) {
        self.starting_count = store.starting_snapshot_count();
        self.store = Some(store);
    }

    pub fn is_updating(&self) -> bool {
        self.updating
    }

    pub fn store(&self) -> Option<&SnapshotStore> {
        self.store.as_ref()
    }

    /// The tracker of the test currently being compared, if any.
    pub fn current_test(&self) -> Option<&TestTracker> {
        self.current.as_ref()
    }

    /// Register a custom format handler on the underlying store.
    pub fn add_formatter(&mut self, formatter: Box<dyn SnapshotFormatter>) -> SnapResult<()> {
        let store = self.store.as_mut().ok_or(Error::NotInitialized)?;
        store.add_formatter(formatter);
        Ok(())
    }

    /// Begin tracking a test. Fails when `name` was already started this
    /// run, which usually means the same title is reused across nested
    /// tests.
    pub fn start_test(&mut self, name: &str) -> SnapResult<()> {
        let store = self.store.as_mut().ok_or(Error::NotInitialized)?;

        if self.known_tests.contains(name) {
            self.invariant_failed = true;
            return Err(Error::DuplicateTestName {
                name: name.to_string(),
            });
        }

        let task_index = self.next_task_index;
        self.next_task_index += 1;
        store.touch(name, task_index);

        let expected = store.old_block_len(name);
        self.known_tests.insert(name.to_string());
        self.current = Some(TestTracker::new(name, expected));
        Ok(())
    }

    /// Compare a value for the current test.
    ///
    /// Assigns the test's next snapshot index and queues any new reference
    /// value for recording at run end.
    pub fn compare<V: Serialize + ?Sized>(
        &mut self,
        value: &V,
        label: Option<&str>,
    ) -> SnapResult<CompareResult> {
        let store = self.store.as_ref().ok_or(Error::NotInitialized)?;
        let tracker = self.current.as_mut().ok_or(Error::NotInitialized)?;

        self.total_comparisons += 1;
        tracker.actual += 1;

        let index = tracker.next_index;
        tracker.next_index += 1;

        let outcome = store.compare(&tracker.name, index, value, label)?;

        if let Some(recording) = outcome.record {
            if tracker.is_new {
                tracker.expected += 1;
            }
            self.deferred.push(recording);
        }

        Ok(CompareResult {
            pass: outcome.pass,
            actual: outcome.actual,
            expected: outcome.expected,
        })
    }

    /// Finish tracking a test, verifying its identity and its snapshot
    /// count. The count check is waived while updating, where conditional
    /// snapshot calls are being corrected rather than rejected.
    pub fn end_test(&mut self, name: &str) -> SnapResult<()> {
        let current = match &self.current {
            Some(tracker) => tracker,
            None => {
                self.invariant_failed = true;
                return Err(Error::TestIdentityMismatch {
                    ended: name.to_string(),
                    current: None,
                });
            }
        };

        if current.name() != name {
            self.invariant_failed = true;
            return Err(Error::TestIdentityMismatch {
                ended: name.to_string(),
                current: Some(current.name().to_string()),
            });
        }

        if !current.counts_match() && !self.updating {
            let (expected, actual) = (current.expected(), current.actual());
            self.invariant_failed = true;
            return Err(Error::SnapshotCountMismatch {
                scope: CountScope::Test(name.to_string()),
                expected,
                actual,
            });
        }

        Ok(())
    }

    /// Commit the run: verify the run-level count, apply every queued
    /// recording in enqueue order, then persist.
    ///
    /// A session poisoned by an earlier invariant failure abandons its
    /// queue instead, leaving the persisted file exactly as it was.
    pub fn end_all_tests(&mut self) -> SnapResult<Option<SaveReport>> {
        let store = self.store.as_mut().ok_or(Error::NotInitialized)?;

        if self.invariant_failed {
            self.deferred.clear();
            return Ok(None);
        }

        // The coarse check: snapshots lost across test boundaries (a test
        // silently dropped by a filter, say) that no per-test check sees.
        let expected_total = self.starting_count + self.deferred.len();
        if expected_total != self.total_comparisons && !self.updating {
            self.invariant_failed = true;
            return Err(Error::SnapshotCountMismatch {
                scope: CountScope::Run,
                expected: expected_total,
                actual: self.total_comparisons,
            });
        }

        // Recordings reference positional indices within their blocks;
        // enqueue order is the only order that satisfies the append-only
        // invariant.
        for recording in self.deferred.drain(..) {
            store.apply(recording)?;
        }

        store.save()
    }
}
