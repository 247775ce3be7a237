//! Error types for the snapshot engine.
//!
//! One closed taxonomy covers every failure the engine can produce. All of
//! these are fatal: they propagate to the host framework as failures of the
//! run or of the specific test, with no internal retry.

use thiserror::Error;

/// Result type for snapshot operations.
pub type SnapResult<T> = Result<T, Error>;

/// Granularity of a snapshot count check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CountScope {
    /// The per-test check performed when a test ends.
    Test(String),
    /// The whole-run check performed when the run ends.
    Run,
}

impl std::fmt::Display for CountScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CountScope::Test(name) => write!(f, "test {:?}", name),
            CountScope::Run => write!(f, "the run"),
        }
    }
}

/// Errors that can occur while comparing, recording, or persisting
/// snapshots.
#[derive(Debug, Error)]
pub enum Error {
    /// The same test title was started twice in one run.
    #[error("test {name:?} already ran, you might be using the same name within two different nested tests")]
    DuplicateTestName { name: String },

    /// A test ended under a name that is not the currently tracked test.
    #[error("test {ended:?} ended but {}", current_label(.current))]
    TestIdentityMismatch {
        ended: String,
        current: Option<String>,
    },

    /// The number of comparisons differs from the number of known
    /// snapshots, for one test or for the whole run.
    #[error("snapshot count changed for {scope}: expected {expected} but got {actual} snapshots")]
    SnapshotCountMismatch {
        scope: CountScope,
        expected: usize,
        actual: usize,
    },

    /// The on-disk snapshot file could not be decoded.
    #[error("invalid snapshot file: {path}")]
    InvalidSnapshotFile { path: String },

    /// A recording referenced an index beyond the next free slot of its
    /// block. Indicates a logic error in caller ordering.
    #[error("cannot record snapshot {index} for {title:?}, exceeds expected index of {len}")]
    IndexOutOfRange {
        title: String,
        index: usize,
        len: usize,
    },

    /// A recording would overwrite an already-populated entry.
    #[error("cannot record snapshot {index} for {title:?}, already exists")]
    DuplicateWrite { title: String, index: usize },

    /// A comparison (or other store-requiring call) ran before the session
    /// was configured.
    #[error("snapshot store not set, did you forget to initialize the session?")]
    NotInitialized,

    /// The persistence layer failed for a reason other than a missing file.
    #[error("failed to access snapshot file {path}: {source}")]
    Fs {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// A value handed to a comparison could not be serialized.
    #[error("failed to serialize snapshot value: {message}")]
    Serialize { message: String },
}

fn current_label(current: &Option<String>) -> String {
    match current {
        Some(name) => format!("{:?} is the current test", name),
        None => "no test is current".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_count_mismatch_message_carries_scope() {
        let err = Error::SnapshotCountMismatch {
            scope: CountScope::Test("t1".to_string()),
            expected: 2,
            actual: 3,
        };
        assert_eq!(
            err.to_string(),
            "snapshot count changed for test \"t1\": expected 2 but got 3 snapshots"
        );

        let err = Error::SnapshotCountMismatch {
            scope: CountScope::Run,
            expected: 5,
            actual: 4,
        };
        assert_eq!(
            err.to_string(),
            "snapshot count changed for the run: expected 5 but got 4 snapshots"
        );
    }

    #[test]
    fn test_identity_mismatch_message_names_both_tests() {
        let err = Error::TestIdentityMismatch {
            ended: "b".to_string(),
            current: Some("a".to_string()),
        };
        assert_eq!(err.to_string(), "test \"b\" ended but \"a\" is the current test");

        let err = Error::TestIdentityMismatch {
            ended: "b".to_string(),
            current: None,
        };
        assert_eq!(err.to_string(), "test \"b\" ended but no test is current");
    }

    #[test]
    fn test_record_errors_name_the_block() {
        let err = Error::IndexOutOfRange {
            title: "adds numbers".to_string(),
            index: 3,
            len: 1,
        };
        assert_eq!(
            err.to_string(),
            "cannot record snapshot 3 for \"adds numbers\", exceeds expected index of 1"
        );

        let err = Error::DuplicateWrite {
            title: "adds numbers".to_string(),
            index: 0,
        };
        assert_eq!(
            err.to_string(),
            "cannot record snapshot 0 for \"adds numbers\", already exists"
        );
    }
}
