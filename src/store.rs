//! The snapshot store: old and new recorded entries for one run.
//!
//! A store owns two title-to-block mappings. The "old" mapping holds
//! whatever the prior run persisted and is the read-only source of truth
//! for counts and historical content. The "new" mapping is what this run
//! builds: in updating mode it starts empty and is rebuilt entirely from
//! what the run observes, otherwise it starts from the prior content so
//! comparisons read straight through it. Nothing touches the backing file
//! until [`SnapshotStore::save`].

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::block::{Block, BlockMap, Entry};
use crate::errors::{Error, SnapResult};
use crate::formatter::{FormatterChain, SnapshotFormatter};
use crate::paths::{determine_snapshot_paths, SnapshotPaths};
use crate::snapfile;

/// Inputs for [`load`].
#[derive(Debug, Clone)]
pub struct LoadOptions {
    /// The test file whose snapshots are wanted.
    pub file: PathBuf,
    /// Optional fixed snapshot root; see [`crate::paths`].
    pub fixed_location: Option<PathBuf>,
    /// Project root used to relativize paths.
    pub project_dir: PathBuf,
    /// Whether absent entries may be recorded. When false (restricted
    /// environments), comparisons against absent entries fail outright.
    pub record_new_snapshots: bool,
    /// Whether this run rebuilds the store from scratch.
    pub updating: bool,
}

/// A recording produced at comparison time and applied at run end.
///
/// The data is serialized when the recording is produced, not when it is
/// applied, so later mutation of the compared value cannot leak in.
/// Recordings reference positional indices relative to their own block and
/// must be applied in the order they were produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeferredRecording {
    pub title: String,
    pub index: usize,
    pub label: Option<String>,
    pub data: String,
}

/// Result of one comparison at the store level.
#[derive(Debug, Clone)]
pub struct CompareOutcome {
    /// Whether the value matched, or was accepted for recording.
    pub pass: bool,
    /// The stored canonical data, when an entry existed to compare against.
    pub actual: Option<String>,
    /// The canonical form of the incoming value, ditto.
    pub expected: Option<String>,
    /// Present when the comparison introduced a new reference value.
    pub record: Option<DeferredRecording>,
}

/// Files changed by [`SnapshotStore::save`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SaveReport {
    pub changed_files: Vec<PathBuf>,
}

/// Old and new recorded entries for one test run.
#[derive(Debug)]
pub struct SnapshotStore {
    paths: Option<SnapshotPaths>,
    record_new_snapshots: bool,
    updating: bool,
    old_blocks: BlockMap,
    new_blocks: BlockMap,
    /// Task index each title was first touched at; orders blocks at save.
    block_indices: HashMap<String, usize>,
    /// Path of a file that failed to decode; surfaced on compare.
    decode_error: Option<String>,
    /// Set only by [`apply`](Self::apply). Skips never dirty the store, so
    /// a run that records nothing rewrites nothing.
    has_changes: bool,
    formatters: FormatterChain,
}

impl SnapshotStore {
    /// A store with no backing file. Comparisons and recordings work as
    /// usual; `save` reports nothing to write.
    pub fn in_memory(record_new_snapshots: bool, updating: bool) -> Self {
        Self::from_parts(None, record_new_snapshots, updating, BlockMap::new(), None)
    }

    fn from_parts(
        paths: Option<SnapshotPaths>,
        record_new_snapshots: bool,
        updating: bool,
        old_blocks: BlockMap,
        decode_error: Option<String>,
    ) -> Self {
        let new_blocks = if updating {
            BlockMap::new()
        } else {
            old_blocks.clone()
        };
        Self {
            paths,
            record_new_snapshots,
            updating,
            old_blocks,
            new_blocks,
            block_indices: HashMap::new(),
            decode_error,
            has_changes: false,
            formatters: FormatterChain::new(),
        }
    }

    /// Path of the backing snapshot file, when there is one.
    pub fn snap_path(&self) -> Option<&Path> {
        self.paths.as_ref().map(|paths| paths.snap_path.as_path())
    }

    pub fn is_updating(&self) -> bool {
        self.updating
    }

    /// Number of entries the prior store held for `title`.
    pub fn old_block_len(&self, title: &str) -> usize {
        self.old_blocks.get(title).map(|block| block.len()).unwrap_or(0)
    }

    /// Total number of entries loaded from the prior store.
    pub fn starting_snapshot_count(&self) -> usize {
        self.old_blocks.total_entries()
    }

    /// Register a custom format handler; the most recently added handler
    /// is consulted first.
    pub fn add_formatter(&mut self, formatter: Box<dyn SnapshotFormatter>) {
        self.formatters.add_formatter(formatter);
    }

    /// Remember the order `title` was first reached this run.
    pub fn touch(&mut self, title: &str, task_index: usize) {
        self.block_indices.entry(title.to_string()).or_insert(task_index);
    }

    /// Compare a value against the entry at `index` of the block for
    /// `belongs_to`.
    ///
    /// Comparison never mutates the store. Introducing a new reference
    /// value yields a [`DeferredRecording`] for the caller to queue and
    /// apply at run end; an unpopulated placeholder counts as absent, so it
    /// can be filled the same way.
    pub fn compare<V: Serialize + ?Sized>(
        &self,
        belongs_to: &str,
        index: usize,
        expected: &V,
        label: Option<&str>,
    ) -> SnapResult<CompareOutcome> {
        if let Some(path) = &self.decode_error {
            return Err(Error::InvalidSnapshotFile { path: path.clone() });
        }

        let stored = self
            .new_blocks
            .get(belongs_to)
            .and_then(|block| block.get(index))
            .and_then(|entry| entry.data.as_ref());

        match stored {
            None => {
                if !self.record_new_snapshots {
                    return Ok(CompareOutcome {
                        pass: false,
                        actual: None,
                        expected: None,
                        record: None,
                    });
                }

                let data = self.formatters.serialize(expected)?;
                Ok(CompareOutcome {
                    pass: true,
                    actual: None,
                    expected: None,
                    record: Some(DeferredRecording {
                        title: belongs_to.to_string(),
                        index,
                        label: label.map(|label| label.to_string()),
                        data,
                    }),
                })
            }
            Some(stored) => {
                let rendered = self.formatters.serialize(expected)?;
                let pass = *stored == rendered;
                Ok(CompareOutcome {
                    pass,
                    actual: Some(stored.clone()),
                    expected: Some(rendered),
                    record: None,
                })
            }
        }
    }

    /// Apply one serialized recording to the new mapping, enforcing the
    /// append-only block invariant: entry `index` may only be written when
    /// entries `0..index` exist, and never over populated content.
    pub fn record_serialized(
        &mut self,
        title: &str,
        index: usize,
        label: Option<String>,
        data: Option<String>,
    ) -> SnapResult<()> {
        let len = self.new_blocks.get(title).map(|block| block.len()).unwrap_or(0);
        if index > len {
            return Err(Error::IndexOutOfRange {
                title: title.to_string(),
                index,
                len,
            });
        }

        if index < len {
            let block = self.new_blocks.get_or_insert(title);
            if block.entries[index].is_populated() {
                return Err(Error::DuplicateWrite {
                    title: title.to_string(),
                    index,
                });
            }
            block.entries[index] = Entry { label, data };
        } else {
            self.new_blocks.get_or_insert(title).entries.push(Entry { label, data });
        }
        Ok(())
    }

    /// Apply a deferred recording. This is the only path that marks the
    /// store as changed; the flag is raised before the write is attempted
    /// so a failed apply still counts as a dirty run.
    pub fn apply(&mut self, recording: DeferredRecording) -> SnapResult<()> {
        self.has_changes = true;
        self.record_serialized(
            &recording.title,
            recording.index,
            recording.label,
            Some(recording.data),
        )
    }

    /// Copy a whole block verbatim from the prior store, for a test that
    /// intentionally did not run.
    pub fn skip_block(&mut self, title: &str) {
        let block = self.old_blocks.get(title).cloned();
        if let Some(block) = block {
            self.new_blocks.insert(title, block);
        }
    }

    /// Copy one entry verbatim from the prior store. The label comes from
    /// the old entry, never from the caller. A missing old entry records an
    /// unpopulated placeholder so later indices keep their positions; an
    /// entry already populated in the new mapping is left as it is.
    pub fn skip_snapshot(&mut self, belongs_to: &str, index: usize) -> SnapResult<()> {
        let already_populated = self
            .new_blocks
            .get(belongs_to)
            .and_then(|block| block.get(index))
            .map(|entry| entry.is_populated())
            .unwrap_or(false);
        if already_populated {
            return Ok(());
        }

        let old = self
            .old_blocks
            .get(belongs_to)
            .and_then(|block| block.get(index))
            .cloned()
            .unwrap_or(Entry { label: None, data: None });
        self.record_serialized(belongs_to, index, old.label, old.data)
    }

    /// Persist the new mapping.
    ///
    /// Updating to an empty mapping deletes the file (no snapshots remain);
    /// an unchanged store writes nothing and returns `None`. Otherwise
    /// blocks are encoded in sorted order and written out, and the report
    /// names the file.
    pub fn save(&self) -> SnapResult<Option<SaveReport>> {
        let paths = match &self.paths {
            Some(paths) => paths,
            None => return Ok(None),
        };

        if self.updating && self.new_blocks.is_empty() {
            let changed_files = snapfile::clean_file(&paths.snap_path)?;
            return Ok(Some(SaveReport { changed_files }));
        }

        if !self.has_changes {
            return Ok(None);
        }

        let blocks = self.sorted_blocks();
        snapfile::write_snapshot_file(&paths.snap_path, &paths.dir, &blocks)?;

        Ok(Some(SaveReport {
            changed_files: vec![paths.snap_path.clone()],
        }))
    }

    /// New blocks ordered by first touch. Titles never touched this run
    /// sort after all touched ones; the sort is stable, so they keep their
    /// relative insertion order.
    fn sorted_blocks(&self) -> Vec<(&str, &Block)> {
        let mut blocks: Vec<(&str, &Block)> = self.new_blocks.iter().collect();
        blocks.sort_by(|(a, _), (b, _)| {
            match (self.block_indices.get(*a), self.block_indices.get(*b)) {
                (Some(a), Some(b)) => a.cmp(b),
                (Some(_), None) => std::cmp::Ordering::Less,
                (None, Some(_)) => std::cmp::Ordering::Greater,
                (None, None) => std::cmp::Ordering::Equal,
            }
        });
        blocks
    }
}

/// Load the snapshot store for a test file.
///
/// A missing file yields a fresh store. A file that cannot be decoded
/// yields a store carrying the decode error, surfaced on `compare`, except
/// when updating: the file is about to be regenerated from scratch, so
/// decode errors are discarded and the prior store treated as empty.
pub fn load(options: LoadOptions) -> SnapResult<SnapshotStore> {
    let paths = determine_snapshot_paths(
        &options.file,
        options.fixed_location.as_deref(),
        &options.project_dir,
    );

    let (old_blocks, decode_error) = match snapfile::read_snapshot_file(&paths.snap_path) {
        Ok(Some(blocks)) => (blocks, None),
        Ok(None) => (BlockMap::new(), None),
        Err(Error::InvalidSnapshotFile { path }) => {
            if options.updating {
                (BlockMap::new(), None)
            } else {
                (BlockMap::new(), Some(path))
            }
        }
        Err(other) => return Err(other),
    };

    Ok(SnapshotStore::from_parts(
        Some(paths),
        options.record_new_snapshots,
        options.updating,
        old_blocks,
        decode_error,
    ))
}
