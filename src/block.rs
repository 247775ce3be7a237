//! Recorded entries and the ordered title-to-block mapping.

use std::collections::HashMap;

/// One recorded reference value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// Caller-supplied caption, if any. Unlabeled entries are identified
    /// purely by position.
    pub label: Option<String>,
    /// Canonical serialized data. `None` marks an unpopulated placeholder
    /// (written when skipping an index with no prior content); recording
    /// over a placeholder is not a duplicate write.
    pub data: Option<String>,
}

impl Entry {
    /// An entry counts as populated once its data has been written.
    pub fn is_populated(&self) -> bool {
        self.data.is_some()
    }
}

/// All entries belonging to one test title, in recording order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Block {
    pub entries: Vec<Entry>,
}

impl Block {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Entry> {
        self.entries.get(index)
    }
}

/// Title-to-block mapping that remembers insertion order.
///
/// Decode order (for loaded files) and first-write order (for blocks built
/// this run) both survive into iteration, which saving relies on when it
/// places untouched blocks after touched ones.
#[derive(Debug, Clone, Default)]
pub struct BlockMap {
    order: Vec<String>,
    blocks: HashMap<String, Block>,
}

impl BlockMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn get(&self, title: &str) -> Option<&Block> {
        self.blocks.get(title)
    }

    /// In-place access, registering an empty block at the back of the
    /// insertion order when the title is new.
    pub fn get_or_insert(&mut self, title: &str) -> &mut Block {
        if !self.blocks.contains_key(title) {
            self.order.push(title.to_string());
        }
        self.blocks.entry(title.to_string()).or_insert_with(Block::new)
    }

    /// Replace a block wholesale, or append it if the title is new.
    pub fn insert(&mut self, title: &str, block: Block) {
        if !self.blocks.contains_key(title) {
            self.order.push(title.to_string());
        }
        self.blocks.insert(title.to_string(), block);
    }

    /// Blocks in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Block)> + '_ {
        self.order
            .iter()
            .map(move |title| (title.as_str(), &self.blocks[title]))
    }

    /// Sum of entry counts across all blocks.
    pub fn total_entries(&self) -> usize {
        self.blocks.values().map(|block| block.len()).sum()
    }
}
