//! On-disk snapshot file codec and filesystem access.
//!
//! The persisted format is one flat TOML table. Each pair's key is
//! `"<title>//<label-or-index>"` and its value is the canonical serialized
//! data for that entry. Document order is meaningful in both directions:
//! entries decode into their blocks by position of appearance, and encoding
//! writes blocks (and entries within them) in their final order. The
//! numeric suffix of an unlabeled key only marks it as unlabeled, it is
//! never used for positioning, so a label that happens to render like an
//! index is indistinguishable from one. That ambiguity is a property of the
//! format.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::block::{Block, BlockMap, Entry};
use crate::errors::{Error, SnapResult};

/// Separator between a pair's title and its label-or-index suffix.
const KEY_SEPARATOR: &str = "//";

fn fs_error(path: &Path, source: std::io::Error) -> Error {
    Error::Fs {
        path: path.display().to_string(),
        source,
    }
}

fn invalid(path: &Path) -> Error {
    Error::InvalidSnapshotFile {
        path: path.display().to_string(),
    }
}

/// True when `suffix` is exactly the decimal rendering of a non-negative
/// integer, i.e. an auto-generated position rather than a label. `"007"`,
/// `"+7"`, `"-1"` and `"3.5"` all fail the round-trip and stay labels.
fn is_positional_suffix(suffix: &str) -> bool {
    match suffix.parse::<usize>() {
        Ok(n) => n.to_string() == suffix,
        Err(_) => false,
    }
}

/// Read and decode a snapshot file. Returns `Ok(None)` when the file does
/// not exist.
pub fn read_snapshot_file(path: &Path) -> SnapResult<Option<BlockMap>> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(fs_error(path, e)),
    };

    let table: toml::Table = toml::from_str(&content).map_err(|_| invalid(path))?;

    let mut blocks = BlockMap::new();
    for (key, value) in table {
        let data = match value {
            toml::Value::String(data) => data,
            _ => return Err(invalid(path)),
        };
        // Split on the first separator; the rest of the key is the suffix.
        let (title, suffix) = match key.split_once(KEY_SEPARATOR) {
            Some(pair) => pair,
            None => return Err(invalid(path)),
        };

        let label = if is_positional_suffix(suffix) {
            None
        } else {
            Some(suffix.to_string())
        };

        blocks.get_or_insert(title).entries.push(Entry {
            label,
            data: Some(data),
        });
    }

    Ok(Some(blocks))
}

/// Encode blocks in the order given and write the snapshot file, creating
/// `dir` first when needed.
pub fn write_snapshot_file(path: &Path, dir: &Path, blocks: &[(&str, &Block)]) -> SnapResult<()> {
    fs::create_dir_all(dir).map_err(|e| fs_error(dir, e))?;

    let mut table = toml::Table::new();
    for (title, block) in blocks {
        for (index, entry) in block.entries.iter().enumerate() {
            let suffix = match &entry.label {
                Some(label) => label.clone(),
                None => index.to_string(),
            };
            let key = format!("{}{}{}", title, KEY_SEPARATOR, suffix);
            // Placeholders persist as empty strings so the positions of
            // later entries survive a decode.
            let data = entry.data.clone().unwrap_or_default();
            table.insert(key, toml::Value::String(data));
        }
    }

    let rendered = toml::to_string(&table).expect("a table of strings renders without error");
    fs::write(path, rendered).map_err(|e| fs_error(path, e))
}

/// Delete a snapshot file, reporting which paths were removed. A missing
/// file is not an error; it reports as no change.
pub fn clean_file(path: &Path) -> SnapResult<Vec<PathBuf>> {
    match fs::remove_file(path) {
        Ok(()) => Ok(vec![path.to_path_buf()]),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(Vec::new()),
        Err(e) => Err(fs_error(path, e)),
    }
}
