// LabelStore — sidecar CSV of folder → label-index assignments
//
// A lightweight parser that doesn't require an external CSV crate.
// Row format: `folder,label,index`. The label defaults to the folder name
// and the index to the next free slot, so hand-written files can list just
// folder names.
//
// The store is append-only across runs: new folders get the next free
// index, existing folder→index assignments are never reassigned or
// removed. Trained checkpoints depend on those indices staying stable.

use std::path::Path;

use stoat_core::{bail, Error, Result};

/// One folder's persisted label assignment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelEntry {
    /// Subdirectory name under the dataset root.
    pub folder: String,
    /// Display label; defaults to the folder name.
    pub label: String,
    /// Class index, unique and stable across runs.
    pub index: usize,
}

/// The parsed label-config file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelStore {
    entries: Vec<LabelEntry>,
}

impl LabelStore {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a store from disk. A missing file is an empty store.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::new());
        }
        let content = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        Self::parse(&content)
    }

    /// Parse CSV content. Blank lines are skipped; a row is
    /// `folder[,label[,index]]`.
    pub fn parse(content: &str) -> Result<Self> {
        let mut entries: Vec<LabelEntry> = Vec::new();
        let mut next_index = 0usize;

        for (line_no, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let fields: Vec<&str> = line.split(',').map(|f| f.trim()).collect();
            let folder = fields[0].to_string();
            if folder.is_empty() {
                bail!("label store line {}: empty folder name", line_no + 1);
            }
            let label = match fields.get(1) {
                Some(l) if !l.is_empty() => l.to_string(),
                _ => folder.clone(),
            };
            let index = match fields.get(2) {
                Some(raw) if !raw.is_empty() => match raw.parse::<usize>() {
                    Ok(i) => {
                        next_index = next_index.max(i + 1);
                        i
                    }
                    Err(_) => bail!(
                        "label store line {}: invalid index {:?} for folder {:?}",
                        line_no + 1,
                        raw,
                        folder
                    ),
                },
                _ => {
                    let i = next_index;
                    next_index += 1;
                    i
                }
            };
            entries.push(LabelEntry {
                folder,
                label,
                index,
            });
        }

        Ok(Self { entries })
    }

    /// Serialize back to CSV, rows in insertion order.
    pub fn to_csv(&self) -> String {
        let mut out = String::new();
        for e in &self.entries {
            out.push_str(&format!("{},{},{}\n", e.folder, e.label, e.index));
        }
        out
    }

    /// Write the store to disk.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        std::fs::write(path, self.to_csv()).map_err(|e| Error::io(path, e))
    }

    /// Merge newly-discovered folders into the store.
    ///
    /// Unknown folders are appended with the next free index; folders
    /// already present keep their index untouched. Returns the number of
    /// entries added.
    pub fn merge_folders<S: AsRef<str>>(&mut self, folders: &[S]) -> usize {
        let mut next_index = self
            .entries
            .iter()
            .map(|e| e.index + 1)
            .max()
            .unwrap_or(0);
        let mut added = 0;
        for folder in folders {
            let folder = folder.as_ref();
            if self.index_of(folder).is_none() {
                self.entries.push(LabelEntry {
                    folder: folder.to_string(),
                    label: folder.to_string(),
                    index: next_index,
                });
                next_index += 1;
                added += 1;
            }
        }
        added
    }

    /// The stored index for a folder, if any.
    pub fn index_of(&self, folder: &str) -> Option<usize> {
        self.entries
            .iter()
            .find(|e| e.folder == folder)
            .map(|e| e.index)
    }

    /// All entries, in insertion order.
    pub fn entries(&self) -> &[LabelEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Class names ordered by stored index, suitable as the explicit
    /// `class_names` of an indexing call.
    pub fn class_names_by_index(&self) -> Vec<String> {
        let mut sorted: Vec<&LabelEntry> = self.entries.iter().collect();
        sorted.sort_by_key(|e| e.index);
        sorted.iter().map(|e| e.folder.clone()).collect()
    }
}
