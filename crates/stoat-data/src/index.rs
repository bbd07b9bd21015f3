// Directory indexer — class catalog and ordered file listing
//
// Scans a directory structure where each subdirectory is a class:
//
//   root/
//     class_a/
//       img_001.png
//       img_002.jpg
//     class_b/
//       img_003.png
//       ...
//
// Class labels are assigned as sorted indices of subdirectory names unless
// an explicit class-name ordering or pre-assigned labels are supplied.

use std::path::{Path, PathBuf};

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tracing::debug;

use stoat_core::{Error, Result};

use crate::labels::Labels;

/// Extensions indexed by default (matched case-insensitively, without dot).
pub const DEFAULT_FORMATS: &[&str] = &["jpg", "jpeg", "png", "bmp", "gif"];

/// Configuration for [`index_directory`].
#[derive(Debug, Clone)]
pub struct IndexOptions {
    /// Where labels come from.
    pub labels: Labels,
    /// Explicit ordered class names; must be set-equal to the discovered
    /// subdirectory names. Only valid with inferred labels.
    pub class_names: Option<Vec<String>>,
    /// File-extension allow-list, without dots.
    pub formats: Vec<String>,
    /// Shuffle paths and labels in lockstep after listing.
    pub shuffle: bool,
    /// Seed for the shuffle permutation; entropy-seeded when absent.
    pub seed: Option<u64>,
    /// Accepted for interface compatibility; symlinked subdirectories are
    /// not currently followed.
    /// TODO: honor follow_links during traversal.
    pub follow_links: bool,
}

impl Default for IndexOptions {
    fn default() -> Self {
        Self {
            labels: Labels::Inferred,
            class_names: None,
            formats: DEFAULT_FORMATS.iter().map(|s| s.to_string()).collect(),
            shuffle: false,
            seed: None,
            follow_links: false,
        }
    }
}

impl IndexOptions {
    pub fn labels(mut self, labels: Labels) -> Self {
        self.labels = labels;
        self
    }

    pub fn class_names(mut self, names: Option<Vec<String>>) -> Self {
        self.class_names = names;
        self
    }

    pub fn formats(mut self, formats: Vec<String>) -> Self {
        self.formats = formats;
        self
    }

    pub fn shuffle(mut self, shuffle: bool) -> Self {
        self.shuffle = shuffle;
        self
    }

    pub fn seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    pub fn follow_links(mut self, follow: bool) -> Self {
        self.follow_links = follow;
        self
    }
}

/// The result of indexing: three arrays that stay index-aligned.
#[derive(Debug, Clone)]
pub struct DirectoryIndex {
    /// Absolute file paths.
    pub paths: Vec<PathBuf>,
    /// One class index per path, aligned positionally.
    pub labels: Vec<usize>,
    /// Class names, ordered so that `class_names[label]` names the class.
    pub class_names: Vec<String>,
}

impl DirectoryIndex {
    /// Number of indexed files.
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Number of classes in the catalog.
    pub fn num_classes(&self) -> usize {
        self.class_names.len()
    }
}

/// List all image files under `root`, together with their labels.
///
/// Subdirectories of `root` are enumerated in lexicographic order; each
/// becomes one class. Files inside each class directory are filtered by the
/// extension allow-list (case-insensitive) and sorted lexicographically, so
/// the produced ordering is deterministic for a given directory snapshot.
///
/// When `shuffle` is set, a single random permutation is drawn and applied
/// to the path and label arrays in lockstep; the (path, label) pairing is
/// never broken.
pub fn index_directory(root: impl AsRef<Path>, options: IndexOptions) -> Result<DirectoryIndex> {
    let root = root.as_ref();
    if !root.is_dir() {
        return Err(Error::DirectoryNotFound {
            path: root.display().to_string(),
        });
    }
    // Canonical root so every returned path is absolute.
    let root = root
        .canonicalize()
        .map_err(|e| Error::io(root, e))?;

    let mut class_dirs = list_subdirectories(&root)?;
    if class_dirs.is_empty() {
        return Err(Error::EmptyDataset {
            path: root.display().to_string(),
        });
    }
    class_dirs.sort_by(|a, b| a.0.cmp(&b.0));

    // Resolve the class catalog and the order classes are processed in.
    if let Some(ref explicit) = options.class_names {
        if options.labels != Labels::Inferred {
            return Err(Error::Configuration(
                "class_names can only be supplied when labels are inferred".to_string(),
            ));
        }
        check_set_equal(explicit, &class_dirs)?;
        // Explicit ordering controls index assignment.
        let mut remaining = std::mem::take(&mut class_dirs);
        for name in explicit {
            if let Some(pos) = remaining.iter().position(|(n, _)| n == name) {
                class_dirs.push(remaining.swap_remove(pos));
            }
        }
    }

    // List files per class, preserving per-class contiguity.
    let mut paths: Vec<PathBuf> = Vec::new();
    let mut file_classes: Vec<usize> = Vec::new();
    for (class_idx, (_name, dir)) in class_dirs.iter().enumerate() {
        let mut files = list_files(dir, &options.formats)?;
        files.sort();
        for f in files {
            paths.push(f);
            file_classes.push(class_idx);
        }
    }

    let (labels, class_names) = match options.labels {
        Labels::Inferred | Labels::None => {
            let names: Vec<String> = class_dirs.into_iter().map(|(n, _)| n).collect();
            (file_classes, names)
        }
        Labels::Explicit(given) => {
            if given.len() != paths.len() {
                return Err(Error::LengthMismatch {
                    left_name: "explicit labels",
                    left: given.len(),
                    right_name: "files",
                    right: paths.len(),
                });
            }
            let num_classes = given.iter().max().map_or(0, |m| m + 1);
            let names = (0..num_classes).map(|i| i.to_string()).collect();
            (given, names)
        }
    };

    debug!(
        files = paths.len(),
        classes = class_names.len(),
        "indexed directory {}",
        root.display()
    );

    let (paths, labels) = if options.shuffle {
        synchronized_shuffle(paths, labels, options.seed)?
    } else {
        (paths, labels)
    };

    Ok(DirectoryIndex {
        paths,
        labels,
        class_names,
    })
}

/// Immediate subdirectories of `root` as (name, path) pairs.
fn list_subdirectories(root: &Path) -> Result<Vec<(String, PathBuf)>> {
    let mut dirs = Vec::new();
    for entry in std::fs::read_dir(root).map_err(|e| Error::io(root, e))? {
        let entry = entry.map_err(|e| Error::io(root, e))?;
        let path = entry.path();
        if path.is_dir() {
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                dirs.push((name.to_string(), path));
            }
        }
    }
    Ok(dirs)
}

/// Immediate files of `dir` whose extension is in the allow-list.
fn list_files(dir: &Path, formats: &[String]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(|e| Error::io(dir, e))? {
        let entry = entry.map_err(|e| Error::io(dir, e))?;
        let path = entry.path();
        if path.is_file() && has_allowed_extension(&path, formats) {
            files.push(path);
        }
    }
    Ok(files)
}

fn has_allowed_extension(path: &Path, formats: &[String]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| {
            let lowered = e.to_ascii_lowercase();
            formats.iter().any(|f| f.eq_ignore_ascii_case(&lowered))
        })
        .unwrap_or(false)
}

fn check_set_equal(explicit: &[String], discovered: &[(String, PathBuf)]) -> Result<()> {
    use std::collections::BTreeSet;
    let given: BTreeSet<&str> = explicit.iter().map(|s| s.as_str()).collect();
    let found: BTreeSet<&str> = discovered.iter().map(|(n, _)| n.as_str()).collect();
    if given != found {
        return Err(Error::Configuration(format!(
            "class_names did not match the subdirectories of the dataset root. \
             Expected: [{}], received: [{}]",
            found.iter().cloned().collect::<Vec<_>>().join(", "),
            explicit.join(", ")
        )));
    }
    if given.len() != explicit.len() {
        return Err(Error::Configuration(
            "class_names contains duplicate entries".to_string(),
        ));
    }
    Ok(())
}

/// Shuffle two parallel arrays with a single shared permutation.
fn synchronized_shuffle(
    paths: Vec<PathBuf>,
    labels: Vec<usize>,
    seed: Option<u64>,
) -> Result<(Vec<PathBuf>, Vec<usize>)> {
    if paths.len() != labels.len() {
        return Err(Error::LengthMismatch {
            left_name: "paths",
            left: paths.len(),
            right_name: "labels",
            right: labels.len(),
        });
    }
    let mut rng = match seed {
        Some(s) => StdRng::seed_from_u64(s),
        None => StdRng::from_entropy(),
    };
    let mut perm: Vec<usize> = (0..paths.len()).collect();
    perm.shuffle(&mut rng);
    Ok((permute(paths, &perm), permute(labels, &perm)))
}

/// Reorder `values` so that output position `i` holds `values[perm[i]]`.
///
/// The same permutation applied to every parallel array keeps them
/// index-aligned; randomness is drawn once, never per array.
///
/// # Panics
/// Panics if `perm` is not a permutation of `0..values.len()`.
pub fn permute<T>(values: Vec<T>, perm: &[usize]) -> Vec<T> {
    assert_eq!(values.len(), perm.len(), "permutation length mismatch");
    let mut slots: Vec<Option<T>> = values.into_iter().map(Some).collect();
    perm.iter()
        .map(|&i| slots[i].take().expect("index repeated in permutation"))
        .collect()
}
