use std::collections::{btree_map, BTreeMap};

use crate::{
    layer::{LayerChange, WhiteoutKind},
    record::FileRecord,
    utils::ROOT_PATH,
    ManifestError, ManifestResult,
};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// The merged view of a filesystem: every path mapped to its record.
///
/// Keys are normalized absolute paths and are kept sorted. The root `/` is always present and is
/// always a directory.
///
/// ## Examples
///
/// ```
/// use cbormanifest::{merge::Snapshot, record::{FilePayload, FileRecord}};
///
/// let mut snapshot = Snapshot::new();
/// assert_eq!(snapshot.len(), 1);
///
/// snapshot.upsert("/etc", FileRecord::builder().payload(FilePayload::Directory).build());
/// assert!(snapshot.get("/etc").unwrap().is_dir());
/// assert_eq!(snapshot.paths().collect::<Vec<_>>(), ["/", "/etc"]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    files: BTreeMap<String, FileRecord>,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl Snapshot {
    /// Creates a snapshot holding only the root directory.
    pub fn new() -> Self {
        Self {
            files: BTreeMap::from([(ROOT_PATH.to_string(), FileRecord::root())]),
        }
    }

    /// Builds a snapshot from decoded records. The map must contain a root directory.
    pub fn from_files(files: BTreeMap<String, FileRecord>) -> ManifestResult<Self> {
        match files.get(ROOT_PATH) {
            Some(root) if root.is_dir() => Ok(Self { files }),
            Some(root) => Err(ManifestError::Decoding(format!(
                "root must be a directory, found {}",
                root.kind()
            ))),
            None => Err(ManifestError::Decoding("root directory is missing".to_string())),
        }
    }

    /// Applies one layer change.
    ///
    /// Upserts replace whatever was at the path. Deletion markers are rejected with
    /// [`ManifestError::UnsupportedWhiteout`] since removal is not modelled.
    pub fn apply(&mut self, change: LayerChange) -> ManifestResult<()> {
        match change {
            LayerChange::Upsert { path, record } => {
                self.upsert(path, record);
                Ok(())
            }
            LayerChange::Delete { path, kind } => {
                let path = match kind {
                    WhiteoutKind::Entry => path,
                    WhiteoutKind::Opaque => format!("{path} (opaque)"),
                };
                Err(ManifestError::UnsupportedWhiteout { path })
            }
        }
    }

    /// Stores `record` at `path`, returning the record it replaced.
    ///
    /// A non-directory record for `/` is ignored so the root stays a directory.
    pub fn upsert(&mut self, path: impl Into<String>, record: FileRecord) -> Option<FileRecord> {
        let path = path.into();
        if path == ROOT_PATH && !record.is_dir() {
            tracing::warn!("ignoring {} entry at the root", record.kind());
            return None;
        }

        self.files.insert(path, record)
    }

    /// Returns the record at `path`.
    pub fn get(&self, path: &str) -> Option<&FileRecord> {
        self.files.get(path)
    }

    /// Returns true if there is a record at `path`.
    pub fn contains(&self, path: &str) -> bool {
        self.files.contains_key(path)
    }

    /// Returns the number of paths, including the root.
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Always false, since the root is always present.
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Iterates over paths and records in path order.
    pub fn iter(&self) -> btree_map::Iter<'_, String, FileRecord> {
        self.files.iter()
    }

    /// Iterates over the paths in order.
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.files.keys().map(String::as_str)
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl Default for Snapshot {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> IntoIterator for &'a Snapshot {
    type Item = (&'a String, &'a FileRecord);
    type IntoIter = btree_map::Iter<'a, String, FileRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
