use crate::{merge::Snapshot, ManifestResult};

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

/// The CBOR tag wrapping every manifest. Its four bytes read `ocix`.
pub const MANIFEST_TAG: u64 = 1868786040;

/// The schema version written into new manifests.
pub const MANIFEST_VERSION: u64 = 0;

pub(super) const KEY_FILES: &str = "files";
pub(super) const KEY_VERSION: &str = "version";

pub(super) const KEY_MODE: &str = "mode";
pub(super) const KEY_UID: &str = "uid";
pub(super) const KEY_GID: &str = "gid";
pub(super) const KEY_USERNAME: &str = "username";
pub(super) const KEY_GROUPNAME: &str = "groupname";
pub(super) const KEY_ATIME: &str = "atime";
pub(super) const KEY_BTIME: &str = "btime";
pub(super) const KEY_CTIME: &str = "ctime";
pub(super) const KEY_MTIME: &str = "mtime";
pub(super) const KEY_XATTR: &str = "xattr";
pub(super) const KEY_TYPE: &str = "type";

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// A versioned snapshot, the unit that gets encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Manifest {
    version: u64,
    files: Snapshot,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl Manifest {
    /// Wraps a snapshot at the current schema version.
    pub fn new(files: Snapshot) -> Self {
        Self {
            version: MANIFEST_VERSION,
            files,
        }
    }

    /// Returns the schema version.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Returns the snapshot.
    pub fn files(&self) -> &Snapshot {
        &self.files
    }

    /// Consumes the manifest and returns its snapshot.
    pub fn into_files(self) -> Snapshot {
        self.files
    }

    /// Encodes the manifest. See [`encode_manifest`].
    pub fn to_vec(&self) -> ManifestResult<Vec<u8>> {
        super::encode_manifest(self)
    }

    /// Decodes a manifest. See [`decode_manifest`](super::decode_manifest).
    pub fn from_slice(bytes: &[u8]) -> ManifestResult<Self> {
        super::decode_manifest(bytes)
    }
}
