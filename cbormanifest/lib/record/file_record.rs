use std::{
    collections::BTreeMap,
    fmt::{self, Display},
    str::FromStr,
};

use chrono::{DateTime, Utc};
use getset::{CopyGetters, Getters};
use typed_builder::TypedBuilder;

use crate::{
    config::{DEFAULT_ROOT_ID, DEFAULT_ROOT_MODE},
    hasher::ContentDigest,
    ManifestError,
};

use super::Permissions;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Extended attributes of an entry, keyed by attribute name.
pub type ExtendedAttributes = BTreeMap<String, String>;

/// The kind of a filesystem entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileKind {
    /// A directory.
    Directory,

    /// A regular file.
    RegularFile,

    /// A hard link to another path in the archive.
    HardLink,

    /// A symbolic link.
    Symlink,

    /// A character device node.
    CharacterDevice,

    /// A block device node.
    BlockDevice,

    /// A named pipe.
    Fifo,
}

/// The kind-specific part of a [`FileRecord`].
///
/// Exactly one variant exists per [`FileKind`], so a record can never carry a payload that
/// disagrees with its kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilePayload {
    /// A directory has no payload.
    Directory,

    /// A regular file's length and content digest.
    RegularFile {
        /// Length of the content in bytes.
        size: u64,

        /// BLAKE3 digest of the content.
        digest: ContentDigest,
    },

    /// The path a hard link points at.
    HardLink {
        /// Link target as written in the archive.
        target: String,
    },

    /// The path a symbolic link points at.
    Symlink {
        /// Link target as written in the archive.
        target: String,
    },

    /// Device numbers of a character device.
    CharacterDevice {
        /// Major device number.
        major: u64,

        /// Minor device number.
        minor: u64,
    },

    /// Device numbers of a block device.
    BlockDevice {
        /// Major device number.
        major: u64,

        /// Minor device number.
        minor: u64,
    },

    /// A named pipe has no payload.
    Fifo,
}

/// The optional timestamps of an entry, at nanosecond precision.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Timestamps {
    /// Last access time.
    pub atime: Option<DateTime<Utc>>,

    /// Creation (birth) time.
    pub btime: Option<DateTime<Utc>>,

    /// Last status change time.
    pub ctime: Option<DateTime<Utc>>,

    /// Last modification time.
    pub mtime: Option<DateTime<Utc>>,
}

/// Everything a manifest records about one path.
///
/// ## Examples
///
/// ```
/// use cbormanifest::record::{FileKind, FilePayload, FileRecord, Permissions};
///
/// let record = FileRecord::builder()
///     .permissions(Permissions::from_mode(0o777))
///     .payload(FilePayload::Symlink { target: "/usr/bin/busybox".to_string() })
///     .build();
///
/// assert_eq!(record.kind(), FileKind::Symlink);
/// assert_eq!(record.get_uid(), None);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Getters, CopyGetters, TypedBuilder)]
pub struct FileRecord {
    /// Permission bits.
    #[builder(default)]
    #[getset(get_copy = "pub with_prefix")]
    permissions: Permissions,

    /// Numeric owner id.
    #[builder(default)]
    #[getset(get_copy = "pub with_prefix")]
    uid: Option<u64>,

    /// Numeric group id.
    #[builder(default)]
    #[getset(get_copy = "pub with_prefix")]
    gid: Option<u64>,

    /// Owner name.
    #[builder(default)]
    #[getset(get = "pub with_prefix")]
    username: Option<String>,

    /// Group name.
    #[builder(default)]
    #[getset(get = "pub with_prefix")]
    groupname: Option<String>,

    /// Access, birth, change and modify times.
    #[builder(default)]
    #[getset(get_copy = "pub with_prefix")]
    timestamps: Timestamps,

    /// Extended attributes. `None` when the entry carried none.
    #[builder(default)]
    #[getset(get = "pub with_prefix")]
    xattrs: Option<ExtendedAttributes>,

    /// The kind-specific payload.
    #[getset(get = "pub with_prefix")]
    payload: FilePayload,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl FileKind {
    /// Every kind, in schema order.
    pub const ALL: [FileKind; 7] = [
        FileKind::Directory,
        FileKind::RegularFile,
        FileKind::HardLink,
        FileKind::Symlink,
        FileKind::CharacterDevice,
        FileKind::BlockDevice,
        FileKind::Fifo,
    ];

    /// The name of the kind in the encoded manifest. It doubles as the key of the payload.
    pub fn as_str(&self) -> &'static str {
        match self {
            FileKind::Directory => "directory",
            FileKind::RegularFile => "regularfile",
            FileKind::HardLink => "link",
            FileKind::Symlink => "symlink",
            FileKind::CharacterDevice => "character",
            FileKind::BlockDevice => "block",
            FileKind::Fifo => "fifo",
        }
    }
}

impl FilePayload {
    /// Returns the kind this payload belongs to.
    pub fn kind(&self) -> FileKind {
        match self {
            FilePayload::Directory => FileKind::Directory,
            FilePayload::RegularFile { .. } => FileKind::RegularFile,
            FilePayload::HardLink { .. } => FileKind::HardLink,
            FilePayload::Symlink { .. } => FileKind::Symlink,
            FilePayload::CharacterDevice { .. } => FileKind::CharacterDevice,
            FilePayload::BlockDevice { .. } => FileKind::BlockDevice,
            FilePayload::Fifo => FileKind::Fifo,
        }
    }
}

impl FileRecord {
    /// The record every snapshot starts with at `/`: a directory owned by id 0.
    pub fn root() -> Self {
        FileRecord::builder()
            .permissions(Permissions::from_mode(DEFAULT_ROOT_MODE))
            .uid(Some(DEFAULT_ROOT_ID))
            .gid(Some(DEFAULT_ROOT_ID))
            .payload(FilePayload::Directory)
            .build()
    }

    /// Returns the kind of the entry.
    pub fn kind(&self) -> FileKind {
        self.payload.kind()
    }

    /// Returns true if the entry is a directory.
    pub fn is_dir(&self) -> bool {
        self.kind() == FileKind::Directory
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl Display for FileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FileKind {
    type Err = ManifestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FileKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| ManifestError::Decoding(format!("unknown file type: {s:?}")))
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
