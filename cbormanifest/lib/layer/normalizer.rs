use std::{
    io::{self, Read},
    ops::RangeInclusive,
};

use chrono::{DateTime, Datelike, Utc};
use tar::EntryType;

use crate::{
    config::{ChangeTimePolicy, ManifestConfig, OwnershipPolicy},
    hasher,
    record::{FilePayload, FileRecord, Permissions, Timestamps},
    utils::{self, WHITEOUT_OPAQUE, WHITEOUT_PREFIX},
    ManifestError, ManifestResult,
};

use super::RawHeader;

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

/// Years a manifest timestamp can hold. RFC 3339 has exactly four year digits.
const TIMESTAMP_YEARS: RangeInclusive<i32> = 0..=9999;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// What one archive entry does to the filesystem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LayerChange {
    /// Create or replace the record at `path`.
    Upsert {
        /// Normalized absolute path.
        path: String,

        /// The complete record for the path.
        record: FileRecord,
    },

    /// Remove what earlier layers put at `path`.
    Delete {
        /// Normalized absolute path the marker refers to.
        path: String,

        /// Which kind of marker it was.
        kind: WhiteoutKind,
    },
}

/// The two kinds of deletion marker found in layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WhiteoutKind {
    /// `.wh.<name>` removes `<name>`.
    Entry,

    /// `.wh..wh..opq` hides everything earlier layers put in its directory.
    Opaque,
}

/// Converts raw archive entries into [`LayerChange`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct EntryNormalizer {
    ownership: OwnershipPolicy,
    change_time: ChangeTimePolicy,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl LayerChange {
    /// Returns the path the change applies to.
    pub fn path(&self) -> &str {
        match self {
            LayerChange::Upsert { path, .. } | LayerChange::Delete { path, .. } => path,
        }
    }
}

impl EntryNormalizer {
    /// Creates a normalizer following the ownership and change-time policies of `config`.
    pub fn new(config: &ManifestConfig) -> Self {
        Self {
            ownership: config.ownership,
            change_time: config.change_time,
        }
    }

    /// Normalizes one entry.
    ///
    /// For regular files `content` is read to the end and hashed; other kinds never touch it.
    ///
    /// ## Examples
    ///
    /// ```
    /// use cbormanifest::{
    ///     hasher::ContentDigest,
    ///     layer::{EntryNormalizer, LayerChange, RawHeader},
    ///     record::FilePayload,
    /// };
    ///
    /// let header = RawHeader::builder()
    ///     .path("./bin/sh")
    ///     .entry_type(tar::EntryType::Regular)
    ///     .size(4)
    ///     .build();
    ///
    /// let change = EntryNormalizer::default().normalize(&header, &b"\x7fELF"[..]).unwrap();
    /// let LayerChange::Upsert { path, record } = change else { panic!("not an upsert") };
    ///
    /// assert_eq!(path, "/bin/sh");
    /// assert_eq!(
    ///     record.get_payload(),
    ///     &FilePayload::RegularFile { size: 4, digest: ContentDigest::of(b"\x7fELF") }
    /// );
    /// ```
    pub fn normalize(&self, header: &RawHeader, content: impl Read) -> ManifestResult<LayerChange> {
        let path = utils::normalize_entry_path(&header.path);

        if let Some((target, kind)) = classify_whiteout(&path) {
            return Ok(LayerChange::Delete { path: target, kind });
        }

        let timestamps = self.timestamps(&path, header)?;

        let payload = match header.entry_type {
            EntryType::Regular => FilePayload::RegularFile {
                size: header.size,
                digest: hasher::hash_content(&path, content, header.size)?,
            },
            EntryType::Link => FilePayload::HardLink {
                target: header.link_name.clone().unwrap_or_default(),
            },
            EntryType::Symlink => FilePayload::Symlink {
                target: header.link_name.clone().unwrap_or_default(),
            },
            EntryType::Char => FilePayload::CharacterDevice {
                major: header.device_major.into(),
                minor: header.device_minor.into(),
            },
            EntryType::Block => FilePayload::BlockDevice {
                major: header.device_major.into(),
                minor: header.device_minor.into(),
            },
            EntryType::Directory => FilePayload::Directory,
            EntryType::Fifo => FilePayload::Fifo,
            entry_type => {
                return Err(ManifestError::UnsupportedEntryType { path, entry_type });
            }
        };

        let record = FileRecord::builder()
            .permissions(Permissions::from_mode(header.mode))
            .uid(self.id(header.uid))
            .gid(self.id(header.gid))
            .username(non_empty(&header.username))
            .groupname(non_empty(&header.groupname))
            .timestamps(timestamps)
            .xattrs((!header.pax_records.is_empty()).then(|| header.pax_records.clone()))
            .payload(payload)
            .build();

        tracing::debug!("adding {} {path}", record.kind());
        Ok(LayerChange::Upsert { path, record })
    }

    fn id(&self, id: u64) -> Option<u64> {
        match self.ownership {
            OwnershipPolicy::ZeroIsUnset if id == 0 => None,
            _ => Some(id),
        }
    }

    fn timestamps(&self, path: &str, header: &RawHeader) -> ManifestResult<Timestamps> {
        let times = [
            ("atime", header.atime),
            ("btime", header.btime),
            ("ctime", header.ctime),
            ("mtime", header.mtime),
        ];
        for (name, time) in times {
            if let Some(time) = time {
                check_timestamp(path, name, &time)?;
            }
        }

        let mut timestamps = Timestamps {
            atime: header.atime,
            btime: header.btime,
            ctime: header.ctime,
            mtime: header.mtime,
        };

        if self.change_time == ChangeTimePolicy::FoldIntoModify {
            if let Some(ctime) = timestamps.ctime.take() {
                timestamps.mtime = Some(ctime);
            }
        }

        Ok(timestamps)
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

fn check_timestamp(path: &str, name: &str, time: &DateTime<Utc>) -> ManifestResult<()> {
    if TIMESTAMP_YEARS.contains(&time.year()) {
        return Ok(());
    }

    Err(ManifestError::extraction(
        path,
        io::Error::new(
            io::ErrorKind::InvalidData,
            format!("{name} {time} is outside the years 0000 to 9999"),
        ),
    ))
}

fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}

/// Finds the first whiteout segment of a normalized path and the path it removes.
fn classify_whiteout(path: &str) -> Option<(String, WhiteoutKind)> {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    let index = segments
        .iter()
        .position(|segment| segment.starts_with(WHITEOUT_PREFIX))?;

    let parent = &segments[..index];
    let marker = segments[index];

    if marker.starts_with(WHITEOUT_OPAQUE) {
        return Some((format!("/{}", parent.join("/")), WhiteoutKind::Opaque));
    }

    let hidden = &marker[WHITEOUT_PREFIX.len()..];
    let target = parent
        .iter()
        .copied()
        .chain(std::iter::once(hidden))
        .collect::<Vec<_>>()
        .join("/");

    Some((format!("/{target}"), WhiteoutKind::Entry))
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
