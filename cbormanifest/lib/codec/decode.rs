use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Utc};
use minicbor::{data::Type, decode, Decoder};

use crate::{
    hasher::ContentDigest,
    merge::Snapshot,
    record::{
        ExtendedAttributes, FileKind, FilePayload, FileRecord, Permissions, Rwx, Timestamps,
    },
    utils::ROOT_PATH,
    ManifestError, ManifestResult,
};

use super::{
    Manifest, KEY_ATIME, KEY_BTIME, KEY_CTIME, KEY_FILES, KEY_GID, KEY_GROUPNAME, KEY_MODE,
    KEY_MTIME, KEY_TYPE, KEY_UID, KEY_USERNAME, KEY_VERSION, KEY_XATTR, MANIFEST_TAG,
    MANIFEST_VERSION,
};

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Decodes manifest bytes produced by [`encode_manifest`](super::encode_manifest).
///
/// Decoding is strict. Besides malformed CBOR, it rejects:
/// - a missing or foreign outer tag ([`ManifestError::UnknownTag`])
/// - a schema version other than the current one ([`ManifestError::UnsupportedVersion`])
/// - indefinite-length maps, arrays and strings
/// - unknown or duplicate keys, and records without a type or payload
/// - payloads that disagree with the record type, and digests of the wrong width
/// - trailing bytes after the manifest
///
/// Map order is not checked, so any valid manifest decodes regardless of how it was encoded.
pub fn decode_manifest(bytes: &[u8]) -> ManifestResult<Manifest> {
    let mut d = Decoder::new(bytes);
    if d.datatype()? != Type::Tag {
        return Err(ManifestError::Decoding(
            "manifest is not a tagged value".to_string(),
        ));
    }

    let tag = d.tag()?.as_u64();
    if tag != MANIFEST_TAG {
        return Err(ManifestError::UnknownTag(tag));
    }

    let mut version = None;
    let mut files_at = None;
    let mut seen = HashSet::new();

    for _ in 0..map_len(&mut d, "manifest")? {
        let key = d.str()?;
        if !seen.insert(key) {
            return Err(duplicate_key(key, "manifest"));
        }

        match key {
            KEY_VERSION => version = Some(d.u64()?),
            KEY_FILES => {
                files_at = Some(d.position());
                d.skip()?;
            }
            other => {
                return Err(ManifestError::Decoding(format!(
                    "unknown manifest key {other:?}"
                )));
            }
        }
    }

    let version = version.ok_or_else(|| missing_key(KEY_VERSION, "manifest"))?;
    if version != MANIFEST_VERSION {
        return Err(ManifestError::UnsupportedVersion(version));
    }

    if d.position() != bytes.len() {
        return Err(ManifestError::Decoding(format!(
            "{} trailing bytes after the manifest",
            bytes.len() - d.position()
        )));
    }

    let files_at = files_at.ok_or_else(|| missing_key(KEY_FILES, "manifest"))?;
    d.set_position(files_at);

    let files = read_files(&mut d)?;
    Ok(Manifest::new(Snapshot::from_files(files)?))
}

fn read_files(d: &mut Decoder<'_>) -> ManifestResult<BTreeMap<String, FileRecord>> {
    let mut files = BTreeMap::new();
    for _ in 0..map_len(d, "files")? {
        let path = d.str()?;
        if !path.starts_with(ROOT_PATH) {
            return Err(ManifestError::Decoding(format!(
                "path {path:?} is not absolute"
            )));
        }

        let record = read_record(d, path)?;
        if files.insert(path.to_string(), record).is_some() {
            return Err(duplicate_key(path, "files"));
        }
    }

    Ok(files)
}

fn read_record(d: &mut Decoder<'_>, path: &str) -> ManifestResult<FileRecord> {
    let mut seen = HashSet::new();
    let mut permissions = None;
    let mut uid = None;
    let mut gid = None;
    let mut username = None;
    let mut groupname = None;
    let mut timestamps = Timestamps::default();
    let mut xattrs = None;
    let mut kind = None;
    let mut payload = None;

    for _ in 0..map_len(d, path)? {
        let key = d.str()?;
        if !seen.insert(key) {
            return Err(duplicate_key(key, path));
        }

        match key {
            KEY_MODE => permissions = Some(read_mode(d)?),
            KEY_UID => uid = Some(d.u64()?),
            KEY_GID => gid = Some(d.u64()?),
            KEY_USERNAME => username = Some(d.str()?.to_string()),
            KEY_GROUPNAME => groupname = Some(d.str()?.to_string()),
            KEY_ATIME => timestamps.atime = Some(read_timestamp(d)?),
            KEY_BTIME => timestamps.btime = Some(read_timestamp(d)?),
            KEY_CTIME => timestamps.ctime = Some(read_timestamp(d)?),
            KEY_MTIME => timestamps.mtime = Some(read_timestamp(d)?),
            KEY_XATTR => xattrs = Some(read_xattrs(d, path)?),
            KEY_TYPE => kind = Some(d.str()?.parse::<FileKind>()?),
            other => {
                let payload_kind = other.parse::<FileKind>().map_err(|_| {
                    ManifestError::Decoding(format!("{path}: unknown key {other:?}"))
                })?;
                if payload.is_some() {
                    return Err(ManifestError::Decoding(format!(
                        "{path}: more than one payload"
                    )));
                }
                payload = Some(read_payload(d, payload_kind)?);
            }
        }
    }

    let kind = kind.ok_or_else(|| missing_key(KEY_TYPE, path))?;
    let payload = payload.ok_or_else(|| missing_key(kind.as_str(), path))?;
    if payload.kind() != kind {
        return Err(ManifestError::Decoding(format!(
            "{path}: type {kind} carries a {} payload",
            payload.kind()
        )));
    }

    Ok(FileRecord::builder()
        .permissions(permissions.ok_or_else(|| missing_key(KEY_MODE, path))?)
        .uid(uid)
        .gid(gid)
        .username(username)
        .groupname(groupname)
        .timestamps(timestamps)
        .xattrs(xattrs)
        .payload(payload)
        .build())
}

fn read_mode(d: &mut Decoder<'_>) -> ManifestResult<Permissions> {
    expect_array(d, 6, KEY_MODE)?;

    let mut classes = [Rwx::default(); 3];
    for class in &mut classes {
        expect_array(d, 3, KEY_MODE)?;
        *class = Rwx::new(d.bool()?, d.bool()?, d.bool()?);
    }

    let [user, group, other] = classes;
    Ok(Permissions {
        user,
        group,
        other,
        setuid: d.bool()?,
        setgid: d.bool()?,
        sticky: d.bool()?,
    })
}

fn read_timestamp(d: &mut Decoder<'_>) -> ManifestResult<DateTime<Utc>> {
    let text = d.str()?;
    DateTime::parse_from_rfc3339(text)
        .map(|time| time.with_timezone(&Utc))
        .map_err(|e| ManifestError::Decoding(format!("invalid timestamp {text:?}: {e}")))
}

fn read_xattrs(d: &mut Decoder<'_>, path: &str) -> ManifestResult<ExtendedAttributes> {
    let mut xattrs = ExtendedAttributes::new();
    for _ in 0..map_len(d, KEY_XATTR)? {
        let name = d.str()?.to_string();
        let value = d.str()?.to_string();
        if xattrs.contains_key(&name) {
            return Err(duplicate_key(&name, path));
        }
        xattrs.insert(name, value);
    }

    Ok(xattrs)
}

fn read_payload(d: &mut Decoder<'_>, kind: FileKind) -> ManifestResult<FilePayload> {
    let payload = match kind {
        FileKind::Directory => {
            expect_array(d, 0, kind.as_str())?;
            FilePayload::Directory
        }
        FileKind::Fifo => {
            expect_array(d, 0, kind.as_str())?;
            FilePayload::Fifo
        }
        FileKind::RegularFile => {
            expect_array(d, 2, kind.as_str())?;
            FilePayload::RegularFile {
                size: d.u64()?,
                digest: ContentDigest::try_from(d.bytes()?)?,
            }
        }
        FileKind::HardLink => {
            expect_array(d, 1, kind.as_str())?;
            FilePayload::HardLink {
                target: d.str()?.to_string(),
            }
        }
        FileKind::Symlink => {
            expect_array(d, 1, kind.as_str())?;
            FilePayload::Symlink {
                target: d.str()?.to_string(),
            }
        }
        FileKind::CharacterDevice => {
            expect_array(d, 2, kind.as_str())?;
            FilePayload::CharacterDevice {
                major: d.u64()?,
                minor: d.u64()?,
            }
        }
        FileKind::BlockDevice => {
            expect_array(d, 2, kind.as_str())?;
            FilePayload::BlockDevice {
                major: d.u64()?,
                minor: d.u64()?,
            }
        }
    };

    Ok(payload)
}

fn map_len(d: &mut Decoder<'_>, what: &str) -> ManifestResult<u64> {
    d.map()?.ok_or_else(|| {
        ManifestError::Decoding(format!("{what}: indefinite-length map"))
    })
}

fn expect_array(d: &mut Decoder<'_>, len: u64, what: &str) -> ManifestResult<()> {
    match d.array()? {
        Some(n) if n == len => Ok(()),
        Some(n) => Err(ManifestError::Decoding(format!(
            "{what}: expected {len} elements, found {n}"
        ))),
        None => Err(ManifestError::Decoding(format!(
            "{what}: indefinite-length array"
        ))),
    }
}

fn missing_key(key: &str, what: &str) -> ManifestError {
    ManifestError::Decoding(format!("{what}: missing {key:?}"))
}

fn duplicate_key(key: &str, what: &str) -> ManifestError {
    ManifestError::Decoding(format!("{what}: duplicate key {key:?}"))
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl From<decode::Error> for ManifestError {
    fn from(error: decode::Error) -> Self {
        ManifestError::Decoding(error.to_string())
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
