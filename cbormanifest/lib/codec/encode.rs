use std::{convert::Infallible, io::Write};

use chrono::{DateTime, SecondsFormat, Utc};
use minicbor::{data::Tag, encode, Encoder};

use crate::{
    merge::Snapshot,
    record::{ExtendedAttributes, FilePayload, FileRecord, Permissions},
    ManifestError, ManifestResult,
};

use super::{
    Manifest, KEY_ATIME, KEY_BTIME, KEY_CTIME, KEY_FILES, KEY_GID, KEY_GROUPNAME, KEY_MODE,
    KEY_MTIME, KEY_TYPE, KEY_UID, KEY_USERNAME, KEY_VERSION, KEY_XATTR, MANIFEST_TAG,
};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

type Buffer = Encoder<Vec<u8>>;

type EncodeError = encode::Error<Infallible>;

/// A map whose entries are encoded up front and written sorted by their encoded key bytes.
///
/// Sorting the encoded keys bytewise puts shorter keys first and breaks ties lexically, which is
/// the canonical CBOR map order.
struct CanonicalMap {
    entries: Vec<(Vec<u8>, Vec<u8>)>,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl CanonicalMap {
    fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    fn insert<F>(&mut self, key: &str, value: F) -> Result<(), EncodeError>
    where
        F: FnOnce(&mut Buffer) -> Result<&mut Buffer, EncodeError>,
    {
        let mut key_buffer = Encoder::new(Vec::new());
        key_buffer.str(key)?;

        let mut value_buffer = Encoder::new(Vec::new());
        value(&mut value_buffer)?;

        self.entries
            .push((key_buffer.into_writer(), value_buffer.into_writer()));
        Ok(())
    }

    fn write_to(mut self, e: &mut Buffer) -> Result<&mut Buffer, EncodeError> {
        self.entries.sort_by(|(a, _), (b, _)| a.cmp(b));

        e.map(self.entries.len() as u64)?;
        for (key, value) in self.entries {
            e.writer_mut().extend_from_slice(&key);
            e.writer_mut().extend_from_slice(&value);
        }

        Ok(e)
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Encodes a manifest into its canonical bytes.
///
/// Encoding the same manifest always produces the same bytes.
///
/// ## Examples
///
/// ```
/// use cbormanifest::{codec::{encode_manifest, Manifest}, merge::Snapshot};
///
/// let bytes = encode_manifest(&Manifest::new(Snapshot::new())).unwrap();
///
/// // tag 1868786040, written as a four-byte argument
/// assert_eq!(&bytes[..5], &[0xda, 0x6f, 0x63, 0x69, 0x78]);
/// ```
pub fn encode_manifest(manifest: &Manifest) -> ManifestResult<Vec<u8>> {
    let mut e = Encoder::new(Vec::new());
    e.tag(Tag::new(MANIFEST_TAG))?;

    let mut body = CanonicalMap::new();
    body.insert(KEY_FILES, |e| write_files(e, manifest.files()))?;
    body.insert(KEY_VERSION, |e| e.u64(manifest.version()))?;
    body.write_to(&mut e)?;

    Ok(e.into_writer())
}

/// Encodes a manifest and writes it to `writer` in one piece.
pub fn write_manifest(manifest: &Manifest, mut writer: impl Write) -> ManifestResult<()> {
    let bytes = encode_manifest(manifest)?;
    writer
        .write_all(&bytes)
        .and_then(|()| writer.flush())
        .map_err(|e| ManifestError::Encoding(format!("cannot write manifest: {e}")))
}

/// Formats a timestamp the way manifests store it: RFC 3339 in UTC with nine fraction digits.
///
/// ## Examples
///
/// ```
/// use chrono::DateTime;
/// use cbormanifest::codec::format_timestamp;
///
/// let time = DateTime::from_timestamp(1_700_000_000, 5).unwrap();
/// assert_eq!(format_timestamp(&time), "2023-11-14T22:13:20.000000005Z");
/// ```
pub fn format_timestamp(time: &DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn write_files<'e>(e: &'e mut Buffer, files: &Snapshot) -> Result<&'e mut Buffer, EncodeError> {
    let mut map = CanonicalMap::new();
    for (path, record) in files {
        map.insert(path, |e| write_record(e, record))?;
    }

    map.write_to(e)
}

fn write_record<'e>(
    e: &'e mut Buffer,
    record: &FileRecord,
) -> Result<&'e mut Buffer, EncodeError> {
    let mut map = CanonicalMap::new();
    map.insert(KEY_MODE, |e| write_mode(e, record.get_permissions()))?;

    if let Some(uid) = record.get_uid() {
        map.insert(KEY_UID, |e| e.u64(uid))?;
    }
    if let Some(gid) = record.get_gid() {
        map.insert(KEY_GID, |e| e.u64(gid))?;
    }
    if let Some(username) = record.get_username() {
        map.insert(KEY_USERNAME, |e| e.str(username))?;
    }
    if let Some(groupname) = record.get_groupname() {
        map.insert(KEY_GROUPNAME, |e| e.str(groupname))?;
    }

    let timestamps = record.get_timestamps();
    for (key, time) in [
        (KEY_ATIME, timestamps.atime),
        (KEY_BTIME, timestamps.btime),
        (KEY_CTIME, timestamps.ctime),
        (KEY_MTIME, timestamps.mtime),
    ] {
        if let Some(time) = time {
            map.insert(key, |e| e.str(&format_timestamp(&time)))?;
        }
    }

    if let Some(xattrs) = record.get_xattrs() {
        map.insert(KEY_XATTR, |e| write_xattrs(e, xattrs))?;
    }

    let kind = record.kind();
    map.insert(KEY_TYPE, |e| e.str(kind.as_str()))?;
    map.insert(kind.as_str(), |e| write_payload(e, record.get_payload()))?;

    map.write_to(e)
}

fn write_mode(e: &mut Buffer, permissions: Permissions) -> Result<&mut Buffer, EncodeError> {
    e.array(6)?;
    for class in [permissions.user, permissions.group, permissions.other] {
        e.array(3)?
            .bool(class.read)?
            .bool(class.write)?
            .bool(class.execute)?;
    }

    e.bool(permissions.setuid)?
        .bool(permissions.setgid)?
        .bool(permissions.sticky)
}

fn write_xattrs<'e>(
    e: &'e mut Buffer,
    xattrs: &ExtendedAttributes,
) -> Result<&'e mut Buffer, EncodeError> {
    let mut map = CanonicalMap::new();
    for (name, value) in xattrs {
        map.insert(name, |e| e.str(value))?;
    }

    map.write_to(e)
}

fn write_payload<'e>(
    e: &'e mut Buffer,
    payload: &FilePayload,
) -> Result<&'e mut Buffer, EncodeError> {
    match payload {
        FilePayload::Directory | FilePayload::Fifo => e.array(0),
        FilePayload::RegularFile { size, digest } => {
            e.array(2)?.u64(*size)?.bytes(digest.as_bytes())
        }
        FilePayload::HardLink { target } | FilePayload::Symlink { target } => {
            e.array(1)?.str(target)
        }
        FilePayload::CharacterDevice { major, minor }
        | FilePayload::BlockDevice { major, minor } => e.array(2)?.u64(*major)?.u64(*minor),
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl From<EncodeError> for ManifestError {
    fn from(error: EncodeError) -> Self {
        ManifestError::Encoding(error.to_string())
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use crate::{hasher::ContentDigest, record::Timestamps};

    use super::*;

    fn sample_manifest() -> Manifest {
        let mut files = Snapshot::new();
        files.upsert(
            "/usr/bin/env",
            FileRecord::builder()
                .permissions(Permissions::from_mode(0o4755))
                .uid(Some(1000))
                .username(Some("builder".to_string()))
                .timestamps(Timestamps {
                    mtime: DateTime::from_timestamp(1_700_000_000, 0),
                    ..Default::default()
                })
                .xattrs(Some(BTreeMap::from([
                    ("user.zz".to_string(), "last".to_string()),
                    ("user.a".to_string(), "first".to_string()),
                ])))
                .payload(FilePayload::RegularFile {
                    size: 3,
                    digest: ContentDigest::of(b"env"),
                })
                .build(),
        );
        files.upsert(
            "/dev/null",
            FileRecord::builder()
                .payload(FilePayload::CharacterDevice { major: 1, minor: 3 })
                .build(),
        );

        Manifest::new(files)
    }

    #[test]
    fn test_encode_root_only_manifest() -> anyhow::Result<()> {
        let bytes = encode_manifest(&Manifest::new(Snapshot::new()))?;
        let expected = concat!(
            "da6f636978",               // tag 1868786040
            "a2",                       // body map, 2 entries
            "6566696c6573",             // "files"
            "a1",                       // 1 file
            "612f",                     // "/"
            "a5",                       // record map, 5 entries
            "63676964", "00",           // "gid": 0
            "63756964", "00",           // "uid": 0
            "646d6f6465", "86",         // "mode": [
            "83f5f5f5", "83f5f5f5", "83f5f5f5", "f4f4f4",
            "6474797065",               // "type"
            "696469726563746f7279",     // "directory"
            "696469726563746f7279",     // "directory"
            "80",                       // []
            "6776657273696f6e", "00",   // "version": 0
        );

        assert_eq!(hex::encode(bytes), expected);

        Ok(())
    }

    #[test]
    fn test_encode_is_idempotent() -> anyhow::Result<()> {
        let manifest = sample_manifest();
        assert_eq!(encode_manifest(&manifest)?, encode_manifest(&manifest)?);
        assert_eq!(manifest.to_vec()?, encode_manifest(&manifest.clone())?);

        Ok(())
    }

    #[test]
    fn test_canonical_map_orders_by_encoded_key() -> anyhow::Result<()> {
        let mut map = CanonicalMap::new();
        for key in ["mtime", "uid", "regularfile", "gid", "mode", "xattr"] {
            map.insert(key, |e| e.u8(0))?;
        }

        let mut e = Encoder::new(Vec::new());
        map.write_to(&mut e)?;

        let mut d = minicbor::Decoder::new(e.writer());
        let len = d.map()?;
        let mut keys = Vec::new();
        for _ in 0..len.unwrap_or(0) {
            keys.push(d.str()?.to_string());
            d.skip()?;
        }

        assert_eq!(keys, ["gid", "uid", "mode", "mtime", "xattr", "regularfile"]);

        Ok(())
    }

    #[test]
    fn test_encode_omits_absent_fields() -> anyhow::Result<()> {
        let mut files = Snapshot::new();
        files.upsert(
            "/tmp",
            FileRecord::builder().payload(FilePayload::Fifo).build(),
        );
        let bytes = encode_manifest(&Manifest::new(files))?;

        // "/tmp" record: fifo, mode, type
        let needle = hex::decode("642f746d70a3646669666f80646d6f6465")?;
        assert!(bytes.windows(needle.len()).any(|window| window == needle));
        assert!(!bytes.windows(5).any(|window| window == b"mtime"));

        Ok(())
    }

    #[test]
    fn test_write_manifest_reports_write_failures() {
        struct Broken;

        impl Write for Broken {
            fn write(&mut self, _: &[u8]) -> std::io::Result<usize> {
                Err(std::io::Error::other("disk full"))
            }

            fn flush(&mut self) -> std::io::Result<()> {
                Ok(())
            }
        }

        let result = write_manifest(&sample_manifest(), Broken);
        assert!(matches!(
            result,
            Err(ManifestError::Encoding(message)) if message.contains("disk full")
        ));
    }
}
