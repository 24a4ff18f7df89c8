use std::{
    borrow::Cow,
    collections::BTreeMap,
    io::{BufReader, Read},
};

use chrono::{DateTime, Utc};
use flate2::read::MultiGzDecoder;
use tar::{EntryType, Header};
use typed_builder::TypedBuilder;

use crate::{ManifestError, ManifestResult};

use super::Compression;

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

const PAX_UID: &str = "uid";
const PAX_GID: &str = "gid";
const PAX_UNAME: &str = "uname";
const PAX_GNAME: &str = "gname";
const PAX_MTIME: &str = "mtime";
const PAX_ATIME: &str = "atime";
const PAX_CTIME: &str = "ctime";
const PAX_BTIME: &str = "LIBARCHIVE.creationtime";

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Decodes one layer blob into a forward-only sequence of archive entries.
///
/// ## Examples
///
/// ```
/// use cbormanifest::layer::{Compression, LayerDecoder};
///
/// let mut builder = tar::Builder::new(Vec::new());
/// let mut header = tar::Header::new_gnu();
/// header.set_size(3);
/// header.set_mode(0o644);
/// builder.append_data(&mut header, "etc/motd", &b"hi\n"[..]).unwrap();
/// let layer = builder.into_inner().unwrap();
///
/// let mut decoder = LayerDecoder::new(&layer[..], Compression::None);
/// let paths = decoder
///     .entries()
///     .unwrap()
///     .map(|entry| entry.map(|e| e.header().path.clone()))
///     .collect::<Result<Vec<_>, _>>()
///     .unwrap();
///
/// assert_eq!(paths, vec!["etc/motd".to_string()]);
/// ```
pub struct LayerDecoder<'r> {
    archive: tar::Archive<Box<dyn Read + 'r>>,
}

/// The entries of a layer, in archive order.
pub struct LayerEntries<'a, 'r>
where
    'r: 'a,
{
    entries: tar::Entries<'a, Box<dyn Read + 'r>>,
    position: usize,
}

/// One archive entry: its decoded header plus a reader over its content.
pub struct RawEntry<'a, R>
where
    R: Read + 'a,
{
    header: RawHeader,
    content: tar::Entry<'a, R>,
}

/// The header fields of an archive entry, with PAX and GNU extensions already applied.
///
/// Timestamps that the archive did not carry are `None`.
#[derive(Debug, Clone, PartialEq, Eq, TypedBuilder)]
pub struct RawHeader {
    /// The entry name as stored in the archive.
    #[builder(setter(into))]
    pub path: String,

    /// The raw type flag.
    pub entry_type: EntryType,

    /// The raw mode bits.
    #[builder(default = 0o644)]
    pub mode: u32,

    /// Numeric owner id.
    #[builder(default)]
    pub uid: u64,

    /// Numeric group id.
    #[builder(default)]
    pub gid: u64,

    /// Owner name, empty when unset.
    #[builder(default, setter(into))]
    pub username: String,

    /// Group name, empty when unset.
    #[builder(default, setter(into))]
    pub groupname: String,

    /// Modification time.
    #[builder(default)]
    pub mtime: Option<DateTime<Utc>>,

    /// Access time.
    #[builder(default)]
    pub atime: Option<DateTime<Utc>>,

    /// Status change time.
    #[builder(default)]
    pub ctime: Option<DateTime<Utc>>,

    /// Creation time.
    #[builder(default)]
    pub btime: Option<DateTime<Utc>>,

    /// Link target for hard and symbolic links.
    #[builder(default)]
    pub link_name: Option<String>,

    /// Major device number for device nodes.
    #[builder(default)]
    pub device_major: u32,

    /// Minor device number for device nodes.
    #[builder(default)]
    pub device_minor: u32,

    /// Content length declared by the header.
    #[builder(default)]
    pub size: u64,

    /// Every PAX record of the entry.
    #[builder(default)]
    pub pax_records: BTreeMap<String, String>,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl<'r> LayerDecoder<'r> {
    /// Wraps a layer blob, undoing `compression` before tar parsing.
    pub fn new(reader: impl Read + 'r, compression: Compression) -> Self {
        let reader: Box<dyn Read + 'r> = match compression {
            Compression::None => Box::new(reader),
            Compression::Gzip => Box::new(MultiGzDecoder::new(BufReader::new(reader))),
        };

        Self {
            archive: tar::Archive::new(reader),
        }
    }

    /// Starts iterating over the entries of the layer.
    pub fn entries(&mut self) -> ManifestResult<LayerEntries<'_, 'r>> {
        let entries = self
            .archive
            .entries()
            .map_err(|e| ManifestError::extraction("start of archive", e))?;

        Ok(LayerEntries {
            entries,
            position: 0,
        })
    }
}

impl<'a, R> RawEntry<'a, R>
where
    R: Read + 'a,
{
    fn from_tar(mut entry: tar::Entry<'a, R>) -> ManifestResult<Self> {
        let path = String::from_utf8_lossy(&entry.path_bytes()).into_owned();
        let pax_records = read_pax_records(&mut entry)
            .map_err(|e| ManifestError::extraction(path.as_str(), e))?;

        let header = RawHeader::from_tar(&entry, path, pax_records)?;
        Ok(Self {
            header,
            content: entry,
        })
    }

    /// Returns the decoded header.
    pub fn header(&self) -> &RawHeader {
        &self.header
    }

    /// Splits the entry into its header and its content reader.
    pub fn into_parts(self) -> (RawHeader, tar::Entry<'a, R>) {
        (self.header, self.content)
    }
}

impl RawHeader {
    fn from_tar<R: Read>(
        entry: &tar::Entry<'_, R>,
        path: String,
        pax_records: BTreeMap<String, String>,
    ) -> ManifestResult<Self> {
        let header = entry.header();
        let context = |e| ManifestError::extraction(path.as_str(), e);

        let old = header.as_old();
        let overridden = |key: &str| pax_records.contains_key(key);

        let entry_type = header.entry_type();
        let mode = numeric_field(&old.mode, header.mode(), false).map_err(context)?;
        let mtime = numeric_field(&old.mtime, header.mtime(), overridden(PAX_MTIME))
            .map_err(context)?;
        let (atime, ctime) = gnu_times(header).map_err(context)?;

        let (device_major, device_minor) = match entry_type {
            EntryType::Char | EntryType::Block => {
                let (major, minor) = device_fields(header);
                (
                    numeric_field(major, header.device_major(), false)
                        .map_err(context)?
                        .unwrap_or(0),
                    numeric_field(minor, header.device_minor(), false)
                        .map_err(context)?
                        .unwrap_or(0),
                )
            }
            _ => (0, 0),
        };

        let mut raw = RawHeader {
            entry_type,
            mode,
            uid: numeric_field(&old.uid, header.uid(), overridden(PAX_UID)).map_err(context)?,
            gid: numeric_field(&old.gid, header.gid(), overridden(PAX_GID)).map_err(context)?,
            username: lossy(header.username_bytes()),
            groupname: lossy(header.groupname_bytes()),
            mtime: unix_time(mtime),
            atime,
            ctime,
            btime: None,
            link_name: entry
                .link_name_bytes()
                .map(|name| String::from_utf8_lossy(&name).into_owned()),
            device_major,
            device_minor,
            size: entry.size(),
            pax_records: BTreeMap::new(),
            path,
        };

        raw.apply_pax_overrides(&pax_records);
        raw.pax_records = pax_records;
        Ok(raw)
    }

    fn apply_pax_overrides(&mut self, records: &BTreeMap<String, String>) {
        for (key, value) in records {
            match key.as_str() {
                PAX_UID => self.uid = value.parse().unwrap_or(self.uid),
                PAX_GID => self.gid = value.parse().unwrap_or(self.gid),
                PAX_UNAME | PAX_GNAME if value.is_empty() => {}
                PAX_UNAME => self.username = value.clone(),
                PAX_GNAME => self.groupname = value.clone(),
                PAX_MTIME => self.mtime = parse_pax_time(value).or(self.mtime),
                PAX_ATIME => self.atime = parse_pax_time(value).or(self.atime),
                PAX_CTIME => self.ctime = parse_pax_time(value).or(self.ctime),
                PAX_BTIME => self.btime = parse_pax_time(value).or(self.btime),
                _ => {}
            }
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

fn read_pax_records<R: Read>(
    entry: &mut tar::Entry<'_, R>,
) -> std::io::Result<BTreeMap<String, String>> {
    let mut records = BTreeMap::new();
    if let Some(extensions) = entry.pax_extensions()? {
        for extension in extensions {
            let extension = extension?;
            records.insert(
                String::from_utf8_lossy(extension.key_bytes()).into_owned(),
                String::from_utf8_lossy(extension.value_bytes()).into_owned(),
            );
        }
    }

    Ok(records)
}

/// Access and change times only exist in GNU headers, and only when the fields are filled in.
fn gnu_times(
    header: &Header,
) -> std::io::Result<(Option<DateTime<Utc>>, Option<DateTime<Utc>>)> {
    let Some(gnu) = header.as_gnu() else {
        return Ok((None, None));
    };

    let atime = match gnu.atime[0] {
        0 => None,
        _ => unix_time(gnu.atime()?),
    };
    let ctime = match gnu.ctime[0] {
        0 => None,
        _ => unix_time(gnu.ctime()?),
    };

    Ok((atime, ctime))
}

/// Reads a numeric header field.
///
/// A field of only NULs and spaces reads as zero. A malformed field is ignored when a PAX record
/// replaces its value.
fn numeric_field<T: Default>(
    raw: &[u8],
    value: std::io::Result<T>,
    overridden: bool,
) -> std::io::Result<T> {
    match value {
        Ok(value) => Ok(value),
        Err(_) if overridden || raw.iter().all(|b| matches!(b, 0 | b' ')) => Ok(T::default()),
        Err(e) => Err(e),
    }
}

fn device_fields(header: &Header) -> (&[u8], &[u8]) {
    if let Some(ustar) = header.as_ustar() {
        return (&ustar.dev_major, &ustar.dev_minor);
    }

    if let Some(gnu) = header.as_gnu() {
        return (&gnu.dev_major, &gnu.dev_minor);
    }

    (&[], &[])
}

fn unix_time(secs: u64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(i64::try_from(secs).ok()?, 0)
}

fn lossy(bytes: Option<&[u8]>) -> String {
    bytes
        .map(String::from_utf8_lossy)
        .map(Cow::into_owned)
        .unwrap_or_default()
}

/// Parses a PAX time record such as `1700000000.123456789` or `-1.5`.
///
/// Fraction digits past nanoseconds are dropped. Returns `None` for anything malformed.
pub fn parse_pax_time(value: &str) -> Option<DateTime<Utc>> {
    let (whole, fraction) = value.split_once('.').unwrap_or((value, ""));
    if whole.is_empty() || !fraction.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let negative = whole.starts_with('-');
    let mut secs: i64 = whole.parse().ok()?;

    let digits = &fraction[..fraction.len().min(9)];
    let mut nanos: u32 = match digits {
        "" => 0,
        digits => format!("{digits:0<9}").parse().ok()?,
    };

    if negative && nanos > 0 {
        secs -= 1;
        nanos = 1_000_000_000 - nanos;
    }

    DateTime::from_timestamp(secs, nanos)
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl<'a, 'r> Iterator for LayerEntries<'a, 'r>
where
    'r: 'a,
{
    type Item = ManifestResult<RawEntry<'a, Box<dyn Read + 'r>>>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let entry = match self.entries.next()? {
                Ok(entry) => entry,
                Err(e) => {
                    let context = format!("archive entry #{}", self.position);
                    return Some(Err(ManifestError::extraction(context, e)));
                }
            };
            self.position += 1;

            // Global PAX headers describe the archive, not a path.
            if entry.header().entry_type() == EntryType::XGlobalHeader {
                tracing::debug!("skipping global pax header");
                continue;
            }

            return Some(RawEntry::from_tar(entry));
        }
    }
}

impl<'a, R> Read for RawEntry<'a, R>
where
    R: Read + 'a,
{
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.content.read(buf)
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::io::Write;

    use flate2::write::GzEncoder;
    use tar::Builder;

    use super::*;

    fn tar_with(entries: &[(&str, EntryType, &[u8])]) -> anyhow::Result<Vec<u8>> {
        let mut builder = Builder::new(Vec::new());
        for (path, entry_type, data) in entries {
            let mut header = Header::new_gnu();
            header.set_entry_type(*entry_type);
            header.set_size(data.len() as u64);
            header.set_mode(0o640);
            header.set_uid(1000);
            header.set_gid(100);
            header.set_mtime(1_700_000_000);
            builder.append_data(&mut header, path, *data)?;
        }

        Ok(builder.into_inner()?)
    }

    fn collect_headers(mut decoder: LayerDecoder<'_>) -> ManifestResult<Vec<RawHeader>> {
        decoder
            .entries()?
            .map(|entry| entry.map(|e| e.header().clone()))
            .collect()
    }

    #[test]
    fn test_layer_decoder_plain_archive() -> anyhow::Result<()> {
        let layer = tar_with(&[
            ("etc/", EntryType::Directory, b""),
            ("etc/hostname", EntryType::Regular, b"box\n"),
        ])?;

        let headers = collect_headers(LayerDecoder::new(&layer[..], Compression::None))?;
        assert_eq!(headers.len(), 2);
        assert_eq!(headers[0].path, "etc/");
        assert_eq!(headers[0].entry_type, EntryType::Directory);
        assert_eq!(headers[1].path, "etc/hostname");
        assert_eq!(headers[1].size, 4);
        assert_eq!(headers[1].mode, 0o640);
        assert_eq!(headers[1].uid, 1000);
        assert_eq!(headers[1].gid, 100);
        assert_eq!(headers[1].mtime, DateTime::from_timestamp(1_700_000_000, 0));
        assert_eq!(headers[1].atime, None);
        assert!(headers[1].pax_records.is_empty());

        Ok(())
    }

    #[test]
    fn test_layer_decoder_gzip_streams_content() -> anyhow::Result<()> {
        let layer = tar_with(&[("data.bin", EntryType::Regular, b"0123456789")])?;
        let mut encoder = GzEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(&layer)?;
        let compressed = encoder.finish()?;

        let mut decoder = LayerDecoder::new(&compressed[..], Compression::Gzip);
        let mut entries = decoder.entries()?;
        let mut entry = entries.next().expect("one entry")?;

        let mut content = String::new();
        entry.read_to_string(&mut content)?;
        assert_eq!(content, "0123456789");
        assert!(entries.next().is_none());

        Ok(())
    }

    #[test]
    fn test_layer_decoder_empty_stream_has_no_entries() -> anyhow::Result<()> {
        let headers = collect_headers(LayerDecoder::new(std::io::empty(), Compression::None))?;
        assert!(headers.is_empty());

        Ok(())
    }

    #[test]
    fn test_layer_decoder_corrupt_gzip_is_extraction_error() -> anyhow::Result<()> {
        let garbage = b"definitely not gzip data".to_vec();
        let result = collect_headers(LayerDecoder::new(&garbage[..], Compression::Gzip));
        assert!(matches!(result, Err(ManifestError::Extraction { .. })));

        Ok(())
    }

    #[test]
    fn test_layer_decoder_corrupt_header_is_extraction_error() -> anyhow::Result<()> {
        let mut layer = tar_with(&[("a", EntryType::Regular, b"abc")])?;
        // Break the header checksum.
        layer[148] = b'9';
        layer[149] = b'9';

        let result = collect_headers(LayerDecoder::new(&layer[..], Compression::None));
        assert!(matches!(result, Err(ManifestError::Extraction { .. })));

        Ok(())
    }

    #[test]
    fn test_layer_decoder_applies_pax_records() -> anyhow::Result<()> {
        let mut builder = Builder::new(Vec::new());
        builder.append_pax_extensions([
            ("mtime", &b"1700000000.5"[..]),
            ("atime", &b"1700000001.000000001"[..]),
            ("uname", &b"alice"[..]),
            ("SCHILY.xattr.user.note", &b"hello"[..]),
        ])?;
        let mut header = Header::new_ustar();
        header.set_entry_type(EntryType::Regular);
        header.set_size(0);
        header.set_mtime(1);
        builder.append_data(&mut header, "note.txt", std::io::empty())?;
        let layer = builder.into_inner()?;

        let headers = collect_headers(LayerDecoder::new(&layer[..], Compression::None))?;
        assert_eq!(headers.len(), 1);

        let header = &headers[0];
        assert_eq!(header.path, "note.txt");
        assert_eq!(header.mtime, DateTime::from_timestamp(1_700_000_000, 500_000_000));
        assert_eq!(header.atime, DateTime::from_timestamp(1_700_000_001, 1));
        assert_eq!(header.username, "alice");
        assert_eq!(
            header.pax_records.get("SCHILY.xattr.user.note").map(String::as_str),
            Some("hello")
        );
        assert_eq!(header.pax_records.len(), 4);

        Ok(())
    }

    #[test]
    fn test_layer_decoder_reads_blank_numeric_fields_as_zero() -> anyhow::Result<()> {
        let mut builder = Builder::new(Vec::new());

        // Only the type and size are filled in. Mode, ids, mtime and device fields stay NUL.
        let mut header = Header::new_ustar();
        header.set_entry_type(EntryType::Directory);
        header.set_size(0);
        builder.append_data(&mut header, "etc", std::io::empty())?;

        let mut header = Header::new_ustar();
        header.set_entry_type(EntryType::Char);
        header.set_size(0);
        builder.append_data(&mut header, "dev/console", std::io::empty())?;

        let layer = builder.into_inner()?;
        let headers = collect_headers(LayerDecoder::new(&layer[..], Compression::None))?;

        assert_eq!(headers[0].mode, 0);
        assert_eq!(headers[0].uid, 0);
        assert_eq!(headers[0].gid, 0);
        assert_eq!(headers[0].mtime, DateTime::from_timestamp(0, 0));
        assert_eq!(headers[1].device_major, 0);
        assert_eq!(headers[1].device_minor, 0);

        Ok(())
    }

    #[test]
    fn test_layer_decoder_pax_replaces_unreadable_numeric_fields() -> anyhow::Result<()> {
        let mut builder = Builder::new(Vec::new());
        builder.append_pax_extensions([("uid", &b"1000"[..]), ("mtime", &b"1700000000"[..])])?;
        let mut header = Header::new_ustar();
        header.set_entry_type(EntryType::Directory);
        header.set_size(0);
        header.as_old_mut().uid = *b"garbage\0";
        header.as_old_mut().mtime = *b"not a time\0\0";
        builder.append_data(&mut header, "home/user", std::io::empty())?;
        let layer = builder.into_inner()?;

        let headers = collect_headers(LayerDecoder::new(&layer[..], Compression::None))?;
        assert_eq!(headers[0].uid, 1000);
        assert_eq!(headers[0].mtime, DateTime::from_timestamp(1_700_000_000, 0));

        Ok(())
    }

    #[test]
    fn test_layer_decoder_rejects_unreadable_numeric_field() -> anyhow::Result<()> {
        let mut builder = Builder::new(Vec::new());
        let mut header = Header::new_ustar();
        header.set_entry_type(EntryType::Directory);
        header.set_size(0);
        header.as_old_mut().gid = *b"garbage\0";
        builder.append_data(&mut header, "srv", std::io::empty())?;
        let layer = builder.into_inner()?;

        let result = collect_headers(LayerDecoder::new(&layer[..], Compression::None));
        assert!(matches!(
            result,
            Err(ManifestError::Extraction { context, .. }) if context == "srv"
        ));

        Ok(())
    }

    #[test]
    fn test_layer_decoder_ignores_empty_pax_names() -> anyhow::Result<()> {
        let mut builder = Builder::new(Vec::new());
        builder.append_pax_extensions([("uname", &b""[..]), ("gname", &b"staff"[..])])?;
        let mut header = Header::new_ustar();
        header.set_entry_type(EntryType::Regular);
        header.set_size(0);
        header.set_username("root")?;
        header.set_groupname("wheel")?;
        builder.append_data(&mut header, "etc/profile", std::io::empty())?;
        let layer = builder.into_inner()?;

        let headers = collect_headers(LayerDecoder::new(&layer[..], Compression::None))?;
        assert_eq!(headers[0].username, "root");
        assert_eq!(headers[0].groupname, "staff");

        Ok(())
    }

    #[test]
    fn test_layer_decoder_reads_device_numbers() -> anyhow::Result<()> {
        let mut builder = Builder::new(Vec::new());
        let mut header = Header::new_gnu();
        header.set_entry_type(EntryType::Char);
        header.set_size(0);
        header.set_device_major(1)?;
        header.set_device_minor(3)?;
        builder.append_data(&mut header, "dev/null", std::io::empty())?;
        let layer = builder.into_inner()?;

        let headers = collect_headers(LayerDecoder::new(&layer[..], Compression::None))?;
        assert_eq!(headers[0].device_major, 1);
        assert_eq!(headers[0].device_minor, 3);

        Ok(())
    }

    #[test]
    fn test_parse_pax_time() {
        assert_eq!(parse_pax_time("1700000000"), DateTime::from_timestamp(1_700_000_000, 0));
        assert_eq!(
            parse_pax_time("1700000000.123456789999"),
            DateTime::from_timestamp(1_700_000_000, 123_456_789)
        );
        assert_eq!(parse_pax_time("1.5"), DateTime::from_timestamp(1, 500_000_000));
        assert_eq!(parse_pax_time("-1.25"), DateTime::from_timestamp(-2, 750_000_000));
        assert_eq!(parse_pax_time(""), None);
        assert_eq!(parse_pax_time("abc"), None);
        assert_eq!(parse_pax_time("1.x"), None);
    }
}
