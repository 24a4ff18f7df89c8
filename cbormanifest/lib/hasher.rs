//! Streaming content hashing for regular files.
//!
//! File content is hashed while it is read. [`HashingReader`] passes every byte through to its
//! caller and feeds the same bytes into a BLAKE3 hasher, so an archive entry is read exactly once
//! and never buffered whole.

use std::{
    fmt::{self, Display},
    io::{self, Read},
};

use crate::{ManifestError, ManifestResult};

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

/// The width of a content digest in bytes.
pub const DIGEST_LEN: usize = blake3::OUT_LEN;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// A 256-bit BLAKE3 digest of a file's content.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentDigest([u8; DIGEST_LEN]);

/// A reader adapter that hashes every byte read through it.
pub struct HashingReader<R> {
    inner: R,
    hasher: blake3::Hasher,
    bytes_read: u64,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl ContentDigest {
    /// Creates a digest from raw bytes.
    pub fn new(bytes: [u8; DIGEST_LEN]) -> Self {
        Self(bytes)
    }

    /// Hashes an in-memory buffer in one go.
    pub fn of(data: &[u8]) -> Self {
        Self(*blake3::hash(data).as_bytes())
    }

    /// Returns the raw digest bytes.
    pub fn as_bytes(&self) -> &[u8; DIGEST_LEN] {
        &self.0
    }
}

impl<R> HashingReader<R>
where
    R: Read,
{
    /// Wraps a reader.
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            hasher: blake3::Hasher::new(),
            bytes_read: 0,
        }
    }

    /// Returns the number of bytes read so far.
    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }

    /// Consumes the reader and returns the digest of everything read, along with its length.
    pub fn finalize(self) -> (ContentDigest, u64) {
        (
            ContentDigest(*self.hasher.finalize().as_bytes()),
            self.bytes_read,
        )
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Reads `content` to the end and returns the digest of its bytes.
///
/// `expected_len` is the length declared by the entry header. A different number of bytes read is
/// treated as corruption and reported as [`ManifestError::LengthMismatch`] against `path`.
///
/// ## Examples
///
/// ```
/// use cbormanifest::hasher::{hash_content, ContentDigest};
///
/// let digest = hash_content("/hello", &b"hello"[..], 5).unwrap();
/// assert_eq!(digest, ContentDigest::of(b"hello"));
/// ```
pub fn hash_content(
    path: &str,
    content: impl Read,
    expected_len: u64,
) -> ManifestResult<ContentDigest> {
    let mut reader = HashingReader::new(content);
    io::copy(&mut reader, &mut io::sink()).map_err(|e| ManifestError::extraction(path, e))?;

    let (digest, actual) = reader.finalize();
    if actual != expected_len {
        return Err(ManifestError::LengthMismatch {
            path: path.to_string(),
            expected: expected_len,
            actual,
        });
    }

    Ok(digest)
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl<R> Read for HashingReader<R>
where
    R: Read,
{
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.hasher.update(&buf[..n]);
        self.bytes_read += n as u64;
        Ok(n)
    }
}

impl From<[u8; DIGEST_LEN]> for ContentDigest {
    fn from(bytes: [u8; DIGEST_LEN]) -> Self {
        Self(bytes)
    }
}

impl TryFrom<&[u8]> for ContentDigest {
    type Error = ManifestError;

    fn try_from(bytes: &[u8]) -> ManifestResult<Self> {
        let bytes: [u8; DIGEST_LEN] = bytes.try_into().map_err(|_| {
            ManifestError::Decoding(format!(
                "content digest must be {DIGEST_LEN} bytes, got {}",
                bytes.len()
            ))
        })?;

        Ok(Self(bytes))
    }
}

impl Display for ContentDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl fmt::Debug for ContentDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentDigest({self})")
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
