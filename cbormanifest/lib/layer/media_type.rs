use std::fmt::{self, Display};

use crate::utils::{
    DOCKER_LAYER_TAR_GZIP_MEDIA_TYPE, OCI_LAYER_TAR_GZIP_MEDIA_TYPE, OCI_LAYER_TAR_MEDIA_TYPE,
};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// The declared media type of a layer blob.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MediaType {
    /// An uncompressed tar archive.
    PlainArchive,

    /// A gzip-compressed tar archive.
    GzipArchive,

    /// Anything else, kept verbatim.
    Unknown(String),
}

/// The compression wrapped around a layer's tar stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    /// Plain tar.
    None,

    /// Gzip, possibly as several concatenated members.
    Gzip,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl MediaType {
    /// Classifies a media type string as found in an image manifest.
    ///
    /// ## Examples
    ///
    /// ```
    /// use cbormanifest::layer::{Compression, MediaType};
    ///
    /// let media_type = MediaType::parse("application/vnd.oci.image.layer.v1.tar+gzip");
    /// assert_eq!(media_type, MediaType::GzipArchive);
    /// assert_eq!(media_type.compression(), Some(Compression::Gzip));
    ///
    /// let media_type = MediaType::parse("application/vnd.oci.image.layer.v1.tar+zstd");
    /// assert_eq!(media_type.compression(), None);
    /// ```
    pub fn parse(media_type: &str) -> Self {
        match media_type {
            OCI_LAYER_TAR_MEDIA_TYPE => MediaType::PlainArchive,
            OCI_LAYER_TAR_GZIP_MEDIA_TYPE | DOCKER_LAYER_TAR_GZIP_MEDIA_TYPE => {
                MediaType::GzipArchive
            }
            other => MediaType::Unknown(other.to_string()),
        }
    }

    /// Returns the compression to undo, or `None` if the layer cannot be decoded.
    pub fn compression(&self) -> Option<Compression> {
        match self {
            MediaType::PlainArchive => Some(Compression::None),
            MediaType::GzipArchive => Some(Compression::Gzip),
            MediaType::Unknown(_) => None,
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaType::PlainArchive => f.write_str(OCI_LAYER_TAR_MEDIA_TYPE),
            MediaType::GzipArchive => f.write_str(OCI_LAYER_TAR_GZIP_MEDIA_TYPE),
            MediaType::Unknown(media_type) => f.write_str(media_type),
        }
    }
}

impl From<&str> for MediaType {
    fn from(media_type: &str) -> Self {
        MediaType::parse(media_type)
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
