use std::io;

use thiserror::Error;

use crate::layer::MediaType;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// The result of a manifest-related operation.
pub type ManifestResult<T> = Result<T, ManifestError>;

/// An error that occurred while building, encoding or decoding a manifest.
///
/// Every variant is fatal for the conversion that produced it. Nothing retries internally and no
/// partial manifest is ever written.
#[derive(pretty_error_debug::Debug, Error)]
pub enum ManifestError {
    /// The layer source could not supply a layer list or a layer blob.
    #[error("source access error: {message}")]
    SourceAccess {
        /// What the source was trying to do.
        message: String,

        /// The underlying error, if any.
        #[source]
        source: Option<io::Error>,
    },

    /// The compression or archive framing of a layer is malformed.
    #[error("extraction error at {context}: {source}")]
    Extraction {
        /// The entry path or archive position where extraction failed.
        context: String,

        /// The underlying error.
        #[source]
        source: io::Error,
    },

    /// A regular file's content length differs from the length its header declared.
    #[error("length mismatch for {path}: header declared {expected} bytes, read {actual}")]
    LengthMismatch {
        /// The path of the entry.
        path: String,

        /// The length declared by the entry header.
        expected: u64,

        /// The number of bytes actually read.
        actual: u64,
    },

    /// The archive entry kind cannot be represented in a manifest.
    #[error("unsupported entry type {entry_type:?} for {path}")]
    UnsupportedEntryType {
        /// The path of the entry.
        path: String,

        /// The raw type flag of the entry.
        entry_type: tar::EntryType,
    },

    /// A deletion marker was found in a layer.
    #[error("whiteout entries are not supported: {path}")]
    UnsupportedWhiteout {
        /// The path the marker would remove.
        path: String,
    },

    /// A layer has a media type the strict media-type policy does not accept.
    #[error("unsupported layer media type: {0}")]
    UnsupportedMediaType(String),

    /// A failure wrapped with the layer it occurred in.
    #[error("layer {index} ({media_type}): {source}")]
    InLayer {
        /// The position of the layer in the image, starting at zero.
        index: usize,

        /// The declared media type of the layer.
        media_type: MediaType,

        /// The failure inside the layer.
        #[source]
        source: Box<ManifestError>,
    },

    /// The manifest could not be encoded or written out.
    #[error("encoding error: {0}")]
    Encoding(String),

    /// The bytes are not a well-formed manifest.
    #[error("decoding error: {0}")]
    Decoding(String),

    /// The outermost CBOR tag is not the manifest tag.
    #[error("not a manifest: unexpected CBOR tag {0}")]
    UnknownTag(u64),

    /// The manifest schema version is not one this build understands.
    #[error("unsupported manifest version {0}")]
    UnsupportedVersion(u64),

    /// The configuration could not be loaded.
    #[error("invalid config: {0}")]
    InvalidConfig(String),
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl ManifestError {
    /// Creates a source access error without an underlying I/O error.
    pub fn source_access(message: impl Into<String>) -> ManifestError {
        ManifestError::SourceAccess {
            message: message.into(),
            source: None,
        }
    }

    /// Creates an extraction error for the given context.
    pub fn extraction(context: impl Into<String>, source: io::Error) -> ManifestError {
        ManifestError::Extraction {
            context: context.into(),
            source,
        }
    }

    /// Returns the innermost error, looking through any layer context.
    pub fn root_cause(&self) -> &ManifestError {
        match self {
            ManifestError::InLayer { source, .. } => source.root_cause(),
            error => error,
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
