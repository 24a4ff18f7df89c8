use std::{
    fs::File,
    io::{BufReader, Read},
    path::{Path, PathBuf},
};

use getset::Getters;
use oci_spec::image::{Descriptor, Digest, ImageIndex, ImageManifest};
use serde::de::DeserializeOwned;

use crate::{
    layer::MediaType,
    source::{LayerDescriptor, LayerSource},
    utils::{OCI_BLOBS_SUBDIR, OCI_INDEX_FILENAME, OCI_LAYOUT_FILENAME, OCI_REF_NAME_ANNOTATION},
    ManifestError, ManifestResult,
};

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

/// Optional transport prefix accepted in front of a layout reference.
const OCI_TRANSPORT_PREFIX: &str = "oci:";

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// An image stored in an OCI image layout directory.
///
/// The directory is expected to look like this:
///
/// ```text
/// <dir>/
/// ├── oci-layout
/// ├── index.json
/// └── blobs/
///     └── sha256/
///         ├── <manifest digest>
///         └── <layer digests...>
/// ```
///
/// One manifest of the index is selected when the source is opened. Layer blobs are opened lazily
/// and read straight from disk.
#[derive(Debug, Clone, Getters)]
#[getset(get = "pub with_prefix")]
pub struct OciLayoutSource {
    /// The layout directory.
    dir: PathBuf,

    /// The selected image manifest.
    manifest: ImageManifest,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl OciLayoutSource {
    /// Opens an image from a reference of the form `DIR[:REF]`.
    ///
    /// `REF` is matched against the `org.opencontainers.image.ref.name` annotation of the
    /// manifests in the index. Without it, the index must contain exactly one manifest. An
    /// `oci:` prefix is accepted and ignored.
    pub fn open(reference: &str) -> ManifestResult<Self> {
        let (dir, name) = split_reference(reference);
        Self::open_dir(dir, name)
    }

    /// Opens the image named `name` from the layout at `dir`.
    pub fn open_dir(dir: impl AsRef<Path>, name: Option<&str>) -> ManifestResult<Self> {
        let dir = dir.as_ref();
        if !dir.join(OCI_LAYOUT_FILENAME).is_file() {
            return Err(ManifestError::source_access(format!(
                "{} is not an OCI image layout: {OCI_LAYOUT_FILENAME} is missing",
                dir.display()
            )));
        }

        let index: ImageIndex = read_json(&dir.join(OCI_INDEX_FILENAME))?;
        let descriptor = select_manifest(&index, name)?;
        let manifest: ImageManifest = read_json(&blob_path(dir, descriptor.digest()))?;

        tracing::info!(
            "opened image {} from {} with {} layers",
            descriptor.digest(),
            dir.display(),
            manifest.layers().len()
        );

        Ok(Self {
            dir: dir.to_path_buf(),
            manifest,
        })
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl LayerSource for OciLayoutSource {
    fn layers(&self) -> ManifestResult<Vec<LayerDescriptor>> {
        Ok(self
            .manifest
            .layers()
            .iter()
            .map(|layer| {
                LayerDescriptor::new(
                    MediaType::parse(&layer.media_type().to_string()),
                    layer.digest().to_string(),
                    layer.size(),
                )
            })
            .collect())
    }

    fn open_layer(&self, descriptor: &LayerDescriptor) -> ManifestResult<Box<dyn Read + '_>> {
        let layer = self
            .manifest
            .layers()
            .iter()
            .find(|layer| layer.digest().to_string() == *descriptor.get_digest())
            .ok_or_else(|| {
                ManifestError::source_access(format!(
                    "layer {} is not part of the image",
                    descriptor.get_digest()
                ))
            })?;

        let path = blob_path(&self.dir, layer.digest());
        let file = File::open(&path).map_err(|e| ManifestError::SourceAccess {
            message: format!("cannot open layer blob {}", path.display()),
            source: Some(e),
        })?;

        Ok(Box::new(BufReader::new(file)))
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

fn split_reference(reference: &str) -> (&str, Option<&str>) {
    let reference = reference
        .strip_prefix(OCI_TRANSPORT_PREFIX)
        .unwrap_or(reference);

    match reference.rsplit_once(':') {
        Some((dir, name)) if !dir.is_empty() && !name.is_empty() && !name.contains('/') => {
            (dir, Some(name))
        }
        _ => (reference, None),
    }
}

fn select_manifest<'a>(
    index: &'a ImageIndex,
    name: Option<&str>,
) -> ManifestResult<&'a Descriptor> {
    let manifests = index.manifests();
    match name {
        Some(name) => manifests
            .iter()
            .find(|descriptor| {
                descriptor
                    .annotations()
                    .as_ref()
                    .and_then(|annotations| annotations.get(OCI_REF_NAME_ANNOTATION))
                    .is_some_and(|ref_name| ref_name == name)
            })
            .ok_or_else(|| {
                ManifestError::source_access(format!("no image named {name:?} in the index"))
            }),
        None => match manifests.as_slice() {
            [only] => Ok(only),
            [] => Err(ManifestError::source_access("the index lists no images")),
            _ => Err(ManifestError::source_access(format!(
                "the index lists {} images, pick one with DIR:REF",
                manifests.len()
            ))),
        },
    }
}

fn blob_path(dir: &Path, digest: &Digest) -> PathBuf {
    dir.join(OCI_BLOBS_SUBDIR)
        .join(digest.algorithm().to_string())
        .join(digest.digest())
}

fn read_json<T: DeserializeOwned>(path: &Path) -> ManifestResult<T> {
    let file = File::open(path).map_err(|e| ManifestError::SourceAccess {
        message: format!("cannot open {}", path.display()),
        source: Some(e),
    })?;

    serde_json::from_reader(BufReader::new(file)).map_err(|e| {
        ManifestError::source_access(format!("cannot parse {}: {e}", path.display()))
    })
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
