use std::io::Read;

use getset::{CopyGetters, Getters};

use crate::{layer::MediaType, ManifestResult};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Describes one layer of an image without reading it.
#[derive(Debug, Clone, PartialEq, Eq, Getters, CopyGetters)]
pub struct LayerDescriptor {
    /// The declared media type of the layer blob.
    #[getset(get = "pub with_prefix")]
    media_type: MediaType,

    /// The digest the source addresses the blob by, e.g. `sha256:<hex>`.
    #[getset(get = "pub with_prefix")]
    digest: String,

    /// The declared size of the blob in bytes.
    #[getset(get_copy = "pub with_prefix")]
    size: u64,
}

//--------------------------------------------------------------------------------------------------
// Traits
//--------------------------------------------------------------------------------------------------

/// Supplies the ordered layers of one image.
///
/// Layers are listed first and opened one at a time afterwards, so a layer that is skipped is
/// never read.
pub trait LayerSource {
    /// Returns the layers in the order they are applied, bottom layer first.
    fn layers(&self) -> ManifestResult<Vec<LayerDescriptor>>;

    /// Opens the blob of a layer previously returned by [`layers`](LayerSource::layers).
    fn open_layer(&self, descriptor: &LayerDescriptor) -> ManifestResult<Box<dyn Read + '_>>;
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl LayerDescriptor {
    /// Creates a new layer descriptor.
    pub fn new(media_type: MediaType, digest: impl Into<String>, size: u64) -> Self {
        Self {
            media_type,
            digest: digest.into(),
            size,
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl<T> LayerSource for &T
where
    T: LayerSource + ?Sized,
{
    fn layers(&self) -> ManifestResult<Vec<LayerDescriptor>> {
        (**self).layers()
    }

    fn open_layer(&self, descriptor: &LayerDescriptor) -> ManifestResult<Box<dyn Read + '_>> {
        (**self).open_layer(descriptor)
    }
}

impl<T> LayerSource for Box<T>
where
    T: LayerSource + ?Sized,
{
    fn layers(&self) -> ManifestResult<Vec<LayerDescriptor>> {
        (**self).layers()
    }

    fn open_layer(&self, descriptor: &LayerDescriptor) -> ManifestResult<Box<dyn Read + '_>> {
        (**self).open_layer(descriptor)
    }
}
