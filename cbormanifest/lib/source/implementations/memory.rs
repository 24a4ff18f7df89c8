use std::io::Read;

use crate::{
    hasher::ContentDigest,
    layer::MediaType,
    source::{LayerDescriptor, LayerSource},
    ManifestError, ManifestResult,
};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// An image whose layer blobs are held in memory.
///
/// Layers are addressed by the BLAKE3 digest of their bytes, written as `blake3:<hex>`.
///
/// ## Examples
///
/// ```
/// use cbormanifest::{layer::MediaType, source::{LayerSource, MemorySource}};
///
/// let source = MemorySource::new().with_layer(MediaType::PlainArchive, vec![0; 1024]);
/// let layers = source.layers().unwrap();
///
/// assert_eq!(layers.len(), 1);
/// assert_eq!(layers[0].get_size(), 1024);
/// assert!(layers[0].get_digest().starts_with("blake3:"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    layers: Vec<MemoryLayer>,
}

#[derive(Debug, Clone)]
struct MemoryLayer {
    descriptor: LayerDescriptor,
    blob: Vec<u8>,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl MemorySource {
    /// Creates a source with no layers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a layer on top of the existing ones.
    pub fn push_layer(&mut self, media_type: MediaType, blob: impl Into<Vec<u8>>) {
        let blob = blob.into();
        let digest = format!("blake3:{}", ContentDigest::of(&blob));
        let descriptor = LayerDescriptor::new(media_type, digest, blob.len() as u64);
        self.layers.push(MemoryLayer { descriptor, blob });
    }

    /// Appends a layer and returns the source, for chaining.
    pub fn with_layer(mut self, media_type: MediaType, blob: impl Into<Vec<u8>>) -> Self {
        self.push_layer(media_type, blob);
        self
    }

    /// Returns the number of layers.
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    /// Returns true if the source has no layers.
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl LayerSource for MemorySource {
    fn layers(&self) -> ManifestResult<Vec<LayerDescriptor>> {
        Ok(self
            .layers
            .iter()
            .map(|layer| layer.descriptor.clone())
            .collect())
    }

    fn open_layer(&self, descriptor: &LayerDescriptor) -> ManifestResult<Box<dyn Read + '_>> {
        let layer = self
            .layers
            .iter()
            .find(|layer| layer.descriptor.get_digest() == descriptor.get_digest())
            .ok_or_else(|| {
                ManifestError::source_access(format!(
                    "no layer with digest {}",
                    descriptor.get_digest()
                ))
            })?;

        Ok(Box::new(layer.blob.as_slice()))
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_source_keeps_layer_order() -> anyhow::Result<()> {
        let source = MemorySource::new()
            .with_layer(MediaType::PlainArchive, b"first".to_vec())
            .with_layer(MediaType::GzipArchive, b"second".to_vec());

        let layers = source.layers()?;
        assert_eq!(layers.len(), 2);
        assert_eq!(layers[0].get_media_type(), &MediaType::PlainArchive);
        assert_eq!(layers[1].get_media_type(), &MediaType::GzipArchive);

        let mut blob = String::new();
        source.open_layer(&layers[1])?.read_to_string(&mut blob)?;
        assert_eq!(blob, "second");

        Ok(())
    }

    #[test]
    fn test_memory_source_unknown_layer() {
        let source = MemorySource::new();
        let descriptor = LayerDescriptor::new(MediaType::PlainArchive, "blake3:00", 0);
        assert!(matches!(
            source.open_layer(&descriptor),
            Err(ManifestError::SourceAccess { .. })
        ));
    }
}
