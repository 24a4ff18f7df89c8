use std::io::Read;

use crate::{
    config::{ManifestConfig, MediaTypePolicy},
    layer::{Compression, EntryNormalizer, LayerDecoder},
    source::LayerSource,
    ManifestError, ManifestResult,
};

use super::Snapshot;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Folds layers, one at a time and in order, into a [`Snapshot`].
///
/// Every entry of a layer overwrites whatever an earlier entry or layer put at the same path.
/// Any failure leaves the merger unusable for producing a manifest; callers drop it and report
/// the error.
#[derive(Debug, Default)]
pub struct LayerMerger {
    normalizer: EntryNormalizer,
    snapshot: Snapshot,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl LayerMerger {
    /// Creates a merger holding only the root directory.
    pub fn new(config: &ManifestConfig) -> Self {
        Self {
            normalizer: EntryNormalizer::new(config),
            snapshot: Snapshot::new(),
        }
    }

    /// Decodes one layer blob and applies each of its entries in archive order.
    ///
    /// Returns the number of entries applied.
    pub fn merge_layer(
        &mut self,
        blob: impl Read,
        compression: Compression,
    ) -> ManifestResult<usize> {
        let mut decoder = LayerDecoder::new(blob, compression);
        let mut applied = 0;

        for entry in decoder.entries()? {
            let (header, content) = entry?.into_parts();
            let change = self.normalizer.normalize(&header, content)?;
            self.snapshot.apply(change)?;
            applied += 1;
        }

        Ok(applied)
    }

    /// Returns the snapshot built so far.
    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    /// Consumes the merger and returns the finished snapshot.
    pub fn finish(self) -> Snapshot {
        self.snapshot
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Merges every layer of `source`, bottom first, into a single snapshot.
///
/// Layers whose media type cannot be decoded are skipped or rejected according to
/// [`ManifestConfig::media_types`]. Failures inside a layer are wrapped in
/// [`ManifestError::InLayer`] with the layer's position.
pub fn merge_layers(
    source: impl LayerSource,
    config: &ManifestConfig,
) -> ManifestResult<Snapshot> {
    let layers = source.layers()?;
    let mut merger = LayerMerger::new(config);

    for (index, descriptor) in layers.iter().enumerate() {
        let media_type = descriptor.get_media_type();
        let in_layer = |source: ManifestError| ManifestError::InLayer {
            index,
            media_type: media_type.clone(),
            source: Box::new(source),
        };

        let Some(compression) = media_type.compression() else {
            match config.media_types {
                MediaTypePolicy::Skip => {
                    tracing::warn!(
                        "skipping layer {index} ({}): unsupported media type {media_type}",
                        descriptor.get_digest()
                    );
                    continue;
                }
                MediaTypePolicy::Reject => {
                    return Err(in_layer(ManifestError::UnsupportedMediaType(
                        media_type.to_string(),
                    )));
                }
            }
        };

        tracing::info!("merging layer {index} ({})", descriptor.get_digest());
        let blob = source.open_layer(descriptor).map_err(in_layer)?;
        let applied = merger.merge_layer(blob, compression).map_err(in_layer)?;
        tracing::debug!("applied {applied} entries from layer {index}");
    }

    let snapshot = merger.finish();
    tracing::info!(
        "merged {} layers into {} files",
        layers.len(),
        snapshot.len()
    );

    Ok(snapshot)
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
