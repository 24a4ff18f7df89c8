//! The end-to-end conversion from layers to a manifest file.

use std::path::Path;

use tempfile::NamedTempFile;

use crate::{
    codec::{write_manifest, Manifest},
    config::ManifestConfig,
    merge::merge_layers,
    source::LayerSource,
    ManifestError, ManifestResult,
};

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Merges the layers of `source` and returns the manifest without writing it anywhere.
pub fn build_manifest(
    source: impl LayerSource,
    config: &ManifestConfig,
) -> ManifestResult<Manifest> {
    Ok(Manifest::new(merge_layers(source, config)?))
}

/// Merges the layers of `source` and writes the encoded manifest to `output`.
///
/// The manifest is written to a temporary file next to `output` and moved into place once it is
/// complete. If anything fails, `output` is left untouched and the temporary file is removed.
///
/// ## Examples
///
/// ```no_run
/// use cbormanifest::{config::ManifestConfig, convert, source::OciLayoutSource};
///
/// let source = OciLayoutSource::open("./alpine:latest")?;
/// let manifest = convert(source, "alpine.cbor", &ManifestConfig::default())?;
/// println!("{} files", manifest.files().len());
/// # Ok::<(), cbormanifest::ManifestError>(())
/// ```
pub fn convert(
    source: impl LayerSource,
    output: impl AsRef<Path>,
    config: &ManifestConfig,
) -> ManifestResult<Manifest> {
    let output = output.as_ref();
    let manifest = build_manifest(source, config)?;

    let dir = match output.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut file = NamedTempFile::new_in(dir).map_err(|e| {
        ManifestError::Encoding(format!(
            "cannot create a temporary file in {}: {e}",
            dir.display()
        ))
    })?;

    write_manifest(&manifest, &mut file)?;
    file.as_file()
        .sync_all()
        .map_err(|e| ManifestError::Encoding(format!("cannot sync manifest: {e}")))?;

    file.persist(output).map_err(|e| {
        ManifestError::Encoding(format!("cannot write {}: {}", output.display(), e.error))
    })?;

    tracing::info!(
        "wrote manifest of {} files to {}",
        manifest.files().len(),
        output.display()
    );

    Ok(manifest)
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
