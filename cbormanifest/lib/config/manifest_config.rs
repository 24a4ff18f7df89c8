use std::path::Path;

use serde::Deserialize;
use typed_builder::TypedBuilder;

use crate::{ManifestError, ManifestResult};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Policies that control how layers are turned into a manifest.
///
/// Every policy defaults to the behaviour existing manifests were produced with, so a default
/// config yields byte-identical output to earlier runs.
///
/// ## Examples
///
/// ```
/// use cbormanifest::config::{ChangeTimePolicy, ManifestConfig, MediaTypePolicy};
///
/// let config = ManifestConfig::builder()
///     .media_types(MediaTypePolicy::Reject)
///     .change_time(ChangeTimePolicy::Separate)
///     .build();
///
/// assert_eq!(config.media_types, MediaTypePolicy::Reject);
/// assert_eq!(config, ManifestConfig::from_toml_str(r#"
///     media-types = "reject"
///     change-time = "separate"
/// "#).unwrap());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, TypedBuilder)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct ManifestConfig {
    /// What to do with layers whose media type is neither plain nor gzip tar.
    #[builder(default)]
    pub media_types: MediaTypePolicy,

    /// How zero owner and group ids are recorded.
    #[builder(default)]
    pub ownership: OwnershipPolicy,

    /// Where an entry's change time is recorded.
    #[builder(default)]
    pub change_time: ChangeTimePolicy,
}

/// What to do with a layer whose media type is not recognized.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MediaTypePolicy {
    /// Skip the layer and keep going.
    #[default]
    Skip,

    /// Abort the conversion.
    Reject,
}

/// How owner and group ids of zero are recorded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OwnershipPolicy {
    /// An id of zero is treated as absent, so root ownership and unspecified ownership look the
    /// same.
    #[default]
    ZeroIsUnset,

    /// Every id is recorded, including zero.
    Explicit,
}

/// Where the change time of an entry ends up.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChangeTimePolicy {
    /// A present change time replaces the modify time and the change-time slot stays empty.
    #[default]
    FoldIntoModify,

    /// Change time and modify time are recorded in their own slots.
    Separate,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl ManifestConfig {
    /// Parses a config from TOML text. Missing keys take their defaults.
    pub fn from_toml_str(contents: &str) -> ManifestResult<Self> {
        toml::from_str(contents).map_err(|e| ManifestError::InvalidConfig(e.to_string()))
    }

    /// Reads and parses a TOML config file.
    pub fn from_toml_file(path: impl AsRef<Path>) -> ManifestResult<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            ManifestError::InvalidConfig(format!("cannot read {}: {e}", path.display()))
        })?;

        Self::from_toml_str(&contents)
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn test_manifest_config_defaults() {
        let config = ManifestConfig::from_toml_str("").unwrap();
        assert_eq!(config, ManifestConfig::default());
        assert_eq!(config.media_types, MediaTypePolicy::Skip);
        assert_eq!(config.ownership, OwnershipPolicy::ZeroIsUnset);
        assert_eq!(config.change_time, ChangeTimePolicy::FoldIntoModify);
    }

    #[test]
    fn test_manifest_config_from_toml_file() -> anyhow::Result<()> {
        let mut file = tempfile::NamedTempFile::new()?;
        writeln!(file, r#"ownership = "explicit""#)?;

        let config = ManifestConfig::from_toml_file(file.path())?;
        assert_eq!(config.ownership, OwnershipPolicy::Explicit);
        assert_eq!(config.media_types, MediaTypePolicy::Skip);

        Ok(())
    }

    #[test]
    fn test_manifest_config_missing_file_is_invalid_config() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let result = ManifestConfig::from_toml_file(dir.path().join("absent.toml"));
        assert!(matches!(
            result,
            Err(ManifestError::InvalidConfig(message)) if message.contains("absent.toml")
        ));

        Ok(())
    }

    #[test]
    fn test_manifest_config_rejects_unknown_keys() {
        assert!(matches!(
            ManifestConfig::from_toml_str("whiteouts = \"apply\""),
            Err(ManifestError::InvalidConfig(_))
        ));
        assert!(matches!(
            ManifestConfig::from_toml_str("media-types = \"maybe\""),
            Err(ManifestError::InvalidConfig(_))
        ));
    }
}
