use std::path::PathBuf;

use clap::Parser;

use crate::{
    config::{
        ChangeTimePolicy, ManifestConfig, MediaTypePolicy, OwnershipPolicy, DEFAULT_LOG_FILTER,
        VERBOSE_LOG_FILTER,
    },
    ManifestResult,
};

use super::styles;

//-------------------------------------------------------------------------------------------------
// Types
//-------------------------------------------------------------------------------------------------

/// cbormanifest - Writes the merged filesystem of an OCI image as a canonical CBOR manifest
#[derive(Debug, Parser)]
#[command(name = "cbormanifest", author, about, version, styles=styles())]
pub struct CbormanifestArgs {
    /// OCI image layout to read, as DIR or DIR:REF
    #[arg(value_name = "IMAGE")]
    pub image: String,

    /// File to write the manifest to
    #[arg(value_name = "OUTPUT")]
    pub output: PathBuf,

    /// TOML file with conversion policies
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Fail on layers with an unsupported media type instead of skipping them
    #[arg(long)]
    pub strict_media_types: bool,

    /// Record owner and group ids of zero instead of leaving them out
    #[arg(long)]
    pub explicit_ids: bool,

    /// Keep change times in their own field instead of folding them into the modify time
    #[arg(long)]
    pub separate_ctime: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

//-------------------------------------------------------------------------------------------------
// Methods
//-------------------------------------------------------------------------------------------------

impl CbormanifestArgs {
    /// Loads the config file, if any, and applies the policy flags on top of it.
    pub fn manifest_config(&self) -> ManifestResult<ManifestConfig> {
        let mut config = match &self.config {
            Some(path) => ManifestConfig::from_toml_file(path)?,
            None => ManifestConfig::default(),
        };

        if self.strict_media_types {
            config.media_types = MediaTypePolicy::Reject;
        }

        if self.explicit_ids {
            config.ownership = OwnershipPolicy::Explicit;
        }

        if self.separate_ctime {
            config.change_time = ChangeTimePolicy::Separate;
        }

        Ok(config)
    }

    /// The log filter to use when `RUST_LOG` is not set.
    pub fn log_filter(&self) -> &'static str {
        if self.verbose {
            VERBOSE_LOG_FILTER
        } else {
            DEFAULT_LOG_FILTER
        }
    }
}

//-------------------------------------------------------------------------------------------------
// Tests
//-------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn test_args_require_image_and_output() {
        assert!(CbormanifestArgs::try_parse_from(["cbormanifest"]).is_err());
        assert!(CbormanifestArgs::try_parse_from(["cbormanifest", "./alpine"]).is_err());
        assert!(CbormanifestArgs::try_parse_from(["cbormanifest", "a", "b", "c"]).is_err());

        let args = CbormanifestArgs::try_parse_from(["cbormanifest", "./alpine:3.20", "out.cbor"])
            .unwrap();
        assert_eq!(args.image, "./alpine:3.20");
        assert_eq!(args.output, PathBuf::from("out.cbor"));
        assert_eq!(args.manifest_config().unwrap(), ManifestConfig::default());
        assert_eq!(args.log_filter(), DEFAULT_LOG_FILTER);
    }

    #[test]
    fn test_args_flags_override_config_file() -> anyhow::Result<()> {
        let mut file = tempfile::NamedTempFile::new()?;
        writeln!(file, r#"ownership = "zero-is-unset""#)?;
        writeln!(file, r#"change-time = "separate""#)?;

        let path = file.path().to_string_lossy().into_owned();
        let args = CbormanifestArgs::try_parse_from([
            "cbormanifest",
            "--config",
            path.as_str(),
            "--explicit-ids",
            "--strict-media-types",
            "-v",
            "image",
            "out.cbor",
        ])?;

        let config = args.manifest_config()?;
        assert_eq!(config.media_types, MediaTypePolicy::Reject);
        assert_eq!(config.ownership, OwnershipPolicy::Explicit);
        assert_eq!(config.change_time, ChangeTimePolicy::Separate);
        assert_eq!(args.log_filter(), VERBOSE_LOG_FILTER);

        Ok(())
    }
}
