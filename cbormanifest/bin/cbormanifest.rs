use cbormanifest::{cli::CbormanifestArgs, convert, source::OciLayoutSource, ManifestResult};
use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

//--------------------------------------------------------------------------------------------------
// Functions: main
//--------------------------------------------------------------------------------------------------

fn main() -> ManifestResult<()> {
    // Parse command line arguments
    let args = CbormanifestArgs::parse();

    // Initialize tracing subscriber, RUST_LOG takes precedence over --verbose
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(args.log_filter()));
    fmt()
        .with_target(false)
        .with_file(false)
        .with_line_number(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_level(true)
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .init();

    let config = args.manifest_config()?;
    tracing::debug!(
        "converting image={}, output={:?}, config={config:?}",
        args.image,
        args.output
    );

    let source = OciLayoutSource::open(&args.image)?;
    convert(source, &args.output, &config)?;

    Ok(())
}
