//! Reading layer archives and turning their entries into records.
//!
//! A layer blob goes through two stages:
//! - [`LayerDecoder`] undoes the compression and walks the tar framing, yielding [`RawEntry`]s in
//!   archive order
//! - [`EntryNormalizer`] turns each raw entry into a [`LayerChange`], hashing regular file content
//!   on the way through

mod decoder;
mod media_type;
mod normalizer;

//--------------------------------------------------------------------------------------------------
// Exports
//--------------------------------------------------------------------------------------------------

pub use decoder::*;
pub use media_type::*;
pub use normalizer::*;
