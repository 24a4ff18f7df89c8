//! `cbormanifest` turns the layers of an OCI image into a canonical CBOR manifest of the merged
//! filesystem.
//!
//! # Overview
//!
//! The manifest lists every path of the final filesystem with its permissions, ownership,
//! timestamps and extended attributes. Regular files also carry their size and a BLAKE3 digest of
//! their content. The same layers always produce the same manifest bytes, so the manifest itself
//! can be content addressed.
//!
//! # Pipeline
//!
//! ```text
//! LayerSource ──► LayerDecoder ──► EntryNormalizer ──► LayerMerger ──► encode_manifest
//!  (blobs)         (tar entries)     (records, hashes)   (Snapshot)       (CBOR bytes)
//! ```
//!
//! Layers are processed one at a time in image order, and entries in archive order. A later entry
//! for a path replaces the earlier record completely. Any failure aborts the whole conversion and
//! no output is written.
//!
//! # Usage Example
//!
//! ```rust,no_run
//! use cbormanifest::{config::ManifestConfig, convert, source::OciLayoutSource};
//!
//! fn main() -> anyhow::Result<()> {
//!     let source = OciLayoutSource::open("./images/alpine:3.20")?;
//!     let manifest = convert(source, "alpine.cbor", &ManifestConfig::default())?;
//!
//!     for (path, record) in manifest.files() {
//!         println!("{} {path}", record.get_permissions());
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! - [`source`] - Where layer blobs come from
//! - [`layer`] - Decoding layer archives and normalizing their entries
//! - [`hasher`] - Streaming content digests
//! - [`record`] - The per-path records of a manifest
//! - [`merge`] - Folding layers into a snapshot
//! - [`codec`] - The canonical CBOR encoding
//! - [`config`] - Conversion policies
//! - [`cli`] - Command-line argument types

#![warn(missing_docs)]

mod convert;
mod error;

//--------------------------------------------------------------------------------------------------
// Exports
//--------------------------------------------------------------------------------------------------

pub mod cli;
pub mod codec;
pub mod config;
pub mod hasher;
pub mod layer;
pub mod merge;
pub mod record;
pub mod source;
pub mod utils;

pub use convert::*;
pub use error::*;
