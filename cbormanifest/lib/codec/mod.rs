//! The canonical CBOR encoding of a manifest.
//!
//! The encoded form is a single tagged value:
//!
//! ```text
//! 1868786040({
//!     "files": { "<path>": <record>, ... },
//!     "version": 0,
//! })
//! ```
//!
//! Each record is a map with the keys `mode`, `uid`, `gid`, `username`, `groupname`, `atime`,
//! `btime`, `ctime`, `mtime`, `xattr` and `type`, plus one payload key named after the type.
//! Absent optional fields are left out. All maps are written in canonical order, so the same
//! manifest always encodes to the same bytes.

mod decode;
mod encode;
mod manifest;

//--------------------------------------------------------------------------------------------------
// Exports
//--------------------------------------------------------------------------------------------------

pub use decode::*;
pub use encode::*;
pub use manifest::*;
