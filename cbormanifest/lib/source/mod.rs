//! Where layers come from.
//!
//! A [`LayerSource`] lists the layers of one image in order and opens their blobs on demand.
//! [`OciLayoutSource`] reads an OCI image layout directory and [`MemorySource`] holds layers in
//! memory.

mod implementations;
mod traits;

//--------------------------------------------------------------------------------------------------
// Exports
//--------------------------------------------------------------------------------------------------

pub use implementations::*;
pub use traits::*;
