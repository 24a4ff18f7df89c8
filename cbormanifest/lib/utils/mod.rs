//! Utility functions and constants.

mod oci;
mod path;

//--------------------------------------------------------------------------------------------------
// Exports
//--------------------------------------------------------------------------------------------------

pub use oci::*;
pub use path::*;
