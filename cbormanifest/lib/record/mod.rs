//! The per-path records a manifest is made of.

mod file_record;
mod permissions;

//--------------------------------------------------------------------------------------------------
// Exports
//--------------------------------------------------------------------------------------------------

pub use file_record::*;
pub use permissions::*;
