//! Conversion policies and their defaults.

mod defaults;
mod manifest_config;

//--------------------------------------------------------------------------------------------------
// Exports
//--------------------------------------------------------------------------------------------------

pub use defaults::*;
pub use manifest_config::*;
