mod memory;
mod oci_layout;

//--------------------------------------------------------------------------------------------------
// Exports
//--------------------------------------------------------------------------------------------------

pub use memory::*;
pub use oci_layout::*;
