//! Folding ordered layers into one filesystem snapshot.

mod merger;
mod snapshot;

//--------------------------------------------------------------------------------------------------
// Exports
//--------------------------------------------------------------------------------------------------

pub use merger::*;
pub use snapshot::*;
