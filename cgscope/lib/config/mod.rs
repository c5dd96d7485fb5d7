//! Configuration types and helpers.

mod defaults;
mod scan;

//--------------------------------------------------------------------------------------------------
// Exports
//--------------------------------------------------------------------------------------------------

pub use defaults::*;
pub use scan::*;
