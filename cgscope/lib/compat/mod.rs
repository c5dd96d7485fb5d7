//! Runtime version grammars and the cgroup v2 compatibility matrix.

mod table;
mod version;

//--------------------------------------------------------------------------------------------------
// Exports
//--------------------------------------------------------------------------------------------------

pub use table::*;
pub use version::*;
