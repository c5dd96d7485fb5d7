//! Resolution of workloads to the images their containers run.

mod policy;
mod resolver;
mod rewrite;

//--------------------------------------------------------------------------------------------------
// Exports
//--------------------------------------------------------------------------------------------------

pub use policy::*;
pub use resolver::*;
pub use rewrite::*;
