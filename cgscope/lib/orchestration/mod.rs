//! Running a scan end to end and shaping its report.

mod orchestrator;
mod report;

//--------------------------------------------------------------------------------------------------
// Exports
//--------------------------------------------------------------------------------------------------

pub use orchestrator::*;
pub use report::*;
