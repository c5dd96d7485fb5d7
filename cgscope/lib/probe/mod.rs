//! Pulling images and probing the language runtimes inside them.
//!
//! [`RuntimeProbe`] drives an [`ImageRuntime`] through pull, export, binary search and version
//! probe for one image at a time. [`PodmanRuntime`] is the runtime used by the binary.

mod authfile;
mod lease;
mod podman;
mod prober;
mod rootfs;
mod runtime;
mod search;

//--------------------------------------------------------------------------------------------------
// Exports
//--------------------------------------------------------------------------------------------------

pub use authfile::*;
pub use lease::*;
pub use podman::*;
pub use prober::*;
pub use rootfs::*;
pub use runtime::*;
pub use search::*;
