//! Library side of the `pbixproj` binary.

pub mod logging;
