//! # netsift common types
//!
//! Shared vocabulary for the workspace: the IPv4 block and range types, the
//! member/service/flat-record models, the typed filter predicate and the
//! run configuration. Nothing in here performs I/O apart from reading a
//! configuration file.

pub mod config;
pub mod error;
pub mod models;
pub mod network;
pub mod predicate;

pub use error::{Error, Result};

#[doc(hidden)]
pub use tracing;

/// Logs a milestone message. The CLI formatter renders these with a
/// distinct marker.
#[macro_export]
macro_rules! success {
    ($($arg:tt)*) => {
        $crate::tracing::info!(target: "netsift::success", $($arg)*)
    };
}
