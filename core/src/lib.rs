//! # netsift core
//!
//! The target-management engine: turns raw reconnaissance output into a
//! population-ranked index of IPv4 blocks, picks scan targets from it, and
//! folds liveness, service and HTTP results back in.
//!
//! Pure stages ([`classify`], [`aggregate`], [`select`], [`subnet`],
//! [`reconcile`]) are synchronous and side-effect free apart from logging.
//! The adapters behind [`scanner::Scanner`], [`fetch::Fetcher`] and
//! [`store::Store`] do the I/O, and [`orchestrator`] strings everything
//! together.

pub mod aggregate;
pub mod batch;
pub mod classify;
pub mod error;
pub mod export;
pub mod fetch;
pub mod filter;
pub mod index;
pub mod loader;
pub mod orchestrator;
pub mod reconcile;
pub mod scanner;
pub mod select;
pub mod store;
pub mod subnet;

pub use error::{Error, Result};
pub use index::CidrIndex;
pub use orchestrator::{Orchestrator, RunReport};
