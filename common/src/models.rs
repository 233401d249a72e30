//! # Result Models
//!
//! * [`service`]: what a scanner observed on a single port.
//! * [`member`]: an address filed under a block, with its domains and ports.
//! * [`record`]: the flat row shape used for persistence and export.

pub mod member;
pub mod record;
pub mod service;

pub use member::MemberRecord;
pub use record::{FlatRecord, HttpUpdate};
pub use service::{HostPorts, ServiceObservation};
