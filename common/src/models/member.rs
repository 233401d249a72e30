use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use super::service::ServiceObservation;

/// Data attached to an address inside a block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberRecord {
    /// Comma-joined set of names known to resolve to the address.
    pub domain: Option<String>,
    pub ports: BTreeMap<u16, ServiceObservation>,
}

impl MemberRecord {
    pub fn with_domains(domains: &BTreeSet<String>) -> Self {
        let domain = if domains.is_empty() {
            None
        } else {
            Some(domains.iter().map(String::as_str).collect::<Vec<_>>().join(","))
        };

        Self {
            domain,
            ports: BTreeMap::new(),
        }
    }

    pub fn has_ports(&self) -> bool {
        !self.ports.is_empty()
    }
}
