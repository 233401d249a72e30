use std::collections::BTreeMap;
use std::net::Ipv4Addr;

use serde::{Deserialize, Serialize};

/// Per-host TCP port tables as returned by a service scan.
pub type HostPorts = BTreeMap<Ipv4Addr, BTreeMap<u16, ServiceObservation>>;

/// Everything known about one port of one host.
///
/// `state` is always reported by the scanner; the remaining fields depend on
/// how far service detection got. `title` and `status` are only filled in by
/// HTTP enrichment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceObservation {
    pub state: String,
    pub reason: Option<String>,
    pub name: Option<String>,
    pub product: Option<String>,
    pub version: Option<String>,
    pub extrainfo: Option<String>,
    pub conf: Option<String>,
    pub cpe: Option<String>,
    pub title: Option<String>,
    pub status: Option<u16>,
}

impl ServiceObservation {
    pub fn new(state: impl Into<String>) -> Self {
        Self {
            state: state.into(),
            ..Self::default()
        }
    }

    /// Copies every field `incoming` carries onto `self`; fields `incoming`
    /// leaves empty keep their current value.
    pub fn overlay(&mut self, incoming: &ServiceObservation) {
        if !incoming.state.is_empty() {
            self.state.clone_from(&incoming.state);
        }

        overlay_field(&mut self.reason, &incoming.reason);
        overlay_field(&mut self.name, &incoming.name);
        overlay_field(&mut self.product, &incoming.product);
        overlay_field(&mut self.version, &incoming.version);
        overlay_field(&mut self.extrainfo, &incoming.extrainfo);
        overlay_field(&mut self.conf, &incoming.conf);
        overlay_field(&mut self.cpe, &incoming.cpe);
        overlay_field(&mut self.title, &incoming.title);

        if incoming.status.is_some() {
            self.status = incoming.status;
        }
    }
}

fn overlay_field(current: &mut Option<String>, incoming: &Option<String>) {
    if let Some(value) = incoming {
        *current = Some(value.clone());
    }
}
