use std::net::Ipv4Addr;

use serde::{Deserialize, Serialize};

use super::member::MemberRecord;
use super::service::ServiceObservation;
use crate::network::cidr::CidrBlock;

/// One observed (block, address, port) fact.
///
/// A member without ports is still represented, by a single row whose port
/// columns are all empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlatRecord {
    pub cidr: CidrBlock,
    pub ip: Ipv4Addr,
    pub domain: Option<String>,
    pub port: Option<u16>,
    pub state: Option<String>,
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

impl FlatRecord {
    /// Row for a member that has no observed ports.
    pub fn bare(cidr: CidrBlock, ip: Ipv4Addr, domain: Option<String>) -> Self {
        Self {
            cidr,
            ip,
            domain,
            port: None,
            state: None,
            reason: None,
            name: None,
            product: None,
            version: None,
            extrainfo: None,
            conf: None,
            cpe: None,
            title: None,
            status: None,
        }
    }

    pub fn with_port(
        cidr: CidrBlock,
        ip: Ipv4Addr,
        domain: Option<String>,
        port: u16,
        obs: &ServiceObservation,
    ) -> Self {
        Self {
            port: Some(port),
            state: Some(obs.state.clone()),
            reason: obs.reason.clone(),
            name: obs.name.clone(),
            product: obs.product.clone(),
            version: obs.version.clone(),
            extrainfo: obs.extrainfo.clone(),
            conf: obs.conf.clone(),
            cpe: obs.cpe.clone(),
            title: obs.title.clone(),
            status: obs.status,
            ..Self::bare(cidr, ip, domain)
        }
    }

    /// Every row a member contributes: one per port, or one bare row.
    pub fn rows_for(cidr: CidrBlock, ip: Ipv4Addr, member: &MemberRecord) -> Vec<Self> {
        if !member.has_ports() {
            return vec![Self::bare(cidr, ip, member.domain.clone())];
        }

        member
            .ports
            .iter()
            .map(|(port, obs)| Self::with_port(cidr, ip, member.domain.clone(), *port, obs))
            .collect()
    }
}

/// Title/status pair to write back onto a stored (address, port) row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpUpdate {
    pub title: String,
    pub status: Option<u16>,
    pub ip: Ipv4Addr,
    pub port: u16,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cidr() -> CidrBlock {
        "10.0.0.0/24".parse().unwrap()
    }

    #[test]
    fn portless_member_yields_one_bare_row() {
        let member = MemberRecord {
            domain: Some("a.example.com".into()),
            ..Default::default()
        };
        let rows = FlatRecord::rows_for(cidr(), Ipv4Addr::new(10, 0, 0, 5), &member);

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].port, None);
        assert_eq!(rows[0].state, None);
        assert_eq!(rows[0].domain.as_deref(), Some("a.example.com"));
    }

    #[test]
    fn one_row_per_port() {
        let mut member = MemberRecord::default();
        member.ports.insert(22, ServiceObservation::new("open"));
        member.ports.insert(80, ServiceObservation {
            state: "open".into(),
            name: Some("http".into()),
            title: Some("Index".into()),
            status: Some(200),
            ..Default::default()
        });

        let rows = FlatRecord::rows_for(cidr(), Ipv4Addr::new(10, 0, 0, 5), &member);

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].port, Some(22));
        assert_eq!(rows[1].port, Some(80));
        assert_eq!(rows[1].title.as_deref(), Some("Index"));
        assert_eq!(rows[1].status, Some(200));
    }
}
