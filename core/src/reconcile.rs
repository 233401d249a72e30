//! # Reconciliation
//!
//! Folds scan results back into the canonical index. Every merge borrows the
//! index mutably and edits entries in place; nothing already recorded is
//! dropped, and re-applying the same batch leaves the index unchanged.

use std::net::Ipv4Addr;

use tracing::{debug, warn};

use netsift_common::models::{FlatRecord, HostPorts, HttpUpdate, MemberRecord};

use crate::error::{Error, Result};
use crate::fetch::FetchResult;
use crate::index::CidrIndex;

/// Outcome of an alive merge.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AliveMerge {
    /// Addresses filed as new members.
    pub added: usize,
    /// Live addresses no block contains. They are not filed anywhere.
    pub orphaned: Vec<Ipv4Addr>,
}

/// Files live addresses under the blocks that contain them.
///
/// An address already filed under any block stays there unchanged. The
/// rest go to the first containing block, in index order, as empty members.
pub fn merge_alive(index: &mut CidrIndex, alive: Vec<Ipv4Addr>) -> AliveMerge {
    let owned = index.member_set();
    let mut pending = alive;
    pending.sort_unstable();
    pending.dedup();
    pending.retain(|addr| !owned.contains(addr));

    let mut added = 0;
    for entry in index.iter_mut() {
        if pending.is_empty() {
            break;
        }
        pending.retain(|addr| {
            if entry.cidr.contains(*addr) {
                entry.members.insert(*addr, MemberRecord::default());
                added += 1;
                return false;
            }
            true
        });
    }

    if !pending.is_empty() {
        warn!(
            "{} live addresses fall outside every known block and were dropped",
            pending.len()
        );
        debug!("Orphaned addresses: {pending:?}");
    }

    AliveMerge {
        added,
        orphaned: pending,
    }
}

/// Overlays a service scan onto the index and returns one row per merged
/// port, carrying the member's domain at the time of the merge.
///
/// Each host goes to the block it is already filed under, or else to the
/// first block that contains it.
pub fn merge_ports(index: &mut CidrIndex, scan: &HostPorts) -> Vec<FlatRecord> {
    let mut rows = Vec::new();

    for (&addr, ports) in scan {
        let Some(cidr) = index.owner_of(addr).or_else(|| index.find_container(addr)) else {
            warn!("Service results for {addr} match no block, skipping");
            continue;
        };
        let Some(entry) = index.get_mut(&cidr) else {
            continue;
        };

        let member = entry.members.entry(addr).or_default();
        for (&port, incoming) in ports {
            let current = member.ports.entry(port).or_default();
            current.overlay(incoming);
            rows.push(FlatRecord::with_port(
                cidr,
                addr,
                member.domain.clone(),
                port,
                current,
            ));
        }
    }

    rows
}

/// Writes fetched titles onto the exact (block, address, port) they came
/// from. Every key is checked before anything is written, so a stale result
/// leaves the index untouched.
pub fn merge_http(index: &mut CidrIndex, results: &[FetchResult]) -> Result<Vec<HttpUpdate>> {
    for res in results {
        let known = index
            .get(&res.cidr)
            .and_then(|entry| entry.members.get(&res.ip))
            .is_some_and(|member| member.ports.contains_key(&res.port));

        if !known {
            return Err(Error::StaleEnrichment {
                cidr: res.cidr,
                ip: res.ip,
                port: res.port,
            });
        }
    }

    let mut updates = Vec::with_capacity(results.len());
    for res in results {
        let obs = index
            .get_mut(&res.cidr)
            .and_then(|entry| entry.members.get_mut(&res.ip))
            .and_then(|member| member.ports.get_mut(&res.port));

        if let Some(obs) = obs {
            obs.title = Some(res.title.clone());
            obs.status = res.status;
        }

        updates.push(HttpUpdate {
            title: res.title.clone(),
            status: res.status,
            ip: res.ip,
            port: res.port,
        });
    }

    Ok(updates)
}

/// One row per port, or a single bare row for a member without ports.
pub fn flatten(index: &CidrIndex) -> Vec<FlatRecord> {
    index
        .iter()
        .flat_map(|entry| {
            entry
                .members
                .iter()
                .flat_map(move |(addr, member)| FlatRecord::rows_for(entry.cidr, *addr, member))
        })
        .collect()
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
