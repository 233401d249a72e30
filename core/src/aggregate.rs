//! # Reduction
//!
//! Files classified addresses under the blocks that contain them and ranks
//! the result by population.

use std::collections::BTreeSet;

use tracing::info;

use netsift_common::models::MemberRecord;
use netsift_common::network::cidr::CidrBlock;

use crate::classify::{self, Classified, FieldMap, RawInput};
use crate::index::CidrIndex;

/// Builds a ranked index from one classifier output.
///
/// Supplied blocks are registered first, in classification order, even when
/// nothing ends up filed under them. Each address then goes to the first
/// block containing it, or to a synthesized `a.b.c.0/24`.
pub fn distribute(classified: &Classified) -> CidrIndex {
    let mut index = CidrIndex::new();

    for cidr in &classified.cidrs {
        index.insert_block(*cidr);
    }

    let no_domains = BTreeSet::new();
    for &addr in &classified.addresses {
        let cidr = index
            .find_container(addr)
            .unwrap_or_else(|| CidrBlock::enclosing_fragment(addr));

        let domains = classified.domains_of(&addr).unwrap_or(&no_domains);
        index
            .insert_block(cidr)
            .members
            .entry(addr)
            .or_insert_with(|| MemberRecord::with_domains(domains));
    }

    index.rank();
    index
}

/// Classifies every input and distributes the combined result in one pass.
///
/// Inputs are merged before distribution, so a block supplied by a later
/// input still claims the addresses an earlier input listed.
pub fn reduce(inputs: &[RawInput], fields: &FieldMap) -> CidrIndex {
    let mut classified = Classified::default();
    for input in inputs {
        classified.extend(classify::classify(input, fields));
    }
    distribute(&classified)
}

pub fn log_statistics(index: &CidrIndex) {
    for entry in index.iter() {
        info!("{:<18} {}", entry.cidr.to_string(), entry.population());
    }
    info!(
        "{} blocks, {} addresses",
        index.len(),
        index.total_members()
    );
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
