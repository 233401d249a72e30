//! # Run Orchestration
//!
//! Drives one end-to-end run over the canonical index:
//!
//! 1. every input is filtered and classified, and the combined result is
//!    distributed into the index in one pass;
//! 2. unless the run is analysis-only, targets are chosen, subnetted and
//!    swept for live hosts, which are filed under their blocks;
//! 3. live hosts are written to batch files and service-scanned one batch at
//!    a time, each batch persisted to the staging table before the next;
//! 4. open HTTP-looking services without a title are requested and the
//!    titles are written back to the index and to staging;
//! 5. staging is appended to the permanent table and the index is exported.
//!
//! A store that cannot prepare staging only costs persistence: the scan
//! still runs and the index is still exported.
//!
//! The index is owned here and lent to the merge functions one step at a
//! time. Scanner, fetcher and store are injected so the whole run can be
//! exercised with fakes.

use std::path::PathBuf;

use tracing::{debug, error, info, warn};

use netsift_common::config::Config;
use netsift_common::network::cidr::CidrBlock;
use netsift_common::success;

use crate::aggregate;
use crate::batch::{BatchFile, write_batches};
use crate::classify::{FieldMap, RawInput};
use crate::error::Result;
use crate::export;
use crate::fetch::{FetchTask, Fetcher};
use crate::filter::{self, CdnRanges};
use crate::index::CidrIndex;
use crate::reconcile;
use crate::scanner::{Scanner, sweep_alive};
use crate::select::{self, SelectionPolicy};
use crate::store::{Store, http_candidates};
use crate::subnet;

/// What a run did, for the closing summary.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub blocks: usize,
    pub addresses: usize,
    pub targets: usize,
    pub alive: usize,
    pub orphaned: usize,
    pub batches: usize,
    pub persisted: usize,
    pub enriched: usize,
    pub exported: Option<PathBuf>,
}

pub struct Orchestrator<S, F, D> {
    cfg: Config,
    scanner: S,
    fetcher: F,
    store: D,
    cdn: CdnRanges,
    index: CidrIndex,
}

impl<S, F, D> Orchestrator<S, F, D>
where
    S: Scanner,
    F: Fetcher,
    D: Store,
{
    pub fn new(cfg: Config, scanner: S, fetcher: F, store: D) -> Self {
        let cdn = match CdnRanges::from_config(&cfg.analysis) {
            Ok(cdn) => cdn,
            Err(e) => {
                error!("Could not load CDN ranges, none will be excluded: {e}");
                CdnRanges::default()
            }
        };

        Self {
            cfg,
            scanner,
            fetcher,
            store,
            cdn,
            index: CidrIndex::new(),
        }
    }

    pub fn index(&self) -> &CidrIndex {
        &self.index
    }

    pub fn store(&self) -> &D {
        &self.store
    }

    /// Analyses `inputs`, probes the chosen targets and exports the index.
    ///
    /// The export happens even when probing fails part way; the probe error
    /// is returned after it.
    pub async fn run(&mut self, inputs: Vec<RawInput>) -> Result<RunReport> {
        let mut report = RunReport::default();

        self.analyse(inputs);
        report.blocks = self.index.len();
        report.addresses = self.index.total_members();

        let probed = if self.cfg.analysis_only {
            info!("Analysis only, skipping probes");
            Ok(())
        } else {
            self.probe(&mut report).await
        };

        let rows = reconcile::flatten(&self.index);
        report.exported = Some(export::export_records(&rows, &self.cfg.export)?);
        probed?;

        success!("Run finished");
        Ok(report)
    }

    /// Classifies every input, then distributes the combined result once so
    /// no address is filed under two blocks.
    fn analyse(&mut self, inputs: Vec<RawInput>) {
        let fields = FieldMap::from(&self.cfg.analysis);

        let prepared: Vec<RawInput> = inputs
            .into_iter()
            .map(|input| {
                let before = input.len();
                let input = filter::prepare(input, &self.cfg.analysis, &self.cdn);
                debug!("Input kept {} of {before} items", input.len());
                input
            })
            .collect();

        self.index.absorb(aggregate::reduce(&prepared, &fields));
        self.index.rank();
        aggregate::log_statistics(&self.index);
    }

    /// Selected, sorted and optionally subnetted scan targets.
    pub fn targets(&self) -> Vec<CidrBlock> {
        let analysis = &self.cfg.analysis;
        let targets = select::choose(&self.index, SelectionPolicy::from(analysis));

        if analysis.enable_cut_mask {
            subnet::cut_mask(targets, &self.index, analysis.min_mask)
        } else {
            targets
        }
    }

    async fn probe(&mut self, report: &mut RunReport) -> Result<()> {
        let targets = self.targets();
        report.targets = targets.len();
        if targets.is_empty() {
            warn!("No targets to scan");
            return Ok(());
        }
        info!("{} targets selected", targets.len());

        let alive = sweep_alive(&self.scanner, &targets).await;
        let merge = reconcile::merge_alive(&mut self.index, alive.clone());
        report.alive = alive.len();
        report.orphaned = merge.orphaned.len();
        report.addresses = self.index.total_members();
        aggregate::log_statistics(&self.index);

        if alive.is_empty() {
            warn!("No live hosts found");
            return Ok(());
        }
        success!("{} live hosts, {} new", alive.len(), merge.added);

        let batches = write_batches(&alive, self.cfg.scan.batch_size, &self.cfg.scan.temp_dir)?;
        report.batches = batches.len();

        let persisting = match self.reset_staging() {
            Ok(()) => true,
            Err(e) => {
                error!(
                    "Could not prepare {}, results will not be stored: {e}",
                    self.cfg.store.staging_table
                );
                false
            }
        };

        self.scan_batches(&batches, persisting, report).await;
        let enriched = if persisting && self.cfg.request.enabled {
            self.enrich().await
        } else {
            Ok(0)
        };

        if persisting {
            self.promote_staging();
        }
        for batch in &batches {
            batch.remove();
        }

        report.enriched = enriched?;
        Ok(())
    }

    fn reset_staging(&self) -> Result<()> {
        let staging = &self.cfg.store.staging_table;
        self.store.clean(staging)?;
        self.store.create_table(staging)?;
        self.store.create_table(&self.cfg.store.table)
    }

    /// Service-scans each batch and merges it into the index. Rows are
    /// written to staging only when `persisting`.
    async fn scan_batches(
        &mut self,
        batches: &[BatchFile],
        persisting: bool,
        report: &mut RunReport,
    ) {
        let staging = &self.cfg.store.staging_table;

        for (i, batch) in batches.iter().enumerate() {
            info!(
                "Service scan of batch {}/{} ({} hosts)",
                i + 1,
                batches.len(),
                batch.hosts.len()
            );

            let scan = match self.scanner.services(&batch.path).await {
                Ok(scan) => scan,
                Err(e) => {
                    error!("Service scan of {} failed: {e}", batch.path.display());
                    continue;
                }
            };
            scan.stats.log();

            let rows = reconcile::merge_ports(&mut self.index, &scan.hosts);
            if !persisting {
                continue;
            }
            match self.store.insert(staging, &rows) {
                Ok(n) => report.persisted += n,
                Err(e) => error!("Could not persist batch {}: {e}", i + 1),
            }
        }
    }

    async fn enrich(&mut self) -> Result<usize> {
        let staging = &self.cfg.store.staging_table;
        let candidates = match self.store.query(staging, &http_candidates()) {
            Ok(rows) => rows,
            Err(e) => {
                error!("Could not query HTTP candidates: {e}");
                return Ok(0);
            }
        };

        let mut tasks: Vec<FetchTask> = candidates.iter().filter_map(FetchTask::from_record).collect();
        tasks.sort_by_key(|t| (t.ip, t.port));
        tasks.dedup_by_key(|t| (t.ip, t.port));
        if tasks.is_empty() {
            info!("No HTTP services to request");
            return Ok(0);
        }

        let results = self.fetcher.fetch_all(tasks).await;
        let updates = reconcile::merge_http(&mut self.index, &results)?;

        if let Err(e) = self.store.update_http(staging, &updates) {
            error!("Could not store page titles: {e}");
        }
        success!("Collected {} page titles", updates.len());
        Ok(updates.len())
    }

    fn promote_staging(&self) {
        let store = &self.cfg.store;
        match self.store.merge_tables(&store.staging_table, &store.table) {
            Ok(n) => info!("Moved {n} rows into {}", store.table),
            Err(e) => error!("Could not merge {} into {}: {e}", store.staging_table, store.table),
        }
    }
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
