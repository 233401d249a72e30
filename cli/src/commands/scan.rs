use std::process::ExitCode;
use std::time::Instant;

use colored::*;
use anyhow::Context;
use tracing::warn;

use netsift_common::config::Config;
use netsift_core::fetch::{HttpClient, WorkerPool};
use netsift_core::loader;
use netsift_core::scanner::NmapScanner;
use netsift_core::store::SqliteStore;
use netsift_core::{Orchestrator, RunReport};

use super::ScanArgs;
use crate::terminal::print;

/// Folds the command line switches into the loaded configuration.
pub fn apply_flags(cfg: &mut Config, args: &ScanArgs) {
    if args.no_filter {
        cfg.analysis.enable_filter = false;
    }
    if args.no_request {
        cfg.request.enabled = false;
    }
    if args.no_cut_mask {
        cfg.analysis.enable_cut_mask = false;
    }
    if args.analysis_only {
        cfg.analysis_only = true;
    }
    if let Some(format) = args.format {
        cfg.export.format = format;
    }
    if let Some(path) = &args.output {
        cfg.export.path = Some(path.clone());
    }
}

pub async fn scan(args: ScanArgs, mut cfg: Config) -> anyhow::Result<ExitCode> {
    apply_flags(&mut cfg, &args);

    let inputs = loader::collect_inputs(args.targets)?;
    if inputs.iter().all(|input| input.is_empty()) {
        warn!("No targets given, nothing to do");
        return Ok(ExitCode::FAILURE);
    }

    let store = SqliteStore::open(&cfg.store.path)
        .with_context(|| format!("Could not open result store {}", cfg.store.path.display()))?;
    let scanner = NmapScanner::new(&cfg.scan);
    let fetcher = WorkerPool::new(HttpClient::new(&cfg.request)?, cfg.request.workers());

    print::header("aggregating targets");
    let start = Instant::now();

    let mut orchestrator = Orchestrator::new(cfg, scanner, fetcher, store);
    let report = orchestrator.run(inputs).await?;

    print::header("top blocks");
    let ranked: Vec<(String, usize)> = orchestrator
        .index()
        .ranked()
        .into_iter()
        .take(10)
        .map(|(cidr, count)| (cidr.to_string(), count))
        .collect();
    print::ranking(&ranked);

    summary(&report, start.elapsed().as_secs_f64());
    Ok(ExitCode::SUCCESS)
}

fn summary(report: &RunReport, seconds: f64) {
    print::header("summary");
    print::aligned_line("Blocks", report.blocks.to_string());
    print::aligned_line("Addresses", report.addresses.to_string());
    print::aligned_line("Targets", report.targets.to_string());
    print::aligned_line("Alive", report.alive.to_string().green().bold());
    if report.orphaned > 0 {
        print::aligned_line("Orphaned", report.orphaned.to_string().yellow());
    }
    print::aligned_line("Batches", report.batches.to_string());
    print::aligned_line("Rows stored", report.persisted.to_string());
    print::aligned_line("Titles", report.enriched.to_string());
    if let Some(path) = &report.exported {
        print::aligned_line("Exported", path.display().to_string());
    }
    print::aligned_line("Elapsed", format!("{seconds:.2}s"));
}
