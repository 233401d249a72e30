#![cfg(test)]
use std::net::Ipv4Addr;
use std::path::Path;

use pretty_assertions::assert_eq;

use netsift_common::config::{Config, ExportFormat};
use netsift_common::models::FlatRecord;
use netsift_common::network::target::Target;
use netsift_core::classify::RawInput;
use netsift_core::error::Error;
use netsift_core::fetch::FetchResult;
use netsift_core::loader;
use netsift_core::store::{SqliteStore, Store};
use netsift_core::Orchestrator;

use crate::support::{ScriptedFetcher, ScriptedScanner, config_in};

fn strings(items: &[&str]) -> Vec<RawInput> {
    vec![RawInput::Strings(
        items.iter().map(|s| s.to_string()).collect(),
    )]
}

fn ip(s: &str) -> Ipv4Addr {
    s.parse().unwrap()
}

fn read_export(path: &Path) -> Vec<FlatRecord> {
    serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
}

fn json_config(dir: &Path) -> Config {
    let mut cfg = config_in(dir);
    cfg.export.format = ExportFormat::Json;
    cfg
}

/// Only the block meeting the population threshold is probed; its hosts are
/// scanned, persisted and titled.
#[tokio::test]
async fn busiest_block_is_scanned_and_enriched() {
    let dir = tempfile::tempdir().unwrap();
    let scanner = ScriptedScanner::new(vec![ip("192.168.1.5"), ip("192.168.1.20")])
        .with_service(ip("192.168.1.5"), 80, "http")
        .with_service(ip("192.168.1.20"), 443, "http");
    let fetcher = ScriptedFetcher::default();

    let mut orch = Orchestrator::new(
        json_config(dir.path()),
        scanner.clone(),
        fetcher.clone(),
        SqliteStore::open_in_memory().unwrap(),
    );
    let report = orch
        .run(strings(&["192.168.1.5", "192.168.1.9", "10.0.0.0/24"]))
        .await
        .unwrap();

    assert_eq!(scanner.probed(), vec!["192.168.1.0/24"]);
    assert_eq!(report.blocks, 2);
    assert_eq!(report.targets, 1);
    assert_eq!(report.alive, 2);
    assert_eq!(report.persisted, 2);
    assert_eq!(report.enriched, 2);

    let mut requested = fetcher.requested();
    requested.sort();
    assert_eq!(requested, vec![
        "http://192.168.1.5:80",
        "https://192.168.1.20:443"
    ]);

    let stored = orch.store().rows("RESULTS").unwrap();
    assert_eq!(stored.len(), 2);
    assert!(stored.iter().all(|r| r.status == Some(200)));
    assert_eq!(orch.store().table_exists("STAGING").unwrap(), 0);

    let exported = read_export(report.exported.as_ref().unwrap());
    let summary: Vec<(Ipv4Addr, Option<u16>, Option<String>)> = exported
        .iter()
        .map(|r| (r.ip, r.port, r.title.clone()))
        .collect();
    assert_eq!(summary, vec![
        (ip("192.168.1.5"), Some(80), Some(String::from("http://192.168.1.5:80 title"))),
        (ip("192.168.1.9"), None, None),
        (
            ip("192.168.1.20"),
            Some(443),
            Some(String::from("https://192.168.1.20:443 title"))
        ),
    ]);
    assert!(exported.iter().all(|r| r.cidr.to_string() == "192.168.1.0/24"));
}

/// Wide blocks are probed as their populated /24s; narrower ones whole.
#[tokio::test]
async fn wide_blocks_are_probed_per_populated_fragment() {
    let dir = tempfile::tempdir().unwrap();
    let scanner = ScriptedScanner::new(vec![ip("10.1.3.4")]);

    let mut orch = Orchestrator::new(
        config_in(dir.path()),
        scanner.clone(),
        ScriptedFetcher::default(),
        SqliteStore::open_in_memory().unwrap(),
    );
    let report = orch
        .run(strings(&[
            "10.1.0.0/20",
            "10.1.3.4",
            "10.1.3.5",
            "10.1.9.1",
            "172.16.0.0/22",
            "172.16.1.1",
            "172.16.2.2",
        ]))
        .await
        .unwrap();

    assert_eq!(scanner.probed(), vec![
        "10.1.3.0/24",
        "10.1.9.0/24",
        "172.16.0.0/22"
    ]);
    assert_eq!(report.targets, 3);
    assert_eq!(report.alive, 1);

    let owner = orch.index().owner_of(ip("10.1.3.4")).unwrap();
    assert_eq!(owner.to_string(), "10.1.0.0/20");
    assert!(!orch.index().contains_block(&"10.1.3.0/24".parse().unwrap()));
}

/// Record filters and domains flow from a CSV export through to the output
/// without any probing.
#[tokio::test]
async fn csv_records_are_filtered_and_exported() {
    let dir = tempfile::tempdir().unwrap();
    let csv = dir.path().join("subdomains.csv");
    std::fs::write(
        &csv,
        "subdomain,ip,cdn,level,alive\n\
         a.example.com,10.2.0.1,0,1,1\n\
         b.example.com,10.2.0.2,0,2,1\n\
         c.example.com,10.2.0.3,1,1,1\n\
         d.example.com,10.2.0.4,0,3,1\n\
         e.example.com,10.2.0.1,0,1,1\n",
    )
    .unwrap();

    let mut cfg = json_config(dir.path());
    cfg.analysis_only = true;
    cfg.analysis.enable_record_filter = true;

    let target: Target = csv.to_string_lossy().parse().unwrap();
    let inputs = loader::collect_inputs(vec![target]).unwrap();

    let scanner = ScriptedScanner::default();
    let mut orch = Orchestrator::new(
        cfg,
        scanner.clone(),
        ScriptedFetcher::default(),
        SqliteStore::open_in_memory().unwrap(),
    );
    let report = orch.run(inputs).await.unwrap();

    assert!(scanner.probed().is_empty());
    assert!(orch.store().list_tables().unwrap().is_empty());

    let exported = read_export(report.exported.as_ref().unwrap());
    let members: Vec<(Ipv4Addr, Option<String>)> = exported
        .iter()
        .map(|r| (r.ip, r.domain.clone()))
        .collect();
    assert_eq!(members, vec![
        (ip("10.2.0.1"), Some(String::from("a.example.com,e.example.com"))),
        (ip("10.2.0.2"), Some(String::from("b.example.com"))),
    ]);
}

/// A failing batch is skipped, the rest are persisted, and no batch file is
/// left behind.
#[tokio::test]
async fn failed_batches_are_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let mut scanner = ScriptedScanner::new(vec![ip("10.0.0.1"), ip("10.0.0.2")])
        .with_service(ip("10.0.0.1"), 22, "ssh")
        .with_service(ip("10.0.0.2"), 22, "ssh");
    scanner.failing = vec![ip("10.0.0.2")];

    let mut cfg = config_in(dir.path());
    cfg.scan.batch_size = 1;
    cfg.request.enabled = false;

    let store = SqliteStore::open(&cfg.store.path).unwrap();
    let mut orch = Orchestrator::new(cfg, scanner.clone(), ScriptedFetcher::default(), store);
    let report = orch
        .run(strings(&["10.0.0.1", "10.0.0.2"]))
        .await
        .unwrap();

    assert_eq!(report.batches, 2);
    assert_eq!(report.persisted, 1);

    let stored = orch.store().rows("RESULTS").unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].ip, ip("10.0.0.1"));
    assert_eq!(stored[0].port, Some(22));

    let batches = scanner.batches();
    assert_eq!(batches.len(), 2);
    assert!(batches.iter().all(|path| !path.exists()));
}

/// A title for a port the index never saw aborts enrichment without writing
/// any title, but the scanned rows are still kept.
#[tokio::test]
async fn stale_titles_are_surfaced() {
    let dir = tempfile::tempdir().unwrap();
    let scanner =
        ScriptedScanner::new(vec![ip("10.0.0.1")]).with_service(ip("10.0.0.1"), 80, "http");
    let fetcher = ScriptedFetcher {
        extra: vec![FetchResult {
            cidr: "10.0.0.0/24".parse().unwrap(),
            ip: ip("10.0.0.1"),
            port: 8080,
            url: "http://10.0.0.1:8080".into(),
            title: "ghost".into(),
            status: Some(200),
        }],
        ..Default::default()
    };

    let mut orch = Orchestrator::new(
        config_in(dir.path()),
        scanner.clone(),
        fetcher,
        SqliteStore::open_in_memory().unwrap(),
    );
    let err = orch
        .run(strings(&["10.0.0.1", "10.0.0.2"]))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::StaleEnrichment { port: 8080, .. }));

    let stored = orch.store().rows("RESULTS").unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].title, None);
    assert!(scanner.batches().iter().all(|path| !path.exists()));

    let exports = std::fs::read_dir(dir.path().join("results")).unwrap();
    assert_eq!(exports.count(), 1);
}

/// A block listed in a later input claims an address an earlier input
/// already named, and the address is exported once.
#[tokio::test]
async fn overlapping_inputs_file_each_address_once() {
    let dir = tempfile::tempdir().unwrap();
    let mut cfg = json_config(dir.path());
    cfg.analysis_only = true;

    let mut orch = Orchestrator::new(
        cfg,
        ScriptedScanner::default(),
        ScriptedFetcher::default(),
        SqliteStore::open_in_memory().unwrap(),
    );
    let mut inputs = strings(&["10.0.1.5"]);
    inputs.extend(strings(&["10.0.0.0/16", "10.0.1.5"]));
    let report = orch.run(inputs).await.unwrap();

    assert_eq!(report.addresses, 1);
    assert_eq!(
        orch.index().owner_of(ip("10.0.1.5")).unwrap().to_string(),
        "10.0.0.0/16"
    );
    assert!(!orch.index().contains_block(&"10.0.1.0/24".parse().unwrap()));

    let exported = read_export(report.exported.as_ref().unwrap());
    let rows: Vec<(String, Ipv4Addr)> = exported
        .iter()
        .map(|r| (r.cidr.to_string(), r.ip))
        .collect();
    assert_eq!(rows, vec![(String::from("10.0.0.0/16"), ip("10.0.1.5"))]);
}

/// A second run that brings a wider block keeps hosts with the block they
/// were first filed under.
#[tokio::test]
async fn later_runs_keep_existing_owners() {
    let dir = tempfile::tempdir().unwrap();
    let mut cfg = json_config(dir.path());
    cfg.analysis_only = true;

    let mut orch = Orchestrator::new(
        cfg,
        ScriptedScanner::default(),
        ScriptedFetcher::default(),
        SqliteStore::open_in_memory().unwrap(),
    );
    orch.run(strings(&["10.0.1.5", "10.0.1.6"])).await.unwrap();
    let report = orch
        .run(strings(&["10.0.0.0/16", "10.0.1.5", "10.0.7.7"]))
        .await
        .unwrap();

    assert_eq!(report.addresses, 3);
    assert_eq!(
        orch.index().owner_of(ip("10.0.1.5")).unwrap().to_string(),
        "10.0.1.0/24"
    );
    assert_eq!(
        orch.index().owner_of(ip("10.0.7.7")).unwrap().to_string(),
        "10.0.0.0/16"
    );
    assert_eq!(read_export(report.exported.as_ref().unwrap()).len(), 3);
}

/// A staging table the store refuses costs persistence only: hosts are
/// still scanned into the index and the index is still exported.
#[tokio::test]
async fn unusable_staging_still_exports() {
    let dir = tempfile::tempdir().unwrap();
    let scanner =
        ScriptedScanner::new(vec![ip("10.0.0.1")]).with_service(ip("10.0.0.1"), 80, "http");
    let fetcher = ScriptedFetcher::default();

    let mut cfg = json_config(dir.path());
    cfg.store.staging_table = "bad-name".into();

    let mut orch = Orchestrator::new(
        cfg,
        scanner.clone(),
        fetcher.clone(),
        SqliteStore::open_in_memory().unwrap(),
    );
    let report = orch
        .run(strings(&["10.0.0.1", "10.0.0.2"]))
        .await
        .unwrap();

    assert_eq!(report.batches, 1);
    assert_eq!(report.persisted, 0);
    assert_eq!(report.enriched, 0);
    assert!(fetcher.requested().is_empty());
    assert!(orch.store().list_tables().unwrap().is_empty());
    assert!(scanner.batches().iter().all(|path| !path.exists()));

    let exported = read_export(report.exported.as_ref().unwrap());
    let ports: Vec<(Ipv4Addr, Option<u16>)> = exported.iter().map(|r| (r.ip, r.port)).collect();
    assert_eq!(ports, vec![(ip("10.0.0.1"), Some(80)), (ip("10.0.0.2"), None)]);
}

/// Nothing alive means nothing to persist, but the analysis is still
/// exported.
#[tokio::test]
async fn silent_network_still_exports_the_analysis() {
    let dir = tempfile::tempdir().unwrap();
    let scanner = ScriptedScanner::default();

    let mut orch = Orchestrator::new(
        json_config(dir.path()),
        scanner.clone(),
        ScriptedFetcher::default(),
        SqliteStore::open_in_memory().unwrap(),
    );
    let report = orch
        .run(strings(&["10.0.0.1", "10.0.0.2"]))
        .await
        .unwrap();

    assert_eq!(scanner.probed(), vec!["10.0.0.0/24"]);
    assert_eq!(report.alive, 0);
    assert_eq!(report.batches, 0);
    assert!(orch.store().list_tables().unwrap().is_empty());
    assert_eq!(read_export(report.exported.as_ref().unwrap()).len(), 2);
}

/// Running the same input twice neither duplicates members nor changes
/// what the index holds.
#[tokio::test]
async fn repeated_runs_leave_the_index_stable() {
    let dir = tempfile::tempdir().unwrap();
    let scanner =
        ScriptedScanner::new(vec![ip("10.0.0.1")]).with_service(ip("10.0.0.1"), 80, "http");

    let mut orch = Orchestrator::new(
        config_in(dir.path()),
        scanner,
        ScriptedFetcher::default(),
        SqliteStore::open_in_memory().unwrap(),
    );
    let input = ["10.0.0.1", "10.0.0.2"];

    orch.run(strings(&input)).await.unwrap();
    let first = netsift_core::reconcile::flatten(orch.index());
    orch.run(strings(&input)).await.unwrap();
    let second = netsift_core::reconcile::flatten(orch.index());

    assert_eq!(first, second);
    assert_eq!(orch.index().total_members(), 2);
}
