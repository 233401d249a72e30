//! An `nmap` process adapter.
//!
//! Probes run as `[sudo] nmap <args> [-p ports] [--proxies ..] -oX - <target>`
//! and the XML written to stdout is parsed with `quick-xml`. Elevation is only
//! requested when configured and the process is not already root.

use std::collections::BTreeMap;
use std::net::Ipv4Addr;
use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use tokio::process::Command;
use tracing::{debug, trace};

use netsift_common::config::ScanConfig;
use netsift_common::models::{HostPorts, ServiceObservation};

use super::{LivenessReport, ScanStats, Scanner, ServiceReport};
use crate::error::{Error, Result};

/// What follows the options on the command line.
#[derive(Debug, Clone, Copy)]
enum Probe<'a> {
    /// A single address or block.
    Target(&'a str),
    /// `-iL <file>`.
    List(&'a Path),
}

pub struct NmapScanner {
    cfg: ScanConfig,
    elevate: bool,
}

impl NmapScanner {
    pub fn new(cfg: &ScanConfig) -> Self {
        Self {
            cfg: cfg.clone(),
            elevate: cfg.sudo && !is_root::is_root(),
        }
    }

    /// Program and arguments for one invocation.
    fn command_line(&self, args: &str, ports: Option<String>, probe: Probe<'_>) -> Vec<String> {
        let mut argv: Vec<String> = Vec::new();
        if self.elevate {
            argv.push("sudo".into());
        }
        argv.push(self.cfg.nmap_path.display().to_string());
        argv.extend(args.split_whitespace().map(String::from));

        if let Some(ports) = ports {
            argv.push("-p".into());
            argv.push(ports);
        }
        if let Some(proxies) = &self.cfg.proxies {
            argv.push("--proxies".into());
            argv.push(proxies.clone());
        }

        argv.push("-oX".into());
        argv.push("-".into());

        match probe {
            Probe::Target(target) => argv.push(target.to_string()),
            Probe::List(path) => {
                argv.push("-iL".into());
                argv.push(path.display().to_string());
            }
        }
        argv
    }

    async fn run(&self, argv: Vec<String>) -> Result<NmapRun> {
        let Some((program, args)) = argv.split_first() else {
            return Err(Error::Scanner("empty command line".into()));
        };
        debug!("Running {}", argv.join(" "));

        let output = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::Scanner(format!(
                "{} ({})",
                stderr.trim(),
                output.status
            )));
        }

        let xml = String::from_utf8_lossy(&output.stdout);
        let mut run = parse_xml(&xml)?;
        if run.stats.command_line.is_empty() {
            run.stats.command_line = argv.join(" ");
        }
        Ok(run)
    }
}

#[async_trait]
impl Scanner for NmapScanner {
    async fn liveness(&self, target: &str) -> Result<LivenessReport> {
        let argv = self.command_line(&self.cfg.alive_args, None, Probe::Target(target));
        let run = self.run(argv).await?;
        Ok(run.into_liveness())
    }

    async fn services(&self, batch: &Path) -> Result<ServiceReport> {
        let argv = self.command_line(&self.cfg.port_args, self.cfg.port_spec(), Probe::List(batch));
        let run = self.run(argv).await?;
        Ok(run.into_services())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NmapHost {
    pub addr: Option<Ipv4Addr>,
    pub up: bool,
    pub ports: BTreeMap<u16, ServiceObservation>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NmapRun {
    pub hosts: Vec<NmapHost>,
    pub stats: ScanStats,
}

impl NmapRun {
    pub fn into_liveness(self) -> LivenessReport {
        let alive = self
            .hosts
            .into_iter()
            .filter(|host| host.up)
            .filter_map(|host| host.addr)
            .collect();
        LivenessReport {
            alive,
            stats: self.stats,
        }
    }

    /// Hosts without any TCP port are left out.
    pub fn into_services(self) -> ServiceReport {
        let mut hosts = HostPorts::new();
        for host in self.hosts {
            if let Some(addr) = host.addr.filter(|_| !host.ports.is_empty()) {
                hosts.entry(addr).or_default().extend(host.ports);
            }
        }
        ServiceReport {
            hosts,
            stats: self.stats,
        }
    }
}

#[derive(Default)]
struct XmlState {
    run: NmapRun,
    host: Option<NmapHost>,
    port: Option<(u16, ServiceObservation)>,
    in_cpe: bool,
}

impl XmlState {
    fn open(&mut self, name: &str, e: &BytesStart<'_>) -> Result<()> {
        match name {
            "nmaprun" => {
                if let Some(args) = attr(e, "args")? {
                    self.run.stats.command_line = args;
                }
            }
            "host" => self.host = Some(NmapHost::default()),
            "status" => {
                if let Some(host) = self.host.as_mut() {
                    host.up = attr(e, "state")?.as_deref() == Some("up");
                }
            }
            "address" => {
                if let Some(host) = self.host.as_mut() {
                    if attr(e, "addrtype")?.as_deref() == Some("ipv4") {
                        host.addr = attr(e, "addr")?.and_then(|a| a.parse().ok());
                    }
                }
            }
            "port" if self.host.is_some() => {
                let is_tcp = attr(e, "protocol")?.as_deref() == Some("tcp");
                let id = attr(e, "portid")?.and_then(|p| p.parse::<u16>().ok());
                self.port = id
                    .filter(|_| is_tcp)
                    .map(|id| (id, ServiceObservation::default()));
            }
            "state" => {
                if let Some((_, obs)) = self.port.as_mut() {
                    obs.state = attr(e, "state")?.unwrap_or_default();
                    obs.reason = attr(e, "reason")?;
                }
            }
            "service" => {
                if let Some((_, obs)) = self.port.as_mut() {
                    obs.name = attr(e, "name")?;
                    obs.product = attr(e, "product")?;
                    obs.version = attr(e, "version")?;
                    obs.extrainfo = attr(e, "extrainfo")?;
                    obs.conf = attr(e, "conf")?;
                }
            }
            "cpe" => self.in_cpe = self.port.is_some(),
            "finished" => {
                self.run.stats.elapsed = attr(e, "elapsed")?
                    .and_then(|v| v.parse().ok())
                    .unwrap_or_default();
            }
            "hosts" => {
                self.run.stats.up_hosts = attr(e, "up")?
                    .and_then(|v| v.parse().ok())
                    .unwrap_or_default();
                self.run.stats.total_hosts = attr(e, "total")?
                    .and_then(|v| v.parse().ok())
                    .unwrap_or_default();
            }
            _ => {}
        }
        Ok(())
    }

    fn close(&mut self, name: &str) {
        match name {
            "port" => {
                if let (Some((id, obs)), Some(host)) = (self.port.take(), self.host.as_mut()) {
                    host.ports.insert(id, obs);
                }
            }
            "host" => {
                if let Some(host) = self.host.take() {
                    self.run.hosts.push(host);
                }
            }
            "cpe" => self.in_cpe = false,
            _ => {}
        }
    }

    fn text(&mut self, text: &str) {
        if !self.in_cpe {
            return;
        }
        if let Some((_, obs)) = self.port.as_mut() {
            obs.cpe = Some(text.to_string());
        }
    }
}

fn attr(e: &BytesStart<'_>, key: &str) -> Result<Option<String>> {
    for attr in e.attributes() {
        let attr = attr.map_err(|err| Error::Xml(err.to_string()))?;
        if attr.key.as_ref() == key.as_bytes() {
            return Ok(Some(attr.unescape_value()?.into_owned()));
        }
    }
    Ok(None)
}

/// Parses an `-oX` document.
pub fn parse_xml(xml: &str) -> Result<NmapRun> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut state = XmlState::default();
    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                state.open(&name, &e)?;
            }
            Event::Empty(e) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                state.open(&name, &e)?;
                state.close(&name);
            }
            Event::End(e) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                state.close(&name);
            }
            Event::Text(t) => state.text(&t.unescape()?),
            Event::Eof => break,
            _ => {}
        }
    }

    trace!("Parsed {} hosts", state.run.hosts.len());
    Ok(state.run)
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
