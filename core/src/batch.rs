//! Host list files handed to the service scanner.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::Result;
use crate::export::file_stamp;

const CREATE_ATTEMPTS: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchFile {
    pub path: PathBuf,
    pub hosts: Vec<Ipv4Addr>,
}

impl BatchFile {
    pub fn remove(&self) {
        if let Err(e) = fs::remove_file(&self.path) {
            warn!("Could not remove batch file {}: {e}", self.path.display());
        }
    }
}

/// Splits `alive` into chunks of `size` hosts, highest address first, and
/// writes each chunk to its own freshly named file under `dir`.
pub fn write_batches(alive: &[Ipv4Addr], size: usize, dir: &Path) -> Result<Vec<BatchFile>> {
    if alive.is_empty() {
        return Ok(Vec::new());
    }
    fs::create_dir_all(dir)?;

    let mut hosts = alive.to_vec();
    hosts.sort_unstable_by(|a, b| b.cmp(a));
    hosts.dedup();

    let mut batches = Vec::new();
    for chunk in hosts.chunks(size.max(1)) {
        let path = create_file(dir, chunk)?;
        debug!("Batch {} holds {} hosts", path.display(), chunk.len());
        batches.push(BatchFile {
            path,
            hosts: chunk.to_vec(),
        });
    }
    Ok(batches)
}

fn create_file(dir: &Path, hosts: &[Ipv4Addr]) -> Result<PathBuf> {
    let body: String = hosts.iter().map(|ip| format!("{ip}\n")).collect();

    for _ in 0..CREATE_ATTEMPTS {
        let path = dir.join(format!("{}.txt", file_stamp()));
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(mut file) => {
                file.write_all(body.as_bytes())?;
                return Ok(path);
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(e.into()),
        }
    }

    Err(io::Error::new(
        io::ErrorKind::AlreadyExists,
        format!("no free batch file name under {}", dir.display()),
    )
    .into())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hosts(n: u8) -> Vec<Ipv4Addr> {
        (1..=n).map(|i| Ipv4Addr::new(10, 0, 0, i)).collect()
    }

    #[test]
    fn hosts_are_chunked_in_descending_order() {
        let dir = tempfile::tempdir().unwrap();
        let batches = write_batches(&hosts(5), 2, dir.path()).unwrap();

        assert_eq!(batches.len(), 3);
        assert_eq!(batches[0].hosts, vec![
            Ipv4Addr::new(10, 0, 0, 5),
            Ipv4Addr::new(10, 0, 0, 4)
        ]);
        assert_eq!(batches[2].hosts, vec![Ipv4Addr::new(10, 0, 0, 1)]);

        let text = fs::read_to_string(&batches[0].path).unwrap();
        assert_eq!(text, "10.0.0.5\n10.0.0.4\n");
    }

    #[test]
    fn every_batch_gets_its_own_file() {
        let dir = tempfile::tempdir().unwrap();
        let batches = write_batches(&hosts(40), 1, dir.path()).unwrap();

        let mut paths: Vec<_> = batches.iter().map(|b| b.path.clone()).collect();
        paths.sort();
        paths.dedup();
        assert_eq!(paths.len(), 40);

        for batch in &batches {
            batch.remove();
        }
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn nothing_alive_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        assert!(write_batches(&[], 256, dir.path()).unwrap().is_empty());
    }
}
