//! Result files.
//!
//! Flat rows are written as CSV (one header line, empty cells for missing
//! values) or as a pretty-printed JSON array. Generated file names carry a
//! timestamp plus a random suffix so repeated runs never overwrite each
//! other.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::Local;
use tracing::{debug, info};

use netsift_common::config::{ExportConfig, ExportFormat};
use netsift_common::models::FlatRecord;

use crate::error::Result;
use crate::store::{COLUMNS, Store};

/// `YYYYmmddHHMMSS` followed by a number in `0..=9999`.
pub(crate) fn file_stamp() -> String {
    format!(
        "{}{}",
        Local::now().format("%Y%m%d%H%M%S"),
        rand::random_range(0..=9999)
    )
}

/// `export.path` when set, otherwise a fresh name under `export.dir`.
pub fn output_path(cfg: &ExportConfig) -> PathBuf {
    match &cfg.path {
        Some(path) => path.clone(),
        None => cfg.dir.join(format!(
            "netsift_{}.{}",
            file_stamp(),
            cfg.format.extension()
        )),
    }
}

pub fn write_records(path: &Path, rows: &[FlatRecord], format: ExportFormat) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let file = File::create(path)?;
    match format {
        ExportFormat::Csv => {
            let mut writer = csv::Writer::from_writer(file);
            // serde only emits the header with the first row
            if rows.is_empty() {
                writer.write_record(COLUMNS)?;
            }
            for row in rows {
                writer.serialize(row)?;
            }
            writer.flush()?;
        }
        ExportFormat::Json => {
            let mut writer = BufWriter::new(file);
            serde_json::to_writer_pretty(&mut writer, rows)?;
            writer.write_all(b"\n")?;
            writer.flush()?;
        }
    }

    debug!("Wrote {} rows to {}", rows.len(), path.display());
    Ok(())
}

/// Writes the run's rows and returns where they went.
pub fn export_records(rows: &[FlatRecord], cfg: &ExportConfig) -> Result<PathBuf> {
    let path = output_path(cfg);
    write_records(&path, rows, cfg.format)?;
    info!("Exported {} rows to {}", rows.len(), path.display());
    Ok(path)
}

/// Dumps every row of `table` to `dir/all_<table>_data_<stamp>.<ext>`.
pub fn export_table<D: Store + ?Sized>(
    store: &D,
    table: &str,
    dir: &Path,
    format: ExportFormat,
) -> Result<PathBuf> {
    let rows = store.rows(table)?;
    let path = dir.join(format!(
        "all_{table}_data_{}.{}",
        file_stamp(),
        format.extension()
    ));
    write_records(&path, &rows, format)?;
    info!(
        "Exported {} rows of {table} to {}",
        rows.len(),
        path.display()
    );
    Ok(path)
}
