//! # Input Loaders
//!
//! Reads target files into [`RawInput`]. Text files become string input,
//! CSV and JSON files become records. Bytes that are not valid UTF-8 are
//! decoded lossily with a warning instead of failing the file.

use std::path::Path;

use serde_json::Value;
use tracing::{debug, trace, warn};

use netsift_common::network::target::{FileFormat, Target};

use crate::classify::{RawInput, Record};
use crate::error::Result;

fn read_text(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path)?;
    let text = match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(e) => {
            warn!("{} is not valid UTF-8, undecodable bytes replaced", path.display());
            String::from_utf8_lossy(e.as_bytes()).into_owned()
        }
    };
    Ok(text)
}

/// One token per line. Blank lines are skipped.
pub fn load_txt(path: &Path) -> Result<RawInput> {
    trace!("Reading {}", path.display());
    let text = read_text(path)?;
    let items: Vec<String> = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(String::from)
        .collect();

    debug!("{} lines from {}", items.len(), path.display());
    Ok(RawInput::Strings(items))
}

/// Header row plus data rows. Short rows simply lack the trailing columns.
pub fn load_csv(path: &Path) -> Result<RawInput> {
    trace!("Reading {}", path.display());
    let text = read_text(path)?;
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let headers = reader.headers()?.clone();
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let row: Record = headers
            .iter()
            .zip(record.iter())
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        rows.push(row);
    }

    debug!("{} rows from {}", rows.len(), path.display());
    Ok(RawInput::Records(rows))
}

/// An array of objects. Scalar values are turned into their text form;
/// arrays are comma-joined; nulls are left out. Array items that are not
/// objects are skipped.
pub fn load_json(path: &Path) -> Result<RawInput> {
    trace!("Reading {}", path.display());
    let text = read_text(path)?;
    let value: Value = serde_json::from_str(&text)?;

    let items = match value {
        Value::Array(items) => items,
        other => vec![other],
    };

    let mut rows = Vec::with_capacity(items.len());
    for item in items {
        let Value::Object(map) = item else {
            trace!("Skipping non-object JSON item");
            continue;
        };
        let row: Record = map
            .into_iter()
            .filter_map(|(key, value)| coerce(value).map(|text| (key, text)))
            .collect();
        rows.push(row);
    }

    debug!("{} rows from {}", rows.len(), path.display());
    Ok(RawInput::Records(rows))
}

fn coerce(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Array(items) => Some(
            items
                .into_iter()
                .filter_map(coerce)
                .collect::<Vec<_>>()
                .join(","),
        ),
        other => Some(other.to_string()),
    }
}

pub fn load_file(path: &Path, format: FileFormat) -> Result<RawInput> {
    match format {
        FileFormat::Txt => load_txt(path),
        FileFormat::Csv => load_csv(path),
        FileFormat::Json => load_json(path),
    }
}

/// Turns command line targets into inputs. Bare addresses and blocks are
/// gathered into one string input; each file becomes its own input.
pub fn collect_inputs(targets: Vec<Target>) -> Result<Vec<RawInput>> {
    let mut tokens = Vec::new();
    let mut inputs = Vec::new();

    for target in targets.into_iter().flat_map(Target::flatten) {
        match target {
            Target::Host { addr } => tokens.push(addr.to_string()),
            Target::Block { cidr } => tokens.push(cidr.to_string()),
            Target::File { path, format } => inputs.push(load_file(&path, format)?),
            Target::Multi { .. } => {}
        }
    }

    if !tokens.is_empty() {
        inputs.insert(0, RawInput::Strings(tokens));
    }
    Ok(inputs)
}
