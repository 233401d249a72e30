use anyhow::Context;
use colored::*;

use netsift_common::config::Config;
use netsift_common::success;
use netsift_core::export;
use netsift_core::store::{SqliteStore, Store};

use super::TableAction;
use crate::terminal::print;

pub fn tables(action: TableAction, cfg: &Config) -> anyhow::Result<()> {
    let store = SqliteStore::open(&cfg.store.path)
        .with_context(|| format!("Could not open result store {}", cfg.store.path.display()))?;
    run(&store, action, cfg)
}

pub fn run<D: Store>(store: &D, action: TableAction, cfg: &Config) -> anyhow::Result<()> {
    match action {
        TableAction::List => {
            print::header("tables");
            for name in store.list_tables()? {
                let rows = store.rows(&name)?.len();
                print::aligned_line(&name, rows.to_string().green());
            }
        }
        TableAction::Merge { src, dst } => {
            let moved = store.merge_tables(&src, &dst)?;
            success!("Moved {moved} rows from {src} into {dst}");
        }
        TableAction::Export {
            name,
            output,
            format,
        } => {
            anyhow::ensure!(store.table_exists(&name)? > 0, "No table named {name}");
            let dir = output.unwrap_or_else(|| cfg.export.dir.clone());
            let path =
                export::export_table(store, &name, &dir, format.unwrap_or(cfg.export.format))?;
            success!("Wrote {}", path.display());
        }
    }
    Ok(())
}
