use std::fs;
use std::net::Ipv4Addr;
use std::path::Path;

use rusqlite::types::Type;
use rusqlite::{Connection, Row, params, params_from_iter};
use tracing::debug;

use netsift_common::models::{FlatRecord, HttpUpdate};
use netsift_common::network::cidr::CidrBlock;
use netsift_common::predicate::Predicate;

use super::{COLUMNS, Store, validate_identifier, where_clause};
use crate::error::Result;

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Opens (or creates) the database file, creating parent directories.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        debug!("Opened result store at {}", path.display());
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self> {
        Ok(Self {
            conn: Connection::open_in_memory()?,
        })
    }
}

fn column_list() -> String {
    COLUMNS.join(", ")
}

fn text_column<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: String = row.get(idx)?;
    raw.parse()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn int_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<u16>> {
    let raw: Option<i64> = row.get(idx)?;
    Ok(raw.and_then(|v| u16::try_from(v).ok()))
}

fn read_row(row: &Row<'_>) -> rusqlite::Result<FlatRecord> {
    let cidr: CidrBlock = text_column(row, 0)?;
    let ip: Ipv4Addr = text_column(row, 1)?;
    Ok(FlatRecord {
        cidr,
        ip,
        domain: row.get(2)?,
        port: int_column(row, 3)?,
        state: row.get(4)?,
        reason: row.get(5)?,
        name: row.get(6)?,
        product: row.get(7)?,
        version: row.get(8)?,
        extrainfo: row.get(9)?,
        conf: row.get(10)?,
        cpe: row.get(11)?,
        title: row.get(12)?,
        status: int_column(row, 13)?,
    })
}

impl Store for SqliteStore {
    fn create_table(&self, table: &str) -> Result<()> {
        let table = validate_identifier(table)?;
        self.conn.execute(
            &format!(
                "CREATE TABLE IF NOT EXISTS {table} (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    cidr TEXT NOT NULL,
                    ip TEXT,
                    domain TEXT,
                    port INT,
                    state TEXT,
                    reason TEXT,
                    name TEXT,
                    product TEXT,
                    version TEXT,
                    extrainfo TEXT,
                    conf TEXT,
                    cpe TEXT,
                    title TEXT,
                    status INT
                )"
            ),
            [],
        )?;
        debug!("Table {table} ready");
        Ok(())
    }

    fn table_exists(&self, table: &str) -> Result<usize> {
        let table = validate_identifier(table)?;
        let count: i64 = self.conn.query_row(
            "SELECT count(name) FROM sqlite_master WHERE type = 'table' AND name = ?1",
            params![table],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    fn drop_table(&self, table: &str) -> Result<()> {
        let table = validate_identifier(table)?;
        self.conn
            .execute(&format!("DROP TABLE IF EXISTS {table}"), [])?;
        debug!("Dropped table {table}");
        Ok(())
    }

    fn insert(&self, table: &str, rows: &[FlatRecord]) -> Result<usize> {
        let table = validate_identifier(table)?;
        let tx = self.conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare_cached(&format!(
                "INSERT INTO {table} ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
                column_list()
            ))?;
            for row in rows {
                stmt.execute(params![
                    row.cidr.to_string(),
                    row.ip.to_string(),
                    row.domain,
                    row.port,
                    row.state,
                    row.reason,
                    row.name,
                    row.product,
                    row.version,
                    row.extrainfo,
                    row.conf,
                    row.cpe,
                    row.title,
                    row.status,
                ])?;
            }
        }
        tx.commit()?;
        debug!("Inserted {} rows into {table}", rows.len());
        Ok(rows.len())
    }

    fn update_http(&self, table: &str, updates: &[HttpUpdate]) -> Result<usize> {
        let table = validate_identifier(table)?;
        let tx = self.conn.unchecked_transaction()?;
        let mut changed = 0;
        {
            let mut stmt = tx.prepare_cached(&format!(
                "UPDATE {table} SET title = ?1, status = ?2 WHERE ip = ?3 AND port = ?4"
            ))?;
            for update in updates {
                changed += stmt.execute(params![
                    update.title,
                    update.status,
                    update.ip.to_string(),
                    update.port,
                ])?;
            }
        }
        tx.commit()?;
        debug!("Updated {changed} rows of {table}");
        Ok(changed)
    }

    fn query(&self, table: &str, predicate: &Predicate) -> Result<Vec<FlatRecord>> {
        let table = validate_identifier(table)?;
        let (filter, values) = where_clause(predicate)?;
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM {table}{filter} ORDER BY id",
            column_list()
        ))?;
        let rows = stmt
            .query_map(params_from_iter(values.iter()), read_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    fn merge_tables(&self, src: &str, dst: &str) -> Result<usize> {
        let src = validate_identifier(src)?;
        let dst = validate_identifier(dst)?;
        self.create_table(dst)?;

        let columns = column_list();
        let tx = self.conn.unchecked_transaction()?;
        let moved = tx.execute(
            &format!("INSERT INTO {dst} ({columns}) SELECT {columns} FROM {src} ORDER BY id"),
            [],
        )?;
        tx.commit()?;

        self.clean(src)?;
        debug!("Moved {moved} rows from {src} into {dst}");
        Ok(moved)
    }

    fn clean(&self, table: &str) -> Result<()> {
        self.drop_table(table)
    }

    fn list_tables(&self) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )?;
        let names = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(names)
    }
}
