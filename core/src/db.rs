use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;

use chrono::NaiveDate;
use rusqlite::{Connection, OptionalExtension, params, params_from_iter};
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{Error, Result, Violation};
use crate::models::{
    DAILY_COLUMNS, DEFAULT_CONFIDENCE, Record, SIGNAL_COLUMNS, Signal, SignalSource,
};
use crate::schema::validate_fields;

pub const DAILY_TABLE: &str = "daily";
pub const SIGNALS_TABLE: &str = "signals";

/// A stored day read back through validation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredDay {
    pub record: Record,
    pub full_entry: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UpsertOutcome {
    Inserted,
    Updated,
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn column_defs(columns: &[&str]) -> String {
    columns
        .iter()
        .map(|c| format!("{} TEXT NOT NULL DEFAULT ''", quote_ident(c)))
        .collect::<Vec<_>>()
        .join(",\n    ")
}

/// Row store keyed by date: a `daily` table with one text column per header entry, and an
/// append-only `signals` side table.
pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        let db = Database { conn };
        db.migrate()?;
        Ok(db)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Database { conn };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<()> {
        let version: i64 = self
            .conn
            .pragma_query_value(None, "user_version", |row| row.get(0))?;

        if version < 1 {
            self.conn.execute_batch(&format!(
                "CREATE TABLE IF NOT EXISTS {DAILY_TABLE} (
    {}
);
CREATE INDEX IF NOT EXISTS idx_daily_date ON {DAILY_TABLE}(date);

CREATE TABLE IF NOT EXISTS {SIGNALS_TABLE} (
    {}
);
CREATE INDEX IF NOT EXISTS idx_signals_date ON {SIGNALS_TABLE}(date);

PRAGMA user_version = 1;",
                column_defs(DAILY_COLUMNS),
                column_defs(SIGNAL_COLUMNS),
            ))?;
        }

        Ok(())
    }

    /// Column names of `table` in header order. Empty if the table does not exist.
    pub fn header(&self, table: &str) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare(&format!("PRAGMA table_info({})", quote_ident(table)))?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(1))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(names)
    }

    /// Append `name` to the header of `table` if absent. Returns whether it was added.
    pub fn ensure_column(&self, table: &str, name: &str) -> Result<bool> {
        if self.header(table)?.iter().any(|c| c == name) {
            return Ok(false);
        }
        self.conn.execute(
            &format!(
                "ALTER TABLE {} ADD COLUMN {} TEXT NOT NULL DEFAULT ''",
                quote_ident(table),
                quote_ident(name)
            ),
            [],
        )?;
        debug!(table, column = name, "added column");
        Ok(true)
    }

    /// Overwrite the row whose `date` matches, or append a new one.
    ///
    /// Values are aligned to the header: missing keys become empty strings and keys outside the
    /// header are ignored.
    pub fn upsert_row(&self, table: &str, row: &BTreeMap<String, String>) -> Result<UpsertOutcome> {
        let header = self.header(table)?;
        if header.is_empty() {
            return Err(Error::SchemaMismatch(format!("table '{table}' has no header")));
        }
        if !header.iter().any(|c| c == "date") {
            return Err(Error::SchemaMismatch(format!(
                "table '{table}' has no 'date' column"
            )));
        }
        let date = row.get("date").map(|d| d.trim()).unwrap_or_default();
        if date.is_empty() {
            return Err(Error::InvalidInput(vec![Violation::new(
                "date",
                "",
                "row has no date",
            )]));
        }

        let values: Vec<String> = header
            .iter()
            .map(|c| row.get(c).cloned().unwrap_or_default())
            .collect();
        let table_q = quote_ident(table);

        let existing: Option<i64> = self
            .conn
            .query_row(
                &format!("SELECT rowid FROM {table_q} WHERE date = ?1 ORDER BY rowid LIMIT 1"),
                params![date],
                |r| r.get(0),
            )
            .optional()?;

        if let Some(rowid) = existing {
            let assignments = header
                .iter()
                .enumerate()
                .map(|(i, c)| format!("{} = ?{}", quote_ident(c), i + 1))
                .collect::<Vec<_>>()
                .join(", ");
            let sql = format!(
                "UPDATE {table_q} SET {assignments} WHERE rowid = ?{}",
                header.len() + 1
            );
            let mut bound: Vec<rusqlite::types::Value> =
                values.into_iter().map(rusqlite::types::Value::from).collect();
            bound.push(rusqlite::types::Value::from(rowid));
            self.conn.execute(&sql, params_from_iter(bound))?;
            debug!(table, date, "updated row");
            Ok(UpsertOutcome::Updated)
        } else {
            let columns = header
                .iter()
                .map(|c| quote_ident(c))
                .collect::<Vec<_>>()
                .join(", ");
            let placeholders = (1..=header.len())
                .map(|i| format!("?{i}"))
                .collect::<Vec<_>>()
                .join(", ");
            self.conn.execute(
                &format!("INSERT INTO {table_q} ({columns}) VALUES ({placeholders})"),
                params_from_iter(values),
            )?;
            debug!(table, date, "inserted row");
            Ok(UpsertOutcome::Inserted)
        }
    }

    /// Append one side-table row per signal. No matching against existing rows.
    pub fn append_signals(&self, date: NaiveDate, signals: &[Signal]) -> Result<usize> {
        let date = date.format("%Y-%m-%d").to_string();
        let tx = self.conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare(&format!(
                "INSERT INTO {SIGNALS_TABLE} (date, key, value, unit, source, confidence)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)"
            ))?;
            for s in signals {
                stmt.execute(params![
                    date,
                    s.key,
                    s.value,
                    s.unit,
                    s.source.as_str(),
                    s.confidence.to_string()
                ])?;
            }
        }
        tx.commit()?;
        Ok(signals.len())
    }

    fn rows_where(
        &self,
        table: &str,
        clause: &str,
        args: &[&dyn rusqlite::ToSql],
    ) -> Result<Vec<BTreeMap<String, String>>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT * FROM {} {clause}", quote_ident(table)))?;
        let names: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let rows = stmt
            .query_map(args, |row| {
                let mut map = BTreeMap::new();
                for (i, name) in names.iter().enumerate() {
                    let value: Option<String> = row.get(i)?;
                    map.insert(name.clone(), value.unwrap_or_default());
                }
                Ok(map)
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Raw daily row for `date`, keyed by column name.
    pub fn get_row(&self, date: NaiveDate) -> Result<Option<BTreeMap<String, String>>> {
        let date = date.format("%Y-%m-%d").to_string();
        let mut rows = self.rows_where(
            DAILY_TABLE,
            "WHERE date = ?1 ORDER BY rowid LIMIT 1",
            &[&date],
        )?;
        Ok(rows.pop())
    }

    /// The stored day for `date`, validated, with its signals attached.
    pub fn get_day(&self, date: NaiveDate) -> Result<Option<StoredDay>> {
        let Some(row) = self.get_row(date)? else {
            return Ok(None);
        };
        let mut day = stored_day(date, &row)?;
        day.record.signals = self.signals_for_date(date)?;
        Ok(Some(day))
    }

    /// Up to `limit` stored days, newest first. Rows that no longer validate are skipped with a
    /// warning and do not count against the limit. Signals are not attached; use
    /// [`Database::signals_for_date`] for those.
    pub fn history(&self, limit: Option<usize>) -> Result<Vec<StoredDay>> {
        let rows = self.rows_where(DAILY_TABLE, "ORDER BY date DESC", &[])?;
        let limit = limit.unwrap_or(usize::MAX);

        let mut days = Vec::new();
        for row in rows {
            if days.len() >= limit {
                break;
            }
            let raw_date = row.get("date").map(String::as_str).unwrap_or_default();
            let Ok(date) = NaiveDate::parse_from_str(raw_date, "%Y-%m-%d") else {
                warn!(date = raw_date, "skipping row with unparseable date");
                continue;
            };
            match stored_day(date, &row) {
                Ok(day) => days.push(day),
                Err(e) => warn!(%date, error = %e, "skipping row that fails validation"),
            }
        }
        Ok(days)
    }

    pub fn signals_for_date(&self, date: NaiveDate) -> Result<Vec<Signal>> {
        let date = date.format("%Y-%m-%d").to_string();
        let mut stmt = self.conn.prepare(&format!(
            "SELECT key, value, unit, source, confidence FROM {SIGNALS_TABLE}
             WHERE date = ?1 ORDER BY rowid"
        ))?;
        let signals = stmt
            .query_map(params![date], |row| {
                let source: String = row.get(3)?;
                let confidence: String = row.get(4)?;
                Ok(Signal {
                    key: row.get(0)?,
                    value: row.get(1)?,
                    unit: row.get(2)?,
                    source: SignalSource::from_tag(&source),
                    confidence: confidence.parse().unwrap_or(DEFAULT_CONFIDENCE),
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(signals)
    }

    /// Write `table` as CSV (header first, rows in insertion order). Returns the row count.
    pub fn export_csv<W: Write>(&self, table: &str, writer: W) -> Result<usize> {
        let header = self.header(table)?;
        if header.is_empty() {
            return Err(Error::SchemaMismatch(format!("table '{table}' has no header")));
        }
        let mut out = csv::Writer::from_writer(writer);
        out.write_record(&header)?;

        let columns = header
            .iter()
            .map(|c| format!("COALESCE({}, '')", quote_ident(c)))
            .collect::<Vec<_>>()
            .join(", ");
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {columns} FROM {} ORDER BY rowid",
            quote_ident(table)
        ))?;
        let width = header.len();
        let rows = stmt
            .query_map([], |row| {
                (0..width)
                    .map(|i| row.get::<_, String>(i))
                    .collect::<rusqlite::Result<Vec<_>>>()
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        for row in &rows {
            out.write_record(row)?;
        }
        out.flush()?;
        Ok(rows.len())
    }
}

fn stored_day(date: NaiveDate, row: &BTreeMap<String, String>) -> Result<StoredDay> {
    Ok(StoredDay {
        record: validate_fields(date, row)?,
        full_entry: row.get("full_entry").cloned().unwrap_or_default(),
    })
}
