use anyhow::{Context, Result};
use clap::ValueEnum;
use serde::Serialize;
use std::fs::File;
use std::io::{self, BufWriter};
use std::path::Path;

use daybook_core::db::{DAILY_TABLE, SIGNALS_TABLE};
use daybook_core::service::DaybookService;

use super::helpers::print_json;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum ExportTable {
    Daily,
    Signals,
}

impl ExportTable {
    fn table_name(self) -> &'static str {
        match self {
            ExportTable::Daily => DAILY_TABLE,
            ExportTable::Signals => SIGNALS_TABLE,
        }
    }
}

pub(crate) fn cmd_export(
    svc: &DaybookService,
    table: ExportTable,
    output: Option<&Path>,
    json: bool,
) -> Result<()> {
    #[derive(Serialize)]
    struct ExportSummary<'a> {
        table: &'a str,
        rows: usize,
        output: Option<String>,
    }

    let name = table.table_name();
    let rows = if let Some(path) = output {
        let file = File::create(path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        svc.export_csv(name, BufWriter::new(file))?
    } else {
        svc.export_csv(name, io::stdout().lock())?
    };

    let summary = ExportSummary {
        table: name,
        rows,
        output: output.map(|p| p.display().to_string()),
    };
    if json && output.is_some() {
        return print_json(&summary);
    }
    match &summary.output {
        Some(path) => eprintln!("Exported {rows} {name} row(s) to {path}"),
        None => eprintln!("Exported {rows} {name} row(s)"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_export_empty_daily_table_to_file() {
        let svc = DaybookService::new_in_memory(Vec::new()).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("daily.csv");
        cmd_export(&svc, ExportTable::Daily, Some(&path), false).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("date,"));
        assert!(text.trim_end().ends_with("full_entry"));
    }

    #[test]
    fn test_table_names() {
        assert_eq!(ExportTable::Daily.table_name(), "daily");
        assert_eq!(ExportTable::Signals.table_name(), "signals");
    }
}
