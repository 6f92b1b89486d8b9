use std::io::Write;
use std::path::Path;

use chrono::{Duration, NaiveDate};
use tracing::info;

use crate::db::{DAILY_TABLE, Database, StoredDay, UpsertOutcome};
use crate::draft::{CommittedRecord, Draft};
use crate::error::{Error, Result};
use crate::generator::{DecodeMode, Generator, first_success};
use crate::insights::{
    METRICS_CONTEXT_DAYS, StreakThresholds, Streaks, WeekStats, foods_context, metrics_context,
    streaks, week_stats,
};
use crate::models::{DAILY_COLUMNS, Record, Signal};
use crate::prompts::{REVIEW_SYSTEM, ask_system, ask_user, review_user};
use crate::reconcile::Reconciler;

/// Facade over storage and the extraction pipeline. Used by the CLI.
pub struct DaybookService {
    db: Database,
    reconciler: Reconciler,
}

impl DaybookService {
    pub fn new(db_path: &Path, backends: Vec<Box<dyn Generator>>) -> Result<Self> {
        let db = Database::open(db_path)?;
        Ok(Self {
            db,
            reconciler: Reconciler::new(backends),
        })
    }

    pub fn new_in_memory(backends: Vec<Box<dyn Generator>>) -> Result<Self> {
        let db = Database::open_in_memory()?;
        Ok(Self {
            db,
            reconciler: Reconciler::new(backends),
        })
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    // --- Pipeline ---

    pub fn extract(&self, draft: Draft) -> Result<Draft> {
        self.reconciler.extract(draft)
    }

    /// Validate the draft, persist it, then mark it committed.
    ///
    /// If storage fails the draft keeps its state and can be committed again.
    pub fn commit(&self, draft: &mut Draft) -> Result<CommittedRecord> {
        let committed = draft.prepare_commit()?;
        self.save(&committed)?;
        draft.mark_committed();
        Ok(committed)
    }

    /// Upsert the daily row, then append the record's signals.
    pub fn save(&self, committed: &CommittedRecord) -> Result<UpsertOutcome> {
        for column in DAILY_COLUMNS {
            self.db.ensure_column(DAILY_TABLE, column)?;
        }
        let record = &committed.record;
        let outcome = self
            .db
            .upsert_row(DAILY_TABLE, &record.to_row(&committed.full_entry)?)?;
        let appended = self.db.append_signals(record.date, &record.signals)?;
        info!(date = %record.date, ?outcome, signals = appended, "committed day");
        Ok(outcome)
    }

    // --- Queries ---

    pub fn get_day(&self, date: NaiveDate) -> Result<Option<StoredDay>> {
        self.db.get_day(date)
    }

    pub fn history(&self, limit: Option<usize>) -> Result<Vec<StoredDay>> {
        self.db.history(limit)
    }

    pub fn signals_for_date(&self, date: NaiveDate) -> Result<Vec<Signal>> {
        self.db.signals_for_date(date)
    }

    fn records(&self, limit: Option<usize>) -> Result<Vec<Record>> {
        Ok(self
            .db
            .history(limit)?
            .into_iter()
            .map(|d| d.record)
            .collect())
    }

    pub fn streaks(&self, today: NaiveDate, thresholds: StreakThresholds) -> Result<Streaks> {
        Ok(streaks(&self.records(None)?, thresholds, today))
    }

    pub fn week(&self, start: NaiveDate) -> Result<WeekStats> {
        let records: Vec<Record> = self
            .records(None)?
            .into_iter()
            .filter(|r| r.date >= start && r.date <= start + Duration::days(6))
            .collect();
        Ok(week_stats(&records, start))
    }

    pub fn export_csv<W: Write>(&self, table: &str, writer: W) -> Result<usize> {
        self.db.export_csv(table, writer)
    }

    // --- Generator-backed queries ---

    /// Plain-text completion; the first backend with a non-empty reply wins.
    fn complete(&self, system: &str, user: &str) -> Result<String> {
        first_success(
            self.reconciler.backends(),
            &[DecodeMode::Freeform],
            |backend, mode| {
                let text = backend.generate(system, user, mode)?;
                let text = text.trim();
                if text.is_empty() {
                    return Err(Error::DecodeFailed {
                        backend: backend.name().to_string(),
                        mode,
                        message: "empty response".to_string(),
                    });
                }
                Ok(text.to_string())
            },
        )
    }

    /// Answer a natural-language question over recent history.
    pub fn ask(&self, question: &str, today: NaiveDate) -> Result<String> {
        let records = self.records(Some(METRICS_CONTEXT_DAYS))?;
        let user = ask_user(
            &metrics_context(&records, METRICS_CONTEXT_DAYS)?,
            &foods_context(&records),
            question,
        );
        self.complete(&ask_system(today), &user)
    }

    /// Weekly stats plus a coach-style review written by the generator.
    pub fn weekly_review(&self, start: NaiveDate) -> Result<(WeekStats, String)> {
        let stats = self.week(start)?;
        let review = self.complete(REVIEW_SYSTEM, &review_user(&stats.to_string()))?;
        Ok((stats, review))
    }
}
