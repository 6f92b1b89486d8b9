use chrono::NaiveDate;
use serde::Serialize;
use tracing::debug;

use crate::error::{Error, Result, Violation};
use crate::interview::{Question, apply_answers, missing_fields};
use crate::models::{Field, Record};
use crate::schema::validate_record;

const FOLLOW_UP_HEADER: &str = "FOLLOW-UPS (added after prompting):";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DraftState {
    Drafted,
    Extracted,
    Interviewed,
    Committed,
}

/// An in-progress day: the raw entry, where it is in the pipeline, and the record so far.
///
/// Callers hold the draft between steps; nothing here is global.
#[derive(Debug, Clone)]
pub struct Draft {
    date: NaiveDate,
    entry: String,
    state: DraftState,
    record: Record,
}

/// A record that passed full validation, ready for storage.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommittedRecord {
    pub record: Record,
    /// Entry text plus any follow-up answers.
    pub full_entry: String,
}

impl Draft {
    pub fn new(date: NaiveDate, entry: &str) -> Self {
        Self {
            date,
            entry: entry.to_string(),
            state: DraftState::Drafted,
            record: Record::empty(date),
        }
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn entry(&self) -> &str {
        &self.entry
    }

    pub fn state(&self) -> DraftState {
        self.state
    }

    pub fn record(&self) -> &Record {
        &self.record
    }

    pub(crate) fn with_extraction(mut self, record: Record) -> Self {
        self.record = record;
        self.state = DraftState::Extracted;
        self
    }

    fn require_extracted(&self, action: &str) -> Result<()> {
        match self.state {
            DraftState::Extracted | DraftState::Interviewed => Ok(()),
            state => Err(Error::InvalidState(format!(
                "cannot {action} a draft in state {state:?}"
            ))),
        }
    }

    /// Questions for the required fields the extraction left empty.
    pub fn missing_fields(&self) -> Vec<Question> {
        missing_fields(&self.record)
    }

    /// Merge interview answers. Either every answer is applied or none is.
    ///
    /// Accepted answers are appended to the entry text under a follow-up block so the stored
    /// entry shows what was supplied by hand.
    pub fn answer(&mut self, answers: &[(Field, String)]) -> Result<()> {
        self.require_extracted("answer")?;
        if answers.is_empty() {
            return Ok(());
        }
        apply_answers(&mut self.record, answers)?;

        let mut block = vec![String::new(), FOLLOW_UP_HEADER.to_string()];
        block.extend(
            answers
                .iter()
                .map(|(field, raw)| format!("- {field}: {}", raw.trim())),
        );
        self.entry = format!("{}\n{}", self.entry, block.join("\n"));
        self.state = DraftState::Interviewed;
        debug!(date = %self.date, answered = answers.len(), "interview answers merged");
        Ok(())
    }

    /// Full validation plus the completeness check, without changing state.
    pub(crate) fn prepare_commit(&self) -> Result<CommittedRecord> {
        self.require_extracted("commit")?;
        let record = validate_record(self.record.clone())?;

        let missing: Vec<Violation> = missing_fields(&record)
            .into_iter()
            .map(|q| Violation::new(q.field.name(), "", "required field is missing"))
            .collect();
        if !missing.is_empty() {
            return Err(Error::ValidationFailed(missing));
        }

        Ok(CommittedRecord {
            record,
            full_entry: self.entry.clone(),
        })
    }

    pub(crate) fn mark_committed(&mut self) {
        self.state = DraftState::Committed;
    }

    /// Validate fully and hand back the record for storage. The draft is spent afterwards.
    pub fn commit(&mut self) -> Result<CommittedRecord> {
        let committed = self.prepare_commit()?;
        self.mark_committed();
        Ok(committed)
    }
}
