use anyhow::{Context, Result, bail};
use std::io::{self, BufRead, Write};
use std::path::Path;
use tabled::Tabled;

use daybook_core::Error;
use daybook_core::draft::{CommittedRecord, Draft};
use daybook_core::models::FoodItem;
use daybook_core::service::DaybookService;

use super::helpers::{opt, parse_date, print_json, render_table, truncate};

/// Read the entry up to the first blank line (or end of input).
pub(crate) fn read_entry<R: BufRead>(input: &mut R) -> Result<String> {
    let mut lines = Vec::new();
    for line in input.lines() {
        let line = line.context("Failed to read journal entry")?;
        if line.trim().is_empty() {
            break;
        }
        lines.push(line);
    }
    Ok(lines.join("\n").trim().to_string())
}

fn read_answer<R: BufRead, W: Write>(
    input: &mut R,
    out: &mut W,
    question: &str,
) -> Result<String> {
    loop {
        write!(out, "{question} ")?;
        out.flush()?;
        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            bail!("Input ended before every required field was answered");
        }
        let answer = line.trim();
        if !answer.is_empty() {
            return Ok(answer.to_string());
        }
        writeln!(out, "  (required) please enter a value.")?;
    }
}

/// Ask for every missing field, then merge the answers as one batch.
///
/// A rejected batch leaves the draft untouched, so all of its questions are asked again.
pub(crate) fn interview<R: BufRead, W: Write>(
    draft: &mut Draft,
    input: &mut R,
    out: &mut W,
) -> Result<()> {
    loop {
        let questions = draft.missing_fields();
        if questions.is_empty() {
            return Ok(());
        }

        writeln!(out, "\nMissing required fields. Please answer:")?;
        let mut answers = Vec::with_capacity(questions.len());
        for q in &questions {
            answers.push((q.field, read_answer(input, out, q.text)?));
        }

        match draft.answer(&answers) {
            Ok(()) => return Ok(()),
            Err(e @ Error::InvalidInput(_)) => {
                for v in e.violations() {
                    writeln!(out, "  Invalid: {v}")?;
                }
            }
            Err(e) => return Err(e.into()),
        }
    }
}

#[derive(Tabled)]
struct FoodRow {
    #[tabled(rename = "Food")]
    name: String,
    #[tabled(rename = "Qty")]
    quantity: String,
    #[tabled(rename = "Cal")]
    calories: String,
    #[tabled(rename = "Protein")]
    protein: String,
    #[tabled(rename = "Source")]
    source: String,
}

fn food_rows(foods: &[FoodItem]) -> Vec<FoodRow> {
    foods
        .iter()
        .map(|f| FoodRow {
            name: truncate(&f.name, 35),
            quantity: f.quantity_text.clone(),
            calories: opt(f.calories),
            protein: opt(f.protein_g),
            source: f.source.as_str().to_string(),
        })
        .collect()
}

fn print_committed(committed: &CommittedRecord) {
    let record = &committed.record;
    println!(
        "Logged {}: {} kcal, {}g protein, {} signal(s)",
        record.date.format("%Y-%m-%d"),
        opt(record.calories_est),
        opt(record.protein_est),
        record.signals.len()
    );

    if record.foods.is_empty() {
        return;
    }
    println!("{}", render_table(&food_rows(&record.foods), 2));
}

pub(crate) fn cmd_log(
    svc: &DaybookService,
    date: Option<String>,
    file: Option<&Path>,
    json: bool,
) -> Result<()> {
    let date = parse_date(date)?;
    let stdin = io::stdin();
    let mut input = stdin.lock();
    let mut stderr = io::stderr();

    let entry = if let Some(path) = file {
        std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?
            .trim()
            .to_string()
    } else {
        eprintln!("Journal entry for {date} (end with a blank line):");
        read_entry(&mut input)?
    };
    if entry.is_empty() {
        bail!("Journal entry is empty");
    }

    eprintln!("Extracting...");
    let mut draft = svc.extract(Draft::new(date, &entry))?;
    interview(&mut draft, &mut input, &mut stderr)?;
    let committed = svc.commit(&mut draft)?;

    if json {
        print_json(&committed)?;
    } else {
        print_committed(&committed);
    }
    Ok(())
}
