use anyhow::Result;
use std::process;
use tabled::Tabled;

use daybook_core::interview::Question;
use daybook_core::models::{Field, Record, Signal};
use daybook_core::service::DaybookService;

use super::helpers::{opt, opt_f1, parse_date, print_json, render_table, truncate, yes_no};

#[derive(Tabled)]
struct SignalRow {
    #[tabled(rename = "Key")]
    key: String,
    #[tabled(rename = "Value")]
    value: String,
    #[tabled(rename = "Unit")]
    unit: String,
    #[tabled(rename = "Source")]
    source: String,
    #[tabled(rename = "Conf")]
    confidence: String,
}

fn signal_rows(signals: &[Signal]) -> Vec<SignalRow> {
    signals
        .iter()
        .map(|s| SignalRow {
            key: s.key.clone(),
            value: truncate(&s.value, 60),
            unit: s.unit.clone(),
            source: s.source.as_str().to_string(),
            confidence: format!("{:.2}", s.confidence),
        })
        .collect()
}

fn print_record(record: &Record) {
    #[derive(Tabled)]
    struct FieldRow {
        #[tabled(rename = "Field")]
        field: &'static str,
        #[tabled(rename = "Value")]
        value: String,
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
        #[tabled(rename = "Conf")]
        confidence: String,
        #[tabled(rename = "Source")]
        source: String,
    }

    println!("=== {} ===\n", record.date.format("%Y-%m-%d"));

    let fields: Vec<FieldRow> = Field::ALL
        .iter()
        .map(|f| FieldRow {
            field: f.name(),
            value: record.get(*f).map(|v| v.to_string()).unwrap_or_default(),
        })
        .collect();
    println!("{}", render_table(&fields, 1));

    if !record.foods.is_empty() {
        let foods: Vec<FoodRow> = record
            .foods
            .iter()
            .map(|f| FoodRow {
                name: truncate(&f.name, 35),
                quantity: f.quantity_text.clone(),
                calories: opt(f.calories),
                protein: opt(f.protein_g),
                confidence: format!("{:.2}", f.confidence),
                source: f.source.as_str().to_string(),
            })
            .collect();
        println!("\n{}", render_table(&foods, 2));
    }

    if !record.signals.is_empty() {
        println!("\n{}", render_table(&signal_rows(&record.signals), 1));
    }
}

pub(crate) fn cmd_show(svc: &DaybookService, date: Option<String>, json: bool) -> Result<()> {
    let date = parse_date(date)?;
    let Some(day) = svc.get_day(date)? else {
        eprintln!("No entry for {date}");
        process::exit(2);
    };

    if json {
        return print_json(&day);
    }
    print_record(&day.record);
    println!("\n{}", day.full_entry);
    Ok(())
}

pub(crate) fn cmd_history(svc: &DaybookService, days: usize, json: bool) -> Result<()> {
    #[derive(Tabled)]
    struct HistoryRow {
        #[tabled(rename = "Date")]
        date: String,
        #[tabled(rename = "Wake")]
        wake: String,
        #[tabled(rename = "Sleep")]
        sleep: String,
        #[tabled(rename = "Gym")]
        gym: String,
        #[tabled(rename = "Workout")]
        workout: String,
        #[tabled(rename = "Calories")]
        calories: String,
        #[tabled(rename = "Protein")]
        protein: String,
        #[tabled(rename = "Mood")]
        mood: String,
        #[tabled(rename = "Weight")]
        weight: String,
    }

    let history = svc.history(Some(days))?;

    if json {
        let records: Vec<&Record> = history.iter().map(|d| &d.record).collect();
        return print_json(&records);
    }

    if history.is_empty() {
        eprintln!("No entries logged yet");
        process::exit(2);
    }

    let rows: Vec<HistoryRow> = history
        .iter()
        .map(|d| {
            let r = &d.record;
            HistoryRow {
                date: r.date.format("%Y-%m-%d").to_string(),
                wake: r.wake_time.clone().unwrap_or_default(),
                sleep: opt_f1(r.sleep_hours),
                gym: yes_no(r.gym),
                workout: r.workout_type.as_deref().map(|w| truncate(w, 20)).unwrap_or_default(),
                calories: opt(r.calories_est),
                protein: opt(r.protein_est),
                mood: opt_f1(r.mood),
                weight: opt_f1(r.weight),
            }
        })
        .collect();
    println!("{}", render_table(&rows, 5));
    Ok(())
}

pub(crate) fn cmd_signals(svc: &DaybookService, date: Option<String>, json: bool) -> Result<()> {
    let date = parse_date(date)?;
    let signals = svc.signals_for_date(date)?;

    if json {
        return print_json(&signals);
    }
    if signals.is_empty() {
        eprintln!("No signals for {date}");
        process::exit(2);
    }
    println!("{}", render_table(&signal_rows(&signals), 1));
    Ok(())
}

pub(crate) fn cmd_fields(json: bool) -> Result<()> {
    #[derive(Tabled)]
    struct FieldRow {
        #[tabled(rename = "Field")]
        name: &'static str,
        #[tabled(rename = "Type")]
        field_type: String,
        #[tabled(rename = "Question")]
        question: &'static str,
    }

    let questions: Vec<Question> = Field::ALL.iter().copied().map(Question::for_field).collect();
    if json {
        return print_json(&questions);
    }

    let rows: Vec<FieldRow> = questions
        .iter()
        .map(|q| FieldRow {
            name: q.field.name(),
            field_type: q.field_type.to_string(),
            question: q.text,
        })
        .collect();
    println!("{}", render_table(&rows, 3));
    Ok(())
}
