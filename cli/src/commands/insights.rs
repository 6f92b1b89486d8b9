use anyhow::Result;
use serde::Serialize;
use std::process;
use tabled::Tabled;

use daybook_core::insights::{StreakThresholds, WeekStats};
use daybook_core::service::DaybookService;

use super::helpers::{parse_date, print_json, render_table, today};

pub(crate) fn cmd_streaks(
    svc: &DaybookService,
    thresholds: StreakThresholds,
    json: bool,
) -> Result<()> {
    #[derive(Tabled)]
    struct StreakRow {
        #[tabled(rename = "Streak")]
        name: String,
        #[tabled(rename = "Days")]
        days: u32,
    }

    let s = svc.streaks(today(), thresholds)?;
    if json {
        return print_json(&s);
    }

    let rows = vec![
        StreakRow {
            name: "Gym (one rest day allowed)".to_string(),
            days: s.gym,
        },
        StreakRow {
            name: "Creatine".to_string(),
            days: s.creatine,
        },
        StreakRow {
            name: format!("Sleep >= {}h", thresholds.sleep_hours),
            days: s.sleep,
        },
        StreakRow {
            name: format!("Protein >= {}g", thresholds.protein_g),
            days: s.protein,
        },
        StreakRow {
            name: "Logging".to_string(),
            days: s.logging,
        },
    ];
    println!("{}", render_table(&rows, 1));
    Ok(())
}

/// Default window: the last seven days, ending today.
fn week_start(start: Option<String>) -> Result<chrono::NaiveDate> {
    match start {
        Some(s) => parse_date(Some(s)),
        None => Ok(today() - chrono::Duration::days(6)),
    }
}

pub(crate) fn cmd_week(
    svc: &DaybookService,
    start: Option<String>,
    review: bool,
    json: bool,
) -> Result<()> {
    #[derive(Serialize)]
    struct WeekOutput<'a> {
        stats: &'a WeekStats,
        #[serde(skip_serializing_if = "Option::is_none")]
        review: Option<&'a str>,
    }

    let start = week_start(start)?;
    let stats = svc.week(start)?;
    if stats.entries == 0 {
        eprintln!("No entries between {} and {}", stats.start, stats.end);
        process::exit(2);
    }

    let review_text = if review {
        eprintln!("Writing review...");
        Some(svc.weekly_review(start)?.1)
    } else {
        None
    };

    if json {
        return print_json(&WeekOutput {
            stats: &stats,
            review: review_text.as_deref(),
        });
    }

    println!("{stats}");
    if let Some(text) = review_text {
        println!("\n=== Review ===\n\n{text}");
    }
    Ok(())
}

pub(crate) fn cmd_ask(svc: &DaybookService, question: &str, json: bool) -> Result<()> {
    #[derive(Serialize)]
    struct Answer<'a> {
        question: &'a str,
        answer: &'a str,
    }

    let question = question.trim();
    if question.is_empty() {
        anyhow::bail!("Question is empty");
    }
    let answer = svc.ask(question, today())?;
    if json {
        return print_json(&Answer {
            question,
            answer: &answer,
        });
    }
    println!("{answer}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_week_start_defaults_to_last_seven_days() {
        assert_eq!(week_start(None).unwrap(), today() - chrono::Duration::days(6));
        assert_eq!(
            week_start(Some("2024-01-15".to_string())).unwrap(),
            chrono::NaiveDate::from_ymd_opt(2024, 1, 15).unwrap()
        );
    }
}
