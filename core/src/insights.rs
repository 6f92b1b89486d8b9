//! Read-only summaries over stored history: streaks, weekly stats, and query context.
//!
//! Every function takes records newest first, the order [`crate::db::Database::history`]
//! returns them in.

use std::fmt;

use chrono::{Duration, NaiveDate};
use serde::Serialize;

use crate::error::Result;
use crate::models::Record;

/// Gym streak where a single rest day stays inside the streak and two in a row end it.
/// Days without a gym value are skipped.
#[must_use]
pub fn gym_streak(records: &[Record]) -> u32 {
    let mut streak = 0;
    let mut consecutive_rest = 0;
    for gym in records.iter().filter_map(|r| r.gym) {
        if gym {
            streak += 1;
            consecutive_rest = 0;
        } else {
            consecutive_rest += 1;
            if consecutive_rest >= 2 {
                break;
            }
            streak += 1;
        }
    }
    streak
}

/// Consecutive days (newest first) where `condition` holds. Days where it yields `None` are
/// skipped rather than breaking the streak.
pub fn simple_streak<F>(records: &[Record], condition: F) -> u32
where
    F: Fn(&Record) -> Option<bool>,
{
    let mut streak = 0;
    for ok in records.iter().filter_map(condition) {
        if !ok {
            break;
        }
        streak += 1;
    }
    streak
}

/// Consecutive calendar days with an entry, ending today or yesterday.
#[must_use]
pub fn logging_streak(dates: &[NaiveDate], today: NaiveDate) -> u32 {
    let yesterday = today - Duration::days(1);
    let start = match dates.first() {
        Some(d) if *d == today => today,
        Some(d) if *d == yesterday => yesterday,
        _ => return 0,
    };

    let mut streak = 0;
    for date in dates {
        if *date == start - Duration::days(i64::from(streak)) {
            streak += 1;
        } else {
            break;
        }
    }
    streak
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StreakThresholds {
    pub sleep_hours: f64,
    pub protein_g: i64,
}

impl Default for StreakThresholds {
    fn default() -> Self {
        Self {
            sleep_hours: 8.0,
            protein_g: 100,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Streaks {
    pub gym: u32,
    pub creatine: u32,
    pub sleep: u32,
    pub protein: u32,
    pub logging: u32,
}

#[must_use]
pub fn streaks(records: &[Record], thresholds: StreakThresholds, today: NaiveDate) -> Streaks {
    let dates: Vec<NaiveDate> = records.iter().map(|r| r.date).collect();
    Streaks {
        gym: gym_streak(records),
        creatine: simple_streak(records, |r| r.creatine),
        sleep: simple_streak(records, |r| r.sleep_hours.map(|h| h >= thresholds.sleep_hours)),
        protein: simple_streak(records, |r| r.protein_est.map(|p| p >= thresholds.protein_g)),
        logging: logging_streak(&dates, today),
    }
}

fn average<I: Iterator<Item = f64>>(values: I) -> Option<f64> {
    let (sum, n) = values.fold((0.0, 0_u32), |(s, n), v| (s + v, n + 1));
    (n > 0).then(|| sum / f64::from(n))
}

fn fmt_avg(v: Option<f64>) -> String {
    v.map_or_else(|| "n/a".to_string(), |v| format!("{v:.1}"))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DayNote {
    pub date: NaiveDate,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeekStats {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub entries: usize,
    pub gym_days: usize,
    pub workout_types: Vec<String>,
    pub creatine_days: usize,
    pub avg_calories: Option<f64>,
    pub avg_protein: Option<f64>,
    pub avg_water: Option<f64>,
    pub avg_sleep: Option<f64>,
    pub avg_sleep_quality: Option<f64>,
    pub avg_mood: Option<f64>,
    pub avg_study: Option<f64>,
    pub avg_weight: Option<f64>,
    pub best_mood: Option<(f64, NaiveDate)>,
    pub worst_mood: Option<(f64, NaiveDate)>,
    pub summaries: Vec<DayNote>,
    pub foods: Vec<DayNote>,
}

/// Stats for the seven days starting at `start`. Records outside the window are ignored.
#[must_use]
pub fn week_stats(records: &[Record], start: NaiveDate) -> WeekStats {
    let end = start + Duration::days(6);
    let mut week: Vec<&Record> = records
        .iter()
        .filter(|r| r.date >= start && r.date <= end)
        .collect();
    week.sort_by_key(|r| r.date);

    let mut best_mood: Option<(f64, NaiveDate)> = None;
    let mut worst_mood: Option<(f64, NaiveDate)> = None;
    for r in &week {
        let Some(mood) = r.mood else { continue };
        if best_mood.is_none_or(|(m, _)| mood > m) {
            best_mood = Some((mood, r.date));
        }
        if worst_mood.is_none_or(|(m, _)| mood < m) {
            worst_mood = Some((mood, r.date));
        }
    }

    WeekStats {
        start,
        end,
        entries: week.len(),
        gym_days: week.iter().filter(|r| r.gym == Some(true)).count(),
        workout_types: week.iter().filter_map(|r| r.workout_type.clone()).collect(),
        creatine_days: week.iter().filter(|r| r.creatine == Some(true)).count(),
        avg_calories: average(week.iter().filter_map(|r| r.calories_est).map(|v| v as f64)),
        avg_protein: average(week.iter().filter_map(|r| r.protein_est).map(|v| v as f64)),
        avg_water: average(week.iter().filter_map(|r| r.water_bottles).map(|v| v as f64)),
        avg_sleep: average(week.iter().filter_map(|r| r.sleep_hours)),
        avg_sleep_quality: average(week.iter().filter_map(|r| r.sleep_quality).map(|v| v as f64)),
        avg_mood: average(week.iter().filter_map(|r| r.mood)),
        avg_study: average(week.iter().filter_map(|r| r.study_hours)),
        avg_weight: average(week.iter().filter_map(|r| r.weight)),
        best_mood,
        worst_mood,
        summaries: week
            .iter()
            .filter_map(|r| {
                r.summary.as_ref().map(|s| DayNote {
                    date: r.date,
                    text: s.clone(),
                })
            })
            .collect(),
        foods: week
            .iter()
            .filter(|r| !r.foods.is_empty())
            .map(|r| DayNote {
                date: r.date,
                text: food_names(r),
            })
            .collect(),
    }
}

fn food_names(record: &Record) -> String {
    record
        .foods
        .iter()
        .map(|f| f.name.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

impl fmt::Display for WeekStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let n = self.entries;
        writeln!(f, "Week: {} -> {} ({n} entries)", self.start, self.end)?;
        writeln!(f)?;
        writeln!(f, "TRAINING")?;
        writeln!(f, "  Gym sessions: {} / {n} days", self.gym_days)?;
        let types = if self.workout_types.is_empty() {
            "none".to_string()
        } else {
            self.workout_types.join(", ")
        };
        writeln!(f, "  Workout types: {types}")?;
        writeln!(f)?;
        writeln!(f, "NUTRITION")?;
        writeln!(f, "  Avg calories: {} kcal", fmt_avg(self.avg_calories))?;
        writeln!(f, "  Avg protein:  {} g", fmt_avg(self.avg_protein))?;
        writeln!(f, "  Avg water:    {} bottles", fmt_avg(self.avg_water))?;
        writeln!(f)?;
        writeln!(f, "SLEEP & RECOVERY")?;
        writeln!(f, "  Avg sleep:         {} h", fmt_avg(self.avg_sleep))?;
        writeln!(f, "  Avg sleep quality: {} / 10", fmt_avg(self.avg_sleep_quality))?;
        writeln!(f)?;
        writeln!(f, "MIND & PERFORMANCE")?;
        write!(f, "  Avg mood:     {} / 10", fmt_avg(self.avg_mood))?;
        if let (Some((best, best_day)), Some((worst, worst_day))) =
            (self.best_mood, self.worst_mood)
        {
            write!(
                f,
                " (best: {best} on {}, worst: {worst} on {})",
                best_day.format("%a"),
                worst_day.format("%a")
            )?;
        }
        writeln!(f)?;
        writeln!(f, "  Avg study:    {} h", fmt_avg(self.avg_study))?;
        writeln!(f, "  Creatine:     {} / {n} days", self.creatine_days)?;
        writeln!(f)?;
        writeln!(f, "WEIGHT")?;
        writeln!(f, "  Avg weight: {} lbs", fmt_avg(self.avg_weight))?;
        writeln!(f)?;
        writeln!(f, "DAILY SUMMARIES")?;
        if self.summaries.is_empty() {
            writeln!(f, "  (none logged)")?;
        }
        for note in &self.summaries {
            writeln!(f, "  {}: {}", note.date.format("%a %b %d"), note.text)?;
        }
        writeln!(f)?;
        writeln!(f, "FOODS EATEN THIS WEEK")?;
        if self.foods.is_empty() {
            write!(f, "  (not available)")?;
        }
        let lines: Vec<String> = self
            .foods
            .iter()
            .map(|note| format!("  {}: {}", note.date, note.text))
            .collect();
        write!(f, "{}", lines.join("\n"))
    }
}

/// Column order of the metrics context sent with natural-language questions.
pub const METRICS_CONTEXT_COLUMNS: &[&str] = &[
    "date",
    "calories_est",
    "protein_est",
    "sleep_hours",
    "sleep_quality",
    "mood",
    "weight",
    "gym",
    "workout_type",
    "workout_minutes",
    "water_bottles",
    "study_hours",
    "screen_time_hours",
    "creatine",
];

/// Days of history included in the metrics context.
pub const METRICS_CONTEXT_DAYS: usize = 90;

/// The newest `max_rows` records as CSV, newest first.
pub fn metrics_context(records: &[Record], max_rows: usize) -> Result<String> {
    let mut out = csv::Writer::from_writer(Vec::new());
    out.write_record(METRICS_CONTEXT_COLUMNS)?;
    for record in records.iter().take(max_rows) {
        let row = record.to_row("")?;
        out.write_record(
            METRICS_CONTEXT_COLUMNS
                .iter()
                .map(|c| row.get(*c).map_or("", String::as_str)),
        )?;
    }
    let bytes = out
        .into_inner()
        .map_err(|e| std::io::Error::other(e.to_string()))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// One line per day listing the food names eaten, newest first.
#[must_use]
pub fn foods_context(records: &[Record]) -> String {
    records
        .iter()
        .filter(|r| !r.foods.is_empty())
        .map(|r| format!("{}: {}", r.date, food_names(r)))
        .collect::<Vec<_>>()
        .join("\n")
}
