use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use std::fmt::Display;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

pub(crate) fn today() -> NaiveDate {
    Local::now().date_naive()
}

pub(crate) fn parse_date(date_str: Option<String>) -> Result<NaiveDate> {
    match date_str {
        None => Ok(today()),
        Some(s) => match s.as_str() {
            "today" => Ok(today()),
            "yesterday" => Ok(today() - chrono::Duration::days(1)),
            _ => NaiveDate::parse_from_str(&s, "%Y-%m-%d")
                .with_context(|| format!("Invalid date '{s}'. Use YYYY-MM-DD or today/yesterday")),
        },
    }
}

/// `-` for absent values.
pub(crate) fn opt<T: Display>(v: Option<T>) -> String {
    v.map_or_else(|| "-".to_string(), |v| v.to_string())
}

pub(crate) fn opt_f1(v: Option<f64>) -> String {
    v.map_or_else(|| "-".to_string(), |v| format!("{:.1}", no_neg_zero(v)))
}

pub(crate) fn yes_no(v: Option<bool>) -> String {
    match v {
        Some(true) => "yes".to_string(),
        Some(false) => "no".to_string(),
        None => "-".to_string(),
    }
}

pub(crate) fn no_neg_zero(v: f64) -> f64 {
    if v == 0.0 { 0.0 } else { v }
}

pub(crate) fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let end = s.char_indices().nth(max - 3).map_or(s.len(), |(i, _)| i);
        format!("{}...", &s[..end])
    }
}

/// Rounded table with the columns from `right_from` onwards right-aligned.
pub(crate) fn render_table<T: Tabled>(rows: &[T], right_from: usize) -> String {
    Table::new(rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(right_from..)).with(Alignment::right()))
        .to_string()
}

pub(crate) fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_date_none() {
        assert_eq!(parse_date(None).unwrap(), today());
    }

    #[test]
    fn test_parse_date_keywords() {
        assert_eq!(parse_date(Some("today".to_string())).unwrap(), today());
        assert_eq!(
            parse_date(Some("yesterday".to_string())).unwrap(),
            today() - chrono::Duration::days(1)
        );
    }

    #[test]
    fn test_parse_date_iso() {
        let date = parse_date(Some("2024-01-15".to_string())).unwrap();
        assert_eq!(date, NaiveDate::from_ymd_opt(2024, 1, 15).unwrap());
    }

    #[test]
    fn test_parse_date_invalid() {
        assert!(parse_date(Some("nope".to_string())).is_err());
        assert!(parse_date(Some("tomorrow".to_string())).is_err());
        assert!(parse_date(Some("2024-02-30".to_string())).is_err());
    }

    #[test]
    fn test_optional_cells() {
        assert_eq!(opt(Some(7)), "7");
        assert_eq!(opt::<i64>(None), "-");
        assert_eq!(opt_f1(Some(7.26)), "7.3");
        assert_eq!(opt_f1(Some(-0.0)), "0.0");
        assert_eq!(yes_no(Some(true)), "yes");
        assert_eq!(yes_no(None), "-");
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("hello", 10), "hello");
        assert_eq!(truncate("hello world this is long", 10), "hello w...");
    }
}
