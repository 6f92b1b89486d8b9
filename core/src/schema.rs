//! Field-level validation rules shared by extraction, the interview and storage read-back.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;

use crate::error::{Error, ParseError, Result, Violation};
use crate::models::{
    Field, FieldType, FieldValue, FoodItem, FoodSource, KNOWN_ITEM_CONFIDENCE_FLOOR, Record,
};

static TIME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{1,2}):(\d{2})$").expect("valid time regex"));

/// Normalize `H:MM` / `HH:MM` to zero-padded `HH:MM`.
pub fn normalize_time(raw: &str) -> std::result::Result<String, ParseError> {
    let caps = TIME_RE
        .captures(raw.trim())
        .ok_or_else(|| ParseError("expected HH:MM".to_string()))?;
    let hour: u32 = caps[1]
        .parse()
        .map_err(|_| ParseError("expected HH:MM".to_string()))?;
    let minute: u32 = caps[2]
        .parse()
        .map_err(|_| ParseError("expected HH:MM".to_string()))?;
    if hour > 23 {
        return Err(ParseError(format!("hour {hour} is out of range 0-23")));
    }
    if minute > 59 {
        return Err(ParseError(format!("minute {minute} is out of range 0-59")));
    }
    Ok(format!("{hour:02}:{minute:02}"))
}

fn parse_bool(raw: &str) -> std::result::Result<bool, ParseError> {
    match raw.to_lowercase().as_str() {
        "yes" | "y" | "true" | "1" => Ok(true),
        "no" | "n" | "false" | "0" => Ok(false),
        _ => Err(ParseError("enter yes or no".to_string())),
    }
}

fn parse_float(raw: &str) -> std::result::Result<f64, ParseError> {
    match raw.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(ParseError("expected a number".to_string())),
    }
}

fn parse_int(raw: &str) -> std::result::Result<i64, ParseError> {
    if let Ok(v) = raw.parse::<i64>() {
        return Ok(v);
    }
    let v = parse_float(raw).map_err(|_| ParseError("expected a whole number".to_string()))?;
    if v.fract() != 0.0 {
        return Err(ParseError("expected a whole number".to_string()));
    }
    Ok(v as i64)
}

/// Parse free text into a value of `field_type`, applying the type's range rules.
///
/// Blank input is rejected. Nothing is clamped: an out-of-range number is an error.
pub fn parse_answer(
    field_type: FieldType,
    raw: &str,
) -> std::result::Result<FieldValue, ParseError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(ParseError("a value is required".to_string()));
    }
    let value = match field_type {
        FieldType::TimeHhmm => FieldValue::Text(normalize_time(raw)?),
        FieldType::Bool => FieldValue::Bool(parse_bool(raw)?),
        FieldType::Str => FieldValue::Text(raw.to_string()),
        FieldType::Int1To10 | FieldType::IntNonneg => FieldValue::Int(parse_int(raw)?),
        FieldType::Float1To10 | FieldType::FloatNonneg => FieldValue::Float(parse_float(raw)?),
    };
    check_range(field_type, &value)?;
    Ok(value)
}

/// Range/shape check of an already-typed value against its declared field type.
pub fn check_range(
    field_type: FieldType,
    value: &FieldValue,
) -> std::result::Result<(), ParseError> {
    let out_of_range = |lo: &str, hi: &str| ParseError(format!("must be between {lo} and {hi}"));
    match (field_type, value) {
        (FieldType::Int1To10, FieldValue::Int(v)) if !(1..=10).contains(v) => {
            Err(out_of_range("1", "10"))
        }
        (FieldType::Float1To10, FieldValue::Float(v))
            if !v.is_finite() || !(1.0..=10.0).contains(v) =>
        {
            Err(out_of_range("1", "10"))
        }
        (FieldType::IntNonneg, FieldValue::Int(v)) if *v < 0 => {
            Err(ParseError("must not be negative".to_string()))
        }
        (FieldType::FloatNonneg, FieldValue::Float(v)) if !v.is_finite() || *v < 0.0 => {
            Err(ParseError("must not be negative".to_string()))
        }
        (FieldType::TimeHhmm, FieldValue::Text(s)) => normalize_time(s).map(|_| ()),
        (FieldType::Str, FieldValue::Text(_))
        | (FieldType::Bool, FieldValue::Bool(_))
        | (FieldType::Int1To10 | FieldType::IntNonneg, FieldValue::Int(_))
        | (FieldType::Float1To10 | FieldType::FloatNonneg, FieldValue::Float(_)) => Ok(()),
        (expected, other) => Err(ParseError(format!("expected {expected}, got {other:?}"))),
    }
}

/// Full schema validation of a reconciled record.
///
/// Returns the record with `wake_time` normalized, or every violation found.
pub fn validate_record(mut record: Record) -> Result<Record> {
    let mut violations = Vec::new();

    if let Some(raw) = record.wake_time.take() {
        match normalize_time(&raw) {
            Ok(t) => record.wake_time = Some(t),
            Err(e) => {
                violations.push(Violation::new("wake_time", raw.as_str(), e.0));
                record.wake_time = Some(raw);
            }
        }
    }

    for field in Field::ALL.iter().filter(|f| **f != Field::WakeTime) {
        let Some(value) = record.get(*field) else {
            continue;
        };
        if let Err(e) = check_range(field.field_type(), &value) {
            violations.push(Violation::new(field.name(), value.to_string(), e.0));
        }
    }

    for (i, food) in record.foods.iter().enumerate() {
        violations.extend(food_violations(i, food));
    }

    if !record.foods.is_empty() {
        match record.food_totals() {
            Some((cal, pro, _)) => {
                if record.calories_est != Some(cal) {
                    violations.push(Violation::new(
                        "calories_est",
                        opt_to_string(record.calories_est),
                        format!("must equal the food total {cal}"),
                    ));
                }
                if record.protein_est != Some(pro) {
                    violations.push(Violation::new(
                        "protein_est",
                        opt_to_string(record.protein_est),
                        format!("must equal the food total {pro}"),
                    ));
                }
            }
            None => violations.push(Violation::new(
                "foods",
                "",
                "calorie or protein total is out of range",
            )),
        }
    }

    for signal in &record.signals {
        if !(0.0..=1.0).contains(&signal.confidence) {
            violations.push(Violation::new(
                format!("signals.{}", signal.key),
                signal.confidence.to_string(),
                "confidence must be between 0 and 1",
            ));
        }
    }

    if violations.is_empty() {
        Ok(record)
    } else {
        Err(Error::ValidationFailed(violations))
    }
}

fn food_violations(index: usize, food: &FoodItem) -> Vec<Violation> {
    let label = format!("foods[{index}]");
    let mut out = Vec::new();
    if food.name.trim().is_empty() {
        out.push(Violation::new(format!("{label}.name"), "", "name must not be empty"));
    }
    if let Some(c) = food.calories.filter(|c| *c < 0) {
        out.push(Violation::new(
            format!("{label}.calories"),
            c.to_string(),
            "must not be negative",
        ));
    }
    if let Some(p) = food.protein_g.filter(|p| *p < 0) {
        out.push(Violation::new(
            format!("{label}.protein_g"),
            p.to_string(),
            "must not be negative",
        ));
    }
    if !(0.0..=1.0).contains(&food.confidence) {
        out.push(Violation::new(
            format!("{label}.confidence"),
            food.confidence.to_string(),
            "must be between 0 and 1",
        ));
    } else if food.source == FoodSource::KnownItem
        && food.confidence < KNOWN_ITEM_CONFIDENCE_FLOOR
    {
        out.push(Violation::new(
            format!("{label}.confidence"),
            food.confidence.to_string(),
            format!("known-item matches need confidence of at least {KNOWN_ITEM_CONFIDENCE_FLOOR}"),
        ));
    }
    out
}

fn opt_to_string(v: Option<i64>) -> String {
    v.map(|v| v.to_string()).unwrap_or_default()
}

/// Build a validated record from a mapping of column name to raw text.
///
/// Empty strings are absent values. `foods` is a JSON array. Unknown columns are ignored.
/// Totals are taken as stored, so a row whose totals disagree with its foods is rejected.
pub fn validate_fields(date: NaiveDate, fields: &BTreeMap<String, String>) -> Result<Record> {
    let mut record = Record::empty(date);
    let mut violations = Vec::new();

    for (name, raw) in fields {
        if raw.trim().is_empty() {
            continue;
        }
        let Some(field) = Field::from_name(name) else {
            continue;
        };
        match parse_answer(field.field_type(), raw) {
            Ok(value) => {
                if let Err(e) = record.set(field, value) {
                    violations.push(Violation::new(field.name(), raw.as_str(), e.0));
                }
            }
            Err(e) => violations.push(Violation::new(field.name(), raw.as_str(), e.0)),
        }
    }

    if let Some(raw) = fields.get("foods").filter(|s| !s.trim().is_empty()) {
        match serde_json::from_str::<Vec<FoodItem>>(raw) {
            Ok(foods) => record.foods = foods,
            Err(e) => violations.push(Violation::new("foods", raw.as_str(), e.to_string())),
        }
    }

    if !violations.is_empty() {
        return Err(Error::ValidationFailed(violations));
    }
    validate_record(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Signal, SignalSource};

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 15).unwrap()
    }

    #[test]
    fn test_time_normalization() {
        assert_eq!(normalize_time("7:45").unwrap(), "07:45");
        assert_eq!(normalize_time("07:45").unwrap(), "07:45");
        assert_eq!(normalize_time(" 0:00 ").unwrap(), "00:00");
        assert_eq!(normalize_time("23:59").unwrap(), "23:59");
        assert!(normalize_time("24:00").is_err());
        assert!(normalize_time("12:60").is_err());
        assert!(normalize_time("7.45").is_err());
        assert!(normalize_time("745").is_err());
    }

    #[test]
    fn test_sleep_quality_range() {
        for (raw, ok) in [("11", false), ("10", true), ("1", true), ("0", false)] {
            assert_eq!(parse_answer(FieldType::Int1To10, raw).is_ok(), ok, "{raw}");
        }
    }

    #[test]
    fn test_int_rejects_fraction() {
        assert!(parse_answer(FieldType::IntNonneg, "7.5").is_err());
        assert_eq!(
            parse_answer(FieldType::IntNonneg, "8.0").unwrap(),
            FieldValue::Int(8)
        );
        assert!(parse_answer(FieldType::IntNonneg, "-1").is_err());
    }

    #[test]
    fn test_bool_parsing() {
        for raw in ["yes", "Y", "TRUE", "1"] {
            assert_eq!(parse_answer(FieldType::Bool, raw).unwrap(), FieldValue::Bool(true));
        }
        for raw in ["no", "n", "False", "0"] {
            assert_eq!(parse_answer(FieldType::Bool, raw).unwrap(), FieldValue::Bool(false));
        }
        assert!(parse_answer(FieldType::Bool, "maybe").is_err());
    }

    #[test]
    fn test_float_ranges() {
        assert_eq!(
            parse_answer(FieldType::Float1To10, "7.5").unwrap(),
            FieldValue::Float(7.5)
        );
        assert!(parse_answer(FieldType::Float1To10, "10.5").is_err());
        assert!(parse_answer(FieldType::FloatNonneg, "-0.5").is_err());
        assert!(parse_answer(FieldType::FloatNonneg, "NaN").is_err());
        assert!(parse_answer(FieldType::FloatNonneg, "inf").is_err());
    }

    #[test]
    fn test_blank_and_str() {
        assert!(parse_answer(FieldType::Str, "   ").is_err());
        assert_eq!(
            parse_answer(FieldType::Str, "  push day  ").unwrap(),
            FieldValue::Text("push day".into())
        );
    }

    #[test]
    fn test_validate_record_rejects_out_of_range() {
        let mut record = Record::empty(date());
        record.sleep_quality = Some(11);
        record.mood = Some(0.5);
        let err = validate_record(record).unwrap_err();
        let fields: Vec<_> = err.violations().iter().map(|v| v.field.as_str()).collect();
        assert_eq!(fields, vec!["sleep_quality", "mood"]);
    }

    #[test]
    fn test_validate_record_normalizes_wake_time() {
        let mut record = Record::empty(date());
        record.wake_time = Some("7:05".into());
        let record = validate_record(record).unwrap();
        assert_eq!(record.wake_time.as_deref(), Some("07:05"));
    }

    #[test]
    fn test_validate_record_checks_totals() {
        let mut record = Record::empty(date());
        record.foods = vec![
            FoodItem::estimated("eggs", Some(140), Some(12)),
            FoodItem::estimated("toast", Some(80), Some(3)),
        ];
        record.calories_est = Some(220);
        record.protein_est = Some(14);
        let err = validate_record(record.clone()).unwrap_err();
        assert_eq!(err.violations().len(), 1);
        assert_eq!(err.violations()[0].field, "protein_est");

        record.protein_est = Some(15);
        assert!(validate_record(record).is_ok());
    }

    #[test]
    fn test_validate_record_reports_total_overflow() {
        let mut record = Record::empty(date());
        record.foods = vec![
            FoodItem::estimated("a", Some(i64::MAX), Some(1)),
            FoodItem::estimated("b", Some(1), Some(1)),
        ];
        let err = validate_record(record).unwrap_err();
        assert!(err.violations().iter().any(|v| v.field == "foods"));
    }

    #[test]
    fn test_validate_record_known_item_floor() {
        let mut record = Record::empty(date());
        let mut bar = FoodItem::estimated("quest bar", Some(190), Some(21));
        bar.source = FoodSource::KnownItem;
        bar.confidence = 0.9;
        record.foods = vec![bar];
        record.calories_est = Some(190);
        record.protein_est = Some(21);
        let err = validate_record(record.clone()).unwrap_err();
        assert_eq!(err.violations()[0].field, "foods[0].confidence");

        record.foods[0].confidence = 0.95;
        assert!(validate_record(record).is_ok());
    }

    #[test]
    fn test_validate_record_signal_confidence() {
        let mut record = Record::empty(date());
        record
            .signals
            .push(Signal::new("x", "y".into(), SignalSource::Journal, 1.5));
        assert!(validate_record(record).is_err());
    }

    #[test]
    fn test_validate_fields_mapping() {
        let mut fields = BTreeMap::new();
        fields.insert("wake_time".to_string(), "7:45".to_string());
        fields.insert("sleep_hours".to_string(), "7.5".to_string());
        fields.insert("gym".to_string(), "true".to_string());
        fields.insert("weight".to_string(), String::new());
        fields.insert("full_entry".to_string(), "whatever".to_string());
        fields.insert(
            "foods".to_string(),
            r#"[{"name":"apple","calories":95,"protein_g":0}]"#.to_string(),
        );
        fields.insert("calories_est".to_string(), "95".to_string());
        fields.insert("protein_est".to_string(), "0".to_string());

        let record = validate_fields(date(), &fields).unwrap();
        assert_eq!(record.wake_time.as_deref(), Some("07:45"));
        assert_eq!(record.sleep_hours, Some(7.5));
        assert_eq!(record.gym, Some(true));
        assert_eq!(record.weight, None);
        assert_eq!(record.foods.len(), 1);
        assert_eq!(record.foods[0].confidence, 0.7);
    }

    #[test]
    fn test_validate_fields_collects_every_violation() {
        let mut fields = BTreeMap::new();
        fields.insert("sleep_quality".to_string(), "11".to_string());
        fields.insert("gym".to_string(), "maybe".to_string());
        fields.insert("wake_time".to_string(), "24:00".to_string());
        let err = validate_fields(date(), &fields).unwrap_err();
        assert_eq!(err.violations().len(), 3);
        assert!(matches!(err, Error::ValidationFailed(_)));
    }
}
