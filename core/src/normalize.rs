//! Canonicalizes loosely-typed generator output into record shape.
//!
//! Every oddity in what the generator returns is absorbed here: values that cannot be coerced
//! to their field's type become absent instead of failing the record. Ranges are not checked;
//! that is left to validation so out-of-range values surface as violations.

use chrono::NaiveDate;
use serde_json::Value;
use tracing::warn;

use crate::decode::RawObject;
use crate::models::{
    DEFAULT_CONFIDENCE, Field, FieldType, FieldValue, FoodItem, FoodSource, Record, Signal,
    SignalSource,
};
use crate::schema::normalize_time;

/// Confidence given to signals the generator reported as a bare key/value mapping.
pub const MAPPING_SIGNAL_CONFIDENCE: f64 = 0.6;

/// A signal before cleaning. Any part may be missing.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawSignal {
    pub key: Option<String>,
    pub value: Option<Value>,
    pub unit: Option<String>,
    pub source: Option<String>,
    pub confidence: Option<f64>,
}

impl From<Signal> for RawSignal {
    fn from(signal: Signal) -> Self {
        Self {
            key: Some(signal.key),
            value: Some(Value::String(signal.value)),
            unit: Some(signal.unit),
            source: Some(signal.source.as_str().to_string()),
            confidence: Some(signal.confidence),
        }
    }
}

/// Normalized generator output. `record.signals` stays empty until [`clean_signals`] runs.
#[derive(Debug, Clone, PartialEq)]
pub struct Extraction {
    pub record: Record,
    pub signals: Vec<RawSignal>,
}

/// `i32::MAX`: the largest magnitude accepted for an integer field.
const INT_LIMIT: f64 = 2_147_483_647.0;

/// `int(round(float(x)))` semantics: numbers and numeric strings round to the nearest integer.
/// Values outside the `i32` range are absent.
pub fn coerce_int(value: &Value) -> Option<i64> {
    coerce_float(value)
        .map(f64::round)
        .filter(|v| v.abs() <= INT_LIMIT)
        .map(|v| v as i64)
}

pub fn coerce_float(value: &Value) -> Option<f64> {
    let v = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    v.is_finite().then_some(v)
}

fn coerce_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => match n.as_f64()? {
            v if v == 1.0 => Some(true),
            v if v == 0.0 => Some(false),
            _ => None,
        },
        Value::String(s) => match s.trim().to_lowercase().as_str() {
            "yes" | "y" | "true" | "1" => Some(true),
            "no" | "n" | "false" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

fn coerce_text(value: &Value) -> Option<String> {
    let s = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    (!s.is_empty()).then_some(s)
}

fn coerce_confidence(value: Option<&Value>) -> Option<f64> {
    value
        .and_then(coerce_float)
        .filter(|c| (0.0..=1.0).contains(c))
}

/// Coerce one raw value to `field_type`, or `None` when it cannot be.
pub fn coerce_field(field_type: FieldType, value: &Value) -> Option<FieldValue> {
    match field_type {
        FieldType::Int1To10 | FieldType::IntNonneg => coerce_int(value).map(FieldValue::Int),
        FieldType::Float1To10 | FieldType::FloatNonneg => {
            coerce_float(value).map(FieldValue::Float)
        }
        FieldType::Bool => coerce_bool(value).map(FieldValue::Bool),
        FieldType::Str => coerce_text(value).map(FieldValue::Text),
        FieldType::TimeHhmm => coerce_text(value)
            .and_then(|s| normalize_time(&s).ok())
            .map(FieldValue::Text),
    }
}

fn normalize_food(value: &Value) -> Option<FoodItem> {
    let obj = value.as_object()?;
    let name = obj.get("name").and_then(coerce_text)?;
    let quantity_text = obj
        .get("quantity_text")
        .or_else(|| obj.get("quantity"))
        .and_then(coerce_text)
        .unwrap_or_default();
    let calories = obj.get("calories").and_then(coerce_int);
    let protein_g = obj
        .get("protein_g")
        .or_else(|| obj.get("protein"))
        .and_then(coerce_int);
    Some(FoodItem {
        name,
        quantity_text,
        calories,
        protein_g,
        confidence: coerce_confidence(obj.get("confidence")).unwrap_or(DEFAULT_CONFIDENCE),
        source: FoodSource::ModelEstimate,
        matched_known: None,
    })
}

fn normalize_signals(value: Option<&Value>) -> Vec<RawSignal> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_object)
            .map(|obj| RawSignal {
                key: obj.get("key").and_then(coerce_text),
                value: obj.get("value").filter(|v| !v.is_null()).cloned(),
                unit: obj.get("unit").and_then(coerce_text),
                source: obj.get("source").and_then(coerce_text),
                confidence: coerce_confidence(obj.get("confidence")),
            })
            .collect(),
        Some(Value::Object(map)) => map
            .iter()
            .map(|(key, value)| RawSignal {
                key: Some(key.clone()),
                value: (!value.is_null()).then(|| value.clone()),
                unit: None,
                source: Some(SignalSource::Journal.as_str().to_string()),
                confidence: Some(MAPPING_SIGNAL_CONFIDENCE),
            })
            .collect(),
        _ => Vec::new(),
    }
}

/// Convert a decoded generator object into canonical record shape for `date`.
pub fn normalize(raw: &RawObject, date: NaiveDate) -> Extraction {
    let mut record = Record::empty(date);

    for (key, value) in raw {
        let Some(field) = Field::from_name(key) else {
            continue;
        };
        let Some(v) = coerce_field(field.field_type(), value) else {
            continue;
        };
        if let Err(e) = record.set(field, v) {
            warn!(field = field.name(), error = %e.0, "dropping mistyped value");
        }
    }

    record.foods = match raw.get("foods") {
        Some(Value::Array(items)) => items.iter().filter_map(normalize_food).collect(),
        _ => Vec::new(),
    };

    Extraction {
        record,
        signals: normalize_signals(raw.get("signals")),
    }
}

fn value_text(value: Value) -> String {
    match value {
        Value::String(s) => s,
        other => other.to_string(),
    }
}

/// Drop signals without a value and fill in defaults for the rest.
pub fn clean_signals(raw: Vec<RawSignal>) -> Vec<Signal> {
    raw.into_iter()
        .filter_map(|s| {
            let value = s.value.filter(|v| !v.is_null())?;
            Some(Signal {
                key: s
                    .key
                    .filter(|k| !k.trim().is_empty())
                    .unwrap_or_else(|| "unknown".to_string()),
                value: value_text(value),
                unit: s.unit.unwrap_or_default(),
                source: s
                    .source
                    .as_deref()
                    .map_or(SignalSource::Journal, SignalSource::from_tag),
                confidence: s
                    .confidence
                    .filter(|c| (0.0..=1.0).contains(c))
                    .unwrap_or(DEFAULT_CONFIDENCE),
            })
        })
        .collect()
}
