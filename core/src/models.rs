use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::ParseError;

/// Confidence assigned when the generator does not supply one.
pub const DEFAULT_CONFIDENCE: f64 = 0.7;

/// Minimum confidence of a food item whose macros came from the known-item table.
pub const KNOWN_ITEM_CONFIDENCE_FLOOR: f64 = 0.95;

/// Column order of the daily table.
pub const DAILY_COLUMNS: &[&str] = &[
    "date",
    "wake_time",
    "sleep_hours",
    "sleep_quality",
    "gym",
    "workout_type",
    "workout_minutes",
    "cardio_minutes",
    "water_bottles",
    "creatine",
    "screen_time_hours",
    "study_hours",
    "calories_est",
    "protein_est",
    "mood",
    "weight",
    "foods",
    "summary",
    "full_entry",
];

/// Column order of the signals side table.
pub const SIGNAL_COLUMNS: &[&str] = &["date", "key", "value", "unit", "source", "confidence"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum FoodSource {
    #[default]
    #[serde(rename = "model_estimate")]
    ModelEstimate,
    #[serde(rename = "known_food")]
    KnownItem,
}

impl FoodSource {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            FoodSource::ModelEstimate => "model_estimate",
            FoodSource::KnownItem => "known_food",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FoodItem {
    pub name: String,
    #[serde(default)]
    pub quantity_text: String,
    pub calories: Option<i64>,
    pub protein_g: Option<i64>,
    #[serde(default = "default_confidence")]
    pub confidence: f64,
    #[serde(default)]
    pub source: FoodSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matched_known: Option<String>,
}

impl FoodItem {
    #[must_use]
    pub fn estimated(name: &str, calories: Option<i64>, protein_g: Option<i64>) -> Self {
        Self {
            name: name.to_string(),
            quantity_text: String::new(),
            calories,
            protein_g,
            confidence: DEFAULT_CONFIDENCE,
            source: FoodSource::ModelEstimate,
            matched_known: None,
        }
    }

    /// `(calories, protein)` when both are present.
    #[must_use]
    pub fn macros(&self) -> Option<(i64, i64)> {
        Some((self.calories?, self.protein_g?))
    }
}

fn default_confidence() -> f64 {
    DEFAULT_CONFIDENCE
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum SignalSource {
    #[default]
    #[serde(rename = "journal")]
    Journal,
    #[serde(rename = "heuristic")]
    Heuristic,
    #[serde(rename = "code", alias = "derived")]
    Derived,
}

impl SignalSource {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            SignalSource::Journal => "journal",
            SignalSource::Heuristic => "heuristic",
            SignalSource::Derived => "code",
        }
    }

    /// Lenient mapping from a generator-supplied tag. Unknown tags fall back to `journal`.
    #[must_use]
    pub fn from_tag(tag: &str) -> Self {
        match tag.trim().to_lowercase().as_str() {
            "heuristic" => SignalSource::Heuristic,
            "code" | "derived" | "computed" => SignalSource::Derived,
            _ => SignalSource::Journal,
        }
    }
}

/// An audit-trail annotation describing an inference made during reconciliation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub key: String,
    pub value: String,
    #[serde(default)]
    pub unit: String,
    #[serde(default)]
    pub source: SignalSource,
    #[serde(default = "default_confidence")]
    pub confidence: f64,
}

impl Signal {
    #[must_use]
    pub fn new(key: &str, value: String, source: SignalSource, confidence: f64) -> Self {
        Self {
            key: key.to_string(),
            value,
            unit: String::new(),
            source,
            confidence,
        }
    }
}

/// One day's structured journal data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub date: NaiveDate,
    pub wake_time: Option<String>,
    pub sleep_hours: Option<f64>,
    pub sleep_quality: Option<i64>,
    pub gym: Option<bool>,
    pub workout_type: Option<String>,
    pub workout_minutes: Option<i64>,
    pub cardio_minutes: Option<i64>,
    pub water_bottles: Option<i64>,
    pub creatine: Option<bool>,
    pub screen_time_hours: Option<f64>,
    pub study_hours: Option<f64>,
    pub mood: Option<f64>,
    pub weight: Option<f64>,
    pub summary: Option<String>,
    #[serde(default)]
    pub foods: Vec<FoodItem>,
    pub calories_est: Option<i64>,
    pub protein_est: Option<i64>,
    #[serde(default)]
    pub signals: Vec<Signal>,
}

impl Record {
    #[must_use]
    pub fn empty(date: NaiveDate) -> Self {
        Self {
            date,
            wake_time: None,
            sleep_hours: None,
            sleep_quality: None,
            gym: None,
            workout_type: None,
            workout_minutes: None,
            cardio_minutes: None,
            water_bottles: None,
            creatine: None,
            screen_time_hours: None,
            study_hours: None,
            mood: None,
            weight: None,
            summary: None,
            foods: Vec::new(),
            calories_est: None,
            protein_est: None,
            signals: Vec::new(),
        }
    }

    #[must_use]
    pub fn get(&self, field: Field) -> Option<FieldValue> {
        let text = |v: &Option<String>| v.clone().map(FieldValue::Text);
        match field {
            Field::WakeTime => text(&self.wake_time),
            Field::SleepHours => self.sleep_hours.map(FieldValue::Float),
            Field::SleepQuality => self.sleep_quality.map(FieldValue::Int),
            Field::Gym => self.gym.map(FieldValue::Bool),
            Field::WorkoutType => text(&self.workout_type),
            Field::WorkoutMinutes => self.workout_minutes.map(FieldValue::Int),
            Field::CardioMinutes => self.cardio_minutes.map(FieldValue::Int),
            Field::WaterBottles => self.water_bottles.map(FieldValue::Int),
            Field::Creatine => self.creatine.map(FieldValue::Bool),
            Field::ScreenTimeHours => self.screen_time_hours.map(FieldValue::Float),
            Field::StudyHours => self.study_hours.map(FieldValue::Float),
            Field::CaloriesEst => self.calories_est.map(FieldValue::Int),
            Field::ProteinEst => self.protein_est.map(FieldValue::Int),
            Field::Mood => self.mood.map(FieldValue::Float),
            Field::Weight => self.weight.map(FieldValue::Float),
            Field::Summary => text(&self.summary),
        }
    }

    /// Copy `field` from `other`, absent or not.
    pub fn copy_field(&mut self, field: Field, other: &Record) {
        match field {
            Field::WakeTime => self.wake_time.clone_from(&other.wake_time),
            Field::SleepHours => self.sleep_hours = other.sleep_hours,
            Field::SleepQuality => self.sleep_quality = other.sleep_quality,
            Field::Gym => self.gym = other.gym,
            Field::WorkoutType => self.workout_type.clone_from(&other.workout_type),
            Field::WorkoutMinutes => self.workout_minutes = other.workout_minutes,
            Field::CardioMinutes => self.cardio_minutes = other.cardio_minutes,
            Field::WaterBottles => self.water_bottles = other.water_bottles,
            Field::Creatine => self.creatine = other.creatine,
            Field::ScreenTimeHours => self.screen_time_hours = other.screen_time_hours,
            Field::StudyHours => self.study_hours = other.study_hours,
            Field::CaloriesEst => self.calories_est = other.calories_est,
            Field::ProteinEst => self.protein_est = other.protein_est,
            Field::Mood => self.mood = other.mood,
            Field::Weight => self.weight = other.weight,
            Field::Summary => self.summary.clone_from(&other.summary),
        }
    }

    /// Store a value into `field`. The value's shape must match the field's declared type.
    pub fn set(&mut self, field: Field, value: FieldValue) -> Result<(), ParseError> {
        let mismatch = |v: &FieldValue| {
            ParseError(format!(
                "{} expects {}, got {v:?}",
                field.name(),
                field.field_type()
            ))
        };
        match (field, value) {
            (Field::WakeTime, FieldValue::Text(s)) => self.wake_time = Some(s),
            (Field::WorkoutType, FieldValue::Text(s)) => self.workout_type = Some(s),
            (Field::Summary, FieldValue::Text(s)) => self.summary = Some(s),
            (Field::SleepHours, FieldValue::Float(v)) => self.sleep_hours = Some(v),
            (Field::ScreenTimeHours, FieldValue::Float(v)) => self.screen_time_hours = Some(v),
            (Field::StudyHours, FieldValue::Float(v)) => self.study_hours = Some(v),
            (Field::Mood, FieldValue::Float(v)) => self.mood = Some(v),
            (Field::Weight, FieldValue::Float(v)) => self.weight = Some(v),
            (Field::SleepQuality, FieldValue::Int(v)) => self.sleep_quality = Some(v),
            (Field::WorkoutMinutes, FieldValue::Int(v)) => self.workout_minutes = Some(v),
            (Field::CardioMinutes, FieldValue::Int(v)) => self.cardio_minutes = Some(v),
            (Field::WaterBottles, FieldValue::Int(v)) => self.water_bottles = Some(v),
            (Field::CaloriesEst, FieldValue::Int(v)) => self.calories_est = Some(v),
            (Field::ProteinEst, FieldValue::Int(v)) => self.protein_est = Some(v),
            (Field::Gym, FieldValue::Bool(b)) => self.gym = Some(b),
            (Field::Creatine, FieldValue::Bool(b)) => self.creatine = Some(b),
            (_, other) => return Err(mismatch(&other)),
        }
        Ok(())
    }

    /// Sum of calories/protein over items carrying both, plus the number of items summed.
    /// `None` if either sum overflows.
    #[must_use]
    pub fn food_totals(&self) -> Option<(i64, i64, usize)> {
        self.foods
            .iter()
            .filter_map(FoodItem::macros)
            .try_fold((0_i64, 0_i64, 0), |(cal, pro, n), (c, p)| {
                Some((cal.checked_add(c)?, pro.checked_add(p)?, n + 1))
            })
    }

    /// Flatten into daily-table columns. Absent values become empty strings.
    pub fn to_row(&self, full_entry: &str) -> serde_json::Result<BTreeMap<String, String>> {
        let mut row = BTreeMap::new();
        row.insert("date".to_string(), self.date.format("%Y-%m-%d").to_string());
        for field in Field::ALL {
            let value = self.get(*field).map(|v| v.to_string()).unwrap_or_default();
            row.insert(field.name().to_string(), value);
        }
        row.insert("foods".to_string(), serde_json::to_string(&self.foods)?);
        row.insert("full_entry".to_string(), full_entry.to_string());
        Ok(row)
    }
}

/// Declared type of a scalar field, governing parsing and range checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FieldType {
    #[serde(rename = "time_hhmm")]
    TimeHhmm,
    #[serde(rename = "int_1_10")]
    Int1To10,
    #[serde(rename = "float_1_10")]
    Float1To10,
    #[serde(rename = "int_nonneg")]
    IntNonneg,
    #[serde(rename = "float_nonneg")]
    FloatNonneg,
    #[serde(rename = "bool")]
    Bool,
    #[serde(rename = "str")]
    Str,
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FieldType::TimeHhmm => "time_hhmm",
            FieldType::Int1To10 => "int_1_10",
            FieldType::Float1To10 => "float_1_10",
            FieldType::IntNonneg => "int_nonneg",
            FieldType::FloatNonneg => "float_nonneg",
            FieldType::Bool => "bool",
            FieldType::Str => "str",
        };
        f.write_str(s)
    }
}

/// A parsed scalar value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Text(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Text(s) => f.write_str(s),
            FieldValue::Int(v) => write!(f, "{v}"),
            FieldValue::Float(v) => write!(f, "{v}"),
            FieldValue::Bool(b) => write!(f, "{b}"),
        }
    }
}

/// The scalar fields every committed record must carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    WakeTime,
    SleepHours,
    SleepQuality,
    Gym,
    WorkoutType,
    WorkoutMinutes,
    CardioMinutes,
    WaterBottles,
    Creatine,
    ScreenTimeHours,
    StudyHours,
    CaloriesEst,
    ProteinEst,
    Mood,
    Weight,
    Summary,
}

impl Field {
    pub const ALL: &'static [Field] = &[
        Field::WakeTime,
        Field::SleepHours,
        Field::SleepQuality,
        Field::Gym,
        Field::WorkoutType,
        Field::WorkoutMinutes,
        Field::CardioMinutes,
        Field::WaterBottles,
        Field::Creatine,
        Field::ScreenTimeHours,
        Field::StudyHours,
        Field::CaloriesEst,
        Field::ProteinEst,
        Field::Mood,
        Field::Weight,
        Field::Summary,
    ];

    /// Column / key name.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Field::WakeTime => "wake_time",
            Field::SleepHours => "sleep_hours",
            Field::SleepQuality => "sleep_quality",
            Field::Gym => "gym",
            Field::WorkoutType => "workout_type",
            Field::WorkoutMinutes => "workout_minutes",
            Field::CardioMinutes => "cardio_minutes",
            Field::WaterBottles => "water_bottles",
            Field::Creatine => "creatine",
            Field::ScreenTimeHours => "screen_time_hours",
            Field::StudyHours => "study_hours",
            Field::CaloriesEst => "calories_est",
            Field::ProteinEst => "protein_est",
            Field::Mood => "mood",
            Field::Weight => "weight",
            Field::Summary => "summary",
        }
    }

    /// Look up a field by name. The generator's `_1_10` suffixed keys are accepted.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Field> {
        let name = match name.trim() {
            "sleep_quality_1_10" => "sleep_quality",
            "mood_1_10" => "mood",
            other => other,
        };
        Field::ALL.iter().copied().find(|f| f.name() == name)
    }

    #[must_use]
    pub fn field_type(self) -> FieldType {
        match self {
            Field::WakeTime => FieldType::TimeHhmm,
            Field::SleepQuality => FieldType::Int1To10,
            Field::Mood => FieldType::Float1To10,
            Field::Gym | Field::Creatine => FieldType::Bool,
            Field::WorkoutType | Field::Summary => FieldType::Str,
            Field::WorkoutMinutes
            | Field::CardioMinutes
            | Field::WaterBottles
            | Field::CaloriesEst
            | Field::ProteinEst => FieldType::IntNonneg,
            Field::SleepHours | Field::ScreenTimeHours | Field::StudyHours | Field::Weight => {
                FieldType::FloatNonneg
            }
        }
    }

    /// Human-readable interview prompt.
    #[must_use]
    pub fn question(self) -> &'static str {
        match self {
            Field::WakeTime => "Wake-up time? (HH:MM, e.g., 12:30)",
            Field::SleepHours => "Sleep hours? (e.g., 7.5)",
            Field::SleepQuality => "Sleep quality (1-10)?",
            Field::Gym => "Gym today? (yes/no)",
            Field::WorkoutType => "Workout type? (push/pull/legs/run/tennis/rest/other)",
            Field::WorkoutMinutes => "Workout minutes? (0+)",
            Field::CardioMinutes => "Cardio minutes? (0+)",
            Field::WaterBottles => "Total bottles of water? (0+)",
            Field::Creatine => "Creatine today? (yes/no)",
            Field::ScreenTimeHours => "Screen time hours? (e.g., 6.0)",
            Field::StudyHours => "Study hours? (e.g., 3.5)",
            Field::CaloriesEst => "Total calories estimate? (integer, e.g., 2400)",
            Field::ProteinEst => "Total protein estimate (grams)? (integer, e.g., 130)",
            Field::Mood => "Mood (1-10)?",
            Field::Weight => "Body weight? (lbs, e.g., 165.4)",
            Field::Summary => "One-line summary of the day?",
        }
    }

    /// Daily totals derived from the food list rather than read from the entry.
    #[must_use]
    pub fn is_nutrition(self) -> bool {
        matches!(self, Field::CaloriesEst | Field::ProteinEst)
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
