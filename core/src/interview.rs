use serde::Serialize;

use crate::error::{Error, Result, Violation};
use crate::models::{Field, FieldType, FieldValue, Record};

pub use crate::schema::parse_answer;

/// One question to put to the user for an absent required field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Question {
    pub field: Field,
    pub text: &'static str,
    pub field_type: FieldType,
}

impl Question {
    #[must_use]
    pub fn for_field(field: Field) -> Self {
        Self {
            field,
            text: field.question(),
            field_type: field.field_type(),
        }
    }
}

fn is_missing(value: Option<&FieldValue>) -> bool {
    match value {
        None => true,
        Some(FieldValue::Text(s)) => s.trim().is_empty(),
        Some(_) => false,
    }
}

/// Required fields still absent (or blank) in `record`, in the fixed field order.
#[must_use]
pub fn missing_fields(record: &Record) -> Vec<Question> {
    Field::ALL
        .iter()
        .filter(|f| is_missing(record.get(**f).as_ref()))
        .map(|f| Question::for_field(*f))
        .collect()
}

/// Parse a batch of answers and merge them into `record`.
///
/// All-or-nothing: if any answer fails to parse the record is left untouched and every failure
/// is reported in one [`Error::InvalidInput`]. Returns the parsed values in answer order.
pub fn apply_answers(
    record: &mut Record,
    answers: &[(Field, String)],
) -> Result<Vec<(Field, FieldValue)>> {
    let mut parsed = Vec::with_capacity(answers.len());
    let mut violations = Vec::new();
    for (field, raw) in answers {
        match parse_answer(field.field_type(), raw) {
            Ok(value) => parsed.push((*field, value)),
            Err(e) => violations.push(Violation::new(field.name(), raw.trim(), e.0)),
        }
    }
    if !violations.is_empty() {
        return Err(Error::InvalidInput(violations));
    }
    for (field, value) in &parsed {
        record.set(*field, value.clone()).map_err(|e| {
            Error::InvalidInput(vec![Violation::new(field.name(), value.to_string(), e.0)])
        })?;
    }
    Ok(parsed)
}
