//! Request body validation
//!
//! A request body arrives as a JSON object ([`Input`]). Each write operation
//! parses it into a typed input, recording field-level messages in
//! [`ValidationErrors`] for anything missing or malformed. Checks that need
//! the store (uniqueness, existence) are added by the mutator afterwards.

use std::collections::BTreeMap;
use serde::Serialize;
use serde_json::{Map, Value};

/// Longest name accepted for counties and places
pub const MAX_NAME_LEN: usize = 255;

/// Field name → messages, serialized as `{"field": ["message", ...]}`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors {
    fields: BTreeMap<String, Vec<String>>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Errors holding a single message
    pub fn single(field: &str, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.fields.entry(field.to_string()).or_default().push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fields.values().map(Vec::len).sum()
    }

    pub fn has(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    pub fn messages(&self, field: &str) -> &[String] {
        self.fields.get(field).map(Vec::as_slice).unwrap_or(&[])
    }

    /// First message, with a count of the rest
    pub fn summary(&self) -> String {
        let Some(first) = self.fields.values().flatten().next() else {
            return "The given data was invalid.".to_string();
        };
        match self.len() - 1 {
            0 => first.clone(),
            1 => format!("{} (and 1 more error)", first),
            n => format!("{} (and {} more errors)", first, n),
        }
    }

    /// `value` when no errors were recorded, otherwise the errors
    pub fn finish<T>(self, value: Option<T>) -> Result<T, ValidationErrors> {
        match value {
            Some(value) if self.is_empty() => Ok(value),
            _ => Err(self),
        }
    }

    pub fn into_result(self) -> Result<(), ValidationErrors> {
        self.finish(Some(()))
    }
}

fn label(field: &str) -> String {
    field.replace('_', " ")
}

/// Key-value bundle of a request body
#[derive(Debug, Clone, Default)]
pub struct Input {
    fields: Map<String, Value>,
}

impl From<Map<String, Value>> for Input {
    fn from(fields: Map<String, Value>) -> Self {
        Self { fields }
    }
}

impl Input {
    /// Accepts a JSON object; `null` is treated as an empty body
    pub fn from_value(value: Value) -> Result<Self, ValidationErrors> {
        match value {
            Value::Object(fields) => Ok(Self { fields }),
            Value::Null => Ok(Self::default()),
            _ => Err(ValidationErrors::single("body", "The request body must be a JSON object.")),
        }
    }

    pub fn has(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    /// Present, non-empty text. Strings are trimmed; numbers are accepted as
    /// text only when `allow_numbers` is set.
    fn text(&self, field: &str, max_len: Option<usize>, allow_numbers: bool, errors: &mut ValidationErrors) -> Option<String> {
        let text = match self.fields.get(field) {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(s.trim().to_string()),
            Some(Value::Number(n)) if allow_numbers => Some(n.to_string()),
            Some(_) => {
                errors.add(field, format!("The {} field must be a string.", label(field)));
                return None;
            }
        };
        match text {
            Some(text) if !text.is_empty() => {
                if let Some(max) = max_len {
                    if text.chars().count() > max {
                        errors.add(
                            field,
                            format!("The {} field must not be greater than {} characters.", label(field), max),
                        );
                        return None;
                    }
                }
                Some(text)
            }
            _ => {
                errors.add(field, format!("The {} field is required.", label(field)));
                None
            }
        }
    }

    /// A required string field
    pub fn required_string(&self, field: &str, max_len: Option<usize>, errors: &mut ValidationErrors) -> Option<String> {
        self.text(field, max_len, false, errors)
    }

    /// A string field that, when present, must be non-empty
    pub fn optional_string(&self, field: &str, max_len: Option<usize>, errors: &mut ValidationErrors) -> Option<String> {
        if !self.has(field) {
            return None;
        }
        self.text(field, max_len, false, errors)
    }

    /// A required integer id; numeric strings are accepted
    pub fn required_id(&self, field: &str, errors: &mut ValidationErrors) -> Option<i64> {
        let id = match self.fields.get(field) {
            None | Some(Value::Null) => {
                errors.add(field, format!("The {} field is required.", label(field)));
                return None;
            }
            Some(Value::String(s)) if s.trim().is_empty() => {
                errors.add(field, format!("The {} field is required.", label(field)));
                return None;
            }
            Some(Value::Number(n)) => n.as_i64(),
            Some(Value::String(s)) => s.trim().parse::<i64>().ok(),
            Some(_) => None,
        };
        if id.is_none() {
            errors.add(field, format!("The {} field must be an integer.", label(field)));
        }
        id
    }

    /// An integer id that, when present, must be valid
    pub fn optional_id(&self, field: &str, errors: &mut ValidationErrors) -> Option<i64> {
        if !self.has(field) {
            return None;
        }
        self.required_id(field, errors)
    }
}

/// Body of county create and update
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountyInput {
    pub name: String,
}

impl CountyInput {
    pub fn parse(input: &Input, errors: &mut ValidationErrors) -> Option<Self> {
        let name = input.required_string("name", Some(MAX_NAME_LEN), errors)?;
        Some(Self { name })
    }
}

/// Body of place create
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPlace {
    pub name: String,
    pub county_id: i64,
}

impl NewPlace {
    pub fn parse(input: &Input, errors: &mut ValidationErrors) -> Option<Self> {
        let name = input.required_string("name", Some(MAX_NAME_LEN), errors);
        let county_id = input.required_id("county_id", errors);
        Some(Self { name: name?, county_id: county_id? })
    }
}

/// Body of place update; absent fields stay unchanged
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlaceChanges {
    pub name: Option<String>,
    pub county_id: Option<i64>,
}

impl PlaceChanges {
    pub fn parse(input: &Input, errors: &mut ValidationErrors) -> Self {
        Self {
            name: input.optional_string("name", Some(MAX_NAME_LEN), errors),
            county_id: input.optional_id("county_id", errors),
        }
    }
}

/// Body of postal code create
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPostalCode {
    pub postal_code: String,
    pub place_name: String,
    pub county_name: String,
}

impl NewPostalCode {
    pub fn parse(input: &Input, errors: &mut ValidationErrors) -> Option<Self> {
        let postal_code = input.text("postal_code", None, true, errors);
        let place_name = input.required_string("place_name", Some(MAX_NAME_LEN), errors);
        let county_name = input.required_string("county_name", Some(MAX_NAME_LEN), errors);
        Some(Self {
            postal_code: postal_code?,
            place_name: place_name?,
            county_name: county_name?,
        })
    }
}

/// Body of postal code update; absent fields stay unchanged
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostalCodeChanges {
    pub postal_code: Option<String>,
    pub place_name: Option<String>,
    pub county_name: Option<String>,
}

impl PostalCodeChanges {
    pub fn parse(input: &Input, errors: &mut ValidationErrors) -> Self {
        Self {
            postal_code: input.optional_string("postal_code", None, errors),
            place_name: input.optional_string("place_name", Some(MAX_NAME_LEN), errors),
            county_name: input.optional_string("county_name", Some(MAX_NAME_LEN), errors),
        }
    }

    /// Place and county names, only when both were supplied
    pub fn relocation(&self) -> Option<(&str, &str)> {
        match (&self.county_name, &self.place_name) {
            (Some(county), Some(place)) => Some((county.as_str(), place.as_str())),
            _ => None,
        }
    }
}
