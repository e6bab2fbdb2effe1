//! Declarative form schemas and the single routine that interprets them.
//!
//! A schema is data: an ordered list of fields, each with an ordered list of
//! constraint descriptors. `Schema::validate` walks every field, stops at the
//! first failing constraint of that field, and keeps going with the next field
//! so the caller always receives the complete error map.

use regex::Regex;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;
use utoipa::ToSchema;

/// Field name → message for every field whose last validation failed.
pub type FieldErrors = BTreeMap<String, String>;

/// Semantic type of a field; decides how a valid raw string is coerced.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    String,
    Email,
    Number,
}

#[derive(Clone, Debug)]
pub enum Constraint {
    Required { message: String },
    MinLength { value: usize, message: String },
    MaxLength { value: usize, message: String },
    Pattern { regex: Regex, message: String },
    Email { message: String },
    Numeric { message: String },
}

impl Constraint {
    /// Returns the failure message, or `None` when `value` (already trimmed) passes.
    fn check(&self, value: &str) -> Option<&str> {
        let passed = match self {
            Self::Required { .. } => !value.is_empty(),
            Self::MinLength { value: min, .. } => value.chars().count() >= *min,
            Self::MaxLength { value: max, .. } => value.chars().count() <= *max,
            Self::Pattern { regex, .. } => regex.is_match(value),
            Self::Email { .. } => valid_email(value),
            Self::Numeric { .. } => value.parse::<f64>().is_ok_and(f64::is_finite),
        };

        if passed { None } else { Some(self.message()) }
    }

    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            Self::Required { message }
            | Self::MinLength { message, .. }
            | Self::MaxLength { message, .. }
            | Self::Pattern { message, .. }
            | Self::Email { message }
            | Self::Numeric { message } => message,
        }
    }

    fn describe(&self) -> ConstraintDescription {
        let (kind, value) = match self {
            Self::Required { .. } => ("required", None),
            Self::MinLength { value, .. } => ("min_length", Some(value.to_string())),
            Self::MaxLength { value, .. } => ("max_length", Some(value.to_string())),
            Self::Pattern { regex, .. } => ("pattern", Some(regex.as_str().to_string())),
            Self::Email { .. } => ("email", None),
            Self::Numeric { .. } => ("numeric", None),
        };
        ConstraintDescription {
            kind: kind.to_string(),
            value,
            message: self.message().to_string(),
        }
    }
}

/// Basic email format check: `local@domain` with a dot in the domain.
pub(crate) fn valid_email(email: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").is_ok_and(|regex| regex.is_match(email))
}

#[derive(Clone, Debug)]
pub struct FieldSchema {
    name: String,
    kind: FieldKind,
    trim: bool,
    constraints: Vec<Constraint>,
}

impl FieldSchema {
    #[must_use]
    pub fn string(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: FieldKind::String,
            trim: false,
            constraints: Vec::new(),
        }
    }

    /// An email field; the email format check is its first constraint and the
    /// accepted value is trimmed.
    #[must_use]
    pub fn email(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: FieldKind::Email,
            trim: true,
            constraints: vec![Constraint::Email {
                message: message.into(),
            }],
        }
    }

    /// A numeric field; the parse check is its first constraint.
    #[must_use]
    pub fn number(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: FieldKind::Number,
            trim: true,
            constraints: vec![Constraint::Numeric {
                message: message.into(),
            }],
        }
    }

    /// Keeps the trimmed input as the accepted value instead of the raw one.
    #[must_use]
    pub fn trimmed(mut self) -> Self {
        self.trim = true;
        self
    }

    #[must_use]
    pub fn required(self, message: impl Into<String>) -> Self {
        self.with(Constraint::Required {
            message: message.into(),
        })
    }

    #[must_use]
    pub fn min_length(self, value: usize, message: impl Into<String>) -> Self {
        self.with(Constraint::MinLength {
            value,
            message: message.into(),
        })
    }

    #[must_use]
    pub fn max_length(self, value: usize, message: impl Into<String>) -> Self {
        self.with(Constraint::MaxLength {
            value,
            message: message.into(),
        })
    }

    #[must_use]
    pub fn pattern(self, regex: Regex, message: impl Into<String>) -> Self {
        self.with(Constraint::Pattern {
            regex,
            message: message.into(),
        })
    }

    /// Appends a constraint; it is evaluated after every constraint already present.
    #[must_use]
    pub fn with(mut self, constraint: Constraint) -> Self {
        self.constraints.push(constraint);
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn kind(&self) -> FieldKind {
        self.kind
    }

    #[must_use]
    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    /// Validates and coerces one raw value. First failing constraint wins.
    ///
    /// Constraints always see the trimmed input. Text fields hand back the raw
    /// input unless the field is trimmed.
    ///
    /// # Errors
    /// Returns the message of the first constraint the trimmed value fails.
    pub fn check(&self, raw: &str) -> Result<FieldValue, String> {
        let value = raw.trim();

        if let Some(message) = self.constraints.iter().find_map(|c| c.check(value)) {
            return Err(message.to_string());
        }

        match self.kind {
            FieldKind::String | FieldKind::Email if self.trim => {
                Ok(FieldValue::Text(value.to_string()))
            }
            FieldKind::String | FieldKind::Email => Ok(FieldValue::Text(raw.to_string())),
            FieldKind::Number => value
                .parse::<f64>()
                .map(FieldValue::Number)
                .map_err(|_| format!("{} must be a number", self.name)),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SchemaError {
    #[error("duplicate field: {0}")]
    DuplicateField(String),
    #[error("unknown field: {0}")]
    UnknownField(String),
}

/// Ordered set of fields with unique names.
#[derive(Clone, Debug)]
pub struct Schema {
    fields: Vec<FieldSchema>,
}

impl Schema {
    /// # Errors
    /// Returns `SchemaError::DuplicateField` when two fields share a name.
    pub fn new(fields: Vec<FieldSchema>) -> Result<Self, SchemaError> {
        for (index, field) in fields.iter().enumerate() {
            if fields[..index].iter().any(|f| f.name == field.name) {
                return Err(SchemaError::DuplicateField(field.name.clone()));
            }
        }
        Ok(Self { fields })
    }

    #[must_use]
    pub fn fields(&self) -> &[FieldSchema] {
        &self.fields
    }

    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldSchema> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Validates every field independently; missing input counts as empty.
    ///
    /// # Errors
    /// Returns the full error map when at least one field fails.
    pub fn validate<S: std::hash::BuildHasher>(
        &self,
        values: &HashMap<String, String, S>,
    ) -> Result<TypedValues, FieldErrors> {
        let mut typed = BTreeMap::new();
        let mut errors = FieldErrors::new();

        for field in &self.fields {
            let raw = values.get(&field.name).map_or("", String::as_str);
            match field.check(raw) {
                Ok(value) => {
                    typed.insert(field.name.clone(), value);
                }
                Err(message) => {
                    errors.insert(field.name.clone(), message);
                }
            }
        }

        if errors.is_empty() {
            Ok(TypedValues(typed))
        } else {
            Err(errors)
        }
    }

    /// Validates one field by name.
    ///
    /// # Errors
    /// Returns `SchemaError::UnknownField` for names outside the schema; the inner
    /// result carries the field's own outcome.
    pub fn validate_field(
        &self,
        name: &str,
        raw: &str,
    ) -> Result<Result<FieldValue, String>, SchemaError> {
        self.field(name)
            .map(|field| field.check(raw))
            .ok_or_else(|| SchemaError::UnknownField(name.to_string()))
    }

    /// Public, serializable view of the schema for clients that render the form.
    #[must_use]
    pub fn describe(&self) -> FormDescription {
        FormDescription {
            fields: self
                .fields
                .iter()
                .map(|field| FieldDescription {
                    name: field.name.clone(),
                    kind: field.kind,
                    constraints: field.constraints.iter().map(Constraint::describe).collect(),
                })
                .collect(),
        }
    }
}

/// Free-function form of [`Schema::validate`].
///
/// # Errors
/// Returns the full error map when at least one field fails.
pub fn validate<S: std::hash::BuildHasher>(
    schema: &Schema,
    values: &HashMap<String, String, S>,
) -> Result<TypedValues, FieldErrors> {
    schema.validate(values)
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Text(String),
    Number(f64),
}

/// Coerced output of a successful validation run.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct TypedValues(BTreeMap<String, FieldValue>);

impl TypedValues {
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.0.get(name)
    }

    #[must_use]
    pub fn text(&self, name: &str) -> Option<&str> {
        match self.0.get(name) {
            Some(FieldValue::Text(value)) => Some(value),
            _ => None,
        }
    }

    #[must_use]
    pub fn number(&self, name: &str) -> Option<f64> {
        match self.0.get(name) {
            Some(FieldValue::Number(value)) => Some(*value),
            _ => None,
        }
    }

    /// Converts the values into a typed payload struct.
    ///
    /// # Errors
    /// Returns a serde error when the payload shape does not match the schema.
    pub fn into_typed<T: DeserializeOwned>(self) -> Result<T, serde_json::Error> {
        serde_json::to_value(self).and_then(serde_json::from_value)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ConstraintDescription {
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    pub message: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct FieldDescription {
    pub name: String,
    pub kind: FieldKind,
    pub constraints: Vec<ConstraintDescription>,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct FormDescription {
    pub fields: Vec<FieldDescription>,
}
