//! Mutable form state driven by an explicit owner.
//!
//! The controller is passed by reference to whoever edits the form. `&mut self`
//! on every mutation gives the single-writer discipline; there is no ambient
//! lookup and no interior mutability.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::future::Future;
use tracing::debug;

use super::schema::{FieldErrors, Schema, SchemaError, TypedValues};
use super::submission::{SubmissionExecutor, SubmitAction, SubmitOutcome};

#[derive(Clone, Debug)]
pub struct FormController {
    schema: Schema,
    defaults: BTreeMap<String, String>,
    values: BTreeMap<String, String>,
    errors: FieldErrors,
    touched: BTreeSet<String>,
    dirty: BTreeSet<String>,
}

impl FormController {
    /// Every field starts out empty.
    #[must_use]
    pub fn new(schema: Schema) -> Self {
        Self::with_defaults(schema, &HashMap::new())
    }

    /// Fields named in `defaults` start with that value; unknown names are ignored.
    #[must_use]
    pub fn with_defaults<S: std::hash::BuildHasher>(
        schema: Schema,
        defaults: &HashMap<String, String, S>,
    ) -> Self {
        let defaults: BTreeMap<String, String> = schema
            .fields()
            .iter()
            .map(|field| {
                let value = defaults.get(field.name()).cloned().unwrap_or_default();
                (field.name().to_string(), value)
            })
            .collect();

        Self {
            schema,
            values: defaults.clone(),
            defaults,
            errors: FieldErrors::new(),
            touched: BTreeSet::new(),
            dirty: BTreeSet::new(),
        }
    }

    /// Updates one field. A field that is currently in error is re-validated on
    /// its own so the message clears as soon as the input is corrected.
    ///
    /// # Errors
    /// Returns `SchemaError::UnknownField` for names outside the schema.
    pub fn set_value(&mut self, field: &str, value: impl Into<String>) -> Result<(), SchemaError> {
        let value = value.into();
        let outcome = self.schema.validate_field(field, &value)?;

        if self.defaults.get(field) == Some(&value) {
            self.dirty.remove(field);
        } else {
            self.dirty.insert(field.to_string());
        }
        self.touched.insert(field.to_string());

        if self.errors.contains_key(field) {
            match outcome {
                Ok(_) => {
                    self.errors.remove(field);
                }
                Err(message) => {
                    self.errors.insert(field.to_string(), message);
                }
            }
        }

        self.values.insert(field.to_string(), value);
        Ok(())
    }

    /// Marks a field as visited without changing it.
    ///
    /// # Errors
    /// Returns `SchemaError::UnknownField` for names outside the schema.
    pub fn touch(&mut self, field: &str) -> Result<(), SchemaError> {
        if self.schema.field(field).is_none() {
            return Err(SchemaError::UnknownField(field.to_string()));
        }
        self.touched.insert(field.to_string());
        Ok(())
    }

    /// Runs the whole schema and replaces the error map with the result.
    ///
    /// # Errors
    /// Returns a copy of the error map when any field fails.
    pub fn validate(&mut self) -> Result<TypedValues, FieldErrors> {
        let values: HashMap<String, String> = self
            .values
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        match self.schema.validate(&values) {
            Ok(typed) => {
                self.errors.clear();
                Ok(typed)
            }
            Err(errors) => {
                self.errors.clone_from(&errors);
                Err(errors)
            }
        }
    }

    /// Validates the form and, when it is clean, hands the typed values to the
    /// executor. Nothing reaches the executor if any field fails.
    ///
    /// # Errors
    /// Returns the field errors synchronously when validation fails.
    pub fn submit<A: SubmitAction>(
        &mut self,
        executor: &SubmissionExecutor<A>,
    ) -> Result<impl Future<Output = SubmitOutcome<A::Output, A::Error>> + Send + use<A>, FieldErrors>
    {
        let typed = self.validate().inspect_err(|errors| {
            debug!(fields = errors.len(), "submit blocked by validation errors");
        })?;
        Ok(executor.submit(typed))
    }

    /// Restores defaults and forgets errors, touched and dirty flags.
    pub fn reset(&mut self) {
        self.values.clone_from(&self.defaults);
        self.errors.clear();
        self.touched.clear();
        self.dirty.clear();
    }

    #[must_use]
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    #[must_use]
    pub fn value(&self, field: &str) -> Option<&str> {
        self.values.get(field).map(String::as_str)
    }

    #[must_use]
    pub fn values(&self) -> &BTreeMap<String, String> {
        &self.values
    }

    #[must_use]
    pub fn error(&self, field: &str) -> Option<&str> {
        self.errors.get(field).map(String::as_str)
    }

    #[must_use]
    pub fn errors(&self) -> &FieldErrors {
        &self.errors
    }

    #[must_use]
    pub fn is_touched(&self, field: &str) -> bool {
        self.touched.contains(field)
    }

    #[must_use]
    pub fn is_dirty(&self, field: &str) -> bool {
        self.dirty.contains(field)
    }

    #[must_use]
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}
