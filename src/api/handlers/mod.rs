//! Route handlers and the helpers they share for form payloads.

pub mod apps;
pub mod contact;
pub mod health;
pub mod proxy;
pub mod root;
pub mod session;
pub mod sign_in;

use axum::{Json, extract::rejection::JsonRejection};
use serde_json::Value;
use std::collections::HashMap;
use tracing::debug;

use crate::error::AppError;
use crate::forms::{FormController, Schema, SchemaError};

/// A submitted form as loose JSON; names outside the schema are ignored.
pub type RawForm = HashMap<String, Value>;

/// Keeps strings as they are and renders numbers and booleans as text.
/// Anything else counts as missing input.
pub(crate) fn raw_fields(
    payload: Result<Json<RawForm>, JsonRejection>,
) -> Result<HashMap<String, String>, AppError> {
    let Json(raw) = payload.map_err(|rejection| {
        debug!("rejected form payload: {rejection}");
        AppError::bad_request(rejection.body_text())
    })?;

    Ok(raw
        .into_iter()
        .filter_map(|(name, value)| match value {
            Value::String(text) => Some((name, text)),
            Value::Number(number) => Some((name, number.to_string())),
            Value::Bool(flag) => Some((name, flag.to_string())),
            _ => None,
        })
        .collect())
}

/// Builds a controller for `schema` and feeds it the submitted values.
pub(crate) fn fill_form(
    schema: Schema,
    raw: &HashMap<String, String>,
) -> Result<FormController, SchemaError> {
    let names: Vec<String> = schema
        .fields()
        .iter()
        .map(|field| field.name().to_string())
        .collect();

    let mut form = FormController::new(schema);
    for name in names {
        if let Some(value) = raw.get(&name) {
            form.set_value(&name, value.clone())?;
        }
    }
    Ok(form)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forms::FieldSchema;
    use anyhow::Result;
    use serde_json::json;

    #[test]
    fn raw_fields_keeps_scalars() -> Result<()> {
        let raw: RawForm = serde_json::from_value(json!({
            "email": "ada@example.com",
            "age": 36,
            "extra": { "nested": true },
        }))?;
        let fields = raw_fields(Ok(Json(raw)))?;
        assert_eq!(fields.get("email").map(String::as_str), Some("ada@example.com"));
        assert_eq!(fields.get("age").map(String::as_str), Some("36"));
        assert!(!fields.contains_key("extra"));
        Ok(())
    }

    #[test]
    fn fill_form_ignores_unknown_names() -> Result<()> {
        let schema = Schema::new(vec![FieldSchema::string("name")])?;
        let raw = HashMap::from([
            ("name".to_string(), "Ada".to_string()),
            ("admin".to_string(), "true".to_string()),
        ]);
        let form = fill_form(schema, &raw)?;
        assert_eq!(form.value("name"), Some("Ada"));
        assert_eq!(form.value("admin"), None);
        Ok(())
    }
}
