//! Contact form: who is writing and what they want.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use tracing::info;
use ulid::Ulid;
use utoipa::ToSchema;

use super::schema::{FieldSchema, Schema, SchemaError, TypedValues};
use super::submission::SubmitAction;

pub const NAME_MESSAGE: &str = "Name must be at least 2 characters.";
pub const EMAIL_MESSAGE: &str = "Please enter a valid email address.";
pub const MESSAGE_MESSAGE: &str = "Message must be at least 10 characters.";

/// `name`, `email`, `message`.
///
/// # Errors
/// Never fails in practice; field names are distinct.
pub fn schema() -> Result<Schema, SchemaError> {
    Schema::new(vec![
        FieldSchema::string("name").trimmed().min_length(2, NAME_MESSAGE),
        FieldSchema::email("email", EMAIL_MESSAGE),
        FieldSchema::string("message").trimmed().min_length(10, MESSAGE_MESSAGE),
    ])
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ContactMessage {
    pub name: String,
    pub email: String,
    pub message: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ContactReceipt {
    pub id: String,
}

/// Accepts a contact message and records it in the log.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogContactAction;

#[async_trait]
impl SubmitAction for LogContactAction {
    type Output = ContactReceipt;
    type Error = Infallible;

    async fn run(&self, values: TypedValues) -> Result<ContactReceipt, Infallible> {
        let id = Ulid::new().to_string();
        info!(
            id = %id,
            length = values.text("message").map_or(0, str::len),
            "contact message received"
        );
        Ok(ContactReceipt { id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forms::FormController;
    use anyhow::{Context, Result, anyhow};
    use std::io;
    use std::sync::{Arc, Mutex};
    use tracing::instrument::WithSubscriber;

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if let Ok(mut out) = self.0.lock() {
                out.extend_from_slice(buf);
            }
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn all_three_rules_apply() -> Result<()> {
        let mut form = FormController::new(schema()?);
        form.set_value("name", "A")?;
        form.set_value("email", "a@b")?;
        form.set_value("message", "too short")?;
        let errors = form.validate().err().context("expected errors")?;
        assert_eq!(errors.get("name").map(String::as_str), Some(NAME_MESSAGE));
        assert_eq!(errors.get("email").map(String::as_str), Some(EMAIL_MESSAGE));
        assert_eq!(errors.get("message").map(String::as_str), Some(MESSAGE_MESSAGE));
        Ok(())
    }

    #[test]
    fn typed_message_round_trips_from_values() -> Result<()> {
        let mut form = FormController::new(schema()?);
        form.set_value("name", "Ada")?;
        form.set_value("email", "ada@example.com")?;
        form.set_value("message", "Hello there, friend")?;
        let typed = form
            .validate()
            .map_err(|errors| anyhow::anyhow!("{errors:?}"))?;
        let message: ContactMessage = typed.into_typed()?;
        assert_eq!(message.name, "Ada");
        assert_eq!(message.message, "Hello there, friend");
        Ok(())
    }

    #[tokio::test]
    async fn log_action_issues_a_receipt() -> Result<()> {
        let receipt = LogContactAction
            .run(TypedValues::default())
            .await
            .context("infallible")?;
        assert!(Ulid::from_string(&receipt.id).is_ok());
        Ok(())
    }

    #[tokio::test]
    async fn log_line_leaves_out_the_sender() -> Result<()> {
        let mut form = FormController::new(schema()?);
        form.set_value("name", "Ada Lovelace")?;
        form.set_value("email", "ada@example.com")?;
        form.set_value("message", "Hello there, friend")?;
        let typed = form.validate().map_err(|errors| anyhow!("{errors:?}"))?;

        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .with_max_level(tracing::Level::INFO)
            .with_writer(move || writer.clone())
            .finish();

        let receipt = LogContactAction
            .run(typed)
            .with_subscriber(subscriber)
            .await
            .context("infallible")?;

        let output = captured.0.lock().map_err(|_| anyhow!("poisoned"))?.clone();
        let output = String::from_utf8(output)?;
        assert!(output.contains("contact message received"));
        assert!(output.contains(&receipt.id));
        assert!(!output.contains("Ada Lovelace"));
        assert!(!output.contains("ada@example.com"));
        Ok(())
    }
}
