//! Credential sign-in form.

use async_trait::async_trait;
use secrecy::SecretString;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;

use super::schema::{FieldSchema, Schema, SchemaError, TypedValues};
use super::submission::SubmitAction;
use crate::auth::{AuthError, Authenticator, Credentials};
use crate::session::Session;

pub const EMAIL_MESSAGE: &str = "Please enter a valid email address.";
pub const PASSWORD_MESSAGE: &str = "Password must be at least 6 characters.";
pub const PASSWORD_MIN_LENGTH: usize = 6;

/// `email` + `password`, in that order.
///
/// # Errors
/// Never fails in practice; field names are distinct.
pub fn schema() -> Result<Schema, SchemaError> {
    Schema::new(vec![
        FieldSchema::email("email", EMAIL_MESSAGE),
        FieldSchema::string("password").min_length(PASSWORD_MIN_LENGTH, PASSWORD_MESSAGE),
    ])
}

#[derive(Deserialize, ToSchema)]
pub struct SignInForm {
    pub email: String,
    pub password: String,
}

impl From<SignInForm> for Credentials {
    fn from(form: SignInForm) -> Self {
        Self {
            email: form.email,
            password: SecretString::from(form.password),
        }
    }
}

/// Exchanges validated credentials for a session.
pub struct SignInAction {
    authenticator: Arc<dyn Authenticator>,
}

impl SignInAction {
    #[must_use]
    pub fn new(authenticator: Arc<dyn Authenticator>) -> Self {
        Self { authenticator }
    }
}

#[async_trait]
impl SubmitAction for SignInAction {
    type Output = Session;
    type Error = AuthError;

    #[instrument(skip_all)]
    async fn run(&self, values: TypedValues) -> Result<Session, AuthError> {
        let form: SignInForm = values
            .into_typed()
            .map_err(|err| AuthError::InvalidRequest(err.to_string()))?;
        let credentials = Credentials::from(form);
        let session = self.authenticator.authenticate(&credentials).await?;
        info!(principal = %session.principal.id, "signed in");
        Ok(session)
    }
}
