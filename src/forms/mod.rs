//! Schema-driven forms: validation, controller state and single-flight submission.

pub mod contact;
pub mod controller;
pub mod schema;
pub mod sign_in;
pub mod submission;

pub use controller::FormController;
pub use schema::{
    Constraint, FieldErrors, FieldKind, FieldSchema, FieldValue, FormDescription, Schema,
    SchemaError, TypedValues, validate,
};
pub use submission::{
    SubmissionExecutor, SubmissionState, SubmitAction, SubmitOutcome, SubmitPolicy,
};
