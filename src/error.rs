//! Error handler for the account subsystem.

use serde::Serialize;
use thiserror::Error;
use validator::ValidationErrors;

pub type Result<T> = std::result::Result<T, AccountError>;

/// Enum representing every failure the presentation layer can surface.
///
/// No variant is fatal: each one maps to an inline message and leaves the
/// stored state untouched.
#[derive(Debug, Error)]
pub enum AccountError {
    #[error("validation error occurred")]
    Validation(#[from] ValidationErrors),

    #[error("an account with this email or username already exists")]
    DuplicateAccount,

    #[error("no account matches this email")]
    NotFound,

    #[error("email address has not been verified")]
    NotVerified,

    #[error("password does not match")]
    WrongPassword,

    #[error("invalid verification code")]
    InvalidCode,

    #[error("storage unavailable: {0}")]
    Storage(#[from] std::io::Error),

    #[error("corrupted record: {0}")]
    Corrupted(#[from] serde_json::Error),
}

/// Field-level message, rendered inline next to the offending input.
#[derive(Debug, PartialEq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

/// Flatten [`ValidationErrors`] into a list of field/message pairs.
pub fn parse_validation_errors(errors: &ValidationErrors) -> Vec<FieldError> {
    errors
        .field_errors()
        .iter()
        .flat_map(|(field, issues)| {
            issues.iter().map(move |issue| FieldError {
                field: field.to_string(),
                message: issue.to_string(),
            })
        })
        .collect()
}

impl AccountError {
    /// Human-readable text for the UI.
    ///
    /// `NotFound` and `WrongPassword` collapse to one generic message so a
    /// failed login does not reveal whether the email is registered; the
    /// unverified case keeps its own wording, as on the original site.
    pub fn user_message(&self) -> String {
        match self {
            AccountError::Validation(errors) => parse_validation_errors(errors)
                .into_iter()
                .next()
                .map(|issue| issue.message)
                .unwrap_or_else(|| "Please check the highlighted fields.".into()),

            AccountError::DuplicateAccount => {
                "An account with this email or username already exists".into()
            },

            AccountError::NotFound | AccountError::WrongPassword => {
                "Invalid email or password. Please check your credentials and try again."
                    .into()
            },

            AccountError::NotVerified => {
                "Please verify your email address before logging in. Check your Gmail for the verification code."
                    .into()
            },

            AccountError::InvalidCode => {
                "Invalid verification code. Please try again.".into()
            },

            AccountError::Storage(_) | AccountError::Corrupted(_) => {
                "Something went wrong. Please try again.".into()
            },
        }
    }
}
