//! Handle record store requests for registered accounts.

use std::sync::Arc;

use chrono::Utc;
use serde::Deserialize;
use validator::{Validate, ValidationError};

use crate::account::UserRecord;
use crate::config::Configuration;
use crate::error::Result;
use crate::store::LocalStore;
use crate::verification;

/// Store key owning the registered account collection.
pub(crate) const USERS_KEY: &str = "registeredUsers";

/// Registration request, checked before [`AccountRegistry::register`].
#[derive(Debug, Deserialize, Validate)]
#[validate(context = Configuration)]
#[serde(rename_all = "camelCase")]
pub struct RegisterForm {
    /// Chosen display name.
    #[validate(length(
        min = 3,
        message = "Username must be at least 3 characters long"
    ))]
    pub username: String,
    /// Address on the configured mail domain.
    #[validate(custom(
        function = "validate_restricted_email",
        use_context
    ))]
    pub email: String,
    /// Chosen password, stored verbatim.
    #[validate(length(
        min = 6,
        message = "Password must be at least 6 characters long"
    ))]
    pub password: String,
    /// Must equal `password`.
    #[validate(must_match(
        other = "password",
        message = "Passwords do not match"
    ))]
    pub confirm_password: String,
    /// Terms of service acceptance flag, must be true.
    #[validate(custom(function = "validate_terms"))]
    pub agree_to_terms: bool,
}

/// The mutable profile fields, applied by [`AccountRegistry::update_record`].
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    /// Replacement display name.
    pub username: String,
    /// Replacement email address.
    pub email: String,
    /// Replacement password.
    pub password: String,
}

fn validate_restricted_email(
    email: &str,
    config: &Configuration,
) -> std::result::Result<(), ValidationError> {
    if !email.contains('@') || !email.contains('.') {
        return Err(ValidationError::new("email")
            .with_message("Please enter a valid email address".into()));
    }

    // Substring match, as the original site checked it.
    if !email.to_lowercase().contains(&config.mail_domain) {
        return Err(ValidationError::new("email_domain").with_message(
            "Please use a Gmail address for verification".into(),
        ));
    }

    Ok(())
}

fn validate_terms(agreed: &bool) -> std::result::Result<(), ValidationError> {
    if !agreed {
        return Err(ValidationError::new("terms").with_message(
            "You must agree to the terms and conditions".into(),
        ));
    }

    Ok(())
}

/// Manages the collection of registered accounts.
///
/// Every mutation rewrites the whole serialized collection back to the
/// store; there are no partial writes and no transactions.
#[derive(Clone)]
pub struct AccountRegistry {
    store: Arc<LocalStore>,
}

impl AccountRegistry {
    /// Create a new [`AccountRegistry`] over `store`.
    pub fn new(store: Arc<LocalStore>) -> Self {
        Self { store }
    }

    /// Every stored record, in registration order.
    pub fn records(&self) -> Result<Vec<UserRecord>> {
        match self.store.get(USERS_KEY) {
            Some(raw) => Ok(serde_json::from_str(&raw)?),
            None => Ok(Vec::new()),
        }
    }

    /// True if any record matches `email` or `username`, case-insensitively.
    /// Used to block duplicate registration.
    pub fn exists(&self, email: &str, username: &str) -> Result<bool> {
        let email = email.to_lowercase();
        let username = username.to_lowercase();

        Ok(self.records()?.iter().any(|record| {
            record.email.to_lowercase() == email
                || record.username.to_lowercase() == username
        }))
    }

    /// Append a fresh, unverified record with a newly issued code.
    ///
    /// The caller must have validated the fields and checked [`exists`]
    /// first; there is no second line of defense here, so skipping that
    /// corrupts the uniqueness invariants.
    ///
    /// [`exists`]: AccountRegistry::exists
    pub fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<UserRecord> {
        let now = Utc::now();
        let record = UserRecord {
            id: now.timestamp_millis().to_string(),
            username: username.to_owned(),
            email: email.to_owned(),
            password: password.to_owned(),
            registration_date: now,
            is_verified: false,
            verification_code: verification::generate_code(),
        };

        let mut records = self.records()?;
        records.push(record.clone());
        self.save(&records)?;

        tracing::info!(user_id = record.id, "account registered");

        Ok(record)
    }

    /// Case-insensitive lookup, first match wins.
    pub fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>> {
        let email = email.to_lowercase();

        Ok(self
            .records()?
            .into_iter()
            .find(|record| record.email.to_lowercase() == email))
    }

    /// Set `isVerified` on the record(s) matching `email` exactly.
    /// A no-op when none match.
    pub fn mark_verified(&self, email: &str) -> Result<()> {
        let mut records = self.records()?;
        let mut changed = false;

        for record in records.iter_mut().filter(|r| r.email == email) {
            if !record.is_verified {
                record.is_verified = true;
                changed = true;
            }
        }

        if changed {
            self.save(&records)?;
            tracing::info!("email verified");
        }

        Ok(())
    }

    /// Replace the mutable profile fields on the record matching `id`.
    ///
    /// `id`, `registrationDate`, `isVerified` and `verificationCode` are
    /// never touched. Returns the updated record, or `None` when the id is
    /// unknown.
    pub fn update_record(
        &self,
        id: &str,
        patch: ProfileUpdate,
    ) -> Result<Option<UserRecord>> {
        let mut records = self.records()?;
        let Some(record) = records.iter_mut().find(|r| r.id == id) else {
            return Ok(None);
        };

        record.username = patch.username;
        record.email = patch.email;
        record.password = patch.password;
        let updated = record.clone();

        self.save(&records)?;
        tracing::info!(user_id = updated.id, "profile updated");

        Ok(Some(updated))
    }

    fn save(&self, records: &[UserRecord]) -> Result<()> {
        self.store.set(USERS_KEY, serde_json::to_string(records)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> AccountRegistry {
        AccountRegistry::new(Arc::new(LocalStore::in_memory()))
    }

    #[test]
    fn register_starts_unverified() {
        let registry = registry();
        let record = registry
            .register("citizen", "citizen@gmail.com", "secret1")
            .unwrap();

        assert!(!record.is_verified);
        assert_eq!(record.verification_code.len(), 6);
        assert_eq!(
            registry.find_by_email("citizen@gmail.com").unwrap(),
            Some(record)
        );
    }

    #[test]
    fn exists_matches_any_case_variant() {
        let registry = registry();
        registry
            .register("Citizen", "Citizen@Gmail.com", "secret1")
            .unwrap();

        assert!(registry.exists("citizen@gmail.com", "nobody").unwrap());
        assert!(registry.exists("CITIZEN@GMAIL.COM", "nobody").unwrap());
        assert!(registry.exists("other@gmail.com", "cItIzEn").unwrap());
        assert!(!registry.exists("other@gmail.com", "someone").unwrap());
    }

    #[test]
    fn case_folding_is_not_ascii_only() {
        let registry = registry();
        registry
            .register("Bürger", "bürger@gmail.com", "secret1")
            .unwrap();

        assert!(registry.exists("BÜRGER@GMAIL.COM", "nobody").unwrap());
        assert!(registry.exists("other@gmail.com", "bÜRGER").unwrap());
        assert!(
            registry
                .find_by_email("BÜRGER@gmail.com")
                .unwrap()
                .is_some()
        );
    }

    #[test]
    fn find_by_email_is_case_insensitive_first_match() {
        let registry = registry();
        let first = registry
            .register("one", "same@gmail.com", "secret1")
            .unwrap();
        // Second record with a case-variant duplicate: possible when the
        // exists() precondition is skipped.
        registry
            .register("two", "SAME@gmail.com", "secret2")
            .unwrap();

        let found = registry.find_by_email("Same@Gmail.Com").unwrap().unwrap();
        assert_eq!(found.username, first.username);
        assert_eq!(found.username, "one");
    }

    #[test]
    fn mark_verified_is_exact_and_idempotent() {
        let registry = registry();
        let record = registry
            .register("citizen", "citizen@gmail.com", "secret1")
            .unwrap();

        // Case-variant spelling does not match; the flow always passes the
        // registered string.
        registry.mark_verified("CITIZEN@gmail.com").unwrap();
        assert!(
            !registry
                .find_by_email("citizen@gmail.com")
                .unwrap()
                .unwrap()
                .is_verified
        );

        registry.mark_verified(&record.email).unwrap();
        registry.mark_verified(&record.email).unwrap();
        assert!(
            registry
                .find_by_email("citizen@gmail.com")
                .unwrap()
                .unwrap()
                .is_verified
        );

        // Unknown email is a no-op.
        registry.mark_verified("ghost@gmail.com").unwrap();
    }

    #[test]
    fn update_record_preserves_immutable_fields() {
        let registry = registry();
        let record = registry
            .register("citizen", "citizen@gmail.com", "secret1")
            .unwrap();
        registry.mark_verified(&record.email).unwrap();

        let updated = registry
            .update_record(
                &record.id,
                ProfileUpdate {
                    username: "renamed".into(),
                    email: "renamed@gmail.com".into(),
                    password: "changed".into(),
                },
            )
            .unwrap()
            .unwrap();

        assert_eq!(updated.id, record.id);
        assert_eq!(updated.registration_date, record.registration_date);
        assert_eq!(updated.verification_code, record.verification_code);
        assert!(updated.is_verified);
        assert_eq!(updated.username, "renamed");
        assert_eq!(updated.email, "renamed@gmail.com");
        assert_eq!(updated.password, "changed");

        assert!(
            registry
                .update_record(
                    "0",
                    ProfileUpdate {
                        username: "x".into(),
                        email: "x@gmail.com".into(),
                        password: "xxxxxx".into(),
                    },
                )
                .unwrap()
                .is_none()
        );
    }

    #[test]
    fn records_round_trip_through_store_json() {
        let store = Arc::new(LocalStore::in_memory());
        let registry = AccountRegistry::new(Arc::clone(&store));
        registry
            .register("citizen", "citizen@gmail.com", "secret1")
            .unwrap();

        // Persisted shape matches the original site's camelCase payload.
        let raw = store.get(USERS_KEY).unwrap();
        assert!(raw.contains("\"registrationDate\""));
        assert!(raw.contains("\"isVerified\":false"));
        assert!(raw.contains("\"verificationCode\""));
    }
}
