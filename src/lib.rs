//! Smiya-accounts is the local account manager behind the Smiya City
//! roleplay portal.
//!
//! Everything lives in one file-persisted key-value store patterned on the
//! browser storage of the original site: registered accounts, the singleton
//! session and the optional remembered credentials. There is no server, no
//! real mail delivery and no cryptography; passwords are kept verbatim and
//! verification codes are surfaced for on-screen display. Views never touch
//! the store directly, they go through [`AccountRegistry`] and
//! [`SessionManager`].

#[forbid(unsafe_code)]
#[deny(missing_docs, unused_mut)]
pub mod account;
pub mod config;
pub mod error;
pub mod mail;
pub mod session;
pub mod store;
pub mod telemetry;
pub mod verification;

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use validator::{Validate, ValidateArgs};

use account::{AccountRegistry, ProfileUpdate, RegisterForm, UserRecord};
use error::{AccountError, Result};
use mail::{MailManager, Template};
use session::{LoginForm, SessionManager, SessionRecord};
use verification::VerificationFlow;

/// State sharing between views.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<config::Configuration>,
    pub store: Arc<store::LocalStore>,
    pub accounts: AccountRegistry,
    pub sessions: SessionManager,
    pub mail: Arc<MailManager>,
}

/// Initialize the application state.
pub fn initialize_state() -> Result<AppState> {
    // read configuration file. let it in memory.
    let config = config::Configuration::default().read();
    let store = Arc::new(store::LocalStore::open(&config.storage)?);

    Ok(AppState::with_store(config, store))
}

impl AppState {
    /// Wire the components over an already opened store.
    pub fn with_store(
        config: Arc<config::Configuration>,
        store: Arc<store::LocalStore>,
    ) -> Self {
        let accounts = AccountRegistry::new(Arc::clone(&store));
        let sessions = SessionManager::new(Arc::clone(&store), accounts.clone());

        Self {
            config,
            store,
            accounts,
            sessions,
            mail: Arc::new(MailManager::new()),
        }
    }

    /// Composed registration flow, as the register page performed it:
    /// validate the fields, block duplicates, persist the unverified record
    /// and "send" its verification code.
    ///
    /// Returns the new record together with the page-local flow that will
    /// consume the code.
    pub fn register(
        &self,
        form: &RegisterForm,
    ) -> Result<(UserRecord, VerificationFlow)> {
        form.validate_with_args(self.config.as_ref())?;

        if self.accounts.exists(&form.email, &form.username)? {
            return Err(AccountError::DuplicateAccount);
        }

        self.pause();

        let record =
            self.accounts
                .register(&form.username, &form.email, &form.password)?;
        self.mail.deliver(
            Template::VerificationCode,
            &record.email,
            &record.verification_code,
        );

        let flow = VerificationFlow::new(&record);
        Ok((record, flow))
    }

    /// Composed login flow: validate the form, then authenticate and open
    /// the session.
    pub fn login(&self, form: &LoginForm) -> Result<SessionRecord> {
        form.validate()?;

        self.pause();

        self.sessions.login(&form.email, &form.password, form.remember_me)
    }

    /// Composed profile-update flow, as the profile page performed it:
    /// replace the mutable fields on the record, then mirror the change
    /// into the open session so it never goes stale.
    ///
    /// Returns `None` when no record matches `id`.
    pub fn update_profile(
        &self,
        id: &str,
        patch: ProfileUpdate,
    ) -> Result<Option<UserRecord>> {
        let Some(updated) = self.accounts.update_record(id, patch)? else {
            return Ok(None);
        };

        self.sessions.refresh(&updated)?;

        Ok(Some(updated))
    }

    /// Cosmetic stand-in for network latency. Not cancellable.
    fn pause(&self) {
        let delay = self.config.simulated_latency_ms;
        if delay > 0 {
            thread::sleep(Duration::from_millis(delay));
        }
    }
}

#[cfg(test)]
pub(crate) fn test_state() -> AppState {
    AppState::with_store(
        Arc::new(config::Configuration::default()),
        Arc::new(store::LocalStore::in_memory()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::parse_validation_errors;
    use crate::verification::VerificationState;

    fn register_form(username: &str, email: &str) -> RegisterForm {
        RegisterForm {
            username: username.into(),
            email: email.into(),
            password: "secret1".into(),
            confirm_password: "secret1".into(),
            agree_to_terms: true,
        }
    }

    #[test]
    fn register_collects_field_errors() {
        let state = test_state();
        let form = RegisterForm {
            username: "ab".into(),
            email: "citizen@outlook.com".into(),
            password: "short".into(),
            confirm_password: "different".into(),
            agree_to_terms: false,
        };

        let err = state.register(&form).unwrap_err();
        let AccountError::Validation(errors) = err else {
            panic!("expected validation errors");
        };

        let fields: Vec<String> = parse_validation_errors(&errors)
            .into_iter()
            .map(|issue| issue.field)
            .collect();
        assert!(fields.iter().any(|f| f == "username"));
        assert!(fields.iter().any(|f| f == "email"));
        assert!(fields.iter().any(|f| f == "password"));
        assert!(fields.iter().any(|f| f == "confirm_password"));
        assert!(fields.iter().any(|f| f == "agree_to_terms"));

        // Nothing was stored.
        assert!(state.accounts.records().unwrap().is_empty());
    }

    #[test]
    fn register_requires_the_configured_mail_domain() {
        let state = test_state();

        let rejected = state.register(&register_form("citizen", "citizen@outlook.com"));
        assert!(matches!(
            rejected.unwrap_err(),
            AccountError::Validation(_)
        ));

        state
            .register(&register_form("citizen", "citizen@gmail.com"))
            .unwrap();
    }

    #[test]
    fn duplicate_registration_is_blocked_before_a_second_record() {
        let state = test_state();
        state
            .register(&register_form("citizen", "citizen@gmail.com"))
            .unwrap();

        // Same email, any case variation.
        let err = state
            .register(&register_form("someone", "CITIZEN@GMAIL.COM"))
            .unwrap_err();
        assert!(matches!(err, AccountError::DuplicateAccount));

        // Same username too.
        let err = state
            .register(&register_form("Citizen", "other@gmail.com"))
            .unwrap_err();
        assert!(matches!(err, AccountError::DuplicateAccount));

        assert_eq!(state.accounts.records().unwrap().len(), 1);
    }

    #[test]
    fn full_workflow_register_verify_login_logout() {
        let state = test_state();

        let (record, mut flow) = state
            .register(&register_form("citizen", "citizen@gmail.com"))
            .unwrap();
        assert!(!record.is_verified);

        // The "mail" with the code is in the outbox for display.
        let displayed = state.mail.last_for("citizen@gmail.com").unwrap();
        assert_eq!(displayed.code, record.verification_code);

        // Login is refused until the code is consumed.
        let login = LoginForm {
            email: "citizen@gmail.com".into(),
            password: "secret1".into(),
            remember_me: false,
        };
        assert!(matches!(
            state.login(&login).unwrap_err(),
            AccountError::NotVerified
        ));

        let code = flow.issued_code().to_string();
        flow.verify(&state.accounts, &code).unwrap();
        assert_eq!(flow.state(), VerificationState::Verified);

        let session = state.login(&login).unwrap();
        assert_eq!(session.id, record.id);
        assert_eq!(session.username, "citizen");

        state.sessions.logout().unwrap();
        assert_eq!(state.sessions.current_session().unwrap(), None);
    }

    #[test]
    fn profile_update_reaches_the_open_session() {
        let state = test_state();
        let (record, mut flow) = state
            .register(&register_form("citizen", "citizen@gmail.com"))
            .unwrap();
        let code = flow.issued_code().to_string();
        flow.verify(&state.accounts, &code).unwrap();

        let login = LoginForm {
            email: "citizen@gmail.com".into(),
            password: "secret1".into(),
            remember_me: false,
        };
        state.login(&login).unwrap();

        state
            .update_profile(
                &record.id,
                ProfileUpdate {
                    username: "renamed".into(),
                    email: "renamed@gmail.com".into(),
                    password: "secret1".into(),
                },
            )
            .unwrap()
            .unwrap();

        let session = state.sessions.current_session().unwrap().unwrap();
        assert_eq!(session.username, "renamed");
        assert_eq!(session.email, "renamed@gmail.com");
        assert_eq!(session.id, record.id);

        // Unknown id touches neither the records nor the session.
        assert!(
            state
                .update_profile(
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
        let session = state.sessions.current_session().unwrap().unwrap();
        assert_eq!(session.username, "renamed");
    }
}
