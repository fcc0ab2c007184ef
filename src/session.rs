//! Session lifecycle over the local record store.
//!
//! At most one session exists per store. The manager is the sole writer of
//! the session keys; views only read the session to decide what to render.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use crate::account::{AccountRegistry, UserRecord};
use crate::error::{AccountError, Result};
use crate::store::LocalStore;

pub(crate) const SESSION_KEY: &str = "currentUser";
pub(crate) const AUTH_FLAG_KEY: &str = "isAuthenticated";
pub(crate) const REMEMBERED_EMAIL_KEY: &str = "rememberedEmail";
pub(crate) const REMEMBERED_PASSWORD_KEY: &str = "rememberedPassword";
pub(crate) const REMEMBER_FLAG_KEY: &str = "rememberMe";

/// The logged-in account, copied from its [`UserRecord`] at login time.
///
/// [`UserRecord`]: crate::account::UserRecord
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    pub id: String,
    pub username: String,
    pub email: String,
    pub login_time: DateTime<Utc>,
    pub is_logged_in: bool,
}

/// Plain-text credentials persisted when the user opts in at login.
#[derive(Clone, Debug, PartialEq)]
pub struct RememberedCredentials {
    pub email: String,
    pub password: String,
}

/// Login request, checked before [`SessionManager::login`].
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct LoginForm {
    #[validate(
        length(min = 1, message = "Please fill in all fields"),
        custom(function = "validate_email_shape")
    )]
    pub email: String,
    #[validate(length(min = 1, message = "Please fill in all fields"))]
    pub password: String,
    #[serde(default)]
    pub remember_me: bool,
}

fn validate_email_shape(email: &str) -> std::result::Result<(), ValidationError> {
    if !email.is_empty() && !email.contains('@') {
        return Err(ValidationError::new("email")
            .with_message("Please enter a valid email address".into()));
    }

    Ok(())
}

/// Opens and closes the singleton session.
#[derive(Clone)]
pub struct SessionManager {
    store: Arc<LocalStore>,
    registry: AccountRegistry,
}

impl SessionManager {
    /// Create a new [`SessionManager`] sharing `store` with `registry`.
    pub fn new(store: Arc<LocalStore>, registry: AccountRegistry) -> Self {
        Self { store, registry }
    }

    /// Authenticate `email`/`password` and open a session.
    ///
    /// Rejects with [`AccountError::NotFound`] when no record matches,
    /// [`AccountError::NotVerified`] before the email is verified, and
    /// [`AccountError::WrongPassword`] on a plain-text mismatch. On success
    /// the remembered-credentials keys are written or removed according to
    /// `remember`, then the session record and authenticated flag are set.
    pub fn login(
        &self,
        email: &str,
        password: &str,
        remember: bool,
    ) -> Result<SessionRecord> {
        let Some(user) = self.registry.find_by_email(email)? else {
            tracing::debug!("login rejected: unknown email");
            return Err(AccountError::NotFound);
        };

        if !user.is_verified {
            tracing::debug!(user_id = user.id, "login rejected: unverified");
            return Err(AccountError::NotVerified);
        }

        if user.password != password {
            tracing::debug!(user_id = user.id, "login rejected: bad password");
            return Err(AccountError::WrongPassword);
        }

        if remember {
            self.store.set(REMEMBERED_EMAIL_KEY, email)?;
            self.store.set(REMEMBERED_PASSWORD_KEY, password)?;
            self.store.set(REMEMBER_FLAG_KEY, "true")?;
        } else {
            self.store.del(REMEMBERED_EMAIL_KEY)?;
            self.store.del(REMEMBERED_PASSWORD_KEY)?;
            self.store.del(REMEMBER_FLAG_KEY)?;
        }

        let session = SessionRecord {
            id: user.id,
            username: user.username,
            email: user.email,
            login_time: Utc::now(),
            is_logged_in: true,
        };

        self.store.set(SESSION_KEY, serde_json::to_string(&session)?)?;
        self.store.set(AUTH_FLAG_KEY, "true")?;

        tracing::info!(user_id = session.id, "session opened");

        Ok(session)
    }

    /// Close the session. Idempotent; safe with no prior login.
    pub fn logout(&self) -> Result<()> {
        self.store.del(SESSION_KEY)?;
        self.store.del(AUTH_FLAG_KEY)?;

        tracing::info!("session closed");

        Ok(())
    }

    /// Mirror profile edits into the open session, as the profile page
    /// rewrote `currentUser` alongside the record collection.
    ///
    /// A no-op when no session exists or when it belongs to another
    /// account. `loginTime` is preserved.
    pub fn refresh(&self, record: &UserRecord) -> Result<()> {
        let Some(mut session) = self.current_session()? else {
            return Ok(());
        };

        if session.id != record.id {
            return Ok(());
        }

        session.username = record.username.clone();
        session.email = record.email.clone();
        self.store.set(SESSION_KEY, serde_json::to_string(&session)?)?;

        tracing::debug!(user_id = session.id, "session refreshed");

        Ok(())
    }

    /// Read-only session lookup, used to gate protected views.
    pub fn current_session(&self) -> Result<Option<SessionRecord>> {
        if self.store.get(AUTH_FLAG_KEY).as_deref() != Some("true") {
            return Ok(None);
        }

        match self.store.get(SESSION_KEY) {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    /// Credentials saved by an earlier opted-in login, if any.
    pub fn remembered(&self) -> Option<RememberedCredentials> {
        if self.store.get(REMEMBER_FLAG_KEY).as_deref() != Some("true") {
            return None;
        }

        let email = self.store.get(REMEMBERED_EMAIL_KEY)?;
        let password = self.store.get(REMEMBERED_PASSWORD_KEY)?;
        Some(RememberedCredentials { email, password })
    }

    /// Delete every key this system owns, de-registering every account and
    /// destroying the session. Irreversible; callers confirm with the user
    /// first.
    pub fn wipe_all(&self) -> Result<()> {
        self.store.clear()?;

        tracing::warn!("all local data wiped");

        Ok(())
    }
}
