//! Single-shot email verification workflow.
//!
//! One flow exists per pending registration and lives only as long as the
//! page that started it. Codes are neither rate-limited nor time-boxed,
//! and are not cryptographically secure; they only prove the user can read
//! the on-screen "mail".

use rand::Rng;

use crate::account::{AccountRegistry, UserRecord};
use crate::error::{AccountError, Result};
use crate::mail::{MailManager, Template};

/// States of a [`VerificationFlow`]. `Verified` is terminal; a rejected
/// attempt stays in `CodePending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationState {
    CodePending,
    Verified,
}

/// Draw a 6-digit code, uniform over [100000, 999999].
pub fn generate_code() -> String {
    rand::thread_rng().gen_range(100_000..1_000_000).to_string()
}

/// Page-local verification state for one pending account.
///
/// Holds the transient copy of the issued code that submissions are
/// compared against. [`resend`] replaces only this copy: the
/// `verificationCode` persisted on the record keeps its original value, a
/// divergence inherited from the source site and deliberately preserved.
///
/// [`resend`]: VerificationFlow::resend
#[derive(Debug, Clone)]
pub struct VerificationFlow {
    email: String,
    issued_code: String,
    state: VerificationState,
}

impl VerificationFlow {
    /// Start a flow for a freshly registered record, adopting the code
    /// issued at registration.
    pub fn new(record: &UserRecord) -> Self {
        Self {
            email: record.email.clone(),
            issued_code: record.verification_code.clone(),
            state: VerificationState::CodePending,
        }
    }

    /// Code the presentation layer displays in place of a real mail.
    pub fn issued_code(&self) -> &str {
        &self.issued_code
    }

    pub fn state(&self) -> VerificationState {
        self.state
    }

    /// Generate a new code and "send" it again. Only the transient copy
    /// changes; earlier codes stop being accepted.
    pub fn resend(&mut self, mail: &MailManager) -> &str {
        self.issued_code = generate_code();
        mail.deliver(Template::VerificationCode, &self.email, &self.issued_code);

        tracing::info!("verification code reissued");

        &self.issued_code
    }

    /// Compare `submitted` against the issued code.
    ///
    /// On match, flips the stored record via
    /// [`AccountRegistry::mark_verified`] and transitions to `Verified`.
    /// On mismatch, returns [`AccountError::InvalidCode`] and stays in
    /// `CodePending`; the caller may retry.
    pub fn verify(
        &mut self,
        registry: &AccountRegistry,
        submitted: &str,
    ) -> Result<()> {
        if submitted != self.issued_code {
            tracing::debug!("verification code mismatch");
            return Err(AccountError::InvalidCode);
        }

        registry.mark_verified(&self.email)?;
        self.state = VerificationState::Verified;

        Ok(())
    }
}
