use std::sync::Arc;

use chrono::Duration;
use tracing::{error, info, warn};

use crate::auth::mailer::CodeMailer;
use crate::auth::otp_store::OtpStore;
use crate::auth::token::{Claims, SessionTokens};
use crate::config::AuthConfig;
use crate::db::UserDirectory;
use crate::error::{AppError, AuthError};

/// Email one-time-code login: issue a code to a known user, then trade a
/// matching code for a session token.
pub struct AuthService {
    codes: OtpStore,
    directory: Arc<dyn UserDirectory>,
    mailer: Arc<dyn CodeMailer>,
    tokens: SessionTokens,
}

impl AuthService {
    pub fn new(
        codes: OtpStore,
        directory: Arc<dyn UserDirectory>,
        mailer: Arc<dyn CodeMailer>,
        tokens: SessionTokens,
    ) -> Self {
        Self {
            codes,
            directory,
            mailer,
            tokens,
        }
    }

    pub fn from_config(
        config: &AuthConfig,
        directory: Arc<dyn UserDirectory>,
        mailer: Arc<dyn CodeMailer>,
    ) -> Self {
        Self::new(
            OtpStore::new(Duration::seconds(config.code_ttl_seconds)),
            directory,
            mailer,
            SessionTokens::new(&config.jwt_secret, Duration::hours(config.token_expiry_hours)),
        )
    }

    pub fn codes(&self) -> &OtpStore {
        &self.codes
    }

    pub async fn send_code(&self, email: &str) -> Result<(), AppError> {
        match self.directory.find_by_email(email).await? {
            Some(user) => info!(email, role = %user.role, "Login code requested"),
            None => {
                warn!(email, "Login code requested for unknown email");
                return Err(AuthError::InvalidCredentials.into());
            }
        }

        let code = self.codes.issue_code(email).await;

        // The code stays valid even if delivery fails; the user can ask again.
        if let Err(e) = self.mailer.send_code(email, &code).await {
            error!(email, "Failed to deliver login code: {}", e);
        }

        Ok(())
    }

    pub async fn verify_code(&self, email: &str, code: &str) -> Result<String, AppError> {
        if let Err(reason) = self.codes.verify_code(email, code).await {
            warn!(email, %reason, "Login verification failed");
            return Err(AuthError::InvalidCredentials.into());
        }

        self.tokens.issue(email)
    }

    pub fn validate_token(&self, token: &str) -> Result<Claims, AppError> {
        self.tokens.validate(token)
    }
}
