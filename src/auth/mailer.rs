use async_trait::async_trait;
use thiserror::Error;
use tracing::warn;

#[derive(Error, Debug)]
pub enum MailError {
    #[error("Delivery failed: {0}")]
    DeliveryFailed(String),
}

/// Delivers a freshly issued login code to its owner.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CodeMailer: Send + Sync {
    async fn send_code(&self, email: &str, code: &str) -> Result<(), MailError>;
}

/// Writes codes to the log instead of sending them. Used when no real
/// delivery channel is wired in, e.g. local development.
#[derive(Debug, Default, Clone)]
pub struct TracingMailer;

#[async_trait]
impl CodeMailer for TracingMailer {
    async fn send_code(&self, email: &str, code: &str) -> Result<(), MailError> {
        warn!(email, code, "Mail delivery not configured, login code written to log");
        Ok(())
    }
}
