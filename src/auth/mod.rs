//! Authentication module for the pre-order server
//!
//! Email one-time-code login: code issuance and verification, code
//! delivery, the session tokens handed out on success and the extractor
//! that checks them on protected routes.

pub mod handlers;
pub mod mailer;
pub mod otp_store;
mod service;
mod session;
pub mod token;

pub use mailer::{CodeMailer, MailError, TracingMailer};
pub use otp_store::{OtpError, OtpStore};
pub use service::AuthService;
pub use session::Session;
pub use token::{Claims, SessionTokens};
