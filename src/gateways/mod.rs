//! # Outbound Gateways
//!
//! Thin HTTP clients for the external collaborators the platform consumes:
//! the SMS gateway (tencent-cloud style signed JSON API) and a mail relay.
//! Both surface structured errors; delivery failures are persisted on the
//! originating notice rather than retried.

pub mod mail;
pub mod sms;

pub use mail::MailClient;
pub use sms::SmsClient;

use thiserror::Error;

/// Errors from outbound gateway calls.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("gateway not configured: {0}")]
    NotConfigured(&'static str),
    #[error("gateway transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("gateway returned status {status}: {body}")]
    Upstream { status: u16, body: String },
    #[error("gateway rejected the message: {0}")]
    Rejected(String),
}
