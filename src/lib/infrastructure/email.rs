//! Email transport implementations

use anyhow::anyhow;

use crate::domain::mailing::MailerError;

mod http;
pub mod mailgun;
pub mod sendgrid;
pub mod smtp;
pub mod sparkpost;

pub use mailgun::{MailgunConfig, MailgunTransport};
pub use sendgrid::{SendGridConfig, SendGridTransport};
pub use smtp::{SmtpConfig, SmtpTransport};
pub use sparkpost::{SparkPostConfig, SparkPostTransport};

/// Fails when a required configuration value is blank
fn require(value: &str, name: &str) -> Result<(), MailerError> {
    if value.trim().is_empty() {
        return Err(anyhow!("missing configuration value {}", name).into());
    }

    Ok(())
}
