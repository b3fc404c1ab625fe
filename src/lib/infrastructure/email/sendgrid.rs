//! SendGrid v3 API transport

use std::fmt;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use clap::Parser;
use reqwest::Client;
use serde::Serialize;
use tracing::debug;

use crate::domain::mailing::{
    EmailAddress, Mailer, MailerError, OutgoingMessage, Transport, TransportError,
};

use super::{http, require};

/// SendGrid configuration
#[derive(Clone, Parser)]
pub struct SendGridConfig {
    /// The API host
    #[clap(
        long = "sendgrid-host",
        env = "SENDGRID_HOST",
        default_value = "https://api.sendgrid.com"
    )]
    pub host: String,

    /// The request path for sending mail
    #[clap(
        long = "sendgrid-endpoint",
        env = "SENDGRID_ENDPOINT",
        default_value = "/v3/mail/send"
    )]
    pub endpoint: String,

    /// The API key
    #[clap(long = "sendgrid-api-key", env = "SENDGRID_API_KEY", hide_env_values = true)]
    pub api_key: String,
}

impl fmt::Debug for SendGridConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SendGridConfig")
            .field("host", &self.host)
            .field("endpoint", &self.endpoint)
            .field("api_key", &"********")
            .finish()
    }
}

#[derive(Debug, Serialize)]
struct Mail<'a> {
    personalizations: Vec<Personalization<'a>>,
    from: Recipient<'a>,
    subject: &'a str,
    content: Vec<Content<'a>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    attachments: Vec<Attachment<'a>>,
}

#[derive(Debug, Serialize)]
struct Personalization<'a> {
    to: Vec<Recipient<'a>>,
}

#[derive(Debug, Serialize)]
struct Recipient<'a> {
    email: &'a str,
    #[serde(skip_serializing_if = "str::is_empty")]
    name: &'a str,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    #[serde(rename = "type")]
    mime_type: &'a str,
    value: &'a str,
}

#[derive(Debug, Serialize)]
struct Attachment<'a> {
    content: String,
    #[serde(rename = "type")]
    mime_type: &'a str,
    filename: &'a str,
    disposition: &'static str,
}

impl<'a> From<&'a EmailAddress> for Recipient<'a> {
    fn from(email: &'a EmailAddress) -> Self {
        Self {
            email: email.address(),
            name: email.name(),
        }
    }
}

/// Builds the request body. The only personalization is addressed to exactly
/// `recipients`, so BCC calls stay isolated.
fn payload<'a>(
    from: &'a EmailAddress,
    recipients: &'a [EmailAddress],
    message: &'a OutgoingMessage,
) -> Mail<'a> {
    Mail {
        personalizations: vec![Personalization {
            to: recipients.iter().map(Recipient::from).collect(),
        }],
        from: from.into(),
        subject: &message.subject,
        content: vec![Content {
            mime_type: message.body.mime_type(),
            value: message.body.content(),
        }],
        attachments: message
            .attachments
            .iter()
            .map(|attachment| Attachment {
                content: STANDARD.encode(&attachment.data),
                mime_type: attachment.essence(),
                filename: &attachment.name,
                disposition: "attachment",
            })
            .collect(),
    }
}

/// Sends through the SendGrid v3 mail send API
#[derive(Clone)]
pub struct SendGridTransport {
    client: Client,
    url: String,
    api_key: String,
}

impl SendGridTransport {
    /// Create a new SendGrid transport
    pub fn new(config: SendGridConfig) -> Result<Self, MailerError> {
        require(&config.host, "SENDGRID_HOST")?;
        require(&config.api_key, "SENDGRID_API_KEY")?;

        Ok(Self {
            client: http::client()?,
            url: format!("{}{}", config.host.trim_end_matches('/'), config.endpoint),
            api_key: config.api_key,
        })
    }

    /// The endpoint requests are posted to
    pub fn url(&self) -> &str {
        &self.url
    }
}

impl Mailer<SendGridTransport> {
    /// Create a mailer that sends through SendGrid
    pub fn sendgrid(config: SendGridConfig) -> Result<Self, MailerError> {
        Ok(Mailer::new(SendGridTransport::new(config)?))
    }
}

impl fmt::Debug for SendGridTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SendGridTransport")
            .field("url", &self.url)
            .finish()
    }
}

#[async_trait]
impl Transport for SendGridTransport {
    async fn deliver(
        &self,
        from: &EmailAddress,
        recipients: &[EmailAddress],
        message: &OutgoingMessage,
    ) -> Result<(), TransportError> {
        let response = self
            .client
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&payload(from, recipients, message))
            .send()
            .await
            .map_err(http::request_error)?;

        let response = http::check(response).await?;

        debug!(status = %response.status(), "SendGrid accepted the message");

        Ok(())
    }

    fn name(&self) -> &'static str {
        "sendgrid"
    }
}
