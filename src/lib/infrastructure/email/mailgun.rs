//! Mailgun messages API transport

use std::fmt;

use async_trait::async_trait;
use clap::Parser;
use reqwest::{
    multipart::{Form, Part},
    Client,
};
use serde::Deserialize;
use tracing::debug;

use crate::domain::mailing::{
    Body, EmailAddress, Mailer, MailerError, OutgoingMessage, Transport, TransportError,
};

use super::{http, require};

/// Mailgun configuration
#[derive(Clone, Parser)]
pub struct MailgunConfig {
    /// The sending domain, e.g. `mg.example.com`
    #[clap(long = "mailgun-domain", env = "MAILGUN_DOMAIN")]
    pub domain: String,

    /// The API key
    #[clap(long = "mailgun-api-key", env = "MAILGUN_API_KEY", hide_env_values = true)]
    pub api_key: String,

    /// The API base, `https://api.eu.mailgun.net` for the EU region
    #[clap(
        long = "mailgun-api-base",
        env = "MAILGUN_API_BASE",
        default_value = "https://api.mailgun.net"
    )]
    pub api_base: String,
}

impl fmt::Debug for MailgunConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MailgunConfig")
            .field("domain", &self.domain)
            .field("api_key", &"********")
            .field("api_base", &self.api_base)
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct SendResponse {
    #[serde(default)]
    id: String,
}

/// The text fields of the form, `to` repeated once per recipient
fn fields(
    from: &EmailAddress,
    recipients: &[EmailAddress],
    message: &OutgoingMessage,
) -> Vec<(&'static str, String)> {
    let mut fields = vec![("from", from.to_string())];

    fields.extend(recipients.iter().map(|r| ("to", r.to_string())));
    fields.push(("subject", message.subject.clone()));

    fields.push(match &message.body {
        Body::Html(html) => ("html", html.clone()),
        Body::PlainText(text) => ("text", text.clone()),
    });

    fields
}

fn form(
    from: &EmailAddress,
    recipients: &[EmailAddress],
    message: &OutgoingMessage,
) -> Result<Form, TransportError> {
    let mut form = fields(from, recipients, message)
        .into_iter()
        .fold(Form::new(), |form, (name, value)| form.text(name, value));

    for attachment in &message.attachments {
        let part = Part::bytes(attachment.data.clone())
            .file_name(attachment.name.clone())
            .mime_str(&attachment.content_type)
            .map_err(|e| TransportError::CallFailed(e.into()))?;

        form = form.part("attachment", part);
    }

    Ok(form)
}

/// Sends through the Mailgun messages API
#[derive(Clone)]
pub struct MailgunTransport {
    client: Client,
    url: String,
    api_key: String,
}

impl MailgunTransport {
    /// Create a new Mailgun transport
    pub fn new(config: MailgunConfig) -> Result<Self, MailerError> {
        require(&config.domain, "MAILGUN_DOMAIN")?;
        require(&config.api_key, "MAILGUN_API_KEY")?;

        Ok(Self {
            client: http::client()?,
            url: format!(
                "{}/v3/{}/messages",
                config.api_base.trim_end_matches('/'),
                config.domain
            ),
            api_key: config.api_key,
        })
    }

    /// The endpoint requests are posted to
    pub fn url(&self) -> &str {
        &self.url
    }
}

impl Mailer<MailgunTransport> {
    /// Create a mailer that sends through Mailgun
    pub fn mailgun(config: MailgunConfig) -> Result<Self, MailerError> {
        Ok(Mailer::new(MailgunTransport::new(config)?))
    }
}

impl fmt::Debug for MailgunTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MailgunTransport")
            .field("url", &self.url)
            .finish()
    }
}

#[async_trait]
impl Transport for MailgunTransport {
    async fn deliver(
        &self,
        from: &EmailAddress,
        recipients: &[EmailAddress],
        message: &OutgoingMessage,
    ) -> Result<(), TransportError> {
        let response = self
            .client
            .post(&self.url)
            .basic_auth("api", Some(&self.api_key))
            .multipart(form(from, recipients, message)?)
            .send()
            .await
            .map_err(http::request_error)?;

        let response = http::check(response).await?;

        if let Some(body) = http::accepted::<SendResponse>(response, self.name()).await {
            debug!(id = %body.id, "Mailgun queued the message");
        }

        Ok(())
    }

    fn name(&self) -> &'static str {
        "mailgun"
    }
}
