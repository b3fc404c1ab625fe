//! SparkPost transmissions API transport

use std::fmt;

use async_trait::async_trait;
use clap::Parser;
use reqwest::{header::AUTHORIZATION, Client};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::mailing::{
    EmailAddress, Mailer, MailerError, OutgoingMessage, Transport, TransportError,
};

use super::{http, require};

/// SparkPost configuration
#[derive(Clone, Parser)]
pub struct SparkPostConfig {
    /// The API base URL
    #[clap(
        long = "sparkpost-base-url",
        env = "SPARKPOST_BASE_URL",
        default_value = "https://api.sparkpost.com"
    )]
    pub base_url: String,

    /// The API key
    #[clap(long = "sparkpost-api-key", env = "SPARKPOST_API_KEY", hide_env_values = true)]
    pub api_key: String,

    /// The API version
    #[clap(long = "sparkpost-api-version", env = "SPARKPOST_API_VERSION", default_value_t = 1)]
    pub api_version: u32,
}

impl fmt::Debug for SparkPostConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SparkPostConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &"********")
            .field("api_version", &self.api_version)
            .finish()
    }
}

#[derive(Debug, Serialize)]
struct Transmission<'a> {
    recipients: Vec<Recipient<'a>>,
    content: Content,
}

#[derive(Debug, Serialize)]
struct Recipient<'a> {
    address: Address<'a>,
}

#[derive(Debug, Serialize)]
struct Address<'a> {
    email: &'a str,
    #[serde(skip_serializing_if = "str::is_empty")]
    name: &'a str,
}

#[derive(Debug, Serialize)]
struct Content {
    email_rfc822: String,
}

#[derive(Debug, Deserialize)]
struct TransmissionResponse {
    results: TransmissionResults,
}

#[derive(Debug, Deserialize)]
struct TransmissionResults {
    #[serde(default)]
    id: String,
    #[serde(default)]
    total_accepted_recipients: u64,
    #[serde(default)]
    total_rejected_recipients: u64,
}

/// Builds a transmission carrying the already serialized MIME message. The
/// headers inside it decide what recipients see; `recipients` only decides
/// who gets a copy.
fn transmission<'a>(recipients: &'a [EmailAddress], message: &OutgoingMessage) -> Transmission<'a> {
    Transmission {
        recipients: recipients
            .iter()
            .map(|email| Recipient {
                address: Address {
                    email: email.address(),
                    name: email.name(),
                },
            })
            .collect(),
        content: Content {
            email_rfc822: String::from_utf8_lossy(&message.raw).into_owned(),
        },
    }
}

/// Sends through the SparkPost transmissions API
#[derive(Clone)]
pub struct SparkPostTransport {
    client: Client,
    url: String,
    api_key: String,
}

impl SparkPostTransport {
    /// Create a new SparkPost transport
    pub fn new(config: SparkPostConfig) -> Result<Self, MailerError> {
        require(&config.base_url, "SPARKPOST_BASE_URL")?;
        require(&config.api_key, "SPARKPOST_API_KEY")?;

        Ok(Self {
            client: http::client()?,
            url: format!(
                "{}/api/v{}/transmissions",
                config.base_url.trim_end_matches('/'),
                config.api_version
            ),
            api_key: config.api_key,
        })
    }

    /// The endpoint requests are posted to
    pub fn url(&self) -> &str {
        &self.url
    }
}

impl Mailer<SparkPostTransport> {
    /// Create a mailer that sends through SparkPost
    pub fn sparkpost(config: SparkPostConfig) -> Result<Self, MailerError> {
        Ok(Mailer::new(SparkPostTransport::new(config)?))
    }
}

impl fmt::Debug for SparkPostTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SparkPostTransport")
            .field("url", &self.url)
            .finish()
    }
}

#[async_trait]
impl Transport for SparkPostTransport {
    async fn deliver(
        &self,
        _from: &EmailAddress,
        recipients: &[EmailAddress],
        message: &OutgoingMessage,
    ) -> Result<(), TransportError> {
        let response = self
            .client
            .post(&self.url)
            .header(AUTHORIZATION, &self.api_key)
            .json(&transmission(recipients, message))
            .send()
            .await
            .map_err(http::request_error)?;

        let response = http::check(response).await?;

        if let Some(body) = http::accepted::<TransmissionResponse>(response, self.name()).await {
            debug!(
                id = %body.results.id,
                accepted = body.results.total_accepted_recipients,
                rejected = body.results.total_rejected_recipients,
                "SparkPost accepted the transmission"
            );
        }

        Ok(())
    }

    fn name(&self) -> &'static str {
        "sparkpost"
    }
}
