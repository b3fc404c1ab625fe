//! SMTP transport implementation

use std::{fmt, time::Duration};

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use clap::{ArgAction, Parser};
use lettre::{
    address::Envelope,
    transport::smtp::{
        authentication::Credentials,
        client::{Tls, TlsParameters},
        response::{Category, Code, Detail, Severity},
        Error as SmtpError,
    },
    Address, AsyncSmtpTransport, AsyncTransport, Tokio1Executor,
};
use tracing::debug;

use crate::domain::mailing::{
    EmailAddress, Mailer, MailerError, OutgoingMessage, Transport, TransportError,
};

use super::require;

/// SMTP configuration
#[derive(Clone, Default, Parser)]
pub struct SmtpConfig {
    /// The SMTP host
    #[clap(long = "smtp-host", env = "SMTP_HOST")]
    pub host: String,

    /// The SMTP port
    #[clap(long = "smtp-port", env = "SMTP_PORT", default_value_t = 465)]
    pub port: u16,

    /// The SMTP username
    #[clap(long = "smtp-user", env = "SMTP_USER", default_value = "")]
    pub username: String,

    /// The SMTP password
    #[clap(
        long = "smtp-password",
        env = "SMTP_PASSWORD",
        default_value = "",
        hide_env_values = true
    )]
    pub password: String,

    /// The name to verify the server certificate against, defaults to the host
    #[clap(long = "smtp-tls-server-name", env = "SMTP_TLS_SERVER_NAME")]
    pub tls_server_name: Option<String>,

    /// Verify the TLS certificate
    #[clap(
        long = "smtp-verify-tls",
        env = "SMTP_VERIFY_TLS",
        default_value_t = true,
        action = ArgAction::Set
    )]
    pub verify_tls: bool,

    /// Connect in plain text and upgrade with STARTTLS instead of implicit TLS
    #[clap(
        long = "smtp-starttls",
        env = "SMTP_STARTTLS",
        default_value_t = false,
        action = ArgAction::Set
    )]
    pub starttls: bool,

    /// Timeout in seconds for a whole SMTP session
    #[clap(long = "smtp-timeout-secs", env = "SMTP_TIMEOUT_SECS", default_value_t = 30)]
    pub timeout_secs: u64,
}

impl fmt::Debug for SmtpConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmtpConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"********")
            .field("tls_server_name", &self.tls_server_name)
            .field("verify_tls", &self.verify_tls)
            .field("starttls", &self.starttls)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

/// Sends each call as its own authenticated SMTP session over TLS.
///
/// Connections are not pooled, so building the transport needs no running
/// runtime and no session outlives the call that opened it.
pub struct SmtpTransport {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    timeout: Duration,
}

impl SmtpTransport {
    /// Create a new SMTP transport
    pub fn new(config: SmtpConfig) -> Result<Self, MailerError> {
        require(&config.host, "SMTP_HOST")?;

        let timeout = Duration::from_secs(config.timeout_secs);
        let server_name = config
            .tls_server_name
            .clone()
            .unwrap_or_else(|| config.host.clone());

        let parameters = TlsParameters::builder(server_name)
            .dangerous_accept_invalid_certs(!config.verify_tls)
            .build()
            .context("invalid SMTP TLS parameters")?;

        let tls = if config.starttls {
            Tls::Required(parameters)
        } else {
            Tls::Wrapper(parameters)
        };

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host)
            .port(config.port)
            .tls(tls)
            .timeout(Some(timeout));

        if !config.username.is_empty() {
            builder = builder.credentials(Credentials::new(config.username, config.password));
        }

        debug!(host = %config.host, port = config.port, "configured SMTP transport");

        Ok(Self {
            transport: builder.build(),
            timeout,
        })
    }
}

impl Mailer<SmtpTransport> {
    /// Create a mailer that sends over SMTP
    pub fn smtp(config: SmtpConfig) -> Result<Self, MailerError> {
        Ok(Mailer::new(SmtpTransport::new(config)?))
    }
}

impl fmt::Debug for SmtpTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmtpTransport")
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// SMTP envelopes carry bare addresses; display names only live in headers
fn envelope(from: &EmailAddress, recipients: &[EmailAddress]) -> Result<Envelope, TransportError> {
    let parse = |email: &EmailAddress| {
        email
            .address()
            .parse::<Address>()
            .map_err(|e| TransportError::CallFailed(anyhow!("invalid address {}: {}", email, e)))
    };

    let recipients = recipients
        .iter()
        .map(parse)
        .collect::<Result<Vec<_>, _>>()?;

    Envelope::new(Some(parse(from)?), recipients).map_err(|e| TransportError::CallFailed(e.into()))
}

/// `535 Authentication credentials invalid`
const AUTH_REJECTED: Code = Code {
    severity: Severity::PermanentNegativeCompletion,
    category: Category::Unspecified3,
    detail: Detail::Five,
};

fn is_auth_rejection(code: Option<Code>) -> bool {
    code == Some(AUTH_REJECTED)
}

fn transport_error(err: SmtpError, timeout: Duration) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout(timeout)
    } else if is_auth_rejection(err.status()) {
        TransportError::AuthenticationFailed(err.into())
    } else {
        TransportError::CallFailed(err.into())
    }
}

#[async_trait]
impl Transport for SmtpTransport {
    async fn deliver(
        &self,
        from: &EmailAddress,
        recipients: &[EmailAddress],
        message: &OutgoingMessage,
    ) -> Result<(), TransportError> {
        let envelope = envelope(from, recipients)?;

        let session = self.transport.send_raw(&envelope, &message.raw);

        match tokio::time::timeout(self.timeout, session).await {
            Ok(Ok(response)) => {
                debug!(code = %response.code(), "SMTP session completed");
                Ok(())
            }
            Ok(Err(e)) => Err(transport_error(e, self.timeout)),
            Err(_) => Err(TransportError::Timeout(self.timeout)),
        }
    }

    fn name(&self) -> &'static str {
        "smtp"
    }
}
