#![warn(
    missing_debug_implementations,
    rust_2018_idioms,
    missing_docs,
    rustdoc::broken_intra_doc_links,
    rustdoc::missing_crate_level_docs
)]

//! Command-line mail sender

use std::path::Path;

use anyhow::Result;
use clap::{Parser, Subcommand};
use mailing_facade::{
    domain::mailing::{Attachment, EmailAddress, Mailer, Transport},
    infrastructure::email::{MailgunConfig, SendGridConfig, SmtpConfig, SparkPostConfig},
};
use tracing::info;

/// Command-line arguments / environment variables
#[derive(Debug, Parser)]
#[command(about = "Send an email over SMTP or through a provider API")]
pub struct Args {
    /// The message to send
    #[clap(flatten)]
    pub message: MessageArgs,

    /// The backend to send through
    #[command(subcommand)]
    pub backend: Backend,
}

/// The message to send
#[derive(Debug, clap::Args)]
pub struct MessageArgs {
    /// The sender, e.g. `"Support" <support@example.com>`
    #[arg(long, env = "MAIL_FROM")]
    pub from: EmailAddress,

    /// A recipient, repeatable
    #[arg(long)]
    pub to: Vec<EmailAddress>,

    /// A carbon copy recipient, repeatable
    #[arg(long)]
    pub cc: Vec<EmailAddress>,

    /// A blind carbon copy recipient, repeatable
    #[arg(long)]
    pub bcc: Vec<EmailAddress>,

    /// The subject
    #[arg(long, default_value = "")]
    pub subject: String,

    /// The HTML body
    #[arg(long, default_value = "")]
    pub html: String,

    /// The plain text body, used when no HTML body is given
    #[arg(long, default_value = "")]
    pub text: String,

    /// A file to attach as `NAME=PATH` or `PATH`, repeatable
    #[arg(long = "attach", value_parser = parse_attachment)]
    pub attachments: Vec<Attachment>,
}

/// The available backends
#[derive(Debug, Subcommand)]
pub enum Backend {
    /// Send directly over SMTP
    Smtp(SmtpConfig),

    /// Send through the SendGrid API
    Sendgrid(SendGridConfig),

    /// Send through the Mailgun API
    Mailgun(MailgunConfig),

    /// Send through the SparkPost API
    Sparkpost(SparkPostConfig),
}

fn parse_attachment(raw: &str) -> Result<Attachment, String> {
    match raw.split_once('=') {
        Some((name, path)) if !name.is_empty() && !path.is_empty() => {
            Ok(Attachment::new(name, path))
        }
        Some(_) => Err(format!("expected NAME=PATH, got {}", raw)),
        None => Path::new(raw)
            .file_name()
            .map(|name| Attachment::new(name.to_string_lossy(), raw))
            .ok_or_else(|| format!("{} does not name a file", raw)),
    }
}

async fn send<T: Transport>(mut mailer: Mailer<T>, message: MessageArgs) -> Result<()> {
    let recipients = message.to.len() + message.cc.len() + message.bcc.len();

    mailer
        .set_from(message.from)
        .set_to(message.to)
        .set_cc(message.cc)
        .set_bcc(message.bcc)
        .set_subject(message.subject)
        .set_html_body(message.html)
        .set_plain_text_body(message.text)
        .set_attachments(message.attachments);

    mailer.send().await?;

    info!(
        transport = mailer.driver().transport().name(),
        recipients, "email sent"
    );

    Ok(())
}

#[mutants::skip]
#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt::init();

    let args = Args::parse();

    match args.backend {
        Backend::Smtp(config) => send(Mailer::smtp(config)?, args.message).await,
        Backend::Sendgrid(config) => send(Mailer::sendgrid(config)?, args.message).await,
        Backend::Mailgun(config) => send(Mailer::mailgun(config)?, args.message).await,
        Backend::Sparkpost(config) => send(Mailer::sparkpost(config)?, args.message).await,
    }
}
