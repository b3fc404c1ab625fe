//! MIME message builder

use base64::{engine::general_purpose::STANDARD, Engine as _};
use rand::{distributions::Alphanumeric, Rng};
use tracing::debug;

use super::{
    attachment::{Attachment, LoadedAttachment},
    email_address::EmailAddress,
    errors::MailerError,
};

const BOUNDARY_LENGTH: usize = 30;

/// The body of an email. Only one variant is ever sent.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Body {
    /// An HTML body
    Html(String),

    /// A plain text body
    PlainText(String),
}

impl Body {
    /// Picks the HTML body when it is non-empty, the plain text body otherwise.
    pub fn select(html: &str, plain_text: &str) -> Self {
        if html.is_empty() {
            Body::PlainText(plain_text.to_string())
        } else {
            Body::Html(html.to_string())
        }
    }

    /// The bare MIME type of the body
    pub fn mime_type(&self) -> &'static str {
        match self {
            Body::Html(_) => "text/html",
            Body::PlainText(_) => "text/plain",
        }
    }

    /// The body text
    pub fn content(&self) -> &str {
        match self {
            Body::Html(content) | Body::PlainText(content) => content,
        }
    }
}

/// Everything a transport needs for one send, prepared once per send.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutgoingMessage {
    /// The serialized multipart MIME message
    pub raw: Vec<u8>,

    /// The subject
    pub subject: String,

    /// The selected body
    pub body: Body,

    /// The attachments, read once for this send
    pub attachments: Vec<LoadedAttachment>,
}

/// Serializes an email into a `multipart/mixed` MIME byte stream.
#[derive(Clone, Copy, Debug, Default)]
pub struct MessageBuilder<'a> {
    from: Option<&'a EmailAddress>,
    to: &'a [EmailAddress],
    cc: &'a [EmailAddress],
    subject: &'a str,
    html_body: &'a str,
    plain_text_body: &'a str,
    attachments: &'a [Attachment],
}

impl<'a> MessageBuilder<'a> {
    /// Create an empty builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the sender
    pub fn from(mut self, from: &'a EmailAddress) -> Self {
        self.from = Some(from);
        self
    }

    /// Set the `To` recipients
    pub fn to(mut self, to: &'a [EmailAddress]) -> Self {
        self.to = to;
        self
    }

    /// Set the `CC` recipients
    pub fn cc(mut self, cc: &'a [EmailAddress]) -> Self {
        self.cc = cc;
        self
    }

    /// Set the subject
    pub fn subject(mut self, subject: &'a str) -> Self {
        self.subject = subject;
        self
    }

    /// Set the HTML body. Takes precedence over the plain text body when non-empty.
    pub fn html_body(mut self, body: &'a str) -> Self {
        self.html_body = body;
        self
    }

    /// Set the plain text body
    pub fn plain_text_body(mut self, body: &'a str) -> Self {
        self.plain_text_body = body;
        self
    }

    /// Set the attachments
    pub fn attachments(mut self, attachments: &'a [Attachment]) -> Self {
        self.attachments = attachments;
        self
    }

    /// Reads the attachments and serializes the message.
    ///
    /// Fails without producing any output if an attachment cannot be read.
    pub fn build(&self) -> Result<Vec<u8>, MailerError> {
        Ok(self.prepare()?.raw)
    }

    /// Reads the attachments once and returns the serialized message together
    /// with the parts HTTP providers re-encode.
    pub fn prepare(&self) -> Result<OutgoingMessage, MailerError> {
        let attachments = self
            .attachments
            .iter()
            .map(Attachment::load)
            .collect::<Result<Vec<_>, _>>()?;

        let raw = self.render(&attachments);

        Ok(OutgoingMessage {
            raw,
            subject: self.subject.to_string(),
            body: Body::select(self.html_body, self.plain_text_body),
            attachments,
        })
    }

    /// Serializes the message with already loaded attachments and a fresh boundary.
    pub fn render(&self, attachments: &[LoadedAttachment]) -> Vec<u8> {
        self.render_with_boundary(&generate_boundary(), attachments)
    }

    fn render_with_boundary(&self, boundary: &str, attachments: &[LoadedAttachment]) -> Vec<u8> {
        let mut out = String::new();

        let from = self.from.map(ToString::to_string).unwrap_or_default();
        write_header(&mut out, "From", &from);
        write_header(&mut out, "To", &join_addresses(self.to));
        if !self.cc.is_empty() {
            write_header(&mut out, "CC", &join_addresses(self.cc));
        }
        write_header(&mut out, "Subject", self.subject);
        write_header(&mut out, "MIME-Version", "1.0");
        write_header(
            &mut out,
            "Content-Type",
            &format!("multipart/mixed; boundary=\"{}\"", boundary),
        );

        let body = Body::select(self.html_body, self.plain_text_body);
        out.push_str(&format!("\r\n--{}\r\n", boundary));
        write_header(
            &mut out,
            "Content-Type",
            &format!("{}; charset=\"UTF-8\"", body.mime_type()),
        );
        out.push_str("\r\n");
        out.push_str(body.content());

        for attachment in attachments {
            out.push_str(&format!("\r\n--{}\r\n", boundary));
            write_header(
                &mut out,
                "Content-Type",
                &format!("\"{}\"", attachment.content_type),
            );
            write_header(&mut out, "Content-Transfer-Encoding", "base64");
            write_header(
                &mut out,
                "Content-Disposition",
                &format!("attachment; filename=\"{}\"", quote_filename(&attachment.name)),
            );
            out.push_str("\r\n");
            out.push_str(&STANDARD.encode(&attachment.data));
        }

        out.push_str(&format!("\r\n--{}--\r\n", boundary));

        debug!(
            attachments = attachments.len(),
            size = out.len(),
            "built MIME message"
        );

        out.into_bytes()
    }
}

fn write_header(out: &mut String, name: &str, value: &str) {
    out.push_str(name);
    out.push_str(": ");
    out.push_str(value);
    out.push_str("\r\n");
}

/// Escapes `"` and `\` and drops line breaks so the name stays inside one
/// quoted header value
fn quote_filename(name: &str) -> String {
    let mut out = String::with_capacity(name.len());

    for c in name.chars() {
        match c {
            '\r' | '\n' => {}
            '"' | '\\' => {
                out.push('\\');
                out.push(c);
            }
            _ => out.push(c),
        }
    }

    out
}

fn join_addresses(addresses: &[EmailAddress]) -> String {
    addresses
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(";")
}

fn generate_boundary() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(BOUNDARY_LENGTH)
        .map(char::from)
        .collect()
}
