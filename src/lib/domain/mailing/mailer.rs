//! Mailer facade

use std::fmt;

use super::{
    attachment::Attachment, driver::Driver, email_address::EmailAddress, errors::MailerError,
    transport::Transport,
};

/// Fluent front end over a single [`Driver`].
///
/// ```ignore
/// let mut mailer = Mailer::smtp(config)?;
///
/// mailer
///     .set_from(EmailAddress::new("Support", "support@example.com"))
///     .set_to(vec![EmailAddress::new("", "jane@example.com")])
///     .set_subject("Hello")
///     .set_plain_text_body("World");
///
/// mailer.send().await?;
/// ```
pub struct Mailer<T: Transport> {
    driver: Driver<T>,
}

impl<T: Transport> Mailer<T> {
    /// Create a mailer sending through `transport`
    pub fn new(transport: T) -> Self {
        Self::with_driver(Driver::new(transport))
    }

    /// Create a mailer around an existing driver
    pub fn with_driver(driver: Driver<T>) -> Self {
        Self { driver }
    }

    /// The underlying driver
    pub fn driver(&self) -> &Driver<T> {
        &self.driver
    }

    /// Sender of the email
    pub fn set_from(&mut self, from: EmailAddress) -> &mut Self {
        self.driver.set_from(from);
        self
    }

    /// Receivers of the email
    pub fn set_to(&mut self, to: Vec<EmailAddress>) -> &mut Self {
        self.driver.set_to(to);
        self
    }

    /// Carbon copy receivers
    pub fn set_cc(&mut self, cc: Vec<EmailAddress>) -> &mut Self {
        self.driver.set_cc(cc);
        self
    }

    /// Blind carbon copy receivers. Each one gets a separate delivery.
    pub fn set_bcc(&mut self, bcc: Vec<EmailAddress>) -> &mut Self {
        self.driver.set_bcc(bcc);
        self
    }

    /// Subject of the email
    pub fn set_subject(&mut self, subject: impl Into<String>) -> &mut Self {
        self.driver.set_subject(subject);
        self
    }

    /// HTML body. Wins over the plain text body when non-empty; pass `""` to
    /// fall back to plain text.
    pub fn set_html_body(&mut self, body: impl Into<String>) -> &mut Self {
        self.driver.set_html_body(body);
        self
    }

    /// Plain text body
    pub fn set_plain_text_body(&mut self, body: impl Into<String>) -> &mut Self {
        self.driver.set_plain_text_body(body);
        self
    }

    /// Files to attach
    pub fn set_attachments(&mut self, attachments: Vec<Attachment>) -> &mut Self {
        self.driver.set_attachments(attachments);
        self
    }

    /// Send the email. See [`Driver::send`].
    pub async fn send(&mut self) -> Result<(), MailerError> {
        self.driver.send().await
    }
}

impl<T: Transport> fmt::Debug for Mailer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mailer")
            .field("driver", &self.driver)
            .finish()
    }
}
