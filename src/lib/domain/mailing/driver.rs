//! Send orchestration shared by every transport backend

use std::{fmt, slice};

use tracing::{debug, warn};

use super::{
    attachment::Attachment,
    email_address::EmailAddress,
    errors::MailerError,
    message::{MessageBuilder, OutgoingMessage},
    transport::Transport,
};

/// Holds the state of the message being assembled and sends it through `T`.
///
/// A send makes one transport call for the to + cc recipients together, then
/// one isolated call per BCC recipient so no recipient learns a BCC address.
/// Afterwards the subject and both bodies are cleared whether the send
/// succeeded or not; the sender, recipient lists and attachments persist
/// until replaced or [`Driver::clear`] is called.
///
/// A driver handles one send at a time; `send` takes `&mut self`.
pub struct Driver<T: Transport> {
    transport: T,
    from: EmailAddress,
    to: Vec<EmailAddress>,
    cc: Vec<EmailAddress>,
    bcc: Vec<EmailAddress>,
    subject: String,
    html_body: String,
    plain_text_body: String,
    attachments: Vec<Attachment>,
}

impl<T: Transport> Driver<T> {
    /// Create a driver sending through `transport`
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            from: EmailAddress::default(),
            to: Vec::new(),
            cc: Vec::new(),
            bcc: Vec::new(),
            subject: String::new(),
            html_body: String::new(),
            plain_text_body: String::new(),
            attachments: Vec::new(),
        }
    }

    /// Set the sender
    pub fn set_from(&mut self, from: EmailAddress) {
        self.from = from;
    }

    /// Set the `To` recipients
    pub fn set_to(&mut self, to: Vec<EmailAddress>) {
        self.to = to;
    }

    /// Set the `CC` recipients
    pub fn set_cc(&mut self, cc: Vec<EmailAddress>) {
        self.cc = cc;
    }

    /// Set the `BCC` recipients
    pub fn set_bcc(&mut self, bcc: Vec<EmailAddress>) {
        self.bcc = bcc;
    }

    /// Set the subject
    pub fn set_subject(&mut self, subject: impl Into<String>) {
        self.subject = subject.into();
    }

    /// Set the HTML body. It is sent instead of the plain text body when non-empty.
    pub fn set_html_body(&mut self, body: impl Into<String>) {
        self.html_body = body.into();
    }

    /// Set the plain text body
    pub fn set_plain_text_body(&mut self, body: impl Into<String>) {
        self.plain_text_body = body.into();
    }

    /// Set the attachments
    pub fn set_attachments(&mut self, attachments: Vec<Attachment>) {
        self.attachments = attachments;
    }

    /// The sender
    pub fn from(&self) -> &EmailAddress {
        &self.from
    }

    /// The `To` recipients
    pub fn to(&self) -> &[EmailAddress] {
        &self.to
    }

    /// The `CC` recipients
    pub fn cc(&self) -> &[EmailAddress] {
        &self.cc
    }

    /// The `BCC` recipients
    pub fn bcc(&self) -> &[EmailAddress] {
        &self.bcc
    }

    /// The subject
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// The HTML body
    pub fn html_body(&self) -> &str {
        &self.html_body
    }

    /// The plain text body
    pub fn plain_text_body(&self) -> &str {
        &self.plain_text_body
    }

    /// The attachments
    pub fn attachments(&self) -> &[Attachment] {
        &self.attachments
    }

    /// The transport this driver sends through
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Builds the message and delivers it to every recipient.
    ///
    /// To and CC recipients share one transport call, made before any BCC
    /// call. When both lists are empty that call is skipped and only the BCC
    /// recipients are sent to. Each BCC recipient then gets a call of its own.
    ///
    /// # Returns
    /// - [`Ok`] once the primary call and every BCC call succeeded.
    /// - [`Err`] with the first failure. No later call is attempted, and
    ///   calls that already succeeded are not rolled back.
    pub async fn send(&mut self) -> Result<(), MailerError> {
        let result = self.dispatch().await;

        if let Err(e) = &result {
            warn!(
                transport = self.transport.name(),
                step = ?e.step(),
                kind = ?e.kind(),
                "send failed: {}",
                e
            );
        }

        self.reset();

        result
    }

    async fn dispatch(&self) -> Result<(), MailerError> {
        let message = self.prepare()?;

        let primary = self
            .to
            .iter()
            .chain(&self.cc)
            .cloned()
            .collect::<Vec<_>>();

        if primary.is_empty() {
            debug!("no to/cc recipients, skipping the primary call");
        } else {
            debug!(
                transport = self.transport.name(),
                recipients = primary.len(),
                "sending to primary recipients"
            );

            self.transport
                .deliver(&self.from, &primary, &message)
                .await
                .map_err(MailerError::PrimarySend)?;
        }

        for (index, recipient) in self.bcc.iter().enumerate() {
            debug!(
                transport = self.transport.name(),
                index,
                "sending to BCC recipient"
            );

            self.transport
                .deliver(&self.from, slice::from_ref(recipient), &message)
                .await
                .map_err(|source| MailerError::BccSend {
                    index,
                    recipient: recipient.to_string(),
                    source,
                })?;
        }

        Ok(())
    }

    fn prepare(&self) -> Result<OutgoingMessage, MailerError> {
        MessageBuilder::new()
            .from(&self.from)
            .to(&self.to)
            .cc(&self.cc)
            .subject(&self.subject)
            .html_body(&self.html_body)
            .plain_text_body(&self.plain_text_body)
            .attachments(&self.attachments)
            .prepare()
    }

    fn reset(&mut self) {
        self.subject.clear();
        self.html_body.clear();
        self.plain_text_body.clear();
    }

    /// Clears the whole message state, recipients and attachments included.
    pub fn clear(&mut self) {
        self.reset();
        self.from = EmailAddress::default();
        self.to.clear();
        self.cc.clear();
        self.bcc.clear();
        self.attachments.clear();
    }
}

impl<T: Transport> fmt::Debug for Driver<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Driver")
            .field("transport", &self.transport.name())
            .field("from", &self.from)
            .field("to", &self.to)
            .field("cc", &self.cc)
            .field("bcc", &self.bcc)
            .field("subject", &self.subject)
            .field("html_body", &self.html_body)
            .field("plain_text_body", &self.plain_text_body)
            .field("attachments", &self.attachments)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use anyhow::anyhow;
    use testresult::TestResult;

    use crate::domain::mailing::{
        errors::{ErrorKind, SendStep, TransportError},
        transport::MockTransport,
    };

    use super::*;

    type Calls = Arc<Mutex<Vec<(Vec<String>, String)>>>;

    fn recording_transport(calls: &Calls, times: usize) -> MockTransport {
        let calls = calls.clone();
        let mut transport = MockTransport::new();

        transport
            .expect_deliver()
            .times(times)
            .returning(move |_, recipients, message| {
                let rendered: Vec<String> = recipients.iter().map(ToString::to_string).collect();
                let raw = String::from_utf8_lossy(&message.raw).to_string();
                calls.lock().unwrap().push((rendered, raw));
                Ok(())
            });

        transport
    }

    fn populate<T: Transport>(driver: &mut Driver<T>) {
        driver.set_from(EmailAddress::new("test from name", "from@mail.com"));
        driver.set_to(vec![
            EmailAddress::new("test to name1", "to1@mail.com"),
            EmailAddress::new("test to name2", "to2@mail.com"),
        ]);
        driver.set_cc(vec![
            EmailAddress::new("test cc name1", "cc1@mail.com"),
            EmailAddress::new("test cc name2", "cc2@mail.com"),
        ]);
        driver.set_bcc(vec![
            EmailAddress::new("test bcc name1", "bcc1@mail.com"),
            EmailAddress::new("test bcc name2", "bcc2@mail.com"),
        ]);
        driver.set_subject("this is the subject");
        driver.set_plain_text_body("this is plain text body");
        driver.set_html_body("this is html body");
        driver.set_attachments(vec![
            Attachment::new("attachment name1", "./testingdata/attachment1.md"),
            Attachment::new("attachment name2", "./testingdata/attachment2.md"),
        ]);
    }

    #[tokio::test]
    async fn test_send_fans_out_bcc_recipients() -> TestResult {
        let calls: Calls = Arc::default();
        let mut driver = Driver::new(recording_transport(&calls, 3));
        populate(&mut driver);

        driver.send().await?;

        let calls = calls.lock().unwrap();
        let recipients = calls.iter().map(|(r, _)| r.clone()).collect::<Vec<_>>();

        assert_eq!(
            recipients,
            vec![
                vec![
                    r#""test to name1" <to1@mail.com>"#.to_string(),
                    r#""test to name2" <to2@mail.com>"#.to_string(),
                    r#""test cc name1" <cc1@mail.com>"#.to_string(),
                    r#""test cc name2" <cc2@mail.com>"#.to_string(),
                ],
                vec![r#""test bcc name1" <bcc1@mail.com>"#.to_string()],
                vec![r#""test bcc name2" <bcc2@mail.com>"#.to_string()],
            ]
        );

        Ok(())
    }

    #[tokio::test]
    async fn test_send_passes_built_message() -> TestResult {
        let calls: Calls = Arc::default();
        let mut driver = Driver::new(recording_transport(&calls, 3));
        populate(&mut driver);

        driver.send().await?;

        let calls = calls.lock().unwrap();
        let (_, message) = &calls[0];

        assert!(message.contains(r#"From: "test from name" <from@mail.com>"#));
        assert!(message.contains(
            r#"To: "test to name1" <to1@mail.com>;"test to name2" <to2@mail.com>"#
        ));
        assert!(message.contains(
            r#"CC: "test cc name1" <cc1@mail.com>;"test cc name2" <cc2@mail.com>"#
        ));
        assert!(message.contains("Subject: this is the subject"));
        assert!(message.contains(r#"Content-Type: text/html; charset="UTF-8""#));
        assert!(message.contains("this is html body"));
        assert!(!message.contains("this is plain text body"));
        assert!(message.contains(
            r#"Content-Disposition: attachment; filename="attachment name1""#
        ));
        assert!(message.contains("dGhpcyBpcyBhIHRlc3QgZmlsZSBmb3IgZW1haWwgYXR0YWNobWVudCAx"));
        assert!(message.contains(
            r#"Content-Disposition: attachment; filename="attachment name2""#
        ));
        assert!(message.contains("dGhpcyBpcyBhIHRlc3QgZmlsZSBmb3IgZW1haWwgYXR0YWNobWVudCAy"));

        for (_, message) in calls.iter() {
            assert!(!message.contains("bcc1@mail.com"));
            assert!(!message.contains("bcc2@mail.com"));
        }

        Ok(())
    }

    #[tokio::test]
    async fn test_send_with_plain_text_body() -> TestResult {
        let calls: Calls = Arc::default();
        let mut driver = Driver::new(recording_transport(&calls, 3));
        populate(&mut driver);

        driver.set_html_body("");
        driver.send().await?;

        let calls = calls.lock().unwrap();
        let (_, message) = &calls[0];

        assert!(message.contains(r#"Content-Type: text/plain; charset="UTF-8""#));
        assert!(message.contains("this is plain text body"));

        Ok(())
    }

    #[tokio::test]
    async fn test_primary_failure_skips_bcc() {
        let mut transport = MockTransport::new();

        transport
            .expect_deliver()
            .times(1)
            .returning(|_, _, _| Err(TransportError::CallFailed(anyhow!("this is a test error"))));

        let mut driver = Driver::new(transport);
        populate(&mut driver);

        let err = driver.send().await.expect_err("the primary call fails");
        assert!(matches!(err, MailerError::PrimarySend(_)));
        assert_eq!(err.step(), SendStep::Primary);
        assert_eq!(err.kind(), ErrorKind::TransportCall);
    }

    #[tokio::test]
    async fn test_bcc_failure_stops_fan_out() {
        let counter = Arc::new(Mutex::new(0usize));
        let seen = counter.clone();
        let mut transport = MockTransport::new();

        transport
            .expect_deliver()
            .times(3)
            .returning(move |_, recipients, _| {
                let mut count = seen.lock().unwrap();
                *count += 1;

                if recipients[0].address() == "bcc2@mail.com" {
                    return Err(TransportError::Timeout(std::time::Duration::from_secs(30)));
                }

                Ok(())
            });

        let mut driver = Driver::new(transport);
        populate(&mut driver);
        driver.set_bcc(vec![
            EmailAddress::new("", "bcc1@mail.com"),
            EmailAddress::new("", "bcc2@mail.com"),
            EmailAddress::new("", "bcc3@mail.com"),
        ]);

        let err = driver.send().await.expect_err("the second BCC call fails");

        assert!(matches!(
            err,
            MailerError::BccSend { index: 1, ref recipient, .. } if recipient == "bcc2@mail.com"
        ));
        assert_eq!(err.kind(), ErrorKind::Timeout);
        assert_eq!(*counter.lock().unwrap(), 3);
    }

    #[tokio::test]
    async fn test_state_reset_after_success() -> TestResult {
        let calls: Calls = Arc::default();
        let mut driver = Driver::new(recording_transport(&calls, 3));
        populate(&mut driver);

        driver.send().await?;

        assert_eq!(driver.subject(), "");
        assert_eq!(driver.html_body(), "");
        assert_eq!(driver.plain_text_body(), "");
        assert_eq!(driver.from().address(), "from@mail.com");
        assert_eq!(driver.to().len(), 2);
        assert_eq!(driver.cc().len(), 2);
        assert_eq!(driver.bcc().len(), 2);
        assert_eq!(driver.attachments().len(), 2);

        Ok(())
    }

    #[tokio::test]
    async fn test_state_reset_after_failure() {
        let mut transport = MockTransport::new();

        transport
            .expect_deliver()
            .times(1)
            .returning(|_, _, _| Err(TransportError::AuthenticationFailed(anyhow!("535"))));

        let mut driver = Driver::new(transport);
        populate(&mut driver);

        assert!(driver.send().await.is_err());

        assert_eq!(driver.subject(), "");
        assert_eq!(driver.html_body(), "");
        assert_eq!(driver.plain_text_body(), "");
        assert_eq!(driver.to().len(), 2);
        assert_eq!(driver.attachments().len(), 2);
    }

    #[tokio::test]
    async fn test_unreadable_attachment_sends_nothing() {
        let mut transport = MockTransport::new();
        transport.expect_deliver().times(0);

        let mut driver = Driver::new(transport);
        populate(&mut driver);
        driver.set_attachments(vec![Attachment::new("gone", "./testingdata/missing.bin")]);

        let result = driver.send().await;

        assert!(matches!(result, Err(MailerError::AttachmentRead { .. })));
        assert_eq!(driver.subject(), "");
    }

    #[tokio::test]
    async fn test_bcc_only_skips_primary_call() -> TestResult {
        let calls: Calls = Arc::default();
        let mut driver = Driver::new(recording_transport(&calls, 1));
        driver.set_from(EmailAddress::new("", "from@mail.com"));
        driver.set_bcc(vec![EmailAddress::new("", "hidden@mail.com")]);
        driver.set_plain_text_body("psst");

        driver.send().await?;

        let calls = calls.lock().unwrap();
        assert_eq!(calls[0].0, vec!["hidden@mail.com".to_string()]);

        Ok(())
    }

    #[test]
    fn test_clear_resets_everything() {
        let mut driver = Driver::new(MockTransport::new());
        populate(&mut driver);

        driver.clear();

        assert_eq!(driver.from(), &EmailAddress::default());
        assert!(driver.to().is_empty());
        assert!(driver.cc().is_empty());
        assert!(driver.bcc().is_empty());
        assert!(driver.attachments().is_empty());
        assert_eq!(driver.subject(), "");
    }
}
