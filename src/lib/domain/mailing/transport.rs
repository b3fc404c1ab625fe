//! Transport backends

use async_trait::async_trait;

#[cfg(test)]
use mockall::mock;

use super::{email_address::EmailAddress, errors::TransportError, message::OutgoingMessage};

/// A channel that hands a prepared message to a mail delivery service.
///
/// One call is one physical delivery: an SMTP session or one provider API
/// request addressed to exactly `recipients`. Calls are bounded by a timeout
/// and fail with [`TransportError::Timeout`] when it elapses.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Deliver `message` from `from` to `recipients`
    ///
    /// # Arguments
    /// * `from` - The sender
    /// * `recipients` - Every envelope recipient of this call
    /// * `message` - The serialized MIME message and its parts
    ///
    /// # Returns
    /// A [`Result`] indicating success or failure.
    async fn deliver(
        &self,
        from: &EmailAddress,
        recipients: &[EmailAddress],
        message: &OutgoingMessage,
    ) -> Result<(), TransportError>;

    /// The provider name, for logging
    fn name(&self) -> &'static str {
        "unknown"
    }
}

#[async_trait]
impl<T> Transport for Box<T>
where
    T: Transport + ?Sized,
{
    async fn deliver(
        &self,
        from: &EmailAddress,
        recipients: &[EmailAddress],
        message: &OutgoingMessage,
    ) -> Result<(), TransportError> {
        (**self).deliver(from, recipients, message).await
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}

#[cfg(test)]
mock! {
    pub Transport {}

    #[async_trait]
    impl Transport for Transport {
        async fn deliver(
            &self,
            from: &EmailAddress,
            recipients: &[EmailAddress],
            message: &OutgoingMessage,
        ) -> Result<(), TransportError>;
    }
}
