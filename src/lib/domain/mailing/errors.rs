//! Mailing errors

use std::{io, path::PathBuf, time::Duration};

use thiserror::Error;

/// Errors raised by a single transport call
#[derive(Debug, Error)]
pub enum TransportError {
    /// The backend rejected the configured credentials
    #[error("the transport rejected the credentials: {0}")]
    AuthenticationFailed(anyhow::Error),

    /// The call did not complete in time
    #[error("the transport call timed out after {0:?}")]
    Timeout(Duration),

    /// Network or provider API failure
    #[error("the transport call failed: {0}")]
    CallFailed(anyhow::Error),
}

/// Errors returned from building or sending a message
#[derive(Debug, Error)]
pub enum MailerError {
    /// An attachment could not be opened or fully read
    #[error("could not read attachment {}", path.display())]
    AttachmentRead {
        /// The attachment's path
        path: PathBuf,

        /// The underlying IO error
        #[source]
        source: io::Error,
    },

    /// Sending to the to/cc recipients failed; no BCC recipient was attempted
    #[error("sending to the primary recipients failed")]
    PrimarySend(#[source] TransportError),

    /// Sending to a BCC recipient failed; later BCC recipients were not attempted
    #[error("sending to BCC recipient #{index} ({recipient}) failed")]
    BccSend {
        /// Position of the recipient in the BCC list
        index: usize,

        /// The rendered recipient address
        recipient: String,

        /// The transport failure
        #[source]
        source: TransportError,
    },

    /// Unknown error
    #[error(transparent)]
    UnknownError(#[from] anyhow::Error),
}

/// Broad classification of a [`MailerError`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// An attachment file was missing or unreadable
    AttachmentRead,

    /// The backend rejected the credentials
    TransportAuth,

    /// A network or API failure
    TransportCall,

    /// A transport call exceeded its time bound
    Timeout,

    /// Anything else, e.g. incomplete configuration
    Unknown,
}

/// The step of a send at which a [`MailerError`] happened
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SendStep {
    /// Building the MIME message; nothing was sent
    Build,

    /// The single call to the to/cc recipients; nothing was sent
    Primary,

    /// The call to the BCC recipient at this index. The primary call and every
    /// earlier BCC call were delivered.
    Bcc(usize),
}

impl TransportError {
    /// The [`ErrorKind`] this failure maps to
    pub fn kind(&self) -> ErrorKind {
        match self {
            TransportError::AuthenticationFailed(_) => ErrorKind::TransportAuth,
            TransportError::Timeout(_) => ErrorKind::Timeout,
            TransportError::CallFailed(_) => ErrorKind::TransportCall,
        }
    }
}

impl MailerError {
    /// The [`ErrorKind`] of the underlying failure
    pub fn kind(&self) -> ErrorKind {
        match self {
            MailerError::AttachmentRead { .. } => ErrorKind::AttachmentRead,
            MailerError::PrimarySend(source) | MailerError::BccSend { source, .. } => {
                source.kind()
            }
            MailerError::UnknownError(_) => ErrorKind::Unknown,
        }
    }

    /// Where in the send the failure happened
    pub fn step(&self) -> SendStep {
        match self {
            MailerError::PrimarySend(_) => SendStep::Primary,
            MailerError::BccSend { index, .. } => SendStep::Bcc(*index),
            MailerError::AttachmentRead { .. } | MailerError::UnknownError(_) => SendStep::Build,
        }
    }
}
