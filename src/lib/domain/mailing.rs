//! Provider-agnostic email composition and sending

mod attachment;
mod driver;
mod email_address;
mod errors;
mod mailer;
mod message;
mod transport;

pub use attachment::{sniff_content_type, Attachment, LoadedAttachment};
pub use driver::Driver;
pub use email_address::{EmailAddress, EmailAddressError};
pub use errors::{ErrorKind, MailerError, SendStep, TransportError};
pub use mailer::Mailer;
pub use message::{Body, MessageBuilder, OutgoingMessage};
pub use transport::Transport;
