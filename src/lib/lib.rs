#![warn(
    missing_debug_implementations,
    rust_2018_idioms,
    missing_docs,
    rustdoc::broken_intra_doc_links,
    rustdoc::missing_crate_level_docs
)]

//! Provider-agnostic email sending: build a MIME message once and deliver it
//! over SMTP or through the SendGrid, Mailgun or SparkPost APIs.

pub mod domain;
pub mod infrastructure;
