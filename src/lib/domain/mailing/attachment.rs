//! Attachments

use std::{fs, path::PathBuf};

use tracing::debug;

use super::errors::MailerError;

const TEXT_PLAIN: &str = "text/plain; charset=utf-8";
const OCTET_STREAM: &str = "application/octet-stream";

/// A file to attach to an email.
///
/// `name` is the filename presented to the recipient and is independent of
/// the file's location on disk.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Attachment {
    /// The filename shown to the recipient
    pub name: String,

    /// Path of the file to read at send time
    pub path: PathBuf,
}

impl Attachment {
    /// Create a new attachment
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
        }
    }

    /// Reads the whole file and sniffs its content type.
    pub fn load(&self) -> Result<LoadedAttachment, MailerError> {
        let data = fs::read(&self.path).map_err(|source| MailerError::AttachmentRead {
            path: self.path.clone(),
            source,
        })?;

        let content_type = sniff_content_type(&data);

        debug!(
            name = %self.name,
            content_type,
            size = data.len(),
            "loaded attachment"
        );

        Ok(LoadedAttachment {
            name: self.name.clone(),
            content_type: content_type.to_string(),
            data,
        })
    }
}

/// An attachment whose contents have been read for a single send
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoadedAttachment {
    /// The filename shown to the recipient
    pub name: String,

    /// MIME type detected from the leading bytes
    pub content_type: String,

    /// The raw file contents
    pub data: Vec<u8>,
}

impl LoadedAttachment {
    /// The content type without parameters, e.g. `text/plain`
    pub fn essence(&self) -> &str {
        self.content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
    }
}

/// Detects a MIME type from the leading bytes of `data`.
///
/// Known binary signatures win; otherwise UTF-8 text without control bytes is
/// `text/plain` and everything else is `application/octet-stream`.
pub fn sniff_content_type(data: &[u8]) -> &'static str {
    if let Some(kind) = infer::get(data) {
        return kind.mime_type();
    }

    match std::str::from_utf8(data) {
        Ok(text) if !text.chars().any(is_binary_control) => TEXT_PLAIN,
        _ => OCTET_STREAM,
    }
}

fn is_binary_control(c: char) -> bool {
    c.is_control() && !matches!(c, '\t' | '\n' | '\r' | '\x0c' | '\x1b')
}
