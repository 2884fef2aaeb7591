//! Error types for reprint operations.

use thiserror::Error;

/// Errors that can occur while reading, cleaning, or writing an ebook.
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("XML parsing error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("Invalid EPUB: {0}")]
    InvalidEpub(String),

    #[error("can't find resource at path {0}")]
    ResourceNotFound(String),

    #[error("malformed reference: {0}")]
    MalformedReference(String),

    #[error("malformed metadata: {0}")]
    MalformedMetadata(String),

    #[error("serialization failed: {0}")]
    Serialization(String),

    #[error("UTF-8 decoding error: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

pub type Result<T> = std::result::Result<T, Error>;
