//! Error types for linch-opc

use thiserror::Error;

/// Main error type
#[derive(Debug, Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("XML encoding error: {0}")]
    XmlEncoding(#[from] quick_xml::encoding::EncodingError),

    #[error("XML attribute error: {0}")]
    XmlAttr(#[from] quick_xml::events::attributes::AttrError),

    #[error("UTF-8 error: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    /// A part name failed URI or segment validation
    #[error("Invalid part name '{name}': {reason}")]
    InvalidPartName { name: String, reason: String },

    /// Structural violation of the package model
    #[error("Malformed package: {0}")]
    MalformedPackage(String),

    /// Neither an override nor a default covers the part
    #[error("No content type declared for part: {0}")]
    UnresolvedContentType(String),

    #[error("Invalid content type: {0}")]
    InvalidContentType(String),

    #[error("Invalid relationship: {0}")]
    InvalidRelationship(String),

    #[error("Part not found: {0}")]
    PartNotFound(String),

    #[error("Duplicate part: {0}")]
    DuplicatePart(String),

    /// A part (or archive entry) is still open for writing
    #[error("Part is still open for writing: {0}")]
    PartStillOpen(String),

    #[error("No part is open for writing")]
    NoOpenPart,

    #[error("Content types already written, cannot declare content type for: {0}")]
    ContentTypesAlreadyWritten(String),
}

impl Error {
    pub(crate) fn invalid_name(name: &str, reason: impl Into<String>) -> Self {
        Error::InvalidPartName {
            name: name.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn malformed(msg: impl Into<String>) -> Self {
        Error::MalformedPackage(msg.into())
    }
}

impl From<Error> for std::io::Error {
    fn from(err: Error) -> Self {
        match err {
            Error::Io(io) => io,
            other => std::io::Error::new(std::io::ErrorKind::Other, other),
        }
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
