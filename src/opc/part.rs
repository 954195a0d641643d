//! Part representation for OPC packages

use crate::opc::PartUri;

/// A part as listed by a package reader.
///
/// The bytes are not held here; open the part through the reader to
/// stream them.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Part {
    /// Part name
    uri: PartUri,
    /// Resolved content type
    content_type: String,
    /// Byte length, if known
    size: Option<u64>,
    /// Whether the part is stored as pieces
    interleaved: bool,
}

impl Part {
    pub(crate) fn new(
        uri: PartUri,
        content_type: impl Into<String>,
        size: Option<u64>,
        interleaved: bool,
    ) -> Self {
        Self {
            uri,
            content_type: content_type.into(),
            size,
            interleaved,
        }
    }

    /// Get the part name
    pub fn uri(&self) -> &PartUri {
        &self.uri
    }

    /// Get the content type
    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    /// Total byte length
    pub fn size(&self) -> Option<u64> {
        self.size
    }

    pub fn is_interleaved(&self) -> bool {
        self.interleaved
    }

    /// Whether this part holds relationships of another part
    pub fn is_relationships(&self) -> bool {
        self.uri.is_relationships()
    }

    /// Get the relationships part name for this part
    pub fn relationships_uri(&self) -> PartUri {
        self.uri.relationships_uri()
    }
}
