//! # linch-opc
//!
//! Reading and writing Open Packaging Conventions (OPC) packages, the ZIP
//! container behind DOCX, XLSX, PPTX and XPS files.
//!
//! ## Features
//!
//! - Part names normalized and compared case-insensitively
//! - Content type resolution (Override first, then Default by extension)
//! - Relationship graphs for the package root and for each part
//! - Parts split into interleaved pieces are read transparently
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use linch_opc::{PackageReader, PackageWriter, PartUri, RelationshipSource};
//! use linch_opc::opc::rel_types;
//! use std::io::Write;
//!
//! // Read
//! let mut pkg = PackageReader::open("example.docx")?;
//! for part in pkg.parts() {
//!     let part = part?;
//!     println!("{} {}", part.uri(), part.content_type());
//! }
//! let main = pkg.related_parts(&RelationshipSource::Package, rel_types::OFFICE_DOCUMENT)?;
//!
//! // Write
//! let mut out = PackageWriter::create("output.docx")?;
//! let doc = PartUri::new("/word/document.xml")?;
//! let mut part = out.open_part(&doc, "application/xml")?;
//! part.write_all(b"<document/>")?;
//! part.close()?;
//! out.relationships_mut(&RelationshipSource::Package)?
//!     .add(rel_types::OFFICE_DOCUMENT, "word/document.xml")?;
//! out.finish()?;
//! ```

pub mod error;
pub mod opc;
pub mod xml;

pub use error::{Error, Result};
pub use opc::{
    ContentTypes, PackageReader, PackageWriter, Part, PartUri, RelationshipSource, Relationships,
    WriterOptions,
};
