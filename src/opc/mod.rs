//! Open Packaging Conventions
//!
//! Logical packages (parts, content types, relationships) on top of a
//! physical container. The ZIP mapping is the only container provided.

mod content_types;
mod part;
mod part_uri;
mod reader;
mod relationships;
mod writer;

pub mod options;
pub mod physical;

pub use content_types::{validate_media_type, ContentTypes, RELATIONSHIPS, XML};
pub use options::{Compression, WriterOptions};
pub use part::Part;
pub use part_uri::{well_known, PartUri, PieceEntry, CONTENT_TYPES_ENTRY};
pub use reader::{PackageReader, PartReader, ZipPackageReader};
pub use relationships::{
    rel_types, Relationship, RelationshipSource, RelationshipTarget, Relationships, TargetMode,
};
pub use writer::{PackageWriter, PartWriter, ZipPackageWriter};
