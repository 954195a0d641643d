//! Package writer
//!
//! Parts are streamed into the physical container one after another.
//! Relationship sets and the content types declaration are accumulated and
//! written when the package is finished.

use crate::error::{Error, Result};
use crate::opc::options::WriterOptions;
use crate::opc::physical::pieces::PieceWriter;
use crate::opc::physical::zip_container::ZipContainerWriter;
use crate::opc::physical::PhysicalWriter;
use crate::opc::{
    validate_media_type, ContentTypes, PartUri, RelationshipSource, Relationships,
    CONTENT_TYPES_ENTRY, RELATIONSHIPS,
};
use log::{debug, warn};
use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::{self, BufWriter, Seek, Write};
use std::path::Path;

/// A package writer producing a ZIP archive
pub type ZipPackageWriter<W> = PackageWriter<ZipContainerWriter<W>>;

/// Part currently receiving bytes
enum OpenPart {
    /// Written straight into one entry
    Plain(PartUri),
    /// Split into piece entries
    Interleaved(PieceWriter),
}

impl OpenPart {
    fn uri(&self) -> &PartUri {
        match self {
            OpenPart::Plain(uri) => uri,
            OpenPart::Interleaved(pieces) => pieces.part(),
        }
    }
}

/// Write access to a new OPC package.
///
/// One part is open at a time: [`start_part`](Self::start_part) begins it,
/// the `Write` impl fills it and [`finish_part`](Self::finish_part) ends it.
/// [`open_part`](Self::open_part) wraps the same sequence in a guard that
/// closes the part when dropped.
///
/// Relationship parts and `[Content_Types].xml` are written by
/// [`finish`](Self::finish) from everything declared so far.
pub struct PackageWriter<W: PhysicalWriter> {
    container: W,
    options: WriterOptions,
    content_types: ContentTypes,
    content_types_written: bool,
    written: BTreeSet<PartUri>,
    relationships: BTreeMap<RelationshipSource, Relationships>,
    open: Option<OpenPart>,
}

impl ZipPackageWriter<BufWriter<File>> {
    /// Create a package file at `path`
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::create(path)?;
        Ok(Self::from_writer(BufWriter::new(file)))
    }
}

impl<W: Write + Seek> ZipPackageWriter<W> {
    /// Write a package into a seekable sink with default options
    pub fn from_writer(inner: W) -> Self {
        Self::with_options(inner, WriterOptions::default())
    }

    /// Write a package into a seekable sink
    pub fn with_options(inner: W, options: WriterOptions) -> Self {
        let container = ZipContainerWriter::new(inner, options.compression);
        Self::new(container, options)
    }
}

impl<W: PhysicalWriter> PackageWriter<W> {
    /// Write a package into any physical container
    pub fn new(container: W, options: WriterOptions) -> Self {
        Self {
            container,
            options,
            content_types: ContentTypes::new(),
            content_types_written: false,
            written: BTreeSet::new(),
            relationships: BTreeMap::new(),
            open: None,
        }
    }

    /// Writer options in use
    pub fn options(&self) -> &WriterOptions {
        &self.options
    }

    /// Content types declared so far
    pub fn content_types(&self) -> &ContentTypes {
        &self.content_types
    }

    /// Name of the part being written, if any
    pub fn open_part_uri(&self) -> Option<&PartUri> {
        self.open.as_ref().map(OpenPart::uri)
    }

    /// Parts completed so far
    pub fn written_parts(&self) -> impl Iterator<Item = &PartUri> {
        self.written.iter()
    }

    /// Begin a part stored in a single entry
    pub fn start_part(&mut self, uri: &PartUri, content_type: &str) -> Result<()> {
        self.begin(uri, content_type)?;
        self.container.start_entry(uri.entry_name())?;
        self.open = Some(OpenPart::Plain(uri.clone()));
        debug!("started part {} ({})", uri, content_type);
        Ok(())
    }

    /// Begin a part stored as a sequence of pieces.
    ///
    /// A piece ends at every `flush()` and whenever `piece_size` bytes are
    /// buffered. Closing the part writes the `.last` piece.
    pub fn start_interleaved_part(&mut self, uri: &PartUri, content_type: &str) -> Result<()> {
        self.begin(uri, content_type)?;
        self.open = Some(OpenPart::Interleaved(PieceWriter::new(
            uri.clone(),
            self.options.piece_size,
        )));
        debug!("started interleaved part {} ({})", uri, content_type);
        Ok(())
    }

    fn begin(&mut self, uri: &PartUri, content_type: &str) -> Result<()> {
        if let Some(open) = &self.open {
            return Err(Error::PartStillOpen(open.uri().to_string()));
        }
        if self.written.contains(uri) {
            return Err(Error::DuplicatePart(uri.to_string()));
        }
        validate_media_type(content_type)?;
        self.declare(uri, content_type)
    }

    /// Record the part's content type, preferring a Default for an
    /// extension seen for the first time.
    fn declare(&mut self, uri: &PartUri, content_type: &str) -> Result<()> {
        if self.content_types.get(uri) == Some(content_type) {
            return Ok(());
        }
        if self.content_types_written {
            return Err(Error::ContentTypesAlreadyWritten(uri.to_string()));
        }

        let unclaimed_extension = uri
            .extension()
            .filter(|ext| !ext.is_empty())
            .filter(|ext| {
                !self
                    .content_types
                    .defaults()
                    .any(|(known, _)| known.eq_ignore_ascii_case(ext))
            });
        match unclaimed_extension {
            Some(ext) => self.content_types.set_default(ext, content_type),
            None => self.content_types.set_override(uri, content_type),
        }
    }

    /// Close the open part
    pub fn finish_part(&mut self) -> Result<()> {
        let open = self.open.take().ok_or(Error::NoOpenPart)?;
        let uri = match open {
            OpenPart::Plain(uri) => {
                self.container.close_entry()?;
                uri
            }
            OpenPart::Interleaved(pieces) => {
                let uri = pieces.part().clone();
                let count = pieces.finish(&mut self.container)?;
                debug!("wrote {} pieces for {}", count, uri);
                uri
            }
        };
        debug!("finished part {}", uri);
        self.written.insert(uri);
        Ok(())
    }

    /// Begin a part and return a guard that closes it when dropped
    pub fn open_part(&mut self, uri: &PartUri, content_type: &str) -> Result<PartWriter<'_, W>> {
        self.start_part(uri, content_type)?;
        Ok(PartWriter::new(self))
    }

    /// Guard variant of [`start_interleaved_part`](Self::start_interleaved_part)
    pub fn open_interleaved_part(
        &mut self,
        uri: &PartUri,
        content_type: &str,
    ) -> Result<PartWriter<'_, W>> {
        self.start_interleaved_part(uri, content_type)?;
        Ok(PartWriter::new(self))
    }

    /// Write a whole part in one call
    pub fn write_part(&mut self, uri: &PartUri, content_type: &str, data: &[u8]) -> Result<()> {
        self.start_part(uri, content_type)?;
        self.container.write_all(data)?;
        self.finish_part()
    }

    /// Declare a Default content type for an extension
    ///
    /// Parts already started that resolved through the previous Default keep
    /// their content type through an Override.
    pub fn set_default(&mut self, extension: &str, content_type: &str) -> Result<()> {
        if self.content_types_written {
            return Err(Error::ContentTypesAlreadyWritten(format!("*.{}", extension)));
        }

        let pinned: Vec<(PartUri, String)> = self
            .written
            .iter()
            .chain(self.open_part_uri())
            .filter(|uri| {
                uri.extension()
                    .is_some_and(|ext| ext.eq_ignore_ascii_case(extension))
            })
            .filter_map(|uri| {
                self.content_types
                    .get(uri)
                    .filter(|current| *current != content_type)
                    .map(|current| (uri.clone(), current.to_string()))
            })
            .collect();

        self.content_types.set_default(extension, content_type)?;
        for (uri, current) in pinned {
            self.content_types.set_override(&uri, &current)?;
        }
        Ok(())
    }

    /// Declare an Override content type for a part.
    ///
    /// The content type of a part already started cannot change.
    pub fn set_override(&mut self, uri: &PartUri, content_type: &str) -> Result<()> {
        if self.content_types_written {
            return Err(Error::ContentTypesAlreadyWritten(uri.to_string()));
        }
        let started = self.written.contains(uri) || self.open_part_uri() == Some(uri);
        if started {
            if let Some(current) = self.content_types.get(uri) {
                if current != content_type {
                    return Err(Error::InvalidContentType(format!(
                        "part {} was already written as {}",
                        uri, current
                    )));
                }
            }
        }
        self.content_types.set_override(uri, content_type)
    }

    /// Relationships of a source, created empty on first use.
    ///
    /// Relationship parts cannot be relationship sources.
    pub fn relationships_mut(&mut self, source: &RelationshipSource) -> Result<&mut Relationships> {
        if let RelationshipSource::Part(uri) = source {
            if uri.is_relationships() {
                return Err(Error::InvalidRelationship(format!(
                    "relationship part {} cannot have relationships",
                    uri
                )));
            }
        }
        Ok(self.relationships.entry(source.clone()).or_default())
    }

    /// Replace the relationships of a source
    pub fn set_relationships(
        &mut self,
        source: &RelationshipSource,
        relationships: Relationships,
    ) -> Result<()> {
        *self.relationships_mut(source)? = relationships;
        Ok(())
    }

    /// Relationships declared for a source so far
    pub fn relationships(&self, source: &RelationshipSource) -> Option<&Relationships> {
        self.relationships.get(source)
    }

    /// Write `[Content_Types].xml` now.
    ///
    /// Afterwards only parts whose content type the declaration already
    /// resolves can be added.
    pub fn write_content_types(&mut self) -> Result<()> {
        if let Some(open) = &self.open {
            return Err(Error::PartStillOpen(open.uri().to_string()));
        }
        if self.content_types_written {
            return Err(Error::DuplicatePart(CONTENT_TYPES_ENTRY.to_string()));
        }

        self.container.start_entry(CONTENT_TYPES_ENTRY)?;
        self.content_types.write_to(&mut self.container)?;
        self.container.close_entry()?;
        self.content_types_written = true;
        debug!("wrote {}", CONTENT_TYPES_ENTRY);
        Ok(())
    }

    /// Write relationship parts and content types, then close the archive
    pub fn finish(mut self) -> Result<W::Output> {
        if let Some(open) = &self.open {
            return Err(Error::PartStillOpen(open.uri().to_string()));
        }

        let relationships = std::mem::take(&mut self.relationships);
        for (source, rels) in &relationships {
            if rels.is_empty() {
                continue;
            }
            let xml = rels.to_xml()?;
            self.write_part(&source.relationships_uri(), RELATIONSHIPS, &xml)?;
        }

        if !self.content_types_written {
            self.write_content_types()?;
        }

        debug!("finalized package with {} parts", self.written.len());
        self.container.finalize_archive()
    }
}

impl<W: PhysicalWriter> Write for PackageWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match &mut self.open {
            None => Err(Error::NoOpenPart.into()),
            Some(OpenPart::Plain(_)) => self.container.write(buf),
            Some(OpenPart::Interleaved(pieces)) => {
                pieces.write(&mut self.container, buf)?;
                Ok(buf.len())
            }
        }
    }

    /// For an interleaved part, ends the current piece.
    fn flush(&mut self) -> io::Result<()> {
        match &mut self.open {
            Some(OpenPart::Interleaved(pieces)) => Ok(pieces.cut(&mut self.container)?),
            _ => self.container.flush(),
        }
    }
}

/// Output stream of one part. Closes the part when dropped.
///
/// Prefer [`close`](Self::close) so that errors are reported.
pub struct PartWriter<'a, W: PhysicalWriter> {
    writer: &'a mut PackageWriter<W>,
    closed: bool,
}

impl<'a, W: PhysicalWriter> PartWriter<'a, W> {
    fn new(writer: &'a mut PackageWriter<W>) -> Self {
        Self {
            writer,
            closed: false,
        }
    }

    /// Close the part
    pub fn close(mut self) -> Result<()> {
        self.closed = true;
        self.writer.finish_part()
    }
}

impl<W: PhysicalWriter> Write for PartWriter<'_, W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.writer.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

impl<W: PhysicalWriter> Drop for PartWriter<'_, W> {
    fn drop(&mut self) {
        if !self.closed {
            if let Err(e) = self.writer.finish_part() {
                warn!("failed to close part on drop: {}", e);
            }
        }
    }
}
