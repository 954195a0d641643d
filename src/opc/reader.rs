//! Package reader
//!
//! Opens a physical container, maps its entries to parts, resolves their
//! content types and serves relationship sets.

use crate::error::{Error, Result};
use crate::opc::physical::pieces::{self, PartLayout, PieceReader};
use crate::opc::physical::zip_container::ZipContainerReader;
use crate::opc::physical::PhysicalReader;
use crate::opc::{
    ContentTypes, Part, PartUri, RelationshipSource, RelationshipTarget, Relationships,
    TargetMode,
};
use log::debug;
use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::{self, BufReader, Cursor, Read, Seek};
use std::path::Path;
use std::rc::Rc;

/// A package reader over a ZIP archive
pub type ZipPackageReader<R> = PackageReader<ZipContainerReader<R>>;

/// Read access to an OPC package.
///
/// The content types declaration is parsed when the package is opened.
/// Piece sequences are checked when their part is opened, relationship
/// parts when their relationships are first requested; parsed sets are
/// cached for the reader's lifetime.
///
/// At most one part stream is open at a time: [`open_part`](Self::open_part)
/// borrows the reader mutably.
pub struct PackageReader<C: PhysicalReader> {
    container: C,
    content_types: ContentTypes,
    parts: BTreeMap<PartUri, PartLayout>,
    relationships: HashMap<RelationshipSource, Rc<Relationships>>,
}

impl ZipPackageReader<BufReader<File>> {
    /// Open a package from a file path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        Self::from_reader(BufReader::new(file))
    }
}

impl<'a> ZipPackageReader<Cursor<&'a [u8]>> {
    /// Open a package from bytes
    pub fn from_bytes(bytes: &'a [u8]) -> Result<Self> {
        Self::from_reader(Cursor::new(bytes))
    }
}

impl<R: Read + Seek> ZipPackageReader<R> {
    /// Open a package from a seekable reader
    pub fn from_reader(reader: R) -> Result<Self> {
        Self::new(ZipContainerReader::new(reader)?)
    }
}

impl<C: PhysicalReader> PackageReader<C> {
    /// Open a package stored in any physical container
    pub fn new(mut container: C) -> Result<Self> {
        let index = pieces::index_entries(container.list_entries()?);

        let content_types_entry = index
            .content_types
            .ok_or_else(|| Error::malformed("missing [Content_Types].xml"))?;
        let content_types = {
            let entry = container.open_entry(&content_types_entry)?;
            ContentTypes::from_reader(BufReader::new(entry))?
        };

        debug!("opened package with {} parts", index.parts.len());

        Ok(Self {
            container,
            content_types,
            parts: index.parts,
            relationships: HashMap::new(),
        })
    }

    /// Get content types
    pub fn content_types(&self) -> &ContentTypes {
        &self.content_types
    }

    /// Check whether a part exists
    pub fn contains(&self, uri: &PartUri) -> bool {
        self.parts.contains_key(uri)
    }

    /// Get a part's name, content type and size
    pub fn part(&self, uri: &PartUri) -> Result<Part> {
        let (name, layout) = self
            .parts
            .get_key_value(uri)
            .ok_or_else(|| Error::PartNotFound(uri.to_string()))?;
        self.describe(name, layout)
    }

    fn describe(&self, name: &PartUri, layout: &PartLayout) -> Result<Part> {
        let content_type = self.content_types.resolve(name)?;
        Ok(Part::new(
            name.clone(),
            content_type,
            layout.size(),
            matches!(layout, PartLayout::Interleaved(_)),
        ))
    }

    /// Parts of the package, relationship parts excluded, sorted by name.
    ///
    /// A part without a declared content type yields an error item.
    pub fn parts(&self) -> impl Iterator<Item = Result<Part>> + '_ {
        self.parts
            .iter()
            .filter(|(name, _)| !name.is_relationships())
            .map(move |(name, layout)| self.describe(name, layout))
    }

    /// All parts including relationship parts, sorted by name
    pub fn all_parts(&self) -> impl Iterator<Item = Result<Part>> + '_ {
        self.parts
            .iter()
            .map(move |(name, layout)| self.describe(name, layout))
    }

    /// Part names, relationship parts included
    pub fn part_uris(&self) -> impl Iterator<Item = &PartUri> {
        self.parts.keys()
    }

    /// Open a part for streaming read
    pub fn open_part(&mut self, uri: &PartUri) -> Result<PartReader<'_, C>> {
        let layout = self
            .parts
            .get(uri)
            .ok_or_else(|| Error::PartNotFound(uri.to_string()))?;

        match layout {
            PartLayout::Single { entry, .. } => {
                let stream = self.container.open_entry(entry)?;
                Ok(PartReader::Entry(stream))
            }
            PartLayout::Interleaved(sequence) => {
                let entries = sequence.ordered_entries(uri)?;
                Ok(PartReader::Pieces(PieceReader::new(
                    &mut self.container,
                    entries,
                )))
            }
            PartLayout::Ambiguous(entries) => Err(Error::malformed(format!(
                "part {} is stored in several entries: {}",
                uri,
                entries.join(", ")
            ))),
        }
    }

    /// Read a whole part into memory
    pub fn read_part(&mut self, uri: &PartUri) -> Result<Vec<u8>> {
        let mut data = Vec::new();
        self.open_part(uri)?.read_to_end(&mut data)?;
        Ok(data)
    }

    /// Relationships of a part or of the package root.
    ///
    /// A source without a relationships part has an empty set.
    pub fn relationships(&mut self, source: &RelationshipSource) -> Result<Rc<Relationships>> {
        if let Some(rels) = self.relationships.get(source) {
            return Ok(Rc::clone(rels));
        }

        if let RelationshipSource::Part(uri) = source {
            if !self.parts.contains_key(uri) {
                return Err(Error::PartNotFound(uri.to_string()));
            }
        }

        let rels_uri = source.relationships_uri();
        let rels = if self.parts.contains_key(&rels_uri) {
            let stream = self.open_part(&rels_uri)?;
            Relationships::from_reader(BufReader::new(stream), source)?
        } else {
            Relationships::new()
        };
        debug!("loaded {} relationships for {}", rels.len(), source);

        let rels = Rc::new(rels);
        self.relationships.insert(source.clone(), Rc::clone(&rels));
        Ok(rels)
    }

    /// Internal targets of one relationship type, in document order
    pub fn related_parts(
        &mut self,
        source: &RelationshipSource,
        rel_type: &str,
    ) -> Result<Vec<PartUri>> {
        let rels = self.relationships(source)?;
        let mut targets = Vec::new();
        for rel in rels.by_type(rel_type) {
            if let RelationshipTarget::Part(uri) = rel.resolve_target(source)? {
                targets.push(uri);
            }
        }
        Ok(targets)
    }

    /// Internal targets of a source grouped by relationship type
    pub fn related_parts_by_type(
        &mut self,
        source: &RelationshipSource,
    ) -> Result<BTreeMap<String, Vec<PartUri>>> {
        let rels = self.relationships(source)?;
        let mut grouped: BTreeMap<String, Vec<PartUri>> = BTreeMap::new();
        for rel in rels.iter().filter(|r| r.target_mode == TargetMode::Internal) {
            if let RelationshipTarget::Part(uri) = rel.resolve_target(source)? {
                grouped.entry(rel.rel_type.clone()).or_default().push(uri);
            }
        }
        Ok(grouped)
    }

    /// Give back the physical container
    pub fn into_inner(self) -> C {
        self.container
    }
}

/// Stream over one part's bytes
pub enum PartReader<'a, C: PhysicalReader> {
    /// A part stored in one entry
    Entry(Box<dyn Read + 'a>),
    /// A part stored as pieces
    Pieces(PieceReader<'a, C>),
}

impl<C: PhysicalReader> Read for PartReader<'_, C> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            PartReader::Entry(stream) => stream.read(buf),
            PartReader::Pieces(pieces) => pieces.read(buf),
        }
    }
}
