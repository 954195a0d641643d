//! Relationships handling for OPC packages
//!
//! Parses and generates `.rels` parts

use crate::error::{Error, Result};
use crate::opc::part_uri::well_known;
use crate::opc::PartUri;
use crate::xml::{self, PR};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, Event};
use quick_xml::{Reader, Writer};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::io::{BufRead, Write};

/// The source a relationship set belongs to
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RelationshipSource {
    /// The package root (`/_rels/.rels`)
    Package,
    /// A part in the package
    Part(PartUri),
}

impl RelationshipSource {
    /// Name of the relationships part storing this source's relationships
    pub fn relationships_uri(&self) -> PartUri {
        match self {
            RelationshipSource::Package => well_known::package_rels(),
            RelationshipSource::Part(uri) => uri.relationships_uri(),
        }
    }

    /// Folder that relative internal targets resolve against
    pub fn base(&self) -> &str {
        match self {
            RelationshipSource::Package => "/",
            RelationshipSource::Part(uri) => uri.base(),
        }
    }
}

impl From<PartUri> for RelationshipSource {
    fn from(uri: PartUri) -> Self {
        RelationshipSource::Part(uri)
    }
}

impl From<&PartUri> for RelationshipSource {
    fn from(uri: &PartUri) -> Self {
        RelationshipSource::Part(uri.clone())
    }
}

impl fmt::Display for RelationshipSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelationshipSource::Package => write!(f, "/"),
            RelationshipSource::Part(uri) => write!(f, "{}", uri),
        }
    }
}

/// Collection of relationships for one source, in document order
#[derive(Clone, Debug)]
pub struct Relationships {
    items: Vec<Relationship>,
    ids: HashSet<String>,
    /// Next auto-generated ID number
    next_id: u32,
}

impl Default for Relationships {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            ids: HashSet::new(),
            next_id: 1, // Start from 1, not 0
        }
    }
}

impl PartialEq for Relationships {
    fn eq(&self, other: &Self) -> bool {
        self.items == other.items
    }
}

impl Eq for Relationships {}

/// A single relationship
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Relationship {
    /// Relationship ID (e.g., "rId1")
    pub id: String,
    /// Relationship type URI
    pub rel_type: String,
    /// Target URI (relative or absolute)
    pub target: String,
    /// Target mode
    pub target_mode: TargetMode,
}

/// Target mode for relationships
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TargetMode {
    /// Internal target (part within the package)
    #[default]
    Internal,
    /// External target (hyperlink, etc.)
    External,
}

impl TargetMode {
    fn parse(value: &str) -> Option<Self> {
        match value {
            "Internal" => Some(TargetMode::Internal),
            "External" => Some(TargetMode::External),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TargetMode::Internal => "Internal",
            TargetMode::External => "External",
        }
    }
}

/// Where a relationship points to
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RelationshipTarget {
    /// A part inside the package
    Part(PartUri),
    /// An opaque URI outside the package, exactly as written
    External(String),
}

impl Relationship {
    /// Resolve the target against the folder of `source`.
    ///
    /// External targets are returned verbatim.
    pub fn resolve_target(&self, source: &RelationshipSource) -> Result<RelationshipTarget> {
        match self.target_mode {
            TargetMode::External => Ok(RelationshipTarget::External(self.target.clone())),
            TargetMode::Internal => {
                resolve_internal(source.base(), &self.target).map(RelationshipTarget::Part)
            }
        }
    }
}

/// Resolve a relative reference against a folder (ending in '/').
fn resolve_internal(base: &str, target: &str) -> Result<PartUri> {
    let path = target.split(['#', '?']).next().unwrap_or_default();
    if path.is_empty() {
        return Err(Error::InvalidRelationship(format!(
            "target '{}' does not name a part",
            target
        )));
    }

    let joined = if path.starts_with('/') {
        path.to_string()
    } else {
        format!("{}{}", base, path)
    };

    let mut segments: Vec<&str> = Vec::new();
    for segment in joined.split('/').skip(1) {
        match segment {
            "." => continue,
            ".." => {
                if segments.pop().is_none() {
                    return Err(Error::invalid_name(
                        target,
                        format!("target escapes the package root from '{}'", base),
                    ));
                }
            }
            s => segments.push(s),
        }
    }

    PartUri::new(&format!("/{}", segments.join("/")))
}

impl Relationships {
    /// Create empty relationships
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from XML bytes
    pub fn from_xml(xml: &[u8], source: &RelationshipSource) -> Result<Self> {
        Self::from_reader(xml, source)
    }

    /// Parse from a buffered reader
    ///
    /// `source` is only used to name the part in error messages.
    pub fn from_reader<R: BufRead>(reader: R, source: &RelationshipSource) -> Result<Self> {
        let part = source.relationships_uri().to_string();
        let mut reader = Reader::from_reader(reader);
        reader.config_mut().trim_text(true);

        let mut rels = Self::new();
        let mut buf = Vec::new();
        let mut depth = 0usize;
        let mut saw_root = false;

        loop {
            let event = reader
                .read_event_into(&mut buf)
                .map_err(|e| xml::malformed(&part, e))?;
            match event {
                Event::Start(e) => {
                    rels.parse_element(&e, depth, &part, &mut saw_root)?;
                    depth += 1;
                }
                Event::Empty(e) => rels.parse_element(&e, depth, &part, &mut saw_root)?,
                Event::End(_) => depth = depth.saturating_sub(1),
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }

        if !saw_root {
            return Err(Error::malformed(format!("{}: no <Relationships> element", part)));
        }

        rels.update_next_id();
        Ok(rels)
    }

    fn parse_element(
        &mut self,
        e: &BytesStart,
        depth: usize,
        part: &str,
        saw_root: &mut bool,
    ) -> Result<()> {
        let name = e.name();
        let local = name.local_name();

        if depth == 0 {
            if local.as_ref() != b"Relationships" {
                return Err(Error::malformed(format!(
                    "{}: unexpected root element <{}>",
                    part,
                    xml::element_name(e)
                )));
            }
            *saw_root = true;
            return Ok(());
        }

        if local.as_ref() == b"Relationship" {
            let rel = parse_relationship(e, part)?;
            if !self.ids.insert(rel.id.clone()) {
                return Err(Error::malformed(format!(
                    "{}: duplicate relationship Id '{}'",
                    part, rel.id
                )));
            }
            self.items.push(rel);
        }
        Ok(())
    }

    /// Serialize to XML bytes
    pub fn to_xml(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        self.write_to(&mut buf)?;
        Ok(buf)
    }

    /// Write to a writer, relationships in insertion order
    pub fn write_to<W: Write>(&self, writer: W) -> Result<()> {
        let mut xml = Writer::new(writer);

        xml.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), Some("yes"))))?;

        let mut rels_elem = BytesStart::new("Relationships");
        rels_elem.push_attribute(("xmlns", PR));
        xml.write_event(Event::Start(rels_elem))?;

        for rel in &self.items {
            let mut rel_elem = BytesStart::new("Relationship");
            rel_elem.push_attribute(("Id", rel.id.as_str()));
            rel_elem.push_attribute(("Type", rel.rel_type.as_str()));
            rel_elem.push_attribute(("Target", rel.target.as_str()));

            if rel.target_mode == TargetMode::External {
                rel_elem.push_attribute(("TargetMode", TargetMode::External.as_str()));
            }

            xml.write_event(Event::Empty(rel_elem))?;
        }

        xml.write_event(Event::End(BytesEnd::new("Relationships")))?;

        Ok(())
    }

    /// Get a relationship by ID
    pub fn get(&self, id: &str) -> Option<&Relationship> {
        self.items.iter().find(|r| r.id == id)
    }

    /// All relationships of a given type, in document order
    pub fn by_type<'a>(&'a self, rel_type: &'a str) -> impl Iterator<Item = &'a Relationship> {
        self.items.iter().filter(move |r| r.rel_type == rel_type)
    }

    /// First relationship of a given type
    pub fn first_by_type(&self, rel_type: &str) -> Option<&Relationship> {
        self.items.iter().find(|r| r.rel_type == rel_type)
    }

    /// Relationships grouped by type; each group keeps document order
    pub fn grouped_by_type(&self) -> BTreeMap<&str, Vec<&Relationship>> {
        let mut groups: BTreeMap<&str, Vec<&Relationship>> = BTreeMap::new();
        for rel in &self.items {
            groups.entry(rel.rel_type.as_str()).or_default().push(rel);
        }
        groups
    }

    /// Add an internal relationship (auto-generates ID)
    pub fn add(&mut self, rel_type: &str, target: &str) -> Result<String> {
        let id = self.generate_id()?;
        self.add_with_id(&id, rel_type, target, TargetMode::Internal)?;
        Ok(id)
    }

    /// Add an external relationship (auto-generates ID)
    pub fn add_external(&mut self, rel_type: &str, target: &str) -> Result<String> {
        let id = self.generate_id()?;
        self.add_with_id(&id, rel_type, target, TargetMode::External)?;
        Ok(id)
    }

    /// Add a relationship with a caller-supplied ID
    pub fn add_with_id(
        &mut self,
        id: &str,
        rel_type: &str,
        target: &str,
        mode: TargetMode,
    ) -> Result<()> {
        if id.is_empty() || rel_type.is_empty() || target.is_empty() {
            return Err(Error::InvalidRelationship(format!(
                "Id, Type and Target must be non-empty (Id '{}')",
                id
            )));
        }
        if self.ids.contains(id) {
            return Err(Error::InvalidRelationship(format!(
                "duplicate relationship Id '{}'",
                id
            )));
        }

        self.ids.insert(id.to_string());
        self.items.push(Relationship {
            id: id.to_string(),
            rel_type: rel_type.to_string(),
            target: target.to_string(),
            target_mode: mode,
        });
        if let Some(n) = rid_number(id) {
            self.next_id = self.next_id.max(n.saturating_add(1));
        }
        Ok(())
    }

    /// Remove a relationship by ID
    pub fn remove(&mut self, id: &str) -> Option<Relationship> {
        let pos = self.items.iter().position(|r| r.id == id)?;
        self.ids.remove(id);
        Some(self.items.remove(pos))
    }

    /// Iterate over all relationships in document order
    pub fn iter(&self) -> impl Iterator<Item = &Relationship> {
        self.items.iter()
    }

    /// Number of relationships
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Generate a new unique ID
    fn generate_id(&mut self) -> Result<String> {
        loop {
            let n = self.next_id;
            let id = format!("rId{}", n);
            if !self.ids.contains(&id) {
                self.next_id = n.saturating_add(1);
                return Ok(id);
            }
            self.next_id = n.checked_add(1).ok_or_else(|| {
                Error::InvalidRelationship(format!("no free relationship Id after rId{}", n))
            })?;
        }
    }

    /// Update next_id based on existing relationships
    fn update_next_id(&mut self) {
        let max_id = self
            .items
            .iter()
            .filter_map(|r| rid_number(&r.id))
            .max()
            .unwrap_or(0);

        self.next_id = max_id.saturating_add(1);
    }
}

fn rid_number(id: &str) -> Option<u32> {
    id.strip_prefix("rId")?.parse::<u32>().ok()
}

/// Parse a single Relationship element
fn parse_relationship(element: &BytesStart, part: &str) -> Result<Relationship> {
    let id = xml::required_attr(element, "Id", part)?;
    let rel_type = xml::required_attr(element, "Type", part)?;
    let target = xml::required_attr(element, "Target", part)?;
    let target_mode = match xml::get_attr(element, "TargetMode", part)? {
        None => TargetMode::Internal,
        Some(value) => TargetMode::parse(&value).ok_or_else(|| {
            Error::malformed(format!(
                "{}: relationship '{}' has invalid TargetMode '{}'",
                part, id, value
            ))
        })?,
    };

    Ok(Relationship {
        id,
        rel_type,
        target,
        target_mode,
    })
}

// Well-known package-level relationship types
pub mod rel_types {
    pub const OFFICE_DOCUMENT: &str =
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument";
    pub const CORE_PROPERTIES: &str =
        "http://schemas.openxmlformats.org/package/2006/relationships/metadata/core-properties";
    pub const THUMBNAIL: &str =
        "http://schemas.openxmlformats.org/package/2006/relationships/metadata/thumbnail";
    pub const DIGITAL_SIGNATURE_ORIGIN: &str =
        "http://schemas.openxmlformats.org/package/2006/relationships/digital-signature/origin";
    pub const IMAGE: &str =
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships/image";
    pub const HYPERLINK: &str =
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships/hyperlink";
    pub const STYLES: &str =
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles";
}
