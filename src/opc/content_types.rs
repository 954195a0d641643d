//! Content Types handling for OPC packages
//!
//! Parses and generates `[Content_Types].xml`

use crate::error::{Error, Result};
use crate::opc::PartUri;
use crate::xml::{self, CT};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, Event};
use quick_xml::{Reader, Writer};
use std::collections::BTreeMap;
use std::io::{BufRead, Write};

const PART: &str = "[Content_Types].xml";

/// Content types declaration for an OPC package
///
/// Both maps are ordered so serialization is reproducible.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ContentTypes {
    /// Default extension mappings (lower-cased extension -> content type)
    defaults: BTreeMap<String, String>,
    /// Override mappings (part name -> content type)
    overrides: BTreeMap<PartUri, String>,
}

impl ContentTypes {
    /// Create a new ContentTypes with the standard package defaults
    pub fn new() -> Self {
        let mut ct = Self::default();
        ct.defaults.insert("rels".into(), RELATIONSHIPS.into());
        ct.defaults.insert("xml".into(), XML.into());
        ct
    }

    /// Parse from XML bytes
    pub fn from_xml(xml: &[u8]) -> Result<Self> {
        Self::from_reader(xml)
    }

    /// Parse from a buffered reader
    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self> {
        let mut reader = Reader::from_reader(reader);
        reader.config_mut().trim_text(true);

        let mut ct = Self::default();
        let mut buf = Vec::new();
        let mut depth = 0usize;
        let mut saw_root = false;

        loop {
            let event = reader
                .read_event_into(&mut buf)
                .map_err(|e| xml::malformed(PART, e))?;
            match event {
                Event::Start(e) if depth == 0 => {
                    check_root(&e, &mut saw_root)?;
                    depth += 1;
                }
                Event::Empty(e) if depth == 0 => {
                    check_root(&e, &mut saw_root)?;
                }
                Event::Start(e) => {
                    ct.parse_entry(&e)?;
                    depth += 1;
                }
                Event::Empty(e) => ct.parse_entry(&e)?,
                Event::End(_) => depth = depth.saturating_sub(1),
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }

        if !saw_root {
            return Err(Error::malformed(format!("{}: no <Types> element", PART)));
        }

        Ok(ct)
    }

    fn parse_entry(&mut self, e: &BytesStart) -> Result<()> {
        match e.name().local_name().as_ref() {
            b"Default" => {
                let ext = xml::required_attr(e, "Extension", PART)?;
                let content_type = xml::required_attr(e, "ContentType", PART)?;
                validate_media_type(&content_type)
                    .map_err(|err| xml::malformed(PART, err))?;
                let key = ext.to_lowercase();
                if self.defaults.insert(key, content_type).is_some() {
                    return Err(Error::malformed(format!(
                        "{}: duplicate Default for extension '{}'",
                        PART, ext
                    )));
                }
            }
            b"Override" => {
                let part_name = xml::required_attr(e, "PartName", PART)?;
                let content_type = xml::required_attr(e, "ContentType", PART)?;
                validate_media_type(&content_type)
                    .map_err(|err| xml::malformed(PART, err))?;
                let uri = PartUri::new(&part_name).map_err(|err| xml::malformed(PART, err))?;
                if self.overrides.insert(uri, content_type).is_some() {
                    return Err(Error::malformed(format!(
                        "{}: duplicate Override for part '{}'",
                        PART, part_name
                    )));
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// Serialize to XML bytes
    pub fn to_xml(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        self.write_to(&mut buf)?;
        Ok(buf)
    }

    /// Write to a writer
    ///
    /// Defaults come first sorted by extension, then overrides sorted by
    /// normalized part name.
    pub fn write_to<W: Write>(&self, writer: W) -> Result<()> {
        let mut xml = Writer::new(writer);

        xml.write_event(Event::Decl(BytesDecl::new(
            "1.0",
            Some("UTF-8"),
            Some("yes"),
        )))?;

        let mut types = BytesStart::new("Types");
        types.push_attribute(("xmlns", CT));
        xml.write_event(Event::Start(types))?;

        for (ext, content_type) in &self.defaults {
            let mut default = BytesStart::new("Default");
            default.push_attribute(("Extension", ext.as_str()));
            default.push_attribute(("ContentType", content_type.as_str()));
            xml.write_event(Event::Empty(default))?;
        }

        for (uri, content_type) in &self.overrides {
            let mut override_elem = BytesStart::new("Override");
            override_elem.push_attribute(("PartName", uri.as_str()));
            override_elem.push_attribute(("ContentType", content_type.as_str()));
            xml.write_event(Event::Empty(override_elem))?;
        }

        xml.write_event(Event::End(BytesEnd::new("Types")))?;

        Ok(())
    }

    /// Set the default content type for an extension (last write wins)
    pub fn set_default(&mut self, extension: &str, content_type: &str) -> Result<()> {
        if extension.is_empty() {
            return Err(Error::InvalidContentType(
                "Default entries need a non-empty extension".into(),
            ));
        }
        validate_media_type(content_type)?;
        self.defaults
            .insert(extension.to_lowercase(), content_type.to_string());
        Ok(())
    }

    /// Set the content type override for a part (last write wins)
    pub fn set_override(&mut self, uri: &PartUri, content_type: &str) -> Result<()> {
        validate_media_type(content_type)?;
        // Re-insert so the latest spelling of the name is kept
        self.overrides.remove(uri);
        self.overrides.insert(uri.clone(), content_type.to_string());
        Ok(())
    }

    /// Remove an override
    pub fn remove_override(&mut self, uri: &PartUri) -> Option<String> {
        self.overrides.remove(uri)
    }

    /// Get the content type for a part, if declared
    pub fn get(&self, uri: &PartUri) -> Option<&str> {
        if let Some(ct) = self.overrides.get(uri) {
            return Some(ct);
        }

        uri.extension()
            .and_then(|ext| self.defaults.get(&ext.to_lowercase()))
            .map(|s| s.as_str())
    }

    /// Resolve the content type for a part: override first, then default
    pub fn resolve(&self, uri: &PartUri) -> Result<&str> {
        self.get(uri)
            .ok_or_else(|| Error::UnresolvedContentType(uri.to_string()))
    }

    /// Default entries, sorted by extension
    pub fn defaults(&self) -> impl Iterator<Item = (&str, &str)> {
        self.defaults.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Override entries, sorted by part name
    pub fn overrides(&self) -> impl Iterator<Item = (&PartUri, &str)> {
        self.overrides.iter().map(|(k, v)| (k, v.as_str()))
    }
}

fn check_root(e: &BytesStart, saw_root: &mut bool) -> Result<()> {
    if e.name().local_name().as_ref() != b"Types" {
        return Err(Error::malformed(format!(
            "{}: unexpected root element <{}>",
            PART,
            xml::element_name(e)
        )));
    }
    *saw_root = true;
    Ok(())
}

fn is_token(s: &str) -> bool {
    !s.is_empty()
        && s.bytes().all(|b| {
            b.is_ascii_alphanumeric()
                || matches!(
                    b,
                    b'!' | b'#' | b'$' | b'%' | b'&' | b'\'' | b'*' | b'+' | b'-' | b'.' | b'^' | b'_' | b'`' | b'|' | b'~'
                )
        })
}

/// Check `type/subtype` syntax; parameters after ';' must be `name=value`.
pub fn validate_media_type(content_type: &str) -> Result<()> {
    let mut sections = content_type.split(';');
    let essence = sections.next().unwrap_or_default().trim();
    let valid_essence = essence
        .split_once('/')
        .map_or(false, |(ty, sub)| is_token(ty) && is_token(sub));
    let valid_params = sections.all(|param| {
        param
            .trim()
            .split_once('=')
            .map_or(false, |(name, value)| is_token(name) && !value.is_empty())
    });

    if valid_essence && valid_params {
        Ok(())
    } else {
        Err(Error::InvalidContentType(content_type.to_string()))
    }
}

// Well-known content types
pub const RELATIONSHIPS: &str = "application/vnd.openxmlformats-package.relationships+xml";
pub const XML: &str = "application/xml";
