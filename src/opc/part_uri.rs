//! Part name handling for OPC packages
//!
//! Part names are absolute-path URI references (`/word/document.xml`).
//! They are kept in a canonical percent-encoded form and compared
//! case-insensitively.

use crate::error::{Error, Result};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Physical name of the content types part
pub const CONTENT_TYPES_ENTRY: &str = "[Content_Types].xml";

const PIECE_SUFFIX: &str = ".piece";
const LAST_MARKER: &str = ".last";

/// Represents a normalized part name within an OPC package.
///
/// Part names always start with '/', have no empty segments and no
/// segments ending in '.'. Characters outside the URI `pchar` set are
/// percent-encoded with upper-case hex digits; escapes of unreserved
/// characters are decoded. Equality, hashing and ordering ignore ASCII case.
/// Example: `/word/document.xml`
#[derive(Clone, Debug)]
pub struct PartUri {
    path: String,
    key: String,
}

impl PartUri {
    /// Validate and normalize a part name.
    pub fn new(name: &str) -> Result<Self> {
        if name.is_empty() {
            return Err(Error::invalid_name(name, "empty part name"));
        }
        if !name.starts_with('/') {
            return Err(Error::invalid_name(name, "part names must start with '/'"));
        }
        if name == "/" {
            return Err(Error::invalid_name(
                name,
                "'/' is reserved for the package root",
            ));
        }
        if name.ends_with('/') {
            return Err(Error::invalid_name(name, "part names must not end with '/'"));
        }

        let mut path = String::with_capacity(name.len());
        for segment in name[1..].split('/') {
            if segment.is_empty() {
                return Err(Error::invalid_name(name, "empty segment"));
            }
            let encoded = normalize_segment(name, segment)?;
            if encoded.ends_with('.') {
                return Err(Error::invalid_name(
                    name,
                    format!("segment '{}' must not end with '.'", segment),
                ));
            }
            path.push('/');
            path.push_str(&encoded);
        }

        let key = path.to_ascii_lowercase();
        Ok(Self { path, key })
    }

    /// Map a physical container entry (relative path) to a part name.
    pub fn from_entry_name(entry: &str) -> Result<Self> {
        Self::new(&format!("/{}", entry))
    }

    /// Get the path as a string slice
    pub fn as_str(&self) -> &str {
        &self.path
    }

    /// The container entry path for this part (leading '/' stripped).
    pub fn entry_name(&self) -> &str {
        &self.path[1..]
    }

    /// Get the file name portion
    pub fn file_name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or_default()
    }

    /// Get the file extension, if the last segment has one
    pub fn extension(&self) -> Option<&str> {
        self.file_name()
            .rsplit_once('.')
            .map(|(_, ext)| ext)
            .filter(|ext| !ext.is_empty())
    }

    /// The folder containing this part, always ending with '/'.
    ///
    /// `/word/document.xml` has base `/word/`, `/a.xml` has base `/`.
    pub fn base(&self) -> &str {
        let pos = self.path.rfind('/').unwrap_or(0);
        &self.path[..=pos]
    }

    /// Get the relationships part name for this part.
    ///
    /// For `/word/document.xml`, returns `/word/_rels/document.xml.rels`
    pub fn relationships_uri(&self) -> PartUri {
        let path = format!("{}_rels/{}.rels", self.base(), self.file_name());
        let key = path.to_ascii_lowercase();
        PartUri { path, key }
    }

    /// Check if this name designates a relationships part
    pub fn is_relationships(&self) -> bool {
        let Some(rest) = self.key.strip_suffix(".rels") else {
            return false;
        };
        match rest.rfind('/') {
            Some(pos) => rest[..pos].ends_with("/_rels"),
            None => false,
        }
    }

    /// Physical entry name of one piece of this part when interleaved.
    ///
    /// `/word/document.xml`, 0, false gives `word/document.xml/[0].piece`.
    pub fn piece_entry_name(&self, index: u32, is_last: bool) -> String {
        let marker = if is_last { LAST_MARKER } else { "" };
        format!("{}/[{}]{}{}", self.entry_name(), index, marker, PIECE_SUFFIX)
    }
}

impl PartialEq for PartUri {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for PartUri {}

impl Hash for PartUri {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

impl PartialOrd for PartUri {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PartUri {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key.cmp(&other.key)
    }
}

impl fmt::Display for PartUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path)
    }
}

impl std::str::FromStr for PartUri {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        PartUri::new(s)
    }
}

impl AsRef<str> for PartUri {
    fn as_ref(&self) -> &str {
        &self.path
    }
}

/// A physical entry recognized as one piece of an interleaved part
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PieceEntry {
    /// Logical part the piece belongs to
    pub part: PartUri,
    /// Position of the piece in the part's byte stream
    pub index: u32,
    /// Whether this is the terminal `.last` piece
    pub is_last: bool,
}

impl PieceEntry {
    /// Classify a container entry name.
    ///
    /// Returns `None` for plain entries. A name shaped like a piece whose
    /// logical prefix is not a valid part name is an error.
    pub fn parse(entry: &str) -> Option<Result<Self>> {
        let lower = entry.to_ascii_lowercase();
        let stem = lower.strip_suffix(PIECE_SUFFIX)?;
        let (stem, is_last) = match stem.strip_suffix(LAST_MARKER) {
            Some(s) => (s, true),
            None => (stem, false),
        };
        let stem = stem.strip_suffix(']')?;
        let open = stem.rfind("/[")?;
        let digits = &stem[open + 2..];
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let index = match digits.parse::<u32>() {
            Ok(index) => index,
            Err(_) => {
                return Some(Err(Error::malformed(format!(
                    "piece index out of range in entry '{}'",
                    entry
                ))))
            }
        };

        // Slice the original entry so the part name keeps its case
        Some(PartUri::from_entry_name(&entry[..open]).map(|part| PieceEntry {
            part,
            index,
            is_last,
        }))
    }
}

fn is_unreserved(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'-' | b'.' | b'_' | b'~')
}

fn is_pchar(b: u8) -> bool {
    is_unreserved(b)
        || matches!(
            b,
            b'!' | b'$' | b'&' | b'\'' | b'(' | b')' | b'*' | b'+' | b',' | b';' | b'=' | b':' | b'@'
        )
}

fn hex_value(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

fn push_escape(out: &mut String, b: u8) {
    const HEX: &[u8; 16] = b"0123456789ABCDEF";
    out.push('%');
    out.push(HEX[(b >> 4) as usize] as char);
    out.push(HEX[(b & 0x0f) as usize] as char);
}

/// Canonical percent-encoding of one segment.
fn normalize_segment(name: &str, segment: &str) -> Result<String> {
    let bytes = segment.as_bytes();
    let mut out = String::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        if b == b'%' {
            let decoded = bytes
                .get(i + 1)
                .and_then(|&h| hex_value(h))
                .zip(bytes.get(i + 2).and_then(|&l| hex_value(l)))
                .map(|(h, l)| (h << 4) | l)
                .ok_or_else(|| {
                    Error::invalid_name(
                        name,
                        format!("segment '{}' has a malformed percent-encoding", segment),
                    )
                })?;
            if decoded == b'/' || decoded == b'\\' {
                return Err(Error::invalid_name(
                    name,
                    format!("segment '{}' encodes '/' or '\\'", segment),
                ));
            }
            if is_unreserved(decoded) {
                out.push(decoded as char);
            } else {
                push_escape(&mut out, decoded);
            }
            i += 3;
        } else {
            if is_pchar(b) {
                out.push(b as char);
            } else {
                push_escape(&mut out, b);
            }
            i += 1;
        }
    }

    Ok(out)
}

/// Well-known part names
pub mod well_known {
    use super::PartUri;

    fn known(path: &str) -> PartUri {
        PartUri {
            path: path.to_string(),
            key: path.to_ascii_lowercase(),
        }
    }

    /// Root relationships part
    pub fn package_rels() -> PartUri {
        known("/_rels/.rels")
    }
}
