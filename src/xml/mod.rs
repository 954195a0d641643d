//! XML helpers shared by the content types and relationships parsers

mod namespace;

pub use namespace::*;

use crate::error::{Error, Result};
use quick_xml::events::BytesStart;

/// Get the unescaped value of an attribute, matched by local name.
///
/// `part` names the part being parsed, for error messages.
pub fn get_attr(element: &BytesStart, name: &str, part: &str) -> Result<Option<String>> {
    for attr in element.attributes() {
        let attr = attr.map_err(|e| malformed(part, e))?;
        if attr.key.local_name().as_ref() == name.as_bytes() {
            let value = attr.unescape_value().map_err(|e| malformed(part, e))?;
            return Ok(Some(value.into_owned()));
        }
    }
    Ok(None)
}

/// Get a required, non-empty attribute
pub fn required_attr(element: &BytesStart, name: &str, part: &str) -> Result<String> {
    match get_attr(element, name, part)? {
        Some(value) if !value.is_empty() => Ok(value),
        Some(_) => Err(Error::malformed(format!(
            "{}: attribute '{}' on <{}> is empty",
            part,
            name,
            element_name(element)
        ))),
        None => Err(Error::malformed(format!(
            "{}: missing attribute '{}' on <{}>",
            part,
            name,
            element_name(element)
        ))),
    }
}

/// Local name of an element as a string
pub fn element_name(element: &BytesStart) -> String {
    String::from_utf8_lossy(element.name().local_name().as_ref()).into_owned()
}

/// Wrap an XML syntax error met while parsing a package part
pub fn malformed(part: &str, err: impl std::fmt::Display) -> Error {
    Error::malformed(format!("{}: {}", part, err))
}
