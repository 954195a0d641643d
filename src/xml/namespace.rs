//! XML namespaces used by package-level parts

/// Content Types namespace
pub const CT: &str = "http://schemas.openxmlformats.org/package/2006/content-types";
/// Package Relationships namespace
pub const PR: &str = "http://schemas.openxmlformats.org/package/2006/relationships";
