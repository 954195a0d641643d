//! Physical package layer
//!
//! The logical reader and writer only talk to these traits. The ZIP
//! mapping lives in [`zip_container`]; interleaved parts are composed and
//! split in [`pieces`].

pub mod pieces;
pub mod zip_container;

use crate::error::Result;
use std::io::{Read, Write};

/// One entry of a physical container
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EntryInfo {
    /// Entry path, relative (no leading '/')
    pub name: String,
    /// Uncompressed size in bytes
    pub size: u64,
    /// Whether the entry is a directory marker
    pub is_dir: bool,
}

/// Read access to a physical container
pub trait PhysicalReader {
    /// Enumerate every entry. Called once, when a package is opened.
    fn list_entries(&mut self) -> Result<Vec<EntryInfo>>;

    /// Open an entry for streaming read.
    ///
    /// The returned stream borrows the container, so at most one entry is
    /// open at a time.
    fn open_entry(&mut self, name: &str) -> Result<Box<dyn Read + '_>>;
}

/// Sequential write access to a physical container.
///
/// Entries are written one after another: `start_entry`, any number of
/// `write` calls, `close_entry`. Writing outside an entry fails.
pub trait PhysicalWriter: Write {
    /// What the container hands back once finalized (usually the sink)
    type Output;

    /// Begin a new entry. Fails if another entry is still open.
    fn start_entry(&mut self, name: &str) -> Result<()>;

    /// Finish the current entry.
    ///
    /// Containers may defer the entry's trailer (sizes, checksum) until the
    /// next entry starts or the archive is finalized; no further bytes can
    /// be written to it either way.
    fn close_entry(&mut self) -> Result<()>;

    /// Write the container trailer. No writes are possible afterwards.
    fn finalize_archive(self) -> Result<Self::Output>
    where
        Self: Sized;
}
