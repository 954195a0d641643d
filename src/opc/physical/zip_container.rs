//! ZIP mapping of the physical package layer

use crate::error::{Error, Result};
use crate::opc::options::Compression;
use crate::opc::physical::{EntryInfo, PhysicalReader, PhysicalWriter};
use std::io::{self, Read, Seek, Write};
use zip::read::ZipArchive;
use zip::write::{SimpleFileOptions, ZipWriter};
use zip::CompressionMethod;

/// Reads entries from a ZIP archive
pub struct ZipContainerReader<R: Read + Seek> {
    archive: ZipArchive<R>,
}

impl<R: Read + Seek> ZipContainerReader<R> {
    /// Open the archive's central directory
    pub fn new(reader: R) -> Result<Self> {
        Ok(Self {
            archive: ZipArchive::new(reader)?,
        })
    }

    /// Give back the underlying reader
    pub fn into_inner(self) -> R {
        self.archive.into_inner()
    }
}

impl<R: Read + Seek> PhysicalReader for ZipContainerReader<R> {
    fn list_entries(&mut self) -> Result<Vec<EntryInfo>> {
        let mut entries = Vec::with_capacity(self.archive.len());
        for i in 0..self.archive.len() {
            // raw access skips decompression setup, only metadata is needed
            let file = self.archive.by_index_raw(i)?;
            entries.push(EntryInfo {
                name: file.name().to_string(),
                size: file.size(),
                is_dir: file.is_dir(),
            });
        }
        Ok(entries)
    }

    fn open_entry(&mut self, name: &str) -> Result<Box<dyn Read + '_>> {
        let file = self.archive.by_name(name)?;
        Ok(Box::new(file))
    }
}

/// Writes entries into a ZIP archive, one at a time
pub struct ZipContainerWriter<W: Write + Seek> {
    zip: ZipWriter<W>,
    options: SimpleFileOptions,
    /// Entry currently being written
    current: Option<String>,
}

impl<W: Write + Seek> ZipContainerWriter<W> {
    pub fn new(inner: W, compression: Compression) -> Self {
        let method = match compression {
            Compression::Stored => CompressionMethod::Stored,
            Compression::Deflated => CompressionMethod::Deflated,
        };
        Self {
            zip: ZipWriter::new(inner),
            options: SimpleFileOptions::default().compression_method(method),
            current: None,
        }
    }
}

impl<W: Write + Seek> Write for ZipContainerWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.current.is_none() {
            return Err(Error::NoOpenPart.into());
        }
        self.zip.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.zip.flush()
    }
}

impl<W: Write + Seek> PhysicalWriter for ZipContainerWriter<W> {
    type Output = W;

    fn start_entry(&mut self, name: &str) -> Result<()> {
        if let Some(current) = &self.current {
            return Err(Error::PartStillOpen(current.clone()));
        }
        self.zip.start_file(name, self.options)?;
        self.current = Some(name.to_string());
        Ok(())
    }

    fn close_entry(&mut self) -> Result<()> {
        // The zip writer patches sizes and CRC into the local header when
        // the next entry starts or the archive is finished.
        self.current.take().ok_or(Error::NoOpenPart)?;
        Ok(())
    }

    fn finalize_archive(self) -> Result<W> {
        if let Some(current) = self.current {
            return Err(Error::PartStillOpen(current));
        }
        Ok(self.zip.finish()?)
    }
}
