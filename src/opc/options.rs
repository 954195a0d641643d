//! Writer configuration

/// Compression applied to every archive entry
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Compression {
    /// No compression
    Stored,
    /// Deflate (the usual choice for OPC packages)
    #[default]
    Deflated,
}

/// Default size of one piece when a part is written interleaved
pub const DEFAULT_PIECE_SIZE: usize = 64 * 1024;

/// Options for [`PackageWriter`](crate::opc::PackageWriter)
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WriterOptions {
    /// Compression of archive entries
    pub compression: Compression,
    /// Maximum number of bytes per piece of an interleaved part
    pub piece_size: usize,
}

impl Default for WriterOptions {
    fn default() -> Self {
        Self {
            compression: Compression::default(),
            piece_size: DEFAULT_PIECE_SIZE,
        }
    }
}

impl WriterOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the entry compression
    pub fn compression(mut self, compression: Compression) -> Self {
        self.compression = compression;
        self
    }

    /// Set the piece size for interleaved parts (at least one byte)
    pub fn piece_size(mut self, piece_size: usize) -> Self {
        self.piece_size = piece_size.max(1);
        self
    }
}
