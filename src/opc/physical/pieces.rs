//! Interleaved parts
//!
//! A part may be stored as a sequence of pieces `<name>/[0].piece`,
//! `<name>/[1].piece`, ..., `<name>/[n].last.piece`. This module groups
//! container entries into parts, validates piece sequences, reads them back
//! as one stream and splits a written stream into pieces.

use crate::error::{Error, Result};
use crate::opc::part_uri::{PieceEntry, CONTENT_TYPES_ENTRY};
use crate::opc::physical::{EntryInfo, PhysicalReader, PhysicalWriter};
use crate::opc::PartUri;
use log::{debug, warn};
use std::collections::BTreeMap;
use std::io::{self, Cursor, Read, Write};

/// How a logical part is stored in the container
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PartLayout {
    /// One plain entry
    Single { entry: String, size: u64 },
    /// A piece sequence, validated when the part is opened
    Interleaved(PieceSequence),
    /// Several entries map to the same part name
    Ambiguous(Vec<String>),
}

impl PartLayout {
    /// Total size, if the layout is usable
    pub fn size(&self) -> Option<u64> {
        match self {
            PartLayout::Single { size, .. } => Some(*size),
            PartLayout::Interleaved(seq) => Some(seq.size()),
            PartLayout::Ambiguous(_) => None,
        }
    }

    fn entry_names(&self) -> Vec<String> {
        match self {
            PartLayout::Single { entry, .. } => vec![entry.clone()],
            PartLayout::Interleaved(seq) => seq.pieces.iter().map(|p| p.entry.clone()).collect(),
            PartLayout::Ambiguous(entries) => entries.clone(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct Piece {
    index: u32,
    is_last: bool,
    entry: String,
    size: u64,
}

/// The piece entries found for one part, in container order
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PieceSequence {
    pieces: Vec<Piece>,
}

impl PieceSequence {
    fn push(&mut self, piece: PieceEntry, entry: String, size: u64) {
        self.pieces.push(Piece {
            index: piece.index,
            is_last: piece.is_last,
            entry,
            size,
        });
    }

    /// Sum of all piece sizes
    pub fn size(&self) -> u64 {
        self.pieces.iter().map(|p| p.size).sum()
    }

    /// Number of piece entries
    pub fn len(&self) -> usize {
        self.pieces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pieces.is_empty()
    }

    /// Entry names in piece order.
    ///
    /// Indices must run from 0 without gaps or duplicates and end with
    /// exactly one `.last` piece.
    pub fn ordered_entries(&self, part: &PartUri) -> Result<Vec<String>> {
        let mut sorted: Vec<&Piece> = self.pieces.iter().collect();
        sorted.sort_by_key(|p| p.index);

        for (expected, piece) in sorted.iter().enumerate() {
            let expected = expected as u64;
            let index = u64::from(piece.index);
            if index < expected {
                return Err(Error::malformed(format!(
                    "part {}: duplicate piece {}",
                    part, piece.index
                )));
            }
            if index > expected {
                return Err(Error::malformed(format!(
                    "part {}: piece {} is missing",
                    part, expected
                )));
            }
            let is_final = index + 1 == sorted.len() as u64;
            if piece.is_last && !is_final {
                return Err(Error::malformed(format!(
                    "part {}: piece {} follows the last piece",
                    part,
                    piece.index + 1
                )));
            }
            if is_final && !piece.is_last {
                return Err(Error::malformed(format!(
                    "part {}: no last piece after piece {}",
                    part, piece.index
                )));
            }
        }

        Ok(sorted.into_iter().map(|p| p.entry.clone()).collect())
    }
}

/// Result of classifying every container entry
#[derive(Clone, Debug, Default)]
pub struct EntryIndex {
    /// Part layouts keyed by normalized part name
    pub parts: BTreeMap<PartUri, PartLayout>,
    /// Physical name of the content types entry, if present
    pub content_types: Option<String>,
}

/// Group container entries into logical parts.
///
/// Piece sequences are collected but not validated here. Entries whose
/// names cannot be mapped to part names are skipped with a warning.
pub fn index_entries(entries: Vec<EntryInfo>) -> EntryIndex {
    let mut index = EntryIndex::default();

    for entry in entries {
        if entry.is_dir || entry.name.ends_with('/') {
            continue;
        }
        if entry.name.eq_ignore_ascii_case(CONTENT_TYPES_ENTRY) {
            index.content_types = Some(entry.name);
            continue;
        }

        match PieceEntry::parse(&entry.name) {
            Some(Ok(piece)) => {
                let part = piece.part.clone();
                match index.parts.get_mut(&part) {
                    Some(PartLayout::Interleaved(seq)) => seq.push(piece, entry.name, entry.size),
                    Some(other) => {
                        let mut names = other.entry_names();
                        names.push(entry.name);
                        *other = PartLayout::Ambiguous(names);
                    }
                    None => {
                        let mut seq = PieceSequence::default();
                        seq.push(piece, entry.name, entry.size);
                        index.parts.insert(part, PartLayout::Interleaved(seq));
                    }
                }
            }
            Some(Err(e)) => warn!("skipping piece entry '{}': {}", entry.name, e),
            None => match PartUri::from_entry_name(&entry.name) {
                Ok(part) => match index.parts.get_mut(&part) {
                    Some(other) => {
                        let mut names = other.entry_names();
                        names.push(entry.name);
                        *other = PartLayout::Ambiguous(names);
                    }
                    None => {
                        index.parts.insert(
                            part,
                            PartLayout::Single {
                                entry: entry.name,
                                size: entry.size,
                            },
                        );
                    }
                },
                Err(e) => warn!("skipping entry '{}': {}", entry.name, e),
            },
        }
    }

    debug!(
        "indexed {} parts ({} interleaved)",
        index.parts.len(),
        index
            .parts
            .values()
            .filter(|l| matches!(l, PartLayout::Interleaved(_)))
            .count()
    );
    index
}

enum PieceState {
    /// Draining a loaded piece
    InPiece { index: usize, data: Cursor<Vec<u8>> },
    /// Between pieces; `next` is the piece to load
    AtBoundary { next: usize },
    Done,
}

/// Forward-only stream over the pieces of one part.
///
/// Each piece is loaded whole when the stream reaches it, since an entry
/// stream borrows the container and the next piece needs it again. Memory
/// use is therefore bounded by the largest piece, not by the part.
pub struct PieceReader<'a, C: PhysicalReader + ?Sized> {
    container: &'a mut C,
    entries: Vec<String>,
    state: PieceState,
}

impl<'a, C: PhysicalReader + ?Sized> PieceReader<'a, C> {
    /// `entries` must already be in validated piece order
    pub fn new(container: &'a mut C, entries: Vec<String>) -> Self {
        let state = if entries.is_empty() {
            PieceState::Done
        } else {
            PieceState::AtBoundary { next: 0 }
        };
        Self {
            container,
            entries,
            state,
        }
    }

    fn load(&mut self, index: usize) -> Result<Vec<u8>> {
        let mut entry = self.container.open_entry(&self.entries[index])?;
        let mut data = Vec::new();
        entry.read_to_end(&mut data)?;
        Ok(data)
    }
}

impl<C: PhysicalReader + ?Sized> Read for PieceReader<'_, C> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        loop {
            match &mut self.state {
                PieceState::InPiece { index, data } => {
                    let n = data.read(buf)?;
                    if n > 0 {
                        return Ok(n);
                    }
                    let next = *index + 1;
                    self.state = if next < self.entries.len() {
                        PieceState::AtBoundary { next }
                    } else {
                        PieceState::Done
                    };
                }
                PieceState::AtBoundary { next } => {
                    let index = *next;
                    let data = self.load(index)?;
                    self.state = PieceState::InPiece {
                        index,
                        data: Cursor::new(data),
                    };
                }
                PieceState::Done => return Ok(0),
            }
        }
    }
}

/// Splits one part's byte stream into piece entries.
///
/// Pieces are cut every `piece_size` bytes and wherever the caller asks
/// for a boundary; the remainder becomes the `.last` piece on finish.
#[derive(Debug)]
pub struct PieceWriter {
    part: PartUri,
    piece_size: usize,
    next_index: u32,
    buffer: Vec<u8>,
}

impl PieceWriter {
    pub fn new(part: PartUri, piece_size: usize) -> Self {
        Self {
            part,
            piece_size: piece_size.max(1),
            next_index: 0,
            buffer: Vec::new(),
        }
    }

    /// Part being written
    pub fn part(&self) -> &PartUri {
        &self.part
    }

    /// Buffer `data`, emitting every piece that is full and not the last
    pub fn write<W: PhysicalWriter + ?Sized>(&mut self, container: &mut W, data: &[u8]) -> Result<()> {
        self.buffer.extend_from_slice(data);
        // Strictly greater: a full final chunk is kept for the last piece
        while self.buffer.len() > self.piece_size {
            self.emit(container, self.piece_size, false)?;
        }
        Ok(())
    }

    /// End the current piece here, if it has any bytes
    pub fn cut<W: PhysicalWriter + ?Sized>(&mut self, container: &mut W) -> Result<()> {
        if !self.buffer.is_empty() {
            self.emit(container, self.buffer.len(), false)?;
        }
        Ok(())
    }

    /// Write the remaining bytes as the last piece; returns the piece count
    pub fn finish<W: PhysicalWriter + ?Sized>(mut self, container: &mut W) -> Result<u32> {
        self.emit(container, self.buffer.len(), true)?;
        Ok(self.next_index)
    }

    fn emit<W: PhysicalWriter + ?Sized>(&mut self, container: &mut W, len: usize, is_last: bool) -> Result<()> {
        let name = self.part.piece_entry_name(self.next_index, is_last);
        container.start_entry(&name)?;
        container.write_all(&self.buffer[..len])?;
        container.close_entry()?;
        self.buffer.drain(..len);
        self.next_index += 1;
        Ok(())
    }
}
