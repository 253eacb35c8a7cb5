//! DMS track decompression.
//!
//! Implements the codecs used by DMS disk images: the "Heavy" LZH method with
//! state carried across tracks, and the RLE filter that runs on its own or as
//! a second stage after LZH.
//!
//! ## Compression Methods
//!
//! Every track header names one method:
//!
//! | Value | Name | Supported |
//! |-------|------|-----------|
//! | `0` | Uncompressed | ✅ |
//! | `1` | Simple (RLE) | ✅ |
//! | `2` | Quick | — |
//! | `3` | Medium | — |
//! | `4` | Deep | — |
//! | `5` | Heavy1 (4 KiB window) | ✅ |
//! | `6` | Heavy2 (8 KiB window) | ✅ |
//!
//! ## Architecture
//!
//! ```text
//! Track payload
//!       ↓
//! ┌─────────────┐
//! │ BitReader   │ ← MSB-first bit access
//! └─────────────┘
//!       ↓
//! ┌─────────────┐
//! │ HuffmanTree │ ← Code and offset trees, kept between tracks
//! └─────────────┘
//!       ↓
//! ┌─────────────┐
//! │ RingBuffer  │ ← Literals and back-references, kept between tracks
//! └─────────────┘
//!       ↓
//! ┌─────────────┐
//! │ RleFilter   │ ← Optional second stage (track flag 0x04)
//! └─────────────┘
//!       ↓
//! Track data
//! ```
//!
//! ## Example
//!
//! ```rust
//! use dms_stream::{HeavySession, HeavyVariant, PipelineParams, decode_heavy_track};
//!
//! // One session for all Heavy tracks of an image, in file order.
//! let mut session = HeavySession::new();
//! let params = PipelineParams {
//!     variant: HeavyVariant::Heavy1,
//!     reset_trees: true,
//!     rle: false,
//!     intermediate_len: 0,
//!     output_len: 4,
//! };
//! // Two zero-count trees, both naming literal 'A'.
//! let payload = ((b'A' as u32) << 14).to_be_bytes();
//! let out = decode_heavy_track(&mut session, &payload, &params).unwrap();
//! assert_eq!(out.data, b"AAAA");
//! ```

mod bit_reader;
mod heavy;
mod huffman;
mod lzss;
mod pipeline;
pub mod rle;


pub use bit_reader::{BitReader, MAX_BITS_PER_READ};
pub use heavy::{HeavyOutcome, HeavySession, HeavyVariant, SessionState};
pub use huffman::{DecodeStep, HuffmanTree, MAX_NODES, MAX_TREE_DEPTH};
pub use lzss::{BoundedOutput, OutputSink, RingBuffer, WINDOW_SIZE_HEAVY1, WINDOW_SIZE_HEAVY2};
pub use pipeline::{decode_heavy_track, PipelineOutput, PipelineParams};
pub use rle::{RleFilter, RLE_MARKER};

use thiserror::Error;

/// Decompression errors.
#[derive(Debug, Error)]
pub enum DecompressError {
    #[error("Unexpected end of data")]
    UnexpectedEof,
    #[error("Invalid Huffman code")]
    InvalidHuffmanCode,
    #[error("Bit read too wide: {0} bits")]
    BitWidthTooLarge(u32),
    #[error("Huffman tree node limit exceeded")]
    TreeOverflow,
    #[error("Inconsistent Huffman code lengths at length {length}")]
    InconsistentCodeLengths { length: u32 },
    #[error("Unsupported compression method: {0}")]
    UnsupportedMethod(u8),
    #[error("Heavy decompression disabled by an earlier failure")]
    SessionPoisoned,
    #[error("Track goes beyond end of file")]
    TrackOutOfBounds,
    #[error("Expected {expected} decompressed bytes, got {got}")]
    OutputTooShort { expected: usize, got: usize },
}

impl DecompressError {
    /// True for errors that make the rest of the file untrustworthy, not just
    /// the current track.
    pub fn is_structural(&self) -> bool {
        matches!(self, Self::TreeOverflow)
    }
}

pub type Result<T> = std::result::Result<T, DecompressError>;

/// Track compression methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CompressionMethod {
    /// Stored as-is
    Uncompressed = 0,
    /// RLE only
    Simple = 1,
    Quick = 2,
    Medium = 3,
    Deep = 4,
    /// LZH with a 4 KiB window
    Heavy1 = 5,
    /// LZH with an 8 KiB window
    Heavy2 = 6,
}

impl CompressionMethod {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(Self::Uncompressed),
            1 => Some(Self::Simple),
            2 => Some(Self::Quick),
            3 => Some(Self::Medium),
            4 => Some(Self::Deep),
            5 => Some(Self::Heavy1),
            6 => Some(Self::Heavy2),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Uncompressed => "uncompressed",
            Self::Simple => "simple (RLE)",
            Self::Quick => "quick",
            Self::Medium => "medium",
            Self::Deep => "deep (LZH)",
            Self::Heavy1 => "heavy1",
            Self::Heavy2 => "heavy2",
        }
    }

    /// Name of a raw method byte, `"?"` if unknown.
    pub fn name_of(v: u8) -> &'static str {
        Self::from_u8(v).map_or("?", Self::name)
    }

    /// Whether the method uses the shared Heavy session.
    pub fn is_heavy(self) -> bool {
        matches!(self, Self::Heavy1 | Self::Heavy2)
    }

    pub fn heavy_variant(self) -> Option<HeavyVariant> {
        HeavyVariant::from_method(self as u8)
    }
}
