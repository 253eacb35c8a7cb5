//! Error types for DMS parsing and extraction.
//!
//! This module provides the [`DmsError`] type which covers everything that can
//! go wrong when opening a DMS image or extracting its tracks.
//!
//! ## Error Categories
//!
//! | Category | Errors | Description |
//! |----------|--------|-------------|
//! | Format | [`InvalidSignature`], [`BufferTooSmall`], [`InvalidTrackRange`] | File is not a valid DMS image |
//! | Structure | [`TooManyTracks`], [`MissingTrack`], [`TracksOutOfOrder`] | Track layout cannot be decoded; fatal for the whole file |
//! | Track | [`Decompress`], [`ChecksumMismatch`] | One track could not be recovered |
//! | Unsupported | [`EncryptedNotSupported`] | Image uses a feature this crate lacks |
//! | I/O | [`Io`], [`InvalidOffset`] | Read/write errors |
//!
//! ## Example
//!
//! ```rust,ignore
//! use dms_stream::{DmsArchive, DmsError};
//!
//! match DmsArchive::open(data) {
//!     Ok(archive) => println!("{} tracks", archive.tracks().len()),
//!     Err(DmsError::InvalidSignature) => eprintln!("Not a DMS file"),
//!     Err(DmsError::MissingTrack(n)) => eprintln!("Track {} is missing", n),
//!     Err(e) => eprintln!("Error: {}", e),
//! }
//! ```
//!
//! [`InvalidSignature`]: DmsError::InvalidSignature
//! [`BufferTooSmall`]: DmsError::BufferTooSmall
//! [`InvalidTrackRange`]: DmsError::InvalidTrackRange
//! [`TooManyTracks`]: DmsError::TooManyTracks
//! [`MissingTrack`]: DmsError::MissingTrack
//! [`TracksOutOfOrder`]: DmsError::TracksOutOfOrder
//! [`Decompress`]: DmsError::Decompress
//! [`ChecksumMismatch`]: DmsError::ChecksumMismatch
//! [`EncryptedNotSupported`]: DmsError::EncryptedNotSupported
//! [`Io`]: DmsError::Io
//! [`InvalidOffset`]: DmsError::InvalidOffset

use std::io;

use thiserror::Error;

use crate::decompress::DecompressError;

/// Error type for DMS operations.
#[derive(Debug, Error)]
pub enum DmsError {
    /// The file does not start with `DMS!`, or a track record lacks `TR`.
    #[error("Invalid DMS signature")]
    InvalidSignature,

    /// A header was cut short.
    #[error("Buffer too small: need {needed} bytes, have {have}")]
    BufferTooSmall {
        /// Number of bytes needed.
        needed: usize,
        /// Number of bytes available.
        have: usize,
    },

    /// The file header's first/last track numbers are unusable.
    ///
    /// Both must be below 200 and `last` must not precede `first`.
    #[error("Invalid track range: first {first}, last {last}")]
    InvalidTrackRange { first: u16, last: u16 },

    /// More track records than the configured ceiling.
    #[error("Too many tracks in file (limit {0})")]
    TooManyTracks(usize),

    /// A track number inside the declared range has no record.
    #[error("Could not find track #{0}")]
    MissingTrack(u16),

    /// Real tracks do not appear in ascending order.
    ///
    /// Heavy tracks depend on the tracks before them, so the file cannot be
    /// decoded in any other order.
    #[error("Track numbers not in order: expected #{expected}, found #{found}")]
    TracksOutOfOrder { expected: u16, found: u16 },

    /// The image is encrypted (info bit 0x02).
    #[error("Encrypted DMS images are not supported")]
    EncryptedNotSupported,

    /// A decoded track's additive checksum differs from its header.
    ///
    /// Only returned under [`ChecksumPolicy::Reject`](crate::ChecksumPolicy::Reject);
    /// otherwise the mismatch is a warning.
    #[error("Checksum check failed: reported {reported:#06x}, calculated {calculated:#06x}")]
    ChecksumMismatch { reported: u16, calculated: u16 },

    /// Track decompression failed.
    #[error("Decompression failed: {0}")]
    Decompress(#[from] DecompressError),

    /// A read past the end of the source.
    #[error("Invalid offset: {offset} (file length: {length})")]
    InvalidOffset { offset: u64, length: u64 },

    /// An I/O error occurred.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl DmsError {
    /// True if the error stops the whole file rather than one track.
    pub fn is_structural(&self) -> bool {
        match self {
            Self::TooManyTracks(_) | Self::MissingTrack(_) | Self::TracksOutOfOrder { .. } => true,
            Self::Decompress(e) => e.is_structural(),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, DmsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(DmsError::MissingTrack(7).to_string(), "Could not find track #7");
        assert_eq!(
            DmsError::ChecksumMismatch {
                reported: 0x12,
                calculated: 0xABCD
            }
            .to_string(),
            "Checksum check failed: reported 0x0012, calculated 0xabcd"
        );
    }

    #[test]
    fn test_from_decompress_error() {
        let err: DmsError = DecompressError::TreeOverflow.into();
        assert!(matches!(err, DmsError::Decompress(DecompressError::TreeOverflow)));
        assert!(err.is_structural());

        let err: DmsError = DecompressError::UnexpectedEof.into();
        assert!(!err.is_structural());
    }

    #[test]
    fn test_io_error_source() {
        use std::error::Error as _;
        let err: DmsError = io::Error::new(io::ErrorKind::NotFound, "gone").into();
        assert!(err.source().is_some());
    }
}
