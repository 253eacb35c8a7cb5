//! Track header parser.
//!
//! Each track record is a 20-byte big-endian header followed by the
//! compressed payload.
//!
//! ```text
//! 0  "TR"            8  intermediate len   14 checksum
//! 2  track number   10  uncompressed len   16 CRC of payload
//! 4  (unused)       12  flags              18 CRC of bytes 0..18
//! 6  compressed len 13  method
//! ```

use crate::checksum::crc16;
use crate::decompress::CompressionMethod;
use crate::error::{DmsError, Result};
use crate::formats::TRACK_SIGNATURE;

/// Track flag: discard the Heavy trees and read new ones.
pub const TRACK_FLAG_RESET_TREES: u8 = 0x02;

/// Track flag: run the Heavy output through the RLE filter.
pub const TRACK_FLAG_RLE: u8 = 0x04;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackHeader {
    pub track_num: u16,
    pub reserved: u16,
    pub cmpr_len: u16,
    pub intermediate_len: u16,
    pub uncmpr_len: u16,
    pub flags: u8,
    pub method: u8,
    /// Additive checksum of the decoded track
    pub checksum: u16,
    pub data_crc: u16,
    pub header_crc: u16,
    pub header_crc_calculated: u16,
}

impl TrackHeader {
    pub fn resets_trees(&self) -> bool {
        self.flags & TRACK_FLAG_RESET_TREES != 0
    }

    pub fn uses_rle(&self) -> bool {
        self.flags & TRACK_FLAG_RLE != 0
    }

    pub fn compression_method(&self) -> Option<CompressionMethod> {
        CompressionMethod::from_u8(self.method)
    }

    pub fn is_heavy(&self) -> bool {
        self.compression_method()
            .is_some_and(CompressionMethod::is_heavy)
    }
}

pub struct TrackHeaderParser;

impl TrackHeaderParser {
    pub const HEADER_SIZE: usize = 20;

    /// True if `buffer` starts with a track signature.
    pub fn has_signature(buffer: &[u8]) -> bool {
        buffer.starts_with(TRACK_SIGNATURE)
    }

    pub fn parse(buffer: &[u8]) -> Result<TrackHeader> {
        if buffer.len() < Self::HEADER_SIZE {
            return Err(DmsError::BufferTooSmall {
                needed: Self::HEADER_SIZE,
                have: buffer.len(),
            });
        }
        if !Self::has_signature(buffer) {
            return Err(DmsError::InvalidSignature);
        }

        let be16 = |at: usize| u16::from_be_bytes([buffer[at], buffer[at + 1]]);

        Ok(TrackHeader {
            track_num: be16(2),
            reserved: be16(4),
            cmpr_len: be16(6),
            intermediate_len: be16(8),
            uncmpr_len: be16(10),
            flags: buffer[12],
            method: buffer[13],
            checksum: be16(14),
            data_crc: be16(16),
            header_crc: be16(18),
            header_crc_calculated: crc16(&buffer[..18]),
        })
    }
}
