//! File header parser.
//!
//! Every DMS image starts with a 56-byte header: signature, info bits,
//! creation time, the range of tracks stored, and the packer's settings.
//! Multi-byte fields are big-endian.

use log::{debug, info};

use crate::checksum::crc16;
use crate::decompress::CompressionMethod;
use crate::error::{DmsError, Result};
use crate::formats::{RawTimestamp, Signature};

/// Highest track count a DMS image can describe.
pub const MAX_TRACKS: u16 = 200;

/// Info bit: image is encrypted.
pub const INFO_ENCRYPTED: u32 = 0x02;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileHeader {
    pub info_bits: u32,
    pub created: RawTimestamp,
    pub first_track: u16,
    pub last_track: u16,
    /// Total compressed length as reported by the packer
    pub packed_len: u32,
    /// Total decompressed length as reported by the packer
    pub unpacked_len: u32,
    pub creator_version: u16,
    pub disk_type: u16,
    pub compression_mode: u16,
    /// CRC of bytes 4..54, as stored
    pub crc: u16,
    /// CRC of bytes 4..54, as computed
    pub crc_calculated: u16,
}

impl FileHeader {
    pub fn is_encrypted(&self) -> bool {
        self.info_bits & INFO_ENCRYPTED != 0
    }

    /// Number of real tracks the image should contain.
    pub fn track_count(&self) -> usize {
        (self.last_track - self.first_track) as usize + 1
    }

    pub fn crc_matches(&self) -> bool {
        self.crc == self.crc_calculated
    }
}

pub struct FileHeaderParser;

impl FileHeaderParser {
    pub const HEADER_SIZE: usize = 56;

    pub fn parse(buffer: &[u8]) -> Result<FileHeader> {
        if buffer.len() < Self::HEADER_SIZE {
            return Err(DmsError::BufferTooSmall {
                needed: Self::HEADER_SIZE,
                have: buffer.len(),
            });
        }
        if Signature::from_bytes(buffer).is_none() {
            return Err(DmsError::InvalidSignature);
        }

        let be16 = |at: usize| u16::from_be_bytes([buffer[at], buffer[at + 1]]);
        let be32 = |at: usize| {
            u32::from_be_bytes([buffer[at], buffer[at + 1], buffer[at + 2], buffer[at + 3]])
        };

        let info_bits = be32(8);
        debug!("infobits: {:#010x}", info_bits);
        let created = RawTimestamp::from_unix_secs(be32(12));
        debug!("creation time: {}", created.unix_secs());

        let first_track = be16(16);
        let last_track = be16(18);
        debug!("first track: {}, last track: {}", first_track, last_track);
        if first_track >= MAX_TRACKS || last_track >= MAX_TRACKS || last_track < first_track {
            return Err(DmsError::InvalidTrackRange {
                first: first_track,
                last: last_track,
            });
        }
        if first_track != 0 {
            info!(
                "First track is #{}, not #0. This may be a partial disk image.",
                first_track
            );
        }

        let packed_len = be32(20);
        let unpacked_len = be32(24);
        debug!("compressed len: {}, decompressed len: {}", packed_len, unpacked_len);

        let creator_version = be16(46);
        let disk_type = be16(50);
        let compression_mode = be16(52);
        debug!(
            "disk type: {}, compression type: {} ({})",
            disk_type,
            compression_mode,
            u8::try_from(compression_mode).map_or("?", CompressionMethod::name_of)
        );

        let crc = be16(54);
        let crc_calculated = crc16(&buffer[4..54]);
        debug!("crc (reported): {:#06x}", crc);

        Ok(FileHeader {
            info_bits,
            created,
            first_track,
            last_track,
            packed_len,
            unpacked_len,
            creator_version,
            disk_type,
            compression_mode,
            crc,
            crc_calculated,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header_bytes(first: u16, last: u16) -> Vec<u8> {
        let mut buf = vec![0u8; FileHeaderParser::HEADER_SIZE];
        buf[0..4].copy_from_slice(b"DMS!");
        buf[8..12].copy_from_slice(&0x0000_0012u32.to_be_bytes()); // info bits
        buf[12..16].copy_from_slice(&0x2A00_0000u32.to_be_bytes()); // created
        buf[16..18].copy_from_slice(&first.to_be_bytes());
        buf[18..20].copy_from_slice(&last.to_be_bytes());
        buf[20..24].copy_from_slice(&1234u32.to_be_bytes());
        buf[24..28].copy_from_slice(&901_120u32.to_be_bytes());
        buf[46..48].copy_from_slice(&111u16.to_be_bytes()); // creator version
        buf[50..52].copy_from_slice(&1u16.to_be_bytes()); // disk type
        buf[52..54].copy_from_slice(&6u16.to_be_bytes()); // heavy2
        let crc = crc16(&buf[4..54]);
        buf[54..56].copy_from_slice(&crc.to_be_bytes());
        buf
    }

    #[test]
    fn test_parse_file_header() {
        let header = FileHeaderParser::parse(&header_bytes(0, 79)).unwrap();

        assert_eq!(header.first_track, 0);
        assert_eq!(header.last_track, 79);
        assert_eq!(header.track_count(), 80);
        assert_eq!(header.packed_len, 1234);
        assert_eq!(header.unpacked_len, 901_120);
        assert_eq!(header.creator_version, 111);
        assert_eq!(header.disk_type, 1);
        assert_eq!(header.compression_mode, 6);
        assert_eq!(header.created.unix_secs(), 0x2A00_0000);
        assert!(header.is_encrypted());
        assert!(header.crc_matches());
    }

    #[test]
    fn test_bad_signature() {
        let mut buf = header_bytes(0, 1);
        buf[3] = b'?';
        assert!(matches!(
            FileHeaderParser::parse(&buf),
            Err(DmsError::InvalidSignature)
        ));
    }

    #[test]
    fn test_short_buffer() {
        let buf = header_bytes(0, 1);
        assert!(matches!(
            FileHeaderParser::parse(&buf[..40]),
            Err(DmsError::BufferTooSmall {
                needed: 56,
                have: 40
            })
        ));
    }

    #[test]
    fn test_track_range_validation() {
        for (first, last) in [(200, 200), (0, 200), (5, 4)] {
            assert!(
                matches!(
                    FileHeaderParser::parse(&header_bytes(first, last)),
                    Err(DmsError::InvalidTrackRange { .. })
                ),
                "{}..{}",
                first,
                last
            );
        }
        assert!(FileHeaderParser::parse(&header_bytes(199, 199)).is_ok());
    }

    #[test]
    fn test_crc_mismatch_is_visible() {
        let mut buf = header_bytes(0, 1);
        buf[30] ^= 0xFF;
        let header = FileHeaderParser::parse(&buf).unwrap();
        assert!(!header.crc_matches());
    }
}
