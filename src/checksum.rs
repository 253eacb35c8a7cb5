//! Track checksums.
//!
//! DMS stores two kinds: a 16-bit additive checksum of each decoded track, and
//! CRC-16 (ARC variant: polynomial 0xA001 reflected, initial value 0) over the
//! file header, every track header and every compressed payload.

/// CRC-16/ARC lookup table (polynomial 0xA001)
const CRC16_TABLE: [u16; 256] = {
    let mut table = [0u16; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = i as u16;
        let mut j = 0;
        while j < 8 {
            if crc & 1 != 0 {
                crc = (crc >> 1) ^ 0xA001;
            } else {
                crc >>= 1;
            }
            j += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
};

/// CRC-16 of `data` as stored in DMS headers.
pub fn crc16(data: &[u8]) -> u16 {
    let mut crc = 0u16;
    for &byte in data {
        let index = ((crc ^ byte as u16) & 0xFF) as usize;
        crc = (crc >> 8) ^ CRC16_TABLE[index];
    }
    crc
}

/// Sum of all bytes, modulo 2^16.
pub fn track_checksum(data: &[u8]) -> u16 {
    data.iter()
        .fold(0u32, |sum, &b| sum.wrapping_add(b as u32)) as u16
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crc16() {
        assert_eq!(crc16(b""), 0x0000);
        assert_eq!(crc16(b"123456789"), 0xBB3D);
    }

    #[test]
    fn test_track_checksum_wraps() {
        assert_eq!(track_checksum(&[]), 0);
        assert_eq!(track_checksum(&[1, 2, 3]), 6);
        // 300 * 0xFF = 76500 = 0x12AD4
        assert_eq!(track_checksum(&[0xFF; 300]), 0x2AD4);
    }
}
