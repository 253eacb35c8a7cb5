//! Bit reader for compressed track data.
//!
//! Reads bits from a byte stream, MSB first (DMS convention). End of data and
//! malformed requests are reported through sticky flags instead of `Result`, so
//! a decode loop degrades into "zeros, then stop" on hostile input. Callers must
//! check [`BitReader::is_eof`] after every read.

/// Widest read supported by [`BitReader::get_bits`].
pub const MAX_BITS_PER_READ: u32 = 48;

/// MSB-first bit reader over a byte slice.
pub struct BitReader<'a> {
    data: &'a [u8],
    /// Next byte to pull into the accumulator
    pos: usize,
    /// Accumulator; only the low `bits_in_buffer` bits are valid
    buffer: u64,
    bits_in_buffer: u32,
    eof: bool,
    error: bool,
}

impl<'a> BitReader<'a> {
    /// Create a new bit reader from a byte slice.
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            pos: 0,
            buffer: 0,
            bits_in_buffer: 0,
            eof: false,
            error: false,
        }
    }

    /// Read `n` bits (at most 48) as an unsigned integer.
    ///
    /// Returns 0 and sets the EOF flag if the data runs out first. Returns 0 and
    /// sets the error flag if `n` is wider than [`MAX_BITS_PER_READ`].
    pub fn get_bits(&mut self, n: u32) -> u64 {
        if self.eof {
            return 0;
        }
        if n > MAX_BITS_PER_READ {
            self.set_error();
            return 0;
        }
        if n == 0 {
            return 0;
        }

        while self.bits_in_buffer < n {
            if self.pos >= self.data.len() {
                self.eof = true;
                return 0;
            }
            self.buffer = (self.buffer << 8) | self.data[self.pos] as u64;
            self.bits_in_buffer += 8;
            self.pos += 1;
        }

        self.bits_in_buffer -= n;
        let value = self.buffer >> self.bits_in_buffer;
        self.buffer &= (1u64 << self.bits_in_buffer) - 1;
        value
    }

    /// Read a single bit.
    #[inline]
    pub fn read_bit(&mut self) -> u8 {
        self.get_bits(1) as u8
    }

    /// Mark the stream as malformed. Implies EOF.
    pub fn set_error(&mut self) {
        self.eof = true;
        self.error = true;
    }

    /// True once the data ran out or an error occurred.
    pub fn is_eof(&self) -> bool {
        self.eof
    }

    /// True if an invalid request was made or [`set_error`](Self::set_error) was called.
    pub fn is_error(&self) -> bool {
        self.error
    }

    /// Bytes pulled from the underlying slice so far.
    pub fn byte_position(&self) -> usize {
        self.pos
    }

    /// Bits read from the slice but not yet handed out.
    pub fn bits_buffered(&self) -> u32 {
        self.bits_in_buffer
    }

    /// Bytes actually consumed: whole buffered bytes are given back.
    pub fn bytes_consumed(&self) -> usize {
        self.pos
            .saturating_sub((self.bits_in_buffer / 8) as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_bits() {
        let data = [0b10110100, 0b11001010];
        let mut reader = BitReader::new(&data);

        assert_eq!(reader.get_bits(4), 0b1011);
        assert_eq!(reader.get_bits(4), 0b0100);
        assert_eq!(reader.get_bits(8), 0b11001010);
        assert!(!reader.is_eof());
    }

    #[test]
    fn test_unaligned_reads_span_bytes() {
        let data = [0b10110100, 0b11001010, 0b01010101];
        let mut reader = BitReader::new(&data);

        assert_eq!(reader.get_bits(3), 0b101);
        assert_eq!(reader.get_bits(9), 0b101001100);
        assert_eq!(reader.get_bits(12), 0b101001010101);
    }

    #[test]
    fn test_every_width_up_to_48() {
        let data: Vec<u8> = (0u8..64).map(|i| i.wrapping_mul(37) ^ 0x5A).collect();
        for n in 1..=MAX_BITS_PER_READ {
            let mut reader = BitReader::new(&data);
            let mut expected = 0u64;
            for i in 0..n as usize {
                let bit = (data[i / 8] >> (7 - i % 8)) & 1;
                expected = (expected << 1) | bit as u64;
            }
            assert_eq!(reader.get_bits(n), expected, "width {}", n);
        }
    }

    #[test]
    fn test_zero_width_is_noop() {
        let data = [0xFF];
        let mut reader = BitReader::new(&data);
        assert_eq!(reader.get_bits(0), 0);
        assert_eq!(reader.byte_position(), 0);
        assert_eq!(reader.get_bits(8), 0xFF);
    }

    #[test]
    fn test_eof_is_sticky() {
        let data = [0xFF];
        let mut reader = BitReader::new(&data);

        assert_eq!(reader.get_bits(6), 0b111111);
        assert_eq!(reader.get_bits(4), 0);
        assert!(reader.is_eof());
        assert!(!reader.is_error());
        assert_eq!(reader.byte_position(), 1);

        // Two bits remained buffered, but EOF is sticky.
        assert_eq!(reader.get_bits(1), 0);
        assert_eq!(reader.byte_position(), 1);
    }

    #[test]
    fn test_too_wide_sets_error() {
        let data = [0u8; 16];
        let mut reader = BitReader::new(&data);

        assert_eq!(reader.get_bits(49), 0);
        assert!(reader.is_error());
        assert!(reader.is_eof());
        assert_eq!(reader.get_bits(8), 0);
        assert_eq!(reader.byte_position(), 0);
    }

    #[test]
    fn test_bytes_consumed_gives_back_whole_bytes() {
        let data = [0xAA, 0xBB, 0xCC, 0xDD];
        let mut reader = BitReader::new(&data);

        reader.get_bits(4);
        assert_eq!(reader.byte_position(), 1);
        assert_eq!(reader.bytes_consumed(), 1);

        reader.get_bits(13);
        assert_eq!(reader.byte_position(), 3);
        assert_eq!(reader.bits_buffered(), 7);
        assert_eq!(reader.bytes_consumed(), 3);
    }
}
