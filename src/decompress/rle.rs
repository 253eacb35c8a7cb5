//! DMS run-length filter.
//!
//! The second stage of a Heavy track, and the whole codec of a "simple" track.
//!
//! ```text
//! 90 00            a single 0x90
//! 90 n2 n3         n2 copies of n3            (n2 in 1..=0xFE)
//! 90 FF n3 n4 n5   (n4 << 8 | n5) copies of n3
//! anything else    itself
//! ```
//!
//! The filter keeps its position inside a marker sequence between calls, so
//! input may arrive in arbitrary chunks.

use super::lzss::OutputSink;

/// Byte that introduces a run.
pub const RLE_MARKER: u8 = 0x90;

/// Count byte announcing a 16-bit count.
const LONG_RUN: u8 = 0xFF;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum RleState {
    #[default]
    Neutral,
    SawMarker,
    /// Saw `90 n2`
    SawCount(u8),
    /// Saw `90 FF n3`
    SawLongRunByte(u8),
    /// Saw `90 FF n3 n4`
    SawLongRunHigh { byte: u8, high: u8 },
}

/// Resumable RLE decoder.
#[derive(Debug, Clone, Default)]
pub struct RleFilter {
    state: RleState,
}

impl RleFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// True if the filter is between sequences.
    pub fn is_neutral(&self) -> bool {
        self.state == RleState::Neutral
    }

    /// Decode `input` into `sink`, continuing any sequence left open by the
    /// previous call.
    pub fn add_bytes<S: OutputSink + ?Sized>(&mut self, input: &[u8], sink: &mut S) {
        for &n in input {
            self.state = match self.state {
                RleState::Neutral if n == RLE_MARKER => RleState::SawMarker,
                RleState::Neutral => {
                    sink.put(n);
                    RleState::Neutral
                }
                RleState::SawMarker if n == 0 => {
                    sink.put(RLE_MARKER);
                    RleState::Neutral
                }
                RleState::SawMarker => RleState::SawCount(n),
                RleState::SawCount(LONG_RUN) => RleState::SawLongRunByte(n),
                RleState::SawCount(count) => {
                    sink.put_run(n, count as usize);
                    RleState::Neutral
                }
                RleState::SawLongRunByte(byte) => RleState::SawLongRunHigh { byte, high: n },
                RleState::SawLongRunHigh { byte, high } => {
                    let count = u16::from_be_bytes([high, n]);
                    sink.put_run(byte, count as usize);
                    RleState::Neutral
                }
            };
        }
    }
}

/// Encode `data` in the format [`RleFilter`] reads.
///
/// Only runs of four or more bytes (two or more for the marker byte) are
/// packed. Mainly useful for building test images.
pub fn encode(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len());
    let mut i = 0;

    while i < data.len() {
        let byte = data[i];
        let mut run = 1;
        while i + run < data.len() && data[i + run] == byte && run < u16::MAX as usize {
            run += 1;
        }

        if run >= 4 || (byte == RLE_MARKER && run >= 2) {
            if run < LONG_RUN as usize {
                out.extend_from_slice(&[RLE_MARKER, run as u8, byte]);
            } else {
                let [high, low] = (run as u16).to_be_bytes();
                out.extend_from_slice(&[RLE_MARKER, LONG_RUN, byte, high, low]);
            }
        } else {
            for _ in 0..run {
                if byte == RLE_MARKER {
                    out.extend_from_slice(&[RLE_MARKER, 0]);
                } else {
                    out.push(byte);
                }
            }
        }
        i += run;
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decompress::lzss::BoundedOutput;

    fn decode(input: &[u8], limit: usize) -> Vec<u8> {
        let mut filter = RleFilter::new();
        let mut out = BoundedOutput::new(limit);
        filter.add_bytes(input, &mut out);
        assert!(filter.is_neutral());
        out.into_inner()
    }

    #[test]
    fn test_plain_bytes_pass_through() {
        assert_eq!(decode(b"hello", 16), b"hello");
    }

    #[test]
    fn test_escaped_marker() {
        assert_eq!(decode(&[0x41, 0x90, 0x00, 0x42], 16), &[0x41, 0x90, 0x42]);
    }

    #[test]
    fn test_short_run_is_count_then_byte() {
        assert_eq!(decode(&[0x90, 0x05, 0x41], 16), b"AAAAA");
        assert_eq!(decode(&[0x90, 0x03, 0x90], 16), &[0x90, 0x90, 0x90]);
    }

    #[test]
    fn test_long_run() {
        let out = decode(&[0x90, 0xFF, 0x00, 0x01, 0x2C], 1000);
        assert_eq!(out.len(), 300);
        assert!(out.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_resumes_across_chunks() {
        let input = [0x31, 0x90, 0xFF, 0x7E, 0x00, 0x06, 0x90, 0x00, 0x32];
        let expected = decode(&input, 64);

        for split in 0..=input.len() {
            let mut filter = RleFilter::new();
            let mut out = BoundedOutput::new(64);
            filter.add_bytes(&input[..split], &mut out);
            filter.add_bytes(&input[split..], &mut out);
            assert_eq!(out.as_slice(), &expected[..], "split at {}", split);
        }
        assert_eq!(expected, &[0x31, 0x7E, 0x7E, 0x7E, 0x7E, 0x7E, 0x7E, 0x90, 0x32]);
    }

    #[test]
    fn test_unfinished_sequence_emits_nothing() {
        let mut filter = RleFilter::new();
        let mut out = BoundedOutput::new(16);
        filter.add_bytes(&[0x41, 0x90, 0xFF, 0x42], &mut out);

        assert!(!filter.is_neutral());
        assert_eq!(out.as_slice(), b"A");
    }

    #[test]
    fn test_run_lengths_round_trip() {
        for len in [1usize, 2, 3, 4, 5, 0xFD, 0xFE, 0xFF, 0x100, 0x1234, 0xFFFF] {
            for value in [0x00u8, 0x41, RLE_MARKER, 0xFF] {
                let data = vec![value; len];
                assert_eq!(decode(&encode(&data), len + 1), data, "{} x {:#x}", len, value);
            }
        }
    }

    #[test]
    fn test_single_marker_encodes_as_escape() {
        assert_eq!(encode(&[RLE_MARKER]), &[0x90, 0x00]);
        assert_eq!(decode(&[0x90, 0x00], 4), &[RLE_MARKER]);
    }

    #[test]
    fn test_run_past_limit_is_counted() {
        let mut filter = RleFilter::new();
        let mut out = BoundedOutput::new(10);
        filter.add_bytes(&[0x90, 0xFF, 0x55, 0x01, 0x00], &mut out);

        assert_eq!(out.len(), 10);
        assert_eq!(out.dropped(), 246);
    }
}
