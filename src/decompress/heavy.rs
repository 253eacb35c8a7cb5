//! DMS "Heavy" LZH decompression.
//!
//! Heavy tracks are LZ77 + static Huffman, similar to LHA's lh5, except that
//! the Huffman trees, the sliding window and the last-used offset carry over
//! from one track to the next. A track only brings new trees when its header
//! sets the reset flag, so tracks must be decoded in file order with one
//! [`HeavySession`] for the whole image.
//!
//! ## Bit stream layout
//!
//! ```text
//! [code tree]    9-bit count, then count x 5-bit lengths   (count 0: 9-bit value)
//! [offset tree]  5-bit count, then count x 4-bit lengths   (count 0: 5-bit value)
//! [codes]        code < 256: literal
//!                code >= 256: match of (code - 253) bytes, then an offset code
//! ```
//!
//! The two tree tables are only present when the session has no trees.

use log::{debug, trace};

use super::bit_reader::BitReader;
use super::huffman::{DecodeStep, HuffmanTree};
use super::lzss::{OutputSink, RingBuffer, WINDOW_SIZE_HEAVY1, WINDOW_SIZE_HEAVY2};
use super::{DecompressError, Result};

/// Code tree field widths: symbol count, then per-symbol length.
const CODE_TREE_BITS: (u32, u32) = (9, 5);

/// Offset tree field widths: symbol count, then per-symbol length.
const OFFSET_TREE_BITS: (u32, u32) = (5, 4);

/// Heavy variant, fixed by the track's compression method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeavyVariant {
    /// Method 5: 4 KiB window, 14 offset codes
    Heavy1,
    /// Method 6: 8 KiB window, 15 offset codes
    Heavy2,
}

impl HeavyVariant {
    /// Map a track compression method to a variant.
    pub fn from_method(method: u8) -> Option<Self> {
        match method {
            5 => Some(Self::Heavy1),
            6 => Some(Self::Heavy2),
            _ => None,
        }
    }

    pub fn window_size(self) -> usize {
        match self {
            Self::Heavy1 => WINDOW_SIZE_HEAVY1,
            Self::Heavy2 => WINDOW_SIZE_HEAVY2,
        }
    }

    /// Number of offset codes ("np"). The last one repeats the previous offset.
    pub fn offset_codes(self) -> u32 {
        match self {
            Self::Heavy1 => 14,
            Self::Heavy2 => 15,
        }
    }
}

/// Lifecycle of a [`HeavySession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No trees; the next track must carry tree tables.
    Uninitialized,
    /// Trees are in place and the code loop of a track is running.
    Decoding,
    /// Last track finished; trees and window are ready for the next one.
    Done,
    /// A track failed. Every later Heavy track fails too.
    Failed,
}

/// A tree read from the stream, or the constant it collapses to when the
/// stream declares zero codes.
#[derive(Debug, Clone)]
enum CodeTree {
    Degenerate(u32),
    Built(HuffmanTree),
}

impl CodeTree {
    fn read(reader: &mut BitReader, (count_bits, length_bits): (u32, u32)) -> Result<Self> {
        let count = reader.get_bits(count_bits) as u32;
        debug!("num codes: {}", count);

        if count == 0 {
            let value = reader.get_bits(count_bits) as u32;
            debug!("degenerate tree, value {}", value);
            return Ok(Self::Degenerate(value));
        }

        let mut tree = HuffmanTree::new(count as usize, count as usize);
        for symbol in 0..count {
            let length = reader.get_bits(length_bits) as u32;
            trace!("len[{}] = {}", symbol, length);
            tree.record_code_length(symbol, length);
        }
        if reader.is_eof() {
            return Err(DecompressError::UnexpectedEof);
        }

        tree.build_canonical()?;
        Ok(Self::Built(tree))
    }

    /// Read one symbol, bit by bit.
    fn decode(&mut self, reader: &mut BitReader) -> Result<u32> {
        let tree = match self {
            Self::Degenerate(value) => return Ok(*value),
            Self::Built(tree) => tree,
        };

        loop {
            let bit = reader.read_bit();
            if reader.is_eof() {
                tree.reset_cursor();
                reader.set_error();
                return Err(DecompressError::UnexpectedEof);
            }
            match tree.decode_bit(bit) {
                DecodeStep::Value(value) => return Ok(value),
                DecodeStep::NeedMore => {}
                DecodeStep::Error => {
                    reader.set_error();
                    return Err(DecompressError::InvalidHuffmanCode);
                }
            }
        }
    }
}

#[derive(Debug, Clone)]
struct HeavyTrees {
    codes: CodeTree,
    offsets: CodeTree,
}

/// Outcome of one successfully decoded track.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeavyOutcome {
    /// Compressed bytes actually used (whole bytes left in the bit buffer are
    /// not counted).
    pub bytes_consumed: usize,
}

/// Decoder state shared by all Heavy tracks of one image.
///
/// Owned by the caller for the lifetime of the image and passed to
/// [`decode_track`](Self::decode_track) for each Heavy track, in file order.
#[derive(Debug, Clone)]
pub struct HeavySession {
    window: Option<RingBuffer>,
    trees: Option<HeavyTrees>,
    prev_offset: u32,
    state: SessionState,
}

impl Default for HeavySession {
    fn default() -> Self {
        Self::new()
    }
}

impl HeavySession {
    pub fn new() -> Self {
        Self {
            window: None,
            trees: None,
            prev_offset: 0,
            state: SessionState::Uninitialized,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Refuse all further tracks.
    pub fn poison(&mut self) {
        self.state = SessionState::Failed;
    }

    pub fn is_poisoned(&self) -> bool {
        self.state == SessionState::Failed
    }

    /// Drop the trees; the next track must bring its own.
    fn discard_trees(&mut self) {
        self.trees = None;
        self.state = SessionState::Uninitialized;
    }

    /// Decode one track's payload into `sink`, stopping once the sink has enough.
    ///
    /// `reset_trees` is the track header's "new trees" flag. Any error poisons
    /// the session.
    pub fn decode_track<S: OutputSink + ?Sized>(
        &mut self,
        data: &[u8],
        variant: HeavyVariant,
        reset_trees: bool,
        sink: &mut S,
    ) -> Result<HeavyOutcome> {
        if self.is_poisoned() {
            return Err(DecompressError::SessionPoisoned);
        }

        let mut reader = BitReader::new(data);
        match self.decode_inner(&mut reader, variant, reset_trees, sink) {
            Ok(()) => {
                self.state = SessionState::Done;
                Ok(HeavyOutcome {
                    bytes_consumed: reader.bytes_consumed(),
                })
            }
            Err(e) => {
                debug!(
                    "heavy decode failed at byte {} ({:?}): {}",
                    reader.byte_position(),
                    self.state,
                    e
                );
                self.poison();
                Err(e)
            }
        }
    }

    fn decode_inner<S: OutputSink + ?Sized>(
        &mut self,
        reader: &mut BitReader,
        variant: HeavyVariant,
        reset_trees: bool,
        sink: &mut S,
    ) -> Result<()> {
        let window_size = variant.window_size();
        if self.window.as_ref().map(RingBuffer::size) != Some(window_size) {
            debug!("allocating {} byte window", window_size);
            self.window = Some(RingBuffer::new(window_size));
        }

        if reset_trees {
            self.discard_trees();
        }

        if self.trees.is_none() {
            debug!("c tree");
            let codes = CodeTree::read(reader, CODE_TREE_BITS)?;
            debug!("p tree");
            let offsets = CodeTree::read(reader, OFFSET_TREE_BITS)?;
            self.trees = Some(HeavyTrees { codes, offsets });
        }

        let (Some(window), Some(trees)) = (self.window.as_mut(), self.trees.as_mut()) else {
            return Err(DecompressError::InvalidHuffmanCode);
        };
        self.state = SessionState::Decoding;
        debug!(
            "codes start at byte {} minus {} bits",
            reader.byte_position(),
            reader.bits_buffered()
        );

        let repeat_code = variant.offset_codes() - 1;
        loop {
            if sink.has_enough() {
                return Ok(());
            }
            if reader.is_eof() {
                return Err(DecompressError::UnexpectedEof);
            }

            let code = trees.codes.decode(reader)?;
            if code < 256 {
                window.add_literal(code as u8, sink);
                continue;
            }

            let length = code - 253;
            let ocode1 = trees.offsets.decode(reader)?;
            let offset = if ocode1 == repeat_code {
                self.prev_offset
            } else {
                let offset = if ocode1 < 1 {
                    ocode1
                } else {
                    let ocode2 = reader.get_bits(ocode1 - 1) as u32;
                    if reader.is_error() {
                        return Err(DecompressError::BitWidthTooLarge(ocode1 - 1));
                    }
                    if reader.is_eof() {
                        return Err(DecompressError::UnexpectedEof);
                    }
                    ocode2 | (1 << (ocode1 - 1))
                };
                self.prev_offset = offset;
                offset
            };
            trace!("match: length {} offset {}", length, offset);

            window.copy_match(offset as usize, length as usize, sink);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decompress::lzss::BoundedOutput;
    use crate::decompress::tests::{HeavyTables, HeavyTrackWriter};

    fn window_size(session: &HeavySession) -> Option<usize> {
        session.window.as_ref().map(RingBuffer::size)
    }

    #[test]
    fn test_variant_parameters() {
        assert_eq!(HeavyVariant::from_method(5), Some(HeavyVariant::Heavy1));
        assert_eq!(HeavyVariant::from_method(6), Some(HeavyVariant::Heavy2));
        assert_eq!(HeavyVariant::from_method(4), None);
        assert_eq!(HeavyVariant::Heavy1.window_size(), 4096);
        assert_eq!(HeavyVariant::Heavy2.window_size(), 8192);
        assert_eq!(HeavyVariant::Heavy1.offset_codes(), 14);
        assert_eq!(HeavyVariant::Heavy2.offset_codes(), 15);
    }

    #[test]
    fn test_degenerate_trees_need_no_code_bits() {
        // Code tree: count 0 (9 bits), value 'Z' (9 bits).
        // Offset tree: count 0 (5 bits), value 0 (5 bits). 4 bits padding.
        let word = (b'Z' as u32) << 14;
        let data = word.to_be_bytes();

        let mut session = HeavySession::new();
        let mut out = BoundedOutput::new(6);
        session
            .decode_track(&data, HeavyVariant::Heavy1, true, &mut out)
            .unwrap();

        assert_eq!(out.as_slice(), b"ZZZZZZ");
        assert_eq!(session.state(), SessionState::Done);
        assert!(session.trees.is_some());
    }

    #[test]
    fn test_empty_input_fails_and_poisons() {
        let mut session = HeavySession::new();
        let mut out = BoundedOutput::new(4);

        let err = session
            .decode_track(&[], HeavyVariant::Heavy2, true, &mut out)
            .unwrap_err();
        assert!(matches!(err, DecompressError::UnexpectedEof));
        assert!(session.is_poisoned());

        let err = session
            .decode_track(&[0xFF; 64], HeavyVariant::Heavy2, true, &mut out)
            .unwrap_err();
        assert!(matches!(err, DecompressError::SessionPoisoned));
    }

    #[test]
    fn test_zero_length_output_reads_only_trees() {
        let mut session = HeavySession::new();
        let mut out = BoundedOutput::new(0);
        let data = [0u8; 4];

        let outcome = session
            .decode_track(&data, HeavyVariant::Heavy1, true, &mut out)
            .unwrap();
        assert!(out.is_empty());
        // 28 bits of tables, rounded up to whole bytes.
        assert_eq!(outcome.bytes_consumed, 4);
    }

    #[test]
    fn test_session_state_lifecycle() {
        let mut session = HeavySession::new();
        assert_eq!(session.state(), SessionState::Uninitialized);

        let mut out = BoundedOutput::new(2);
        let data = ((b'Z' as u32) << 14).to_be_bytes();
        session
            .decode_track(&data, HeavyVariant::Heavy1, true, &mut out)
            .unwrap();
        assert_eq!(session.state(), SessionState::Done);

        let mut out = BoundedOutput::new(2);
        session
            .decode_track(&[], HeavyVariant::Heavy1, true, &mut out)
            .unwrap_err();
        assert_eq!(session.state(), SessionState::Failed);
    }

    #[test]
    fn test_variant_switch_keeps_trees() {
        let data = ((b'Z' as u32) << 14).to_be_bytes();
        let mut session = HeavySession::new();

        let mut out = BoundedOutput::new(4);
        session
            .decode_track(&data, HeavyVariant::Heavy1, true, &mut out)
            .unwrap();
        assert_eq!(window_size(&session), Some(4096));

        // No tables in the payload: the degenerate trees carry over.
        let mut out = BoundedOutput::new(3);
        session
            .decode_track(&[], HeavyVariant::Heavy2, false, &mut out)
            .unwrap();
        assert_eq!(out.as_slice(), b"ZZZ");
        assert_eq!(window_size(&session), Some(8192));
        assert!(session.trees.is_some());
    }

    #[test]
    fn test_variant_switch_starts_with_empty_history() {
        let tables = HeavyTables::abc();
        let first = HeavyTrackWriter::with_tables(&tables)
            .literals(b"abc")
            .finish();
        // Offset 2 reaches three bytes back, which is "abc" in the old window.
        let second = HeavyTrackWriter::reusing(&tables)
            .copy(3, 2, 0)
            .literals(b"a")
            .finish();

        let mut session = HeavySession::new();
        let mut out = BoundedOutput::new(3);
        session
            .decode_track(&first, HeavyVariant::Heavy1, true, &mut out)
            .unwrap();
        assert_eq!(out.as_slice(), b"abc");

        let mut out = BoundedOutput::new(4);
        session
            .decode_track(&second, HeavyVariant::Heavy2, false, &mut out)
            .unwrap();
        assert_eq!(out.as_slice(), b"\0\0\0a");
        assert_eq!(window_size(&session), Some(8192));
    }
}
