//! Canonical Huffman decode tree.
//!
//! The tree is an arena of two-child nodes addressed by [`NodeRef`]. Codes are
//! inserted bit by bit (MSB first) and decoded one bit at a time through an
//! internal cursor, which suits the DMS bit stream where code bits are
//! interleaved with raw offset bits.
//!
//! Inconsistent code sets (a code that is a prefix of another, or an incomplete
//! tree) are not detected at insertion time. Decoding them is still safe: an
//! unused branch yields [`DecodeStep::Error`].

use super::{DecompressError, Result};

/// Deepest code the tree accepts.
pub const MAX_TREE_DEPTH: u32 = 56;

/// Hard ceiling on the node arena, whatever the caller asks for.
pub const MAX_NODES: usize = 66000;

/// Index of a node inside one tree's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
struct NodeRef(u32);

impl NodeRef {
    const ROOT: Self = Self(0);

    #[inline]
    fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, Copy, Default)]
enum Child {
    #[default]
    Unused,
    Node(NodeRef),
    Leaf(u32),
}

#[derive(Debug, Clone, Copy, Default)]
struct Node {
    children: [Child; 2],
}

/// Result of feeding one bit to [`HuffmanTree::decode_bit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeStep {
    /// Inside a code, feed another bit.
    NeedMore,
    /// A complete code was read.
    Value(u32),
    /// The bit led to an unused branch.
    Error,
}

/// Huffman tree built from explicit codes or from canonical code lengths.
#[derive(Debug, Clone)]
pub struct HuffmanTree {
    nodes: Vec<Node>,
    /// Number of arena slots claimed (`nodes` may be longer)
    used_nodes: usize,
    max_nodes: usize,
    cursor: NodeRef,
    null_value: u32,
    num_codes: usize,
    max_bits: u32,
    /// (symbol, length) pairs waiting for `build_canonical`
    pending_lengths: Vec<(u32, u32)>,
}

impl HuffmanTree {
    /// Create an empty tree.
    ///
    /// `initial_codes` pre-sizes the arena. `max_codes`, when non-zero, caps the
    /// arena at that many nodes; zero means [`MAX_NODES`].
    pub fn new(initial_codes: usize, max_codes: usize) -> Self {
        let max_nodes = if max_codes > 0 { max_codes } else { MAX_NODES }.min(MAX_NODES);
        let initial = initial_codes.clamp(1, MAX_NODES).min(max_nodes.max(1));

        Self {
            nodes: Vec::with_capacity(initial),
            used_nodes: 0,
            max_nodes,
            cursor: NodeRef::ROOT,
            null_value: 0,
            num_codes: 0,
            max_bits: 0,
            pending_lengths: Vec::new(),
        }
    }

    /// Number of leaf values in the tree.
    pub fn num_codes(&self) -> usize {
        self.num_codes
    }

    /// Length of the longest code added so far.
    pub fn max_bits(&self) -> u32 {
        self.max_bits
    }

    /// Value of the zero-length code.
    pub fn null_value(&self) -> u32 {
        self.null_value
    }

    /// Return the decode cursor to the root.
    pub fn reset_cursor(&mut self) {
        self.cursor = NodeRef::ROOT;
    }

    /// Make sure arena slot `n` exists, growing geometrically.
    fn ensure_node(&mut self, n: NodeRef) -> Result<()> {
        let needed = n.index() + 1;
        if needed <= self.nodes.len() {
            return Ok(());
        }
        if needed > self.max_nodes {
            return Err(DecompressError::TreeOverflow);
        }
        let target = (self.nodes.len() * 2)
            .max(16)
            .max(needed)
            .min(self.max_nodes);
        self.nodes.resize(target, Node::default());
        Ok(())
    }

    fn set_child(&mut self, n: NodeRef, bit: usize, child: Child) {
        let slot = &mut self.nodes[n.index()].children[bit];
        if matches!(slot, Child::Leaf(_)) {
            self.num_codes -= 1;
        }
        if matches!(child, Child::Leaf(_)) {
            self.num_codes += 1;
        }
        *slot = child;
    }

    /// Insert `code` (its low `nbits` bits, MSB first) with the given value.
    ///
    /// A zero-length code sets the tree's null value instead.
    pub fn add_code(&mut self, code: u64, nbits: u32, value: u32) -> Result<()> {
        if nbits > MAX_TREE_DEPTH {
            return Err(DecompressError::InconsistentCodeLengths { length: nbits });
        }
        if nbits == 0 {
            self.null_value = value;
            return Ok(());
        }
        self.max_bits = self.max_bits.max(nbits);

        let mut curr = NodeRef::ROOT;
        for k in 0..nbits {
            self.ensure_node(curr)?;
            if curr.index() >= self.used_nodes {
                self.used_nodes = curr.index() + 1;
            }

            let bit = ((code >> (nbits - 1 - k)) & 1) as usize;

            if k == nbits - 1 {
                self.set_child(curr, bit, Child::Leaf(value));
            } else if let Child::Node(next) = self.nodes[curr.index()].children[bit] {
                curr = next;
            } else {
                if self.used_nodes >= self.max_nodes {
                    return Err(DecompressError::TreeOverflow);
                }
                let next = NodeRef(self.used_nodes as u32);
                self.set_child(curr, bit, Child::Node(next));
                curr = next;
            }
        }

        Ok(())
    }

    /// Feed one bit (the low bit of `bit`) to the decode cursor.
    ///
    /// The cursor returns to the root on anything but [`DecodeStep::NeedMore`].
    pub fn decode_bit(&mut self, bit: u8) -> DecodeStep {
        let curr = self.cursor;
        let step = if curr.index() >= self.used_nodes {
            DecodeStep::Error
        } else {
            match self.nodes[curr.index()].children[(bit & 1) as usize] {
                Child::Leaf(value) => DecodeStep::Value(value),
                Child::Node(next) => {
                    self.cursor = next;
                    DecodeStep::NeedMore
                }
                Child::Unused => DecodeStep::Error,
            }
        };

        if step != DecodeStep::NeedMore {
            self.reset_cursor();
        }
        step
    }

    /// Remember the code length for `symbol`, for [`build_canonical`](Self::build_canonical).
    pub fn record_code_length(&mut self, symbol: u32, length: u32) {
        self.pending_lengths.push((symbol, length));
    }

    /// Assign canonical codes to every recorded symbol with a non-zero length.
    ///
    /// Codes are handed out in increasing length, then increasing symbol order.
    /// Fails if some length has more symbols than free codes.
    pub fn build_canonical(&mut self) -> Result<()> {
        let mut lengths = std::mem::take(&mut self.pending_lengths);
        lengths.retain(|&(_, len)| len > 0);
        lengths.sort_by_key(|&(symbol, len)| (len, symbol));

        let mut code = 0u64;
        let mut prev_len = 0u32;
        for &(symbol, len) in &lengths {
            if len > MAX_TREE_DEPTH {
                return Err(DecompressError::InconsistentCodeLengths { length: len });
            }
            if len > prev_len {
                code <<= len - prev_len;
                prev_len = len;
            }
            if code >= 1u64 << len {
                return Err(DecompressError::InconsistentCodeLengths { length: len });
            }
            self.add_code(code, len, symbol)?;
            code += 1;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_bits(tree: &mut HuffmanTree, code: u64, nbits: u32) -> DecodeStep {
        let mut step = DecodeStep::Error;
        for k in 0..nbits {
            step = tree.decode_bit(((code >> (nbits - 1 - k)) & 1) as u8);
            if k + 1 < nbits {
                assert_eq!(step, DecodeStep::NeedMore);
            }
        }
        step
    }

    #[test]
    fn test_add_code_and_decode() {
        let codes = [
            (0b0u64, 1u32, 10u32),
            (0b10, 2, 20),
            (0b110, 3, 30),
            (0b1110, 4, 40),
            (0b1111, 4, 50),
        ];
        let mut tree = HuffmanTree::new(0, 0);
        for &(code, nbits, value) in &codes {
            tree.add_code(code, nbits, value).unwrap();
        }
        assert_eq!(tree.num_codes(), 5);
        assert_eq!(tree.max_bits(), 4);

        // Decode in an order different from insertion; each value must reset the cursor.
        for &(code, nbits, value) in codes.iter().rev() {
            assert_eq!(decode_bits(&mut tree, code, nbits), DecodeStep::Value(value));
        }
        assert_eq!(decode_bits(&mut tree, 0, 1), DecodeStep::Value(10));
    }

    #[test]
    fn test_unused_branch_is_error() {
        let mut tree = HuffmanTree::new(0, 0);
        tree.add_code(0b0, 1, 1).unwrap();
        tree.add_code(0b10, 2, 2).unwrap();

        assert_eq!(tree.decode_bit(1), DecodeStep::NeedMore);
        assert_eq!(tree.decode_bit(1), DecodeStep::Error);
        // Cursor is back at the root.
        assert_eq!(tree.decode_bit(0), DecodeStep::Value(1));
    }

    #[test]
    fn test_empty_tree_is_error() {
        let mut tree = HuffmanTree::new(0, 0);
        assert_eq!(tree.decode_bit(0), DecodeStep::Error);
        assert_eq!(tree.decode_bit(1), DecodeStep::Error);
    }

    #[test]
    fn test_zero_length_code_sets_null_value() {
        let mut tree = HuffmanTree::new(0, 0);
        tree.add_code(0, 0, 77).unwrap();
        assert_eq!(tree.null_value(), 77);
        assert_eq!(tree.num_codes(), 0);
    }

    #[test]
    fn test_canonical_assignment() {
        // Lengths: A=2, B=1, C=3, D=3, E=0 (unused)
        // Canonical codes: B=0, A=10, C=110, D=111
        let mut tree = HuffmanTree::new(5, 5);
        for (symbol, len) in [(0, 2), (1, 1), (2, 3), (3, 3), (4, 0)] {
            tree.record_code_length(symbol, len);
        }
        tree.build_canonical().unwrap();

        assert_eq!(tree.num_codes(), 4);
        assert_eq!(decode_bits(&mut tree, 0b0, 1), DecodeStep::Value(1));
        assert_eq!(decode_bits(&mut tree, 0b10, 2), DecodeStep::Value(0));
        assert_eq!(decode_bits(&mut tree, 0b110, 3), DecodeStep::Value(2));
        assert_eq!(decode_bits(&mut tree, 0b111, 3), DecodeStep::Value(3));
    }

    #[test]
    fn test_canonical_oversubscribed_fails() {
        // Three 1-bit codes cannot exist.
        let mut tree = HuffmanTree::new(3, 3);
        for symbol in 0..3 {
            tree.record_code_length(symbol, 1);
        }
        assert!(matches!(
            tree.build_canonical(),
            Err(DecompressError::InconsistentCodeLengths { length: 1 })
        ));
    }

    #[test]
    fn test_node_ceiling() {
        // One code of length 3 needs three internal nodes.
        let mut tree = HuffmanTree::new(1, 2);
        assert!(matches!(
            tree.add_code(0b101, 3, 1),
            Err(DecompressError::TreeOverflow)
        ));
    }

    #[test]
    fn test_too_deep() {
        let mut tree = HuffmanTree::new(0, 0);
        assert!(tree.add_code(0, MAX_TREE_DEPTH + 1, 1).is_err());
    }
}
