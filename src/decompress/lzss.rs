//! LZ77 sliding window.
//!
//! A power-of-two ring buffer of history bytes. Every byte that enters the
//! window, literal or copied, is also handed to an [`OutputSink`].

/// Window size for heavy1 tracks.
pub const WINDOW_SIZE_HEAVY1: usize = 4096;

/// Window size for heavy2 tracks.
pub const WINDOW_SIZE_HEAVY2: usize = 8192;

/// Receiver for decompressed bytes.
pub trait OutputSink {
    /// Take one byte. Must silently drop bytes once [`has_enough`](Self::has_enough) is true.
    fn put(&mut self, byte: u8);

    /// True once the expected amount of output has been produced.
    fn has_enough(&self) -> bool;

    /// Take `count` copies of `byte`.
    fn put_run(&mut self, byte: u8, count: usize) {
        for _ in 0..count {
            self.put(byte);
        }
    }
}

/// Output buffer that stops accepting bytes at a fixed length.
///
/// Bytes offered past the limit are counted, not stored.
#[derive(Debug, Clone, Default)]
pub struct BoundedOutput {
    data: Vec<u8>,
    limit: usize,
    dropped: usize,
}

impl BoundedOutput {
    pub fn new(limit: usize) -> Self {
        Self {
            data: Vec::with_capacity(limit),
            limit,
            dropped: 0,
        }
    }

    /// Number of bytes refused because the limit was reached.
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.data
    }
}

impl OutputSink for BoundedOutput {
    #[inline]
    fn put(&mut self, byte: u8) {
        if self.data.len() < self.limit {
            self.data.push(byte);
        } else {
            self.dropped = self.dropped.saturating_add(1);
        }
    }

    #[inline]
    fn has_enough(&self) -> bool {
        self.data.len() >= self.limit
    }

    fn put_run(&mut self, byte: u8, count: usize) {
        let room = self.limit - self.data.len();
        let stored = count.min(room);
        self.data.resize(self.data.len() + stored, byte);
        self.dropped = self.dropped.saturating_add(count - stored);
    }
}

/// Circular history buffer.
#[derive(Debug, Clone)]
pub struct RingBuffer {
    window: Vec<u8>,
    /// Window size mask for wrap-around
    mask: usize,
    /// Write cursor; grows without bound, masked on access
    pos: usize,
}

impl RingBuffer {
    /// Create a zero-filled window of `window_size` bytes (a power of two).
    pub fn new(window_size: usize) -> Self {
        debug_assert!(window_size.is_power_of_two());
        Self {
            window: vec![0; window_size],
            mask: window_size - 1,
            pos: 0,
        }
    }

    /// Window capacity in bytes.
    pub fn size(&self) -> usize {
        self.window.len()
    }

    /// Current write cursor.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Write one byte into the window and pass it to the sink.
    #[inline]
    pub fn add_literal<S: OutputSink + ?Sized>(&mut self, byte: u8, sink: &mut S) {
        self.window[self.pos & self.mask] = byte;
        self.pos = self.pos.wrapping_add(1);
        sink.put(byte);
    }

    /// Replay `length` bytes starting at window position `start`.
    ///
    /// Each copied byte is re-added as a literal, so a source range that
    /// overlaps the cursor repeats the bytes just written. `length` may exceed
    /// the window size.
    pub fn copy_from_history<S: OutputSink + ?Sized>(
        &mut self,
        start: usize,
        length: usize,
        sink: &mut S,
    ) {
        for i in 0..length {
            let byte = self.window[start.wrapping_add(i) & self.mask];
            self.add_literal(byte, sink);
        }
    }

    /// Copy `length` bytes from `offset + 1` bytes behind the cursor.
    #[inline]
    pub fn copy_match<S: OutputSink + ?Sized>(
        &mut self,
        offset: usize,
        length: usize,
        sink: &mut S,
    ) {
        let start = self.pos.wrapping_sub(offset).wrapping_sub(1);
        self.copy_from_history(start, length, sink);
    }
}
