//! Heavy track pipeline: LZH, then optionally RLE.
//!
//! ```text
//! payload ──► HeavySession ──► intermediate (capped) ──► RleFilter ──► output
//!                   └───────────────────────────── no RLE flag ──────► output
//! ```

use log::debug;

use super::heavy::{HeavySession, HeavyVariant};
use super::lzss::BoundedOutput;
use super::rle::RleFilter;
use super::Result;

/// Per-track parameters taken from the track header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineParams {
    pub variant: HeavyVariant,
    /// Discard the session's trees before decoding
    pub reset_trees: bool,
    /// Run the LZH output through the RLE filter
    pub rle: bool,
    /// Expected LZH output length when `rle` is set
    pub intermediate_len: usize,
    /// Expected final length
    pub output_len: usize,
}

/// Decoded track bytes plus how far the decoder overshot.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    /// At most `output_len` bytes
    pub data: Vec<u8>,
    /// Bytes produced beyond `output_len` and dropped
    pub excess: usize,
    /// Compressed bytes used by the LZH stage
    pub bytes_consumed: usize,
}

/// Decode one Heavy track.
///
/// A failure in the LZH stage fails the whole track and leaves `session`
/// poisoned. The RLE stage cannot fail; an unfinished run at the end of the
/// intermediate data is dropped.
pub fn decode_heavy_track(
    session: &mut HeavySession,
    data: &[u8],
    params: &PipelineParams,
) -> Result<PipelineOutput> {
    if !params.rle {
        let mut out = BoundedOutput::new(params.output_len);
        let outcome = session.decode_track(data, params.variant, params.reset_trees, &mut out)?;
        return Ok(PipelineOutput {
            excess: out.dropped(),
            data: out.into_inner(),
            bytes_consumed: outcome.bytes_consumed,
        });
    }

    let mut intermediate = BoundedOutput::new(params.intermediate_len);
    let outcome =
        session.decode_track(data, params.variant, params.reset_trees, &mut intermediate)?;
    debug!(
        "intermediate: {} of {} bytes",
        intermediate.len(),
        params.intermediate_len
    );

    let mut filter = RleFilter::new();
    let mut out = BoundedOutput::new(params.output_len);
    filter.add_bytes(intermediate.as_slice(), &mut out);
    if !filter.is_neutral() {
        debug!("intermediate data ends inside a run");
    }

    Ok(PipelineOutput {
        excess: out.dropped(),
        data: out.into_inner(),
        bytes_consumed: outcome.bytes_consumed,
    })
}
