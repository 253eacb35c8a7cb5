#![no_main]
use dms_stream::{decode_heavy_track, HeavySession, HeavyVariant, PipelineParams};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if data.len() < 5 {
        return;
    }

    // First 5 bytes: flags, output length, intermediate length (capped to one track pair)
    let flags = data[0];
    let output_len = u16::from_be_bytes([data[1], data[2]]) as usize % 32768;
    let intermediate_len = u16::from_be_bytes([data[3], data[4]]) as usize % 32768;
    let params = PipelineParams {
        variant: if flags & 1 == 0 {
            HeavyVariant::Heavy1
        } else {
            HeavyVariant::Heavy2
        },
        reset_trees: true,
        rle: flags & 2 != 0,
        intermediate_len,
        output_len,
    };

    // Decode the rest twice so the second pass reuses the trees.
    let mut session = HeavySession::new();
    let payload = &data[5..];
    if decode_heavy_track(&mut session, payload, &params).is_ok() {
        let reuse = PipelineParams {
            reset_trees: false,
            ..params
        };
        let _ = decode_heavy_track(&mut session, payload, &reuse);
    }
});
