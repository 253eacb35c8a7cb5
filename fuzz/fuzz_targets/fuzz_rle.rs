#![no_main]
use dms_stream::decompress::{BoundedOutput, OutputSink};
use dms_stream::RleFilter;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if data.len() < 2 {
        return;
    }

    let limit = u16::from_be_bytes([data[0], data[1]]) as usize;
    let mut out = BoundedOutput::new(limit);
    let mut filter = RleFilter::new();

    // Feed in two halves; state must carry across calls.
    let (a, b) = data[2..].split_at((data.len() - 2) / 2);
    filter.add_bytes(a, &mut out);
    filter.add_bytes(b, &mut out);
    assert!(out.len() <= limit);
    let _ = out.has_enough();
});
