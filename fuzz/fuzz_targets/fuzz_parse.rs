#![no_main]
use dms_stream::parsing::{FileHeaderParser, TrackHeaderParser};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let _ = FileHeaderParser::parse(data);
    let _ = TrackHeaderParser::parse(data);
});
