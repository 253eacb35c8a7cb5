#![no_main]
use dms_stream::{DmsArchive, ExtraTrack, ExtractOptions, ParseOptions};
use libfuzzer_sys::fuzz_target;

// Fuzz a complete image: scan, validate, then extract every track.
fuzz_target!(|data: &[u8]| {
    let opts = ParseOptions::default();
    let archive = match DmsArchive::open_with(data, &opts) {
        Ok(a) => a,
        Err(_) => return,
    };

    let mut primary: Vec<u8> = Vec::new();
    let mut extras: Vec<ExtraTrack> = Vec::new();
    let _ = archive.extract_to(&mut primary, &mut extras, &ExtractOptions::default());
});
