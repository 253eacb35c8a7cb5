//! DMS header parsing modules.

pub mod file_header;
pub mod track_header;

pub use file_header::{FileHeader, FileHeaderParser, MAX_TRACKS};
pub use track_header::{TrackHeader, TrackHeaderParser, TRACK_FLAG_RESET_TREES, TRACK_FLAG_RLE};
