//! Amiga DMS disk image extraction.
//!
//! Reads DMS ("Disk Masher System") archives and rebuilds the raw disk image
//! track by track. Tracks stored uncompressed, RLE-packed ("simple") or with
//! the LZH "heavy" methods are supported; heavy trees and history persist
//! across tracks exactly as the packer wrote them.
//!
//! ## Example
//!
//! ```rust,no_run
//! use dms_stream::{DmsArchive, ExtractOptions};
//!
//! let archive = DmsArchive::open_path("workbench.dms")?;
//! let image = archive.extract(&ExtractOptions::default())?;
//! if !image.report.is_complete() {
//!     eprintln!("disk image is incomplete");
//! }
//! std::fs::write("workbench.adf", &image.data)?;
//! # Ok::<(), dms_stream::DmsError>(())
//! ```
//!
//! ## Features
//! - `async` - Load archives with tokio

pub mod archive;
pub mod checksum;
pub mod decompress;
pub mod error;
mod file_media;
pub mod formats;
pub mod parsing;

pub use archive::{
    ChecksumPolicy, DiskImage, DmsArchive, ExtractOptions, ExtractReport, IntegrityWarning,
    ParseOptions, TrackEntry, TrackReport, TrackStatus,
};
pub use error::DmsError;
pub use file_media::{
    ByteSink, DirectoryExtras, ExtraTrack, ExtraTrackSink, FileMedia, FileSink, LocalFileMedia,
    ReadInterval,
};

// Re-export decompression types
pub use decompress::{
    decode_heavy_track, CompressionMethod, DecompressError, HeavySession, HeavyVariant,
    PipelineOutput, PipelineParams, RleFilter,
};
