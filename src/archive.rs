//! DmsArchive - track scanning, validation and extraction.
//!
//! Opening an archive reads the file header and every track header, decides
//! which records are the "real" tracks of the disk image and rejects layouts
//! that cannot be decoded. Extraction then walks the records in file order,
//! carrying one [`HeavySession`] across all Heavy tracks.

use std::fmt;

use log::{debug, error, warn};

use crate::checksum::{crc16, track_checksum};
use crate::decompress::{
    decode_heavy_track, BoundedOutput, CompressionMethod, DecompressError, HeavySession,
    OutputSink, PipelineParams, RleFilter,
};
use crate::error::{DmsError, Result};
use crate::file_media::{ByteSink, ExtraTrack, ExtraTrackSink, FileMedia, LocalFileMedia};
use crate::formats::Signature;
use crate::parsing::{FileHeader, FileHeaderParser, TrackHeader, TrackHeaderParser, MAX_TRACKS};

/// Options for opening an archive.
#[derive(Debug, Clone)]
pub struct ParseOptions {
    /// Track records beyond this count make the file invalid.
    pub max_tracks: usize,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            max_tracks: MAX_TRACKS as usize,
        }
    }
}

/// What to do when a decoded track's checksum differs from its header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChecksumPolicy {
    /// Keep the track and record a warning.
    #[default]
    Warn,
    /// Fail the track.
    Reject,
}

/// Options for extraction.
#[derive(Debug, Clone)]
pub struct ExtractOptions {
    pub checksum_policy: ChecksumPolicy,
    /// Check the CRC-16 of the file header, track headers and payloads.
    pub verify_crc: bool,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            checksum_policy: ChecksumPolicy::Warn,
            verify_crc: true,
        }
    }
}

/// One track record found while scanning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackEntry {
    /// Position of the track header in the file
    pub offset: u64,
    pub header: TrackHeader,
    /// Part of the disk image rather than a side payload
    pub is_real: bool,
}

impl TrackEntry {
    pub fn track_num(&self) -> u16 {
        self.header.track_num
    }

    pub fn data_offset(&self) -> u64 {
        self.offset + TrackHeaderParser::HEADER_SIZE as u64
    }

    /// "track N" or "extra track N", for messages.
    pub fn short_name(&self) -> String {
        if self.is_real {
            format!("track {}", self.track_num())
        } else {
            format!("extra track {}", self.track_num())
        }
    }

    pub fn extra_file_name(&self) -> String {
        format!("extratrack{}.bin", self.track_num())
    }
}

/// A mismatch found while checking a track. It never fails the track on its
/// own, and is reported whether or not the track was written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntegrityWarning {
    HeaderCrc { reported: u16, calculated: u16 },
    DataCrc { reported: u16, calculated: u16 },
    Checksum { reported: u16, calculated: u16 },
    /// The decoder produced more than the header promised; the rest was dropped.
    OutputTooLong { expected: usize, got: usize },
}

impl fmt::Display for IntegrityWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HeaderCrc {
                reported,
                calculated,
            } => write!(
                f,
                "Header CRC check failed: reported {:#06x}, calculated {:#06x}",
                reported, calculated
            ),
            Self::DataCrc {
                reported,
                calculated,
            } => write!(
                f,
                "Data CRC check failed: reported {:#06x}, calculated {:#06x}",
                reported, calculated
            ),
            Self::Checksum {
                reported,
                calculated,
            } => write!(
                f,
                "Checksum check failed: reported {:#06x}, calculated {:#06x}",
                reported, calculated
            ),
            Self::OutputTooLong { expected, got } => {
                write!(f, "Expected {} decompressed bytes, got {}", expected, got)
            }
        }
    }
}

#[derive(Debug)]
pub enum TrackStatus {
    /// Appended to the image, or handed to the extra-track sink.
    Written,
    Failed(DmsError),
    /// Real track not attempted because an earlier real track failed.
    Skipped,
}

#[derive(Debug)]
pub struct TrackReport {
    pub track_num: u16,
    pub is_real: bool,
    pub method: u8,
    pub status: TrackStatus,
    pub warnings: Vec<IntegrityWarning>,
}

impl TrackReport {
    fn new(entry: &TrackEntry, status: TrackStatus) -> Self {
        Self {
            track_num: entry.track_num(),
            is_real: entry.is_real,
            method: entry.header.method,
            status,
            warnings: Vec::new(),
        }
    }

    pub fn is_written(&self) -> bool {
        matches!(self.status, TrackStatus::Written)
    }
}

/// Per-track outcome of an extraction, in file order.
#[derive(Debug, Default)]
pub struct ExtractReport {
    pub header_warnings: Vec<IntegrityWarning>,
    pub tracks: Vec<TrackReport>,
}

impl ExtractReport {
    /// True if every real track made it into the image.
    pub fn is_complete(&self) -> bool {
        self.tracks
            .iter()
            .filter(|t| t.is_real)
            .all(TrackReport::is_written)
    }

    pub fn failed(&self) -> impl Iterator<Item = &TrackReport> {
        self.tracks
            .iter()
            .filter(|t| matches!(t.status, TrackStatus::Failed(_)))
    }

    pub fn warning_count(&self) -> usize {
        self.header_warnings.len() + self.tracks.iter().map(|t| t.warnings.len()).sum::<usize>()
    }
}

/// Fully extracted image held in memory.
#[derive(Debug)]
pub struct DiskImage {
    /// Real tracks in order, up to the first failure
    pub data: Vec<u8>,
    pub extras: Vec<ExtraTrack>,
    pub report: ExtractReport,
}

/// An opened DMS image.
#[derive(Debug, Clone)]
pub struct DmsArchive<M> {
    media: M,
    header: FileHeader,
    tracks: Vec<TrackEntry>,
}

impl<M: FileMedia> DmsArchive<M> {
    pub fn open(media: M) -> Result<Self> {
        Self::open_with(media, &ParseOptions::default())
    }

    /// Read the file header, scan all track records and check that the real
    /// tracks are complete and in order. No track is decompressed.
    pub fn open_with(media: M, opts: &ParseOptions) -> Result<Self> {
        let have = media.length();
        let magic_len = Signature::DMS.len();
        if have >= magic_len as u64 && Signature::from_bytes(&media.read_at(0, magic_len)?).is_none()
        {
            return Err(DmsError::InvalidSignature);
        }
        if have < FileHeaderParser::HEADER_SIZE as u64 {
            return Err(DmsError::BufferTooSmall {
                needed: FileHeaderParser::HEADER_SIZE,
                have: have as usize,
            });
        }

        let buf = media.read_at(0, FileHeaderParser::HEADER_SIZE)?;
        let header = FileHeaderParser::parse(&buf)?;

        let mut tracks = scan_tracks(&media, opts)?;
        mark_real_tracks(&mut tracks, &header)?;
        check_track_order(&tracks, &header)?;

        Ok(Self {
            media,
            header,
            tracks,
        })
    }

    pub fn header(&self) -> &FileHeader {
        &self.header
    }

    /// All track records in file order.
    pub fn tracks(&self) -> &[TrackEntry] {
        &self.tracks
    }

    pub fn real_tracks(&self) -> impl Iterator<Item = &TrackEntry> {
        self.tracks.iter().filter(|t| t.is_real)
    }

    pub fn media(&self) -> &M {
        &self.media
    }

    /// Decode every track in file order.
    ///
    /// Real tracks are appended to `primary`, others go to `extras`. A failed
    /// real track stops all later real tracks; extra tracks are still tried.
    /// A failed Heavy track disables all later Heavy tracks.
    ///
    /// Returns an error only when the whole file must be abandoned; whatever
    /// was appended to `primary` up to that point stays there.
    pub fn extract_to<P, E>(
        &self,
        primary: &mut P,
        extras: &mut E,
        opts: &ExtractOptions,
    ) -> Result<ExtractReport>
    where
        P: ByteSink + ?Sized,
        E: ExtraTrackSink + ?Sized,
    {
        if self.header.is_encrypted() {
            return Err(DmsError::EncryptedNotSupported);
        }

        let mut report = ExtractReport::default();
        if opts.verify_crc && !self.header.crc_matches() {
            let warning = IntegrityWarning::HeaderCrc {
                reported: self.header.crc,
                calculated: self.header.crc_calculated,
            };
            warn!("[file header] {}", warning);
            report.header_warnings.push(warning);
        }

        let mut session = None;
        let mut real_failed = false;

        for entry in &self.tracks {
            if real_failed && entry.is_real {
                debug!("[{}] skipped", entry.short_name());
                report
                    .tracks
                    .push(TrackReport::new(entry, TrackStatus::Skipped));
                continue;
            }

            let mut warnings = Vec::new();
            let result = self.decode_track(entry, &mut session, opts, &mut warnings);
            for warning in &warnings {
                warn!("[{}] {}", entry.short_name(), warning);
            }

            let status = match result {
                Ok(data) => {
                    if entry.is_real {
                        primary.append(&data)?;
                    } else {
                        extras.write_extra(entry.track_num(), &entry.extra_file_name(), &data)?;
                    }
                    TrackStatus::Written
                }
                Err(e) => {
                    error!("[{}] {}", entry.short_name(), e);
                    if e.is_structural() {
                        return Err(e);
                    }
                    if entry.is_real {
                        real_failed = true;
                    }
                    TrackStatus::Failed(e)
                }
            };
            let mut track_report = TrackReport::new(entry, status);
            track_report.warnings = warnings;
            report.tracks.push(track_report);
        }

        Ok(report)
    }

    /// Decode the whole image into memory.
    pub fn extract(&self, opts: &ExtractOptions) -> Result<DiskImage> {
        let mut data = Vec::new();
        let mut extras: Vec<ExtraTrack> = Vec::new();
        let report = self.extract_to(&mut data, &mut extras, opts)?;
        Ok(DiskImage {
            data,
            extras,
            report,
        })
    }

    /// Decode one track; any failure of a Heavy track poisons the session.
    ///
    /// Integrity warnings land in `warnings` even when the track fails.
    fn decode_track(
        &self,
        entry: &TrackEntry,
        session: &mut Option<HeavySession>,
        opts: &ExtractOptions,
        warnings: &mut Vec<IntegrityWarning>,
    ) -> Result<Vec<u8>> {
        let result = self.decode_track_inner(entry, session, opts, warnings);
        if result.is_err() && entry.header.is_heavy() {
            session.get_or_insert_with(HeavySession::new).poison();
        }
        result
    }

    fn decode_track_inner(
        &self,
        entry: &TrackEntry,
        session: &mut Option<HeavySession>,
        opts: &ExtractOptions,
        warnings: &mut Vec<IntegrityWarning>,
    ) -> Result<Vec<u8>> {
        let h = &entry.header;
        let name = entry.short_name();
        debug!(
            "[{}] at {}: cmpr len {}, intermediate len {}, uncmpr len {}, flags {:#04x}, method {} ({})",
            name,
            entry.offset,
            h.cmpr_len,
            h.intermediate_len,
            h.uncmpr_len,
            h.flags,
            h.method,
            CompressionMethod::name_of(h.method)
        );

        if opts.verify_crc && h.header_crc != h.header_crc_calculated {
            warnings.push(IntegrityWarning::HeaderCrc {
                reported: h.header_crc,
                calculated: h.header_crc_calculated,
            });
        }

        if entry.data_offset() + h.cmpr_len as u64 > self.media.length() {
            return Err(DecompressError::TrackOutOfBounds.into());
        }
        let payload = self.media.read_at(entry.data_offset(), h.cmpr_len as usize)?;

        if opts.verify_crc {
            let calculated = crc16(&payload);
            if calculated != h.data_crc {
                warnings.push(IntegrityWarning::DataCrc {
                    reported: h.data_crc,
                    calculated,
                });
            }
        }

        let expected = h.uncmpr_len as usize;
        let (data, excess) = match CompressionMethod::from_u8(h.method) {
            Some(CompressionMethod::Uncompressed) => {
                let mut out = BoundedOutput::new(expected);
                for &b in &payload {
                    out.put(b);
                }
                finish_output(out)
            }
            Some(CompressionMethod::Simple) => {
                let mut out = BoundedOutput::new(expected);
                RleFilter::new().add_bytes(&payload, &mut out);
                finish_output(out)
            }
            Some(method) if method.is_heavy() => {
                let variant = method
                    .heavy_variant()
                    .ok_or(DecompressError::UnsupportedMethod(h.method))?;
                let session = session.get_or_insert_with(HeavySession::new);
                let out = decode_heavy_track(
                    session,
                    &payload,
                    &PipelineParams {
                        variant,
                        reset_trees: h.resets_trees(),
                        rle: h.uses_rle(),
                        intermediate_len: h.intermediate_len as usize,
                        output_len: expected,
                    },
                )?;
                debug!(
                    "[{}] used {} of {} compressed bytes",
                    name,
                    out.bytes_consumed,
                    payload.len()
                );
                (out.data, out.excess)
            }
            _ => return Err(DecompressError::UnsupportedMethod(h.method).into()),
        };

        if data.len() < expected {
            return Err(DecompressError::OutputTooShort {
                expected,
                got: data.len(),
            }
            .into());
        }
        if excess > 0 {
            warnings.push(IntegrityWarning::OutputTooLong {
                expected,
                got: expected + excess,
            });
        }

        let calculated = track_checksum(&data);
        debug!("[{}] checksum (calculated): {:#06x}", name, calculated);
        if calculated != h.checksum {
            if opts.checksum_policy == ChecksumPolicy::Reject {
                return Err(DmsError::ChecksumMismatch {
                    reported: h.checksum,
                    calculated,
                });
            }
            warnings.push(IntegrityWarning::Checksum {
                reported: h.checksum,
                calculated,
            });
        }

        Ok(data)
    }
}

impl DmsArchive<LocalFileMedia> {
    /// Open a DMS file on disk, reading tracks on demand.
    pub fn open_path(path: impl AsRef<std::path::Path>) -> Result<Self> {
        Self::open(LocalFileMedia::new(path)?)
    }
}

impl DmsArchive<Vec<u8>> {
    /// Load a DMS file into memory asynchronously and open it.
    #[cfg(feature = "async")]
    #[cfg_attr(docsrs, doc(cfg(feature = "async")))]
    pub async fn open_path_async(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let media = LocalFileMedia::new(path)?;
        let data = media.read_all_async().await?;
        Self::open(data)
    }
}

/// Decoded bytes and the count dropped past the limit.
fn finish_output(out: BoundedOutput) -> (Vec<u8>, usize) {
    let excess = out.dropped();
    (out.into_inner(), excess)
}

fn scan_tracks<M: FileMedia + ?Sized>(media: &M, opts: &ParseOptions) -> Result<Vec<TrackEntry>> {
    debug!("scanning file");
    let header_size = TrackHeaderParser::HEADER_SIZE as u64;
    let mut tracks = Vec::new();
    let mut pos = FileHeaderParser::HEADER_SIZE as u64;

    while pos + header_size <= media.length() {
        let buf = media.read_at(pos, TrackHeaderParser::HEADER_SIZE)?;
        if !TrackHeaderParser::has_signature(&buf) {
            debug!("track not found at {}; assuming disk image ends here", pos);
            break;
        }
        if tracks.len() >= opts.max_tracks {
            return Err(DmsError::TooManyTracks(opts.max_tracks));
        }

        let header = TrackHeaderParser::parse(&buf)?;
        debug!(
            "track[{}] at {}, #{}, len={}/{}, method={}, flags={:#04x}",
            tracks.len(),
            pos,
            header.track_num,
            header.cmpr_len,
            header.uncmpr_len,
            header.method,
            header.flags
        );

        let next = pos + header_size + header.cmpr_len as u64;
        tracks.push(TrackEntry {
            offset: pos,
            header,
            is_real: false,
        });
        pos = next;
    }

    Ok(tracks)
}

/// The real track for each number in range is its last record in the file.
fn mark_real_tracks(tracks: &mut [TrackEntry], header: &FileHeader) -> Result<()> {
    for num in header.first_track..=header.last_track {
        let index = tracks
            .iter()
            .rposition(|t| t.track_num() == num)
            .ok_or(DmsError::MissingTrack(num))?;
        tracks[index].is_real = true;
    }
    Ok(())
}

fn check_track_order(tracks: &[TrackEntry], header: &FileHeader) -> Result<()> {
    let mut expected = header.first_track;
    for track in tracks.iter().filter(|t| t.is_real) {
        if track.track_num() != expected {
            return Err(DmsError::TracksOutOfOrder {
                expected,
                found: track.track_num(),
            });
        }
        expected = track.track_num() + 1;
    }
    Ok(())
}
