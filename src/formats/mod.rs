//! DMS signatures and timestamps.

/// Container signature detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signature {
    /// Amiga DMS disk image
    Dms,
}

impl Signature {
    pub const DMS: &[u8; 4] = b"DMS!";

    pub fn from_bytes(data: &[u8]) -> Option<Self> {
        if data.starts_with(Self::DMS) {
            Some(Self::Dms)
        } else {
            None
        }
    }
}

/// Signature at the start of every track record.
pub const TRACK_SIGNATURE: &[u8; 2] = b"TR";

/// Raw timestamp value (Unix nanoseconds).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RawTimestamp {
    pub nanos: i64,
}

impl RawTimestamp {
    /// DMS stores creation time as unsigned seconds since 1970.
    pub fn from_unix_secs(secs: u32) -> Self {
        Self {
            nanos: secs as i64 * 1_000_000_000,
        }
    }

    pub fn unix_secs(self) -> i64 {
        self.nanos.div_euclid(1_000_000_000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature() {
        assert_eq!(Signature::from_bytes(b"DMS!\0\0\0\0"), Some(Signature::Dms));
        assert_eq!(Signature::from_bytes(b"DMS"), None);
        assert_eq!(Signature::from_bytes(b"PK\x03\x04"), None);
    }

    #[test]
    fn test_timestamp() {
        let ts = RawTimestamp::from_unix_secs(0x2A3B_4C5D);
        assert_eq!(ts.unix_secs(), 0x2A3B_4C5D);
        assert_eq!(ts.nanos, 0x2A3B_4C5D_i64 * 1_000_000_000);
        // Past 2038 stays positive.
        assert!(RawTimestamp::from_unix_secs(u32::MAX).nanos > 0);
    }
}
