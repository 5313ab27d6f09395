
//! Functions to create standard formats
//! 
//! These functions appear as implementations of `FormatConfig`.
//! Both densities share timing, they differ only in how the head is stepped.

use super::*;

/// Interleave used by the Brother word processors
pub const BROTHER_SKEW: &str = "05a3816b4927";

impl FormatConfig {
    fn brother(format: BrotherFormat) -> Self {
        Self {
            format,
            clock_rate_us: 3.83,
            bias: 0,
            sector_skew: BROTHER_SKEW.to_string(),
            sectors_per_track: BROTHER_SECTORS_PER_TRACK,
            post_index_gap_ms: 1.0,
            sector_spacing_ms: 16.2,
            post_header_spacing_ms: 0.69,
            revolution_ms: 200.0
        }
    }
    /// 120K disks, 39 tracks, written on every other physical track
    pub fn brother_120() -> Self {
        Self::brother(BrotherFormat::Brother120)
    }
    /// 240K disks, 78 tracks
    pub fn brother_240() -> Self {
        Self::brother(BrotherFormat::Brother240)
    }
    pub fn from_format(format: BrotherFormat) -> Self {
        Self::brother(format)
    }
}
