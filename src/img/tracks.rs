//! # Track Engines and Formats
//!
//! This module provides tools for working with tracks at the bitstream level.
//! The `FormatConfig` struct provides everything needed to create and read Brother tracks:
//! the density variant, timing constants, the physical to logical track bias, and the
//! sector interleave.  Functions are provided to create the standard formats.
//! A format can also be created from a JSON string provided externally.
//!
//! Timing is expressed in milliseconds relative to the index hole, and the clock rate in
//! microseconds per bit cell.  The size of the bit canvas for one revolution is always
//! derived from these, it is never stored.

use std::fmt;
use std::str::FromStr;
use crate::img;
use crate::bios::skew;

pub mod bits;
pub mod brother;
pub mod brother_nibbles;
pub mod crc;
mod formats;
mod parse_user_fmt;

/// Logical tracks on a 120K disk
pub const BROTHER_TRACKS_120: usize = 39;
/// Logical tracks on a 240K disk
pub const BROTHER_TRACKS_240: usize = 78;
/// Physical track positions available to either variant
pub const BROTHER_PHYSICAL_TRACKS: i32 = 78;
/// Largest bit canvas a format may ask for, several revolutions of any real drive
pub const MAX_CANVAS_BITS: usize = 1 << 22;
pub const BROTHER_SECTORS_PER_TRACK: usize = 12;

/// Density variants.  The 120K drive steps twice per logical track.
#[derive(PartialEq,Eq,Clone,Copy,Debug)]
pub enum BrotherFormat {
    Brother120,
    Brother240
}

impl fmt::Display for BrotherFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Brother120 => write!(f,"brother120"),
            Self::Brother240 => write!(f,"brother240")
        }
    }
}

impl FromStr for BrotherFormat {
    type Err = img::Error;
    fn from_str(s: &str) -> Result<Self,Self::Err> {
        match s {
            "brother120" => Ok(Self::Brother120),
            "brother240" => Ok(Self::Brother240),
            _ => Err(img::Error::BadFormat)
        }
    }
}

impl BrotherFormat {
    pub fn logical_tracks(&self) -> usize {
        match self {
            Self::Brother120 => BROTHER_TRACKS_120,
            Self::Brother240 => BROTHER_TRACKS_240
        }
    }
}

/// Everything needed to lay out or find the sectors of a Brother track
#[derive(Clone,Debug,PartialEq)]
pub struct FormatConfig {
    pub format: BrotherFormat,
    /// microseconds per bit cell
    pub clock_rate_us: f64,
    /// physical track that holds logical track 0
    pub bias: i32,
    /// base 36 digits, one per physical slot
    pub sector_skew: String,
    pub sectors_per_track: usize,
    pub post_index_gap_ms: f64,
    pub sector_spacing_ms: f64,
    pub post_header_spacing_ms: f64,
    pub revolution_ms: f64
}

impl FormatConfig {
    /// Bits in one revolution at this clock rate
    pub fn canvas_bits(&self) -> usize {
        (self.revolution_ms * 1e3 / self.clock_rate_us) as usize
    }
    /// Convert a time offset from the index hole to a bit position
    pub fn ms_to_bits(&self,ms: f64) -> usize {
        (ms * 1e3 / self.clock_rate_us) as usize
    }
    pub fn clock_ns(&self) -> f64 {
        self.clock_rate_us * 1e3
    }
    /// Decode the skew string and make sure it is a permutation of the sector ids
    pub fn skew(&self) -> Result<Vec<usize>,img::Error> {
        let ans = skew::parse_skew(&self.sector_skew)?;
        if ans.len() != self.sectors_per_track {
            log::error!("skew has {} entries, track has {} sectors",ans.len(),self.sectors_per_track);
            return Err(img::Error::BadSkew);
        }
        let mut seen = vec![false;self.sectors_per_track];
        for id in &ans {
            if *id >= self.sectors_per_track || seen[*id] {
                log::error!("skew entry {} is repeated or out of range",id);
                return Err(img::Error::BadSkew);
            }
            seen[*id] = true;
        }
        Ok(ans)
    }
    /// Validate everything that is not checked elsewhere.  This must pass before
    /// any bit positions are derived from the timing.
    pub fn validate(&self) -> Result<(),img::Error> {
        let timing = [
            ("clock_rate_us",self.clock_rate_us),
            ("revolution_ms",self.revolution_ms),
            ("post_index_gap_ms",self.post_index_gap_ms),
            ("sector_spacing_ms",self.sector_spacing_ms),
            ("post_header_spacing_ms",self.post_header_spacing_ms)
        ];
        for (key,val) in timing {
            if !val.is_finite() {
                log::error!("{} must be finite, got {}",key,val);
                return Err(img::Error::BadFormat);
            }
        }
        if self.clock_rate_us <= 0.0 || self.revolution_ms <= 0.0 {
            log::error!("clock rate and revolution time must be positive");
            return Err(img::Error::BadFormat);
        }
        if self.post_index_gap_ms < 0.0 || self.sector_spacing_ms < 0.0 || self.post_header_spacing_ms < 0.0 {
            log::error!("timing offsets cannot be negative");
            return Err(img::Error::BadFormat);
        }
        if self.sectors_per_track == 0 {
            log::error!("track must have at least one sector");
            return Err(img::Error::BadFormat);
        }
        // compare in floating point so nothing saturates on the way
        let canvas = self.revolution_ms * 1e3 / self.clock_rate_us;
        if canvas < 1.0 || canvas > MAX_CANVAS_BITS as f64 {
            log::error!("canvas of {} bits is outside 1..={}",canvas,MAX_CANVAS_BITS);
            return Err(img::Error::BadFormat);
        }
        let last_data_ms = self.post_index_gap_ms + (self.sectors_per_track - 1) as f64 * self.sector_spacing_ms
            + self.post_header_spacing_ms;
        if last_data_ms * 1e3 / self.clock_rate_us > MAX_CANVAS_BITS as f64 {
            log::error!("last data record at {} ms is beyond any canvas",last_data_ms);
            return Err(img::Error::BadFormat);
        }
        self.skew()?;
        Ok(())
    }
    /// Map a physical track and side to the logical track, or None if the
    /// position is outside the format's envelope.
    pub fn logical_track(&self,physical_track: i32,side: usize) -> Option<usize> {
        if side != 0 {
            return None;
        }
        let track = physical_track - self.bias;
        match self.format {
            BrotherFormat::Brother120 => {
                if track < 0 || track >= BROTHER_TRACKS_120 as i32 * 2 || track % 2 != 0 {
                    return None;
                }
                Some(track as usize / 2)
            },
            BrotherFormat::Brother240 => {
                if track < 0 || track >= BROTHER_TRACKS_240 as i32 {
                    return None;
                }
                Some(track as usize)
            }
        }
    }
    /// Inverse of `logical_track` for side 0
    pub fn physical_track(&self,logical_track: usize) -> Option<i32> {
        if logical_track >= self.format.logical_tracks() {
            return None;
        }
        match self.format {
            BrotherFormat::Brother120 => Some(logical_track as i32 * 2 + self.bias),
            BrotherFormat::Brother240 => Some(logical_track as i32 + self.bias)
        }
    }
    /// Every physical track that carries data, in ascending order
    pub fn physical_tracks(&self) -> Vec<i32> {
        (0..self.format.logical_tracks()).filter_map(|t| self.physical_track(t)).collect()
    }
    /// Logical geometry of a disk written with this format
    pub fn layout(&self) -> img::SectorLayout {
        img::SectorLayout {
            tracks: self.format.logical_tracks(),
            sides: 1,
            sectors: self.sectors_per_track,
            sector_size: brother::BROTHER_DATA_RECORD_PAYLOAD,
            first_id: 0
        }
    }
}
