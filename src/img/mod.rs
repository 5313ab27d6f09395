//! # Disk Image Module
//!
//! Decoded disks are represented by objects implementing the `SectorStore` trait.
//! The in-memory implementation is `Image`, which is simply a map from sector address to `Sector`.
//!
//! ## Relation to Tracks
//!
//! The `tracks` submodule turns the contents of a `SectorStore` into one `Fluxmap` per physical
//! track, and goes the other way when a flux capture is decoded.  The image itself knows nothing
//! about flux, it only holds sectors addressed by logical track, side, and sector id.
//!
//! ## Relation to File Systems
//!
//! The `SectorStore` trait object serves as the underlying storage for `fs` modules.
//! The `fs` modules never see track, side, or sector addresses, they work in terms
//! of logical sectors, with the translation handled by `fs::LogicalSectors`.
//!
//! ## Flat Dumps
//!
//! A flat dump is the sequence of sector payloads ordered by track, then side, then sector id.
//! The geometry needed to interpret the dump is carried by `SectorLayout`.

pub mod tracks;

use std::collections::BTreeMap;
use std::fmt;
use bit_vec::BitVec;
use log::{debug,warn};

/// Enumerates fatal image and track errors.  These terminate the current encode or decode call.
#[derive(thiserror::Error,Debug,Clone,PartialEq)]
pub enum Error {
    #[error("track data overrun")]
    TrackOverrun,
    #[error("sector payload has {actual} bytes, format requires {expected}")]
    PayloadSize { expected: usize, actual: usize },
    #[error("value {0} is outside the symbol alphabet")]
    SymbolDomain(usize),
    #[error("sector skew could not be interpreted")]
    BadSkew,
    #[error("format configuration is not valid")]
    BadFormat,
    #[error("unable to access sector")]
    SectorAccess,
    #[error("geometric coordinate out of range")]
    GeometryMismatch,
    #[error("metadata mismatch")]
    MetadataMismatch
}

/// Errors pertaining to GCR decoding.  These are local to a record, the decoder
/// turns them into a sector status and keeps going.
#[derive(thiserror::Error,Debug,Clone,PartialEq)]
pub enum NibbleError {
    #[error("invalid code while decoding")]
    InvalidCode,
    #[error("bad checksum found in a sector")]
    BadChecksum,
    #[error("record trailer is damaged")]
    BadTrailer,
    #[error("could not find bit pattern")]
    BitPatternNotFound
}

/// Integrity of a sector as it came off the disk
#[derive(PartialEq,Eq,Clone,Copy,Debug)]
pub enum SectorStatus {
    Ok,
    BadChecksum,
    BadCode
}

/// A sector as held by an image.  The address is duplicated here so that a sector
/// can travel on its own, e.g. out of a track decoder.
#[derive(Clone,Debug,PartialEq)]
pub struct Sector {
    pub track: usize,
    pub side: usize,
    pub id: usize,
    pub data: Vec<u8>,
    pub status: SectorStatus
}

impl Sector {
    pub fn new(track: usize,side: usize,id: usize,data: Vec<u8>) -> Self {
        Self {
            track,
            side,
            id,
            data,
            status: SectorStatus::Ok
        }
    }
    pub fn is_bad(&self) -> bool {
        self.status != SectorStatus::Ok
    }
}

/// Abstract mapping from (track, side, sector-id) to a sector record.
pub trait SectorStore {
    fn get(&self,track: usize,side: usize,id: usize) -> Option<&Sector>;
    /// Commit a sector, the address arguments take precedence over the address in the sector.
    fn put(&mut self,track: usize,side: usize,id: usize,sector: Sector);
    /// All addresses present, in ascending order
    fn keys(&self) -> Vec<(usize,usize,usize)>;
}

/// Logical geometry of a disk, used to order sectors in flat dumps
/// and to number logical sectors for file systems.
#[derive(Clone,Copy,Debug,PartialEq,Eq)]
pub struct SectorLayout {
    pub tracks: usize,
    pub sides: usize,
    pub sectors: usize,
    pub sector_size: usize,
    /// id of the first sector on a track, usually 0 or 1
    pub first_id: usize
}

impl SectorLayout {
    pub fn sector_count(&self) -> usize {
        self.tracks * self.sides * self.sectors
    }
    pub fn byte_capacity(&self) -> usize {
        self.sector_count() * self.sector_size
    }
    /// Address of a logical sector, ordered by track, side, sector id
    pub fn locate(&self,lsec: usize) -> Option<(usize,usize,usize)> {
        if lsec >= self.sector_count() {
            return None;
        }
        let per_track = self.sides * self.sectors;
        let track = lsec / per_track;
        let side = (lsec % per_track) / self.sectors;
        let id = self.first_id + lsec % self.sectors;
        Some((track,side,id))
    }
}

impl fmt::Display for SectorLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f,"{}/{}/{}x{}",self.tracks,self.sides,self.sectors,self.sector_size)
    }
}

/// In-memory collection of sectors.  Owns every sector it contains.
#[derive(Clone,Default)]
pub struct Image {
    sectors: BTreeMap<(usize,usize,usize),Sector>
}

impl Image {
    pub fn new() -> Self {
        Self::default()
    }
    /// Image with every sector of the layout present and zeroed
    pub fn blank(layout: &SectorLayout) -> Self {
        let mut ans = Self::new();
        for lsec in 0..layout.sector_count() {
            if let Some((track,side,id)) = layout.locate(lsec) {
                ans.put(track,side,id,Sector::new(track,side,id,vec![0;layout.sector_size]));
            }
        }
        ans
    }
    /// Build from a flat dump.  A short dump leaves the trailing sectors missing.
    pub fn from_raw(dat: &[u8],layout: &SectorLayout) -> Result<Self,Error> {
        if dat.len() > layout.byte_capacity() {
            debug!("flat dump of {} bytes exceeds layout {}",dat.len(),layout);
            return Err(Error::GeometryMismatch);
        }
        let mut ans = Self::new();
        for (lsec,chunk) in dat.chunks(layout.sector_size).enumerate() {
            let (track,side,id) = layout.locate(lsec).ok_or(Error::GeometryMismatch)?;
            let mut buf = chunk.to_vec();
            buf.resize(layout.sector_size,0);
            ans.put(track,side,id,Sector::new(track,side,id,buf));
        }
        Ok(ans)
    }
    /// Produce a flat dump, missing sectors are written as zeros
    pub fn to_raw(&self,layout: &SectorLayout) -> Vec<u8> {
        let mut ans = Vec::with_capacity(layout.byte_capacity());
        for lsec in 0..layout.sector_count() {
            let mut buf = vec![0;layout.sector_size];
            if let Some((track,side,id)) = layout.locate(lsec) {
                match self.get(track,side,id) {
                    Some(sec) => {
                        let end = usize::min(sec.data.len(),layout.sector_size);
                        buf[0..end].copy_from_slice(&sec.data[0..end]);
                    },
                    None => warn!("sector {},{},{} missing, writing zeros",track,side,id)
                }
            }
            ans.append(&mut buf);
        }
        ans
    }
    pub fn len(&self) -> usize {
        self.sectors.len()
    }
    pub fn is_empty(&self) -> bool {
        self.sectors.is_empty()
    }
    pub fn bad_sectors(&self) -> Vec<(usize,usize,usize)> {
        self.sectors.iter().filter(|(_,s)| s.is_bad()).map(|(k,_)| *k).collect()
    }
    pub fn get_mut(&mut self,track: usize,side: usize,id: usize) -> Option<&mut Sector> {
        self.sectors.get_mut(&(track,side,id))
    }
}

impl SectorStore for Image {
    fn get(&self,track: usize,side: usize,id: usize) -> Option<&Sector> {
        self.sectors.get(&(track,side,id))
    }
    fn put(&mut self,track: usize,side: usize,id: usize,mut sector: Sector) {
        sector.track = track;
        sector.side = side;
        sector.id = id;
        self.sectors.insert((track,side,id),sector);
    }
    fn keys(&self) -> Vec<(usize,usize,usize)> {
        self.sectors.keys().copied().collect()
    }
}

/// One revolution of one physical track as a sequence of bit cells.
/// A one-bit is a flux transition.  Immutable once built.
#[derive(Clone,Debug,PartialEq)]
pub struct Fluxmap {
    bits: BitVec,
    clock_ns: f64
}

impl Fluxmap {
    pub fn new(bits: BitVec,clock_ns: f64) -> Self {
        Self { bits, clock_ns }
    }
    pub fn bits(&self) -> &BitVec {
        &self.bits
    }
    /// time per bit cell in nanoseconds
    pub fn clock_ns(&self) -> f64 {
        self.clock_ns
    }
    pub fn len(&self) -> usize {
        self.bits.len()
    }
    pub fn is_empty(&self) -> bool {
        self.bits.is_empty()
    }
    pub fn duration_ns(&self) -> f64 {
        self.bits.len() as f64 * self.clock_ns
    }
    /// Intervals between successive transitions in nanoseconds, the first interval
    /// is measured from the index hole.  Trailing cells after the last transition are dropped.
    pub fn transition_intervals_ns(&self) -> Vec<f64> {
        let mut ans = Vec::new();
        let mut cells = 0;
        for b in self.bits.iter() {
            cells += 1;
            if b {
                ans.push(cells as f64 * self.clock_ns);
                cells = 0;
            }
        }
        ans
    }
}
