//! # `fluxkit` main library
//!
//! This library converts between flux level track images and decoded sectors for disks written by
//! Brother word processors, and imposes file systems on the decoded sectors.
//!
//! ## Architecture
//!
//! Disk operations are built around two traits:
//! * `img::SectorStore` holds decoded sectors by (track,side,sector id), `img::Image` is the in-memory version
//! * `fs::Filesystem` imposes a file system on a `SectorStore` through numbered logical sectors
//!
//! When a `Filesystem` object is created it takes ownership of some `SectorStore`.
//! It then uses this owned store as storage.  Any changes are not permanent until the
//! sectors are saved to whatever file system is hosting fluxkit.
//!
//! ## Tracks
//!
//! The `img::tracks` module encodes and decodes whole tracks.  A track is a `Fluxmap`, one revolution
//! of bit cells where each one-bit is a flux transition.  The layout of the track is controlled by a
//! `FormatConfig`, which can be taken from a preset or from JSON.
//!
//! ## File Systems
//!
//! As of this writing `fluxkit` supports
//! * Brother 120K word processor disks
//! * Acorn DFS (read only)
//! * FAT12
//!
//! ## Flat Dumps
//!
//! Sector images are stored on the host as flat dumps, the sector payloads in logical order.

pub mod bios;
pub mod img;
pub mod fs;

use log::{debug,info,warn};
use img::{Image,Fluxmap,SectorStore};
use img::tracks::{brother,FormatConfig};
use fs::{Filesystem,FsKind,LogicalSectors};

pub type DYNERR = Box<dyn std::error::Error>;
pub type STDRESULT = Result<(),Box<dyn std::error::Error>>;

/// Kinds in the order they are tried, most distinctive signature first
const DETECTION_ORDER: [FsKind;3] = [FsKind::Fat12,FsKind::Brother120,FsKind::AcornDfs];

/// Save the sectors as a flat dump (make changes permanent)
pub fn save_img(disk: &mut Box<dyn Filesystem>,img_path: &str) -> STDRESULT {
    std::fs::write(img_path,disk.get_store().to_raw())?;
    Ok(())
}

fn test_store(kind: FsKind,sectors: &LogicalSectors) -> bool {
    match kind {
        FsKind::Brother120 => fs::brother::Disk::test_store(sectors),
        FsKind::AcornDfs => fs::dfs::Disk::test_store(sectors),
        FsKind::Fat12 => fs::fat::Disk::test_store(sectors)
    }
}

/// Return the file system on an image, or None if one cannot be found.
/// If found, the file system takes ownership of the image.
pub fn create_fs_from_image(img: Image) -> Option<Box<dyn Filesystem>> {
    for kind in DETECTION_ORDER {
        let sectors = LogicalSectors::new(Box::new(img.clone()),&kind.layout());
        if test_store(kind,&sectors) {
            info!("identified {} file system",kind);
            return Some(fs::create_filesystem(kind,Box::new(img)));
        }
    }
    None
}

/// Given a flat dump return a file system, or Err if the dump cannot be interpreted.
/// Optional `maybe_kind` restricts the file systems that will be tried.
pub fn create_fs_from_bytestream(dat: &[u8],maybe_kind: Option<FsKind>) -> Result<Box<dyn Filesystem>,DYNERR> {
    let kinds = match maybe_kind {
        Some(kind) => vec![kind],
        None => DETECTION_ORDER.to_vec()
    };
    for kind in kinds {
        let layout = kind.layout();
        if dat.len() > layout.byte_capacity() {
            debug!("dump is too large for {}",kind);
            continue;
        }
        let img = Image::from_raw(dat,&layout)?;
        let sectors = LogicalSectors::new(Box::new(img),&layout);
        if test_store(kind,&sectors) {
            info!("identified {} file system",kind);
            return Ok(match kind {
                FsKind::Brother120 => Box::new(fs::brother::Disk::from_sectors(sectors)),
                FsKind::AcornDfs => Box::new(fs::dfs::Disk::from_sectors(sectors)),
                FsKind::Fat12 => Box::new(fs::fat::Disk::from_sectors(sectors))
            });
        }
    }
    warn!("cannot match any file system");
    Err(Box::new(fs::Error::BadFilesystem("no file system was recognized".to_string())))
}

/// Calls `create_fs_from_bytestream` getting the bytes from a file.
pub fn create_fs_from_file(img_path: &str,maybe_kind: Option<FsKind>) -> Result<Box<dyn Filesystem>,DYNERR> {
    let dat = std::fs::read(img_path)?;
    create_fs_from_bytestream(&dat,maybe_kind)
}

/// Encode every physical track that carries data.  With the `parallel` feature the tracks
/// are encoded on the rayon thread pool.  The first error aborts the whole disk.
pub fn encode_disk(image: &Image,cfg: &FormatConfig) -> Result<Vec<(i32,Fluxmap)>,img::Error> {
    cfg.validate()?;
    let tracks = cfg.physical_tracks();
    #[cfg(feature = "parallel")]
    let results: Vec<Result<Option<Fluxmap>,img::Error>> = {
        use rayon::prelude::*;
        tracks.par_iter().map(|t| brother::encode_track(*t,0,image,cfg)).collect()
    };
    #[cfg(not(feature = "parallel"))]
    let results: Vec<Result<Option<Fluxmap>,img::Error>> = tracks.iter().map(|t| brother::encode_track(*t,0,image,cfg)).collect();
    let mut ans = Vec::with_capacity(tracks.len());
    for (track,res) in tracks.iter().zip(results) {
        if let Some(flux) = res? {
            ans.push((*track,flux));
        }
    }
    debug!("encoded {} tracks",ans.len());
    Ok(ans)
}

/// Decode a set of physical tracks into a fresh image.  Tracks outside the format are skipped.
pub fn decode_disk(tracks: &[(i32,Fluxmap)],cfg: &FormatConfig) -> Result<Image,img::Error> {
    cfg.validate()?;
    let mut ans = Image::new();
    let mut good = 0;
    for (track,flux) in tracks {
        if cfg.logical_track(*track,0).is_none() {
            debug!("skipping physical track {}",track);
            continue;
        }
        good += brother::decode_into(&mut ans,flux,*track,0,cfg)?;
    }
    let expected = cfg.layout().sector_count();
    if good < expected {
        warn!("{} of {} sectors decoded cleanly",good,expected);
    }
    info!("decoded {} sectors, {} bad",ans.keys().len(),ans.bad_sectors().len());
    Ok(ans)
}
