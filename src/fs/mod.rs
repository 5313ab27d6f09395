//! # File System Module
//!
//! File system modules handle interactions with directories and files.  There is a sub-module for
//! each supported file system.
//!
//! File systems are represented by the `Filesystem` trait.  The trait object takes ownership of
//! some `SectorStore`, wrapped in `LogicalSectors`, which it uses as storage.  Every operation
//! has a default implementation that fails with `Error::Unimplemented`, so that a file system
//! only provides what it can actually do.
//!
//! File systems never see physical addresses.  They read and write numbered logical sectors,
//! and `LogicalSectors` translates the number into a (track,side,sector) address using a
//! `SectorLayout`.  This is what lets one file system serve many physical disk layouts.
//!
//! Damaged sectors are tolerated: reading one returns whatever data was recovered, and the
//! `check` operation classifies the damage according to `FilesystemStatus`.

pub mod brother;
pub mod dfs;
pub mod fat;

use std::fmt;
use std::str::FromStr;
use std::collections::BTreeMap;
use log::{debug,warn};
use crate::img::{self,SectorStore,SectorLayout};

pub const META_FILENAME: &str = "filename";
pub const META_LENGTH: &str = "length";
pub const META_FILE_TYPE: &str = "file_type";
pub const META_MODE: &str = "mode";

/// Enumerates file system errors.  The `Display` trait will print equivalent long message.
/// Callers are expected to match on the variant, the string is detail for humans.
#[derive(thiserror::Error,Debug,Clone,PartialEq)]
pub enum Error {
    #[error("Bad path: {0}")]
    BadPath(String),
    #[error("File not found: {0}")]
    FileNotFound(String),
    #[error("Invalid filesystem: {0}")]
    BadFilesystem(String),
    #[error("Read only filesystem: {0}")]
    ReadOnlyFilesystem(String),
    #[error("Unimplemented operation: {0}")]
    Unimplemented(String),
    #[error("Disk full: {0}")]
    DiskFull(String)
}

/// Location inside a file system's namespace, the empty path is the root
#[derive(Clone,Debug,PartialEq,Eq,Hash,Default)]
pub struct Path(Vec<String>);

impl Path {
    pub fn root() -> Self {
        Self(Vec::new())
    }
    /// Build from segments, every segment must be non-empty
    pub fn from_segments(segs: &[&str]) -> Result<Self,Error> {
        if segs.iter().any(|s| s.is_empty()) {
            return Err(Error::BadPath(segs.join("/")));
        }
        Ok(Self(segs.iter().map(|s| s.to_string()).collect()))
    }
    pub fn segments(&self) -> &[String] {
        &self.0
    }
    pub fn len(&self) -> usize {
        self.0.len()
    }
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }
    /// Path of the containing directory, the root is its own parent
    pub fn parent(&self) -> Path {
        match self.0.split_last() {
            Some((_,rest)) => Path(rest.to_vec()),
            None => Path::root()
        }
    }
    /// Last segment, or None for the root
    pub fn base(&self) -> Option<&str> {
        self.0.last().map(|s| s.as_str())
    }
    pub fn to_str(&self) -> String {
        self.0.join("/")
    }
}

/// Splits on `/`, empty segments are dropped so that `/a//b/` is the same as `a/b`
impl FromStr for Path {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self,Self::Err> {
        Ok(Self(s.split('/').filter(|seg| !seg.is_empty()).map(|seg| seg.to_string()).collect()))
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f,"/{}",self.to_str())
    }
}

#[derive(Clone,Copy,Debug,PartialEq,Eq)]
pub enum FileType {
    File,
    Directory
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File => write!(f,"file"),
            Self::Directory => write!(f,"dir")
        }
    }
}

/// Directory listing record, built fresh for every listing
#[derive(Clone,Debug,PartialEq,Eq)]
pub struct Dirent {
    pub filename: String,
    pub file_type: FileType,
    pub length: u64,
    pub mode: String
}

impl Dirent {
    /// Metadata keys every file system supports
    pub fn to_metadata(&self) -> BTreeMap<String,String> {
        let mut ans = BTreeMap::new();
        ans.insert(META_FILENAME.to_string(),self.filename.clone());
        ans.insert(META_LENGTH.to_string(),self.length.to_string());
        ans.insert(META_FILE_TYPE.to_string(),self.file_type.to_string());
        ans.insert(META_MODE.to_string(),self.mode.clone());
        ans
    }
}

/// Result of a `check` pass, ordered by increasing severity
#[derive(Clone,Copy,Debug,PartialEq,Eq,PartialOrd,Ord)]
pub enum FilesystemStatus {
    Ok,
    OkButUnusedBadSectors,
    OkButUsedBadSectors,
    MissingCriticalSectors,
    Bad
}

impl FilesystemStatus {
    /// Keep the more severe of two findings
    pub fn worst(self,other: Self) -> Self {
        std::cmp::max(self,other)
    }
}

impl fmt::Display for FilesystemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok => write!(f,"OK"),
            Self::OkButUnusedBadSectors => write!(f,"OK, but has bad sectors that are not in use"),
            Self::OkButUsedBadSectors => write!(f,"OK, but has bad sectors that are in use"),
            Self::MissingCriticalSectors => write!(f,"missing critical sectors"),
            Self::Bad => write!(f,"bad")
        }
    }
}

/// State of one logical sector
#[derive(Clone,Copy,Debug,PartialEq,Eq)]
pub enum SectorHealth {
    Good,
    Bad,
    Missing
}

/// Logical sector access layered over a `SectorStore`
pub struct LogicalSectors {
    store: Box<dyn SectorStore>,
    layout: SectorLayout,
    locations: Vec<(usize,usize,usize)>
}

impl LogicalSectors {
    pub fn new(store: Box<dyn SectorStore>,layout: &SectorLayout) -> Self {
        let locations = (0..layout.sector_count()).filter_map(|n| layout.locate(n)).collect();
        Self {
            store,
            layout: *layout,
            locations
        }
    }
    pub fn layout(&self) -> SectorLayout {
        self.layout
    }
    pub fn get_logical_sector_count(&self) -> usize {
        self.locations.len()
    }
    pub fn get_logical_sector_size(&self) -> usize {
        self.layout.sector_size
    }
    pub fn store(&self) -> &dyn SectorStore {
        self.store.as_ref()
    }
    pub fn store_mut(&mut self) -> &mut dyn SectorStore {
        self.store.as_mut()
    }
    pub fn sector_health(&self,number: usize) -> SectorHealth {
        let (track,side,id) = match self.locations.get(number) {
            Some(loc) => *loc,
            None => return SectorHealth::Missing
        };
        match self.store.get(track,side,id) {
            Some(sec) if sec.is_bad() => SectorHealth::Bad,
            Some(_) => SectorHealth::Good,
            None => SectorHealth::Missing
        }
    }
    /// Logical numbers of every sector that is bad or missing
    pub fn damaged_sectors(&self) -> Vec<usize> {
        (0..self.locations.len()).filter(|n| self.sector_health(*n) != SectorHealth::Good).collect()
    }
    /// Read `count` consecutive logical sectors.  A bad sector yields whatever was recovered,
    /// a missing sector is an error.
    pub fn get_logical_sector(&self,number: usize,count: usize) -> Result<Vec<u8>,Error> {
        let size = self.layout.sector_size;
        let mut ans = Vec::with_capacity(count * size);
        for n in number..number+count {
            let (track,side,id) = match self.locations.get(n) {
                Some(loc) => *loc,
                None => return Err(Error::BadFilesystem(format!("logical sector {} out of range",n)))
            };
            match self.store.get(track,side,id) {
                Some(sec) => {
                    if sec.is_bad() {
                        warn!("logical sector {} ({},{},{}) is bad",n,track,side,id);
                    }
                    let mut buf = sec.data.clone();
                    if buf.len() != size {
                        debug!("logical sector {} has {} bytes",n,buf.len());
                        buf.resize(size,0);
                    }
                    ans.append(&mut buf);
                },
                None => return Err(Error::BadFilesystem(format!("logical sector {} ({},{},{}) is missing",n,track,side,id)))
            }
        }
        Ok(ans)
    }
    /// Write whole logical sectors starting at `number`, the last one is zero padded.
    pub fn put_logical_sector(&mut self,number: usize,dat: &[u8]) -> Result<(),Error> {
        let size = self.layout.sector_size;
        let count = (dat.len() + size - 1) / size;
        if number + count > self.locations.len() {
            return Err(Error::BadFilesystem(format!("logical sector {} out of range",number + count - 1)));
        }
        for (i,chunk) in dat.chunks(size).enumerate() {
            let (track,side,id) = self.locations[number + i];
            let mut buf = chunk.to_vec();
            buf.resize(size,0);
            self.store.put(track,side,id,img::Sector::new(track,side,id,buf));
        }
        Ok(())
    }
    /// Flat dump in logical order, missing sectors are zeros
    pub fn to_raw(&self) -> Vec<u8> {
        let mut ans = Vec::with_capacity(self.layout.byte_capacity());
        for (track,side,id) in &self.locations {
            let mut buf = match self.store.get(*track,*side,*id) {
                Some(sec) => sec.data.clone(),
                None => Vec::new()
            };
            buf.resize(self.layout.sector_size,0);
            ans.append(&mut buf);
        }
        ans
    }
}

/// Supported file systems
#[derive(Clone,Copy,Debug,PartialEq,Eq)]
pub enum FsKind {
    Brother120,
    AcornDfs,
    Fat12
}

impl FsKind {
    /// The geometry the file system normally lives on
    pub fn layout(&self) -> SectorLayout {
        match self {
            Self::Brother120 => brother::layout(),
            Self::AcornDfs => dfs::layout(),
            Self::Fat12 => fat::layout()
        }
    }
}

impl fmt::Display for FsKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Brother120 => write!(f,"brother120"),
            Self::AcornDfs => write!(f,"acorndfs"),
            Self::Fat12 => write!(f,"fat12")
        }
    }
}

impl FromStr for FsKind {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self,Self::Err> {
        match s {
            "brother120" => Ok(Self::Brother120),
            "acorndfs" | "dfs" => Ok(Self::AcornDfs),
            "fat12" | "fat" => Ok(Self::Fat12),
            _ => Err(Error::Unimplemented(format!("file system `{}`",s)))
        }
    }
}

fn unimplemented(op: &str) -> Error {
    Error::Unimplemented(op.to_string())
}

/// Uniform directory and file access over a logical sector space.
/// Every operation fails with `Error::Unimplemented` unless the file system supplies it.
pub trait Filesystem {
    fn kind(&self) -> FsKind;
    /// Access the underlying storage
    fn get_store(&mut self) -> &mut LogicalSectors;
    /// Write an empty file system over the storage
    fn create(&mut self) -> Result<(),Error> {
        Err(unimplemented("create"))
    }
    /// Scan the structures and report the worst problem found
    fn check(&mut self) -> Result<FilesystemStatus,Error> {
        Err(unimplemented("check"))
    }
    fn list(&mut self,_path: &Path) -> Result<Vec<Dirent>,Error> {
        Err(unimplemented("list"))
    }
    fn get_file(&mut self,_path: &Path) -> Result<Vec<u8>,Error> {
        Err(unimplemented("get file"))
    }
    /// Create or replace a file
    fn put_file(&mut self,_path: &Path,_dat: &[u8]) -> Result<(),Error> {
        Err(unimplemented("put file"))
    }
    fn get_metadata(&mut self,_path: &Path) -> Result<BTreeMap<String,String>,Error> {
        Err(unimplemented("get metadata"))
    }
    /// Keys the file system does not support are ignored
    fn put_metadata(&mut self,_path: &Path,_meta: &BTreeMap<String,String>) -> Result<(),Error> {
        Err(unimplemented("put metadata"))
    }
}

/// Wrap the store in the file system of the given kind using its standard layout.
/// Nothing is read or written until the first operation.
pub fn create_filesystem(kind: FsKind,store: Box<dyn SectorStore>) -> Box<dyn Filesystem> {
    create_filesystem_with_layout(kind,store,&kind.layout())
}

pub fn create_filesystem_with_layout(kind: FsKind,store: Box<dyn SectorStore>,layout: &SectorLayout) -> Box<dyn Filesystem> {
    let sectors = LogicalSectors::new(store,layout);
    match kind {
        FsKind::Brother120 => Box::new(brother::Disk::from_sectors(sectors)),
        FsKind::AcornDfs => Box::new(dfs::Disk::from_sectors(sectors)),
        FsKind::Fat12 => Box::new(fat::Disk::from_sectors(sectors))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn paths() {
        let p = Path::from_str("/DIR1//FILE.TXT/").unwrap();
        assert_eq!(p.segments(),&["DIR1".to_string(),"FILE.TXT".to_string()]);
        assert_eq!(p.to_str(),"DIR1/FILE.TXT");
        assert_eq!(p.parent(),Path::from_segments(&["DIR1"]).unwrap());
        assert_eq!(p.base(),Some("FILE.TXT"));
        assert!(Path::from_str("").unwrap().is_root());
        assert_eq!(Path::root().parent(),Path::root());
        assert!(Path::from_segments(&["a",""]).is_err());
    }

    #[test]
    fn severity_order() {
        use FilesystemStatus::*;
        assert!(Ok < OkButUnusedBadSectors);
        assert!(OkButUnusedBadSectors < OkButUsedBadSectors);
        assert!(OkButUsedBadSectors < MissingCriticalSectors);
        assert!(MissingCriticalSectors < Bad);
        assert_eq!(OkButUsedBadSectors.worst(OkButUnusedBadSectors),OkButUsedBadSectors);
        assert_eq!(Ok.worst(Bad),Bad);
    }

    #[test]
    fn logical_sectors() {
        let layout = SectorLayout { tracks: 2, sides: 2, sectors: 2, sector_size: 4, first_id: 1 };
        let mut disk = img::Image::blank(&layout);
        disk.get_mut(1,0,2).unwrap().status = img::SectorStatus::BadChecksum;
        let mut sectors = LogicalSectors::new(Box::new(disk),&layout);
        assert_eq!(sectors.get_logical_sector_count(),8);
        sectors.put_logical_sector(2,&[1,2,3,4,5]).unwrap();
        assert_eq!(sectors.get_logical_sector(2,2).unwrap(),vec![1,2,3,4,5,0,0,0]);
        assert_eq!(sectors.store().get(0,1,2).unwrap().data,vec![5,0,0,0]);
        assert_eq!(sectors.sector_health(5),SectorHealth::Bad);
        assert_eq!(sectors.damaged_sectors(),vec![5]);
        assert!(sectors.get_logical_sector(5,1).is_ok());
        assert!(matches!(sectors.get_logical_sector(7,2),Err(Error::BadFilesystem(_))));
        assert!(matches!(sectors.put_logical_sector(7,&[0;5]),Err(Error::BadFilesystem(_))));
    }
}
