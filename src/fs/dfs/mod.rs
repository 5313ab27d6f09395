//! # Acorn DFS file system
//!
//! The catalogue of an Acorn DFS disk lives in logical sectors 0 and 1.  Sector 0 holds the
//! first part of the title followed by the names of up to 31 files, sector 1 holds the rest of
//! the title, the disk parameters, and the addresses, lengths, and start sectors of the same
//! files in the same order.  Files are contiguous runs of sectors.
//!
//! There is a single level of directories, each file carries a one character directory
//! name.  Files are presented as `D.NAME`, and a name given without a directory is taken
//! to be in `$`.
//!
//! This module only reads DFS disks.

pub mod types;

use std::collections::BTreeMap;
use log::{debug,warn};
use num_traits::FromPrimitive;
use crate::img::SectorLayout;
use crate::fs::{Error,Path,Dirent,FileType,Filesystem,FilesystemStatus,FsKind,LogicalSectors,SectorHealth};
use types::*;

pub fn layout() -> SectorLayout {
    SectorLayout {
        tracks: 80,
        sides: 1,
        sectors: 10,
        sector_size: SECTOR_SIZE,
        first_id: 0
    }
}

/// One file from the catalogue, with the split fields put back together
#[derive(Clone,Debug,PartialEq)]
pub struct CatalogueEntry {
    pub dir: char,
    pub name: String,
    pub locked: bool,
    pub load_address: u32,
    pub exec_address: u32,
    pub length: usize,
    pub start_sector: usize
}

impl CatalogueEntry {
    /// `names` is the 8 byte slot from sector 0, `info` the matching slot from sector 1
    fn from_bytes(names: &[u8],info: &[u8]) -> Self {
        let name: String = names[0..7].iter().map(|b| (b & 0x7f) as char).collect();
        let hi = info[6] as u32;
        Self {
            dir: (names[7] & 0x7f) as char,
            name: name.trim_end().to_string(),
            locked: names[7] & 0x80 > 0,
            load_address: u16::from_le_bytes([info[0],info[1]]) as u32 + (((hi >> 2) & 3) << 16),
            exec_address: u16::from_le_bytes([info[2],info[3]]) as u32 + (((hi >> 6) & 3) << 16),
            length: u16::from_le_bytes([info[4],info[5]]) as usize + ((((hi >> 4) & 3) as usize) << 16),
            start_sector: info[7] as usize + (((hi & 3) as usize) << 8)
        }
    }
    pub fn full_name(&self) -> String {
        format!("{}.{}",self.dir,self.name)
    }
    pub fn sector_count(&self) -> usize {
        (self.length + SECTOR_SIZE - 1) / SECTOR_SIZE
    }
    fn is_plausible(&self) -> bool {
        !self.name.is_empty() && self.name.chars().all(|c| c > ' ' && c < '\u{7f}') && self.dir > ' ' && self.dir < '\u{7f}'
    }
    fn matches(&self,dir: char,name: &str) -> bool {
        self.dir.eq_ignore_ascii_case(&dir) && self.name.eq_ignore_ascii_case(name)
    }
}

/// The disk parameters and file list
#[derive(Clone,Debug)]
pub struct Catalogue {
    pub title: String,
    pub cycle: u8,
    pub boot_option: BootOption,
    pub sectors: usize,
    pub files: Vec<CatalogueEntry>
}

impl Catalogue {
    /// Interpret the two catalogue sectors.  Fails if the file count is not a multiple
    /// of 8 or exceeds 31 files.
    pub fn from_bytes(buf: &[u8]) -> Result<Self,Error> {
        if buf.len() < CATALOGUE_SECTORS * SECTOR_SIZE {
            return Err(Error::BadFilesystem("catalogue is truncated".to_string()));
        }
        let (s0,s1) = buf.split_at(SECTOR_SIZE);
        let title_bytes: Vec<u8> = [&s0[0..8],&s1[0..4]].concat();
        let title = String::from_utf8_lossy(&title_bytes).trim_end_matches([' ','\u{0}']).to_string();
        if s1[5] % 8 != 0 || s1[5] as usize / 8 > MAX_FILES {
            return Err(Error::BadFilesystem(format!("file count byte is {:02x}",s1[5])));
        }
        let count = s1[5] as usize / 8;
        let files = (1..=count).map(|i| CatalogueEntry::from_bytes(&s0[i*8..i*8+8],&s1[i*8..i*8+8])).collect();
        Ok(Self {
            title,
            cycle: s1[4],
            boot_option: BootOption::from_u8((s1[6] >> 4) & 3).unwrap_or(BootOption::None),
            sectors: s1[7] as usize + (((s1[6] & 3) as usize) << 8),
            files
        })
    }
    /// Find a file given a path segment like `$.NAME` or `NAME`
    pub fn find(&self,seg: &str) -> Option<&CatalogueEntry> {
        let (dir,name) = split_name(seg);
        self.files.iter().find(|f| f.matches(dir,name))
    }
}

fn split_name(seg: &str) -> (char,&str) {
    let chars: Vec<char> = seg.chars().take(2).collect();
    if chars.len() == 2 && chars[1] == '.' && chars[0].is_ascii() {
        (chars[0],&seg[2..])
    } else {
        ('$',seg)
    }
}

fn file_segment(path: &Path) -> Result<&str,Error> {
    if path.len() != 1 {
        return Err(Error::BadPath(format!("{} is not a single name",path)));
    }
    let seg = path.segments()[0].as_str();
    let (_,name) = split_name(seg);
    if name.is_empty() || name.len() > 7 || !name.chars().all(|c| c > ' ' && c < '\u{7f}') {
        return Err(Error::BadPath(format!("`{}` is not a valid file name",seg)));
    }
    Ok(seg)
}

/// The primary interface for DFS disk operations.
pub struct Disk {
    sectors: LogicalSectors
}

impl Disk {
    pub fn from_sectors(sectors: LogicalSectors) -> Self {
        Self { sectors }
    }
    /// Test the storage for a DFS catalogue, without modifying it
    pub fn test_store(sectors: &LogicalSectors) -> bool {
        if sectors.get_logical_sector_size() != SECTOR_SIZE {
            return false;
        }
        let cat = match sectors.get_logical_sector(0,CATALOGUE_SECTORS) {
            Ok(buf) => match Catalogue::from_bytes(&buf) {
                Ok(cat) => cat,
                Err(_) => return false
            },
            Err(_) => return false
        };
        if cat.sectors < CATALOGUE_SECTORS || cat.sectors > sectors.get_logical_sector_count() {
            debug!("DFS sector count {} does not fit",cat.sectors);
            return false;
        }
        cat.files.iter().all(|f| f.is_plausible())
    }
    fn read_catalogue(&self) -> Result<Catalogue,Error> {
        Catalogue::from_bytes(&self.sectors.get_logical_sector(0,CATALOGUE_SECTORS)?)
    }
    fn find(&self,path: &Path) -> Result<CatalogueEntry,Error> {
        let seg = file_segment(path)?;
        match self.read_catalogue()?.find(seg) {
            Some(entry) => Ok(entry.clone()),
            None => Err(Error::FileNotFound(path.to_str()))
        }
    }
    fn dirent(entry: &CatalogueEntry) -> Dirent {
        Dirent {
            filename: entry.full_name(),
            file_type: FileType::File,
            length: entry.length as u64,
            mode: match entry.locked { true => "L".to_string(), false => String::new() }
        }
    }
}

impl Filesystem for Disk {
    fn kind(&self) -> FsKind {
        FsKind::AcornDfs
    }
    fn get_store(&mut self) -> &mut LogicalSectors {
        &mut self.sectors
    }
    fn check(&mut self) -> Result<FilesystemStatus,Error> {
        for sec in 0..CATALOGUE_SECTORS {
            if self.sectors.sector_health(sec) != SectorHealth::Good {
                warn!("catalogue sector {} is damaged",sec);
                return Ok(FilesystemStatus::MissingCriticalSectors);
            }
        }
        let cat = match self.read_catalogue() {
            Ok(cat) => cat,
            Err(e) => {
                warn!("{}",e);
                return Ok(FilesystemStatus::Bad);
            }
        };
        let mut status = FilesystemStatus::Ok;
        let total = usize::min(cat.sectors,self.sectors.get_logical_sector_count());
        if cat.sectors > self.sectors.get_logical_sector_count() {
            warn!("catalogue claims {} sectors",cat.sectors);
            status = FilesystemStatus::Bad;
        }
        let mut used = vec![false;self.sectors.get_logical_sector_count()];
        for f in &cat.files {
            if !f.is_plausible() {
                warn!("damaged catalogue entry {}",f.full_name());
                status = status.worst(FilesystemStatus::Bad);
            }
            let end = f.start_sector + f.sector_count();
            if f.start_sector < CATALOGUE_SECTORS || end > total {
                warn!("{} occupies sectors {}..{} which are outside the disk",f.full_name(),f.start_sector,end);
                status = status.worst(FilesystemStatus::Bad);
                continue;
            }
            for sec in f.start_sector..end {
                if used[sec] {
                    warn!("{} overlaps another file at sector {}",f.full_name(),sec);
                    status = status.worst(FilesystemStatus::Bad);
                }
                used[sec] = true;
            }
        }
        for sec in self.sectors.damaged_sectors() {
            status = status.worst(match used[sec] {
                true => FilesystemStatus::OkButUsedBadSectors,
                false => FilesystemStatus::OkButUnusedBadSectors
            });
        }
        Ok(status)
    }
    fn list(&mut self,path: &Path) -> Result<Vec<Dirent>,Error> {
        if !path.is_root() {
            return Err(Error::FileNotFound(format!("{} is not a directory",path)));
        }
        let cat = self.read_catalogue()?;
        let mut ans = Vec::new();
        for f in &cat.files {
            if !f.is_plausible() {
                warn!("skipping damaged catalogue entry");
                continue;
            }
            ans.push(Self::dirent(f));
        }
        Ok(ans)
    }
    fn get_file(&mut self,path: &Path) -> Result<Vec<u8>,Error> {
        let entry = self.find(path)?;
        let mut ans = self.sectors.get_logical_sector(entry.start_sector,entry.sector_count())?;
        ans.truncate(entry.length);
        Ok(ans)
    }
    fn put_file(&mut self,_path: &Path,_dat: &[u8]) -> Result<(),Error> {
        Err(Error::ReadOnlyFilesystem("Acorn DFS volumes are read only".to_string()))
    }
    fn get_metadata(&mut self,path: &Path) -> Result<BTreeMap<String,String>,Error> {
        if path.is_root() {
            let cat = self.read_catalogue()?;
            let mut ans = Dirent {
                filename: String::new(),
                file_type: FileType::Directory,
                length: 0,
                mode: String::new()
            }.to_metadata();
            ans.insert(META_TITLE.to_string(),cat.title);
            ans.insert(META_CYCLE.to_string(),cat.cycle.to_string());
            ans.insert(META_BOOT.to_string(),cat.boot_option.to_string());
            ans.insert(META_SECTORS.to_string(),cat.sectors.to_string());
            return Ok(ans);
        }
        let entry = self.find(path)?;
        let mut ans = Self::dirent(&entry).to_metadata();
        ans.insert(META_LOAD.to_string(),format!("{:06X}",entry.load_address));
        ans.insert(META_EXEC.to_string(),format!("{:06X}",entry.exec_address));
        ans.insert(META_LOCKED.to_string(),entry.locked.to_string());
        ans.insert(META_START.to_string(),entry.start_sector.to_string());
        Ok(ans)
    }
    fn put_metadata(&mut self,_path: &Path,_meta: &BTreeMap<String,String>) -> Result<(),Error> {
        Err(Error::ReadOnlyFilesystem("Acorn DFS volumes are read only".to_string()))
    }
}
