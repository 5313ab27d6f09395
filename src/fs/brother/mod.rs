//! # Brother word processor file system
//!
//! This is the file system on 120K disks written by Brother word processors.
//! The name space is flat, with up to 128 files.  The directory occupies the first eight
//! logical sectors, followed by an allocation table of sector links.  Files are chains of
//! 256 byte sectors, there is no other structure.
//!
//! Logical sectors are numbered track by track on side 0, the track interleave is a
//! property of the track format and is invisible here.

pub mod types;
pub mod directory;

use std::collections::BTreeMap;
use log::{debug,info,warn};
use crate::img::SectorLayout;
use crate::fs::{Error,Path,Dirent,FileType,Filesystem,FilesystemStatus,FsKind,LogicalSectors,SectorHealth};
use types::*;
use directory::{Entry,Directory,AllocationTable};

pub fn layout() -> SectorLayout {
    SectorLayout {
        tracks: 39,
        sides: 1,
        sectors: 12,
        sector_size: SECTOR_SIZE,
        first_id: 0
    }
}

/// The primary interface for Brother disk operations.
pub struct Disk {
    sectors: LogicalSectors
}

impl Disk {
    pub fn from_sectors(sectors: LogicalSectors) -> Self {
        Self { sectors }
    }
    /// Test the storage for a Brother file system, without modifying it
    pub fn test_store(sectors: &LogicalSectors) -> bool {
        if sectors.get_logical_sector_size() != SECTOR_SIZE || sectors.get_logical_sector_count() < SECTOR_COUNT {
            debug!("geometry does not fit a Brother disk");
            return false;
        }
        let fat = match sectors.get_logical_sector(FAT_START_SECTOR,FAT_SECTORS) {
            Ok(buf) => AllocationTable::from_bytes(&buf),
            Err(_) => return false
        };
        if (0..DATA_START_SECTOR).any(|s| fat.get(s) != RESERVED) {
            debug!("system sectors are not reserved");
            return false;
        }
        let dir = match sectors.get_logical_sector(0,DIRECTORY_SECTORS) {
            Ok(buf) => match Directory::from_bytes(&buf) {
                Ok(dir) => dir,
                Err(_) => return false
            },
            Err(_) => return false
        };
        dir.used().iter().all(|i| dir.get(*i).is_plausible())
    }
    fn read_directory(&self) -> Result<Directory,Error> {
        Directory::from_bytes(&self.sectors.get_logical_sector(0,DIRECTORY_SECTORS)?)
    }
    fn write_directory(&mut self,dir: &Directory) -> Result<(),Error> {
        self.sectors.put_logical_sector(0,&dir.to_bytes()?)
    }
    fn read_table(&self) -> Result<AllocationTable,Error> {
        Ok(AllocationTable::from_bytes(&self.sectors.get_logical_sector(FAT_START_SECTOR,FAT_SECTORS)?))
    }
    fn write_table(&mut self,fat: &AllocationTable) -> Result<(),Error> {
        self.sectors.put_logical_sector(FAT_START_SECTOR,&fat.to_bytes())
    }
    /// Find a file, returning the directory and the index of its entry
    fn find(&self,path: &Path) -> Result<(Directory,usize),Error> {
        let name = file_name(path)?;
        let dir = self.read_directory()?;
        match dir.find(&name) {
            Some(idx) => Ok((dir,idx)),
            None => Err(Error::FileNotFound(path.to_str()))
        }
    }
    fn dirent(entry: &Entry) -> Dirent {
        Dirent {
            filename: entry.name(),
            file_type: FileType::File,
            length: entry.length() as u64,
            mode: String::new()
        }
    }
}

impl Filesystem for Disk {
    fn kind(&self) -> FsKind {
        FsKind::Brother120
    }
    fn get_store(&mut self) -> &mut LogicalSectors {
        &mut self.sectors
    }
    fn create(&mut self) -> Result<(),Error> {
        if self.sectors.get_logical_sector_count() < SECTOR_COUNT {
            return Err(Error::BadFilesystem(format!("need {} sectors",SECTOR_COUNT)));
        }
        self.write_directory(&Directory::new())?;
        self.write_table(&AllocationTable::new())?;
        let spare = FAT_START_SECTOR + FAT_SECTORS;
        self.sectors.put_logical_sector(spare,&vec![0;(DATA_START_SECTOR - spare) * SECTOR_SIZE])?;
        info!("created empty Brother file system");
        Ok(())
    }
    fn check(&mut self) -> Result<FilesystemStatus,Error> {
        for sec in 0..FAT_START_SECTOR + FAT_SECTORS {
            if self.sectors.sector_health(sec) != SectorHealth::Good {
                warn!("system sector {} is damaged",sec);
                return Ok(FilesystemStatus::MissingCriticalSectors);
            }
        }
        let dir = self.read_directory()?;
        let fat = self.read_table()?;
        let mut status = FilesystemStatus::Ok;
        let mut used = vec![false;SECTOR_COUNT];
        for idx in dir.used() {
            let entry = dir.get(idx);
            if !entry.is_plausible() {
                warn!("directory entry {} has a damaged name",idx);
                status = status.worst(FilesystemStatus::Bad);
                continue;
            }
            match fat.chain(entry.start as usize,entry.count as usize) {
                Ok(chain) => {
                    for sec in chain {
                        if used[sec] {
                            warn!("sector {} is cross linked ({})",sec,entry.name());
                            status = status.worst(FilesystemStatus::Bad);
                        }
                        used[sec] = true;
                    }
                },
                Err(e) => {
                    warn!("{}: {}",entry.name(),e);
                    status = status.worst(FilesystemStatus::Bad);
                }
            }
        }
        for sec in DATA_START_SECTOR..SECTOR_COUNT {
            if fat.get(sec) != FREE && !used[sec] {
                info!("sector {} is allocated but belongs to no file",sec);
            }
        }
        for sec in self.sectors.damaged_sectors() {
            if sec >= SECTOR_COUNT {
                continue;
            }
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
        let dir = self.read_directory()?;
        let mut ans = Vec::new();
        for idx in dir.used() {
            let entry = dir.get(idx);
            if !entry.is_plausible() {
                warn!("skipping damaged directory entry {}",idx);
                continue;
            }
            ans.push(Self::dirent(entry));
        }
        Ok(ans)
    }
    fn get_file(&mut self,path: &Path) -> Result<Vec<u8>,Error> {
        let (dir,idx) = self.find(path)?;
        let entry = dir.get(idx);
        let fat = self.read_table()?;
        let chain = fat.chain(entry.start as usize,entry.count as usize).map_err(Error::BadFilesystem)?;
        let mut ans = Vec::new();
        for sec in chain {
            ans.append(&mut self.sectors.get_logical_sector(sec,1)?);
        }
        ans.truncate(entry.length());
        Ok(ans)
    }
    fn put_file(&mut self,path: &Path,dat: &[u8]) -> Result<(),Error> {
        let name = file_name(path)?;
        let mut dir = self.read_directory()?;
        let mut fat = self.read_table()?;
        let mut entry = Entry::unused();
        let slot = match dir.find(&name) {
            Some(idx) => {
                let old = dir.get(idx);
                fat.release(old.start as usize,old.count as usize);
                entry.typ = old.typ;
                idx
            },
            None => match dir.free_slot() {
                Some(idx) => idx,
                None => return Err(Error::DiskFull("directory is full".to_string()))
            }
        };
        let count = (dat.len() + SECTOR_SIZE - 1) / SECTOR_SIZE;
        if count > MAX_FILE_SECTORS {
            return Err(Error::DiskFull(format!("file needs {} sectors, limit is {}",count,MAX_FILE_SECTORS)));
        }
        let free = fat.free_sectors();
        if free.len() < count {
            return Err(Error::DiskFull(format!("file needs {} sectors, {} available",count,free.len())));
        }
        let chain = &free[0..count];
        fat.link(chain);
        for (sec,chunk) in chain.iter().zip(dat.chunks(SECTOR_SIZE)) {
            self.sectors.put_logical_sector(*sec,chunk)?;
        }
        entry.set_name(&name);
        entry.start = chain.first().map_or(0,|s| *s as u16);
        entry.set_length(dat.len());
        dir.set(slot,entry);
        self.write_table(&fat)?;
        self.write_directory(&dir)?;
        debug!("wrote {} bytes to {} in {} sectors",dat.len(),name,count);
        Ok(())
    }
    fn get_metadata(&mut self,path: &Path) -> Result<BTreeMap<String,String>,Error> {
        if path.is_root() {
            let mut ans = Dirent {
                filename: String::new(),
                file_type: FileType::Directory,
                length: 0,
                mode: String::new()
            }.to_metadata();
            ans.insert(META_FREE.to_string(),self.read_table()?.free_sectors().len().to_string());
            return Ok(ans);
        }
        let (dir,idx) = self.find(path)?;
        let entry = dir.get(idx);
        let mut ans = Self::dirent(entry).to_metadata();
        ans.insert(META_TYPE.to_string(),entry.typ.to_string());
        ans.insert(META_START.to_string(),entry.start.to_string());
        ans.insert(META_SECTORS.to_string(),entry.count.to_string());
        Ok(ans)
    }
    fn put_metadata(&mut self,path: &Path,meta: &BTreeMap<String,String>) -> Result<(),Error> {
        let (mut dir,idx) = self.find(path)?;
        let mut entry = dir.get(idx).clone();
        if let Some(val) = meta.get(META_TYPE) {
            match u8::from_str_radix(val,10) {
                Ok(typ) => entry.typ = typ,
                Err(_) => warn!("file type `{}` is not a byte, ignoring",val)
            }
        }
        dir.set(idx,entry);
        self.write_directory(&dir)
    }
}
