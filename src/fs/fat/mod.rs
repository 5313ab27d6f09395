//! # FAT file system module
//!
//! This manipulates FAT12 volumes as found on DOS formatted floppies.  The boot sector
//! carries the BIOS parameter block (BPB), which fixes where the FATs, the root directory,
//! and the data clusters are.  The FAT itself is handled by `crate::bios::fat`.
//!
//! Paths are 8.3 names separated by `/`.  Matching is case insensitive, names are stored
//! in upper case.  The root directory has a fixed size, subdirectories are cluster chains
//! that grow when they fill up.

pub mod types;
pub mod directory;

use std::collections::{BTreeMap,HashSet};
use binrw::{BinRead,BinWrite};
use binrw::io::Cursor;
use log::{debug,info,warn};
use crate::bios::fat;
use crate::img::{SectorStore,SectorLayout};
use crate::fs::{Error,Path,Dirent,FileType,Filesystem,FilesystemStatus,FsKind,LogicalSectors,SectorHealth};
use types::*;
use directory::{Entry,EntryType,Directory,DIR_ENTRY_SIZE};

/// 720K, the 3.5 inch double density format
pub fn layout() -> SectorLayout {
    SectorLayout {
        tracks: 80,
        sides: 2,
        sectors: 9,
        sector_size: SECTOR_SIZE,
        first_id: 1
    }
}

/// Where a directory lives
#[derive(Clone,Copy,Debug,PartialEq)]
enum DirLoc {
    /// fixed area after the FATs
    Root,
    /// cluster chain starting here
    Chain(usize)
}

impl DirLoc {
    fn from_cluster(cluster: usize) -> Self {
        match cluster {
            0 => Self::Root,
            c => Self::Chain(c)
        }
    }
}

fn free_clusters(boot: &BootSector,buf: &[u8]) -> Vec<usize> {
    (fat::FIRST_DATA_CLUSTER as usize..boot.cluster_count() + 2).filter(|n| fat::is_free(*n,buf)).collect()
}

/// Release every cluster of a chain, a broken chain is left alone
fn release(boot: &BootSector,buf: &mut [u8],first: usize) {
    if first == 0 {
        return;
    }
    match fat::chain(first,boot.cluster_count(),buf) {
        Some(chain) => {
            for c in chain {
                fat::deallocate(c,buf);
            }
        },
        None => warn!("chain at cluster {} is broken, clusters not released",first)
    }
}

fn link(clusters: &[usize],buf: &mut [u8]) {
    for (i,c) in clusters.iter().enumerate() {
        match clusters.get(i + 1) {
            Some(next) => fat::set_cluster(*c,*next as u32,buf),
            None => fat::mark_last(*c,buf)
        }
    }
}

/// Get a slot for a new entry.  A full subdirectory is grown by taking a cluster
/// from `pool`, the FAT buffer and the sector list are updated to match.
fn make_room(boot: &BootSector,buf: &mut [u8],loc: DirLoc,dir: &mut Directory,secs: &mut Vec<usize>,pool: &mut Vec<usize>) -> Result<usize,Error> {
    if let Some(slot) = dir.free_slot() {
        return Ok(slot);
    }
    let first = match loc {
        DirLoc::Root => return Err(Error::DiskFull("root directory is full".to_string())),
        DirLoc::Chain(c) => c
    };
    if pool.is_empty() {
        return Err(Error::DiskFull("no cluster to grow the directory".to_string()));
    }
    let last = match fat::chain(first,boot.cluster_count(),buf).and_then(|c| c.last().copied()) {
        Some(c) => c,
        None => return Err(Error::BadFilesystem(format!("directory chain at {} is broken",first)))
    };
    let new_cluster = pool.remove(0);
    fat::set_cluster(last,new_cluster as u32,buf);
    fat::mark_last(new_cluster,buf);
    let slot = dir.num_entries();
    dir.expand(boot.cluster_bytes() / DIR_ENTRY_SIZE);
    let start = boot.cluster_start(new_cluster);
    secs.extend(start..start + boot.sec_per_clus as usize);
    debug!("directory grows into cluster {}",new_cluster);
    Ok(slot)
}

/// The primary interface for FAT disk operations.
pub struct Disk {
    sectors: LogicalSectors
}

impl Disk {
    pub fn from_sectors(sectors: LogicalSectors) -> Self {
        Self { sectors }
    }
    /// Use any layout with 512 byte sectors
    pub fn from_store(store: Box<dyn SectorStore>,layout: &SectorLayout) -> Self {
        Self::from_sectors(LogicalSectors::new(store,layout))
    }
    /// Test the storage for a FAT12 volume, without modifying it
    pub fn test_store(sectors: &LogicalSectors) -> bool {
        if sectors.get_logical_sector_size() != SECTOR_SIZE {
            return false;
        }
        let buf = match sectors.get_logical_sector(0,1) {
            Ok(buf) => buf,
            Err(_) => return false
        };
        match BootSector::read(&mut Cursor::new(&buf)) {
            Ok(boot) => match boot.verify(sectors.get_logical_sector_count()) {
                Ok(()) => true,
                Err(e) => {
                    debug!("{}",e);
                    false
                }
            },
            Err(_) => false
        }
    }
    fn read_boot(&self) -> Result<BootSector,Error> {
        let buf = self.sectors.get_logical_sector(0,1)?;
        let boot = match BootSector::read(&mut Cursor::new(&buf)) {
            Ok(boot) => boot,
            Err(e) => return Err(Error::BadFilesystem(format!("boot sector: {}",e)))
        };
        boot.verify(self.sectors.get_logical_sector_count())?;
        Ok(boot)
    }
    fn read_fat(&self,boot: &BootSector) -> Result<Vec<u8>,Error> {
        self.sectors.get_logical_sector(boot.fat_start(0),boot.fat_sectors())
    }
    /// Write the buffer to every FAT copy
    fn write_fat(&mut self,boot: &BootSector,buf: &[u8]) -> Result<(),Error> {
        for n in 0..boot.num_fats as usize {
            self.sectors.put_logical_sector(boot.fat_start(n),buf)?;
        }
        Ok(())
    }
    fn dir_sectors(&self,boot: &BootSector,buf: &[u8],loc: DirLoc) -> Result<Vec<usize>,Error> {
        match loc {
            DirLoc::Root => Ok((boot.root_dir_start()..boot.first_data_sec()).collect()),
            DirLoc::Chain(first) => match fat::chain(first,boot.cluster_count(),buf) {
                Some(chain) => Ok(chain.iter().flat_map(|c| {
                    let start = boot.cluster_start(*c);
                    start..start + boot.sec_per_clus as usize
                }).collect()),
                None => Err(Error::BadFilesystem(format!("directory chain at {} is broken",first)))
            }
        }
    }
    fn read_dir(&self,boot: &BootSector,buf: &[u8],loc: DirLoc) -> Result<(Directory,Vec<usize>),Error> {
        let secs = self.dir_sectors(boot,buf,loc)?;
        let mut dat = Vec::new();
        for sec in &secs {
            dat.append(&mut self.sectors.get_logical_sector(*sec,1)?);
        }
        Ok((Directory::from_bytes(&dat)?,secs))
    }
    fn write_dir(&mut self,dir: &Directory,secs: &[usize]) -> Result<(),Error> {
        let dat = dir.to_bytes()?;
        for (sec,chunk) in secs.iter().zip(dat.chunks(SECTOR_SIZE)) {
            self.sectors.put_logical_sector(*sec,chunk)?;
        }
        Ok(())
    }
    /// Walk the path, every segment must be a directory
    fn goto_dir(&self,boot: &BootSector,buf: &[u8],path: &Path) -> Result<DirLoc,Error> {
        let mut loc = DirLoc::Root;
        for seg in path.segments() {
            let (name,ext) = split_name(seg)?;
            let (dir,_) = self.read_dir(boot,buf,loc)?;
            match dir.find(&name,&ext) {
                Some(idx) if dir.get(idx).get_type() == EntryType::Directory => {
                    loc = DirLoc::from_cluster(dir.get(idx).cluster());
                },
                _ => return Err(Error::FileNotFound(format!("{} is not a directory",path)))
            }
        }
        Ok(loc)
    }
    /// Find the entry for a path, returning its directory, the directory's sectors, and the index
    fn find(&self,boot: &BootSector,buf: &[u8],path: &Path) -> Result<(Directory,Vec<usize>,usize),Error> {
        let base = match path.base() {
            Some(s) => s,
            None => return Err(Error::BadPath("the root has no entry".to_string()))
        };
        let (name,ext) = split_name(base)?;
        let loc = self.goto_dir(boot,buf,&path.parent())?;
        let (dir,secs) = self.read_dir(boot,buf,loc)?;
        match dir.find(&name,&ext) {
            Some(idx) => Ok((dir,secs,idx)),
            None => Err(Error::FileNotFound(path.to_str()))
        }
    }
    fn dirent(entry: &Entry) -> Dirent {
        let file_type = match entry.get_type() {
            EntryType::Directory => FileType::Directory,
            _ => FileType::File
        };
        Dirent {
            filename: entry.file_name(),
            file_type,
            length: match file_type {
                FileType::File => entry.file_size as u64,
                FileType::Directory => 0
            },
            mode: entry.mode()
        }
    }
    /// Create an empty subdirectory, the parent must exist
    pub fn mkdir(&mut self,path: &Path) -> Result<(),Error> {
        let boot = self.read_boot()?;
        let mut buf = self.read_fat(&boot)?;
        let base = match path.base() {
            Some(s) => s,
            None => return Err(Error::BadPath("the root already exists".to_string()))
        };
        let (name,ext) = split_name(base)?;
        let loc = self.goto_dir(&boot,&buf,&path.parent())?;
        let (mut dir,mut secs) = self.read_dir(&boot,&buf,loc)?;
        if dir.find(&name,&ext).is_some() {
            return Err(Error::BadPath(format!("{} already exists",path)));
        }
        let mut pool = free_clusters(&boot,&buf);
        let slot = make_room(&boot,&mut buf,loc,&mut dir,&mut secs,&mut pool)?;
        if pool.is_empty() {
            return Err(Error::DiskFull("no cluster for the directory".to_string()));
        }
        let cluster = pool[0];
        fat::mark_last(cluster,&mut buf);
        let mut new_dir = Directory::from_bytes(&vec![0;boot.cluster_bytes()])?;
        new_dir.set(0,Entry::create_dot(1,cluster,None));
        new_dir.set(1,Entry::create_dot(2,match loc { DirLoc::Root => 0, DirLoc::Chain(c) => c },None));
        let start = boot.cluster_start(cluster);
        let new_secs: Vec<usize> = (start..start + boot.sec_per_clus as usize).collect();
        let mut entry = Entry::create(name,ext,directory::DIRECTORY,None);
        entry.set_cluster(cluster);
        dir.set(slot,entry);
        self.write_dir(&new_dir,&new_secs)?;
        self.write_fat(&boot,&buf)?;
        self.write_dir(&dir,&secs)
    }
}

impl Filesystem for Disk {
    fn kind(&self) -> FsKind {
        FsKind::Fat12
    }
    fn get_store(&mut self) -> &mut LogicalSectors {
        &mut self.sectors
    }
    fn create(&mut self) -> Result<(),Error> {
        if self.sectors.get_logical_sector_size() != SECTOR_SIZE {
            return Err(Error::BadFilesystem(format!("FAT needs {} byte sectors",SECTOR_SIZE)));
        }
        let total = self.sectors.get_logical_sector_count();
        let layout = self.sectors.layout();
        let boot = BootSector::create(total,layout.sectors,layout.sides)?;
        let mut cursor = Cursor::new(Vec::new());
        if let Err(e) = boot.write(&mut cursor) {
            return Err(Error::BadFilesystem(format!("boot sector: {}",e)));
        }
        let mut boot_buf = cursor.into_inner();
        boot_buf.resize(SECTOR_SIZE,0);
        boot_buf[510] = 0x55;
        boot_buf[511] = 0xaa;
        // zeros in the system area, f6 in the data region
        self.sectors.put_logical_sector(0,&vec![0;boot.first_data_sec() * SECTOR_SIZE])?;
        self.sectors.put_logical_sector(boot.first_data_sec(),&vec![0xf6;(total - boot.first_data_sec()) * SECTOR_SIZE])?;
        self.sectors.put_logical_sector(0,&boot_buf)?;
        let mut buf = vec![0;boot.fat_sectors() * SECTOR_SIZE];
        fat::init(boot.media,&mut buf);
        self.write_fat(&boot,&buf)?;
        info!("created FAT12 volume with {} clusters",boot.cluster_count());
        Ok(())
    }
    fn check(&mut self) -> Result<FilesystemStatus,Error> {
        if self.sectors.sector_health(0) != SectorHealth::Good {
            warn!("boot sector is damaged");
            return Ok(FilesystemStatus::MissingCriticalSectors);
        }
        let boot = match self.read_boot() {
            Ok(boot) => boot,
            Err(e) => {
                warn!("{}",e);
                return Ok(FilesystemStatus::Bad);
            }
        };
        for sec in 1..boot.first_data_sec() {
            if self.sectors.sector_health(sec) != SectorHealth::Good {
                warn!("system sector {} is damaged",sec);
                return Ok(FilesystemStatus::MissingCriticalSectors);
            }
        }
        let buf = self.read_fat(&boot)?;
        for n in 1..boot.num_fats as usize {
            if self.sectors.get_logical_sector(boot.fat_start(n),boot.fat_sectors())? != buf {
                info!("FAT copy {} differs from the first",n);
            }
        }
        let mut status = FilesystemStatus::Ok;
        let mut used = vec![false;boot.cluster_count() + 2];
        let mut visited = HashSet::new();
        let mut pending = vec![DirLoc::Root];
        while let Some(loc) = pending.pop() {
            let (dir,_) = match self.read_dir(&boot,&buf,loc) {
                Ok(ans) => ans,
                Err(e) => {
                    warn!("{}",e);
                    status = FilesystemStatus::Bad;
                    continue;
                }
            };
            for idx in dir.active() {
                let entry = dir.get(idx);
                let typ = entry.get_type();
                if typ != EntryType::File && typ != EntryType::Directory {
                    continue;
                }
                let first = entry.cluster();
                if first == 0 {
                    if typ == EntryType::Directory {
                        warn!("directory {} has no clusters",entry.file_name());
                        status = FilesystemStatus::Bad;
                    }
                    continue;
                }
                let chain = match fat::chain(first,boot.cluster_count(),&buf) {
                    Some(chain) => chain,
                    None => {
                        warn!("{} has a broken cluster chain",entry.file_name());
                        status = FilesystemStatus::Bad;
                        continue;
                    }
                };
                for c in &chain {
                    if used[*c] {
                        warn!("cluster {} is cross linked ({})",c,entry.file_name());
                        status = FilesystemStatus::Bad;
                    }
                    used[*c] = true;
                }
                if typ == EntryType::File && (chain.len() * boot.cluster_bytes()) < entry.file_size as usize {
                    warn!("{} is longer than its clusters",entry.file_name());
                    status = FilesystemStatus::Bad;
                }
                if typ == EntryType::Directory && visited.insert(first) {
                    pending.push(DirLoc::Chain(first));
                }
            }
        }
        for c in fat::FIRST_DATA_CLUSTER as usize..boot.cluster_count() + 2 {
            if fat::is_damaged(c,&buf) {
                status = status.worst(FilesystemStatus::OkButUnusedBadSectors);
            }
        }
        for sec in self.sectors.damaged_sectors() {
            status = status.worst(match boot.sector_cluster(sec) {
                Some(c) if used[c] => FilesystemStatus::OkButUsedBadSectors,
                _ => FilesystemStatus::OkButUnusedBadSectors
            });
        }
        Ok(status)
    }
    fn list(&mut self,path: &Path) -> Result<Vec<Dirent>,Error> {
        let boot = self.read_boot()?;
        let buf = self.read_fat(&boot)?;
        let loc = self.goto_dir(&boot,&buf,path)?;
        let (dir,_) = self.read_dir(&boot,&buf,loc)?;
        let mut ans = Vec::new();
        for idx in dir.active() {
            let entry = dir.get(idx);
            match entry.get_type() {
                EntryType::File | EntryType::Directory => ans.push(Self::dirent(entry)),
                _ => continue
            }
        }
        Ok(ans)
    }
    fn get_file(&mut self,path: &Path) -> Result<Vec<u8>,Error> {
        let boot = self.read_boot()?;
        let buf = self.read_fat(&boot)?;
        let (dir,_,idx) = self.find(&boot,&buf,path)?;
        let entry = dir.get(idx);
        if entry.get_type() != EntryType::File {
            return Err(Error::BadPath(format!("{} is a directory",path)));
        }
        if entry.cluster() == 0 {
            return Ok(Vec::new());
        }
        let chain = match fat::chain(entry.cluster(),boot.cluster_count(),&buf) {
            Some(chain) => chain,
            None => return Err(Error::BadFilesystem(format!("{} has a broken cluster chain",path)))
        };
        let mut ans = Vec::new();
        for c in chain {
            ans.append(&mut self.sectors.get_logical_sector(boot.cluster_start(c),boot.sec_per_clus as usize)?);
        }
        if ans.len() < entry.file_size as usize {
            warn!("{} is truncated",path);
        }
        ans.truncate(entry.file_size as usize);
        Ok(ans)
    }
    fn put_file(&mut self,path: &Path,dat: &[u8]) -> Result<(),Error> {
        let boot = self.read_boot()?;
        let mut buf = self.read_fat(&boot)?;
        let base = match path.base() {
            Some(s) => s,
            None => return Err(Error::BadPath("cannot write to the root".to_string()))
        };
        let (name,ext) = split_name(base)?;
        let loc = self.goto_dir(&boot,&buf,&path.parent())?;
        let (mut dir,mut secs) = self.read_dir(&boot,&buf,loc)?;
        let mut entry = Entry::create(name,ext,directory::ARCHIVE,None);
        let existing = dir.find(&name,&ext);
        if let Some(idx) = existing {
            let old = dir.get(idx);
            if old.get_type() == EntryType::Directory {
                return Err(Error::BadPath(format!("{} is a directory",path)));
            }
            release(&boot,&mut buf,old.cluster());
            entry.attr = old.attr;
        }
        let mut pool = free_clusters(&boot,&buf);
        let slot = match existing {
            Some(idx) => idx,
            None => make_room(&boot,&mut buf,loc,&mut dir,&mut secs,&mut pool)?
        };
        let needed = (dat.len() + boot.cluster_bytes() - 1) / boot.cluster_bytes();
        if pool.len() < needed {
            return Err(Error::DiskFull(format!("file needs {} clusters, {} available",needed,pool.len())));
        }
        let chain = &pool[0..needed];
        link(chain,&mut buf);
        for (c,chunk) in chain.iter().zip(dat.chunks(boot.cluster_bytes())) {
            self.sectors.put_logical_sector(boot.cluster_start(*c),chunk)?;
        }
        entry.set_cluster(chain.first().copied().unwrap_or(0));
        entry.file_size = dat.len() as u32;
        dir.set(slot,entry);
        self.write_fat(&boot,&buf)?;
        self.write_dir(&dir,&secs)?;
        debug!("wrote {} bytes to {} in {} clusters",dat.len(),path,needed);
        Ok(())
    }
    fn get_metadata(&mut self,path: &Path) -> Result<BTreeMap<String,String>,Error> {
        let boot = self.read_boot()?;
        let buf = self.read_fat(&boot)?;
        if path.is_root() {
            let mut ans = Dirent {
                filename: String::new(),
                file_type: FileType::Directory,
                length: 0,
                mode: String::new()
            }.to_metadata();
            ans.insert(META_FREE.to_string(),fat::count_free(boot.cluster_count(),&buf).to_string());
            return Ok(ans);
        }
        let (dir,_,idx) = self.find(&boot,&buf,path)?;
        let entry = dir.get(idx);
        let mut ans = Self::dirent(entry).to_metadata();
        if let Some(modified) = entry.modified() {
            ans.insert(META_MODIFIED.to_string(),modified);
        }
        ans.insert(META_CLUSTER.to_string(),entry.cluster().to_string());
        Ok(ans)
    }
    fn put_metadata(&mut self,path: &Path,meta: &BTreeMap<String,String>) -> Result<(),Error> {
        let boot = self.read_boot()?;
        let buf = self.read_fat(&boot)?;
        let (mut dir,secs,idx) = self.find(&boot,&buf,path)?;
        let mut entry = dir.get(idx).clone();
        if let Some(mode) = meta.get(crate::fs::META_MODE) {
            if !entry.set_mode(mode) {
                warn!("mode `{}` has letters outside RHSA, ignoring",mode);
            }
        }
        dir.set(idx,entry);
        self.write_dir(&dir,&secs)
    }
}
