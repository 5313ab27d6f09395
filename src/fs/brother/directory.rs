//! ### Brother directory and allocation table
//!
//! The directory is a packed sequence of 16 byte entries.  The allocation table holds
//! one big endian link per logical sector; a file is a chain of links starting at the
//! sector named in its directory entry.

use std::collections::HashSet;
use binrw::{binrw,BinRead,BinWrite};
use binrw::io::Cursor;
use log::{debug,trace};
use crate::fs::Error;
use super::types::*;

#[binrw]
#[brw(big)]
#[derive(Clone,Debug,PartialEq)]
pub struct Entry {
    name: [u8;8],
    pub typ: u8,
    pub start: u16,
    /// sectors in the file
    pub count: u8,
    /// bytes used in the last sector, 0 means the whole sector
    pub tail: u8,
    reserved: [u8;3]
}

impl Entry {
    pub fn unused() -> Self {
        Self {
            name: [UNUSED,0,0,0,0,0,0,0],
            typ: 0,
            start: 0,
            count: 0,
            tail: 0,
            reserved: [0;3]
        }
    }
    pub fn is_unused(&self) -> bool {
        self.name[0] == UNUSED
    }
    pub fn name(&self) -> String {
        String::from_utf8_lossy(&self.name).trim_end_matches([' ','\u{0}']).to_string()
    }
    /// caller is responsible for validating the name
    pub fn set_name(&mut self,name: &str) {
        self.name = [b' ';8];
        for (i,c) in name.bytes().take(8).enumerate() {
            self.name[i] = c;
        }
    }
    pub fn length(&self) -> usize {
        match (self.count,self.tail) {
            (0,_) => 0,
            (n,0) => n as usize * SECTOR_SIZE,
            (n,t) => (n as usize - 1) * SECTOR_SIZE + t as usize
        }
    }
    pub fn set_length(&mut self,len: usize) {
        self.count = ((len + SECTOR_SIZE - 1) / SECTOR_SIZE) as u8;
        self.tail = (len % SECTOR_SIZE) as u8;
    }
    /// every byte of the name is printable and it is not blank
    pub fn is_plausible(&self) -> bool {
        let name = self.name();
        !name.is_empty() && name.bytes().all(|b| b > 0x20 && b < 0x7f)
    }
}

/// Directory is merely a packed sequence of entries.
pub struct Directory {
    entries: Vec<Entry>
}

impl Directory {
    pub fn new() -> Self {
        Self {
            entries: vec![Entry::unused();DIRECTORY_SIZE]
        }
    }
    pub fn from_bytes(buf: &[u8]) -> Result<Self,Error> {
        let mut entries = Vec::new();
        let mut cursor = Cursor::new(buf);
        for _ in 0..DIRECTORY_SIZE {
            match Entry::read(&mut cursor) {
                Ok(entry) => entries.push(entry),
                Err(e) => return Err(Error::BadFilesystem(format!("directory: {}",e)))
            }
        }
        Ok(Self { entries })
    }
    pub fn to_bytes(&self) -> Result<Vec<u8>,Error> {
        let mut cursor = Cursor::new(Vec::new());
        for entry in &self.entries {
            if let Err(e) = entry.write(&mut cursor) {
                return Err(Error::BadFilesystem(format!("directory: {}",e)));
            }
        }
        Ok(cursor.into_inner())
    }
    pub fn get(&self,idx: usize) -> &Entry {
        &self.entries[idx]
    }
    pub fn set(&mut self,idx: usize,entry: Entry) {
        self.entries[idx] = entry;
    }
    /// Indices of every entry in use
    pub fn used(&self) -> Vec<usize> {
        (0..self.entries.len()).filter(|i| !self.entries[*i].is_unused()).collect()
    }
    pub fn find(&self,name: &str) -> Option<usize> {
        self.used().into_iter().find(|i| self.entries[*i].name() == name)
    }
    pub fn free_slot(&self) -> Option<usize> {
        self.entries.iter().position(|e| e.is_unused())
    }
}

/// The allocation table, fully buffered
#[derive(Clone)]
pub struct AllocationTable {
    links: Vec<u16>
}

impl AllocationTable {
    /// Fresh table with the system sectors reserved
    pub fn new() -> Self {
        let mut links = vec![FREE;SECTOR_COUNT];
        for i in 0..DATA_START_SECTOR {
            links[i] = RESERVED;
        }
        Self { links }
    }
    pub fn from_bytes(buf: &[u8]) -> Self {
        let links = buf.chunks_exact(2).take(SECTOR_COUNT).map(|b| u16::from_be_bytes([b[0],b[1]])).collect();
        Self { links }
    }
    /// Serialize, padded to whole sectors
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut ans: Vec<u8> = self.links.iter().flat_map(|l| l.to_be_bytes()).collect();
        ans.resize(FAT_SECTORS * SECTOR_SIZE,0);
        ans
    }
    pub fn get(&self,sec: usize) -> u16 {
        self.links[sec]
    }
    pub fn set(&mut self,sec: usize,val: u16) {
        self.links[sec] = val;
    }
    pub fn free_sectors(&self) -> Vec<usize> {
        (DATA_START_SECTOR..SECTOR_COUNT).filter(|s| self.links[*s] == FREE).collect()
    }
    /// Follow a chain of `count` sectors.  The error string describes the first problem found.
    pub fn chain(&self,start: usize,count: usize) -> Result<Vec<usize>,String> {
        let mut ans = Vec::new();
        let mut visited = HashSet::new();
        let mut curr = start;
        for i in 0..count {
            if curr < DATA_START_SECTOR || curr >= SECTOR_COUNT {
                return Err(format!("link to sector {} is out of range",curr));
            }
            if !visited.insert(curr) {
                return Err(format!("chain loops back to sector {}",curr));
            }
            ans.push(curr);
            let next = self.links[curr];
            trace!("link {} -> {:04x}",curr,next);
            if next == FREE || next == RESERVED {
                return Err(format!("sector {} is in a chain but not allocated",curr));
            }
            if next == END {
                if i + 1 < count {
                    return Err(format!("chain ends after {} of {} sectors",i + 1,count));
                }
                return Ok(ans);
            }
            curr = next as usize;
        }
        if count > 0 {
            debug!("chain from {} continues past its length",start);
        }
        Ok(ans)
    }
    /// Release every sector in a chain, stops quietly on a broken link
    pub fn release(&mut self,start: usize,count: usize) {
        let mut curr = start;
        for _ in 0..count {
            if curr < DATA_START_SECTOR || curr >= SECTOR_COUNT || self.links[curr] == FREE || self.links[curr] == RESERVED {
                return;
            }
            let next = self.links[curr];
            self.links[curr] = FREE;
            if next == END {
                return;
            }
            curr = next as usize;
        }
    }
    /// Link the given sectors into a chain
    pub fn link(&mut self,sectors: &[usize]) {
        for (i,sec) in sectors.iter().enumerate() {
            self.links[*sec] = match sectors.get(i + 1) {
                Some(next) => *next as u16,
                None => END
            };
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn entry_bytes() {
        let mut entry = Entry::unused();
        entry.set_name("LETTER");
        entry.typ = 3;
        entry.start = 0x123;
        entry.set_length(600);
        let mut cursor = Cursor::new(Vec::new());
        entry.write(&mut cursor).expect("write failed");
        let buf = cursor.into_inner();
        assert_eq!(buf,vec![b'L',b'E',b'T',b'T',b'E',b'R',b' ',b' ',3,0x01,0x23,3,88,0,0,0]);
        let back = Entry::read(&mut Cursor::new(&buf)).expect("read failed");
        assert_eq!(back.name(),"LETTER");
        assert_eq!(back.length(),600);
    }

    #[test]
    fn lengths() {
        let mut entry = Entry::unused();
        for len in [0,1,255,256,257,512,65280] {
            entry.set_length(len);
            assert_eq!(entry.length(),len);
        }
    }

    #[test]
    fn chains() {
        let mut fat = AllocationTable::new();
        fat.link(&[20,14,30]);
        assert_eq!(fat.chain(20,3),Ok(vec![20,14,30]));
        assert!(fat.chain(20,4).is_err());
        assert!(fat.chain(3,1).is_err());
        fat.set(30,20);
        assert!(fat.chain(20,5).is_err());
        fat.release(20,3);
        assert_eq!(fat.free_sectors().len(),SECTOR_COUNT - DATA_START_SECTOR);
    }
}
