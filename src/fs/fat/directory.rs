//! ### FAT directory structures
//!
//! This module encapsulates the FAT directory.  The FAT itself is implemented in
//! `crate::bios::fat`.  The same structure serves the fixed root directory and
//! subdirectories, which are cluster chains.

use binrw::{binrw,BinRead,BinWrite};
use binrw::io::Cursor;
use log::trace;
use crate::fs::Error;
use super::types::*;

/// Size of the directory entry in bytes, always 32
pub const DIR_ENTRY_SIZE: usize = 32;
/// first name byte for a free entry.
const FREE: u8 = 0xe5;
/// first name byte for a free entry, but also indicating no more entries to follow.
const FREE_AND_NO_MORE: u8 = 0x00;

pub const READ_ONLY: u8 = 1;
pub const HIDDEN: u8 = 2;
pub const SYSTEM: u8 = 4;
pub const VOLUME_ID: u8 = 8;
pub const DIRECTORY: u8 = 16;
pub const ARCHIVE: u8 = 32;
pub const LONG_NAME: u8 = 15;

const MODE_LETTERS: [(char,u8);4] = [('R',READ_ONLY),('H',HIDDEN),('S',SYSTEM),('A',ARCHIVE)];

#[derive(PartialEq,Debug)]
pub enum EntryType {
    Free,
    FreeAndNoMore,
    File,
    Directory,
    /// either `.` or `..`
    Dot,
    VolumeLabel,
    LongName
}

#[binrw]
#[brw(little)]
#[derive(Clone,Debug,PartialEq)]
pub struct Entry {
    name: [u8;8],
    ext: [u8;3],
    /// RO=1,hidden=2,sys=4,vol=8,dir=16,archive=32,long_name=15.
    /// If this is a directory, file_size=0.
    pub attr: u8,
    nt_res: u8,
    creation_tenth: u8,
    creation_time: u16,
    creation_date: u16,
    access_date: u16,
    cluster1_high: u16,
    write_time: u16,
    write_date: u16,
    cluster1_low: u16,
    pub file_size: u32
}

impl Entry {
    pub fn new() -> Self {
        Self {
            name: [FREE_AND_NO_MORE;8],
            ext: [0;3],
            attr: 0,
            nt_res: 0,
            creation_tenth: 0,
            creation_time: 0,
            creation_date: 0,
            access_date: 0,
            cluster1_high: 0,
            write_time: 0,
            write_date: 0,
            cluster1_low: 0,
            file_size: 0
        }
    }
    /// Fresh entry stamped with `time`, or the current time if None
    pub fn create(name: [u8;8],ext: [u8;3],attr: u8,time: Option<chrono::NaiveDateTime>) -> Self {
        let mut ans = Self::new();
        ans.name = name;
        ans.ext = ext;
        ans.attr = attr;
        ans.stamp(time);
        ans.creation_time = ans.write_time;
        ans.creation_date = ans.write_date;
        ans.access_date = ans.write_date;
        ans
    }
    /// Entry for `.` or `..` pointing at `cluster`
    pub fn create_dot(dots: usize,cluster: usize,time: Option<chrono::NaiveDateTime>) -> Self {
        let mut name = [b' ';8];
        for i in 0..dots {
            name[i] = b'.';
        }
        let mut ans = Self::create(name,[b' ';3],DIRECTORY,time);
        ans.set_cluster(cluster);
        ans
    }
    pub fn stamp(&mut self,time: Option<chrono::NaiveDateTime>) {
        self.write_date = pack_date(time);
        self.write_time = pack_time(time);
    }
    pub fn get_type(&self) -> EntryType {
        match self.name[0] {
            FREE_AND_NO_MORE => return EntryType::FreeAndNoMore,
            FREE => return EntryType::Free,
            _ => {}
        }
        if self.attr & LONG_NAME == LONG_NAME {
            return EntryType::LongName;
        }
        if self.attr & VOLUME_ID > 0 {
            return EntryType::VolumeLabel;
        }
        if self.name[0] == b'.' {
            return EntryType::Dot;
        }
        match self.attr & DIRECTORY > 0 {
            true => EntryType::Directory,
            false => EntryType::File
        }
    }
    pub fn is_match(&self,name: &[u8;8],ext: &[u8;3]) -> bool {
        &self.name == name && &self.ext == ext
    }
    /// Name in the form `NAME.EXT`, or `NAME` if the extension is blank
    pub fn file_name(&self) -> String {
        let base = String::from_utf8_lossy(&self.name).trim_end().to_string();
        let ext = String::from_utf8_lossy(&self.ext).trim_end().to_string();
        match ext.len() {
            0 => base,
            _ => [base,ext].join(".")
        }
    }
    pub fn cluster(&self) -> usize {
        ((self.cluster1_high as usize) << 16) + self.cluster1_low as usize
    }
    pub fn set_cluster(&mut self,cluster: usize) {
        self.cluster1_low = (cluster & 0xffff) as u16;
        self.cluster1_high = (cluster >> 16) as u16;
    }
    /// Attribute letters from `RHSA`
    pub fn mode(&self) -> String {
        MODE_LETTERS.iter().filter(|(_,bit)| self.attr & bit > 0).map(|(c,_)| *c).collect()
    }
    /// Set attributes from letters, other attributes are kept.  Returns false if
    /// the string has an unknown letter, in which case nothing changes.
    pub fn set_mode(&mut self,mode: &str) -> bool {
        let mut attr = self.attr & (VOLUME_ID | DIRECTORY);
        for c in mode.to_uppercase().chars() {
            match MODE_LETTERS.iter().find(|(l,_)| *l == c) {
                Some((_,bit)) => attr |= bit,
                None => return false
            }
        }
        self.attr = attr;
        true
    }
    /// Last write time formatted as `YYYY-MM-DD HH:MM:SS`
    pub fn modified(&self) -> Option<String> {
        let date = unpack_date(self.write_date)?;
        let time = unpack_time(self.write_time)?;
        Some(chrono::NaiveDateTime::new(date,time).format("%Y-%m-%d %H:%M:%S").to_string())
    }
}

/// Directory is merely a packed sequence of entries.
pub struct Directory {
    entries: Vec<Entry>
}

impl Directory {
    pub fn from_bytes(buf: &[u8]) -> Result<Self,Error> {
        let mut entries = Vec::new();
        let mut cursor = Cursor::new(buf);
        for _ in 0..buf.len() / DIR_ENTRY_SIZE {
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
    pub fn num_entries(&self) -> usize {
        self.entries.len()
    }
    /// Add `count` blank entries at the end
    pub fn expand(&mut self,count: usize) {
        trace!("expand directory by {} entries",count);
        for _i in 0..count {
            self.entries.push(Entry::new());
        }
    }
    pub fn get(&self,idx: usize) -> &Entry {
        &self.entries[idx]
    }
    pub fn set(&mut self,idx: usize,entry: Entry) {
        self.entries[idx] = entry;
    }
    /// Indices of entries up to the first end marker
    pub fn active(&self) -> Vec<usize> {
        let end = self.entries.iter().position(|e| e.get_type() == EntryType::FreeAndNoMore).unwrap_or(self.entries.len());
        (0..end).filter(|i| self.entries[*i].get_type() != EntryType::Free).collect()
    }
    /// Find a file or directory by name
    pub fn find(&self,name: &[u8;8],ext: &[u8;3]) -> Option<usize> {
        self.active().into_iter().find(|i| {
            let typ = self.entries[*i].get_type();
            (typ == EntryType::File || typ == EntryType::Directory) && self.entries[*i].is_match(name,ext)
        })
    }
    pub fn free_slot(&self) -> Option<usize> {
        self.entries.iter().position(|e| e.get_type() == EntryType::Free || e.get_type() == EntryType::FreeAndNoMore)
    }
}
