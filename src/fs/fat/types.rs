//! ### FAT types
//!
//! Boot sector parameters, 8.3 names, and date packing.

use binrw::binrw;
use chrono::{Timelike,Datelike};
use log::{debug,info};
use crate::fs::Error;

pub const SECTOR_SIZE: usize = 512;
/// Largest cluster count that is still FAT12
pub const MAX_CLUSTERS12: usize = 4084;
/// Characters forbidden from file names
pub const INVALID_CHARS: &str = "\"*+,./:;<=>?[\\]|";

pub const META_MODIFIED: &str = "modified";
pub const META_CLUSTER: &str = "cluster";
pub const META_FREE: &str = "free_clusters";

/// BIOS parameter block with the DOS 3.31 fields, found at the start of the boot sector.
#[binrw]
#[brw(little)]
#[derive(Clone,Debug,PartialEq)]
pub struct BootSector {
    jmp: [u8;3],
    oem: [u8;8],
    pub bytes_per_sec: u16,
    pub sec_per_clus: u8,
    pub rsvd_sec_cnt: u16,
    pub num_fats: u8,
    pub root_ent_cnt: u16,
    pub tot_sec16: u16,
    pub media: u8,
    pub fat_sz16: u16,
    pub sec_per_trk: u16,
    pub num_heads: u16,
    pub hidd_sec: u32,
    pub tot_sec32: u32
}

impl BootSector {
    /// Parameters for a fresh volume spanning `total` sectors.
    /// The FAT size is the smallest that covers every cluster.
    pub fn create(total: usize,sec_per_trk: usize,num_heads: usize) -> Result<Self,Error> {
        let mut ans = Self {
            jmp: [0xeb,0x3c,0x90],
            oem: *b"FLUXKIT ",
            bytes_per_sec: SECTOR_SIZE as u16,
            sec_per_clus: 2,
            rsvd_sec_cnt: 1,
            num_fats: 2,
            root_ent_cnt: 112,
            tot_sec16: 0,
            media: 0xf9,
            fat_sz16: 1,
            sec_per_trk: sec_per_trk as u16,
            num_heads: num_heads as u16,
            hidd_sec: 0,
            tot_sec32: 0
        };
        match u16::try_from(total) {
            Ok(t) => ans.tot_sec16 = t,
            Err(_) => ans.tot_sec32 = total as u32
        }
        loop {
            if ans.first_data_sec() >= total {
                return Err(Error::BadFilesystem(format!("{} sectors is too small for FAT",total)));
            }
            let need = (crate::bios::fat::fat_bytes(ans.cluster_count() + 2) + SECTOR_SIZE - 1) / SECTOR_SIZE;
            if need <= ans.fat_sz16 as usize {
                break;
            }
            ans.fat_sz16 = need as u16;
        }
        if ans.cluster_count() > MAX_CLUSTERS12 {
            return Err(Error::BadFilesystem(format!("{} clusters is too many for FAT12",ans.cluster_count())));
        }
        debug!("FAT size {} sectors, {} clusters",ans.fat_sz16,ans.cluster_count());
        Ok(ans)
    }
    /// Check the fields make sense for a FAT12 volume of at most `available` sectors
    pub fn verify(&self,available: usize) -> Result<(),Error> {
        let err = |s: &str| Err(Error::BadFilesystem(format!("boot sector: {}",s)));
        if self.bytes_per_sec as usize != SECTOR_SIZE {
            return err("sector size");
        }
        if !self.sec_per_clus.is_power_of_two() {
            return err("sectors per cluster");
        }
        if self.rsvd_sec_cnt < 1 || self.num_fats < 1 || self.num_fats > 2 {
            return err("reserved sectors or FAT count");
        }
        if self.root_ent_cnt == 0 || self.root_ent_cnt % 16 != 0 {
            return err("root entry count");
        }
        if self.media < 0xf0 || self.fat_sz16 == 0 {
            return err("media byte or FAT size");
        }
        if self.total_sectors() > available || self.first_data_sec() >= self.total_sectors() {
            return err("sector count");
        }
        if self.cluster_count() > MAX_CLUSTERS12 {
            return err("cluster count");
        }
        if crate::bios::fat::fat_bytes(self.cluster_count() + 2) > self.fat_sz16 as usize * SECTOR_SIZE {
            return err("FAT is too small for the clusters");
        }
        Ok(())
    }
    pub fn total_sectors(&self) -> usize {
        match self.tot_sec16 {
            0 => self.tot_sec32 as usize,
            n => n as usize
        }
    }
    pub fn fat_sectors(&self) -> usize {
        self.fat_sz16 as usize
    }
    /// First sector of FAT copy `n`
    pub fn fat_start(&self,n: usize) -> usize {
        self.rsvd_sec_cnt as usize + n * self.fat_sectors()
    }
    pub fn root_dir_start(&self) -> usize {
        self.fat_start(self.num_fats as usize)
    }
    pub fn root_dir_sectors(&self) -> usize {
        (self.root_ent_cnt as usize * 32 + SECTOR_SIZE - 1) / SECTOR_SIZE
    }
    pub fn first_data_sec(&self) -> usize {
        self.root_dir_start() + self.root_dir_sectors()
    }
    pub fn cluster_count(&self) -> usize {
        self.total_sectors().saturating_sub(self.first_data_sec()) / self.sec_per_clus as usize
    }
    pub fn cluster_bytes(&self) -> usize {
        self.sec_per_clus as usize * SECTOR_SIZE
    }
    /// First logical sector of a data cluster
    pub fn cluster_start(&self,cluster: usize) -> usize {
        self.first_data_sec() + (cluster - 2) * self.sec_per_clus as usize
    }
    /// The data cluster holding a logical sector, if any
    pub fn sector_cluster(&self,sec: usize) -> Option<usize> {
        if sec < self.first_data_sec() {
            return None;
        }
        let ans = (sec - self.first_data_sec()) / self.sec_per_clus as usize + 2;
        match ans < self.cluster_count() + 2 {
            true => Some(ans),
            false => None
        }
    }
}

/// Accepts lower case, case is raised by `split_name`.
/// "." and ".." are not accepted here.
pub fn is_name_valid(s: &str) -> bool {
    let it: Vec<&str> = s.split('.').collect();
    if it.len() > 2 {
        return false;
    }
    let base = it[0];
    let ext = match it.len() {
        1 => "",
        _ => it[1]
    };
    for char in [base,ext].concat().chars() {
        if !char.is_ascii() || INVALID_CHARS.contains(char) || char.is_ascii_control() || char == ' ' {
            debug!("bad file name character `{}` (codepoint {})",char,char as u32);
            return false;
        }
    }
    if base.len() < 1 || base.len() > 8 {
        info!("base name length {} out of range",base.len());
        return false;
    }
    if ext.len() > 3 {
        info!("extension name too long, max 3");
        return false;
    }
    true
}

/// Convert a path segment to space padded upper case name and extension bytes
pub fn split_name(s: &str) -> Result<([u8;8],[u8;3]),Error> {
    if !is_name_valid(s) {
        return Err(Error::BadPath(format!("`{}` is not an 8.3 name",s)));
    }
    let upper = s.to_uppercase();
    let (base,ext) = upper.split_once('.').unwrap_or((&upper,""));
    let mut name = [b' ';8];
    let mut typ = [b' ';3];
    name[0..base.len()].copy_from_slice(base.as_bytes());
    typ[0..ext.len()].copy_from_slice(ext.as_bytes());
    Ok((name,typ))
}

/// pack the date into the FAT format, if the year is not between 1980
/// and 2107 it will be pegged to the nearest representable date.
pub fn pack_date(time: Option<chrono::NaiveDateTime>) -> u16 {
    let now = match time {
        Some(t) => t,
        _ => chrono::Local::now().naive_local()
    };
    let year = match now.year() {
        y if y < 1980 => {
            log::warn!("date prior to reference date, pegging to reference date");
            1980
        },
        y if y > 2107 => {
            log::warn!("date is pegged to maximum of 2107");
            2107
        },
        y => y
    };
    now.day() as u16 + ((now.month() as u16) << 5) + ((year as u16 - 1980) << 9)
}

pub fn pack_time(time: Option<chrono::NaiveDateTime>) -> u16 {
    let now = match time {
        Some(t) => t,
        _ => chrono::Local::now().naive_local()
    };
    (now.second() as u16) / 2 + ((now.minute() as u16) << 5) + ((now.hour() as u16) << 11)
}

pub fn unpack_date(date16: u16) -> Option<chrono::NaiveDate> {
    if date16 == 0 {
        return None;
    }
    let year = 1980 + (date16 >> 9) as i32;
    let month = ((date16 & 0b0000_0001_1110_0000) >> 5) as u32;
    let day = (date16 & 0b1_1111) as u32;
    chrono::NaiveDate::from_ymd_opt(year,month,day)
}

pub fn unpack_time(time16: u16) -> Option<chrono::NaiveTime> {
    let hour = (time16 >> 11) as u32;
    let min = ((time16 & 0b0000_0111_1110_0000) >> 5) as u32;
    let sec2 = (time16 & 0b1_1111) as u32;
    chrono::NaiveTime::from_hms_opt(hour,min,sec2 * 2)
}
