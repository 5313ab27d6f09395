use regex::Regex;
use crate::fs::Error;

/// Size of a sector
pub const SECTOR_SIZE: usize = 256;
/// Number of sectors on a 120kB disk
pub const SECTOR_COUNT: usize = 468;
/// Number of dirents in the directory
pub const DIRECTORY_SIZE: usize = 128;
/// Number of sectors in the directory
pub const DIRECTORY_SECTORS: usize = 8;
pub const FAT_START_SECTOR: usize = 8;
pub const FAT_SECTORS: usize = 4;
/// First sector available to files, sectors before this are never allocated
pub const DATA_START_SECTOR: usize = 14;
/// Longest file a directory entry can describe, in sectors
pub const MAX_FILE_SECTORS: usize = 255;

/// First name byte of an unused entry
pub const UNUSED: u8 = 0xf0;
pub const FREE: u16 = 0x0000;
pub const END: u16 = 0xffff;
pub const RESERVED: u16 = 0xfffe;

pub const META_TYPE: &str = "type";
pub const META_START: &str = "start_sector";
pub const META_SECTORS: &str = "sectors";
pub const META_FREE: &str = "free_sectors";

/// Names are 1 to 8 printable characters, no spaces
pub fn is_name_valid(s: &str) -> bool {
    let patt = Regex::new(r"^[!-~]{1,8}$").expect("unreachable");
    patt.is_match(s)
}

/// Extract the file name from a path, the name space is flat
pub fn file_name(path: &crate::fs::Path) -> Result<String,Error> {
    if path.len() != 1 {
        return Err(Error::BadPath(format!("{} is not a single name",path)));
    }
    let name = &path.segments()[0];
    if !is_name_valid(name) {
        return Err(Error::BadPath(format!("`{}` is not a valid file name",name)));
    }
    Ok(name.to_string())
}
