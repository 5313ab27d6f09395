use std::fmt;
use num_derive::FromPrimitive;

pub const SECTOR_SIZE: usize = 256;
/// Catalogue is always in the first two sectors
pub const CATALOGUE_SECTORS: usize = 2;
pub const MAX_FILES: usize = 31;

pub const META_LOAD: &str = "load_address";
pub const META_EXEC: &str = "exec_address";
pub const META_LOCKED: &str = "locked";
pub const META_START: &str = "start_sector";
pub const META_TITLE: &str = "title";
pub const META_CYCLE: &str = "cycle";
pub const META_BOOT: &str = "boot_option";
pub const META_SECTORS: &str = "sectors";

/// What happens on shift-break
#[derive(FromPrimitive,Clone,Copy,Debug,PartialEq)]
pub enum BootOption {
    None = 0,
    Load = 1,
    Run = 2,
    Exec = 3
}

impl fmt::Display for BootOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f,"none"),
            Self::Load => write!(f,"load"),
            Self::Run => write!(f,"run"),
            Self::Exec => write!(f,"exec")
        }
    }
}
