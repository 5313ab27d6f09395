//! ## Sector Skewing Module
//! 
//! Interleave tables are written as strings with one base 36 digit per physical slot,
//! so that a 12 sector track can be described as e.g. `05a3816b4927`.
//! 
//! The sector skews are kept separate from file systems and disk images because multiple
//! submodules of either can use the same tables.

use log::{trace,error};
use crate::img;

/// Value of a base 36 digit, 0-9 then a-z (either case) for 10-35
pub fn char_to_int(c: char) -> Option<usize> {
    match c {
        '0'..='9' => Some(c as usize - '0' as usize),
        'a'..='z' => Some(c as usize - 'a' as usize + 10),
        'A'..='Z' => Some(c as usize - 'A' as usize + 10),
        _ => None
    }
}

/// Turn a skew string into the list of sector ids in physical order.
pub fn parse_skew(skew: &str) -> Result<Vec<usize>,img::Error> {
    let mut ans = Vec::new();
    for c in skew.chars() {
        match char_to_int(c) {
            Some(id) => ans.push(id),
            None => {
                error!("`{}` is not a skew digit",c);
                return Err(img::Error::BadSkew);
            }
        }
    }
    trace!("skew {} -> {:?}",skew,ans);
    Ok(ans)
}

/// Get the interleave ratio from a *physical* skew table, i.e., how many slots
/// separate sector n from sector n+1.  Returns None if the table is not a simple interleave.
pub fn get_phys_interleave(table: &[usize]) -> Option<usize> {
    let first = *table.first()?;
    let rep = table.iter().position(|id| *id == first + 1)?;
    for i in 0..table.len() {
        let next = table[(i + rep) % table.len()];
        if next != table[i] + 1 && next != 0 {
            return None;
        }
    }
    Some(rep)
}
