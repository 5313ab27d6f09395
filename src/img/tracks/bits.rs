//! Bit canvas for building one revolution of a track
//!
//! The canvas has a fixed length and a write cursor that only moves forward.
//! Writes that land past the end are dropped bit by bit; the caller finds out
//! about the overrun once, when the track is finished.

use bit_vec::BitVec;
use log::{trace,error};
use crate::img::Error;

/// Gap filler, alternating transitions
pub const FILLER: [bool;2] = [true,false];

pub struct Bitstream {
    bits: BitVec,
    cursor: usize
}

impl Bitstream {
    /// Zeroed canvas of the given length with the cursor at 0
    pub fn new(canvas_bits: usize) -> Self {
        Self {
            bits: BitVec::from_elem(canvas_bits,false),
            cursor: 0
        }
    }
    pub fn cursor(&self) -> usize {
        self.cursor
    }
    pub fn len(&self) -> usize {
        self.bits.len()
    }
    pub fn is_empty(&self) -> bool {
        self.bits.is_empty()
    }
    pub fn overrun(&self) -> bool {
        self.cursor >= self.bits.len()
    }
    /// Advance the cursor by `width` and store `value` MSB first so that the
    /// last bit ends up just before the new cursor.
    pub fn write_field(&mut self,value: u64,width: usize) {
        assert!(width <= 64);
        self.cursor += width;
        let mut val = value;
        for i in 0..width {
            let pos = self.cursor - i - 1;
            if pos < self.bits.len() {
                self.bits.set(pos,val & 1 > 0);
            }
            val >>= 1;
        }
    }
    pub fn write_byte(&mut self,value: u8) {
        self.write_field(value as u64,8);
    }
    /// Write copies of `pattern` until the cursor reaches `target`.  Whole copies
    /// are always written, so the cursor can land slightly past `target`.
    /// If the cursor is already at or beyond `target` nothing happens.
    pub fn advance_to(&mut self,target: usize,pattern: &[bool]) {
        if pattern.is_empty() {
            return;
        }
        trace!("fill from {} to {}",self.cursor,target);
        while self.cursor < target {
            for b in pattern {
                if self.cursor < self.bits.len() {
                    self.bits.set(self.cursor,*b);
                }
                self.cursor += 1;
            }
        }
    }
    /// Fill the remainder of the canvas and give it up, or fail if the cursor has run off the end.
    pub fn finish(mut self,pattern: &[bool]) -> Result<BitVec,Error> {
        if self.overrun() {
            error!("track data overrun, cursor {} canvas {}",self.cursor,self.bits.len());
            return Err(Error::TrackOverrun);
        }
        let end = self.bits.len();
        self.advance_to(end,pattern);
        Ok(self.bits)
    }
}
