//! CRC used by Brother data records
//!
//! This is a 24 bit CRC with polynomial 0x864CFB, zero initial value, MSB first, and no
//! final xor.  It covers the sector payload only.  The table is built at compile time.

const POLY: u32 = 0x86_4CFB;
const MASK: u32 = 0xff_ffff;

const fn make_table() -> [u32;256] {
    let mut table = [0u32;256];
    let mut i = 0;
    while i < 256 {
        let mut crc = (i as u32) << 16;
        let mut j = 0;
        while j < 8 {
            crc <<= 1;
            if crc & 0x100_0000 != 0 {
                crc ^= POLY;
            }
            j += 1;
        }
        table[i] = crc & MASK;
        i += 1;
    }
    table
}

static TABLE: [u32;256] = make_table();

/// Checksum of a payload, the result occupies the low 24 bits
pub fn checksum(payload: &[u8]) -> u32 {
    let mut crc: u32 = 0;
    for byte in payload {
        let idx = ((crc >> 16) as u8 ^ *byte) as usize;
        crc = ((crc << 8) ^ TABLE[idx]) & MASK;
    }
    crc
}

/// Checksum as it is written to disk
pub fn checksum_bytes(payload: &[u8]) -> [u8;3] {
    let crc = checksum(payload);
    [(crc >> 16) as u8,(crc >> 8) as u8,crc as u8]
}

pub fn verify(payload: &[u8],stored: [u8;3]) -> bool {
    checksum_bytes(payload) == stored
}
