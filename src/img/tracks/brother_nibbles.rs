//! Module for handling Brother GCR
//!
//! Brother word processor disks use two alphabets.  Payload bytes are packed into a stream of
//! quintets and each quintet is written as one 8-bit code from `FWD_DATA`.  Header fields are
//! written with a wider alphabet: each byte becomes 16 bits, the high five bits of the byte
//! selecting the first code and the low three bits the second.  Both alphabets decode through
//! the same reverse table, so there is exactly one table to keep consistent.
//!
//! No code contains two adjacent zeros.

use crate::img::{Error,NibbleError};

const INVALID_NIB_BYTE: u8 = 0xff;

const FWD_DATA: [u8;32] = [
    0x56, 0x57, 0x5a, 0x5b, 0x5d, 0x5e, 0x5f, 0x6a,
    0x6b, 0x6d, 0x6e, 0x6f, 0x75, 0x76, 0x77, 0x7a,
    0x7b, 0x7d, 0x7e, 0x7f, 0xab, 0xad, 0xae, 0xaf,
    0xb5, 0xb6, 0xb7, 0xba, 0xbb, 0xbd, 0xbe, 0xbf
];

const REV_DATA: [u8;256] = [
    0xFF,0xFF,0xFF,0xFF,0xFF,0xFF,0xFF,0xFF,0xFF,0xFF,0xFF,0xFF,0xFF,0xFF,0xFF,0xFF,
    0xFF,0xFF,0xFF,0xFF,0xFF,0xFF,0xFF,0xFF,0xFF,0xFF,0xFF,0xFF,0xFF,0xFF,0xFF,0xFF,
    0xFF,0xFF,0xFF,0xFF,0xFF,0xFF,0xFF,0xFF,0xFF,0xFF,0xFF,0xFF,0xFF,0xFF,0xFF,0xFF,
    0xFF,0xFF,0xFF,0xFF,0xFF,0xFF,0xFF,0xFF,0xFF,0xFF,0xFF,0xFF,0xFF,0xFF,0xFF,0xFF,
    0xFF,0xFF,0xFF,0xFF,0xFF,0xFF,0xFF,0xFF,0xFF,0xFF,0xFF,0xFF,0xFF,0xFF,0xFF,0xFF,
    0xFF,0xFF,0xFF,0xFF,0xFF,0xFF,0x00,0x01,0xFF,0xFF,0x02,0x03,0xFF,0x04,0x05,0x06,
    0xFF,0xFF,0xFF,0xFF,0xFF,0xFF,0xFF,0xFF,0xFF,0xFF,0x07,0x08,0xFF,0x09,0x0A,0x0B,
    0xFF,0xFF,0xFF,0xFF,0xFF,0x0C,0x0D,0x0E,0xFF,0xFF,0x0F,0x10,0xFF,0x11,0x12,0x13,
    0xFF,0xFF,0xFF,0xFF,0xFF,0xFF,0xFF,0xFF,0xFF,0xFF,0xFF,0xFF,0xFF,0xFF,0xFF,0xFF,
    0xFF,0xFF,0xFF,0xFF,0xFF,0xFF,0xFF,0xFF,0xFF,0xFF,0xFF,0xFF,0xFF,0xFF,0xFF,0xFF,
    0xFF,0xFF,0xFF,0xFF,0xFF,0xFF,0xFF,0xFF,0xFF,0xFF,0xFF,0x14,0xFF,0x15,0x16,0x17,
    0xFF,0xFF,0xFF,0xFF,0xFF,0x18,0x19,0x1A,0xFF,0xFF,0x1B,0x1C,0xFF,0x1D,0x1E,0x1F,
    0xFF,0xFF,0xFF,0xFF,0xFF,0xFF,0xFF,0xFF,0xFF,0xFF,0xFF,0xFF,0xFF,0xFF,0xFF,0xFF,
    0xFF,0xFF,0xFF,0xFF,0xFF,0xFF,0xFF,0xFF,0xFF,0xFF,0xFF,0xFF,0xFF,0xFF,0xFF,0xFF,
    0xFF,0xFF,0xFF,0xFF,0xFF,0xFF,0xFF,0xFF,0xFF,0xFF,0xFF,0xFF,0xFF,0xFF,0xFF,0xFF,
    0xFF,0xFF,0xFF,0xFF,0xFF,0xFF,0xFF,0xFF,0xFF,0xFF,0xFF,0xFF,0xFF,0xFF,0xFF,0xFF
];

/// Encode a quintet (0..32) as an 8-bit data code
pub fn encode_data(quintet: u8) -> Result<u8,Error> {
    match FWD_DATA.get(quintet as usize) {
        Some(code) => Ok(*code),
        None => {
            log::error!("quintet {} out of range",quintet);
            Err(Error::SymbolDomain(quintet as usize))
        }
    }
}

/// Decode an 8-bit data code to a quintet
pub fn decode_data(code: u8) -> Result<u8,NibbleError> {
    match REV_DATA[code as usize] {
        INVALID_NIB_BYTE => Err(NibbleError::InvalidCode),
        q => Ok(q)
    }
}

/// Encode a header byte as a 16-bit code, defined for every byte
pub fn encode_header(val: u8) -> u16 {
    ((FWD_DATA[(val >> 3) as usize] as u16) << 8) | FWD_DATA[(val & 7) as usize] as u16
}

/// Decode a 16-bit header code
pub fn decode_header(code: u16) -> Result<u8,NibbleError> {
    let hi = decode_data((code >> 8) as u8)?;
    let lo = decode_data(code as u8)?;
    if lo > 7 {
        return Err(NibbleError::InvalidCode);
    }
    Ok((hi << 3) | lo)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn data_alphabet_is_bijective() {
        for q in 0..32 {
            let code = encode_data(q).expect("in domain");
            assert_eq!(decode_data(code),Ok(q));
        }
        let valid = (0..=255u8).filter(|c| decode_data(*c).is_ok()).count();
        assert_eq!(valid,32);
        assert_eq!(decode_data(0xff),Err(NibbleError::InvalidCode));
        assert_eq!(decode_data(0x00),Err(NibbleError::InvalidCode));
    }

    #[test]
    fn data_out_of_domain() {
        assert_eq!(encode_data(32),Err(Error::SymbolDomain(32)));
        assert_eq!(encode_data(0xff),Err(Error::SymbolDomain(255)));
    }

    #[test]
    fn header_alphabet_is_bijective() {
        for v in 0..=255u8 {
            assert_eq!(decode_header(encode_header(v)),Ok(v));
        }
        let valid = (0..=0xffffu16).filter(|c| decode_header(*c).is_ok()).count();
        assert_eq!(valid,256);
        // low code must come from the first eight entries
        assert_eq!(decode_header(0x566b),Err(NibbleError::InvalidCode));
    }

    #[test]
    fn no_double_zeros() {
        for code in FWD_DATA {
            for shift in 0..7 {
                assert_ne!((code >> shift) & 3,0,"code {:02x}",code);
            }
        }
    }
}
