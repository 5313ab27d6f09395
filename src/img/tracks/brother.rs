//! # Brother Track Engine
//!
//! Encodes and decodes one revolution of a Brother word processor track.
//!
//! Each sector is two records that are placed at fixed times after the index hole.
//! The header record is 31 one-bits, the sector record marker, and the header codes for the
//! logical track, the sector id, and a terminator.  The data record is 32 one-bits,
//! the data record marker, and then the payload, checksum, and trailer packed into quintets.
//! Everything between records is filled with alternating transitions.
//!
//! The decoder slides a 32 bit window over the whole revolution looking for the two markers.
//! The markers begin with a run of ones longer than any run that can occur inside a record,
//! so a match can only happen on a real sync field.  After every record the search resumes
//! at the bit following its marker, which means a damaged record never hides its neighbor.

use bit_vec::BitVec;
use log::{trace,debug,info,warn,error};
use crate::img::{Error,NibbleError,Fluxmap,Sector,SectorStatus,SectorStore};
use super::FormatConfig;
use super::bits::{Bitstream,FILLER};
use super::brother_nibbles::{encode_data,decode_data,encode_header,decode_header};
use super::crc;
use crate::bios::skew::get_phys_interleave;

pub const BROTHER_SECTOR_RECORD: u32 = 0xFFFF_FD57;
pub const BROTHER_DATA_RECORD: u32 = 0xFFFF_FDDB;
pub const BROTHER_DATA_RECORD_PAYLOAD: usize = 256;
pub const BROTHER_DATA_RECORD_CHECKSUM: usize = 3;
pub const BROTHER_HEADER_TERMINATOR: u8 = 0x2f;
pub const BROTHER_DATA_TRAILER: [u8;2] = [0x58,0xd4];
const HEADER_SYNC_BITS: usize = 31;
const DATA_SYNC_BITS: usize = 32;
/// payload, checksum, and trailer
const RECORD_BYTES: usize = BROTHER_DATA_RECORD_PAYLOAD + BROTHER_DATA_RECORD_CHECKSUM + 2;
/// quintets needed to carry a record, padding quintets that follow are ignored
const RECORD_QUINTETS: usize = (RECORD_BYTES * 8 + 4) / 5;

/// Packs bytes into quintets and writes each quintet as a data code.
struct QuintetPacker {
    fifo: u32,
    width: usize
}

impl QuintetPacker {
    fn new() -> Self {
        Self { fifo: 0, width: 0 }
    }
    fn write_byte(&mut self,stream: &mut Bitstream,byte: u8) -> Result<(),Error> {
        self.fifo = (self.fifo << 8) | byte as u32;
        self.width += 8;
        while self.width >= 5 {
            let quintet = (self.fifo >> (self.width - 5)) & 0x1f;
            self.width -= 5;
            self.fifo &= (1 << self.width) - 1;
            stream.write_byte(encode_data(quintet as u8)?);
        }
        Ok(())
    }
    /// Feed zero bytes until no bits are left over
    fn flush(&mut self,stream: &mut Bitstream) -> Result<(),Error> {
        while self.width != 0 {
            self.write_byte(stream,0)?;
        }
        Ok(())
    }
}

fn write_header(stream: &mut Bitstream,logical_track: usize,sector_id: usize) -> Result<(),Error> {
    if logical_track > u8::MAX as usize || sector_id > u8::MAX as usize {
        error!("header field out of range, track {} sector {}",logical_track,sector_id);
        return Err(Error::SymbolDomain(usize::max(logical_track,sector_id)));
    }
    stream.write_field(0xffff_ffff,HEADER_SYNC_BITS);
    stream.write_field(BROTHER_SECTOR_RECORD as u64,32);
    stream.write_field(encode_header(logical_track as u8) as u64,16);
    stream.write_field(encode_header(sector_id as u8) as u64,16);
    stream.write_field(encode_header(BROTHER_HEADER_TERMINATOR) as u64,16);
    Ok(())
}

fn write_data(stream: &mut Bitstream,payload: &[u8]) -> Result<(),Error> {
    if payload.len() != BROTHER_DATA_RECORD_PAYLOAD {
        error!("sector payload is {} bytes",payload.len());
        return Err(Error::PayloadSize { expected: BROTHER_DATA_RECORD_PAYLOAD, actual: payload.len() });
    }
    stream.write_field(0xffff_ffff,DATA_SYNC_BITS);
    stream.write_field(BROTHER_DATA_RECORD as u64,32);
    let mut packer = QuintetPacker::new();
    for byte in payload {
        packer.write_byte(stream,*byte)?;
    }
    for byte in crc::checksum_bytes(payload) {
        packer.write_byte(stream,byte)?;
    }
    for byte in BROTHER_DATA_TRAILER {
        packer.write_byte(stream,byte)?;
    }
    packer.flush(stream)
}

/// Encode one physical track.  Returns `Ok(None)` if the track and side are
/// outside the envelope of the format.
pub fn encode_track<S: SectorStore + ?Sized>(physical_track: i32,side: usize,img: &S,cfg: &FormatConfig) -> Result<Option<Fluxmap>,Error> {
    let logical_track = match cfg.logical_track(physical_track,side) {
        Some(t) => t,
        None => {
            trace!("no logical track at {}/{}",physical_track,side);
            return Ok(None);
        }
    };
    cfg.validate()?;
    let skew = cfg.skew()?;
    let mut stream = Bitstream::new(cfg.canvas_bits());
    let zeros = vec![0;BROTHER_DATA_RECORD_PAYLOAD];
    debug!("encode physical track {} as logical track {}",physical_track,logical_track);
    if let Some(interleave) = get_phys_interleave(&skew) {
        trace!("sector interleave is {}",interleave);
    }
    for (slot,sector_id) in skew.iter().enumerate() {
        let header_ms = cfg.post_index_gap_ms + slot as f64 * cfg.sector_spacing_ms;
        let data_ms = header_ms + cfg.post_header_spacing_ms;
        stream.advance_to(cfg.ms_to_bits(header_ms),&FILLER);
        trace!("header for sector {} at bit {}",sector_id,stream.cursor());
        write_header(&mut stream,logical_track,*sector_id)?;
        stream.advance_to(cfg.ms_to_bits(data_ms),&FILLER);
        trace!("data for sector {} at bit {}",sector_id,stream.cursor());
        let payload = match img.get(logical_track,0,*sector_id) {
            Some(sec) => &sec.data[..],
            None => {
                warn!("sector {} of track {} missing, writing zeros",sector_id,logical_track);
                &zeros[..]
            }
        };
        write_data(&mut stream,payload)?;
    }
    let bits = stream.finish(&FILLER)?;
    Ok(Some(Fluxmap::new(bits,cfg.clock_ns())))
}

/// Sequential reader over a bit slice
struct BitReader<'a> {
    bits: &'a BitVec,
    ptr: usize
}

impl<'a> BitReader<'a> {
    fn new(bits: &'a BitVec,ptr: usize) -> Self {
        Self { bits, ptr }
    }
    fn read(&mut self,width: usize) -> Result<u64,NibbleError> {
        if self.ptr + width > self.bits.len() {
            return Err(NibbleError::BitPatternNotFound);
        }
        let mut ans: u64 = 0;
        for _ in 0..width {
            ans = (ans << 1) | self.bits[self.ptr] as u64;
            self.ptr += 1;
        }
        Ok(ans)
    }
}

/// Decode the three header fields that follow a sector record marker, returns (track,sector)
fn read_header(bits: &BitVec,ptr: usize) -> Result<(usize,usize),NibbleError> {
    let mut reader = BitReader::new(bits,ptr);
    let track = decode_header(reader.read(16)? as u16)?;
    let sector = decode_header(reader.read(16)? as u16)?;
    let term = decode_header(reader.read(16)? as u16)?;
    if term != BROTHER_HEADER_TERMINATOR {
        debug!("header terminator was {:02x}",term);
        return Err(NibbleError::InvalidCode);
    }
    Ok((track as usize,sector as usize))
}

/// Decode the record that follows a data record marker.  An invalid code does not stop
/// the record from being unpacked, the bad quintet is taken as 0.
fn read_data(bits: &BitVec,ptr: usize) -> Result<(Vec<u8>,SectorStatus),NibbleError> {
    let mut reader = BitReader::new(bits,ptr);
    let mut status = SectorStatus::Ok;
    let mut record: Vec<u8> = Vec::with_capacity(RECORD_BYTES);
    let mut fifo: u32 = 0;
    let mut width = 0;
    for _ in 0..RECORD_QUINTETS {
        let quintet = match decode_data(reader.read(8)? as u8) {
            Ok(q) => q,
            Err(_) => {
                status = SectorStatus::BadCode;
                0
            }
        };
        fifo = (fifo << 5) | quintet as u32;
        width += 5;
        if width >= 8 {
            width -= 8;
            record.push((fifo >> width) as u8);
            fifo &= (1 << width) - 1;
        }
    }
    record.truncate(RECORD_BYTES);
    let payload = record[0..BROTHER_DATA_RECORD_PAYLOAD].to_vec();
    if status == SectorStatus::Ok {
        let stored = [record[256],record[257],record[258]];
        if !crc::verify(&payload,stored) {
            debug!("{}, stored {}",NibbleError::BadChecksum,hex::encode(stored));
            status = SectorStatus::BadChecksum;
        } else if record[259..261] != BROTHER_DATA_TRAILER {
            debug!("{}: {}",NibbleError::BadTrailer,hex::encode(&record[259..261]));
            status = SectorStatus::BadChecksum;
        }
    }
    Ok((payload,status))
}

/// Add a sector to the decoded list, a good copy displaces a bad one, otherwise the first copy wins
fn keep(ans: &mut Vec<Sector>,sector: Sector) {
    match ans.iter().position(|s| s.track==sector.track && s.id==sector.id) {
        Some(idx) => {
            if ans[idx].is_bad() && !sector.is_bad() {
                ans[idx] = sector;
            } else {
                debug!("dropping duplicate of sector {}",sector.id);
            }
        },
        None => ans.push(sector)
    }
}

/// Decode every sector that can be found in one revolution.  Damaged records are
/// returned with a bad status, records that cannot be identified are skipped.
pub fn decode_track(flux: &Fluxmap,physical_track: i32,side: usize,cfg: &FormatConfig) -> Result<Vec<Sector>,Error> {
    cfg.validate()?;
    let expected = match cfg.logical_track(physical_track,side) {
        Some(t) => t,
        None => {
            error!("physical track {} side {} is not part of the format",physical_track,side);
            return Err(Error::SectorAccess);
        }
    };
    let bits = flux.bits();
    let mut ans: Vec<Sector> = Vec::new();
    let mut window: u32 = 0;
    let mut pending: Option<(usize,usize)> = None;
    for ptr in 0..bits.len() {
        window = (window << 1) | bits[ptr] as u32;
        if window == BROTHER_SECTOR_RECORD {
            pending = match read_header(bits,ptr+1) {
                Ok((track,id)) => {
                    trace!("header track {} sector {} at bit {}",track,id,ptr+1);
                    if track != expected {
                        warn!("found logical track {} while reading logical track {}",track,expected);
                    }
                    Some((track,id))
                },
                Err(e) => {
                    debug!("dropping header at bit {}: {}",ptr+1,e);
                    None
                }
            };
        } else if window == BROTHER_DATA_RECORD {
            let (track,id) = match pending.take() {
                Some(addr) => addr,
                None => {
                    debug!("data record at bit {} has no header",ptr+1);
                    continue;
                }
            };
            match read_data(bits,ptr+1) {
                Ok((payload,status)) => {
                    if status != SectorStatus::Ok {
                        info!("sector {} of track {} is bad ({:?})",id,track,status);
                    }
                    let mut sector = Sector::new(track,0,id,payload);
                    sector.status = status;
                    keep(&mut ans,sector);
                },
                Err(e) => debug!("data record for sector {} truncated: {}",id,e)
            }
        }
    }
    debug!("decoded {} sectors from physical track {}",ans.len(),physical_track);
    Ok(ans)
}

/// Decode a track and commit the result.  A bad sector never replaces a good one already
/// in the store.  Returns the number of good sectors committed.
pub fn decode_into<S: SectorStore + ?Sized>(store: &mut S,flux: &Fluxmap,physical_track: i32,side: usize,cfg: &FormatConfig) -> Result<usize,Error> {
    let mut good = 0;
    for sector in decode_track(flux,physical_track,side,cfg)? {
        if sector.is_bad() {
            if let Some(old) = store.get(sector.track,sector.side,sector.id) {
                if !old.is_bad() {
                    continue;
                }
            }
        } else {
            good += 1;
        }
        store.put(sector.track,sector.side,sector.id,sector);
    }
    Ok(good)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn record_sizes() {
        assert_eq!(RECORD_BYTES,261);
        assert_eq!(RECORD_QUINTETS,418);
    }

    #[test]
    fn packer_matches_reader() {
        let payload: Vec<u8> = (0..256).map(|i| (i * 7) as u8).collect();
        let mut stream = Bitstream::new(5000);
        write_data(&mut stream,&payload).expect("encode failed");
        // 64 bits of sync and marker, then 261 bytes plus padding to a whole number of quintets
        assert_eq!(stream.cursor(),64 + 424*8);
        let bits = stream.finish(&FILLER).expect("overrun");
        let (back,status) = read_data(&bits,64).expect("truncated");
        assert_eq!(status,SectorStatus::Ok);
        assert_eq!(back,payload);
    }

    #[test]
    fn header_fields() {
        let mut stream = Bitstream::new(200);
        write_header(&mut stream,38,11).expect("encode failed");
        let bits = stream.finish(&FILLER).expect("overrun");
        assert_eq!(read_header(&bits,63),Ok((38,11)));
    }
}
