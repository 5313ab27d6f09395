//! ### File allocation table (FAT)
//!
//! Module for manipulating a 12 bit FAT.  This module assumes the
//! entire FAT is buffered (small retro volumes).
//!
//! The FAT can be thought of as a cluster pool with forward links.
//! A cluster is an allocation unit composed of a fixed number of logical sectors.
//! The links in the FAT form chains of clusters, each chain points to a file's data.
//! A cluster value tells us:
//! * state of cluster, can be damaged, free, or allocated
//! * if allocated, is this the last cluster
//! * if allocated and not the last cluster, where is the next cluster
//!
//! The first two clusters are reserved, so that the first data cluster is cluster 2.
//! Cluster 0 contains the same value as the BPB's media field in the low 8 bits, higher bits are 1.
//! Cluster 1 contains end of cluster chain (EOC) upon formatting.

/// end of cluster chain (EOC), if FAT entry is >= the value it is EOC.
const EOC12_MIN: u32 = 0xff8;
const EOC12_SET: u32 = 0xfff;
const BAD_CLUSTER12: u32 = 0xff7;
const FREE_CLUSTER: u32 = 0;
pub const FIRST_DATA_CLUSTER: u32 = 2;

/// Bytes needed to hold `clusters` entries
pub fn fat_bytes(clusters: usize) -> usize {
    (clusters * 3 + 1) / 2
}

/// get the value of cluster `n`, `buf` contains the entire FAT
pub fn get_cluster(n: usize,buf: &[u8]) -> u32 {
    let offset = n + (n/2);
    let val16 = u16::from_le_bytes([buf[offset],buf[offset+1]]);
    if n & 1 == 1 {
        (val16 >> 4) as u32
    } else {
        (val16 & 0x0fff) as u32
    }
}

/// set the value of cluster `n`, `buf` contains the entire FAT
pub fn set_cluster(n: usize,val: u32,buf: &mut [u8]) {
    let offset = n + (n/2);
    let old = u16::from_le_bytes([buf[offset],buf[offset+1]]);
    let val16 = if n & 1 == 1 {
        ((val as u16) << 4) | (old & 0x000f)
    } else {
        ((val as u16) & 0x0fff) | (old & 0xf000)
    };
    let bytes = u16::to_le_bytes(val16);
    buf[offset] = bytes[0];
    buf[offset+1] = bytes[1];
}

pub fn is_free(n: usize,buf: &[u8]) -> bool {
    get_cluster(n,buf) == FREE_CLUSTER
}

pub fn is_last(n: usize,buf: &[u8]) -> bool {
    get_cluster(n,buf) >= EOC12_MIN
}

pub fn is_damaged(n: usize,buf: &[u8]) -> bool {
    get_cluster(n,buf) == BAD_CLUSTER12
}

pub fn mark_last(n: usize,buf: &mut [u8]) {
    set_cluster(n,EOC12_SET,buf);
}

pub fn mark_damaged(n: usize,buf: &mut [u8]) {
    set_cluster(n,BAD_CLUSTER12,buf);
}

pub fn deallocate(n: usize,buf: &mut [u8]) {
    set_cluster(n,FREE_CLUSTER,buf);
}

/// Set up the two reserved entries
pub fn init(media: u8,buf: &mut [u8]) {
    set_cluster(0,0xf00 | media as u32,buf);
    mark_last(1,buf);
}

/// Count free clusters in the range of data clusters
pub fn count_free(cluster_count: usize,buf: &[u8]) -> usize {
    (FIRST_DATA_CLUSTER as usize..cluster_count+2).filter(|n| is_free(*n,buf)).count()
}

/// Follow a chain, returning None if it leaves the pool, loops, or hits a free or damaged cluster.
pub fn chain(first: usize,cluster_count: usize,buf: &[u8]) -> Option<Vec<usize>> {
    let end = cluster_count + 2;
    let mut ans = Vec::new();
    let mut curr = first;
    loop {
        if curr < FIRST_DATA_CLUSTER as usize || curr >= end || ans.len() >= cluster_count {
            return None;
        }
        ans.push(curr);
        if is_last(curr,buf) {
            return Some(ans);
        }
        let next = get_cluster(curr,buf) as usize;
        if next == FREE_CLUSTER as usize || next == BAD_CLUSTER12 as usize {
            return None;
        }
        curr = next;
    }
}
