// test of file systems working through the logical sector layer
use std::collections::BTreeMap;
use std::str::FromStr;
use fluxkit::fs::{self,Error,Path,FileType,Filesystem,FilesystemStatus,FsKind};
use fluxkit::img::{Image,SectorStatus,SectorStore};
use proptest::prelude::*;

fn path(s: &str) -> Path {
    Path::from_str(s).expect("bad path")
}

fn fresh(kind: FsKind) -> Box<dyn Filesystem> {
    let mut disk = fs::create_filesystem(kind,Box::new(Image::blank(&kind.layout())));
    disk.create().expect("create failed");
    disk
}

/// Fresh file system, with a sector marked bad before the file system sees the image
fn fresh_with_bad(kind: FsKind,files: &[(&str,Vec<u8>)],bad: (usize,usize,usize)) -> Box<dyn Filesystem> {
    let mut disk = fresh(kind);
    for (name,dat) in files {
        disk.put_file(&path(name),dat).expect("put failed");
    }
    let raw = disk.get_store().to_raw();
    let mut img = Image::from_raw(&raw,&kind.layout()).expect("dump rejected");
    img.get_mut(bad.0,bad.1,bad.2).expect("no sector").status = SectorStatus::BadChecksum;
    fs::create_filesystem(kind,Box::new(img))
}

/// Rewrite one logical sector in place
fn patch(disk: &mut Box<dyn Filesystem>,sec: usize,f: impl FnOnce(&mut Vec<u8>)) {
    let mut buf = disk.get_store().get_logical_sector(sec,1).expect("read failed");
    f(&mut buf);
    disk.get_store().put_logical_sector(sec,&buf).expect("write failed");
}

fn pattern(len: usize,seed: u8) -> Vec<u8> {
    (0..len).map(|i| (i as u8).wrapping_mul(31).wrapping_add(seed)).collect()
}

// Brother

#[test]
fn brother_create_is_empty() {
    let mut disk = fresh(FsKind::Brother120);
    assert_eq!(disk.kind(),FsKind::Brother120);
    assert!(disk.list(&Path::root()).expect("list failed").is_empty());
    assert_eq!(disk.check(),Ok(FilesystemStatus::Ok));
    let meta = disk.get_metadata(&Path::root()).expect("metadata failed");
    assert_eq!(meta.get("free_sectors"),Some(&"454".to_string()));
}

#[test]
fn brother_put_get() {
    let mut disk = fresh(FsKind::Brother120);
    let letter = pattern(1000,1);
    disk.put_file(&path("LETTER"),&letter).expect("put failed");
    disk.put_file(&path("EMPTY"),&[]).expect("put failed");
    disk.put_file(&path("ONE"),&[0x41]).expect("put failed");
    assert_eq!(disk.get_file(&path("LETTER")).expect("get failed"),letter);
    assert_eq!(disk.get_file(&path("EMPTY")).expect("get failed"),Vec::<u8>::new());
    assert_eq!(disk.get_file(&path("/ONE")).expect("get failed"),vec![0x41]);
    let names: Vec<String> = disk.list(&Path::root()).expect("list failed").iter().map(|d| d.filename.clone()).collect();
    assert_eq!(names,vec!["LETTER","EMPTY","ONE"]);
    let meta = disk.get_metadata(&path("LETTER")).expect("metadata failed");
    assert_eq!(meta.get(fs::META_LENGTH),Some(&"1000".to_string()));
    assert_eq!(meta.get("sectors"),Some(&"4".to_string()));
    assert_eq!(meta.get("start_sector"),Some(&"14".to_string()));
    assert_eq!(disk.check(),Ok(FilesystemStatus::Ok));
}

#[test]
fn brother_listing_is_stable() {
    let mut disk = fresh(FsKind::Brother120);
    for name in ["C","A","B"] {
        disk.put_file(&path(name),name.as_bytes()).expect("put failed");
    }
    let first = disk.list(&Path::root()).expect("list failed");
    let second = disk.list(&Path::root()).expect("list failed");
    assert_eq!(first,second);
    assert!(first.iter().all(|d| d.file_type == FileType::File));
}

#[test]
fn brother_replace() {
    let mut disk = fresh(FsKind::Brother120);
    disk.put_file(&path("DOC"),&pattern(3000,2)).expect("put failed");
    disk.put_file(&path("DOC"),&pattern(10,3)).expect("put failed");
    assert_eq!(disk.get_file(&path("DOC")).expect("get failed"),pattern(10,3));
    assert_eq!(disk.list(&Path::root()).expect("list failed").len(),1);
    let meta = disk.get_metadata(&Path::root()).expect("metadata failed");
    assert_eq!(meta.get("free_sectors"),Some(&"453".to_string()));
}

#[test]
fn brother_disk_full_leaves_disk_alone() {
    let mut disk = fresh(FsKind::Brother120);
    let big = pattern(255 * 256,4);
    disk.put_file(&path("BIG"),&big).expect("put failed");
    let before = disk.get_store().to_raw();
    assert!(matches!(disk.put_file(&path("BIGGER"),&big),Err(Error::DiskFull(_))));
    assert!(matches!(disk.put_file(&path("HUGE"),&pattern(256 * 256,5)),Err(Error::DiskFull(_))));
    assert_eq!(disk.get_store().to_raw(),before);
    assert_eq!(disk.get_file(&path("BIG")).expect("get failed"),big);
}

#[test]
fn brother_directory_full() {
    let mut disk = fresh(FsKind::Brother120);
    for i in 0..128 {
        disk.put_file(&path(&format!("F{}",i)),&[]).expect("put failed");
    }
    assert!(matches!(disk.put_file(&path("ONEMORE"),&[]),Err(Error::DiskFull(_))));
    assert_eq!(disk.list(&Path::root()).expect("list failed").len(),128);
}

#[test]
fn brother_bad_paths() {
    let mut disk = fresh(FsKind::Brother120);
    assert!(matches!(disk.put_file(&path("NINECHARS"),&[1]),Err(Error::BadPath(_))));
    assert!(matches!(disk.put_file(&path("A B"),&[1]),Err(Error::BadPath(_))));
    assert!(matches!(disk.put_file(&path("DIR/FILE"),&[1]),Err(Error::BadPath(_))));
    assert!(matches!(disk.put_file(&Path::root(),&[1]),Err(Error::BadPath(_))));
    assert!(matches!(disk.get_file(&path("MISSING")),Err(Error::FileNotFound(_))));
    assert!(matches!(disk.list(&path("SUB")),Err(Error::FileNotFound(_))));
}

#[test]
fn brother_file_type_metadata() {
    let mut disk = fresh(FsKind::Brother120);
    disk.put_file(&path("MEMO"),b"hello").expect("put failed");
    let mut meta = BTreeMap::new();
    meta.insert("type".to_string(),"7".to_string());
    disk.put_metadata(&path("MEMO"),&meta).expect("put metadata failed");
    assert_eq!(disk.get_metadata(&path("MEMO")).expect("metadata failed").get("type"),Some(&"7".to_string()));
    meta.insert("type".to_string(),"seven".to_string());
    disk.put_metadata(&path("MEMO"),&meta).expect("put metadata failed");
    assert_eq!(disk.get_metadata(&path("MEMO")).expect("metadata failed").get("type"),Some(&"7".to_string()));
    // replacing the file keeps its type
    disk.put_file(&path("MEMO"),b"bye").expect("put failed");
    assert_eq!(disk.get_metadata(&path("MEMO")).expect("metadata failed").get("type"),Some(&"7".to_string()));
}

#[test]
fn brother_bad_sectors() {
    // the first file lands in logical sector 14, which is track 1 sector 2
    let files = [("LETTER",pattern(100,6))];
    let mut disk = fresh_with_bad(FsKind::Brother120,&files,(1,0,2));
    assert_eq!(disk.check(),Ok(FilesystemStatus::OkButUsedBadSectors));
    assert_eq!(disk.get_file(&path("LETTER")).expect("get failed"),pattern(100,6));
    let mut disk = fresh_with_bad(FsKind::Brother120,&files,(30,0,5));
    assert_eq!(disk.check(),Ok(FilesystemStatus::OkButUnusedBadSectors));
    let mut disk = fresh_with_bad(FsKind::Brother120,&files,(0,0,0));
    assert_eq!(disk.check(),Ok(FilesystemStatus::MissingCriticalSectors));
}

/// One file in logical sectors 14, 15, 16 with links in the table at sector 8
fn brother_one_file() -> Box<dyn Filesystem> {
    let mut disk = fresh(FsKind::Brother120);
    disk.put_file(&path("CHAIN"),&pattern(600,8)).expect("put failed");
    assert_eq!(disk.check(),Ok(FilesystemStatus::Ok));
    disk
}

fn set_link(disk: &mut Box<dyn Filesystem>,sec: usize,val: u16) {
    patch(disk,8,|buf| buf[sec*2..sec*2+2].copy_from_slice(&val.to_be_bytes()));
}

#[test]
fn brother_check_finds_bad_chains() {
    // loops back to the first sector
    let mut disk = brother_one_file();
    set_link(&mut disk,15,14);
    assert_eq!(disk.check(),Ok(FilesystemStatus::Bad));
    assert!(matches!(disk.get_file(&path("CHAIN")),Err(Error::BadFilesystem(_))));
    // past the end of the disk
    let mut disk = brother_one_file();
    set_link(&mut disk,14,0x200);
    assert_eq!(disk.check(),Ok(FilesystemStatus::Bad));
    // into the system area
    let mut disk = brother_one_file();
    set_link(&mut disk,14,3);
    assert_eq!(disk.check(),Ok(FilesystemStatus::Bad));
    // file sits on a free sector
    let mut disk = brother_one_file();
    set_link(&mut disk,15,0);
    assert_eq!(disk.check(),Ok(FilesystemStatus::Bad));
    // chain ends early
    let mut disk = brother_one_file();
    set_link(&mut disk,15,0xffff);
    assert_eq!(disk.check(),Ok(FilesystemStatus::Bad));
}

#[test]
fn brother_check_finds_damaged_names() {
    let mut disk = brother_one_file();
    patch(&mut disk,0,|buf| buf[1] = 0x07);
    assert_eq!(disk.check(),Ok(FilesystemStatus::Bad));
    assert!(disk.list(&Path::root()).expect("list failed").is_empty());
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]
    #[test]
    fn brother_round_trip(dat in proptest::collection::vec(any::<u8>(),0..4000)) {
        let mut disk = fresh(FsKind::Brother120);
        disk.put_file(&path("PROP"),&dat).expect("put failed");
        prop_assert_eq!(disk.get_file(&path("PROP")).expect("get failed"),dat);
    }
}

// Acorn DFS

/// Two files, `$.HELLO` at sector 2 and locked `A.DATA` at sector 4
fn dfs_image() -> Vec<u8> {
    let layout = FsKind::AcornDfs.layout();
    let mut dat = vec![0;layout.byte_capacity()];
    dat[0..8].copy_from_slice(b"TESTDISK");
    dat[8..16].copy_from_slice(b"HELLO  $");
    dat[16..24].copy_from_slice(b"DATA   A");
    dat[23] |= 0x80;
    dat[256..260].copy_from_slice(b"    ");
    dat[256+4] = 5;
    dat[256+5] = 16;
    // exec on boot, 800 sectors
    dat[256+6] = 0x33;
    dat[256+7] = 0x20;
    dat[264..272].copy_from_slice(&[0x00,0x19,0x23,0x80,0x2c,0x01,0x00,0x02]);
    dat[272..280].copy_from_slice(&[0x00,0x30,0x00,0x30,0x0a,0x00,0x00,0x04]);
    for i in 0..300 {
        dat[512 + i] = (i % 251) as u8;
    }
    for i in 0..10 {
        dat[1024 + i] = b'0' + i as u8;
    }
    dat
}

#[test]
fn dfs_catalogue() {
    let mut disk = fluxkit::create_fs_from_bytestream(&dfs_image(),None).expect("not recognized");
    assert_eq!(disk.kind(),FsKind::AcornDfs);
    let list = disk.list(&Path::root()).expect("list failed");
    let names: Vec<String> = list.iter().map(|d| d.filename.clone()).collect();
    assert_eq!(names,vec!["$.HELLO","A.DATA"]);
    assert_eq!(list[0].length,300);
    assert_eq!(list[1].mode,"L");
    let expected: Vec<u8> = (0..300).map(|i| (i % 251) as u8).collect();
    assert_eq!(disk.get_file(&path("$.HELLO")).expect("get failed"),expected);
    assert_eq!(disk.get_file(&path("hello")).expect("get failed"),expected);
    assert_eq!(disk.get_file(&path("A.DATA")).expect("get failed"),b"0123456789".to_vec());
    assert!(matches!(disk.get_file(&path("DATA")),Err(Error::FileNotFound(_))));
    assert_eq!(disk.check(),Ok(FilesystemStatus::Ok));
}

#[test]
fn dfs_metadata() {
    let mut disk = fluxkit::create_fs_from_bytestream(&dfs_image(),Some(FsKind::AcornDfs)).expect("not recognized");
    let root = disk.get_metadata(&Path::root()).expect("metadata failed");
    assert_eq!(root.get("title"),Some(&"TESTDISK".to_string()));
    assert_eq!(root.get("cycle"),Some(&"5".to_string()));
    assert_eq!(root.get("boot_option"),Some(&"exec".to_string()));
    assert_eq!(root.get("sectors"),Some(&"800".to_string()));
    let meta = disk.get_metadata(&path("$.HELLO")).expect("metadata failed");
    assert_eq!(meta.get("load_address"),Some(&"001900".to_string()));
    assert_eq!(meta.get("exec_address"),Some(&"008023".to_string()));
    assert_eq!(meta.get("locked"),Some(&"false".to_string()));
    assert_eq!(meta.get("start_sector"),Some(&"2".to_string()));
}

#[test]
fn dfs_is_read_only() {
    let mut disk = fluxkit::create_fs_from_bytestream(&dfs_image(),None).expect("not recognized");
    let before = disk.get_store().to_raw();
    assert!(matches!(disk.put_file(&path("$.NEW"),&[1,2,3]),Err(Error::ReadOnlyFilesystem(_))));
    assert!(matches!(disk.put_metadata(&path("$.HELLO"),&BTreeMap::new()),Err(Error::ReadOnlyFilesystem(_))));
    assert!(matches!(disk.create(),Err(Error::Unimplemented(_))));
    assert_eq!(disk.get_store().to_raw(),before);
}

#[test]
fn dfs_overlap_is_bad() {
    let mut dat = dfs_image();
    // move A.DATA onto the second sector of $.HELLO
    dat[279] = 3;
    let mut disk = fluxkit::create_fs_from_bytestream(&dat,None).expect("not recognized");
    assert_eq!(disk.check(),Ok(FilesystemStatus::Bad));
}

/// Mark one logical sector of a DFS disk as damaged, sectors are numbered track by track
fn dfs_with_bad(sec: usize) -> Box<dyn Filesystem> {
    let mut disk = fluxkit::create_fs_from_bytestream(&dfs_image(),None).expect("not recognized");
    let store = disk.get_store().store_mut();
    let mut damaged = store.get(sec / 10,0,sec % 10).expect("no sector").clone();
    damaged.status = SectorStatus::BadChecksum;
    store.put(sec / 10,0,sec % 10,damaged);
    disk
}

#[test]
fn dfs_bad_sectors() {
    // $.HELLO occupies sectors 2 and 3
    let mut disk = dfs_with_bad(3);
    assert_eq!(disk.check(),Ok(FilesystemStatus::OkButUsedBadSectors));
    let expected: Vec<u8> = (0..300).map(|i| (i % 251) as u8).collect();
    assert_eq!(disk.get_file(&path("$.HELLO")).expect("get failed"),expected);
    let mut disk = dfs_with_bad(100);
    assert_eq!(disk.check(),Ok(FilesystemStatus::OkButUnusedBadSectors));
    let mut disk = dfs_with_bad(1);
    assert_eq!(disk.check(),Ok(FilesystemStatus::MissingCriticalSectors));
}

// FAT

#[test]
fn fat_create() {
    let mut disk = fresh(FsKind::Fat12);
    assert!(disk.list(&Path::root()).expect("list failed").is_empty());
    let meta = disk.get_metadata(&Path::root()).expect("metadata failed");
    assert_eq!(meta.get("free_clusters"),Some(&"713".to_string()));
    assert_eq!(disk.check(),Ok(FilesystemStatus::Ok));
    let raw = disk.get_store().to_raw();
    assert_eq!(&raw[510..512],&[0x55,0xaa]);
    assert_eq!(u16::from_le_bytes([raw[11],raw[12]]),512);
}

#[test]
fn fat_put_get() {
    let mut disk = fresh(FsKind::Fat12);
    let dat = pattern(5000,7);
    disk.put_file(&path("readme.txt"),&dat).expect("put failed");
    disk.put_file(&path("EMPTY"),&[]).expect("put failed");
    assert_eq!(disk.get_file(&path("README.TXT")).expect("get failed"),dat);
    assert_eq!(disk.get_file(&path("empty")).expect("get failed"),Vec::<u8>::new());
    let list = disk.list(&Path::root()).expect("list failed");
    assert_eq!(list[0].filename,"README.TXT");
    assert_eq!(list[0].length,5000);
    assert_eq!(list[0].mode,"A");
    assert_eq!(list[1].filename,"EMPTY");
    let meta = disk.get_metadata(&Path::root()).expect("metadata failed");
    assert_eq!(meta.get("free_clusters"),Some(&"708".to_string()));
    disk.put_file(&path("README.TXT"),b"short").expect("put failed");
    assert_eq!(disk.get_file(&path("README.TXT")).expect("get failed"),b"short".to_vec());
    let meta = disk.get_metadata(&Path::root()).expect("metadata failed");
    assert_eq!(meta.get("free_clusters"),Some(&"712".to_string()));
    assert_eq!(disk.check(),Ok(FilesystemStatus::Ok));
}

#[test]
fn fat_subdirectories() {
    let layout = FsKind::Fat12.layout();
    let mut disk = fs::fat::Disk::from_store(Box::new(Image::blank(&layout)),&layout);
    disk.create().expect("create failed");
    disk.mkdir(&path("DOCS")).expect("mkdir failed");
    disk.mkdir(&path("DOCS/OLD")).expect("mkdir failed");
    assert!(matches!(disk.mkdir(&path("DOCS")),Err(Error::BadPath(_))));
    assert!(matches!(disk.mkdir(&path("NOPE/SUB")),Err(Error::FileNotFound(_))));
    disk.put_file(&path("DOCS/OLD/NOTE.TXT"),b"nested").expect("put failed");
    assert_eq!(disk.get_file(&path("docs/old/note.txt")).expect("get failed"),b"nested".to_vec());
    let root = disk.list(&Path::root()).expect("list failed");
    assert_eq!(root.len(),1);
    assert_eq!(root[0].file_type,FileType::Directory);
    let docs = disk.list(&path("DOCS")).expect("list failed");
    assert_eq!(docs.len(),1);
    assert_eq!(docs[0].filename,"OLD");
    assert!(matches!(disk.get_file(&path("DOCS")),Err(Error::BadPath(_))));
    assert!(matches!(disk.put_file(&path("DOCS"),&[1]),Err(Error::BadPath(_))));
    assert!(matches!(disk.list(&path("DOCS/OLD/NOTE.TXT")),Err(Error::FileNotFound(_))));
    assert_eq!(disk.check(),Ok(FilesystemStatus::Ok));
}

#[test]
fn fat_directory_grows() {
    let layout = FsKind::Fat12.layout();
    let mut disk = fs::fat::Disk::from_store(Box::new(Image::blank(&layout)),&layout);
    disk.create().expect("create failed");
    disk.mkdir(&path("MANY")).expect("mkdir failed");
    // one cluster holds 32 entries, two of them are the dot entries
    for i in 0..40 {
        disk.put_file(&path(&format!("MANY/F{}.DAT",i)),&[i as u8]).expect("put failed");
    }
    let list = disk.list(&path("MANY")).expect("list failed");
    assert_eq!(list.len(),40);
    for i in 0..40 {
        assert_eq!(disk.get_file(&path(&format!("MANY/F{}.DAT",i))).expect("get failed"),vec![i as u8]);
    }
    assert_eq!(disk.check(),Ok(FilesystemStatus::Ok));
}

#[test]
fn fat_root_is_fixed() {
    let mut disk = fresh(FsKind::Fat12);
    for i in 0..112 {
        disk.put_file(&path(&format!("R{}",i)),&[]).expect("put failed");
    }
    assert!(matches!(disk.put_file(&path("EXTRA"),&[]),Err(Error::DiskFull(_))));
}

#[test]
fn fat_disk_full_leaves_disk_alone() {
    let mut disk = fresh(FsKind::Fat12);
    disk.put_file(&path("BIG.BIN"),&pattern(700 * 1024,8)).expect("put failed");
    let before = disk.get_store().to_raw();
    assert!(matches!(disk.put_file(&path("MORE.BIN"),&pattern(20 * 1024,9)),Err(Error::DiskFull(_))));
    assert_eq!(disk.get_store().to_raw(),before);
}

#[test]
fn fat_bad_names() {
    let mut disk = fresh(FsKind::Fat12);
    assert!(matches!(disk.put_file(&path("TOOLONGNAME.TXT"),&[1]),Err(Error::BadPath(_))));
    assert!(matches!(disk.put_file(&path("A.LONG"),&[1]),Err(Error::BadPath(_))));
    assert!(matches!(disk.put_file(&path("A*B"),&[1]),Err(Error::BadPath(_))));
    assert!(matches!(disk.get_file(&path("NOFILE")),Err(Error::FileNotFound(_))));
}

#[test]
fn fat_mode_metadata() {
    let mut disk = fresh(FsKind::Fat12);
    disk.put_file(&path("SYS.COM"),b"code").expect("put failed");
    let mut meta = BTreeMap::new();
    meta.insert(fs::META_MODE.to_string(),"rh".to_string());
    disk.put_metadata(&path("SYS.COM"),&meta).expect("put metadata failed");
    let got = disk.get_metadata(&path("SYS.COM")).expect("metadata failed");
    assert_eq!(got.get(fs::META_MODE),Some(&"RH".to_string()));
    assert!(got.contains_key("modified"));
    assert_eq!(got.get("cluster"),Some(&"2".to_string()));
    meta.insert(fs::META_MODE.to_string(),"RX".to_string());
    disk.put_metadata(&path("SYS.COM"),&meta).expect("put metadata failed");
    let got = disk.get_metadata(&path("SYS.COM")).expect("metadata failed");
    assert_eq!(got.get(fs::META_MODE),Some(&"RH".to_string()));
}

/// `A.BIN` in clusters 2 and 3, `B.BIN` in cluster 4.  The first FAT copy is logical
/// sectors 1 to 3 and the root directory starts at sector 7.
fn fat_two_files() -> Box<dyn Filesystem> {
    let mut disk = fresh(FsKind::Fat12);
    disk.put_file(&path("A.BIN"),&pattern(2000,11)).expect("put failed");
    disk.put_file(&path("B.BIN"),&pattern(1000,12)).expect("put failed");
    assert_eq!(disk.check(),Ok(FilesystemStatus::Ok));
    disk
}

fn set_cluster(disk: &mut Box<dyn Filesystem>,n: usize,val: u32) {
    let mut buf = disk.get_store().get_logical_sector(1,3).expect("read failed");
    fluxkit::bios::fat::set_cluster(n,val,&mut buf);
    disk.get_store().put_logical_sector(1,&buf).expect("write failed");
}

#[test]
fn fat_check_finds_broken_chain() {
    let mut disk = fat_two_files();
    set_cluster(&mut disk,2,0);
    assert_eq!(disk.check(),Ok(FilesystemStatus::Bad));
    let mut disk = fat_two_files();
    set_cluster(&mut disk,2,0x500);
    assert_eq!(disk.check(),Ok(FilesystemStatus::Bad));
}

#[test]
fn fat_check_finds_cross_links() {
    let mut disk = fat_two_files();
    // A.BIN runs on into B.BIN
    set_cluster(&mut disk,3,4);
    assert_eq!(disk.check(),Ok(FilesystemStatus::Bad));
}

#[test]
fn fat_check_finds_short_chain() {
    let mut disk = fat_two_files();
    // B.BIN is the second entry, claim more bytes than one cluster holds
    patch(&mut disk,7,|buf| buf[60..64].copy_from_slice(&5000u32.to_le_bytes()));
    assert_eq!(disk.check(),Ok(FilesystemStatus::Bad));
}

#[test]
fn fat_bad_sectors() {
    // cluster 2 starts at logical sector 14, which is track 0 side 1 sector 6
    let files = [("DATA.BIN",pattern(600,10))];
    let mut disk = fresh_with_bad(FsKind::Fat12,&files,(0,1,6));
    assert_eq!(disk.check(),Ok(FilesystemStatus::OkButUsedBadSectors));
    let mut disk = fresh_with_bad(FsKind::Fat12,&files,(55,1,2));
    assert_eq!(disk.check(),Ok(FilesystemStatus::OkButUnusedBadSectors));
    let mut disk = fresh_with_bad(FsKind::Fat12,&files,(0,0,1));
    assert_eq!(disk.check(),Ok(FilesystemStatus::MissingCriticalSectors));
}

// detection

#[test]
fn detect_each_kind() {
    for kind in [FsKind::Brother120,FsKind::Fat12] {
        let mut disk = fresh(kind);
        disk.put_file(&path("FILE"),b"detect me").expect("put failed");
        let raw = disk.get_store().to_raw();
        let mut found = fluxkit::create_fs_from_bytestream(&raw,None).expect("not recognized");
        assert_eq!(found.kind(),kind);
        assert_eq!(found.get_file(&path("FILE")).expect("get failed"),b"detect me".to_vec());
        let img = Image::from_raw(&raw,&kind.layout()).expect("dump rejected");
        let found = fluxkit::create_fs_from_image(img).expect("not recognized");
        assert_eq!(found.kind(),kind);
    }
    let img = Image::from_raw(&dfs_image(),&FsKind::AcornDfs.layout()).expect("dump rejected");
    assert_eq!(fluxkit::create_fs_from_image(img).expect("not recognized").kind(),FsKind::AcornDfs);
}

#[test]
fn detect_nothing() {
    assert!(fluxkit::create_fs_from_bytestream(&vec![0;119808],None).is_err());
    assert!(fluxkit::create_fs_from_bytestream(&vec![0;2_000_000],None).is_err());
    assert!(fluxkit::create_fs_from_image(Image::blank(&FsKind::Fat12.layout())).is_none());
}

#[test]
fn brother_over_flux() {
    use fluxkit::img::tracks::FormatConfig;
    let mut disk = fresh(FsKind::Brother120);
    disk.put_file(&path("LETTER"),&pattern(2000,11)).expect("put failed");
    let raw = disk.get_store().to_raw();
    let cfg = FormatConfig::brother_120();
    let img = Image::from_raw(&raw,&cfg.layout()).expect("dump rejected");
    let tracks = fluxkit::encode_disk(&img,&cfg).expect("encode failed");
    let back = fluxkit::decode_disk(&tracks,&cfg).expect("decode failed");
    assert_eq!(back.keys().len(),468);
    let mut disk = fluxkit::create_fs_from_image(back).expect("not recognized");
    assert_eq!(disk.kind(),FsKind::Brother120);
    assert_eq!(disk.get_file(&path("LETTER")).expect("get failed"),pattern(2000,11));
}
