//! # Command Line Interface
//!
//! Every subcommand works on a flat sector dump given by `--dimg`.
//! All the logic is in the library, this only moves bytes in and out.

use clap::{arg,crate_version,Command};
use env_logger;
use std::io::{Read,Write};
use std::str::FromStr;
use log::error;
use fluxkit::fs::{FsKind,Path,Filesystem};
use fluxkit::img::{self,Image};
use fluxkit::img::tracks::{brother,BrotherFormat,FormatConfig};
use fluxkit::{DYNERR,STDRESULT};

const RCH: &str = "unreachable was reached";

fn kind_arg(cmd: &clap::ArgMatches) -> Result<Option<FsKind>,DYNERR> {
    match cmd.get_one::<String>("os") {
        Some(s) => Ok(Some(FsKind::from_str(s)?)),
        None => Ok(None)
    }
}

fn path_arg(cmd: &clap::ArgMatches) -> Result<Path,DYNERR> {
    match cmd.get_one::<String>("file") {
        Some(s) => Ok(Path::from_str(s)?),
        None => Ok(Path::root())
    }
}

fn open(cmd: &clap::ArgMatches) -> Result<Box<dyn Filesystem>,DYNERR> {
    let path_to_img = cmd.get_one::<String>("dimg").expect(RCH);
    fluxkit::create_fs_from_file(path_to_img,kind_arg(cmd)?)
}

fn load_format(cmd: &clap::ArgMatches) -> Result<FormatConfig,DYNERR> {
    let format = BrotherFormat::from_str(cmd.get_one::<String>("kind").expect(RCH))?;
    match cmd.get_one::<String>("fmt") {
        Some(fmt_path) => Ok(FormatConfig::from_json(&std::fs::read_to_string(fmt_path)?)?),
        None => Ok(FormatConfig::from_format(format))
    }
}

fn encode(cmd: &clap::ArgMatches) -> STDRESULT {
    let cfg = load_format(cmd)?;
    let layout = cfg.layout();
    let dat = std::fs::read(cmd.get_one::<String>("dimg").expect(RCH))?;
    let image = Image::from_raw(&dat,&layout)?;
    let tracks = match cmd.get_one::<String>("track") {
        Some(t) => {
            let track = i32::from_str(t)?;
            if cfg.logical_track(track,0).is_none() {
                error!("physical track {} is not part of the format",track);
                return Err(Box::new(img::Error::SectorAccess));
            }
            vec![track]
        },
        None => cfg.physical_tracks()
    };
    // keep going past a bad track so every problem is reported
    let mut first_err: Option<img::Error> = None;
    for track in tracks {
        match brother::encode_track(track,0,&image,&cfg) {
            Ok(Some(flux)) => println!("{:2}: {} bits, {} transitions, {:.1} ms",track,flux.len(),
                flux.transition_intervals_ns().len(),flux.duration_ns() / 1e6),
            Ok(None) => continue,
            Err(e) => {
                println!("{:2}: {}",track,e);
                first_err.get_or_insert(e);
            }
        }
    }
    match first_err {
        Some(e) => Err(Box::new(e)),
        None => Ok(())
    }
}

fn main() -> Result<(),Box<dyn std::error::Error>>
{
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let long_help =
"fluxkit is always invoked with exactly one of several subcommands.
Disk images are flat sector dumps.
Set RUST_LOG environment variable to control logging level.
  levels: trace,debug,info,warn,error

Examples:
---------
create Brother image:  `fluxkit mkfs -o brother120 -d letters.img`
copy file in:          `cat letter.txt | fluxkit put -f LETTER -d letters.img`
copy file out:         `fluxkit get -f LETTER -d letters.img > letter.txt`
encode tracks:         `fluxkit encode -d letters.img -t 4`";

    let os_names = ["brother120","acorndfs","fat12"];
    let fmt_kinds = ["brother120","brother240"];

    let mut main_cmd = Command::new("fluxkit")
        .about("Encodes Brother floppy tracks and manipulates the files on them.")
        .after_long_help(long_help)
        .version(crate_version!());
    main_cmd = main_cmd.subcommand(Command::new("mkfs")
        .arg(arg!(-o --os <OS> "file system to create").required(true).value_parser(os_names))
        .arg(arg!(-d --dimg <PATH> "disk image path to create").required(true))
        .about("write a blank disk image to the given path"));
    main_cmd = main_cmd.subcommand(Command::new("catalog")
        .arg(arg!(-o --os <OS> "file system, detected if omitted").required(false).value_parser(os_names))
        .arg(arg!(-f --file <PATH> "path of directory inside disk image").required(false))
        .arg(arg!(-d --dimg <PATH> "path to disk image").required(true))
        .about("write disk image catalog to stdout"));
    main_cmd = main_cmd.subcommand(Command::new("get")
        .arg(arg!(-o --os <OS> "file system, detected if omitted").required(false).value_parser(os_names))
        .arg(arg!(-f --file <PATH> "path inside disk image").required(true))
        .arg(arg!(-d --dimg <PATH> "path to disk image").required(true))
        .about("read from disk image, write to stdout"));
    main_cmd = main_cmd.subcommand(Command::new("put")
        .arg(arg!(-o --os <OS> "file system, detected if omitted").required(false).value_parser(os_names))
        .arg(arg!(-f --file <PATH> "path inside disk image").required(true))
        .arg(arg!(-d --dimg <PATH> "path to disk image").required(true))
        .about("read from stdin, write to disk image"));
    main_cmd = main_cmd.subcommand(Command::new("stat")
        .arg(arg!(-o --os <OS> "file system, detected if omitted").required(false).value_parser(os_names))
        .arg(arg!(-f --file <PATH> "path inside disk image").required(false))
        .arg(arg!(-d --dimg <PATH> "path to disk image").required(true))
        .about("write metadata of a file as JSON to stdout"));
    main_cmd = main_cmd.subcommand(Command::new("check")
        .arg(arg!(-o --os <OS> "file system, detected if omitted").required(false).value_parser(os_names))
        .arg(arg!(-d --dimg <PATH> "path to disk image").required(true))
        .about("check the file system and report its status"));
    main_cmd = main_cmd.subcommand(Command::new("encode")
        .arg(arg!(-d --dimg <PATH> "path to Brother disk image").required(true))
        .arg(arg!(-k --kind <KIND> "track format").required(false).value_parser(fmt_kinds).default_value("brother120"))
        .arg(arg!(--fmt <PATH> "JSON file describing the track format, overrides kind").required(false))
        .arg(arg!(-t --track <TRACK> "physical track, all tracks if omitted").required(false))
        .about("encode tracks and report on the bitstreams"));
    let matches = main_cmd.get_matches();

    // Create a blank file system
    if let Some(cmd) = matches.subcommand_matches("mkfs") {
        let kind = FsKind::from_str(cmd.get_one::<String>("os").expect(RCH))?;
        let path_to_img = cmd.get_one::<String>("dimg").expect(RCH);
        if std::path::Path::new(path_to_img).exists() {
            error!("refusing to overwrite {}",path_to_img);
            return Err(Box::new(std::io::Error::from(std::io::ErrorKind::AlreadyExists)));
        }
        let mut disk = fluxkit::fs::create_filesystem(kind,Box::new(Image::blank(&kind.layout())));
        disk.create()?;
        return fluxkit::save_img(&mut disk,path_to_img);
    }
    // Catalog a directory
    if let Some(cmd) = matches.subcommand_matches("catalog") {
        let mut disk = open(cmd)?;
        for entry in disk.list(&path_arg(cmd)?)? {
            println!("{:4} {:>8} {:4} {}",entry.file_type.to_string(),entry.length,entry.mode,entry.filename);
        }
        return Ok(());
    }
    // Get a file
    if let Some(cmd) = matches.subcommand_matches("get") {
        let mut disk = open(cmd)?;
        let dat = disk.get_file(&path_arg(cmd)?)?;
        std::io::stdout().write_all(&dat)?;
        return Ok(());
    }
    // Put a file
    if let Some(cmd) = matches.subcommand_matches("put") {
        let mut disk = open(cmd)?;
        let mut dat = Vec::new();
        std::io::stdin().read_to_end(&mut dat)?;
        disk.put_file(&path_arg(cmd)?,&dat)?;
        return fluxkit::save_img(&mut disk,cmd.get_one::<String>("dimg").expect(RCH));
    }
    // Metadata
    if let Some(cmd) = matches.subcommand_matches("stat") {
        let mut disk = open(cmd)?;
        let mut obj = json::JsonValue::new_object();
        for (k,v) in disk.get_metadata(&path_arg(cmd)?)? {
            obj[k] = json::JsonValue::String(v);
        }
        println!("{}",json::stringify_pretty(obj,2));
        return Ok(());
    }
    // Check
    if let Some(cmd) = matches.subcommand_matches("check") {
        let mut disk = open(cmd)?;
        println!("{}: {}",disk.kind(),disk.check()?);
        return Ok(());
    }
    // Encode tracks
    if let Some(cmd) = matches.subcommand_matches("encode") {
        return encode(cmd);
    }

    error!("No subcommand was found, try `fluxkit --help`");
    return Err(Box::new(std::io::Error::from(std::io::ErrorKind::InvalidInput)));
}
