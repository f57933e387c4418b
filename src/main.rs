use std::fs::File;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{ArgAction, Parser, Subcommand};
use chrono::{DateTime, Utc};
use memmap2::Mmap;
use tracing_subscriber::EnvFilter;

use ext2cat::ext2::{self, Image, Inode, InodeNo};

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Args {
    /// ext2 image file
    image: PathBuf,
    /// Raise log verbosity (-v debug, -vv trace); RUST_LOG overrides
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,
    /// Skip the superblock magic and feature checks
    #[arg(long, global = true)]
    no_check: bool,
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Write a file's contents to stdout
    Cat { path: String },
    /// Print the inode number a path resolves to (0 if it does not)
    Ino { path: String },
    /// List a directory
    Ls {
        #[arg(default_value = "/")]
        path: String,
    },
    /// Show an inode's metadata
    Stat { path: String },
    /// Show superblock geometry
    Info,
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("{0}")]
    Io(#[from] io::Error),
    #[error("{0}")]
    Fs(#[from] ext2::Error),
    #[error("{0}: no such file or directory")]
    NotFound(String),
    #[error("{0}: not a directory")]
    NotADirectory(String),
    #[error("{0}: not a regular file")]
    NotAFile(String),
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing(args.verbose);
    match run(&args) {
        Ok(code) => code,
        Err(CliError::Io(e)) if e.kind() == io::ErrorKind::BrokenPipe => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("ext2cat: {e}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn run(args: &Args) -> Result<ExitCode, CliError> {
    let file = File::open(&args.image)?;
    // SAFETY: mapped read-only; the image must not be modified while we run.
    let map = unsafe { Mmap::map(&file)? };
    let img = if args.no_check {
        Image::open(&map)?
    } else {
        Image::open_checked(&map)?
    };

    let mut out = io::stdout().lock();
    match &args.cmd {
        Cmd::Cat { path } => {
            let (_, inode) = find(&img, path)?;
            if !inode.is_reg() {
                return Err(CliError::NotAFile(path.clone()));
            }
            for chunk in ext2::read_file(&img, &inode)? {
                out.write_all(chunk?)?;
            }
        }
        Cmd::Ino { path } => match ext2::resolve(&img, path)? {
            Some(ino) => writeln!(out, "{ino}")?,
            None => {
                writeln!(out, "0")?;
                return Ok(ExitCode::FAILURE);
            }
        },
        Cmd::Ls { path } => {
            let (_, inode) = find(&img, path)?;
            if !inode.is_dir() {
                return Err(CliError::NotADirectory(path.clone()));
            }
            for ent in ext2::entries(&img, &inode) {
                let ent = ent?;
                writeln!(
                    out,
                    "{:>8} {:<8} {}",
                    ent.inode,
                    ent.kind().as_str(),
                    ent.name_lossy()
                )?;
            }
        }
        Cmd::Stat { path } => {
            let (ino, inode) = find(&img, path)?;
            writeln!(out, "  inode: {ino}")?;
            writeln!(out, "   type: {}", inode.kind().as_str())?;
            writeln!(out, "   mode: {:o}", inode.mode & 0o7777)?;
            writeln!(out, "   size: {}", inode.size)?;
            writeln!(out, "  links: {}", inode.links_cnt)?;
            writeln!(out, "uid/gid: {}/{}", inode.uid, inode.gid)?;
            writeln!(out, " blocks: {:?}", inode.direct_blocks())?;
            writeln!(out, "  atime: {}", show_time(inode.atime()))?;
            writeln!(out, "  mtime: {}", show_time(inode.mtime()))?;
            writeln!(out, "  ctime: {}", show_time(inode.ctime()))?;
        }
        Cmd::Info => {
            let sblk = img.superblock();
            writeln!(out, "     volume: {}", sblk.volume_name())?;
            writeln!(out, " block size: {}", img.block_size())?;
            writeln!(out, "     blocks: {} ({} free)", sblk.blocks_cnt, sblk.free_blocks_cnt)?;
            writeln!(out, "     inodes: {} ({} free)", sblk.inodes_cnt, sblk.free_inodes_cnt)?;
            writeln!(out, " inode size: {}", sblk.inode_sz())?;
            writeln!(out, "  first ino: {}", sblk.first_ino())?;
            writeln!(out, "inode table: {}", img.block_group(0)?.inode_table)?;
        }
    }
    out.flush()?;
    Ok(ExitCode::SUCCESS)
}

fn find<'a>(img: &Image<'a>, path: &str) -> Result<(InodeNo, Inode<'a>), CliError> {
    let ino = ext2::resolve(img, path)?.ok_or_else(|| CliError::NotFound(path.to_owned()))?;
    Ok((ino, img.inode(ino)?))
}

fn show_time(t: Option<DateTime<Utc>>) -> String {
    t.map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| "-".to_owned())
}
