// References:
// [1] https://www.nongnu.org/ext2-doc/ext2.html

//! Read-only access to single-group ext2 images held in memory.
//!
//! Every record handed out here borrows the image buffer; nothing is copied
//! or cached, so an [`Image`] can be shared freely between threads.

mod dir;
mod file;
mod image;
pub mod layout;
mod path;

#[cfg(test)]
pub(crate) mod testimg;

pub use dir::{entries, lookup_in_directory, DirEntries};
pub use file::{read_file, FileBlocks};
pub use image::{Image, InodeNo, GROUP_COUNT, ROOT_INO};
pub use layout::{DirEnt, FileKind, GrpDesc, Inode, Sblk};
pub use path::{resolve, split_path};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("read of {len} bytes at offset {offset} runs past the image end ({size} bytes)")]
    OutOfBounds { offset: u64, len: usize, size: usize },
    #[error("corrupt superblock: {0}")]
    CorruptSuperblock(&'static str),
    #[error("corrupt directory entry in block {block} at offset {offset}: {reason}")]
    CorruptDirEnt {
        block: u32,
        offset: usize,
        reason: &'static str,
    },
    #[error("not an ext2 filesystem (magic 0x{0:04X})")]
    BadMagic(u16),
    #[error("unsupported feature: {0}")]
    Unsupported(&'static str),
    #[error("path `{0}` is not absolute")]
    NotAbsolute(String),
    #[error("file of {0} bytes needs indirect blocks")]
    FileTooLarge(u32),
    #[error("inode is a {} and holds no file data", .0.as_str())]
    NotRegular(FileKind),
    #[error("inode {ino} is past the last inode ({count})")]
    InodeOutOfRange { ino: u32, count: u32 },
    #[error("scroll read failed")]
    Scroll(#[from] scroll::Error),
}
