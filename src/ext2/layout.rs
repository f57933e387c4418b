// References:
// [1] https://www.nongnu.org/ext2-doc/ext2.html

use chrono::{DateTime, TimeZone, Utc};
use scroll::{ctx::TryFromCtx, Endian, Pread, LE};

use super::Error;

#[derive(Debug, Clone, Copy)]
pub struct Sblk {
    pub inodes_cnt: u32,
    pub blocks_cnt: u32,
    pub free_blocks_cnt: u32,
    pub free_inodes_cnt: u32,
    pub first_data_block: u32,
    pub log2_block_size: u32, // in KBytes
    pub blocks_per_group: u32,
    pub inodes_per_group: u32,
    pub magic: u16,
    pub state: u16, // check only
    pub rev_level: u32,
    // 84..=204 EXT2_DYNAMIC_REV
    first_ino: u32,
    inode_size: u16,
    pub feature_incompat: u32, // check only
    pub volume_name: [u8; 16],
}

impl Sblk {
    pub const OFFSET: usize = 1024;
    pub const SZ: usize = 1024;

    const EXT2_SUPER_MAGIC: u16 = 0xEF53;
    const EXT2_GOOD_OLD_INODE_SIZE: u16 = 128;
    const EXT2_GOOD_OLD_FIRST_INO: u32 = 11;
    const EXT2_FEATURE_INCOMPAT_COMPRESSION: u32 = 0x01;
    const EXT3_FEATURE_INCOMPAT_RECOVER: u32 = 0x04;
    const EXT3_FEATURE_INCOMPAT_JOURNAL_DEV: u32 = 0x08;
    const EXT2_FEATURE_INCOMPAT_META_BG: u32 = 0x10;
    const EXT2_ERROR_FS: u16 = 2;

    // 64 KiB, the largest block size ext2 defines
    const MAX_LOG2_BLOCK_SIZE: u32 = 6;

    /// Rejects images this reader cannot interpret: a wrong magic, or an
    /// incompatible feature that changes the on-disk layout.
    pub fn validate(&self) -> Result<(), Error> {
        if self.magic != Self::EXT2_SUPER_MAGIC {
            return Err(Error::BadMagic(self.magic));
        }
        if self.feature_incompat & Self::EXT2_FEATURE_INCOMPAT_COMPRESSION != 0 {
            return Err(Error::Unsupported("compression"));
        }
        if self.feature_incompat & Self::EXT3_FEATURE_INCOMPAT_RECOVER != 0 {
            return Err(Error::Unsupported("journal needs recovery"));
        }
        if self.feature_incompat & Self::EXT3_FEATURE_INCOMPAT_JOURNAL_DEV != 0 {
            return Err(Error::Unsupported("external journal device"));
        }
        if self.feature_incompat & Self::EXT2_FEATURE_INCOMPAT_META_BG != 0 {
            return Err(Error::Unsupported("meta block groups"));
        }
        if self.state == Self::EXT2_ERROR_FS {
            tracing::warn!("superblock state marks the filesystem as having errors");
        }
        Ok(())
    }

    pub fn blk_sz(&self) -> Result<u32, Error> {
        if self.log2_block_size > Self::MAX_LOG2_BLOCK_SIZE {
            return Err(Error::CorruptSuperblock("block size exponent out of range"));
        }
        Ok(1024 << self.log2_block_size)
    }

    pub fn is_rev0(&self) -> bool {
        self.rev_level == 0
    }

    pub fn inode_sz(&self) -> u16 {
        if self.is_rev0() {
            Self::EXT2_GOOD_OLD_INODE_SIZE
        } else {
            self.inode_size
        }
    }

    pub fn first_ino(&self) -> u32 {
        if self.is_rev0() {
            Self::EXT2_GOOD_OLD_FIRST_INO
        } else {
            self.first_ino
        }
    }

    // `imprecise`, stops at the first NUL
    pub fn volume_name(&self) -> String {
        let end = self
            .volume_name
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(self.volume_name.len());
        String::from_utf8_lossy(&self.volume_name[..end]).into_owned()
    }
}

impl<'a> TryFromCtx<'a, Endian> for Sblk {
    type Error = scroll::Error;
    fn try_from_ctx(buf: &'a [u8], _ctx: Endian) -> Result<(Self, usize), Self::Error> {
        Ok((
            Sblk {
                inodes_cnt: buf.pread_with(0, LE)?,
                blocks_cnt: buf.pread_with(4, LE)?,
                free_blocks_cnt: buf.pread_with(12, LE)?,
                free_inodes_cnt: buf.pread_with(16, LE)?,
                first_data_block: buf.pread_with(20, LE)?,
                log2_block_size: buf.pread_with(24, LE)?,
                blocks_per_group: buf.pread_with(32, LE)?,
                inodes_per_group: buf.pread_with(40, LE)?,
                magic: buf.pread_with(56, LE)?,
                state: buf.pread_with(58, LE)?,
                rev_level: buf.pread_with(76, LE)?,
                first_ino: buf.pread_with(84, LE)?,
                inode_size: buf.pread_with(88, LE)?,
                feature_incompat: buf.pread_with(96, LE)?,
                volume_name: buf.pread_with(120, LE)?,
            },
            Self::SZ,
        ))
    }
}

#[derive(Debug, Clone, Copy)]
pub struct GrpDesc {
    pub block_bitmap: u32,
    pub inode_bitmap: u32,
    pub inode_table: u32,
    pub free_blocks_cnt: u16,
    pub free_inodes_cnt: u16,
    pub used_dirs_cnt: u16,
}

impl GrpDesc {
    /// The descriptor table follows the superblock region directly.
    pub const OFFSET: usize = Sblk::OFFSET + Sblk::SZ;
    pub const SZ: usize = 32;
}

impl<'a> TryFromCtx<'a, Endian> for GrpDesc {
    type Error = scroll::Error;
    fn try_from_ctx(buf: &'a [u8], _ctx: Endian) -> Result<(Self, usize), Self::Error> {
        Ok((
            GrpDesc {
                block_bitmap: buf.pread_with(0, LE)?,
                inode_bitmap: buf.pread_with(4, LE)?,
                inode_table: buf.pread_with(8, LE)?,
                free_blocks_cnt: buf.pread_with(12, LE)?,
                free_inodes_cnt: buf.pread_with(14, LE)?,
                used_dirs_cnt: buf.pread_with(16, LE)?,
            },
            Self::SZ,
        ))
    }
}

pub const NDIR_BLOCKS: usize = 12;
pub const N_BLOCKS: usize = 15;

const S_IFMT: u16 = 0xF000;
const S_IFSOCK: u16 = 0xC000;
const S_IFLNK: u16 = 0xA000;
const S_IFREG: u16 = 0x8000;
const S_IFBLK: u16 = 0x6000;
const S_IFDIR: u16 = 0x4000;
const S_IFCHR: u16 = 0x2000;
const S_IFIFO: u16 = 0x1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Regular,
    Directory,
    Symlink,
    CharDev,
    BlockDev,
    Fifo,
    Socket,
    Unknown,
}

impl FileKind {
    pub fn from_mode(mode: u16) -> Self {
        match mode & S_IFMT {
            S_IFREG => Self::Regular,
            S_IFDIR => Self::Directory,
            S_IFLNK => Self::Symlink,
            S_IFCHR => Self::CharDev,
            S_IFBLK => Self::BlockDev,
            S_IFIFO => Self::Fifo,
            S_IFSOCK => Self::Socket,
            _ => Self::Unknown,
        }
    }

    /// Decodes the `file_type` tag of a directory entry.
    pub fn from_dirent_tag(tag: u8) -> Self {
        match tag {
            1 => Self::Regular,
            2 => Self::Directory,
            3 => Self::CharDev,
            4 => Self::BlockDev,
            5 => Self::Fifo,
            6 => Self::Socket,
            7 => Self::Symlink,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Regular => "file",
            Self::Directory => "dir",
            Self::Symlink => "symlink",
            Self::CharDev => "chardev",
            Self::BlockDev => "blockdev",
            Self::Fifo => "fifo",
            Self::Socket => "socket",
            Self::Unknown => "unknown",
        }
    }
}

/// An inode record, borrowed from the inode table.
#[derive(Debug, Clone, Copy)]
pub struct Inode<'a> {
    raw: &'a [u8],
    pub mode: u16,
    pub uid: u16,
    pub size: u32,
    atime: u32,
    ctime: u32,
    mtime: u32,
    pub dtime: u32,
    pub gid: u16,
    pub links_cnt: u16,
    pub sectors: u32, // 512-byte units
    pub flags: u32,
    pub block: [u32; N_BLOCKS],
}

impl<'a> Inode<'a> {
    /// Smallest record that still covers every field read here.
    pub const MIN_SZ: usize = 128;

    pub fn raw(&self) -> &'a [u8] {
        self.raw
    }

    pub fn kind(&self) -> FileKind {
        FileKind::from_mode(self.mode)
    }

    pub fn is_dir(&self) -> bool {
        self.kind() == FileKind::Directory
    }

    pub fn is_reg(&self) -> bool {
        self.kind() == FileKind::Regular
    }

    pub fn direct_blocks(&self) -> &[u32] {
        &self.block[..NDIR_BLOCKS]
    }

    fn make_time(secs: u32) -> Option<DateTime<Utc>> {
        Utc.timestamp_opt(secs.into(), 0).single()
    }

    pub fn atime(&self) -> Option<DateTime<Utc>> {
        Self::make_time(self.atime)
    }

    pub fn ctime(&self) -> Option<DateTime<Utc>> {
        Self::make_time(self.ctime)
    }

    pub fn mtime(&self) -> Option<DateTime<Utc>> {
        Self::make_time(self.mtime)
    }
}

impl<'a> TryFromCtx<'a, Endian> for Inode<'a> {
    type Error = scroll::Error;
    fn try_from_ctx(buf: &'a [u8], _ctx: Endian) -> Result<(Self, usize), Self::Error> {
        Ok((
            Inode {
                raw: buf,
                mode: buf.pread_with(0, LE)?,
                uid: buf.pread_with(2, LE)?,
                size: buf.pread_with(4, LE)?,
                atime: buf.pread_with(8, LE)?,
                ctime: buf.pread_with(12, LE)?,
                mtime: buf.pread_with(16, LE)?,
                dtime: buf.pread_with(20, LE)?,
                gid: buf.pread_with(24, LE)?,
                links_cnt: buf.pread_with(26, LE)?,
                sectors: buf.pread_with(28, LE)?,
                flags: buf.pread_with(32, LE)?,
                block: buf.pread_with(40, LE)?,
            },
            buf.len(),
        ))
    }
}

/// A directory entry (`ext2_dir_entry_2`) whose name borrows the block.
#[derive(Debug, Clone, Copy)]
pub struct DirEnt<'a> {
    pub inode: u32,
    pub rec_len: u16,
    pub file_type: u8,
    pub name: &'a [u8],
}

impl<'a> DirEnt<'a> {
    pub const HEADER_SZ: usize = 8;

    pub fn is_used(&self) -> bool {
        self.inode != 0
    }

    pub fn kind(&self) -> FileKind {
        FileKind::from_dirent_tag(self.file_type)
    }

    pub fn name_lossy(&self) -> String {
        String::from_utf8_lossy(self.name).into_owned()
    }
}

impl<'a> TryFromCtx<'a, Endian> for DirEnt<'a> {
    type Error = scroll::Error;
    fn try_from_ctx(buf: &'a [u8], _ctx: Endian) -> Result<(Self, usize), Self::Error> {
        let rec_len: u16 = buf.pread_with(4, LE)?;
        let name_len: u8 = buf.pread_with(6, LE)?;
        Ok((
            DirEnt {
                inode: buf.pread_with(0, LE)?,
                rec_len,
                file_type: buf.pread_with(7, LE)?,
                name: buf.pread_with(Self::HEADER_SZ, name_len as usize)?,
            },
            rec_len as usize,
        ))
    }
}
