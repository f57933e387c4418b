use std::fmt;
use std::num::NonZeroU32;

use scroll::{Pread, LE};
use tracing::debug;

use super::layout::{GrpDesc, Inode, Sblk};
use super::Error;

/// Inode numbers are 1-based; 0 never names an inode.
pub type InodeNo = NonZeroU32;

pub const ROOT_INO: InodeNo = match NonZeroU32::new(2) {
    Some(ino) => ino,
    None => unreachable!(),
};

/// Number of block groups this reader understands.
pub const GROUP_COUNT: u32 = 1;

fn view(buf: &[u8], offset: u64, len: usize) -> Result<&[u8], Error> {
    usize::try_from(offset)
        .ok()
        .and_then(|start| Some(start..start.checked_add(len)?))
        .and_then(|range| buf.get(range))
        .ok_or(Error::OutOfBounds {
            offset,
            len,
            size: buf.len(),
        })
}

/// An ext2 image resident in memory.
///
/// The superblock is decoded once when the image is opened and the block
/// size derived from it stays fixed for the lifetime of the value.
#[derive(Clone, Copy)]
pub struct Image<'a> {
    buf: &'a [u8],
    sblk: Sblk,
    blk_sz: u32,
}

impl fmt::Debug for Image<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Image")
            .field("len", &self.buf.len())
            .field("blk_sz", &self.blk_sz)
            .field("sblk", &self.sblk)
            .finish()
    }
}

impl<'a> Image<'a> {
    /// Locates the superblock without checking its magic.
    pub fn open(buf: &'a [u8]) -> Result<Self, Error> {
        let sblk: Sblk = view(buf, Sblk::OFFSET as u64, Sblk::SZ)?.pread_with(0, LE)?;
        let blk_sz = sblk.blk_sz()?;
        debug!(
            blk_sz,
            blocks = sblk.blocks_cnt,
            inodes = sblk.inodes_cnt,
            "opened ext2 image"
        );
        Ok(Image { buf, sblk, blk_sz })
    }

    /// Like [`Image::open`], then rejects images that are not plain ext2.
    pub fn open_checked(buf: &'a [u8]) -> Result<Self, Error> {
        let img = Self::open(buf)?;
        img.sblk.validate()?;
        Ok(img)
    }

    pub fn superblock(&self) -> &Sblk {
        &self.sblk
    }

    #[inline]
    pub fn block_size(&self) -> u32 {
        self.blk_sz
    }

    /// The whole of block `blk_no`; block 0 starts at the beginning of the image.
    pub fn block_at(&self, blk_no: u32) -> Result<&'a [u8], Error> {
        let offset = blk_no as u64 * self.blk_sz as u64;
        view(self.buf, offset, self.blk_sz as usize)
    }

    /// The descriptor of block group `group_num`.
    ///
    /// Group numbers fold onto the `GROUP_COUNT` groups known here, so with a
    /// single group every number yields the first descriptor.
    pub fn block_group(&self, group_num: u32) -> Result<GrpDesc, Error> {
        let group = group_num % GROUP_COUNT;
        let offset = GrpDesc::OFFSET as u64 + group as u64 * GrpDesc::SZ as u64;
        let desc: GrpDesc = view(self.buf, offset, GrpDesc::SZ)?.pread_with(0, LE)?;
        Ok(desc)
    }

    /// The inode record numbered `ino`, which must not exceed the superblock's
    /// inode count.
    pub fn inode(&self, ino: InodeNo) -> Result<Inode<'a>, Error> {
        let count = self.sblk.inodes_cnt;
        if ino.get() > count {
            return Err(Error::InodeOutOfRange {
                ino: ino.get(),
                count,
            });
        }
        // blocks-per-group stands in for inodes-per-group while only one
        // group exists; switch to `inodes_per_group` before adding groups.
        let per_group = self.sblk.blocks_per_group;
        if per_group == 0 {
            return Err(Error::CorruptSuperblock("zero blocks per group"));
        }
        let inode_sz = self.sblk.inode_sz() as usize;
        if inode_sz < Inode::MIN_SZ {
            return Err(Error::CorruptSuperblock("inode size below 128 bytes"));
        }

        let group = (ino.get() - 1) / per_group;
        let index = (ino.get() - 1) % per_group;
        let table = self.block_group(group)?.inode_table;

        let offset = table as u64 * self.blk_sz as u64 + index as u64 * inode_sz as u64;
        let inode: Inode<'a> = view(self.buf, offset, inode_sz)?.pread_with(0, LE)?;
        Ok(inode)
    }

    pub fn root_inode(&self) -> Result<Inode<'a>, Error> {
        self.inode(ROOT_INO)
    }
}
