use super::image::Image;
use super::layout::{Inode, NDIR_BLOCKS};
use super::Error;

// Backs holes; large enough for the biggest block size ext2 allows.
static HOLE: [u8; 64 * 1024] = [0; 64 * 1024];

/// The contents of a file, one block-sized slice at a time.
///
/// The last slice is cut short so the total length equals the inode size.
pub struct FileBlocks<'a> {
    img: Image<'a>,
    blocks: [u32; NDIR_BLOCKS],
    next_blk: usize,
    remaining: u32,
}

/// Streams a regular file stored in direct blocks only.
///
/// Other inode kinds keep something other than block numbers in `i_block`
/// (fast symlinks store their target there) and are refused.
pub fn read_file<'a>(img: &Image<'a>, inode: &Inode<'a>) -> Result<FileBlocks<'a>, Error> {
    if !inode.is_reg() {
        return Err(Error::NotRegular(inode.kind()));
    }
    let limit = img.block_size() as u64 * NDIR_BLOCKS as u64;
    if inode.size as u64 > limit {
        return Err(Error::FileTooLarge(inode.size));
    }
    let mut blocks = [0u32; NDIR_BLOCKS];
    blocks.copy_from_slice(inode.direct_blocks());
    Ok(FileBlocks {
        img: *img,
        blocks,
        next_blk: 0,
        remaining: inode.size,
    })
}

impl<'a> Iterator for FileBlocks<'a> {
    type Item = Result<&'a [u8], Error>;
    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let blk_no = *self.blocks.get(self.next_blk)?;
        self.next_blk += 1;
        let len = self.remaining.min(self.img.block_size());
        self.remaining -= len;

        if blk_no == 0 {
            return Some(Ok(&HOLE[..len as usize]));
        }
        match self.img.block_at(blk_no) {
            Ok(block) => Some(Ok(&block[..len as usize])),
            Err(err) => {
                self.remaining = 0;
                Some(Err(err))
            }
        }
    }
}
