use scroll::{Pread, LE};
use tracing::{debug, trace};

use super::image::{Image, InodeNo};
use super::layout::{DirEnt, Inode, NDIR_BLOCKS};
use super::Error;

/// In-use entries of a directory, in on-disk order.
///
/// Only the direct blocks are walked; zero block pointers are skipped. The
/// iterator stops after the first structural error it yields.
pub struct DirEntries<'a> {
    img: Image<'a>,
    blocks: [u32; NDIR_BLOCKS],
    next_blk: usize,
    cur: Option<(u32, &'a [u8])>,
    off: usize,
    failed: bool,
}

pub fn entries<'a>(img: &Image<'a>, dir: &Inode<'a>) -> DirEntries<'a> {
    let mut blocks = [0u32; NDIR_BLOCKS];
    blocks.copy_from_slice(dir.direct_blocks());
    DirEntries {
        img: *img,
        blocks,
        next_blk: 0,
        cur: None,
        off: 0,
        failed: false,
    }
}

impl<'a> DirEntries<'a> {
    fn next_entry(&mut self) -> Result<Option<DirEnt<'a>>, Error> {
        loop {
            let Some((blk_no, block)) = self.cur else {
                let Some(&blk_no) = self.blocks.get(self.next_blk) else {
                    return Ok(None);
                };
                self.next_blk += 1;
                if blk_no != 0 {
                    trace!(blk_no, "scanning directory block");
                    self.cur = Some((blk_no, self.img.block_at(blk_no)?));
                    self.off = 0;
                }
                continue;
            };
            if self.off >= block.len() {
                self.cur = None;
                continue;
            }

            let off = self.off;
            let corrupt = move |reason| Error::CorruptDirEnt {
                block: blk_no,
                offset: off,
                reason,
            };
            let rest = &block[off..];
            if rest.len() < DirEnt::HEADER_SZ {
                return Err(corrupt("entry header crosses the block end"));
            }
            let rec_len: u16 = rest.pread_with(4, LE)?;
            let rec_len = rec_len as usize;
            if rec_len == 0 {
                return Err(corrupt("zero record length"));
            }
            if rec_len > rest.len() {
                return Err(corrupt("record runs past the block end"));
            }
            let name_len: u8 = rest.pread_with(6, LE)?;
            if DirEnt::HEADER_SZ + name_len as usize > rec_len {
                return Err(corrupt("name longer than its record"));
            }

            let ent: DirEnt<'a> = rest[..rec_len].pread_with(0, LE)?;
            self.off += rec_len;
            if ent.is_used() {
                return Ok(Some(ent));
            }
        }
    }
}

impl<'a> Iterator for DirEntries<'a> {
    type Item = Result<DirEnt<'a>, Error>;
    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        match self.next_entry() {
            Ok(ent) => ent.map(Ok),
            Err(err) => {
                self.failed = true;
                Some(Err(err))
            }
        }
    }
}

/// Finds `name` in `dir`, comparing names by length and content.
///
/// `Ok(None)` means no entry carries that name; a malformed directory block
/// is an error instead.
pub fn lookup_in_directory<'a>(
    img: &Image<'a>,
    dir: &Inode<'a>,
    name: &str,
) -> Result<Option<InodeNo>, Error> {
    for ent in entries(img, dir) {
        let ent = ent?;
        if ent.name == name.as_bytes() {
            debug!(name, ino = ent.inode, "directory entry found");
            return Ok(InodeNo::new(ent.inode));
        }
    }
    trace!(name, "no directory entry");
    Ok(None)
}
