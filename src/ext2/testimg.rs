//! Minimal single-group ext2 images for tests.
//!
//! Layout with 1 KiB blocks: boot block 0, superblock in block 1, group
//! descriptor in block 2, inode table from block `INODE_TABLE`, data blocks
//! after it.

use super::layout::{GrpDesc, Sblk};

pub(crate) const BLK_SZ: usize = 1024;
pub(crate) const INODE_SZ: usize = 128;
pub(crate) const INODES: u32 = 32;
pub(crate) const INODE_TABLE: u32 = 5;
pub(crate) const BLOCKS: u32 = 64;

pub(crate) const FT_REG: u8 = 1;
pub(crate) const FT_DIR: u8 = 2;

pub(crate) const GREETING: &[u8] = b"hello, world\n";

pub(crate) struct ImgBuilder {
    buf: Vec<u8>,
    inode_sz: usize,
    next_blk: u32,
}

impl ImgBuilder {
    pub(crate) fn new() -> Self {
        Self::with_inode_size(INODE_SZ as u16)
    }

    pub(crate) fn with_inode_size(inode_sz: u16) -> Self {
        let mut buf = vec![0u8; BLOCKS as usize * BLK_SZ];
        let table_blocks = (INODES as usize * inode_sz as usize).div_ceil(BLK_SZ) as u32;

        let sb = &mut buf[Sblk::OFFSET..Sblk::OFFSET + Sblk::SZ];
        sb[0..4].copy_from_slice(&INODES.to_le_bytes());
        sb[4..8].copy_from_slice(&BLOCKS.to_le_bytes());
        sb[20..24].copy_from_slice(&1u32.to_le_bytes()); // first data block
        sb[24..28].copy_from_slice(&0u32.to_le_bytes()); // 1 KiB blocks
        sb[32..36].copy_from_slice(&8192u32.to_le_bytes());
        sb[40..44].copy_from_slice(&INODES.to_le_bytes());
        sb[56..58].copy_from_slice(&0xEF53u16.to_le_bytes());
        sb[58..60].copy_from_slice(&1u16.to_le_bytes());
        sb[76..80].copy_from_slice(&1u32.to_le_bytes()); // dynamic rev
        sb[84..88].copy_from_slice(&11u32.to_le_bytes());
        sb[88..90].copy_from_slice(&inode_sz.to_le_bytes());
        sb[96..100].copy_from_slice(&0x02u32.to_le_bytes()); // filetype
        sb[120..127].copy_from_slice(b"testvol");

        let gd = &mut buf[GrpDesc::OFFSET..GrpDesc::OFFSET + GrpDesc::SZ];
        gd[0..4].copy_from_slice(&3u32.to_le_bytes());
        gd[4..8].copy_from_slice(&4u32.to_le_bytes());
        gd[8..12].copy_from_slice(&INODE_TABLE.to_le_bytes());

        ImgBuilder {
            buf,
            inode_sz: inode_sz as usize,
            next_blk: INODE_TABLE + table_blocks,
        }
    }

    pub(crate) fn alloc_block(&mut self) -> u32 {
        let blk = self.next_blk;
        assert!(blk < BLOCKS, "test image is out of blocks");
        self.next_blk += 1;
        blk
    }

    pub(crate) fn block_mut(&mut self, blk: u32) -> &mut [u8] {
        let start = blk as usize * BLK_SZ;
        &mut self.buf[start..start + BLK_SZ]
    }

    pub(crate) fn inode_mut(&mut self, ino: u32) -> &mut [u8] {
        let start = INODE_TABLE as usize * BLK_SZ + (ino as usize - 1) * self.inode_sz;
        &mut self.buf[start..start + self.inode_sz]
    }

    pub(crate) fn set_inode(&mut self, ino: u32, mode: u16, size: u32, blocks: &[u32]) {
        let rec = self.inode_mut(ino);
        rec.fill(0);
        rec[0..2].copy_from_slice(&mode.to_le_bytes());
        rec[4..8].copy_from_slice(&size.to_le_bytes());
        rec[16..20].copy_from_slice(&1_700_000_000u32.to_le_bytes());
        rec[26..28].copy_from_slice(&1u16.to_le_bytes());
        for (i, blk) in blocks.iter().enumerate() {
            rec[40 + i * 4..44 + i * 4].copy_from_slice(&blk.to_le_bytes());
        }
    }

    /// Writes a one-block directory; the last entry absorbs the block's slack.
    pub(crate) fn dir(&mut self, ino: u32, ents: &[(u32, &str, u8)]) -> u32 {
        let blk = self.alloc_block();
        let packed = pack_dirents(ents);
        self.block_mut(blk).copy_from_slice(&packed);
        self.set_inode(ino, 0o040755, BLK_SZ as u32, &[blk]);
        blk
    }

    pub(crate) fn file(&mut self, ino: u32, contents: &[u8]) -> Vec<u32> {
        let blocks: Vec<u32> = contents
            .chunks(BLK_SZ)
            .map(|chunk| {
                let blk = self.alloc_block();
                self.block_mut(blk)[..chunk.len()].copy_from_slice(chunk);
                blk
            })
            .collect();
        self.set_inode(ino, 0o100644, contents.len() as u32, &blocks);
        blocks
    }

    pub(crate) fn build(self) -> Vec<u8> {
        self.buf
    }
}

pub(crate) fn pack_dirents(ents: &[(u32, &str, u8)]) -> Vec<u8> {
    let mut block = vec![0u8; BLK_SZ];
    let mut off = 0;
    for (i, &(ino, name, ft)) in ents.iter().enumerate() {
        let rec_len = if i + 1 == ents.len() {
            BLK_SZ - off
        } else {
            (8 + name.len() + 3) & !3
        };
        block[off..off + 4].copy_from_slice(&ino.to_le_bytes());
        block[off + 4..off + 6].copy_from_slice(&(rec_len as u16).to_le_bytes());
        block[off + 6] = name.len() as u8;
        block[off + 7] = ft;
        block[off + 8..off + 8 + name.len()].copy_from_slice(name.as_bytes());
        off += rec_len;
    }
    block
}

/// Root holds `greeting.txt` (inode 12), `docs/` (13) with `notes.txt` (15),
/// and `foobar` (14).
pub(crate) fn greeting_image() -> Vec<u8> {
    let mut b = ImgBuilder::new();
    b.dir(
        2,
        &[
            (2, ".", FT_DIR),
            (2, "..", FT_DIR),
            (12, "greeting.txt", FT_REG),
            (13, "docs", FT_DIR),
            (14, "foobar", FT_REG),
        ],
    );
    b.file(12, GREETING);
    b.dir(
        13,
        &[(13, ".", FT_DIR), (2, "..", FT_DIR), (15, "notes.txt", FT_REG)],
    );
    b.file(14, b"bar");
    b.file(15, b"notes");
    b.build()
}
