//! Path-to-inode resolution over raw ext2 images, and the pieces `ext2cat`
//! builds on: block addressing, inode lookup, directory scanning and
//! direct-block file reads.

pub mod ext2;
