//! A growable store of inode and data block groups.
//!
//! The store starts with a superblock and grows by appending block groups,
//! each made of a descriptor, an allocation bitmap and a payload of inode
//! records or data blocks. All operations take `&Filesystem` and may be called
//! from many threads at once.
pub use crate::defs::*;
pub use crate::error::{Error, Result};
pub use crate::volume::{Volume, FileVolume};
pub use crate::fs::{Filesystem, MountOptions, MountState, StatFs,
  mount_fs, mount_path, unmount_fs, sync_fs, statfs};
pub use crate::superblock::Layout;
pub use crate::group::{Group, GroupMeta, LockedGroup, sync_group};
pub use crate::extend::{find_group_with_capacity, grow, MAX_GROW_ATTEMPTS};
pub use crate::inode::{Inode, InodeRef, InodeGuard, InodeAttr, SetAttr,
  get_inode, get_inode_attr, set_inode_attr, sync_inode, mark_inode_dirty};
pub use crate::alloc::{alloc_inode, alloc_block, free_inode, free_block};
pub use crate::dentry::{Dentry, EntryKind, EntryMeta, lookup_path};
pub use crate::mkfs::{MkfsOptions, make_fs, format_volume};
pub use crate::flusher::Flusher;
#[cfg(feature = "fuse")]
pub use crate::fuse_fs::Fuse;

mod alloc;
pub mod bitmap;
mod decode;
mod defs;
mod dentry;
mod encode;
mod error;
mod extend;
mod flusher;
mod fs;
#[cfg(feature = "fuse")]
mod fuse_fs;
mod group;
mod inode;
mod mkfs;
mod prelude;
mod superblock;
mod volume;
