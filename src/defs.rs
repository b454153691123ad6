use std::fmt;
use time::Timespec;

pub const SUPERBLOCK_MAGIC: u32 = 0xabcdabcd;
pub const SUPERBLOCK_VERSION: u32 = 1;

pub const SUPERBLOCK_SIZE: u64 = 8192;
pub const GROUP_DESC_SIZE: u64 = 4096;
pub const BITMAP_SIZE: u64 = 4096;
pub const GROUP_META_SIZE: u64 = GROUP_DESC_SIZE + BITMAP_SIZE;
pub const BITMAP_BITS: u64 = BITMAP_SIZE * 8;

pub const INODE_SIZE: u64 = 256;
pub const BLOCK_SIZE: u64 = 4096;
pub const DIRECT_BLOCKS: usize = 15;

/// Number of hash buckets in the inode cache of every inode group.
pub const INODE_HASH_SLOTS: usize = 32;

pub const ROOT_INO: u64 = 0;
pub const ROOT_UID: u32 = 0;
pub const ROOT_GID: u32 = 0;
pub const ROOT_MODE: u32 = libc::S_IFDIR as u32 | 0o777;

pub const DEFAULT_INODE_GROUP_SIZE: u32 = 1 << 20;
pub const DEFAULT_DATA_GROUP_SIZE: u32 = 64 << 20;
pub const MIN_INODE_GROUP_SIZE: u32 = 1 << 20;
pub const MAX_INODE_GROUP_SIZE: u32 = (BITMAP_BITS * INODE_SIZE) as u32;
pub const MIN_DATA_GROUP_SIZE: u32 = 1 << 20;
pub const MAX_DATA_GROUP_SIZE: u32 = (BITMAP_BITS * BLOCK_SIZE) as u32;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Superblock {
  pub magic: u32,
  pub version: u32,
  pub dbg_size: u32,
  pub ibg_size: u32,
  pub bused: u64,
  pub iused: u64,
  pub dbg_num: u64,
  pub ibg_num: u64,
  pub mount_times: u64,
  pub umount_times: u64,
  pub mount_time: Timespec,
  pub umount_time: Timespec,
}

impl Superblock {
  pub const ENCODED_LEN: usize = 96;

  pub fn new(ibg_size: u32, dbg_size: u32) -> Superblock {
    Superblock {
      magic: SUPERBLOCK_MAGIC,
      version: SUPERBLOCK_VERSION,
      dbg_size: dbg_size,
      ibg_size: ibg_size,
      bused: 0,
      iused: 0,
      dbg_num: 0,
      ibg_num: 0,
      mount_times: 0,
      umount_times: 0,
      mount_time: Timespec::new(0, 0),
      umount_time: Timespec::new(0, 0),
    }
  }

  pub fn group_count(&self, kind: GroupKind) -> u64 {
    match kind {
      GroupKind::Inode => self.ibg_num,
      GroupKind::Data => self.dbg_num,
    }
  }

  pub fn group_count_mut(&mut self, kind: GroupKind) -> &mut u64 {
    match kind {
      GroupKind::Inode => &mut self.ibg_num,
      GroupKind::Data => &mut self.dbg_num,
    }
  }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum GroupKind {
  Inode,
  Data,
}

impl GroupKind {
  pub fn code(self) -> u32 {
    match self {
      GroupKind::Inode => 1,
      GroupKind::Data => 2,
    }
  }

  pub fn from_code(code: u32) -> Option<GroupKind> {
    match code {
      1 => Some(GroupKind::Inode),
      2 => Some(GroupKind::Data),
      _ => None,
    }
  }

  /// Size of one allocatable unit in the payload of a group of this kind.
  pub fn unit_size(self) -> u64 {
    match self {
      GroupKind::Inode => INODE_SIZE,
      GroupKind::Data => BLOCK_SIZE,
    }
  }
}

impl fmt::Display for GroupKind {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    f.write_str(match *self {
      GroupKind::Inode => "inode",
      GroupKind::Data => "data",
    })
  }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct GroupDesc {
  pub kind: GroupKind,
  pub used: u32,
}

impl GroupDesc {
  pub const ENCODED_LEN: usize = 8;

  pub fn new(kind: GroupKind) -> GroupDesc {
    GroupDesc { kind: kind, used: 0 }
  }
}

/// The persistent part of an inode, stored in a 256-byte slot of an inode
/// group's payload.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct Node {
  pub size: u64,
  pub uid: u32,
  pub gid: u32,
  pub mode: u32,
  pub nlink: u32,
  pub atime: u32,
  pub ctime: u32,
  pub mtime: u32,
  pub btime: u32,
  pub direct: [u64; DIRECT_BLOCKS],
  pub indirect: u64,
}

pub fn now() -> Timespec {
  time::get_time()
}

pub fn now_secs() -> u32 {
  time::get_time().sec as u32
}
