use crate::prelude::*;
use crate::extend::find_group_with_capacity;
use crate::group::{alloc_unit_locked, release_unit_locked};
use crate::inode::{InodeGuard, ihash_get, ihash_remove};
use crate::superblock::{inc_iused, dec_iused, inc_bused, dec_bused};

/// Allocates a new inode and returns it locked, zeroed and dirty.
///
/// The group lock is held from claiming the bit until the inode sits in the
/// cache, so racing allocators never see the same number.
///
/// The returned guard must be dropped before calling `alloc_inode`,
/// `sync_fs` or `sync_group` again, since those take group locks, which come
/// before inode locks.
pub fn alloc_inode(fs: &Filesystem) -> Result<InodeGuard> {
  let _enter = fs.span.enter();
  fs.check_mounted()?;
  let mut locked = find_group_with_capacity(fs, GroupKind::Inode)?;
  let ipg = fs.layout.inode_units_per_group();
  let bit = alloc_unit_locked(&locked.group, &mut locked.meta, ipg)?;
  let ino = locked.group.id * ipg + bit;
  let offset = fs.layout.inode_offset(locked.group.offset, ino);

  let inode = ihash_get(&locked.group, ino, offset);
  let mut guard = inode.lock_arc();
  guard.node = Node::default();
  guard.init = true;
  guard.dirty = true;
  inc_iused(fs);
  drop(locked);

  tracing::debug!(ino, "inode allocated");
  Ok(guard)
}

/// Allocates a data block and returns its number.
pub fn alloc_block(fs: &Filesystem) -> Result<u64> {
  let _enter = fs.span.enter();
  fs.check_mounted()?;
  let mut locked = find_group_with_capacity(fs, GroupKind::Data)?;
  let bpg = fs.layout.data_units_per_group();
  let bit = alloc_unit_locked(&locked.group, &mut locked.meta, bpg)?;
  let block = locked.group.id * bpg + bit;
  inc_bused(fs);
  drop(locked);

  tracing::debug!(block, "block allocated");
  Ok(block)
}

/// Releases an inode. The root inode cannot be released.
pub fn free_inode(fs: &Filesystem, ino: u64) -> Result<()> {
  let _enter = fs.span.enter();
  fs.check_mounted()?;
  if ino == ROOT_INO {
    return Err(Error::Reserved(ino));
  }

  let group = fs.inode_group_of(ino)?;
  {
    let mut meta = group.meta.lock();
    release_unit_locked(&group, &mut meta, ino % fs.layout.inode_units_per_group())?;
    ihash_remove(&group, ino);
    dec_iused(fs);
  }
  tracing::debug!(ino, "inode freed");
  Ok(())
}

pub fn free_block(fs: &Filesystem, block: u64) -> Result<()> {
  let _enter = fs.span.enter();
  fs.check_mounted()?;
  let bpg = fs.layout.data_units_per_group();
  let group = fs.groups(GroupKind::Data).read().get((block / bpg) as usize).cloned()
    .ok_or_else(|| Error::NotFound(format!("block {}", block)))?;
  {
    let mut meta = group.meta.lock();
    release_unit_locked(&group, &mut meta, block % bpg)?;
    dec_bused(fs);
  }
  tracing::debug!(block, "block freed");
  Ok(())
}
