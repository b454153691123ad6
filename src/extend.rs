use std::sync::Arc;
use std::sync::atomic::Ordering;
use crate::prelude::*;
use crate::group::{Group, LockedGroup, write_group_desc};

/// How many times a lookup grows the store and rescans before giving up,
/// when every new group is taken by concurrent allocators first.
pub const MAX_GROW_ATTEMPTS: usize = 16;

/// Returns the first group of `kind` with a free unit, locked. Grows the
/// store when every group is full.
pub fn find_group_with_capacity(fs: &Filesystem, kind: GroupKind) -> Result<LockedGroup> {
  let capacity = fs.layout.units_per_group(kind);
  let mut attempts = 0;
  loop {
    let seen = {
      let groups = fs.groups(kind).read();
      for group in groups.iter() {
        let locked = group.lock();
        if (locked.meta.desc.used as u64) < capacity {
          return Ok(locked);
        }
      }
      groups.len()
    };

    if attempts == MAX_GROW_ATTEMPTS {
      tracing::warn!(kind = %kind, attempts, "no capacity after growing the store");
      return Err(Error::NoSpace(kind));
    }
    attempts += 1;
    grow(fs, kind, seen)?;
  }
}

/// Appends a new empty group of `kind` at the end of the store.
///
/// `seen` is the number of groups of `kind` the caller found full. If another
/// thread has appended a group since, nothing is done and the caller simply
/// rescans.
pub fn grow(fs: &Filesystem, kind: GroupKind, seen: usize) -> Result<()> {
  let _enter = fs.span.enter();
  let _extend = fs.extend_lock.lock();
  fs.check_mounted()?;
  if fs.groups(kind).read().len() != seen {
    return Ok(());
  }

  let old_size = fs.filesize.load(Ordering::SeqCst);
  let new_size = old_size + fs.layout.group_span(kind);
  if let Err(err) = fs.volume.set_size(new_size) {
    tracing::error!(kind = %kind, old_size, new_size, "cannot extend the store: {}", err);
    return Err(err.into());
  }

  let group = Group::empty(seen as u64, kind, old_size);
  if let Err(err) = write_group_desc(&*fs.volume, &group, &GroupDesc::new(kind)) {
    if let Err(truncate_err) = fs.volume.set_size(old_size) {
      tracing::error!(old_size, "cannot shrink the store back after a failed grow: {}",
        truncate_err);
      fs.mark_err();
    }
    return Err(err);
  }

  fs.filesize.store(new_size, Ordering::SeqCst);
  fs.groups(kind).write().push(Arc::new(group));
  *fs.superblock.write().group_count_mut(kind) += 1;
  fs.mark_dirty();

  tracing::info!(kind = %kind, id = seen, offset = old_size, size = new_size, "store grown");
  Ok(())
}
