use std::sync::Arc;
use parking_lot::{Mutex, RawMutex};
use parking_lot::lock_api::ArcMutexGuard;
use crate::prelude::*;
use crate::bitmap;
use crate::inode::{InodeRef, sync_inode_locked};
use crate::superblock::Layout;

/// One block group: a descriptor, a bitmap and a payload of inode records or
/// data blocks.
pub struct Group {
  pub id: u64,
  pub kind: GroupKind,
  /// Byte offset of the descriptor.
  pub offset: u64,
  pub meta: Arc<Mutex<GroupMeta>>,
  /// Inode cache, keyed by `ino % INODE_HASH_SLOTS`. Empty for data groups.
  pub buckets: Vec<Mutex<Vec<(u64, InodeRef)>>>,
}

#[derive(Debug)]
pub struct GroupMeta {
  pub desc: GroupDesc,
  pub bitmap: Vec<u8>,
  pub dirty: bool,
}

pub type GroupMetaGuard = ArcMutexGuard<RawMutex, GroupMeta>;

/// A group whose metadata lock is held; the lock is released on drop.
pub struct LockedGroup {
  pub group: Arc<Group>,
  pub meta: GroupMetaGuard,
}

impl Group {
  pub fn new(id: u64, offset: u64, desc: GroupDesc, bitmap: Vec<u8>) -> Group {
    let bucket_count = match desc.kind {
      GroupKind::Inode => INODE_HASH_SLOTS,
      GroupKind::Data => 0,
    };
    Group {
      id: id,
      kind: desc.kind,
      offset: offset,
      meta: Arc::new(Mutex::new(GroupMeta { desc: desc, bitmap: bitmap, dirty: false })),
      buckets: (0..bucket_count).map(|_| Mutex::new(Vec::new())).collect(),
    }
  }

  /// An empty group, as created by growing the store.
  pub fn empty(id: u64, kind: GroupKind, offset: u64) -> Group {
    Group::new(id, offset, GroupDesc::new(kind), make_buffer(BITMAP_SIZE))
  }

  pub fn bitmap_offset(&self) -> u64 {
    self.offset + GROUP_DESC_SIZE
  }

  pub fn bucket(&self, ino: u64) -> &Mutex<Vec<(u64, InodeRef)>> {
    &self.buckets[(ino % INODE_HASH_SLOTS as u64) as usize]
  }

  pub fn lock(self: &Arc<Self>) -> LockedGroup {
    LockedGroup { group: self.clone(), meta: self.meta.lock_arc() }
  }
}

/// Claims the lowest free unit of a locked group and returns its index within
/// the group. The caller must have checked that `used < capacity`.
pub fn alloc_unit_locked(group: &Group, meta: &mut GroupMeta, capacity: u64) -> Result<u64> {
  if meta.desc.used as u64 >= capacity {
    return Err(Error::Corrupt(format!(
      "{} group {} is full but was chosen for allocation", group.kind, group.id)));
  }

  let scan_len = ((capacity + 7) / 8) as usize;
  let bit = match bitmap::find_and_claim(&mut meta.bitmap[..scan_len]) {
    Some(bit) if bit < capacity => bit,
    Some(bit) => {
      bitmap::clear_bit(&mut meta.bitmap[..], bit);
      return Err(Error::Corrupt(format!(
        "bitmap of {} group {} has no free unit but records {} of {} used",
        group.kind, group.id, meta.desc.used, capacity)));
    },
    None => return Err(Error::Corrupt(format!(
        "bitmap of {} group {} is full but records {} of {} used",
        group.kind, group.id, meta.desc.used, capacity))),
  };

  meta.desc.used += 1;
  assert!(meta.desc.used as u64 <= capacity);
  meta.dirty = true;
  Ok(bit)
}

/// Returns a unit to a locked group.
pub fn release_unit_locked(group: &Group, meta: &mut GroupMeta, bit: u64) -> Result<()> {
  if !bitmap::clear_bit(&mut meta.bitmap[..], bit) {
    return Err(Error::Corrupt(format!(
      "unit {} of {} group {} is already free", bit, group.kind, group.id)));
  }
  meta.desc.used = meta.desc.used.saturating_sub(1);
  meta.dirty = true;
  Ok(())
}

pub fn write_group_desc(volume: &dyn Volume, group: &Group, desc: &GroupDesc) -> Result<()> {
  let mut buffer = make_buffer(GROUP_DESC_SIZE);
  encode_group_desc(desc, &mut buffer[..]);
  write_exact_at(volume, group.offset, &buffer[..], "group descriptor")
}

/// Flushes a locked group: every dirty cached inode first, then the
/// descriptor and the bitmap if they changed. Stops at the first failure,
/// leaving the remaining dirty bits set.
pub fn sync_group_locked(fs: &Filesystem, group: &Group, meta: &mut GroupMeta) -> Result<()> {
  for bucket in group.buckets.iter() {
    let inodes: Vec<InodeRef> = bucket.lock().iter()
      .map(|(_, inode)| inode.clone())
      .collect();
    for inode in inodes.iter() {
      sync_inode_locked(fs, &mut inode.lock())?;
    }
  }

  if meta.dirty {
    write_group_desc(&*fs.volume, group, &meta.desc)?;
    write_exact_at(&*fs.volume, group.bitmap_offset(), &meta.bitmap[..], "group bitmap")?;
    meta.dirty = false;
    tracing::debug!(kind = %group.kind, id = group.id, used = meta.desc.used, "group synced");
  }
  Ok(())
}

pub fn sync_group(fs: &Filesystem, group: &Group) -> Result<()> {
  let mut meta = group.meta.lock();
  sync_group_locked(fs, group, &mut meta)
}

/// Walks the store from the end of the superblock and rebuilds both group
/// lists. Each descriptor decides how far the walk advances.
pub fn scan_groups(volume: &dyn Volume, layout: &Layout, filesize: u64)
  -> Result<(Vec<Arc<Group>>, Vec<Arc<Group>>)>
{
  let mut inode_groups = Vec::new();
  let mut data_groups = Vec::new();
  let mut offset = SUPERBLOCK_SIZE;

  while offset < filesize {
    if filesize - offset < GROUP_META_SIZE {
      return Err(Error::Corrupt(format!(
        "truncated group metadata at offset {} in a store of {} bytes", offset, filesize)));
    }

    let mut desc_buf = make_buffer(GroupDesc::ENCODED_LEN as u64);
    read_exact_at(volume, offset, &mut desc_buf[..], "group descriptor")?;
    let desc = decode_group_desc(&desc_buf[..])?;

    let mut bitmap = make_buffer(BITMAP_SIZE);
    read_exact_at(volume, offset + GROUP_DESC_SIZE, &mut bitmap[..], "group bitmap")?;

    let capacity = layout.units_per_group(desc.kind);
    check_bitmap(&desc, &bitmap[..], capacity, offset)?;

    let list = match desc.kind {
      GroupKind::Inode => &mut inode_groups,
      GroupKind::Data => &mut data_groups,
    };
    let id = list.len() as u64;
    list.push(Arc::new(Group::new(id, offset, desc, bitmap)));

    offset += layout.group_span(desc.kind);
    if offset > filesize {
      return Err(Error::Corrupt(format!(
        "{} group {} extends past the end of the store", desc.kind, id)));
    }
  }

  Ok((inode_groups, data_groups))
}

fn check_bitmap(desc: &GroupDesc, bitmap: &[u8], capacity: u64, offset: u64) -> Result<()> {
  if desc.used as u64 > capacity {
    return Err(Error::Corrupt(format!(
      "{} group at offset {} records {} used units, capacity is {}",
      desc.kind, offset, desc.used, capacity)));
  }
  if (capacity..BITMAP_BITS).any(|bit| bitmap::test_bit(bitmap, bit)) {
    return Err(Error::Corrupt(format!(
      "{} group at offset {} marks units beyond its capacity", desc.kind, offset)));
  }
  let set = bitmap::count_set(bitmap);
  if set != desc.used as u64 {
    return Err(Error::Corrupt(format!(
      "{} group at offset {} records {} used units but its bitmap has {}",
      desc.kind, offset, desc.used, set)));
  }
  Ok(())
}
