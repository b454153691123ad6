use std::sync::Arc;
use parking_lot::{Mutex, RawMutex};
use parking_lot::lock_api::ArcMutexGuard;
use crate::prelude::*;
use crate::bitmap;
use crate::group::Group;

/// In-memory inode. At most one exists per inode number for the lifetime of
/// a mount; it lives in a hash bucket of its inode group.
#[derive(Debug)]
pub struct Inode {
  pub ino: u64,
  pub group_id: u64,
  /// Byte offset of the on-disk record.
  pub offset: u64,
  pub node: Node,
  /// The node has been read from disk (or initialized by allocation).
  pub init: bool,
  pub dirty: bool,
}

pub type InodeRef = Arc<Mutex<Inode>>;
pub type InodeGuard = ArcMutexGuard<RawMutex, Inode>;

pub fn ihash_lookup(group: &Group, ino: u64) -> Option<InodeRef> {
  group.bucket(ino).lock().iter()
    .find(|&&(key, _)| key == ino)
    .map(|(_, inode)| inode.clone())
}

/// Returns the cached inode for `ino`, inserting an uninitialized one when
/// the bucket has none.
pub fn ihash_get(group: &Group, ino: u64, offset: u64) -> InodeRef {
  let mut bucket = group.bucket(ino).lock();
  if let Some((_, inode)) = bucket.iter().find(|&&(key, _)| key == ino) {
    tracing::trace!(ino, "inode cache hit");
    return inode.clone();
  }

  let inode = Arc::new(Mutex::new(Inode {
    ino: ino,
    group_id: group.id,
    offset: offset,
    node: Node::default(),
    init: false,
    dirty: false,
  }));
  bucket.push((ino, inode.clone()));
  inode
}

pub fn ihash_remove(group: &Group, ino: u64) -> Option<InodeRef> {
  let mut bucket = group.bucket(ino).lock();
  let pos = bucket.iter().position(|&(key, _)| key == ino)?;
  Some(bucket.swap_remove(pos).1)
}

/// Removes `inode` from its bucket, unless the bucket already holds a newer
/// object for the same number.
pub fn ihash_evict(group: &Group, ino: u64, inode: &InodeRef) -> bool {
  let mut bucket = group.bucket(ino).lock();
  match bucket.iter().position(|(key, cached)| *key == ino && Arc::ptr_eq(cached, inode)) {
    Some(pos) => {
      bucket.swap_remove(pos);
      true
    },
    None => false,
  }
}

fn ihash_holds(group: &Group, ino: u64, inode: &InodeRef) -> bool {
  ihash_lookup(group, ino).map_or(false, |cached| Arc::ptr_eq(&cached, inode))
}

/// Locks a cached inode, or returns `None` when it was evicted while the
/// caller waited for the lock; the caller then looks it up again.
fn lock_cached(group: &Group, ino: u64, inode: &InodeRef) -> Option<InodeGuard> {
  let guard = inode.lock_arc();
  if ihash_holds(group, ino, inode) {
    Some(guard)
  } else {
    None
  }
}

/// Looks up an allocated inode and returns it locked, reading it from disk on
/// first use.
///
/// The guard must be dropped before calling `alloc_inode`, `sync_fs` or
/// `sync_group`, since those take group locks, which come before inode locks.
pub fn get_inode(fs: &Filesystem, ino: u64) -> Result<InodeGuard> {
  let _enter = fs.span.enter();
  let group = fs.inode_group_of(ino)?;
  let bit = ino % fs.layout.inode_units_per_group();
  let offset = fs.layout.inode_offset(group.offset, ino);
  loop {
    if !bitmap::test_bit(&group.meta.lock().bitmap[..], bit) {
      return Err(Error::NotFound(format!("inode {}", ino)));
    }

    let inode = ihash_get(&group, ino, offset);
    let mut guard = match lock_cached(&group, ino, &inode) {
      Some(guard) => guard,
      None => {
        tracing::trace!(ino, "inode evicted while waiting, looking up again");
        continue;
      },
    };
    if !guard.init {
      if let Err(err) = read_inode_locked(fs, &mut guard) {
        // Evicted before unlocking, so every waiter sees it gone.
        ihash_evict(&group, ino, &inode);
        drop(guard);
        return Err(err);
      }
    }
    return Ok(guard);
  }
}

pub fn read_inode_locked(fs: &Filesystem, inode: &mut Inode) -> Result<()> {
  let mut buffer = make_buffer(INODE_SIZE);
  read_exact_at(&*fs.volume, inode.offset, &mut buffer[..], "inode")?;
  inode.node = decode_node(&buffer[..]);
  inode.init = true;
  inode.dirty = false;
  Ok(())
}

/// Writes the inode record back if it is dirty.
pub fn sync_inode_locked(fs: &Filesystem, inode: &mut Inode) -> Result<()> {
  if !inode.dirty {
    return Ok(());
  }
  let mut buffer = make_buffer(INODE_SIZE);
  encode_node(&inode.node, &mut buffer[..]);
  write_exact_at(&*fs.volume, inode.offset, &buffer[..], "inode")?;
  inode.dirty = false;
  tracing::debug!(ino = inode.ino, offset = inode.offset, "inode synced");
  Ok(())
}

pub fn sync_inode(fs: &Filesystem, inode: &InodeRef) -> Result<()> {
  sync_inode_locked(fs, &mut inode.lock())
}

pub fn mark_inode_dirty_locked(inode: &mut Inode) {
  inode.dirty = true;
}

pub fn mark_inode_dirty(inode: &InodeRef) {
  mark_inode_dirty_locked(&mut inode.lock());
}

/// Attributes of an inode as reported to the request adapter.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct InodeAttr {
  pub ino: u64,
  pub size: u64,
  /// Number of 512-byte sectors covered by `size`.
  pub blocks: u64,
  pub uid: u32,
  pub gid: u32,
  pub mode: u32,
  pub nlink: u32,
  pub atime: u32,
  pub mtime: u32,
  pub ctime: u32,
  pub btime: u32,
}

impl InodeAttr {
  pub fn from_node(ino: u64, node: &Node) -> InodeAttr {
    InodeAttr {
      ino: ino,
      size: node.size,
      blocks: (node.size + 511) / 512,
      uid: node.uid,
      gid: node.gid,
      mode: node.mode,
      nlink: node.nlink,
      atime: node.atime,
      mtime: node.mtime,
      ctime: node.ctime,
      btime: node.btime,
    }
  }
}

pub fn get_inode_attr(fs: &Filesystem, ino: u64) -> Result<InodeAttr> {
  let inode = get_inode(fs, ino)?;
  Ok(InodeAttr::from_node(ino, &inode.node))
}

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct SetAttr {
  /// Permission bits; the file type bits of the inode are kept.
  pub mode: Option<u32>,
  pub uid: Option<u32>,
  pub gid: Option<u32>,
  pub atime: Option<u32>,
  pub mtime: Option<u32>,
}

pub fn set_inode_attr(fs: &Filesystem, ino: u64, attr: &SetAttr) -> Result<InodeAttr> {
  let _enter = fs.span.enter();
  fs.check_mounted()?;
  let mut inode = get_inode(fs, ino)?;
  {
    let node = &mut inode.node;
    if let Some(mode) = attr.mode {
      let type_mask = libc::S_IFMT as u32;
      node.mode = (node.mode & type_mask) | (mode & !type_mask);
    }
    if let Some(uid) = attr.uid {
      node.uid = uid;
    }
    if let Some(gid) = attr.gid {
      node.gid = gid;
    }
    if let Some(atime) = attr.atime {
      node.atime = atime;
    }
    if let Some(mtime) = attr.mtime {
      node.mtime = mtime;
    }
    node.ctime = now_secs();
  }
  mark_inode_dirty_locked(&mut inode);
  Ok(InodeAttr::from_node(ino, &inode.node))
}
