use std::path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use parking_lot::{Mutex, RwLock};
use parking_lot::lock_api::ArcMutexGuard;
use time::Timespec;
use crate::prelude::*;
use crate::dentry::Dentry;
use crate::group::{Group, scan_groups, sync_group};
use crate::inode::get_inode;
use crate::superblock::{Layout, read_superblock, sync_superblock};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum MountState {
  Unmounted,
  Mounting,
  Mounted,
  Unmounting,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MountOptions {
  /// Period of the background flusher; `None` flushes only on demand and at
  /// unmount.
  pub sync_interval: Option<Duration>,
}

#[derive(Debug)]
struct FsState {
  mount: MountState,
  ok: bool,
  /// The superblock has changes not yet written.
  dirty: bool,
  synctime: Option<Timespec>,
}

/// Handle of a mounted store.
///
/// Locks are acquired in this order: `extend_lock`, a group list, a group's
/// metadata, an inode hash bucket, an inode, `superblock`. A bucket lock is
/// never held while waiting for an inode, so an inode holder may still look
/// into its bucket. `state` is a leaf and is never held while taking another
/// lock.
pub struct Filesystem {
  pub volume: Box<dyn Volume>,
  pub layout: Layout,
  pub options: MountOptions,
  pub superblock: RwLock<Superblock>,
  pub inode_groups: RwLock<Vec<Arc<Group>>>,
  pub data_groups: RwLock<Vec<Arc<Group>>>,
  pub extend_lock: Mutex<()>,
  pub filesize: AtomicU64,
  pub root: Arc<Dentry>,
  pub span: tracing::Span,
  state: Mutex<FsState>,
}

impl Filesystem {
  pub fn groups(&self, kind: GroupKind) -> &RwLock<Vec<Arc<Group>>> {
    match kind {
      GroupKind::Inode => &self.inode_groups,
      GroupKind::Data => &self.data_groups,
    }
  }

  pub fn group_offset(&self, kind: GroupKind, id: u64) -> Option<u64> {
    self.groups(kind).read().get(id as usize).map(|group| group.offset)
  }

  pub fn inode_group_of(&self, ino: u64) -> Result<Arc<Group>> {
    let id = ino / self.layout.inode_units_per_group();
    self.inode_groups.read().get(id as usize).cloned()
      .ok_or_else(|| Error::NotFound(format!("inode {}", ino)))
  }

  pub fn superblock(&self) -> Superblock {
    *self.superblock.read()
  }

  pub fn mark_dirty(&self) {
    self.state.lock().dirty = true;
  }

  /// Clears the dirty flag, returning whether it was set.
  pub fn take_dirty(&self) -> bool {
    let mut state = self.state.lock();
    let dirty = state.dirty;
    state.dirty = false;
    dirty
  }

  pub fn is_dirty(&self) -> bool {
    self.state.lock().dirty
  }

  /// Marks the filesystem as errored. Nothing is guaranteed about operations
  /// after this point.
  pub fn mark_err(&self) {
    let mut state = self.state.lock();
    if state.ok {
      tracing::warn!(parent: &self.span, "filesystem marked as errored");
    }
    state.ok = false;
  }

  pub fn is_ok(&self) -> bool {
    self.state.lock().ok
  }

  pub fn mount_state(&self) -> MountState {
    self.state.lock().mount
  }

  /// Fails once unmounting has begun; changes made after the final flush
  /// would never reach the store.
  pub fn check_mounted(&self) -> Result<()> {
    match self.mount_state() {
      MountState::Mounting | MountState::Mounted => Ok(()),
      MountState::Unmounting | MountState::Unmounted => Err(Error::NotMounted),
    }
  }

  fn set_mount_state(&self, mount: MountState) {
    self.state.lock().mount = mount;
  }

  pub fn set_synctime(&self, time: Timespec) {
    self.state.lock().synctime = Some(time);
  }

  pub fn last_sync(&self) -> Option<Timespec> {
    self.state.lock().synctime
  }
}

/// Reads the superblock and rebuilds the group lists, without touching the
/// root inode or the mount counters.
pub fn open_fs(volume: Box<dyn Volume>, options: MountOptions, span: tracing::Span)
  -> Result<Filesystem>
{
  let (superblock, filesize) = read_superblock(&*volume)?;
  let layout = Layout::from_superblock(&superblock)?;
  let (inode_groups, data_groups) = scan_groups(&*volume, &layout, filesize)?;

  if inode_groups.len() as u64 != superblock.ibg_num ||
    data_groups.len() as u64 != superblock.dbg_num
  {
    return Err(Error::Corrupt(format!(
      "found {} inode and {} data groups, superblock records {} and {}",
      inode_groups.len(), data_groups.len(), superblock.ibg_num, superblock.dbg_num)));
  }

  Ok(Filesystem {
    volume: volume,
    layout: layout,
    options: options,
    superblock: RwLock::new(superblock),
    inode_groups: RwLock::new(inode_groups),
    data_groups: RwLock::new(data_groups),
    extend_lock: Mutex::new(()),
    filesize: AtomicU64::new(filesize),
    root: Dentry::root(ROOT_INO),
    span: span,
    state: Mutex::new(FsState {
      mount: MountState::Mounting,
      ok: true,
      dirty: false,
      synctime: None,
    }),
  })
}

/// Mounts a store. `label` names the store in log output.
pub fn mount_fs(volume: Box<dyn Volume>, options: MountOptions, label: &str)
  -> Result<Filesystem>
{
  let span = tracing::info_span!("kfs", store = label);
  let _enter = span.enter();
  let fs = match open_fs(volume, options, span.clone()) {
    Ok(fs) => fs,
    Err(err) => {
      tracing::error!("mount failed: {}", err);
      return Err(err);
    },
  };

  let root = get_inode(&fs, ROOT_INO).map_err(|err| match err {
    Error::NotFound(_) => Error::Corrupt("root inode is not allocated".to_string()),
    err => err,
  })?;
  fs.root.set_inode(ArcMutexGuard::mutex(&root).clone());
  drop(root);

  {
    let mut superblock = fs.superblock.write();
    superblock.mount_times += 1;
    superblock.mount_time = now();
  }
  fs.mark_dirty();
  fs.set_mount_state(MountState::Mounted);

  let superblock = fs.superblock();
  tracing::info!(inode_groups = superblock.ibg_num, data_groups = superblock.dbg_num,
    iused = superblock.iused, bused = superblock.bused,
    size = fs.filesize.load(Ordering::SeqCst), "mounted");
  Ok(fs)
}

pub fn mount_path<P: AsRef<path::Path>>(path: P, options: MountOptions) -> Result<Filesystem> {
  let path = path.as_ref();
  let volume = FileVolume::open(path)?;
  mount_fs(Box::new(volume), options, &path.display().to_string())
}

/// Flushes the inode groups, then the data groups, then the superblock.
/// Growth is blocked for the duration.
pub fn sync_fs(fs: &Filesystem) -> Result<()> {
  let _enter = fs.span.enter();
  let _extend = fs.extend_lock.lock();
  sync_groups(fs, GroupKind::Inode)?;
  sync_groups(fs, GroupKind::Data)?;
  sync_superblock(fs)
}

fn sync_groups(fs: &Filesystem, kind: GroupKind) -> Result<()> {
  let groups = fs.groups(kind).read().clone();
  for group in groups.iter() {
    if let Err(err) = sync_group(fs, group) {
      tracing::error!(kind = %kind, id = group.id, "group sync failed: {}", err);
      return Err(err);
    }
  }
  Ok(())
}

/// Stamps the unmount counters and flushes everything. A failed flush is
/// reported, but the filesystem is unmounted regardless; the store is closed
/// when the last handle is dropped.
pub fn unmount_fs(fs: &Filesystem) -> Result<()> {
  if fs.mount_state() != MountState::Mounted {
    return Ok(());
  }
  fs.set_mount_state(MountState::Unmounting);

  {
    let mut superblock = fs.superblock.write();
    superblock.umount_times += 1;
    superblock.umount_time = now();
  }
  fs.mark_dirty();

  let res = sync_fs(fs);
  if let Err(ref err) = res {
    tracing::warn!(parent: &fs.span, "flush at unmount failed: {}", err);
  }
  fs.set_mount_state(MountState::Unmounted);
  tracing::info!(parent: &fs.span, "unmounted");
  res
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct StatFs {
  pub block_size: u64,
  pub blocks: u64,
  pub blocks_free: u64,
  pub blocks_avail: u64,
  pub files: u64,
  pub files_free: u64,
}

pub fn statfs(fs: &Filesystem) -> StatFs {
  let superblock = fs.superblock();
  let filesize = fs.filesize.load(Ordering::SeqCst);
  let blocks = (filesize + BLOCK_SIZE - 1) / BLOCK_SIZE;
  let files = superblock.ibg_num * fs.layout.inode_units_per_group();
  StatFs {
    block_size: BLOCK_SIZE,
    blocks: blocks,
    blocks_free: blocks.saturating_sub(superblock.bused),
    blocks_avail: (superblock.dbg_num * fs.layout.dbg_size / BLOCK_SIZE)
      .saturating_sub(superblock.bused),
    files: files,
    files_free: files.saturating_sub(superblock.iused),
  }
}
