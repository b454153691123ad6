use std::sync::Arc;
use std::ffi::OsStr;
use libc::c_int;
use time::Timespec;
use crate::prelude::*;
use crate::dentry::{Dentry, EntryKind};
use crate::flusher::Flusher;
use crate::fs::{statfs, unmount_fs};
use crate::inode::{InodeAttr, SetAttr, get_inode_attr, set_inode_attr};

/// Request adapter between FUSE and a mounted store.
pub struct Fuse {
  fs: Arc<Filesystem>,
  flusher: Option<Flusher>,
}

impl Fuse {
  pub fn new(fs: Arc<Filesystem>) -> Fuse {
    Fuse { fs: fs, flusher: None }
  }
}

const TTL: Timespec = Timespec { sec: 1, nsec: 0 };
const NAME_MAX: u32 = 255;

impl fuse::Filesystem for Fuse {
  fn init(&mut self, _req: &fuse::Request) -> std::result::Result<(), c_int> {
    if let Some(interval) = self.fs.options.sync_interval {
      match Flusher::spawn(self.fs.clone(), interval) {
        Ok(flusher) => self.flusher = Some(flusher),
        Err(err) => {
          tracing::error!("cannot start the flusher: {}", err);
          return Err(libc::EIO);
        },
      }
    }
    Ok(())
  }

  fn destroy(&mut self, _req: &fuse::Request) {
    self.flusher = None;
    if let Err(err) = unmount_fs(&self.fs) {
      tracing::error!("unmount failed: {}", err);
    }
  }

  fn lookup(&mut self, _req: &fuse::Request, parent: u64, name: &OsStr,
    reply: fuse::ReplyEntry)
  {
    tracing::trace!(parent, ?name, "lookup");
    let res: Result<_> = (|| {
      let parent = find_dentry(&self.fs.root, kfs_ino(parent))
        .ok_or_else(|| Error::NotFound(format!("inode {}", kfs_ino(parent))))?;
      let child = name.to_str().and_then(|name| parent.child(name))
        .ok_or_else(|| Error::NotFound(name.to_string_lossy().into_owned()))?;
      get_inode_attr(&self.fs, child.meta.ino)
    })();

    match res {
      Err(err) => reply.error(err.errno()),
      Ok(attr) => reply.entry(&TTL, &file_attr(&attr), 0),
    }
  }

  fn getattr(&mut self, _req: &fuse::Request, ino: u64, reply: fuse::ReplyAttr) {
    tracing::trace!(ino, "getattr");
    match get_inode_attr(&self.fs, kfs_ino(ino)) {
      Err(err) => reply.error(err.errno()),
      Ok(attr) => reply.attr(&TTL, &file_attr(&attr)),
    }
  }

  fn setattr(&mut self, _req: &fuse::Request, ino: u64, mode: Option<u32>,
    uid: Option<u32>, gid: Option<u32>, size: Option<u64>,
    atime: Option<Timespec>, mtime: Option<Timespec>, _fh: Option<u64>,
    _crtime: Option<Timespec>, _chgtime: Option<Timespec>,
    _bkuptime: Option<Timespec>, _flags: Option<u32>, reply: fuse::ReplyAttr)
  {
    tracing::trace!(ino, ?mode, ?uid, ?gid, ?size, "setattr");
    let attr = match set_attr_request(mode, uid, gid, size, atime, mtime) {
      Ok(attr) => attr,
      Err(errno) => return reply.error(errno),
    };
    match set_inode_attr(&self.fs, kfs_ino(ino), &attr) {
      Err(err) => reply.error(err.errno()),
      Ok(attr) => reply.attr(&TTL, &file_attr(&attr)),
    }
  }

  fn opendir(&mut self, _req: &fuse::Request, ino: u64, _flags: u32,
    reply: fuse::ReplyOpen)
  {
    tracing::trace!(ino, "opendir");
    match find_dentry(&self.fs.root, kfs_ino(ino)) {
      Some(ref dentry) if dentry.meta.kind == EntryKind::Dir => reply.opened(0, 0),
      Some(_) => reply.error(libc::ENOTDIR),
      None => reply.error(libc::ENOENT),
    }
  }

  fn readdir(&mut self, _req: &fuse::Request, ino: u64, _fh: u64, offset: i64,
    mut reply: fuse::ReplyDirectory)
  {
    tracing::trace!(ino, offset, "readdir");
    let dentry = match find_dentry(&self.fs.root, kfs_ino(ino)) {
      Some(dentry) => dentry,
      None => return reply.error(libc::ENOENT),
    };

    let parent_ino = dentry.parent().map_or(dentry.meta.ino, |parent| parent.meta.ino);
    let mut entries = vec![
      (dentry.meta.ino, EntryKind::Dir, ".".to_string()),
      (parent_ino, EntryKind::Dir, "..".to_string()),
    ];
    entries.extend(dentry.children().iter()
      .map(|child| (child.meta.ino, child.meta.kind, child.name.clone())));

    for (idx, &(ino, kind, ref name)) in entries.iter().enumerate().skip(offset as usize) {
      if reply.add(fuse_ino(ino), idx as i64 + 1, fuse_file_type(kind), name) {
        break;
      }
    }
    reply.ok();
  }

  fn statfs(&mut self, _req: &fuse::Request, _ino: u64, reply: fuse::ReplyStatfs) {
    let stat = statfs(&self.fs);
    reply.statfs(stat.blocks, stat.blocks_free, stat.blocks_avail,
      stat.files, stat.files_free, stat.block_size as u32, NAME_MAX,
      stat.block_size as u32);
  }
}

/// Inodes carry no data, so a size change cannot be honoured.
fn set_attr_request(mode: Option<u32>, uid: Option<u32>, gid: Option<u32>,
  size: Option<u64>, atime: Option<Timespec>, mtime: Option<Timespec>)
  -> std::result::Result<SetAttr, c_int>
{
  if size.is_some() {
    return Err(libc::ENOSYS);
  }
  Ok(SetAttr {
    mode: mode,
    uid: uid,
    gid: gid,
    atime: atime.map(|t| t.sec as u32),
    mtime: mtime.map(|t| t.sec as u32),
  })
}

/// FUSE reserves inode 1 for the root, which is inode 0 in the store.
fn kfs_ino(fuse_ino: u64) -> u64 {
  fuse_ino.wrapping_sub(1)
}

fn fuse_ino(kfs_ino: u64) -> u64 {
  kfs_ino + 1
}

fn find_dentry(dentry: &Arc<Dentry>, ino: u64) -> Option<Arc<Dentry>> {
  if dentry.meta.ino == ino {
    return Some(dentry.clone());
  }
  dentry.children().iter().filter_map(|child| find_dentry(child, ino)).next()
}

fn file_attr(attr: &InodeAttr) -> fuse::FileAttr {
  fuse::FileAttr {
    ino: fuse_ino(attr.ino),
    size: attr.size,
    blocks: attr.blocks,
    atime: fuse_timespec(attr.atime),
    mtime: fuse_timespec(attr.mtime),
    ctime: fuse_timespec(attr.ctime),
    crtime: fuse_timespec(attr.btime),
    kind: fuse_file_type(EntryKind::from_mode(attr.mode)),
    perm: (attr.mode & 0o7777) as u16,
    nlink: attr.nlink,
    uid: attr.uid,
    gid: attr.gid,
    rdev: 0,
    flags: 0,
  }
}

fn fuse_timespec(epoch: u32) -> Timespec {
  Timespec::new(epoch as i64, 0)
}

fn fuse_file_type(kind: EntryKind) -> fuse::FileType {
  match kind {
    EntryKind::Dir => fuse::FileType::Directory,
    EntryKind::Symlink => fuse::FileType::Symlink,
    EntryKind::Regular | EntryKind::Other => fuse::FileType::RegularFile,
  }
}
