//! In-memory directory entries. Names are not persisted; the tree starts with
//! the root entry created at mount.
use std::sync::{Arc, Weak};
use parking_lot::Mutex;
use crate::prelude::*;
use crate::inode::InodeRef;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum EntryKind {
  Regular,
  Dir,
  Symlink,
  Other,
}

impl EntryKind {
  pub fn from_mode(mode: u32) -> EntryKind {
    match mode & libc::S_IFMT as u32 {
      m if m == libc::S_IFREG as u32 => EntryKind::Regular,
      m if m == libc::S_IFDIR as u32 => EntryKind::Dir,
      m if m == libc::S_IFLNK as u32 => EntryKind::Symlink,
      _ => EntryKind::Other,
    }
  }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct EntryMeta {
  pub ino: u64,
  pub kind: EntryKind,
  /// Encoded length of the entry: the name plus a 16-byte header.
  pub length: u32,
}

impl EntryMeta {
  pub fn new(ino: u64, kind: EntryKind, name: &str) -> EntryMeta {
    EntryMeta { ino: ino, kind: kind, length: name.len() as u32 + 16 }
  }
}

pub struct Dentry {
  pub name: String,
  pub meta: EntryMeta,
  parent: Weak<Dentry>,
  children: Mutex<Vec<Arc<Dentry>>>,
  inode: Mutex<Option<InodeRef>>,
}

impl Dentry {
  pub fn root(ino: u64) -> Arc<Dentry> {
    Arc::new(Dentry {
      name: "/".to_string(),
      meta: EntryMeta::new(ino, EntryKind::Dir, "/"),
      parent: Weak::new(),
      children: Mutex::new(Vec::new()),
      inode: Mutex::new(None),
    })
  }

  /// Attaches a new child, replacing any existing child of the same name.
  pub fn add_child(self: &Arc<Self>, name: &str, ino: u64, kind: EntryKind) -> Arc<Dentry> {
    let child = Arc::new(Dentry {
      name: name.to_string(),
      meta: EntryMeta::new(ino, kind, name),
      parent: Arc::downgrade(self),
      children: Mutex::new(Vec::new()),
      inode: Mutex::new(None),
    });
    let mut children = self.children.lock();
    children.retain(|c| c.name != name);
    children.push(child.clone());
    child
  }

  pub fn child(&self, name: &str) -> Option<Arc<Dentry>> {
    self.children.lock().iter().find(|c| c.name == name).cloned()
  }

  pub fn children(&self) -> Vec<Arc<Dentry>> {
    self.children.lock().clone()
  }

  pub fn parent(&self) -> Option<Arc<Dentry>> {
    self.parent.upgrade()
  }

  pub fn inode(&self) -> Option<InodeRef> {
    self.inode.lock().clone()
  }

  pub fn set_inode(&self, inode: InodeRef) {
    *self.inode.lock() = Some(inode);
  }
}

/// Resolves an absolute path against the in-memory tree.
pub fn lookup_path(fs: &Filesystem, path: &str) -> Result<Arc<Dentry>> {
  if !path.starts_with('/') {
    return Err(Error::NotFound(path.to_string()));
  }

  let mut dentry = fs.root.clone();
  for component in path.split('/').filter(|c| !c.is_empty() && *c != ".") {
    dentry = if component == ".." {
      dentry.parent().unwrap_or(dentry)
    } else {
      match dentry.child(component) {
        Some(child) => child,
        None => return Err(Error::NotFound(path.to_string())),
      }
    };
  }
  Ok(dentry)
}
