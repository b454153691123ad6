mod common;

use kfs::*;
use common::{SMALL, format, mount};

#[test]
fn failed_extend_leaves_the_store_untouched() {
  let volume = format(&SMALL);
  let fs = mount(&volume);
  let size = volume.len();
  volume.faults.lock().fail_grow = true;

  match alloc_block(&fs) {
    Err(err) => assert_eq!(err.errno(), libc::EIO),
    Ok(block) => panic!("allocated block {} without space", block),
  }
  assert_eq!(volume.len(), size);
  assert_eq!(fs.superblock().dbg_num, 0);
  assert!(fs.data_groups.read().is_empty());
  assert!(fs.is_ok());

  volume.faults.lock().fail_grow = false;
  assert_eq!(alloc_block(&fs).unwrap(), 0);
}

#[test]
fn failed_descriptor_write_rolls_growth_back() {
  let volume = format(&SMALL);
  let fs = mount(&volume);
  let size = volume.len();
  volume.faults.lock().fail_writes_from = Some(size);

  assert!(alloc_block(&fs).is_err());
  assert_eq!(volume.len(), size);
  assert_eq!(fs.filesize.load(std::sync::atomic::Ordering::SeqCst), size);
  assert_eq!(fs.superblock().dbg_num, 0);
  assert!(fs.is_ok());

  volume.faults.lock().fail_writes_from = None;
  assert_eq!(alloc_block(&fs).unwrap(), 0);
  unmount_fs(&fs).unwrap();
  drop(fs);
  assert_eq!(mount(&volume).superblock().dbg_num, 1);
}

#[test]
fn failed_rollback_marks_the_filesystem_errored() {
  let volume = format(&SMALL);
  let fs = mount(&volume);
  let size = volume.len();
  {
    let mut faults = volume.faults.lock();
    faults.fail_writes_from = Some(size);
    faults.fail_shrink = true;
  }

  assert!(alloc_inode_in_new_group(&fs).is_err());
  assert!(!fs.is_ok());
  assert!(volume.len() > size);
  assert_eq!(fs.superblock().ibg_num, 1);
}

fn alloc_inode_in_new_group(fs: &Filesystem) -> Result<u64> {
  let ipg = fs.layout.inode_units_per_group();
  for _ in 1..ipg {
    alloc_inode(fs)?;
  }
  Ok(alloc_inode(fs)?.ino)
}

#[test]
fn short_inode_write_keeps_the_inode_dirty() {
  let volume = format(&SMALL);
  let fs = mount(&volume);
  let ino = {
    let mut inode = alloc_inode(&fs).unwrap();
    inode.node.size = 99;
    inode.ino
  };
  volume.faults.lock().short_writes = true;

  match sync_fs(&fs) {
    Err(Error::ShortWrite { what, expected, actual, .. }) => {
      assert_eq!(what, "inode");
      assert_eq!(expected, INODE_SIZE as usize);
      assert_eq!(actual, INODE_SIZE as usize / 2);
    },
    other => panic!("expected a short write, got {:?}", other),
  }
  assert!(get_inode(&fs, ino).unwrap().dirty);
  assert!(fs.is_dirty());

  volume.faults.lock().short_writes = false;
  sync_fs(&fs).unwrap();
  assert!(!get_inode(&fs, ino).unwrap().dirty);
  assert!(!fs.is_dirty());

  unmount_fs(&fs).unwrap();
  drop(fs);
  assert_eq!(get_inode_attr(&mount(&volume), ino).unwrap().size, 99);
}

#[test]
fn failed_sync_is_retried_at_unmount() {
  let volume = format(&SMALL);
  let fs = mount(&volume);
  sync_fs(&fs).unwrap();
  alloc_inode(&fs).unwrap();

  volume.faults.lock().fail_writes_from = Some(0);
  assert!(sync_fs(&fs).is_err());
  assert!(fs.is_dirty());

  volume.faults.lock().fail_writes_from = None;
  unmount_fs(&fs).unwrap();
  drop(fs);
  assert_eq!(mount(&volume).superblock().iused, 2);
}

#[test]
fn unmount_reports_flush_failure_but_completes() {
  let volume = format(&SMALL);
  let fs = mount(&volume);
  volume.faults.lock().fail_writes_from = Some(0);

  assert!(unmount_fs(&fs).is_err());
  assert_eq!(fs.mount_state(), MountState::Unmounted);
  // A second unmount has nothing left to do.
  assert!(unmount_fs(&fs).is_ok());
}

#[test]
fn unreadable_inode_is_evicted_and_retried() {
  let volume = format(&SMALL);
  let fs = mount(&volume);
  let ino = alloc_inode(&fs).unwrap().ino;
  unmount_fs(&fs).unwrap();
  drop(fs);

  let fs = mount(&volume);
  let offset = fs.layout.inode_offset(fs.group_offset(GroupKind::Inode, 0).unwrap(), ino);
  let full_len = volume.len();
  // Cut the store inside the inode record; the mount already happened.
  volume.truncate(offset + 10);
  match get_inode(&fs, ino) {
    Err(Error::ShortRead { what: "inode", .. }) => {},
    other => panic!("expected a short read, got {:?}", other.map(|i| i.ino)),
  }

  volume.set_size(full_len).unwrap();
  assert_eq!(get_inode(&fs, ino).unwrap().ino, ino);
}
