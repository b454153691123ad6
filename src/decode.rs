use time::Timespec;
use crate::defs::*;
use crate::error::{Error, Result};

pub fn decode_superblock(bytes: &[u8]) -> Result<Superblock> {
  assert!(bytes.len() >= Superblock::ENCODED_LEN);
  let magic = decode_u32(&bytes[0..]);
  let version = decode_u32(&bytes[4..]);

  if magic != SUPERBLOCK_MAGIC {
    return Err(Error::BadMagic { found: magic, expected: SUPERBLOCK_MAGIC });
  }

  if version != SUPERBLOCK_VERSION {
    return Err(Error::BadVersion { found: version, expected: SUPERBLOCK_VERSION });
  }

  Ok(Superblock {
    magic: magic,
    version: version,
    dbg_size: decode_u32(&bytes[8..]),
    ibg_size: decode_u32(&bytes[12..]),
    bused: decode_u64(&bytes[16..]),
    iused: decode_u64(&bytes[24..]),
    dbg_num: decode_u64(&bytes[32..]),
    ibg_num: decode_u64(&bytes[40..]),
    mount_times: decode_u64(&bytes[48..]),
    umount_times: decode_u64(&bytes[56..]),
    mount_time: decode_timespec(&bytes[64..]),
    umount_time: decode_timespec(&bytes[80..]),
  })
}

pub fn decode_group_desc(bytes: &[u8]) -> Result<GroupDesc> {
  assert!(bytes.len() >= GroupDesc::ENCODED_LEN);
  let code = decode_u32(&bytes[0..]);
  let kind = match GroupKind::from_code(code) {
    Some(kind) => kind,
    None => return Err(Error::Corrupt(
        format!("unknown block group kind {}", code))),
  };
  Ok(GroupDesc { kind: kind, used: decode_u32(&bytes[4..]) })
}

pub fn decode_node(bytes: &[u8]) -> Node {
  assert!(bytes.len() >= INODE_SIZE as usize);
  let mut direct = [0; DIRECT_BLOCKS];
  for i in 0..DIRECT_BLOCKS {
    direct[i] = decode_u64(&bytes[128 + 8*i..]);
  }

  Node {
    size: decode_u64(&bytes[0..]),
    uid: decode_u32(&bytes[8..]),
    gid: decode_u32(&bytes[12..]),
    mode: decode_u32(&bytes[16..]),
    nlink: decode_u32(&bytes[20..]),
    atime: decode_u32(&bytes[24..]),
    ctime: decode_u32(&bytes[28..]),
    mtime: decode_u32(&bytes[32..]),
    btime: decode_u32(&bytes[36..]),
    direct: direct,
    indirect: decode_u64(&bytes[248..]),
  }
}

fn decode_timespec(bytes: &[u8]) -> Timespec {
  Timespec::new(decode_u64(&bytes[0..]) as i64, decode_u64(&bytes[8..]) as i32)
}

pub fn decode_u32(bytes: &[u8]) -> u32 {
  (bytes[0] as u32) +
  ((bytes[1] as u32) << 8) +
  ((bytes[2] as u32) << 16) +
  ((bytes[3] as u32) << 24)
}

pub fn decode_u64(bytes: &[u8]) -> u64 {
  (decode_u32(&bytes[0..]) as u64) +
  ((decode_u32(&bytes[4..]) as u64) << 32)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::encode::*;

  #[test]
  fn integers_are_little_endian() {
    assert_eq!(decode_u32(&[0x78, 0x56, 0x34, 0x12]), 0x12345678);
    assert_eq!(decode_u64(&[1, 0, 0, 0, 2, 0, 0, 0]), (2 << 32) + 1);
  }

  #[test]
  fn superblock_fields_sit_at_packed_offsets() {
    let mut sb = Superblock::new(1 << 20, 64 << 20);
    sb.iused = 7;
    sb.ibg_num = 3;
    sb.umount_time = Timespec::new(1_500_000_000, 42);
    let mut bytes = vec![0; SUPERBLOCK_SIZE as usize];
    encode_superblock(&sb, &mut bytes[..]);

    assert_eq!(decode_u32(&bytes[0..]), SUPERBLOCK_MAGIC);
    assert_eq!(decode_u32(&bytes[8..]), 64 << 20);
    assert_eq!(decode_u32(&bytes[12..]), 1 << 20);
    assert_eq!(decode_u64(&bytes[24..]), 7);
    assert_eq!(decode_u64(&bytes[40..]), 3);
    assert_eq!(decode_u64(&bytes[80..]), 1_500_000_000);
    assert!(bytes[96..].iter().all(|&b| b == 0));
    assert_eq!(decode_superblock(&bytes[..]).unwrap(), sb);
  }

  #[test]
  fn superblock_with_wrong_magic_is_rejected() {
    let mut bytes = vec![0; SUPERBLOCK_SIZE as usize];
    encode_superblock(&Superblock::new(1 << 20, 1 << 20), &mut bytes[..]);
    bytes[0] ^= 0xff;
    match decode_superblock(&bytes[..]) {
      Err(Error::BadMagic { .. }) => {},
      other => panic!("expected bad magic, got {:?}", other),
    }
  }

  #[test]
  fn superblock_with_wrong_version_is_rejected() {
    let mut bytes = vec![0; SUPERBLOCK_SIZE as usize];
    encode_superblock(&Superblock::new(1 << 20, 1 << 20), &mut bytes[..]);
    encode_u32(SUPERBLOCK_VERSION + 1, &mut bytes[4..]);
    match decode_superblock(&bytes[..]) {
      Err(Error::BadVersion { found, .. }) => assert_eq!(found, SUPERBLOCK_VERSION + 1),
      other => panic!("expected bad version, got {:?}", other),
    }
  }

  #[test]
  fn unknown_group_kind_is_corruption() {
    let bytes = [9, 0, 0, 0, 0, 0, 0, 0];
    assert!(decode_group_desc(&bytes[..]).is_err());
    let bytes = [2, 0, 0, 0, 5, 0, 0, 0];
    let desc = decode_group_desc(&bytes[..]).unwrap();
    assert_eq!(desc, GroupDesc { kind: GroupKind::Data, used: 5 });
  }

  #[test]
  fn node_layout_fills_a_256_byte_slot() {
    let mut node = Node::default();
    node.size = 4097;
    node.mode = ROOT_MODE;
    node.btime = 99;
    node.direct[14] = 0xdead;
    node.indirect = 0xbeef;
    let mut bytes = vec![0xaa; INODE_SIZE as usize];
    encode_node(&node, &mut bytes[..]);

    assert_eq!(decode_u32(&bytes[16..]), ROOT_MODE);
    assert_eq!(decode_u32(&bytes[36..]), 99);
    assert!(bytes[40..128].iter().all(|&b| b == 0));
    assert_eq!(decode_u64(&bytes[128 + 14*8..]), 0xdead);
    assert_eq!(decode_u64(&bytes[248..]), 0xbeef);
    assert_eq!(decode_node(&bytes[..]), node);
  }
}
