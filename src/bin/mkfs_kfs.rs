//! mkfs_kfs - create an empty KFS store
//!
//! Usage:
//!   mkfs_kfs store.img                 # 1M inode groups, 64M data groups
//!   mkfs_kfs -i 4 -b 16 store.img      # 4M inode groups, 16M data groups
use std::path::PathBuf;
use std::process;
use clap::Parser;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "mkfs_kfs", version)]
#[command(about = "Create a KFS store")]
struct Args {
  /// File to create the store in; must not exist
  file: PathBuf,

  /// Inode group payload size in MiB
  #[arg(short, long, default_value_t = kfs::DEFAULT_INODE_GROUP_SIZE >> 20)]
  inode_group_size: u32,

  /// Data group payload size in MiB
  #[arg(short = 'b', long, default_value_t = kfs::DEFAULT_DATA_GROUP_SIZE >> 20)]
  data_group_size: u32,

  /// Log filter, overridden by RUST_LOG
  #[arg(short, long, default_value = "info")]
  log_level: String,
}

fn main() {
  let args = Args::parse();
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env()
      .unwrap_or_else(|_| EnvFilter::new(&args.log_level)))
    .with_writer(std::io::stderr)
    .init();

  let options = kfs::MkfsOptions {
    inode_group_size: args.inode_group_size.saturating_mul(1 << 20),
    data_group_size: args.data_group_size.saturating_mul(1 << 20),
  };
  if let Err(err) = kfs::make_fs(&args.file, &options) {
    eprintln!("mkfs_kfs: {}: {}", args.file.display(), err);
    process::exit(1);
  }
}
