//! kfs_fuse - mount a KFS store through FUSE
//!
//! Usage:
//!   kfs_fuse -f store.img /mnt/kfs
//!   kfs_fuse -f store.img --sync-interval 5 /mnt/kfs
use std::ffi::OsStr;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::time::Duration;
use clap::Parser;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "kfs_fuse", version)]
#[command(about = "Mount a KFS store")]
struct Args {
  /// Store to mount
  #[arg(short, long)]
  file: PathBuf,

  /// Directory to mount the store on
  mountpoint: PathBuf,

  /// Log filter, overridden by RUST_LOG
  #[arg(short, long, default_value = "info")]
  log_level: String,

  /// Write dirty metadata back every SECS seconds
  #[arg(long, value_name = "SECS")]
  sync_interval: Option<u64>,
}

fn main() {
  let args = Args::parse();
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env()
      .unwrap_or_else(|_| EnvFilter::new(&args.log_level)))
    .with_writer(std::io::stderr)
    .init();

  if let Err(err) = run(&args) {
    eprintln!("kfs_fuse: {}", err);
    process::exit(1);
  }
}

fn run(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
  let options = kfs::MountOptions {
    sync_interval: args.sync_interval.filter(|&secs| secs > 0).map(Duration::from_secs),
  };
  let fs = Arc::new(kfs::mount_path(&args.file, options)?);
  let fuse_args: [&OsStr; 2] = [OsStr::new("-o"), OsStr::new("fsname=kfs")];
  fuse::mount(kfs::Fuse::new(fs.clone()), &args.mountpoint, &fuse_args)?;

  // No-op when the destroy request already unmounted.
  kfs::unmount_fs(&fs)?;
  Ok(())
}
