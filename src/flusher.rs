use std::{io, thread};
use std::sync::{Arc, mpsc};
use std::time::Duration;
use crate::fs::{Filesystem, sync_fs};

/// Background thread that periodically writes back dirty state. Stops when
/// dropped.
pub struct Flusher {
  stop: Option<mpsc::Sender<()>>,
  handle: Option<thread::JoinHandle<()>>,
}

impl Flusher {
  pub fn spawn(fs: Arc<Filesystem>, interval: Duration) -> io::Result<Flusher> {
    let (stop_tx, stop_rx) = mpsc::channel();
    let handle = thread::Builder::new()
      .name("kfs-flusher".to_string())
      .spawn(move || run(&fs, interval, stop_rx))?;
    Ok(Flusher { stop: Some(stop_tx), handle: Some(handle) })
  }
}

fn run(fs: &Filesystem, interval: Duration, stop: mpsc::Receiver<()>) {
  tracing::debug!(parent: &fs.span, ?interval, "flusher started");
  loop {
    match stop.recv_timeout(interval) {
      Err(mpsc::RecvTimeoutError::Timeout) => {
        if let Err(err) = sync_fs(fs) {
          tracing::warn!(parent: &fs.span, "periodic sync failed: {}", err);
        }
      },
      Ok(()) | Err(mpsc::RecvTimeoutError::Disconnected) => break,
    }
  }
  tracing::debug!(parent: &fs.span, "flusher stopped");
}

impl Drop for Flusher {
  fn drop(&mut self) {
    drop(self.stop.take());
    if let Some(handle) = self.handle.take() {
      if handle.join().is_err() {
        tracing::error!("flusher thread panicked");
      }
    }
  }
}
