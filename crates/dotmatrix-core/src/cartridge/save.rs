use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, TryLockError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{self as cb, RecvTimeoutError};
use log::{debug, warn};

pub const DEFAULT_SAVE_INTERVAL: Duration = Duration::from_secs(1);

type Slot = Arc<Mutex<Option<Vec<u8>>>>;

/// Background writer for battery-backed cartridge RAM.
///
/// The emulation thread hands over snapshots with [`SaveFlusher::publish`],
/// which never blocks. The worker wakes once per interval and writes the most
/// recent snapshot, if any. Dropping the flusher stops the worker after a
/// final flush.
pub struct SaveFlusher {
    pending: Slot,
    stop: cb::Sender<()>,
    handle: Option<JoinHandle<()>>,
    path: PathBuf,
}

impl SaveFlusher {
    pub fn spawn(path: PathBuf, interval: Duration) -> Self {
        let pending: Slot = Arc::new(Mutex::new(None));
        let (stop, stop_rx) = cb::bounded::<()>(1);

        let worker_slot = Arc::clone(&pending);
        let worker_path = path.clone();
        let handle = thread::Builder::new()
            .name("save-flush".into())
            .spawn(move || {
                debug!("Save flusher started for {}", worker_path.display());
                loop {
                    match stop_rx.recv_timeout(interval) {
                        Err(RecvTimeoutError::Timeout) => flush_pending(&worker_slot, &worker_path),
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                            flush_pending(&worker_slot, &worker_path);
                            break;
                        }
                    }
                }
                debug!("Save flusher stopped for {}", worker_path.display());
            });

        let handle = match handle {
            Ok(handle) => Some(handle),
            Err(e) => {
                warn!("Could not start save flusher: {e}; saves will only be written on exit");
                None
            }
        };

        Self {
            pending,
            stop,
            handle,
            path,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Offers a RAM snapshot to the worker. Returns false if the worker was
    /// holding the slot at that instant; the caller should retry later.
    pub fn publish(&self, data: Vec<u8>) -> bool {
        match self.pending.try_lock() {
            Ok(mut slot) => {
                *slot = Some(data);
                true
            }
            Err(TryLockError::Poisoned(poisoned)) => {
                *poisoned.into_inner() = Some(data);
                true
            }
            Err(TryLockError::WouldBlock) => false,
        }
    }
}

impl Drop for SaveFlusher {
    fn drop(&mut self) {
        let _ = self.stop.send(());
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("Save flusher for {} panicked", self.path.display());
            }
        } else {
            flush_pending(&self.pending, &self.path);
        }
    }
}

fn flush_pending(slot: &Slot, path: &Path) {
    let data = match slot.lock() {
        Ok(mut guard) => guard.take(),
        Err(poisoned) => poisoned.into_inner().take(),
    };
    if let Some(data) = data {
        if let Err(e) = write_save(path, &data) {
            warn!("Error saving cartridge RAM to {}: {e}", path.display());
        }
    }
}

/// Writes save data next to the ROM, replacing the previous file atomically.
pub fn write_save(path: &Path, data: &[u8]) -> io::Result<()> {
    if data.is_empty() {
        return Ok(());
    }
    let tmp = path.with_extension("sav.tmp");
    fs::write(&tmp, data)?;
    fs::rename(&tmp, path).or_else(|_| {
        // On Windows rename can fail if the destination already exists.
        let _ = fs::remove_file(path);
        fs::rename(&tmp, path)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn drop_flushes_last_snapshot() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("game.sav");

        let flusher = SaveFlusher::spawn(path.clone(), Duration::from_secs(60));
        assert!(flusher.publish(vec![1, 2, 3]));
        assert!(flusher.publish(vec![4, 5, 6]));
        drop(flusher);

        assert_eq!(fs::read(&path).unwrap(), vec![4, 5, 6]);
    }

    #[test]
    fn interval_flush_runs_while_alive() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tick.sav");

        let flusher = SaveFlusher::spawn(path.clone(), Duration::from_millis(10));
        assert!(flusher.publish(vec![0xAA; 4]));

        let mut written = false;
        for _ in 0..200 {
            if fs::read(&path).is_ok_and(|data| data == vec![0xAA; 4]) {
                written = true;
                break;
            }
            thread::sleep(Duration::from_millis(10));
        }
        assert!(written, "save flusher never wrote the snapshot");
        drop(flusher);
    }

    #[test]
    fn write_errors_are_not_fatal() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing").join("game.sav");
        let flusher = SaveFlusher::spawn(path.clone(), Duration::from_secs(60));
        flusher.publish(vec![1]);
        drop(flusher);
        assert!(!path.exists());
    }
}
