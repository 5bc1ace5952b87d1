//! Cross-process exclusion over a ledger directory.
//!
//! Two runs against the same target would race between the version gate and
//! the ledger append. A [`LedgerLock`] held for the length of a build keeps
//! them apart. The lock file records who holds it so a refused run can say
//! which process to wait for.

use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use thiserror::Error;

const LOCK_FILENAME: &str = ".lock";

/// Who holds a ledger, as written into the lock file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockHolder {
  /// Target whose ledger is locked, as shown to the user.
  pub target: String,
  /// Operation running against the target, e.g. `build`.
  pub operation: String,
  pub pid: u32,
  /// Unix timestamp (seconds) at which the lock was taken.
  pub acquired_at: u64,
}

impl LockHolder {
  fn current(target: &str, operation: &str) -> Self {
    Self {
      target: target.to_string(),
      operation: operation.to_string(),
      pid: std::process::id(),
      acquired_at: SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs(),
    }
  }

  fn since(&self) -> String {
    humantime::format_rfc3339_seconds(UNIX_EPOCH + Duration::from_secs(self.acquired_at)).to_string()
  }
}

#[derive(Debug, Error)]
pub enum LedgerLockError {
  #[error(
    "ledger for {} is busy: {} running in pid {} since {}\n\
     remove {} if that process no longer exists",
    .holder.target, .holder.operation, .holder.pid, .holder.since(), .lock_path.display()
  )]
  Busy { holder: LockHolder, lock_path: PathBuf },

  #[error("ledger is busy and its holder is unknown\nremove {} if no run is active", .lock_path.display())]
  BusyUnknownHolder { lock_path: PathBuf },

  #[error("cannot open ledger lock {}: {source}", .lock_path.display())]
  Open {
    lock_path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("cannot lock ledger: {0}")]
  Lock(#[source] io::Error),

  #[error("cannot record lock holder: {0}")]
  Record(#[source] io::Error),
}

/// Exclusive lock over one target's ledger directory, released on drop.
pub struct LedgerLock {
  file: File,
  lock_path: PathBuf,
}

impl LedgerLock {
  /// Take the lock for `operation` on `target` without blocking.
  ///
  /// Fails with [`LedgerLockError::Busy`] while another run holds it.
  pub fn acquire(ledger_dir: &Path, target: &str, operation: &str) -> Result<Self, LedgerLockError> {
    let lock_path = ledger_dir.join(LOCK_FILENAME);
    let open_error = |source| LedgerLockError::Open {
      lock_path: lock_path.clone(),
      source,
    };

    std::fs::create_dir_all(ledger_dir).map_err(open_error)?;
    let file = OpenOptions::new()
      .read(true)
      .write(true)
      .create(true)
      .truncate(false)
      .open(&lock_path)
      .map_err(open_error)?;

    match try_lock(&file) {
      Ok(()) => {}
      Err(err) if err.kind() == io::ErrorKind::WouldBlock => return Err(busy(&lock_path)),
      Err(err) => return Err(LedgerLockError::Lock(err)),
    }

    let lock = LedgerLock { file, lock_path };
    lock.record(&LockHolder::current(target, operation))?;
    Ok(lock)
  }

  /// The holder recorded when this lock was taken.
  pub fn holder(&self) -> io::Result<LockHolder> {
    // Reads through the held handle; windows refuses a second one.
    read_holder(&mut &self.file)
  }

  pub fn lock_path(&self) -> &Path {
    &self.lock_path
  }

  fn record(&self, holder: &LockHolder) -> Result<(), LedgerLockError> {
    let mut file = &self.file;
    file.set_len(0).map_err(LedgerLockError::Record)?;
    file.seek(SeekFrom::Start(0)).map_err(LedgerLockError::Record)?;
    serde_json::to_writer(&mut file, holder).map_err(|e| LedgerLockError::Record(e.into()))?;
    file.flush().map_err(LedgerLockError::Record)
  }
}

impl fmt::Debug for LedgerLock {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("LedgerLock").field("lock_path", &self.lock_path).finish()
  }
}

fn read_holder<R: Read + Seek>(file: &mut R) -> io::Result<LockHolder> {
  file.seek(SeekFrom::Start(0))?;
  let mut contents = String::new();
  file.read_to_string(&mut contents)?;
  serde_json::from_str(&contents).map_err(io::Error::other)
}

fn busy(lock_path: &Path) -> LedgerLockError {
  match File::open(lock_path).and_then(|mut file| read_holder(&mut file)) {
    Ok(holder) => LedgerLockError::Busy {
      holder,
      lock_path: lock_path.to_path_buf(),
    },
    Err(_) => LedgerLockError::BusyUnknownHolder {
      lock_path: lock_path.to_path_buf(),
    },
  }
}

#[cfg(unix)]
fn try_lock(file: &File) -> io::Result<()> {
  use rustix::fs::{FlockOperation, flock};
  use std::os::unix::io::AsFd;

  flock(file.as_fd(), FlockOperation::NonBlockingLockExclusive).map_err(io::Error::from)
}

#[cfg(windows)]
fn try_lock(file: &File) -> io::Result<()> {
  use std::os::windows::io::AsRawHandle;
  use windows_sys::Win32::Foundation::HANDLE;
  use windows_sys::Win32::Storage::FileSystem::{LOCKFILE_EXCLUSIVE_LOCK, LOCKFILE_FAIL_IMMEDIATELY, LockFileEx};

  // SAFETY: the handle is owned by `file` and valid for the call. A zeroed
  // OVERLAPPED requests a lock at offset 0.
  let locked = unsafe {
    let mut overlapped = std::mem::zeroed();
    LockFileEx(
      file.as_raw_handle() as HANDLE,
      LOCKFILE_FAIL_IMMEDIATELY | LOCKFILE_EXCLUSIVE_LOCK,
      0,
      1,
      0,
      &mut overlapped,
    )
  };

  if locked == 0 { Err(io::Error::last_os_error()) } else { Ok(()) }
}
