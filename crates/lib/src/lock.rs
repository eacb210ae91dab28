//! One-run-at-a-time advisory lock on a workspace.
//!
//! Builds take an exclusive lock on `<root>/.lock` and record who holds it;
//! read-only commands take a shared lock. The lock is released when the
//! [`WorkspaceLock`] is dropped.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::consts::APP_NAME;

const LOCK_FILENAME: &str = ".lock";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
  Shared,
  Exclusive,
}

/// Holder information written into the lock file by exclusive holders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockHolder {
  pub pid: u32,
  pub command: String,
  pub started_at_unix: u64,
  pub workspace: PathBuf,
}

#[derive(Debug, Error)]
pub enum LockError {
  #[error(
    "workspace is in use by `{command}` (PID {pid}, started at unix time {started_at_unix})\n\
     if no {app} process is running, remove {}", lock_path.display(), app = APP_NAME
  )]
  Contention {
    command: String,
    pid: u32,
    started_at_unix: u64,
    lock_path: PathBuf,
  },

  #[error("workspace is in use by another process\nif no {app} process is running, remove {}", lock_path.display(), app = APP_NAME)]
  ContentionUnknown { lock_path: PathBuf },

  #[error("failed to open lock file {}: {source}", lock_path.display())]
  Open {
    lock_path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to lock {}: {source}", lock_path.display())]
  Lock {
    lock_path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to record lock holder: {0}")]
  WriteHolder(#[source] io::Error),
}

pub struct WorkspaceLock {
  file: File,
  lock_path: PathBuf,
  mode: LockMode,
}

impl WorkspaceLock {
  /// Takes the lock on `root`, failing immediately if it is held in a
  /// conflicting mode.
  pub fn acquire(root: &Path, mode: LockMode, command: &str) -> Result<Self, LockError> {
    let lock_path = root.join(LOCK_FILENAME);
    let open_error = |source| LockError::Open {
      lock_path: lock_path.clone(),
      source,
    };

    std::fs::create_dir_all(root).map_err(open_error)?;
    let file = OpenOptions::new()
      .read(true)
      .write(true)
      .create(true)
      .truncate(false)
      .open(&lock_path)
      .map_err(open_error)?;

    if let Err(err) = try_lock(&file, mode) {
      if err.kind() == io::ErrorKind::WouldBlock {
        return Err(contention(&lock_path));
      }
      return Err(LockError::Lock { lock_path, source: err });
    }

    if mode == LockMode::Exclusive {
      write_holder(&file, command, root).map_err(LockError::WriteHolder)?;
    }

    debug!(path = %lock_path.display(), ?mode, "workspace locked");
    Ok(Self { file, lock_path, mode })
  }

  pub fn lock_path(&self) -> &Path {
    &self.lock_path
  }

  pub fn mode(&self) -> LockMode {
    self.mode
  }

  /// Reads the holder record through the held handle.
  pub fn holder(&self) -> io::Result<LockHolder> {
    let mut file = &self.file;
    file.seek(SeekFrom::Start(0))?;
    let mut contents = String::new();
    file.read_to_string(&mut contents)?;
    serde_json::from_str(&contents).map_err(io::Error::other)
  }
}

fn write_holder(file: &File, command: &str, root: &Path) -> io::Result<()> {
  let holder = LockHolder {
    pid: std::process::id(),
    command: command.to_string(),
    started_at_unix: SystemTime::now()
      .duration_since(UNIX_EPOCH)
      .unwrap_or_default()
      .as_secs(),
    workspace: root.to_path_buf(),
  };

  file.set_len(0)?;
  let mut writer = io::BufWriter::new(file);
  writer.seek(SeekFrom::Start(0))?;
  serde_json::to_writer_pretty(&mut writer, &holder).map_err(io::Error::other)?;
  writer.flush()
}

fn contention(lock_path: &Path) -> LockError {
  let holder = std::fs::read_to_string(lock_path)
    .ok()
    .and_then(|contents| serde_json::from_str::<LockHolder>(&contents).ok());

  match holder {
    Some(holder) => LockError::Contention {
      command: holder.command,
      pid: holder.pid,
      started_at_unix: holder.started_at_unix,
      lock_path: lock_path.to_path_buf(),
    },
    None => LockError::ContentionUnknown {
      lock_path: lock_path.to_path_buf(),
    },
  }
}

#[cfg(unix)]
fn try_lock(file: &File, mode: LockMode) -> io::Result<()> {
  use rustix::fs::{FlockOperation, flock};
  use std::os::unix::io::AsFd;

  let operation = match mode {
    LockMode::Shared => FlockOperation::NonBlockingLockShared,
    LockMode::Exclusive => FlockOperation::NonBlockingLockExclusive,
  };

  flock(file.as_fd(), operation).map_err(|e| io::Error::from_raw_os_error(e.raw_os_error()))
}

#[cfg(windows)]
fn try_lock(file: &File, mode: LockMode) -> io::Result<()> {
  use std::os::windows::io::AsRawHandle;
  use windows_sys::Win32::Foundation::HANDLE;
  use windows_sys::Win32::Storage::FileSystem::{LOCKFILE_EXCLUSIVE_LOCK, LOCKFILE_FAIL_IMMEDIATELY, LockFileEx};

  let handle = file.as_raw_handle() as HANDLE;
  let flags = match mode {
    LockMode::Shared => LOCKFILE_FAIL_IMMEDIATELY,
    LockMode::Exclusive => LOCKFILE_FAIL_IMMEDIATELY | LOCKFILE_EXCLUSIVE_LOCK,
  };

  // SAFETY: a zeroed OVERLAPPED is valid and the handle stays open for the call.
  let result = unsafe {
    let mut overlapped = std::mem::zeroed();
    LockFileEx(handle, flags, 0, 1, 0, &mut overlapped)
  };

  if result == 0 {
    // ERROR_LOCK_VIOLATION does not map to WouldBlock on its own.
    let err = io::Error::last_os_error();
    if err.raw_os_error() == Some(33) {
      return Err(io::Error::new(io::ErrorKind::WouldBlock, err));
    }
    Err(err)
  } else {
    Ok(())
  }
}
