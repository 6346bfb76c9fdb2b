//! Unit tests for the instance lock.
//!
//! The lock file is opened without truncation, so a second process that fails
//! to take the lock must leave the owner's PID in place.

use fs2::FileExt;
use serial_test::serial;
use std::fs::{self, OpenOptions};
use tempfile::tempdir;

use dimmerd::constants::LOCK_FILE_NAME;
use dimmerd::daemon::{InstanceLock, lock_path};

fn own_pid() -> String {
    std::process::id().to_string()
}

#[test]
#[serial]
fn test_lock_records_pid() {
    let temp_dir = tempdir().unwrap();
    let path = temp_dir.path().join(LOCK_FILE_NAME);

    let lock = InstanceLock::acquire(&path).unwrap();
    assert_eq!(lock.path(), path.as_path());
    assert_eq!(fs::read_to_string(&path).unwrap().trim(), own_pid());
    lock.release();
}

#[test]
#[serial]
fn test_second_acquire_fails_and_preserves_owner() {
    let temp_dir = tempdir().unwrap();
    let path = temp_dir.path().join(LOCK_FILE_NAME);

    let lock = InstanceLock::acquire(&path).unwrap();
    let err = InstanceLock::acquire(&path).unwrap_err();
    let message = err.to_string();
    assert!(message.contains("already running"));
    assert!(message.contains(&own_pid()));

    assert_eq!(fs::read_to_string(&path).unwrap().trim(), own_pid());
    lock.release();
}

#[test]
#[serial]
fn test_release_removes_file_and_allows_reacquire() {
    let temp_dir = tempdir().unwrap();
    let path = temp_dir.path().join(LOCK_FILE_NAME);

    InstanceLock::acquire(&path).unwrap().release();
    assert!(!path.exists());

    let lock = InstanceLock::acquire(&path).unwrap();
    assert!(path.exists());
    lock.release();
}

#[test]
#[serial]
fn test_stale_lock_file_is_reused() {
    let temp_dir = tempdir().unwrap();
    let path = temp_dir.path().join(LOCK_FILE_NAME);
    // Left behind by a crashed process: content present, no lock held
    fs::write(&path, "999999\nleftover\n").unwrap();

    let lock = InstanceLock::acquire(&path).unwrap();
    assert_eq!(fs::read_to_string(&path).unwrap(), format!("{}\n", own_pid()));
    lock.release();
}

#[test]
#[serial]
fn test_lock_held_by_foreign_handle() {
    let temp_dir = tempdir().unwrap();
    let path = temp_dir.path().join(LOCK_FILE_NAME);

    let foreign = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(&path)
        .unwrap();
    foreign.try_lock_exclusive().unwrap();

    let err = InstanceLock::acquire(&path).unwrap_err();
    // Empty file: no PID to report
    assert_eq!(err.to_string(), "Another instance of dimmerd is already running");

    FileExt::unlock(&foreign).unwrap();
    InstanceLock::acquire(&path).unwrap().release();
}

#[test]
#[serial]
fn test_lock_path_uses_runtime_dir() {
    let temp_dir = tempdir().unwrap();
    let original = std::env::var("XDG_RUNTIME_DIR").ok();
    unsafe {
        std::env::set_var("XDG_RUNTIME_DIR", temp_dir.path());
    }

    let path = lock_path();

    unsafe {
        match original {
            Some(val) => std::env::set_var("XDG_RUNTIME_DIR", val),
            None => std::env::remove_var("XDG_RUNTIME_DIR"),
        }
    }

    assert_eq!(path, temp_dir.path().join(LOCK_FILE_NAME));
}
