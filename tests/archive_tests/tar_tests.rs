//! Tests for TarArchive
//!
//! These tests verify:
//! - Entries written through the Archive trait read back by key
//! - Reopening for write appends after the existing entries
//! - Output is a plain tar stream readable by the `tar` crate
//! - Mode and lookup errors
//! - A size-hint mismatch leaves no partial entry behind

use std::fs::File;

use stackfile::archive::Archive;
use stackfile::error::StackError;
use stackfile::store::OpenFlags;
use stackfile::tar_archive::TarArchive;
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn create_with(temp_dir: &TempDir, entries: &[(&str, &[u8])]) -> TarArchive {
    let mut tar = TarArchive::new(temp_dir.path().join("test.tar"));
    tar.open(OpenFlags::WRITE | OpenFlags::CREATE).unwrap();
    for (key, payload) in entries {
        tar.write(key, Some(payload.len() as u64), &mut &payload[..]).unwrap();
    }
    tar.close().unwrap();
    tar
}

fn read_key(tar: &TarArchive, key: &str) -> Vec<u8> {
    let mut out = Vec::new();
    tar.read(key, Some(&mut out)).unwrap();
    out
}

// =============================================================================
// Round-trip Tests
// =============================================================================

#[test]
fn test_tar_roundtrip() {
    let temp_dir = TempDir::new().unwrap();
    let mut tar = create_with(&temp_dir, &[("a.txt", b"hello"), ("dir/b.bin", &[0, 1, 2])]);

    tar.open(OpenFlags::READ).unwrap();
    assert_eq!(tar.keys().unwrap(), vec!["a.txt", "dir/b.bin"]);
    assert_eq!(read_key(&tar, "a.txt"), b"hello");
    assert_eq!(read_key(&tar, "dir/b.bin"), vec![0, 1, 2]);
    // Repeated reads rescan from the start
    assert_eq!(read_key(&tar, "a.txt"), b"hello");
    tar.close().unwrap();
}

#[test]
fn test_tar_write_without_size_hint() {
    let temp_dir = TempDir::new().unwrap();
    let mut tar = TarArchive::new(temp_dir.path().join("test.tar"));
    tar.open(OpenFlags::WRITE | OpenFlags::CREATE).unwrap();
    let written = tar.write("streamed", None, &mut &b"no hint given"[..]).unwrap();
    assert_eq!(written, 13);
    tar.close().unwrap();

    tar.open(OpenFlags::READ).unwrap();
    assert_eq!(read_key(&tar, "streamed"), b"no hint given");
}

#[test]
fn test_tar_append_session() {
    let temp_dir = TempDir::new().unwrap();
    let mut tar = create_with(&temp_dir, &[("first", b"1")]);

    tar.open(OpenFlags::WRITE).unwrap();
    tar.write("second", Some(1), &mut &b"2"[..]).unwrap();
    tar.close().unwrap();

    tar.open(OpenFlags::READ).unwrap();
    assert_eq!(tar.keys().unwrap(), vec!["first", "second"]);
    assert_eq!(read_key(&tar, "second"), b"2");
}

#[test]
fn test_tar_is_plain_tar() {
    let temp_dir = TempDir::new().unwrap();
    let tar = create_with(&temp_dir, &[("plain.txt", b"readable anywhere")]);

    let mut archive = tar::Archive::new(File::open(tar.path()).unwrap());
    let mut names = Vec::new();
    for entry in archive.entries().unwrap() {
        let entry = entry.unwrap();
        assert_eq!(entry.header().size().unwrap(), 17);
        names.push(entry.path().unwrap().to_string_lossy().into_owned());
    }
    assert_eq!(names, vec!["plain.txt"]);
}

// =============================================================================
// Error Tests
// =============================================================================

#[test]
fn test_tar_missing_entry() {
    let temp_dir = TempDir::new().unwrap();
    let mut tar = create_with(&temp_dir, &[("a", b"a")]);
    tar.open(OpenFlags::READ).unwrap();

    let err = tar.read("b", None).unwrap_err();
    assert!(matches!(err, StackError::TarEntryNotFound(ref k) if k == "b"));
    assert_eq!(err.code(), 13001);
}

#[test]
fn test_tar_mode_errors() {
    let temp_dir = TempDir::new().unwrap();
    let mut tar = TarArchive::new(temp_dir.path().join("test.tar"));

    assert!(matches!(tar.open(OpenFlags::READ), Err(StackError::OpenFailed(_))));
    assert!(matches!(tar.open(OpenFlags::WRITE), Err(StackError::OpenFailed(_))));
    assert!(matches!(
        tar.open(OpenFlags::READ | OpenFlags::WRITE),
        Err(StackError::ConflictingFlags)
    ));
    assert!(matches!(tar.keys(), Err(StackError::NotOpen)));

    tar.open(OpenFlags::WRITE | OpenFlags::CREATE).unwrap();
    assert!(matches!(tar.read("x", None), Err(StackError::NotReadable)));
    tar.close().unwrap();

    tar.open(OpenFlags::READ).unwrap();
    assert!(matches!(
        tar.write("x", Some(1), &mut &b"x"[..]),
        Err(StackError::NotWritable)
    ));
}

#[test]
fn test_tar_size_hint_mismatch() {
    let temp_dir = TempDir::new().unwrap();
    let mut tar = TarArchive::new(temp_dir.path().join("test.tar"));
    tar.open(OpenFlags::WRITE | OpenFlags::CREATE).unwrap();
    assert!(matches!(
        tar.write("k", Some(2), &mut &b"abcd"[..]),
        Err(StackError::WriteSizeMismatch { expected: 2, actual: 3 })
    ));
}

#[test]
fn test_tar_short_source_leaves_no_entry() {
    let temp_dir = TempDir::new().unwrap();
    let mut tar = TarArchive::new(temp_dir.path().join("test.tar"));
    tar.open(OpenFlags::WRITE | OpenFlags::CREATE).unwrap();
    tar.write("before", Some(3), &mut &b"one"[..]).unwrap();
    assert!(matches!(
        tar.write("short", Some(10), &mut &b"abc"[..]),
        Err(StackError::WriteSizeMismatch { expected: 10, actual: 3 })
    ));
    assert!(matches!(
        tar.write("long", Some(2), &mut &b"abcd"[..]),
        Err(StackError::WriteSizeMismatch { .. })
    ));
    tar.write("after", Some(3), &mut &b"two"[..]).unwrap();
    tar.close().unwrap();

    tar.open(OpenFlags::READ).unwrap();
    assert_eq!(tar.keys().unwrap(), vec!["before", "after"]);
    assert_eq!(read_key(&tar, "before"), b"one");
    assert_eq!(read_key(&tar, "after"), b"two");

    // Still a valid tar stream for other readers
    let mut plain = tar::Archive::new(File::open(temp_dir.path().join("test.tar")).unwrap());
    assert_eq!(plain.entries().unwrap().count(), 2);
}
