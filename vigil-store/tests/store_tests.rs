//! Store persistence, sharing, idempotence, and rollback.

use std::fs;
use std::thread;
use std::time::{Duration, SystemTime};

use assert_fs::prelude::*;
use filetime::{set_file_mtime, FileTime};
use predicates::prelude::predicate;
use serde::{Serialize, Serializer};
use vigil_store::{Store, StoreError, StoreRegistry, Value};

/// Stands in for a live object handle that has no textual form.
struct Opaque;

impl Serialize for Opaque {
    fn serialize<S: Serializer>(&self, _serializer: S) -> Result<S::Ok, S::Error> {
        Err(serde::ser::Error::custom("opaque handle"))
    }
}

fn yaml(text: &str) -> Value {
    serde_yaml::from_str(text).expect("yaml literal")
}

// ---------------------------------------------------------------------------
// 1. Construction
// ---------------------------------------------------------------------------

#[test]
fn opening_a_missing_document_creates_it() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    let doc = home.child("fresh.yaml");

    let store = StoreRegistry::new().open(doc.path()).expect("open");
    doc.assert(predicate::path::exists());
    home.child(".filelock.fresh.yaml").assert(predicate::path::exists());
    assert!(store.is_empty());
}

#[test]
fn existing_document_is_loaded() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    let doc = home.child("settings.yaml");
    doc.write_str("selected: true\ngeometry:\n  x: 10\n  y: 20\n").expect("write");

    let store = StoreRegistry::new().open(doc.path()).expect("open");
    assert_eq!(store.get("selected"), Some(Value::Bool(true)));
    assert_eq!(store.get("geometry"), Some(yaml("{x: 10, y: 20}")));
}

#[test]
fn malformed_document_fails_to_open() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    let list = home.child("list.yaml");
    list.write_str("- this is a list, not a mapping\n").expect("write");
    let broken = home.child("broken.yaml");
    broken.write_str(": : corrupt : yaml : !!!\n  - broken: [unclosed").expect("write");

    let registry = StoreRegistry::new();
    for path in [list.path(), broken.path()] {
        let err = registry.open(path).unwrap_err();
        assert!(matches!(err, StoreError::Malformed { .. }), "got: {err}");
        assert!(err.to_string().contains(".yaml"), "must name the file: {err}");
    }
    assert!(registry.is_empty());
}

// ---------------------------------------------------------------------------
// 2. Instance sharing
// ---------------------------------------------------------------------------

#[test]
fn different_spellings_share_one_document() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    home.child("sub").create_dir_all().expect("mkdir");
    let direct = home.path().join("shared.yaml");
    let roundabout = home.path().join("sub").join("..").join("shared.yaml");

    let a = Store::open(&direct).expect("open a");
    let b = Store::open(&roundabout).expect("open b");
    assert!(Store::same_instance(&a, &b));

    a.set("x", &7).expect("set");
    assert_eq!(b.get("x"), Some(Value::from(7)));
}

#[test]
fn symlinked_document_shares_and_writes_through_to_target() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    let real = home.child("real.yaml");
    real.write_str("a: 1\n").expect("write");
    let link = home.path().join("link.yaml");
    std::os::unix::fs::symlink(real.path(), &link).expect("symlink");

    let registry = StoreRegistry::new();
    let via_real = registry.open(real.path()).expect("open real");
    let via_link = registry.open(&link).expect("open link");
    assert!(Store::same_instance(&via_real, &via_link));
    assert_eq!(via_link.path(), via_real.path());

    via_link.set("k", &2).expect("set");
    assert_eq!(via_real.get("k"), Some(Value::from(2)));
    assert!(fs::symlink_metadata(&link).expect("lstat").file_type().is_symlink());
    real.assert(predicate::str::contains("k: 2"));
    home.child(".filelock.link.yaml").assert(predicate::path::missing());
}

#[test]
fn reopening_ignores_new_callback() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    let path = home.path().join("plain.yaml");
    let registry = StoreRegistry::new();

    let plain = registry.open(&path).expect("open");
    let again = registry
        .open_with_callback(&path, |_, _, _| panic!("callback must be ignored"))
        .expect("reopen");
    assert!(Store::same_instance(&plain, &again));
    assert!(!again.is_reactive());
}

// ---------------------------------------------------------------------------
// 3. Writes
// ---------------------------------------------------------------------------

#[test]
fn repeated_identical_set_writes_once() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    let path = home.path().join("idem.yaml");
    let store = StoreRegistry::new().open(&path).expect("open");

    assert!(store.set("selected", &true).expect("first set"));

    let past = FileTime::from_system_time(SystemTime::now() - Duration::from_secs(3600));
    set_file_mtime(&path, past).expect("age file");
    let before = fs::read(&path).expect("read");

    assert!(!store.set("selected", &true).expect("second set"));
    assert!(!store.delete("absent").expect("delete absent"));

    let mtime = FileTime::from_last_modification_time(&fs::metadata(&path).expect("meta"));
    assert_eq!(mtime, past, "no-op set must not touch the file");
    assert_eq!(fs::read(&path).expect("read"), before);
}

#[test]
fn structurally_equal_values_are_no_ops() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    let store = StoreRegistry::new()
        .open(home.path().join("deep.yaml"))
        .expect("open");

    let geometry = yaml("{w: 600, h: 200, pos: [1, 2]}");
    assert!(store.set("geometry", &geometry).expect("set"));
    assert!(!store.set("geometry", &yaml("{pos: [1, 2], h: 200, w: 600}")).expect("reset"));
}

#[test]
fn failed_write_rolls_back_memory_and_disk() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    let path = home.path().join("rollback.yaml");
    let store = StoreRegistry::new().open(&path).expect("open");
    store.set("k", &"prior").expect("set");
    let before = fs::read(&path).expect("read");

    let err = store.set("k", &Opaque).unwrap_err();
    match &err {
        StoreError::Unserializable { key, type_name, .. } => {
            assert_eq!(key, "k");
            assert!(type_name.ends_with("Opaque"), "type name: {type_name}");
        }
        other => panic!("expected Unserializable, got {other:?}"),
    }
    assert!(err.to_string().contains("Opaque"));

    assert_eq!(store.get("k"), Some(Value::from("prior")));
    assert_eq!(fs::read(&path).expect("read"), before, "file must be byte-identical");

    assert!(store.set("bad", &Opaque).is_err());
    assert!(!store.contains("bad"));
}

#[test]
fn save_then_load_round_trips() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    let path = home.path().join("round.yaml");

    let written = {
        let store = StoreRegistry::new().open(&path).expect("open");
        store.set("name", "viewer").expect("set");
        store.set("count", &3).expect("set");
        store.set("ratio", &0.25).expect("set");
        store.set("tags", &["a", "b"]).expect("set");
        store.set("nested", &yaml("{inner: {list: [1, {k: v}], flag: false}}")).expect("set");
        store.snapshot()
    };

    let reopened = StoreRegistry::new().open(&path).expect("reopen");
    assert_eq!(reopened.snapshot(), written);

    reopened.save().expect("save");
    reopened.load().expect("load");
    assert_eq!(reopened.snapshot(), written);
}

#[test]
fn writes_wait_for_the_inter_process_lock() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    let path = home.path().join("locked.yaml");
    let store = StoreRegistry::new().open(&path).expect("open");

    // A second handle on the lock file behaves like another process.
    let foreign = vigil_store::FileLock::for_document(store.path());
    let guard = foreign.acquire().expect("foreign lock");

    let writer = {
        let store = store.clone();
        thread::spawn(move || store.set("k", &1))
    };
    thread::sleep(Duration::from_millis(150));
    assert!(!fs::read_to_string(&path).expect("read").contains("k: 1"));

    drop(guard);
    assert!(writer.join().expect("join").expect("set"));
    assert!(fs::read_to_string(&path).expect("read").contains("k: 1"));
}
