use std::fs;
use std::path::Path;
use std::thread::sleep;
use std::time::{Duration, Instant, SystemTime};

use filetime::{set_file_mtime, FileTime};
use tempfile::TempDir;
use vigil_monitor::{FileHandler, FileInfo, FileMonitor};

const FAST: Duration = Duration::from_millis(10);

#[derive(Debug, Default)]
struct Recorder {
    events: Vec<&'static str>,
}

impl FileHandler for Recorder {
    fn on_change(&mut self, _file: &FileInfo) {
        self.events.push("change");
    }

    fn on_delete(&mut self, _file: &FileInfo) {
        self.events.push("delete");
    }
}

fn pump_until(monitor: &mut FileMonitor<Recorder>, cond: impl Fn(&Recorder) -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        monitor.on_idle();
        if cond(monitor.handler()) {
            return true;
        }
        sleep(FAST);
    }
    false
}

fn pump_for(monitor: &mut FileMonitor<Recorder>, period: Duration) {
    let deadline = Instant::now() + period;
    while Instant::now() < deadline {
        monitor.on_idle();
        sleep(FAST);
    }
}

fn set_mtime_ahead(path: &Path, secs: u64) {
    let t = SystemTime::now() + Duration::from_secs(secs);
    set_file_mtime(path, FileTime::from_system_time(t)).expect("set mtime");
}

fn start(path: &Path) -> FileMonitor<Recorder> {
    FileMonitor::with_interval(path, Recorder::default(), FAST).expect("start monitor")
}

#[test]
fn initial_content_is_reported_as_a_change() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("photo.png");
    fs::write(&path, b"pixels").unwrap();

    let mut monitor = start(&path);
    assert!(pump_until(&mut monitor, |r| r.events == ["change"]));
    assert_eq!(monitor.info().name(), "photo");
}

#[test]
fn timestamp_only_update_is_suppressed() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("photo.png");
    fs::write(&path, b"pixels").unwrap();

    let mut monitor = start(&path);
    assert!(pump_until(&mut monitor, |r| r.events.len() == 1));

    set_mtime_ahead(&path, 30);
    pump_for(&mut monitor, Duration::from_millis(200));
    assert_eq!(monitor.handler().events, ["change"], "touch must not notify");
}

#[test]
fn content_edit_is_reported() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("notes.txt");
    fs::write(&path, "v1").unwrap();

    let mut monitor = start(&path);
    assert!(pump_until(&mut monitor, |r| r.events.len() == 1));

    fs::write(&path, "v2").unwrap();
    set_mtime_ahead(&path, 30);
    assert!(pump_until(&mut monitor, |r| r.events == ["change", "change"]));
}

#[test]
fn deletion_is_reported_until_the_owner_stops() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("notes.txt");
    fs::write(&path, "v1").unwrap();

    let mut monitor = start(&path);
    assert!(pump_until(&mut monitor, |r| r.events.len() == 1));

    fs::remove_file(&path).unwrap();
    assert!(pump_until(&mut monitor, |r| r.events.last() == Some(&"delete")));
    assert!(monitor.is_alive(), "deletion alone must not stop the monitor");

    monitor.stop();
    assert!(!monitor.is_alive());
}
