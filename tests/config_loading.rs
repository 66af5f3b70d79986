// tests/config_loading.rs

use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use tempfile::NamedTempFile;

use fsevent_bridge::cli::CliArgs;
use fsevent_bridge::config::{load_and_validate, load_from_path, resolve_config};
use fsevent_bridge::errors::FsEventError;
use fsevent_bridge::{CreateFlags, DeviceId, EventId, StartPoint, WatchTarget};

fn config_file(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "{contents}").unwrap();
    file
}

#[test]
fn loads_a_full_config() {
    let file = config_file(
        r#"
paths = ["/Users/me/project", "/tmp/scratch"]
latency_ms = 300
file_events = true
watch_root = true
since = 4242
"#,
    );

    let cfg = load_and_validate(file.path()).unwrap();
    assert_eq!(
        cfg.target,
        WatchTarget::paths(["/Users/me/project", "/tmp/scratch"])
    );
    assert_eq!(
        cfg.options.flags,
        CreateFlags::FILE_EVENTS | CreateFlags::WATCH_ROOT
    );
    assert_eq!(cfg.options.latency, Duration::from_millis(300));
    assert_eq!(cfg.options.start, StartPoint::Since(EventId(4242)));
}

#[test]
fn loads_a_device_config() {
    let file = config_file(
        r#"
device = 16777220
paths = ["/Users/me"]
"#,
    );
    let cfg = load_and_validate(file.path()).unwrap();
    assert_eq!(cfg.target.device_id(), Some(DeviceId(16777220)));
    assert_eq!(cfg.target.native_paths(), vec![PathBuf::from("/Users/me")]);
}

#[test]
fn unknown_keys_are_a_toml_error() {
    let file = config_file("paths = [\"/a\"]\nlatency = 5\n");
    match load_from_path(file.path()) {
        Err(FsEventError::Toml(_)) => {}
        Err(e) => panic!("Expected Toml error, got: {:?}", e),
        Ok(_) => panic!("Expected error, got Ok"),
    }
}

#[test]
fn relative_paths_are_a_config_error() {
    let file = config_file("paths = [\"relative/dir\"]\n");
    match load_and_validate(file.path()) {
        Err(FsEventError::Config(msg)) => {
            assert!(msg.contains("relative/dir"));
            assert!(msg.contains("absolute"));
        }
        Err(e) => panic!("Expected Config error, got: {:?}", e),
        Ok(_) => panic!("Expected error, got Ok"),
    }
}

#[test]
fn missing_file_is_an_io_error() {
    let result = load_from_path("/definitely/not/here/fsevent.toml");
    assert!(matches!(result, Err(FsEventError::Io(_))));
}

#[test]
fn cli_flags_layer_over_the_file() {
    let file = config_file(
        r#"
paths = ["/from/file"]
latency_ms = 1000
"#,
    );
    let args = CliArgs {
        config: Some(file.path().to_path_buf()),
        no_defer: true,
        since: Some(9),
        ..CliArgs::default()
    };
    let cfg = resolve_config(&args).unwrap();
    assert_eq!(cfg.target, WatchTarget::paths(["/from/file"]));
    assert!(cfg.options.flags.contains(CreateFlags::NO_DEFER));
    assert_eq!(cfg.options.latency, Duration::from_millis(1000));
    assert_eq!(cfg.options.start, StartPoint::Since(EventId(9)));
}

#[test]
fn cli_alone_is_enough() {
    let args = CliArgs {
        paths: vec![PathBuf::from("/only/cli")],
        ..CliArgs::default()
    };
    let cfg = resolve_config(&args).unwrap();
    assert_eq!(cfg.target, WatchTarget::paths(["/only/cli"]));
    assert_eq!(cfg.options.start, StartPoint::Now);
}
