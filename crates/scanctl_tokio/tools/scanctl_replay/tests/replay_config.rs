use std::env;
use std::path::PathBuf;
use std::sync::{Mutex, OnceLock};
use std::time::Duration;

use scanctl_core::config::{DetectionMode, ScanTarget};
use scanctl_replay::config::{Config, INIT_DELAY_ENV, MEDIA_ENV, MODE_ENV};

fn env_lock() -> std::sync::MutexGuard<'static, ()> {
    static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    LOCK.get_or_init(|| Mutex::new(())).lock().expect("lock")
}

fn clear_env() {
    env::remove_var(MODE_ENV);
    env::remove_var(INIT_DELAY_ENV);
    env::remove_var(MEDIA_ENV);
}

#[test]
fn defaults_read_stdin_continuously() {
    let _guard = env_lock();
    clear_env();

    let config = Config::from_args_iter(["bin"]);
    assert!(config.input.is_none());
    assert_eq!(config.mode, DetectionMode::Continuous);
    assert_eq!(config.scan_type, ScanTarget::Barcode);
    assert_eq!(config.init_delay, Duration::ZERO);
    assert!(config.fail_init.is_none());
    assert!(config.media_available);
}

#[test]
fn flags_override_defaults() {
    let _guard = env_lock();
    clear_env();

    let config = Config::from_args_iter([
        "bin",
        "--file=payloads.jsonl",
        "--single-shot",
        "--init-delay-ms",
        "25",
        "--fail-init",
        "permission denied",
        "--no-media",
        "--qrcode",
    ]);
    assert_eq!(config.input, Some(PathBuf::from("payloads.jsonl")));
    assert_eq!(config.mode, DetectionMode::SingleShot);
    assert_eq!(config.scan_type, ScanTarget::QrCode);
    assert_eq!(config.init_delay, Duration::from_millis(25));
    assert_eq!(config.fail_init.as_deref(), Some("permission denied"));
    assert!(!config.media_available);
}

#[test]
fn dash_means_stdin() {
    let _guard = env_lock();
    clear_env();

    let config = Config::from_args_iter(["bin", "--file", "-"]);
    assert!(config.input.is_none());
}

#[test]
fn env_supplies_defaults_and_flags_win() {
    let _guard = env_lock();
    clear_env();
    env::set_var(MODE_ENV, "single_shot");
    env::set_var(INIT_DELAY_ENV, "40");
    env::set_var(MEDIA_ENV, "off");

    let config = Config::from_args_iter(["bin"]);
    assert_eq!(config.mode, DetectionMode::SingleShot);
    assert_eq!(config.init_delay, Duration::from_millis(40));
    assert!(!config.media_available);

    let config = Config::from_args_iter(["bin", "--continuous", "--init-delay-ms=5"]);
    assert_eq!(config.mode, DetectionMode::Continuous);
    assert_eq!(config.init_delay, Duration::from_millis(5));

    clear_env();
}

#[test]
fn unparseable_env_falls_back() {
    let _guard = env_lock();
    clear_env();
    env::set_var(MODE_ENV, "sometimes");
    env::set_var(INIT_DELAY_ENV, "soon");

    let config = Config::from_args_iter(["bin"]);
    assert_eq!(config.mode, DetectionMode::Continuous);
    assert_eq!(config.init_delay, Duration::ZERO);

    clear_env();
}
