use std::env;
use std::path::PathBuf;
use std::time::Duration;

use scanctl_core::config::{DetectionMode, ScanTarget};

pub const MODE_ENV: &str = "SCANCTL_REPLAY_MODE";
pub const INIT_DELAY_ENV: &str = "SCANCTL_REPLAY_INIT_DELAY_MS";
pub const MEDIA_ENV: &str = "SCANCTL_REPLAY_MEDIA";

pub struct Config {
    /// Payload file, one engine detection JSON object per line. `None` reads stdin.
    pub input: Option<PathBuf>,
    pub mode: DetectionMode,
    pub scan_type: ScanTarget,
    pub init_delay: Duration,
    pub fail_init: Option<String>,
    pub media_available: bool,
}

impl Config {
    pub fn from_args() -> Self {
        Self::from_args_iter(env::args())
    }

    pub fn from_args_iter<I, S>(iter: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut input: Option<PathBuf> = None;
        let mut mode = env::var(MODE_ENV)
            .ok()
            .and_then(parse_mode)
            .unwrap_or_default();
        let mut scan_type = ScanTarget::Barcode;
        let mut init_delay = env::var(INIT_DELAY_ENV)
            .ok()
            .and_then(|v| parse_millis(&v))
            .unwrap_or(Duration::ZERO);
        let mut fail_init: Option<String> = None;
        let mut media_available = env::var(MEDIA_ENV)
            .ok()
            .and_then(parse_bool)
            .unwrap_or(true);

        let mut args = iter.into_iter();
        let _ = args.next();
        while let Some(arg) = args.next() {
            let arg = arg.as_ref();
            match arg {
                "-h" | "--help" => {
                    print_usage();
                    std::process::exit(0);
                }
                "--file" => {
                    if let Some(value) = args.next() {
                        input = Some(PathBuf::from(value.as_ref()));
                    }
                }
                "--single-shot" => {
                    mode = DetectionMode::SingleShot;
                }
                "--continuous" => {
                    mode = DetectionMode::Continuous;
                }
                "--qrcode" => {
                    scan_type = ScanTarget::QrCode;
                }
                "--init-delay-ms" => {
                    if let Some(delay) = args.next().and_then(|v| parse_millis(v.as_ref())) {
                        init_delay = delay;
                    }
                }
                "--fail-init" => {
                    if let Some(value) = args.next() {
                        fail_init = Some(value.as_ref().to_string());
                    }
                }
                "--no-media" => {
                    media_available = false;
                }
                _ if arg.starts_with("--file=") => {
                    input = Some(PathBuf::from(&arg["--file=".len()..]));
                }
                _ if arg.starts_with("--init-delay-ms=") => {
                    if let Some(delay) = parse_millis(&arg["--init-delay-ms=".len()..]) {
                        init_delay = delay;
                    }
                }
                _ if arg.starts_with("--fail-init=") => {
                    fail_init = Some(arg["--fail-init=".len()..].to_string());
                }
                _ => {}
            }
        }

        // "-" is stdin, same as no file
        if input.as_deref().is_some_and(|p| p.as_os_str() == "-") {
            input = None;
        }

        Self {
            input,
            mode,
            scan_type,
            init_delay,
            fail_init,
            media_available,
        }
    }
}

fn print_usage() {
    println!(
        "scanctl_replay [--file <path>|-] [--single-shot|--continuous] [--qrcode] [--init-delay-ms <n>] [--fail-init <message>] [--no-media]"
    );
}

fn parse_millis(value: &str) -> Option<Duration> {
    value.trim().parse::<u64>().ok().map(Duration::from_millis)
}

fn parse_mode(value: String) -> Option<DetectionMode> {
    match value.trim().to_ascii_lowercase().as_str() {
        "single_shot" | "single-shot" | "single" => Some(DetectionMode::SingleShot),
        "continuous" => Some(DetectionMode::Continuous),
        _ => None,
    }
}

fn parse_bool(value: String) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
