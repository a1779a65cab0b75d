use std::fs::{File, OpenOptions};
use std::io::Write;
use std::sync::Mutex;

use lazy_static::lazy_static;
use reqwest::StatusCode;

pub const RESPONSE_LOG_PATH: &str = "mediashare-autoskip.log";

lazy_static! {
    static ref RESPONSE_LOG_FILE: Option<Mutex<File>> = OpenOptions::new()
        .append(true)
        .create(true)
        .open(RESPONSE_LOG_PATH)
        .ok()
        .map(Mutex::new);
}

/// Install the `env_logger` backend for the `log` macros.
///
/// Defaults to `info` for this crate and `warn` for everything else,
/// `RUST_LOG` overrides it.
pub fn init() {
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("warn,mediashare_autoskip=info"),
    )
    .format_timestamp_secs()
    .init();
}

pub struct ResponseLogger;

impl ResponseLogger {
    /// Record a failed response, both through `log` and in the response log file
    pub fn log_error(service: &str, status: StatusCode, body: &str) {
        let body = body.replace('\n', "");
        log::debug!("{service} [{status}] {body}");

        if let Some(file) = RESPONSE_LOG_FILE.as_ref() {
            if let Ok(mut file) = file.lock() {
                let _ = writeln!(
                    file,
                    "[{}] {service} [{status}] {body}",
                    chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
                );
            }
        }
    }
}
