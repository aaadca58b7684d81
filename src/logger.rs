//! Session logger for StitchFE.
//!
//! One log file per launch, truncated on start:
//!   Windows:  `%APPDATA%\StitchFE\stitchfe.log`
//!   Linux:    `~/.local/share/StitchFE/stitchfe.log`
//!   macOS:    `~/Library/Application Support/StitchFE/stitchfe.log`
//!
//! Use the `log_info!` / `log_warn!` / `log_err!` macros anywhere in the
//! crate.  Before `init` (and in unit tests) they are no-ops.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

static LOG_FILE: OnceLock<Mutex<File>> = OnceLock::new();
static LOG_PATH: OnceLock<PathBuf> = OnceLock::new();

pub fn log_path() -> Option<&'static PathBuf> {
    LOG_PATH.get()
}

/// Append a raw line.  I/O errors are swallowed; logging must never take the
/// editor down.
pub fn write_line(line: &str) {
    if let Some(mutex) = LOG_FILE.get()
        && let Ok(mut file) = mutex.lock()
    {
        let _ = writeln!(file, "{}", line);
    }
}

pub fn write(level: &str, msg: &str) {
    write_line(&format_line(&clock_time(unix_secs()), level, msg));
}

fn format_line(clock: &str, level: &str, msg: &str) -> String {
    format!("[{}] [{}] {}", clock, level, msg)
}

#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        $crate::logger::write("INFO", &format!($($arg)*));
    };
}

#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        $crate::logger::write("WARN", &format!($($arg)*));
    };
}

#[macro_export]
macro_rules! log_err {
    ($($arg:tt)*) => {
        $crate::logger::write("ERROR", &format!($($arg)*));
    };
}

/// Open the session log in the platform data directory.
pub fn init() {
    init_at(&data_dir().join("StitchFE").join("stitchfe.log"));
}

/// Open (truncating) the session log at `path` and install the panic hook.
/// Only the first successful call takes effect.
pub fn init_at(path: &Path) {
    if LOG_FILE.get().is_some() {
        return;
    }
    if let Some(parent) = path.parent() {
        let _ = fs::create_dir_all(parent);
    }

    let file = match OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(path)
    {
        Ok(f) => f,
        Err(e) => {
            eprintln!("[logger] Failed to open log file {:?}: {}", path, e);
            return;
        }
    };
    let _ = LOG_PATH.set(path.to_path_buf());
    let _ = LOG_FILE.set(Mutex::new(file));

    let now = unix_secs();
    write_line(&format!(
        "=== StitchFE {} session started {} {} UTC ===",
        env!("CARGO_PKG_VERSION"),
        civil_date(now),
        clock_time(now)
    ));
    write_line(&format!("Log file: {}", path.display()));
    write_line("");

    let prev = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        write_line(&format_line(&clock_time(unix_secs()), "PANIC", &info.to_string()));
        prev(info);
    }));
}

/// Platform data directory (without the app sub-folder).
fn data_dir() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        if let Ok(appdata) = std::env::var("APPDATA") {
            return PathBuf::from(appdata);
        }
    }
    #[cfg(target_os = "macos")]
    {
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home)
                .join("Library")
                .join("Application Support");
        }
    }
    if let Ok(xdg) = std::env::var("XDG_DATA_HOME") {
        return PathBuf::from(xdg);
    }
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".local").join("share");
    }
    PathBuf::from(".")
}

fn unix_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// `HH:MM:SS` (UTC) of a unix timestamp.
fn clock_time(secs: u64) -> String {
    let h = (secs % 86_400) / 3600;
    let m = (secs % 3600) / 60;
    let s = secs % 60;
    format!("{:02}:{:02}:{:02}", h, m, s)
}

/// `YYYY-MM-DD` (UTC) of a unix timestamp, via Howard Hinnant's
/// days-to-civil conversion.
fn civil_date(secs: u64) -> String {
    let z = (secs / 86_400) as i64 + 719_468;
    let era = z.div_euclid(146_097);
    let doe = z - era * 146_097;
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = doy - (153 * mp + 2) / 5 + 1;
    let month = if mp < 10 { mp + 3 } else { mp - 9 };
    let year = yoe + era * 400 + i64::from(month <= 2);
    format!("{:04}-{:02}-{:02}", year, month, day)
}

/// ISO-8601 UTC timestamp with milliseconds, e.g. `2023-11-14T22:13:20.000Z`.
pub fn iso8601_utc(since_epoch: Duration) -> String {
    let secs = since_epoch.as_secs();
    format!(
        "{}T{}.{:03}Z",
        civil_date(secs),
        clock_time(secs),
        since_epoch.subsec_millis()
    )
}

/// The current time as [`iso8601_utc`].
pub fn now_iso8601() -> String {
    iso8601_utc(SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clock_wraps_per_day() {
        assert_eq!(clock_time(0), "00:00:00");
        assert_eq!(clock_time(86_400 + 3723), "01:02:03");
    }

    #[test]
    fn civil_dates() {
        assert_eq!(civil_date(0), "1970-01-01");
        assert_eq!(civil_date(951_782_400), "2000-02-29");
        assert_eq!(civil_date(1_700_000_000), "2023-11-14");
    }

    #[test]
    fn iso8601_matches_utc_layout() {
        assert_eq!(iso8601_utc(Duration::ZERO), "1970-01-01T00:00:00.000Z");
        assert_eq!(
            iso8601_utc(Duration::from_millis(1_700_000_000_042)),
            "2023-11-14T22:13:20.042Z"
        );
    }

    #[test]
    fn line_layout() {
        assert_eq!(format_line("10:00:00", "WARN", "x"), "[10:00:00] [WARN] x");
    }

    #[test]
    fn macros_are_silent_without_init() {
        crate::log_info!("nothing to see {}", 1);
    }
}
