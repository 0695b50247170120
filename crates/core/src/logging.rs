//! Bus-level logging shared by every driver.
//!
//! Driver code never talks to a logging backend directly. It calls [`log`]
//! with a [`LogCategory`] naming the bus engine involved and a closure that
//! builds the message, so formatting only happens when the category is
//! enabled.
//!
//! # Architecture
//!
//! - **LogConfig**: process-wide levels held in atomics
//! - **LogLevel**: Off < Error < Warn < Info < Debug < Trace
//! - **LogCategory**: Shift, Select, Joybus, Pak, Sim
//! - **RateLimiter**: sliding one-second window per category
//!
//! Messages go to stderr, or to a file through a background writer thread
//! once [`LogConfig::set_log_file`] succeeds.
//!
//! Drivers must not log from inside a [`crate::critical::CriticalSection`]:
//! formatting and channel sends take far longer than a half-duplex bit
//! window. Record what happened and log after the guard is dropped.
//!
//! ```rust
//! use pad_core::logging::{log, LogCategory, LogLevel};
//!
//! log(LogCategory::Joybus, LogLevel::Debug, || {
//!     format!("joybus: status timeout after {} bits", 7)
//! });
//! ```

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering};
use std::sync::mpsc::{channel, Sender};
use std::sync::{Mutex, MutexGuard};
use std::thread;
use std::time::{Duration, Instant};

/// Default per-category rate limit, in messages per second.
pub const DEFAULT_RATE_LIMIT: usize = 60;

/// Log level for controlling verbosity
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum LogLevel {
    #[default]
    Off = 0,
    Error = 1,
    Warn = 2,
    Info = 3,
    Debug = 4,
    Trace = 5,
}

impl LogLevel {
    /// Parse log level from string (case-insensitive)
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "off" | "0" => Some(LogLevel::Off),
            "error" | "err" | "1" => Some(LogLevel::Error),
            "warn" | "warning" | "2" => Some(LogLevel::Warn),
            "info" | "3" => Some(LogLevel::Info),
            "debug" | "4" => Some(LogLevel::Debug),
            "trace" | "5" => Some(LogLevel::Trace),
            _ => None,
        }
    }

    fn from_u8(val: u8) -> Self {
        match val {
            1 => LogLevel::Error,
            2 => LogLevel::Warn,
            3 => LogLevel::Info,
            4 => LogLevel::Debug,
            5 => LogLevel::Trace,
            _ => LogLevel::Off,
        }
    }
}

/// Which bus engine a message comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogCategory {
    /// Latch/clock shift-register buses and their accessories
    Shift,
    /// Multi-phase select-line bus
    Select,
    /// Half-duplex single-wire transceiver
    Joybus,
    /// Controller-pak sub-protocol
    Pak,
    /// Simulated board and peer models
    Sim,
}

impl LogCategory {
    pub const ALL: [LogCategory; 5] = [
        LogCategory::Shift,
        LogCategory::Select,
        LogCategory::Joybus,
        LogCategory::Pak,
        LogCategory::Sim,
    ];

    const COUNT: usize = Self::ALL.len();

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "shift" => Some(LogCategory::Shift),
            "select" => Some(LogCategory::Select),
            "joybus" => Some(LogCategory::Joybus),
            "pak" => Some(LogCategory::Pak),
            "sim" => Some(LogCategory::Sim),
            _ => None,
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

/// Per-category sliding-window rate limiter.
struct RateLimiter {
    max_logs_per_second: AtomicUsize,
    window_duration: Duration,
    state: Mutex<LimiterState>,
}

#[derive(Default)]
struct LimiterState {
    timestamps: [VecDeque<Instant>; LogCategory::COUNT],
    dropped: [usize; LogCategory::COUNT],
    last_drop_report: [Option<Instant>; LogCategory::COUNT],
}

impl RateLimiter {
    fn new(max_logs_per_second: usize) -> Self {
        Self {
            max_logs_per_second: AtomicUsize::new(max_logs_per_second),
            window_duration: Duration::from_secs(1),
            state: Mutex::new(LimiterState::default()),
        }
    }

    fn set_max_logs_per_second(&self, max: usize) {
        self.max_logs_per_second.store(max, Ordering::Relaxed);
    }

    fn get_max_logs_per_second(&self) -> usize {
        self.max_logs_per_second.load(Ordering::Relaxed)
    }

    /// Returns `(allowed, dropped)`; `dropped` is `Some(n)` when a summary of
    /// `n` suppressed messages is due.
    fn should_allow(&self, category: LogCategory) -> (bool, Option<usize>) {
        let now = Instant::now();
        let idx = category.index();
        let mut state = lock(&self.state);

        let window = &mut state.timestamps[idx];
        while let Some(&front) = window.front() {
            if now.duration_since(front) > self.window_duration {
                window.pop_front();
            } else {
                break;
            }
        }

        if window.len() < self.get_max_logs_per_second() {
            window.push_back(now);
            let dropped = std::mem::take(&mut state.dropped[idx]);
            if dropped > 0 {
                state.last_drop_report[idx] = Some(now);
                return (true, Some(dropped));
            }
            return (true, None);
        }

        state.dropped[idx] += 1;
        let report_due = match state.last_drop_report[idx] {
            None => true,
            Some(last) => now.duration_since(last) >= Duration::from_secs(1),
        };
        if report_due {
            state.last_drop_report[idx] = Some(now);
            (false, Some(std::mem::take(&mut state.dropped[idx])))
        } else {
            (false, None)
        }
    }
}

// A panic while holding a logging lock must not take logging down with it.
fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Global logging configuration
pub struct LogConfig {
    global_level: AtomicU8,
    category_levels: [AtomicU8; LogCategory::COUNT],
    log_sender: Mutex<Option<Sender<String>>>,
    file_logging_enabled: AtomicBool,
    rate_limiter: RateLimiter,
}

impl LogConfig {
    /// All logging off, default rate limit.
    fn new() -> Self {
        Self {
            global_level: AtomicU8::new(LogLevel::Off as u8),
            category_levels: std::array::from_fn(|_| AtomicU8::new(LogLevel::Off as u8)),
            log_sender: Mutex::new(None),
            file_logging_enabled: AtomicBool::new(false),
            rate_limiter: RateLimiter::new(DEFAULT_RATE_LIMIT),
        }
    }

    /// Get the global singleton instance
    pub fn global() -> &'static Self {
        use std::sync::OnceLock;
        static INSTANCE: OnceLock<LogConfig> = OnceLock::new();
        INSTANCE.get_or_init(LogConfig::new)
    }

    pub fn set_global_level(&self, level: LogLevel) {
        self.global_level.store(level as u8, Ordering::Relaxed);
    }

    pub fn get_global_level(&self) -> LogLevel {
        LogLevel::from_u8(self.global_level.load(Ordering::Relaxed))
    }

    /// Override the level of one category. `Off` means "use the global level".
    pub fn set_level(&self, category: LogCategory, level: LogLevel) {
        self.category_levels[category.index()].store(level as u8, Ordering::Relaxed);
    }

    pub fn get_level(&self, category: LogCategory) -> LogLevel {
        LogLevel::from_u8(self.category_levels[category.index()].load(Ordering::Relaxed))
    }

    /// A category-specific level wins when set; otherwise the global level
    /// decides.
    pub fn should_log(&self, category: LogCategory, level: LogLevel) -> bool {
        if level == LogLevel::Off {
            return false;
        }
        let category_level = self.get_level(category);
        if category_level != LogLevel::Off {
            level <= category_level
        } else {
            level <= self.get_global_level()
        }
    }

    /// Reset all logging to Off
    pub fn reset(&self) {
        self.set_global_level(LogLevel::Off);
        for category in LogCategory::ALL {
            self.set_level(category, LogLevel::Off);
        }
    }

    /// Maximum messages per second per category.
    pub fn set_rate_limit(&self, max_logs_per_second: usize) {
        self.rate_limiter
            .set_max_logs_per_second(max_logs_per_second);
    }

    pub fn get_rate_limit(&self) -> usize {
        self.rate_limiter.get_max_logs_per_second()
    }

    /// Send output to `path` (appending) through a background writer thread.
    /// Replaces any previous log file.
    pub fn set_log_file(&self, path: PathBuf) -> std::io::Result<()> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let (sender, receiver) = channel::<String>();

        thread::Builder::new()
            .name("pad-log-writer".to_string())
            .spawn(move || {
                let mut file = file;
                while let Ok(message) = receiver.recv() {
                    let _ = writeln!(file, "{}", message);
                    let _ = file.flush();
                }
                let _ = file.flush();
            })?;

        *lock(&self.log_sender) = Some(sender);
        self.file_logging_enabled.store(true, Ordering::Relaxed);
        Ok(())
    }

    /// Close the log file; the writer thread exits once the sender is dropped.
    pub fn clear_log_file(&self) {
        *lock(&self.log_sender) = None;
        self.file_logging_enabled.store(false, Ordering::Relaxed);
    }

    fn write_message(&self, message: &str) {
        if self.file_logging_enabled.load(Ordering::Relaxed) {
            let sender = lock(&self.log_sender);
            match sender.as_ref() {
                Some(sender) if sender.send(message.to_string()).is_ok() => return,
                _ => {}
            }
        }
        eprintln!("{}", message);
    }
}

/// Log a lazily built message under `category` at `level`.
///
/// The closure only runs when the category is enabled at `level` and the
/// category is under its rate limit. Suppressed messages are summarised once
/// per second.
pub fn log<F>(category: LogCategory, level: LogLevel, message_fn: F)
where
    F: FnOnce() -> String,
{
    let config = LogConfig::global();
    if !config.should_log(category, level) {
        return;
    }

    let (allowed, dropped) = config.rate_limiter.should_allow(category);
    if let Some(count) = dropped.filter(|&n| n > 0) {
        config.write_message(&format!(
            "[{:?}] WARNING: Rate limit exceeded, {} log message(s) dropped in the last second",
            category, count
        ));
    }

    if allowed {
        config.write_message(&message_fn());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_parsing() {
        assert_eq!(LogLevel::from_str("off"), Some(LogLevel::Off));
        assert_eq!(LogLevel::from_str("ERR"), Some(LogLevel::Error));
        assert_eq!(LogLevel::from_str("WARNING"), Some(LogLevel::Warn));
        assert_eq!(LogLevel::from_str("3"), Some(LogLevel::Info));
        assert_eq!(LogLevel::from_str("Debug"), Some(LogLevel::Debug));
        assert_eq!(LogLevel::from_str("trace"), Some(LogLevel::Trace));
        assert_eq!(LogLevel::from_str("loud"), None);
    }

    #[test]
    fn test_category_parsing() {
        for category in LogCategory::ALL {
            let name = format!("{:?}", category);
            assert_eq!(LogCategory::from_str(&name), Some(category));
        }
        assert_eq!(LogCategory::from_str("cpu"), None);
    }

    #[test]
    fn test_log_level_ordering() {
        assert!(LogLevel::Off < LogLevel::Error);
        assert!(LogLevel::Error < LogLevel::Warn);
        assert!(LogLevel::Warn < LogLevel::Info);
        assert!(LogLevel::Info < LogLevel::Debug);
        assert!(LogLevel::Debug < LogLevel::Trace);
    }

    #[test]
    fn test_serde_names_are_lowercase() {
        let json = serde_json::to_string(&LogCategory::Joybus).expect("serialize");
        assert_eq!(json, "\"joybus\"");
        let level: LogLevel = serde_json::from_str("\"warn\"").expect("deserialize");
        assert_eq!(level, LogLevel::Warn);
    }

    #[test]
    fn test_category_level_overrides_global() {
        let config = LogConfig::new();
        config.set_global_level(LogLevel::Error);
        config.set_level(LogCategory::Joybus, LogLevel::Debug);

        assert!(config.should_log(LogCategory::Joybus, LogLevel::Debug));
        assert!(!config.should_log(LogCategory::Joybus, LogLevel::Trace));

        assert!(!config.should_log(LogCategory::Shift, LogLevel::Warn));
        assert!(config.should_log(LogCategory::Shift, LogLevel::Error));
    }

    #[test]
    fn test_off_messages_never_log() {
        let config = LogConfig::new();
        config.set_global_level(LogLevel::Trace);
        assert!(!config.should_log(LogCategory::Sim, LogLevel::Off));
    }

    #[test]
    fn test_reset() {
        let config = LogConfig::new();
        config.set_global_level(LogLevel::Trace);
        config.set_level(LogCategory::Pak, LogLevel::Debug);

        config.reset();

        assert_eq!(config.get_global_level(), LogLevel::Off);
        assert_eq!(config.get_level(LogCategory::Pak), LogLevel::Off);
    }

    #[test]
    fn test_rate_limiter_per_category() {
        let limiter = RateLimiter::new(DEFAULT_RATE_LIMIT);

        for _ in 0..DEFAULT_RATE_LIMIT {
            assert!(limiter.should_allow(LogCategory::Joybus).0);
        }

        let (allowed, _) = limiter.should_allow(LogCategory::Joybus);
        assert!(!allowed, "Joybus category should be blocked");

        let (allowed, _) = limiter.should_allow(LogCategory::Pak);
        assert!(allowed, "Pak category should still be allowed");
    }

    #[test]
    fn test_rate_limiter_reports_dropped_count() {
        let limiter = RateLimiter::new(5);
        for _ in 0..5 {
            limiter.should_allow(LogCategory::Select);
        }

        // first drop is reported immediately, the rest accumulate
        let (allowed, dropped) = limiter.should_allow(LogCategory::Select);
        assert!(!allowed);
        assert_eq!(dropped, Some(1));
        for _ in 0..9 {
            limiter.should_allow(LogCategory::Select);
        }

        std::thread::sleep(Duration::from_millis(1100));

        let (allowed, dropped) = limiter.should_allow(LogCategory::Select);
        assert!(allowed, "Should be allowed after window slides");
        assert_eq!(dropped, Some(9));
    }

    #[test]
    fn test_log_file_receives_messages() {
        let path = std::env::temp_dir().join(format!("pad-core-log-{}.txt", std::process::id()));
        let _ = std::fs::remove_file(&path);

        let config = LogConfig::new();
        config.set_log_file(path.clone()).expect("open log file");
        config.write_message("joybus: hello");
        config.clear_log_file();

        // the writer thread drains the channel after the sender is dropped
        let mut contents = String::new();
        for _ in 0..50 {
            contents = std::fs::read_to_string(&path).unwrap_or_default();
            if !contents.is_empty() {
                break;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        assert!(contents.contains("joybus: hello"));
        let _ = std::fs::remove_file(&path);
    }
}
