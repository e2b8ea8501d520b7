//! A process-wide, thread-safe logging facility: a dynamic priority mask,
//! automatic routing between standard error and the system log, and
//! structured timestamped output — modeled on the classic Unix `syslog(3)`
//! idiom rather than a `tracing`-style subscriber tree. Callers that want a
//! `tracing`-compatible layer on top of this are expected to bridge it
//! themselves; this crate's [`log`]/[`emit`] entry points are the whole
//! logging surface, not one layer among several.

mod format;
mod mask_import;
mod priority;
mod strategy;

pub use mask_import::{parse_line, parse_strict, MaskParseError};
pub use priority::{LogMask, LogPriority, ALL_MASK, DEFAULT_MASK, DEFAULT_PRIORITY, PERROR_PRIORITY};
pub use strategy::{Destination, LogRoutingStrategy, ParseStrategyError};

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use std::ffi::CString;
use std::fmt;
use std::os::fd::RawFd;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Default name of the environment variable consulted by
/// [`set_mask_from_environment`].
pub const MASK_ENVIRONMENT_VARIABLE: &str = "COM_DIAG_DIMINUTO_LOG_MASK";

/// Default home-relative file name consulted by [`import_mask_from_file`]
/// when no explicit path is given.
pub const MASK_FILE_NAME: &str = ".com_diag_diminuto_log_mask";

const IDENT_DEFAULT: &str = "diminuto";
const OPTION_DEFAULT: libc::c_int = libc::LOG_CONS | libc::LOG_PID;
const FACILITY_DEFAULT: libc::c_int = libc::LOG_LOCAL7;

struct State {
    mask: LogMask,
    strategy: Mutex<LogRoutingStrategy>,
    descriptor: Mutex<RawFd>,
    ident: Mutex<CString>,
    mask_path: Mutex<Option<PathBuf>>,
    daemon: strategy::DaemonCache,
    syslog_opened: AtomicBool,
    error_suppress: AtomicBool,
    lost: AtomicU64,
    write_lock: Mutex<()>,
}

impl State {
    fn new() -> Self {
        Self {
            mask: LogMask::default(),
            strategy: Mutex::new(LogRoutingStrategy::Automatic),
            descriptor: Mutex::new(libc::STDERR_FILENO),
            ident: Mutex::new(CString::new(IDENT_DEFAULT).expect("static ident has no NUL")),
            mask_path: Mutex::new(None),
            daemon: strategy::DaemonCache::default(),
            syslog_opened: AtomicBool::new(false),
            error_suppress: AtomicBool::new(false),
            lost: AtomicU64::new(0),
            write_lock: Mutex::new(()),
        }
    }
}

static STATE: Lazy<State> = Lazy::new(State::new);

/// The current process mask, as raw bits.
pub fn mask() -> u8 {
    STATE.mask.get()
}

/// Overwrites the process mask, returning the previous value.
pub fn set_mask(value: u8) -> u8 {
    let before = STATE.mask.get();
    STATE.mask.set(value);
    before
}

pub fn routing_strategy() -> LogRoutingStrategy {
    *STATE.strategy.lock()
}

pub fn set_routing_strategy(strategy: LogRoutingStrategy) {
    *STATE.strategy.lock() = strategy;
}

/// Redesignates the descriptor log lines are written to when routed to
/// standard error (or a redirected file). Does not affect syslog routing.
pub fn set_descriptor(fd: RawFd) {
    *STATE.descriptor.lock() = fd;
}

pub fn descriptor() -> RawFd {
    *STATE.descriptor.lock()
}

/// Count of messages that could not be written (far end closed, or a
/// non-`EINTR` write error).
pub fn lost() -> u64 {
    STATE.lost.load(Ordering::Relaxed)
}

pub fn suppress_errors(suppress: bool) {
    STATE.error_suppress.store(suppress, Ordering::Relaxed);
}

/// Reads [`MASK_ENVIRONMENT_VARIABLE`] and, if present and well-formed,
/// assigns the process mask. Absence leaves the mask unchanged; a malformed
/// value is reported at error priority and also leaves the mask unchanged.
pub fn set_mask_from_environment() -> u8 {
    set_mask_from_environment_named(MASK_ENVIRONMENT_VARIABLE)
}

pub fn set_mask_from_environment_named(name: &str) -> u8 {
    match std::env::var(name) {
        Err(_) => {}
        Ok(value) => match parse_strict(&value) {
            Ok(parsed) => {
                STATE.mask.set(parsed);
            }
            Err(e) => {
                log(LogPriority::Error, format_args!("{name}: {e}"));
            }
        },
    }
    STATE.mask.get()
}

/// Reads the first line of `path` (or, if `None`, `$HOME/`[`MASK_FILE_NAME`])
/// and assigns the process mask if it parses. A missing file is not an
/// error.
pub fn import_mask_from_file(path: Option<&Path>) -> u8 {
    let resolved = match path {
        Some(p) => p.to_path_buf(),
        None => {
            let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
            Path::new(&home).join(MASK_FILE_NAME)
        }
    };
    *STATE.mask_path.lock() = Some(resolved.clone());

    match std::fs::read_to_string(&resolved) {
        Err(_) => {}
        Ok(contents) => {
            let first_line = contents.lines().next().unwrap_or("");
            match parse_line(first_line) {
                Ok(parsed) => {
                    STATE.mask.set(parsed);
                }
                Err(e) => {
                    log(
                        LogPriority::Error,
                        format_args!("{}: {e}", resolved.display()),
                    );
                }
            }
        }
    }
    STATE.mask.get()
}

/// Opens (if not already open) the underlying `syslog(3)` channel with an
/// explicit identifying name, option flags, and facility.
pub fn open_syslog(name: Option<&str>, option: libc::c_int, facility: libc::c_int) {
    let mut ident = STATE.ident.lock();
    if let Some(name) = name {
        if let Ok(c) = CString::new(name) {
            *ident = c;
        }
    }
    if !STATE.syslog_opened.swap(true, Ordering::AcqRel) {
        unsafe { libc::openlog(ident.as_ptr(), option, facility) };
    }
}

/// [`open_syslog`] with the default option flags and facility.
pub fn open(name: Option<&str>) {
    open_syslog(name, OPTION_DEFAULT, FACILITY_DEFAULT);
}

pub fn close() {
    if STATE.syslog_opened.swap(false, Ordering::AcqRel) {
        unsafe { libc::closelog() };
    }
}

fn write_all_retrying(fd: RawFd, bytes: &[u8]) {
    let mut remaining = bytes;
    while !remaining.is_empty() {
        let rc = unsafe {
            libc::write(
                fd,
                remaining.as_ptr() as *const libc::c_void,
                remaining.len(),
            )
        };
        if rc > 0 {
            remaining = &remaining[rc as usize..];
        } else if rc == 0 {
            STATE.lost.fetch_add(1, Ordering::Relaxed);
            break;
        } else {
            let err = std::io::Error::last_os_error();
            if err.kind() == std::io::ErrorKind::Interrupted {
                continue;
            }
            STATE.lost.fetch_add(1, Ordering::Relaxed);
            break;
        }
    }
}

fn vsyslog(priority: LogPriority, text: &str) {
    open(None);
    let c = CString::new(text.replace('\0', "")).unwrap_or_default();
    unsafe { libc::syslog(priority as libc::c_int, c"%s".as_ptr(), c.as_ptr()) };
}

/// Routes and emits one already-formatted message, serialized against every
/// other emission in the process.
fn route_and_emit(priority: LogPriority, message: &str) {
    let _serialize = STATE.write_lock.lock();

    let strategy = *STATE.strategy.lock();
    let fd = *STATE.descriptor.lock();
    let destination = strategy::resolve(strategy, fd, &STATE.daemon);

    match destination {
        Destination::Suppress => {}
        Destination::SystemLog => vsyslog(priority, message),
        Destination::StandardError => {
            let line = format::format_line(priority, message);
            write_all_retrying(fd, &line);
        }
    }
}

/// Emits `args` at `priority` if that priority is currently enabled in the
/// process mask; otherwise has no effect.
pub fn log(priority: LogPriority, args: fmt::Arguments<'_>) {
    if !STATE.mask.is_enabled(priority) {
        return;
    }
    route_and_emit(priority, &args.to_string());
}

/// Emits `args` at [`DEFAULT_PRIORITY`] unconditionally, bypassing the mask.
pub fn emit(args: fmt::Arguments<'_>) {
    route_and_emit(DEFAULT_PRIORITY, &args.to_string());
}

fn errno_text() -> (i32, String) {
    let err = std::io::Error::last_os_error();
    (err.raw_os_error().unwrap_or(0), err.to_string())
}

/// Emits, via [`log`] (so it respects the mask and Automatic routing), the
/// current `errno`'s description alongside `message`, at [`PERROR_PRIORITY`].
pub fn perror(file: &str, line: u32, message: &str) {
    if STATE.error_suppress.load(Ordering::Relaxed) {
        return;
    }
    let (code, text) = errno_text();
    log(
        PERROR_PRIORITY,
        format_args!("{file}@{line}: {message}: \"{text}\" ({code})\n"),
    );
}

/// Like [`perror`], but always routes via `syslog(3)` directly rather than
/// through the mask/Automatic-routing path — useful in unit tests that want
/// to force syslog regardless of the current strategy.
pub fn serror(file: &str, line: u32, message: &str) {
    if STATE.error_suppress.load(Ordering::Relaxed) {
        return;
    }
    let (code, text) = errno_text();
    vsyslog(
        PERROR_PRIORITY,
        &format!("{file}@{line}: {message}: \"{text}\" ({code})\n"),
    );
}

/// Formats and logs at `priority`, gated by the mask.
#[macro_export]
macro_rules! log {
    ($priority:expr, $($arg:tt)*) => {
        $crate::log($priority, format_args!($($arg)*))
    };
}

/// Formats and emits unconditionally at the default priority.
#[macro_export]
macro_rules! emit {
    ($($arg:tt)*) => {
        $crate::emit(format_args!($($arg)*))
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::fd::AsRawFd;

    #[test]
    fn mask_gates_log_but_not_emit() {
        let file = tempfile::NamedTempFile::new().unwrap();
        set_descriptor(file.as_file().as_raw_fd());
        set_routing_strategy(LogRoutingStrategy::StandardError);
        set_mask(LogPriority::Warning.to_mask());

        log(LogPriority::Information, format_args!("should be gated"));
        emit(format_args!("always written"));

        let contents = std::fs::read_to_string(file.path()).unwrap();
        assert!(!contents.contains("should be gated"));
        assert!(contents.contains("always written"));
    }

    #[test]
    fn enabling_warning_bit_admits_only_warning() {
        let file = tempfile::NamedTempFile::new().unwrap();
        set_descriptor(file.as_file().as_raw_fd());
        set_routing_strategy(LogRoutingStrategy::StandardError);
        set_mask(LogPriority::Warning.to_mask());

        log(LogPriority::Information, format_args!("info"));
        log(LogPriority::Warning, format_args!("warn"));
        log(LogPriority::Error, format_args!("err"));

        let contents = std::fs::read_to_string(file.path()).unwrap();
        let lines: Vec<_> = contents.lines().filter(|l| !l.is_empty()).collect();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains("<WARN>"));
    }

    #[test]
    fn environment_all_literal_enables_every_priority() {
        std::env::set_var("DIMINUTO_LOG_TEST_MASK", mask_import::ALL_LITERAL);
        let value = set_mask_from_environment_named("DIMINUTO_LOG_TEST_MASK");
        assert_eq!(value, ALL_MASK);
        std::env::remove_var("DIMINUTO_LOG_TEST_MASK");
    }
}
