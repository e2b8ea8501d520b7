//! Where a log message goes: a fixed choice, or computed fresh each
//! emission from process state with a write-once "we are a daemon" cache.

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogRoutingStrategy {
    #[default]
    Automatic,
    StandardError,
    SystemLog,
    Suppress,
}

impl fmt::Display for LogRoutingStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let c = match self {
            LogRoutingStrategy::Automatic => 'A',
            LogRoutingStrategy::StandardError => 'E',
            LogRoutingStrategy::SystemLog => 'S',
            LogRoutingStrategy::Suppress => 'X',
        };
        write!(f, "{c}")
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unrecognized log routing strategy character: {0:?}")]
pub struct ParseStrategyError(char);

impl FromStr for LogRoutingStrategy {
    type Err = ParseStrategyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.chars().next() {
            Some('A') => Ok(LogRoutingStrategy::Automatic),
            Some('E') => Ok(LogRoutingStrategy::StandardError),
            Some('S') => Ok(LogRoutingStrategy::SystemLog),
            Some('X') => Ok(LogRoutingStrategy::Suppress),
            Some(c) => Err(ParseStrategyError(c)),
            None => Err(ParseStrategyError('\0')),
        }
    }
}

/// Where one emission actually goes, once [`LogRoutingStrategy::Automatic`]
/// has been resolved against process state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Destination {
    StandardError,
    SystemLog,
    Suppress,
}

/// Sticky "this process is a daemon" flag: false until proven true, then
/// true for the rest of the process's life.
#[derive(Default)]
pub struct DaemonCache(AtomicBool);

impl DaemonCache {
    pub fn get(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    fn set(&self) {
        self.0.store(true, Ordering::Relaxed);
    }
}

/// `true` if the calling process looks like a daemon: it is its own session
/// leader, or its parent is the init process.
fn looks_like_daemon() -> bool {
    unsafe { libc::getpid() == libc::getsid(0) || libc::getppid() == 1 }
}

/// `true` if `fd` currently refers to a regular file (as opposed to a tty,
/// socket, or pipe) — the caller has redirected logging to a file and wants
/// it to stay there even if the process is also a daemon.
fn is_regular_file(fd: std::os::fd::RawFd) -> bool {
    unsafe {
        let mut stat: libc::stat = std::mem::zeroed();
        if libc::fstat(fd, &mut stat) != 0 {
            return false;
        }
        (stat.st_mode & libc::S_IFMT) == libc::S_IFREG
    }
}

/// Resolves `strategy` to a concrete destination for one emission, given the
/// currently-designated log descriptor and the sticky daemon cache.
pub fn resolve(
    strategy: LogRoutingStrategy,
    descriptor: std::os::fd::RawFd,
    cache: &DaemonCache,
) -> Destination {
    match strategy {
        LogRoutingStrategy::Suppress => Destination::Suppress,
        LogRoutingStrategy::StandardError => Destination::StandardError,
        LogRoutingStrategy::SystemLog => Destination::SystemLog,
        LogRoutingStrategy::Automatic => {
            if is_regular_file(descriptor) {
                Destination::StandardError
            } else if cache.get() {
                Destination::SystemLog
            } else if looks_like_daemon() {
                cache.set();
                Destination::SystemLog
            } else {
                Destination::StandardError
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strategy_round_trips_through_its_wire_character() {
        for s in [
            LogRoutingStrategy::Automatic,
            LogRoutingStrategy::StandardError,
            LogRoutingStrategy::SystemLog,
            LogRoutingStrategy::Suppress,
        ] {
            let rendered = s.to_string();
            assert_eq!(rendered.parse::<LogRoutingStrategy>().unwrap(), s);
        }
    }

    #[test]
    fn explicit_strategies_never_consult_process_state() {
        let cache = DaemonCache::default();
        assert_eq!(
            resolve(LogRoutingStrategy::Suppress, 2, &cache),
            Destination::Suppress
        );
        assert_eq!(
            resolve(LogRoutingStrategy::SystemLog, 2, &cache),
            Destination::SystemLog
        );
        assert!(!cache.get());
    }

    #[test]
    fn daemon_cache_is_sticky() {
        let cache = DaemonCache::default();
        assert!(!cache.get());
        cache.set();
        assert!(cache.get());
    }
}
