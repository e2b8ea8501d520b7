//! Administrative signal flags: `SIGHUP` requests a mask reload, `SIGINT`
//! and `SIGTERM` request an orderly shutdown. Installed once at startup and
//! polled by the event loop each iteration — a synchronous counterpart to
//! the teacher's `tokio::signal`-based `Hangup`/`Terminate` wrappers.

use signal_hook::consts::{SIGHUP, SIGINT, SIGTERM};
use signal_hook::flag;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub struct Hangup {
    flag: Arc<AtomicBool>,
}

impl Hangup {
    pub fn new() -> io::Result<Self> {
        let flag = Arc::new(AtomicBool::new(false));
        flag::register(SIGHUP, Arc::clone(&flag))?;
        Ok(Self { flag })
    }

    /// Returns `true` at most once per delivered `SIGHUP`, clearing the flag.
    pub fn consume(&self) -> bool {
        self.flag.swap(false, Ordering::Relaxed)
    }
}

pub struct Terminate {
    flag: Arc<AtomicBool>,
}

impl Terminate {
    pub fn new() -> io::Result<Self> {
        let flag = Arc::new(AtomicBool::new(false));
        flag::register(SIGINT, Arc::clone(&flag))?;
        flag::register(SIGTERM, Arc::clone(&flag))?;
        Ok(Self { flag })
    }

    pub fn consume(&self) -> bool {
        self.flag.swap(false, Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn freshly_installed_flags_are_clear() {
        let hangup = Hangup::new().unwrap();
        let terminate = Terminate::new().unwrap();
        assert!(!hangup.consume());
        assert!(!terminate.consume());
    }
}
