//! The eight syslog-compatible severities and the one-hot mask bit each maps
//! to. Values are chosen to equal the corresponding GNU/Linux syslog
//! priority constants (`LOG_EMERG` through `LOG_DEBUG`), so a [`LogPriority`]
//! can be passed to `libc::syslog` unchanged.

use std::sync::atomic::{AtomicU8, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum LogPriority {
    Emergency = 0,
    Alert = 1,
    Critical = 2,
    Error = 3,
    Warning = 4,
    Notice = 5,
    Information = 6,
    Debug = 7,
}

/// Message emitted via [`emit`](crate::emit) with no mask check.
pub const DEFAULT_PRIORITY: LogPriority = LogPriority::Notice;

/// Priority used by [`perror`](crate::perror)/[`serror`](crate::serror).
pub const PERROR_PRIORITY: LogPriority = LogPriority::Error;

const TAGS: [&str; 8] = ["EMER", "ALRT", "CRIT", "EROR", "WARN", "NOTE", "INFO", "DBUG"];

impl LogPriority {
    /// The four-character tag bracketed in every emitted line, e.g. `WARN`.
    pub fn tag(self) -> &'static str {
        TAGS[self as usize]
    }

    /// The single mask bit gating this priority: highest severity occupies
    /// the high-order bit.
    pub fn to_mask(self) -> u8 {
        1u8 << (7 - self as u8)
    }
}

/// The 8-bit bitfield gating which priorities are emitted. One bit per
/// [`LogPriority`]; process-wide, mutated rarely, read on every call.
pub struct LogMask(AtomicU8);

/// Emergency through Notice set, Information and Debug clear.
pub const DEFAULT_MASK: u8 = 0b1111_1100;

/// All eight bits set — what the environment/file grammar's `~0` means.
pub const ALL_MASK: u8 = 0xFF;

impl Default for LogMask {
    fn default() -> Self {
        Self(AtomicU8::new(DEFAULT_MASK))
    }
}

impl LogMask {
    pub fn get(&self) -> u8 {
        self.0.load(Ordering::Relaxed)
    }

    pub fn set(&self, value: u8) {
        self.0.store(value, Ordering::Relaxed);
    }

    /// `true` if any bit of `priority`'s mask is currently set.
    pub fn is_enabled(&self, priority: LogPriority) -> bool {
        (self.get() & priority.to_mask()) != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emergency_occupies_the_high_bit() {
        assert_eq!(LogPriority::Emergency.to_mask(), 0b1000_0000);
        assert_eq!(LogPriority::Debug.to_mask(), 0b0000_0001);
    }

    #[test]
    fn default_mask_enables_emergency_through_notice_only() {
        let mask = LogMask::default();
        assert!(mask.is_enabled(LogPriority::Notice));
        assert!(mask.is_enabled(LogPriority::Error));
        assert!(!mask.is_enabled(LogPriority::Information));
        assert!(!mask.is_enabled(LogPriority::Debug));
    }

    #[test]
    fn setting_a_single_bit_gates_exactly_that_priority() {
        let mask = LogMask::default();
        mask.set(LogPriority::Warning.to_mask());
        assert!(mask.is_enabled(LogPriority::Warning));
        assert!(!mask.is_enabled(LogPriority::Information));
        assert!(!mask.is_enabled(LogPriority::Error));
    }
}
