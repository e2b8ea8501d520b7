//! The fixed prefix stamped on every emitted line: an ISO-8601 UTC
//! timestamp, a cached host name, the priority tag, the process ID, and the
//! thread ID, followed by the caller's message.

use crate::priority::LogPriority;
use once_cell::sync::OnceCell;

/// Hard limit on one formatted line, matching the fixed-size stack buffer
/// the routine it's grounded on uses; a line that would exceed it is
/// truncated rather than split across more than one write.
pub const BUFFER_MAXIMUM: usize = 1024;

fn hostname() -> &'static str {
    static CACHE: OnceCell<String> = OnceCell::new();
    CACHE.get_or_init(|| {
        let mut buf = vec![0u8; 256];
        let rc = unsafe { libc::gethostname(buf.as_mut_ptr() as *mut libc::c_char, buf.len()) };
        if rc != 0 {
            return "localhost".to_string();
        }
        let len = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
        String::from_utf8_lossy(&buf[..len]).into_owned()
    })
}

/// Renders one complete line, newline-terminated, truncated to
/// [`BUFFER_MAXIMUM`] bytes if the message is long enough to overflow it.
pub fn format_line(priority: LogPriority, message: &str) -> Vec<u8> {
    let timestamp = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%S%.9fZ");
    let pid = unsafe { libc::getpid() };
    let tid = unsafe { libc::pthread_self() } as u64;

    let mut line = format!(
        "{timestamp} \"{}\" <{}> [{pid}] {{{tid:x}}} {message}",
        hostname(),
        priority.tag(),
    );
    if !line.ends_with('\n') {
        line.push('\n');
    }

    let mut bytes = line.into_bytes();
    if bytes.len() > BUFFER_MAXIMUM {
        bytes.truncate(BUFFER_MAXIMUM - 1);
        bytes.push(b'\n');
    }
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formatted_line_carries_tag_and_ends_in_newline() {
        let line = format_line(LogPriority::Warning, "disk nearly full");
        let text = String::from_utf8(line).unwrap();
        assert!(text.contains("<WARN>"));
        assert!(text.contains("disk nearly full"));
        assert!(text.ends_with('\n'));
    }

    #[test]
    fn oversized_message_is_truncated_not_split() {
        let huge = "x".repeat(BUFFER_MAXIMUM * 2);
        let line = format_line(LogPriority::Debug, &huge);
        assert!(line.len() <= BUFFER_MAXIMUM);
        assert_eq!(*line.last().unwrap(), b'\n');
    }
}
