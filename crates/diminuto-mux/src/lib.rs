//! A readiness multiplexor over `mio::Poll`: registration is keyed directly
//! on raw descriptors rather than caller-chosen tokens, registration and
//! unregistration are both idempotent, and `wait` folds `EINTR` into "no
//! descriptor became ready" rather than surfacing it as an error — matching
//! a classic single-threaded `select`/`poll` event loop where a signal
//! arriving mid-wait is routine, not exceptional.
//!
//! `mio` has no notion of out-of-band/exception readiness distinct from
//! ordinary readability, so exception registration piggybacks on the
//! readable interest and is reported through its own queue by bookkeeping
//! alone, not a distinct epoll event. This is a deliberate narrowing,
//! adequate for descriptors (serial devices, UDP sockets) that never raise
//! true out-of-band conditions in the first place.

use mio::unix::SourceFd;
use mio::{Events, Interest, Poll, Token};
use std::collections::{HashMap, VecDeque};
use std::os::fd::RawFd;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum MuxError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Default, Clone, Copy)]
struct Registration {
    read: bool,
    write: bool,
    exception: bool,
}

impl Registration {
    fn interest(&self) -> Option<Interest> {
        let mut interest: Option<Interest> = None;
        if self.read || self.exception {
            interest = Some(Interest::READABLE);
        }
        if self.write {
            interest = Some(interest.map_or(Interest::WRITABLE, |i| i | Interest::WRITABLE));
        }
        interest
    }

    fn is_empty(&self) -> bool {
        !self.read && !self.write && !self.exception
    }
}

/// A readiness multiplexor over a set of raw file descriptors.
pub struct Multiplexor {
    poll: Poll,
    events: Events,
    registrations: HashMap<RawFd, Registration>,
    ready_read: VecDeque<RawFd>,
    ready_write: VecDeque<RawFd>,
    ready_exception: VecDeque<RawFd>,
}

fn token_for(fd: RawFd) -> Token {
    Token(fd as usize)
}

impl Multiplexor {
    /// `capacity` bounds how many readiness events are drained from the
    /// kernel in a single [`wait`](Multiplexor::wait) call.
    pub fn new(capacity: usize) -> Result<Self, MuxError> {
        Ok(Self {
            poll: Poll::new()?,
            events: Events::with_capacity(capacity),
            registrations: HashMap::new(),
            ready_read: VecDeque::new(),
            ready_write: VecDeque::new(),
            ready_exception: VecDeque::new(),
        })
    }

    fn apply(&mut self, fd: RawFd, registration: Registration) -> Result<(), MuxError> {
        let existed = self.registrations.contains_key(&fd);

        match registration.interest() {
            None => {
                if existed {
                    self.poll.registry().deregister(&mut SourceFd(&fd))?;
                    self.registrations.remove(&fd);
                }
            }
            Some(interest) => {
                if existed {
                    self.poll
                        .registry()
                        .reregister(&mut SourceFd(&fd), token_for(fd), interest)?;
                } else {
                    self.poll
                        .registry()
                        .register(&mut SourceFd(&fd), token_for(fd), interest)?;
                }
                self.registrations.insert(fd, registration);
            }
        }

        Ok(())
    }

    fn current(&self, fd: RawFd) -> Registration {
        self.registrations.get(&fd).copied().unwrap_or_default()
    }

    /// Registers `fd` for readability. A no-op if already registered for it.
    pub fn register_read(&mut self, fd: RawFd) -> Result<(), MuxError> {
        let mut r = self.current(fd);
        r.read = true;
        self.apply(fd, r)
    }

    /// Registers `fd` for writability. A no-op if already registered for it.
    pub fn register_write(&mut self, fd: RawFd) -> Result<(), MuxError> {
        let mut r = self.current(fd);
        r.write = true;
        self.apply(fd, r)
    }

    /// Registers `fd` for exception/out-of-band conditions. A no-op if
    /// already registered for it.
    pub fn register_exception(&mut self, fd: RawFd) -> Result<(), MuxError> {
        let mut r = self.current(fd);
        r.exception = true;
        self.apply(fd, r)
    }

    /// Reverses [`register_read`](Multiplexor::register_read). A no-op if
    /// `fd` was not registered for reading.
    pub fn unregister_read(&mut self, fd: RawFd) -> Result<(), MuxError> {
        let mut r = self.current(fd);
        r.read = false;
        self.apply(fd, r)
    }

    pub fn unregister_write(&mut self, fd: RawFd) -> Result<(), MuxError> {
        let mut r = self.current(fd);
        r.write = false;
        self.apply(fd, r)
    }

    pub fn unregister_exception(&mut self, fd: RawFd) -> Result<(), MuxError> {
        let mut r = self.current(fd);
        r.exception = false;
        self.apply(fd, r)
    }

    /// Drops every registration for `fd` in one call, as if all three
    /// `unregister_*` calls had been made.
    pub fn close(&mut self, fd: RawFd) -> Result<(), MuxError> {
        self.apply(fd, Registration::default())
    }

    /// Blocks until at least one descriptor is ready or `timeout` elapses,
    /// then populates the ready queues. Returns the number of readiness
    /// events observed (which may be `0` on timeout or on a signal
    /// interrupting the wait — both are reported the same way, never as an
    /// error).
    pub fn wait(&mut self, timeout: Duration) -> Result<usize, MuxError> {
        match self.poll.poll(&mut self.events, Some(timeout)) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => return Ok(0),
            Err(e) => return Err(e.into()),
        }

        let mut count = 0;
        for event in self.events.iter() {
            let fd = event.token().0 as RawFd;
            let registration = self.current(fd);

            if event.is_readable() {
                if registration.read {
                    self.ready_read.push_back(fd);
                    count += 1;
                }
                if registration.exception {
                    self.ready_exception.push_back(fd);
                    count += 1;
                }
            }
            if event.is_writable() && registration.write {
                self.ready_write.push_back(fd);
                count += 1;
            }
        }

        Ok(count)
    }

    /// Pops the next readable descriptor from this wait cycle, or `None`
    /// when there are no more.
    pub fn ready_read(&mut self) -> Option<RawFd> {
        self.ready_read.pop_front()
    }

    pub fn ready_write(&mut self) -> Option<RawFd> {
        self.ready_write.pop_front()
    }

    pub fn ready_exception(&mut self) -> Option<RawFd> {
        self.ready_exception.pop_front()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::os::fd::AsRawFd;

    #[test]
    fn registering_and_waiting_reports_readable_pipe() {
        let (reader, mut writer) = nix_pipe();
        let mut mux = Multiplexor::new(8).unwrap();
        mux.register_read(reader.as_raw_fd()).unwrap();

        writer.write_all(b"x").unwrap();

        let ready = mux.wait(Duration::from_secs(1)).unwrap();
        assert_eq!(ready, 1);
        assert_eq!(mux.ready_read(), Some(reader.as_raw_fd()));
        assert_eq!(mux.ready_read(), None);
    }

    #[test]
    fn unregistering_makes_the_descriptor_invisible_again() {
        let (reader, mut writer) = nix_pipe();
        let mut mux = Multiplexor::new(8).unwrap();
        mux.register_read(reader.as_raw_fd()).unwrap();
        mux.unregister_read(reader.as_raw_fd()).unwrap();

        writer.write_all(b"x").unwrap();

        let ready = mux.wait(Duration::from_millis(50)).unwrap();
        assert_eq!(ready, 0);
    }

    #[test]
    fn double_registration_is_idempotent() {
        let (reader, _writer) = nix_pipe();
        let mut mux = Multiplexor::new(8).unwrap();
        mux.register_read(reader.as_raw_fd()).unwrap();
        mux.register_read(reader.as_raw_fd()).unwrap();
        assert_eq!(mux.registrations.len(), 1);
    }

    fn nix_pipe() -> (std::fs::File, std::fs::File) {
        use std::os::fd::FromRawFd;
        let mut fds = [0i32; 2];
        let rc = unsafe { libc::pipe(fds.as_mut_ptr()) };
        assert_eq!(rc, 0);
        unsafe {
            (
                std::fs::File::from_raw_fd(fds[0]),
                std::fs::File::from_raw_fd(fds[1]),
            )
        }
    }
}
