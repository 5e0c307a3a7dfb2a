use crate::error::{Error, Result};
use crate::event::{Event, InputEvent};
use crate::sys;
use nix::errno::Errno;
use nix::poll::{PollFd, PollFlags, PollTimeout, poll};
use std::io;
use std::os::fd::BorrowedFd;
use std::path::Path;
use tracing::trace;

/// Readable and writable event endpoint shared by real and virtual devices.
///
/// Reads never block: an empty queue is `Ok(None)` or an empty batch. Writes are not
/// seen by other readers until a `SYN_REPORT` follows them; nothing here adds one.
pub trait EventIo {
    /// Descriptor for external readiness multiplexing
    fn fileno(&self) -> Result<BorrowedFd<'_>>;

    /// Path the descriptor was opened from
    fn path(&self) -> &Path;

    /// Whether the descriptor was opened with write access
    fn writable(&self) -> bool;

    /// Next pending event, if any.
    fn read_one(&self) -> Result<Option<InputEvent>> {
        let mut buf = [sys::input_event::zeroed()];
        match sys::read_events(self.fileno()?, &mut buf) {
            Ok(0) => Ok(None),
            Ok(_) => Ok(Some(InputEvent::from_raw(&buf[0]))),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(None),
            Err(e) => Err(Error::Io {
                op: "read",
                source: e,
            }),
        }
    }

    /// Every event queued right now, in delivery order.
    fn read(&self) -> Result<Events> {
        let fd = self.fileno()?;
        let mut raw = Vec::new();
        let mut chunk = [sys::input_event::zeroed(); sys::READ_BATCH];
        loop {
            match sys::read_events(fd, &mut chunk) {
                Ok(n) => {
                    raw.extend_from_slice(&chunk[..n]);
                    if n < sys::READ_BATCH {
                        break;
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) if raw.is_empty() => {
                    return Err(Error::Io {
                        op: "read",
                        source: e,
                    });
                }
                // Hand over what already arrived; the error resurfaces on the next call.
                Err(_) => break,
            }
        }
        trace!("Read {} events from {}", raw.len(), self.path().display());
        Ok(Events {
            raw: raw.into_iter(),
        })
    }

    /// Block until the descriptor is readable, then yield its events, forever.
    ///
    /// Stop by dropping the iterator. After an error the iterator ends.
    fn read_loop(&self) -> ReadLoop<'_, Self>
    where
        Self: Sized,
    {
        ReadLoop {
            io: self,
            batch: Events::empty(),
            done: false,
        }
    }

    /// Inject one event
    fn write(&self, type_: u16, code: u16, value: i32) -> Result<()> {
        if !self.writable() {
            return Err(Error::NoWriteAccess {
                path: self.path().to_path_buf(),
            });
        }
        let raw = InputEvent::now(type_, code, value).to_raw();
        sys::write_record(self.fileno()?, &raw).map_err(Error::io("write"))?;
        trace!("Wrote type {} code {} value {}", type_, code, value);
        Ok(())
    }

    /// Inject a raw or typed event
    fn write_event(&self, event: impl Into<Event>) -> Result<()>
    where
        Self: Sized,
    {
        let ev = event.into().input_event();
        self.write(ev.type_, ev.code, ev.value)
    }
}

/// One read's worth of events.
#[derive(Debug)]
pub struct Events {
    raw: std::vec::IntoIter<sys::input_event>,
}
impl Events {
    fn empty() -> Self {
        Self {
            raw: Vec::new().into_iter(),
        }
    }
}
impl Iterator for Events {
    type Item = InputEvent;

    fn next(&mut self) -> Option<InputEvent> {
        self.raw.next().map(|raw| InputEvent::from_raw(&raw))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.raw.size_hint()
    }
}
impl ExactSizeIterator for Events {}

/// Blocking iterator returned by [`EventIo::read_loop`].
pub struct ReadLoop<'a, T: EventIo> {
    io: &'a T,
    batch: Events,
    done: bool,
}
impl<T: EventIo> ReadLoop<'_, T> {
    fn wait_readable(&self) -> Result<()> {
        let fd = self.io.fileno()?;
        loop {
            let mut fds = [PollFd::new(fd, PollFlags::POLLIN)];
            match poll(&mut fds, PollTimeout::NONE) {
                Ok(_) => return Ok(()),
                Err(Errno::EINTR) => continue,
                Err(errno) => {
                    return Err(Error::Io {
                        op: "poll",
                        source: io::Error::from(errno),
                    });
                }
            }
        }
    }
}
impl<T: EventIo> Iterator for ReadLoop<'_, T> {
    type Item = Result<InputEvent>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        loop {
            if let Some(ev) = self.batch.next() {
                return Some(Ok(ev));
            }
            // Another reader may drain the queue between poll and read; that gives an
            // empty batch and another wait.
            let refill = self.wait_readable().and_then(|_| self.io.read());
            match refill {
                Ok(batch) => self.batch = batch,
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::ecodes::{EV_KEY, EV_SYN, KEY_A, KEY_P, SYN_REPORT};
    use crate::event::KeyEvent;
    use std::os::fd::{AsFd, FromRawFd, OwnedFd};
    use std::path::PathBuf;

    /// Endpoint over a non-blocking pipe: reads come from `rx`, writes go to `tx`.
    pub(crate) struct Pipe {
        pub rx: OwnedFd,
        pub tx: OwnedFd,
        pub path: PathBuf,
        pub writable: bool,
    }
    impl Pipe {
        pub fn new(writable: bool) -> Self {
            let mut fds = [0; 2];
            let ret = unsafe { libc::pipe2(fds.as_mut_ptr(), libc::O_NONBLOCK | libc::O_CLOEXEC) };
            assert_eq!(ret, 0, "pipe2: {}", io::Error::last_os_error());
            Self {
                rx: unsafe { OwnedFd::from_raw_fd(fds[0]) },
                tx: unsafe { OwnedFd::from_raw_fd(fds[1]) },
                path: PathBuf::from("/test/pipe"),
                writable,
            }
        }

        /// Queue events as the kernel would deliver them
        pub fn feed(&self, events: &[InputEvent]) {
            for ev in events {
                sys::write_record(self.tx.as_fd(), &ev.to_raw()).unwrap();
            }
        }
    }
    impl EventIo for Pipe {
        fn fileno(&self) -> Result<BorrowedFd<'_>> {
            Ok(self.rx.as_fd())
        }

        fn path(&self) -> &Path {
            &self.path
        }

        fn writable(&self) -> bool {
            self.writable
        }
    }

    fn key(code: u16, value: i32, usec: u64) -> InputEvent {
        InputEvent {
            sec: 100,
            usec,
            type_: EV_KEY,
            code,
            value,
        }
    }

    #[test]
    fn test_read_one_on_empty_queue() {
        let pipe = Pipe::new(true);
        assert_eq!(pipe.read_one().unwrap(), None);
        assert_eq!(pipe.read().unwrap().count(), 0);
    }

    #[test]
    fn test_read_preserves_delivery_order() {
        let pipe = Pipe::new(true);
        let sent = [key(KEY_P, 1, 1), key(KEY_A, 1, 2), key(KEY_P, 0, 3)];
        pipe.feed(&sent);

        assert_eq!(pipe.read_one().unwrap(), Some(sent[0]));
        let rest: Vec<_> = pipe.read().unwrap().collect();
        assert_eq!(rest, sent[1..].to_vec());
        assert_eq!(pipe.read_one().unwrap(), None);
    }

    #[test]
    fn test_read_drains_more_than_one_batch() {
        let pipe = Pipe::new(true);
        let sent: Vec<_> = (0..150).map(|i| key(KEY_A, i % 2, i as u64)).collect();
        pipe.feed(&sent);

        let events = pipe.read().unwrap();
        assert_eq!(events.len(), 150);
        assert_eq!(events.collect::<Vec<_>>(), sent);
    }

    #[test]
    fn test_read_loop_yields_queued_events() {
        let pipe = Pipe::new(true);
        let sent = [key(KEY_P, 1, 1), key(KEY_P, 0, 2)];
        pipe.feed(&sent);

        let got: Vec<_> = pipe.read_loop().take(2).map(|r| r.unwrap()).collect();
        assert_eq!(got, sent.to_vec());
    }

    #[test]
    fn test_write_requires_write_access() {
        let pipe = Pipe::new(false);
        let err = pipe.write(EV_KEY, KEY_P, 1).unwrap_err();
        assert!(matches!(err, Error::NoWriteAccess { .. }));
        let err = pipe
            .write_event(KeyEvent::new(InputEvent::new(EV_KEY, KEY_P, 1)))
            .unwrap_err();
        assert!(matches!(err, Error::NoWriteAccess { .. }));
    }

    /// Writes land on the pipe's read end when the endpoint writes to it.
    struct Loopback(Pipe);
    impl EventIo for Loopback {
        fn fileno(&self) -> Result<BorrowedFd<'_>> {
            Ok(self.0.tx.as_fd())
        }

        fn path(&self) -> &Path {
            &self.0.path
        }

        fn writable(&self) -> bool {
            true
        }
    }

    #[test]
    fn test_write_event_uses_canonical_fields() {
        let lo = Loopback(Pipe::new(true));
        lo.write_event(KeyEvent::new(InputEvent::new(EV_KEY, KEY_P, 1))).unwrap();
        lo.write_event(InputEvent::new(EV_SYN, SYN_REPORT, 0)).unwrap();

        let got: Vec<_> = lo.0.read().unwrap().map(|e| (e.type_, e.code, e.value)).collect();
        assert_eq!(got, vec![(EV_KEY, KEY_P, 1), (EV_SYN, SYN_REPORT, 0)]);
    }
}
