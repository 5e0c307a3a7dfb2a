//! tokio adapter: events from any [`EventIo`] endpoint delivered through a channel.

use crate::error::{Error, Result};
use crate::event::InputEvent;
use crate::eventio::EventIo;
use crate::sys;
use std::os::fd::{AsFd, OwnedFd};
use tokio::io::Interest;
use tokio::io::unix::AsyncFd;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

const CHANNEL_CAPACITY: usize = 256;

/// Asynchronous event source backed by a task that waits for readiness.
///
/// Dropping the stream stops the task and closes its duplicate descriptor.
pub struct EventStream {
    rx: mpsc::Receiver<Result<InputEvent>>,
    task: JoinHandle<()>,
}
impl EventStream {
    /// Start reading from a duplicate of `io`'s descriptor.
    ///
    /// Must be called from within a tokio runtime. The original endpoint stays usable,
    /// but both will compete for the same events.
    pub fn new<T: EventIo>(io: &T) -> Result<Self> {
        let fd: OwnedFd = io
            .fileno()?
            .try_clone_to_owned()
            .map_err(Error::io("dup"))?;
        let afd = AsyncFd::with_interest(fd, Interest::READABLE).map_err(Error::io("AsyncFd"))?;
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);

        debug!("Streaming events from {}", io.path().display());
        let task = tokio::spawn(Self::pump(afd, tx));
        Ok(Self { rx, task })
    }

    async fn pump(afd: AsyncFd<OwnedFd>, tx: mpsc::Sender<Result<InputEvent>>) {
        let mut buf = [sys::input_event::zeroed(); sys::READ_BATCH];
        loop {
            let mut guard = match afd.readable().await {
                Ok(guard) => guard,
                Err(e) => {
                    let _ = tx.send(Err(Error::Io { op: "poll", source: e })).await;
                    return;
                }
            };

            // WouldBlock clears readiness and sends us back to waiting.
            let n = match guard.try_io(|inner| sys::read_events(inner.get_ref().as_fd(), &mut buf)) {
                Ok(Ok(0)) => {
                    trace!("Event source reached end of file");
                    return;
                }
                Ok(Ok(n)) => n,
                Ok(Err(e)) => {
                    let _ = tx.send(Err(Error::Io { op: "read", source: e })).await;
                    return;
                }
                Err(_would_block) => continue,
            };

            for raw in &buf[..n] {
                if tx.send(Ok(InputEvent::from_raw(raw))).await.is_err() {
                    return;
                }
            }
        }
    }

    /// Next event in delivery order; `None` once the source ends or fails
    pub async fn next_event(&mut self) -> Option<Result<InputEvent>> {
        self.rx.recv().await
    }
}
impl Drop for EventStream {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecodes::{EV_KEY, EV_SYN, KEY_P, SYN_REPORT};
    use crate::eventio::tests::Pipe;
    use std::time::Duration;

    #[tokio::test]
    async fn test_stream_delivers_in_order() {
        let pipe = Pipe::new(true);
        let mut stream = EventStream::new(&pipe).unwrap();

        let sent = [
            InputEvent::new(EV_KEY, KEY_P, 1),
            InputEvent::new(EV_SYN, SYN_REPORT, 0),
            InputEvent::new(EV_KEY, KEY_P, 0),
        ];
        pipe.feed(&sent);

        for expected in sent {
            let got = tokio::time::timeout(Duration::from_secs(2), stream.next_event())
                .await
                .expect("timed out")
                .unwrap()
                .unwrap();
            assert_eq!(got, expected);
        }
    }

    #[tokio::test]
    async fn test_stream_ends_when_writer_closes() {
        let pipe = Pipe::new(true);
        let mut stream = EventStream::new(&pipe).unwrap();
        pipe.feed(&[InputEvent::new(EV_KEY, KEY_P, 1)]);
        drop(pipe);

        let first = tokio::time::timeout(Duration::from_secs(2), stream.next_event()).await.unwrap();
        assert!(matches!(first, Some(Ok(_))));
        let end = tokio::time::timeout(Duration::from_secs(2), stream.next_event()).await.unwrap();
        assert!(end.is_none());
    }
}
