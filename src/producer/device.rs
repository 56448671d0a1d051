//! Pointer device node opened for reactor-driven reads.
//!
//! The node is opened with `O_NONBLOCK` and registered with the Tokio reactor
//! through [`AsyncFd`]. A read waiting on an idle mouse is then just a pending
//! future: dropping it (on shutdown) leaves nothing running, so the runtime
//! can exit without waiting for the next movement.

use std::fs::{File, OpenOptions};
use std::io::{self, Read};
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;
use std::pin::Pin;
use std::task::{ready, Context, Poll};
use tokio::io::unix::AsyncFd;
use tokio::io::{AsyncRead, ReadBuf};

/// Non-blocking handle to a `mousedev` node (or any pollable stream)
#[derive(Debug)]
pub struct PointerDevice {
    inner: AsyncFd<File>,
}

impl PointerDevice {
    /// Opens `path` read-only.
    ///
    /// Must be called from inside a Tokio runtime with I/O enabled.
    ///
    /// # Errors
    ///
    /// Fails if the node cannot be opened or does not support polling
    /// (regular files, for instance).
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .custom_flags(libc::O_NONBLOCK)
            .open(path)?;

        Ok(Self {
            inner: AsyncFd::new(file)?,
        })
    }
}

impl AsyncRead for PointerDevice {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        loop {
            let mut guard = ready!(self.inner.poll_read_ready(cx))?;

            let unfilled = buf.initialize_unfilled();
            match guard.try_io(|inner| inner.get_ref().read(unfilled)) {
                Ok(Ok(len)) => {
                    buf.advance(len);
                    return Poll::Ready(Ok(()));
                }
                Ok(Err(e)) => return Poll::Ready(Err(e)),
                // Readiness was stale; wait for the next event
                Err(_would_block) => continue,
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::ffi::CString;
    use std::os::unix::ffi::OsStrExt;
    use std::path::Path;

    /// Creates a named pipe standing in for a device node
    pub fn make_fifo(path: &Path) {
        let c_path = CString::new(path.as_os_str().as_bytes()).unwrap();
        let rc = unsafe { libc::mkfifo(c_path.as_ptr(), 0o600) };
        assert_eq!(rc, 0, "mkfifo failed: {}", std::io::Error::last_os_error());
    }
}
