//! Low-level NETLINK_AUDIT socket operations.

use std::io;
use std::mem;
use std::os::unix::io::{AsRawFd, RawFd};

use netlink_sys::{Socket, SocketAddr, protocols};

use crate::error::Result;

/// Owner of one raw kernel-audit socket descriptor.
///
/// The socket stays in blocking mode; per-call polling is done with
/// `MSG_DONTWAIT` instead of toggling the descriptor.
pub struct AuditSocket {
    inner: Socket,
}

impl AuditSocket {
    /// Create a raw audit-family socket.
    ///
    /// Binds with an unspecified address so the kernel assigns a port id
    /// immediately; unicasts queued before the first send are then
    /// deliverable.
    pub fn open() -> Result<Self> {
        let mut socket = Socket::new(protocols::NETLINK_AUDIT)?;
        let addr = SocketAddr::new(0, 0);
        socket.bind(&addr)?;
        Ok(Self { inner: socket })
    }

    /// Release the descriptor. A failing close is logged, never propagated;
    /// dropping the handle closes silently instead.
    pub fn close(self) {
        let fd = self.inner.as_raw_fd();
        // SAFETY: forgetting the inner socket releases its claim on fd, so
        // the close below is the only one.
        mem::forget(self.inner);
        if unsafe { libc::close(fd) } < 0 {
            tracing::warn!(
                fd,
                error = %io::Error::last_os_error(),
                "closing the audit socket failed"
            );
        }
    }

    /// Transmit one frame to the kernel endpoint, retrying on interrupt.
    ///
    /// Returns the number of bytes the transport accepted; the caller
    /// decides whether a short count is fatal.
    pub fn send_to_kernel(&self, frame: &[u8]) -> Result<usize> {
        let kernel = SocketAddr::new(0, 0);
        loop {
            match self.inner.send_to(frame, &kernel, 0) {
                Ok(written) => return Ok(written),
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => {
                    tracing::error!(error = %err, "sending over the audit netlink socket failed");
                    return Err(err.into());
                }
            }
        }
    }

    /// Receive one datagram, retrying on interrupt.
    ///
    /// `flags` may carry `MSG_PEEK` (leave the datagram queued) and
    /// `MSG_DONTWAIT` (fail with `WouldBlock` instead of suspending).
    /// Returns the byte count together with the sender address and its
    /// reported length, which the reply layer validates.
    pub fn recv_datagram(
        &self,
        buf: &mut [u8],
        flags: libc::c_int,
    ) -> io::Result<(usize, libc::sockaddr_nl, libc::socklen_t)> {
        let fd = self.inner.as_raw_fd();
        loop {
            // SAFETY: zeroed sockaddr_nl is a valid value for every field.
            let mut sender: libc::sockaddr_nl = unsafe { mem::zeroed() };
            let mut sender_len = mem::size_of::<libc::sockaddr_nl>() as libc::socklen_t;

            // SAFETY: buf is a live writable slice, and sender/sender_len
            // point at storage of the advertised size for the whole call.
            let received = unsafe {
                libc::recvfrom(
                    fd,
                    buf.as_mut_ptr().cast(),
                    buf.len(),
                    flags,
                    (&mut sender as *mut libc::sockaddr_nl).cast(),
                    &mut sender_len,
                )
            };

            if received < 0 {
                let err = io::Error::last_os_error();
                if err.kind() == io::ErrorKind::Interrupted {
                    continue;
                }
                return Err(err);
            }

            return Ok((received as usize, sender, sender_len));
        }
    }
}

impl AsRawFd for AuditSocket {
    fn as_raw_fd(&self) -> RawFd {
        self.inner.as_raw_fd()
    }
}
