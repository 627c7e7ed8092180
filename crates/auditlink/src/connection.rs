//! Audit netlink connection: the request/ack exchange and the control
//! operations built on it.

use std::io;
use std::os::unix::io::{AsRawFd, RawFd};

use zerocopy::IntoBytes;

use crate::error::{Error, Result};
use crate::message::{
    AUDIT_GET, AUDIT_LOGSPLIT_SET, AUDIT_SET, AUDIT_SIGNAL_INFO, MAX_AUDIT_MESSAGE_LENGTH,
    NLMSG_ERROR, build_request, nlmsg_space,
};
use crate::reply::{ReceiveBuffer, Reply, ReplyBody, decode, validate_sender};
use crate::sequence::SequenceCounter;
use crate::socket::AuditSocket;
use crate::status::{AuditStatus, LogSplit, LogSplitStatus};

/// Whether a receive suspends until a datagram arrives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiveMode {
    /// Suspend until the kernel answers or an error occurs.
    Blocking,
    /// Return immediately; an empty queue is a success, not an error.
    NonBlocking,
}

/// Whether a receive consumes the datagram or leaves it queued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Peek {
    /// Remove the datagram from the socket queue.
    Consume,
    /// Look at the datagram but leave it queued.
    Leave,
}

/// Whether a control operation drains the kernel's confirmation event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitMode {
    /// Return as soon as the request is acknowledged.
    NoWait,
    /// Additionally attempt one non-blocking drain of the confirmation.
    Wait,
}

/// The uid/pid (and security context, when present) of the last process
/// that sent a signal to the audit daemon.
#[derive(Debug, Clone)]
pub struct SignalSender {
    /// UID of the sender.
    pub uid: u32,
    /// PID of the sender.
    pub pid: u32,
    /// Security context of the sender, if the kernel reported one.
    pub context: Option<String>,
}

/// A client connection to the kernel audit subsystem.
///
/// Owns the socket, the sequence counter, and the receive buffer that reply
/// views borrow from. All operations take `&mut self`: the protocol assumes
/// a single writer, and the borrow checker enforces it.
///
/// # Example
///
/// ```ignore
/// use auditlink::{Connection, ReceiveMode, Peek, ReplyBody, WaitMode};
///
/// let mut conn = Connection::open()?;
/// conn.register_listener(std::process::id(), WaitMode::Wait)?;
///
/// loop {
///     if let Some(reply) = conn.receive(ReceiveMode::Blocking, Peek::Consume)? {
///         if let ReplyBody::Generic(record) = reply.body {
///             handle_event(reply.header.nlmsg_type, record);
///         }
///     }
/// }
/// ```
pub struct Connection {
    socket: AuditSocket,
    sequence: SequenceCounter,
    recv_buf: Box<ReceiveBuffer>,
}

impl Connection {
    /// Open a connection on a fresh audit socket.
    pub fn open() -> Result<Self> {
        Ok(Self::from_parts(AuditSocket::open()?, SequenceCounter::new()))
    }

    /// Build a connection from an already-open socket and a counter.
    ///
    /// The counter is injected rather than global so its state is visible
    /// to callers and testable in isolation.
    pub fn from_parts(socket: AuditSocket, sequence: SequenceCounter) -> Self {
        Self {
            socket,
            sequence,
            recv_buf: ReceiveBuffer::new(),
        }
    }

    /// Close the underlying socket, logging (not propagating) any failure.
    pub fn close(self) {
        self.socket.close();
    }

    /// The most recently issued sequence number.
    pub fn sequence(&self) -> i16 {
        self.sequence.current()
    }

    /// Send a request and wait for the kernel's acknowledgment.
    ///
    /// Returns the sequence number the request was sent under. A reply of a
    /// different type pending on the socket (for example an event record)
    /// is left queued for [`receive`](Self::receive).
    pub fn send(&mut self, msg_type: u16, payload: &[u8]) -> Result<i16> {
        let sequence = self.transmit(msg_type, payload)?;
        self.wait_for_ack(sequence)?;
        Ok(sequence)
    }

    /// Frame and transmit one request without waiting for the ack.
    ///
    /// The sequence number is consumed once validation passes, even if the
    /// transmission itself then fails: the ack-matching logic is built on
    /// that consumption point.
    fn transmit(&mut self, msg_type: u16, payload: &[u8]) -> Result<i16> {
        if nlmsg_space(payload.len()) > MAX_AUDIT_MESSAGE_LENGTH {
            return Err(Error::InvalidArgument(format!(
                "payload of {} bytes exceeds the audit frame ceiling",
                payload.len()
            )));
        }

        let sequence = self.sequence.next();
        let frame = build_request(msg_type, sequence, payload);

        let written = self.socket.send_to_kernel(&frame)?;
        if written != frame.len() {
            return Err(Error::PartialSend {
                written,
                expected: frame.len(),
            });
        }

        Ok(sequence)
    }

    /// Wait for the ack correlated to `sequence`.
    ///
    /// Peeks the next pending reply. An error-type reply is consumed: code
    /// zero means accepted, anything else is surfaced as a kernel error. A
    /// reply of any other type stays queued for the caller; a sequence
    /// mismatch is only worth a warning.
    fn wait_for_ack(&mut self, sequence: i16) -> Result<()> {
        let (kind, mut acked) = {
            let reply = self.receive_blocking(Peek::Leave)?;
            (reply.header.nlmsg_type, reply.header.nlmsg_seq)
        };

        if kind == NLMSG_ERROR {
            let reply = self.receive_blocking(Peek::Consume)?;
            acked = reply.header.nlmsg_seq;
            if let ReplyBody::Error(err) = reply.body {
                if !err.is_ack() {
                    return Err(Error::from_errno(err.error));
                }
            }
        }

        if acked as i16 != sequence {
            tracing::warn!(
                expected = sequence,
                received = acked,
                "ack sequence out of skew with the kernel"
            );
        }

        Ok(())
    }

    /// Receive one reply datagram.
    ///
    /// In non-blocking mode an empty queue is the success path `Ok(None)`.
    /// Interrupts are retried internally and never surface. On success the
    /// sender is validated (full netlink address, port id 0) before the
    /// datagram is decoded; the returned views borrow the receive buffer
    /// and die at the next receive.
    pub fn receive(&mut self, mode: ReceiveMode, peek: Peek) -> Result<Option<Reply<'_>>> {
        let mut flags = 0;
        if mode == ReceiveMode::NonBlocking {
            flags |= libc::MSG_DONTWAIT;
        }
        if peek == Peek::Leave {
            flags |= libc::MSG_PEEK;
        }

        let (len, sender, sender_len) = match self.socket.recv_datagram(&mut self.recv_buf.0, flags)
        {
            Ok(received) => received,
            Err(err)
                if mode == ReceiveMode::NonBlocking && err.kind() == io::ErrorKind::WouldBlock =>
            {
                return Ok(None);
            }
            Err(err) => {
                tracing::error!(error = %err, "receiving from the audit netlink socket failed");
                return Err(err.into());
            }
        };

        validate_sender(&sender, sender_len)?;
        decode(&self.recv_buf.0, len).map(Some)
    }

    fn receive_blocking(&mut self, peek: Peek) -> Result<Reply<'_>> {
        match self.receive(ReceiveMode::Blocking, peek)? {
            Some(reply) => Ok(reply),
            // receive() only maps would-block to None in non-blocking mode,
            // so a blocking receive always carries a reply.
            None => Err(Error::Io(io::Error::from(io::ErrorKind::WouldBlock))),
        }
    }

    /// Register `pid` as the process receiving kernel audit events.
    ///
    /// Sends an `AUDIT_SET` whose payload carries the pid and the pid field
    /// mask. With [`WaitMode::Wait`], one non-blocking receive then drains
    /// the kernel's confirmation event. A listener that restarted may never
    /// see that event, so its absence is tolerated.
    pub fn register_listener(&mut self, pid: u32, wait: WaitMode) -> Result<()> {
        let status = AuditStatus::listener(pid);

        self.send(AUDIT_SET, status.as_bytes())
            .inspect_err(|err| tracing::error!(pid, error = %err, "registering the audit listener failed"))?;

        if wait == WaitMode::Wait {
            let _ = self.receive(ReceiveMode::NonBlocking, Peek::Consume);
        }

        Ok(())
    }

    /// Toggle splitting of audit output across destinations.
    ///
    /// Anything other than [`LogSplit::Off`] or [`LogSplit::On`] is rejected
    /// before any I/O occurs.
    pub fn set_log_split(&mut self, split: LogSplit, wait: WaitMode) -> Result<()> {
        if let LogSplit::Unknown(value) = split {
            return Err(Error::InvalidArgument(format!(
                "log-split value {value:#x} is neither off nor on"
            )));
        }

        let status = LogSplitStatus {
            enabled: split.as_u32(),
        };

        self.send(AUDIT_LOGSPLIT_SET, status.as_bytes())
            .inspect_err(|err| tracing::error!(error = %err, "toggling audit log splitting failed"))?;

        if wait == WaitMode::Wait {
            let _ = self.receive(ReceiveMode::NonBlocking, Peek::Consume);
        }

        Ok(())
    }

    /// Query the kernel's audit status.
    ///
    /// The kernel answers an `AUDIT_GET` with a status reply and an ack,
    /// in either order; both are consumed so the queue is clean for event
    /// receipt afterwards.
    pub fn status(&mut self) -> Result<AuditStatus> {
        self.transmit(AUDIT_GET, &[])?;

        let mut result: Option<AuditStatus> = None;
        let mut acked = false;
        loop {
            let reply = self.receive_blocking(Peek::Consume)?;
            match reply.body {
                ReplyBody::Error(err) => {
                    if !err.is_ack() {
                        return Err(Error::from_errno(err.error));
                    }
                    acked = true;
                }
                ReplyBody::Status(status) => result = Some(*status),
                _ => {
                    return Err(Error::Malformed(format!(
                        "unexpected reply type {} to a status query",
                        reply.header.nlmsg_type
                    )));
                }
            }
            if acked && let Some(status) = result {
                return Ok(status);
            }
        }
    }

    /// Ask which process last sent a signal to the audit daemon.
    pub fn signal_info(&mut self) -> Result<SignalSender> {
        self.transmit(AUDIT_SIGNAL_INFO, &[])?;

        let mut result: Option<SignalSender> = None;
        let mut acked = false;
        loop {
            let reply = self.receive_blocking(Peek::Consume)?;
            match reply.body {
                ReplyBody::Error(err) => {
                    if !err.is_ack() {
                        return Err(Error::from_errno(err.error));
                    }
                    acked = true;
                }
                ReplyBody::SignalInfo { info, context } => {
                    let context = context.strip_suffix(&[0]).unwrap_or(context);
                    result = Some(SignalSender {
                        uid: info.uid,
                        pid: info.pid,
                        context: if context.is_empty() {
                            None
                        } else {
                            Some(String::from_utf8_lossy(context).into_owned())
                        },
                    });
                }
                _ => {
                    return Err(Error::Malformed(format!(
                        "unexpected reply type {} to a signal-info query",
                        reply.header.nlmsg_type
                    )));
                }
            }
            if acked && let Some(sender) = result.take() {
                return Ok(sender);
            }
        }
    }
}

impl AsRawFd for Connection {
    fn as_raw_fd(&self) -> RawFd {
        self.socket.as_raw_fd()
    }
}
