//! Netlink client for the Linux kernel audit subsystem.
//!
//! This crate implements the user-space side of the audit netlink dialect:
//! a privileged process registers itself as the kernel's audit-event
//! receiver and then exchanges control requests, synchronous acks, and
//! asynchronous event records over a single raw `NETLINK_AUDIT` socket.
//!
//! The surrounding daemon (main loop, log writing, signal handling) is
//! not part of this crate; it composes these pieces.
//!
//! # Example
//!
//! ```ignore
//! use auditlink::{Connection, Peek, ReceiveMode, ReplyBody, WaitMode};
//!
//! let mut conn = Connection::open()?;
//!
//! // Become the kernel's audit listener.
//! conn.register_listener(std::process::id(), WaitMode::Wait)?;
//!
//! // Read event records as they arrive.
//! while let Some(reply) = conn.receive(ReceiveMode::Blocking, Peek::Consume)? {
//!     if let ReplyBody::Generic(record) = reply.body {
//!         println!("{}: {}", reply.header.nlmsg_type, String::from_utf8_lossy(record));
//!     }
//! }
//! # Ok::<(), auditlink::Error>(())
//! ```

pub mod connection;
pub mod error;
pub mod message;
pub mod reply;
pub mod sequence;
pub mod socket;
pub mod status;

pub use connection::{Connection, Peek, ReceiveMode, SignalSender, WaitMode};
pub use error::{Error, Result};
pub use message::{MAX_AUDIT_MESSAGE_LENGTH, NlMsgError, NlMsgHdr};
pub use reply::{Reply, ReplyBody};
pub use sequence::SequenceCounter;
pub use socket::AuditSocket;
pub use status::{AuditSignalInfo, AuditStatus, LogSplit, LogSplitStatus};
