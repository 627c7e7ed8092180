//! Netlink message framing for the audit protocol.

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::error::{Error, Result};

/// Netlink message header alignment.
pub const NLMSG_ALIGNTO: usize = 4;

/// Align a length to NLMSG_ALIGNTO boundary.
#[inline]
pub const fn nlmsg_align(len: usize) -> usize {
    (len + NLMSG_ALIGNTO - 1) & !(NLMSG_ALIGNTO - 1)
}

/// Size of the netlink message header.
pub const NLMSG_HDRLEN: usize = nlmsg_align(std::mem::size_of::<NlMsgHdr>());

/// Total aligned size of a message carrying `payload_len` payload bytes.
#[inline]
pub const fn nlmsg_space(payload_len: usize) -> usize {
    nlmsg_align(NLMSG_HDRLEN + payload_len)
}

/// Largest payload the kernel accepts in one audit frame.
pub const MAX_AUDIT_MESSAGE_LENGTH: usize = 8970;

/// Receive buffer size: one header plus the largest possible payload.
///
/// A datagram that fills this buffer completely is reported as too large
/// rather than malformed, since the tail may have been cut off.
pub const AUDIT_RECEIVE_BUFFER_LEN: usize = NLMSG_HDRLEN + MAX_AUDIT_MESSAGE_LENGTH;

/// Error message or ACK.
pub const NLMSG_ERROR: u16 = 2;

// Audit control message types (from linux/audit.h).
/// Query status.
pub const AUDIT_GET: u16 = 1000;
/// Apply status fields.
pub const AUDIT_SET: u16 = 1001;
/// Info about the sender of a signal to the audit daemon.
pub const AUDIT_SIGNAL_INFO: u16 = 1010;
/// List syscall filtering rules.
pub const AUDIT_LIST_RULES: u16 = 1013;
/// Vendor extension: toggle splitting of audit output across destinations.
pub const AUDIT_LOGSPLIT_SET: u16 = 1020;

/// Netlink message flags.
pub const NLM_F_REQUEST: u16 = 0x01;
pub const NLM_F_ACK: u16 = 0x04;

/// Netlink message header (mirrors struct nlmsghdr).
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct NlMsgHdr {
    /// Length of message including header.
    pub nlmsg_len: u32,
    /// Message type.
    pub nlmsg_type: u16,
    /// Additional flags.
    pub nlmsg_flags: u16,
    /// Sequence number.
    pub nlmsg_seq: u32,
    /// Sending process port ID.
    pub nlmsg_pid: u32,
}

impl NlMsgHdr {
    /// Create a new message header.
    pub fn new(msg_type: u16, flags: u16) -> Self {
        Self {
            nlmsg_len: NLMSG_HDRLEN as u32,
            nlmsg_type: msg_type,
            nlmsg_flags: flags,
            nlmsg_seq: 0,
            nlmsg_pid: 0,
        }
    }

    /// Check if this is an error message.
    pub fn is_error(&self) -> bool {
        self.nlmsg_type == NLMSG_ERROR
    }

    /// Convert header to bytes.
    pub fn as_bytes(&self) -> &[u8] {
        <Self as IntoBytes>::as_bytes(self)
    }

    /// Parse header from bytes.
    pub fn from_bytes(data: &[u8]) -> Result<&Self> {
        Self::ref_from_prefix(data)
            .map(|(r, _)| r)
            .map_err(|_| Error::Malformed(format!("header needs {NLMSG_HDRLEN} bytes, got {}", data.len())))
    }
}

/// Netlink error message payload.
#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, Immutable, KnownLayout)]
pub struct NlMsgError {
    /// Error code (negative errno or 0 for ACK).
    pub error: i32,
    /// Original message header that caused the error.
    pub msg: NlMsgHdr,
}

impl NlMsgError {
    /// Check if this is an ACK (no error).
    pub fn is_ack(&self) -> bool {
        self.error == 0
    }
}

/// Assemble an audit request frame: header, then the payload padded out to
/// netlink alignment. The header length covers the whole aligned frame.
///
/// Callers validate the payload size against [`MAX_AUDIT_MESSAGE_LENGTH`]
/// before building.
pub fn build_request(msg_type: u16, sequence: i16, payload: &[u8]) -> Vec<u8> {
    let total = nlmsg_space(payload.len());

    let mut header = NlMsgHdr::new(msg_type, NLM_F_REQUEST | NLM_F_ACK);
    header.nlmsg_len = total as u32;
    header.nlmsg_seq = sequence as u32;

    let mut buf = vec![0u8; total];
    buf[..std::mem::size_of::<NlMsgHdr>()].copy_from_slice(header.as_bytes());
    buf[NLMSG_HDRLEN..NLMSG_HDRLEN + payload.len()].copy_from_slice(payload);
    buf
}
