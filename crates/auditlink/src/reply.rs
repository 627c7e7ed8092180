//! Decoding and validation of datagrams received from the kernel.

use std::mem;

use zerocopy::FromBytes;

use crate::error::{Error, Result};
use crate::message::{
    AUDIT_GET, AUDIT_LIST_RULES, AUDIT_RECEIVE_BUFFER_LEN, AUDIT_SIGNAL_INFO, NLMSG_ERROR,
    NLMSG_HDRLEN, NlMsgError, NlMsgHdr,
};
use crate::status::{AuditSignalInfo, AuditStatus};

/// Receive buffer sized for the largest audit frame.
///
/// Netlink headers are 4-byte aligned; keeping the buffer aligned lets the
/// reply views be zero-copy references into it.
#[repr(align(4))]
pub(crate) struct ReceiveBuffer(pub(crate) [u8; AUDIT_RECEIVE_BUFFER_LEN]);

impl ReceiveBuffer {
    pub(crate) fn new() -> Box<Self> {
        Box::new(Self([0; AUDIT_RECEIVE_BUFFER_LEN]))
    }
}

/// One decoded reply datagram.
///
/// The body borrows the connection's receive buffer and is valid only until
/// the next receive call reuses it.
#[derive(Debug)]
pub struct Reply<'a> {
    /// The netlink header of the reply.
    pub header: NlMsgHdr,
    /// The payload view selected by the header's type field.
    pub body: ReplyBody<'a>,
}

/// Reply payload, dispatched strictly on the header's type field.
#[derive(Debug)]
pub enum ReplyBody<'a> {
    /// Error report or ack (`NLMSG_ERROR`).
    Error(&'a NlMsgError),
    /// Registration status (`AUDIT_GET`).
    Status(&'a AuditStatus),
    /// One rule-list entry (`AUDIT_LIST_RULES`), left opaque: rule
    /// semantics are audit policy, outside this client.
    RuleList(&'a [u8]),
    /// Signal-sender report (`AUDIT_SIGNAL_INFO`).
    SignalInfo {
        /// Fixed head: uid and pid of the sender.
        info: &'a AuditSignalInfo,
        /// Security context string following the head.
        context: &'a [u8],
    },
    /// Fallback view over the raw payload for every other type, which is
    /// how asynchronous audit event records arrive.
    Generic(&'a [u8]),
}

/// Validate the sender of a received datagram.
///
/// The kernel always reports a full netlink address with port id 0; any
/// other sender is treated as a spoofing attempt.
pub fn validate_sender(sender: &libc::sockaddr_nl, sender_len: libc::socklen_t) -> Result<()> {
    let expected = mem::size_of::<libc::sockaddr_nl>();
    if sender_len as usize != expected {
        tracing::error!(
            reported = sender_len,
            "reply sender address has the wrong length"
        );
        return Err(Error::AddressLength {
            expected,
            actual: sender_len as usize,
        });
    }

    if sender.nl_pid != 0 {
        tracing::error!(
            port_id = sender.nl_pid,
            "rejecting audit reply not sent by the kernel"
        );
        return Err(Error::Spoofed {
            port_id: sender.nl_pid,
        });
    }

    Ok(())
}

/// Decode a validated datagram of `len` bytes sitting in `buf`.
///
/// `buf` is the full receive buffer: a datagram that filled it to capacity
/// is reported as [`Error::TooLarge`], any other framing violation as
/// [`Error::Malformed`].
pub fn decode(buf: &[u8], len: usize) -> Result<Reply<'_>> {
    let header = match NlMsgHdr::from_bytes(buf) {
        Ok(header) => *header,
        Err(_) => return Err(framing_error(buf, len)),
    };

    // NLMSG_OK: the datagram holds a header and the declared frame fits
    // inside what was actually received.
    let frame_len = header.nlmsg_len as usize;
    if len < NLMSG_HDRLEN || frame_len < NLMSG_HDRLEN || frame_len > len {
        return Err(framing_error(buf, len));
    }

    let payload = &buf[NLMSG_HDRLEN..frame_len];

    let body = match header.nlmsg_type {
        NLMSG_ERROR => {
            let (error, _) = NlMsgError::ref_from_prefix(payload)
                .map_err(|_| Error::Malformed(format!("error reply of {} bytes", payload.len())))?;
            ReplyBody::Error(error)
        }
        AUDIT_GET => {
            let (status, _) = AuditStatus::ref_from_prefix(payload)
                .map_err(|_| Error::Malformed(format!("status reply of {} bytes", payload.len())))?;
            ReplyBody::Status(status)
        }
        AUDIT_LIST_RULES => ReplyBody::RuleList(payload),
        AUDIT_SIGNAL_INFO => {
            let (info, context) = AuditSignalInfo::ref_from_prefix(payload).map_err(|_| {
                Error::Malformed(format!("signal-info reply of {} bytes", payload.len()))
            })?;
            ReplyBody::SignalInfo { info, context }
        }
        _ => ReplyBody::Generic(payload),
    };

    Ok(Reply { header, body })
}

fn framing_error(buf: &[u8], len: usize) -> Error {
    tracing::error!(len, "bad kernel response");
    if len == buf.len() {
        Error::TooLarge { capacity: buf.len() }
    } else {
        Error::Malformed(format!("frame of {len} bytes fails netlink length rules"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{AUDIT_SET, NLM_F_REQUEST};

    fn kernel_sender() -> (libc::sockaddr_nl, libc::socklen_t) {
        // SAFETY: zeroed sockaddr_nl is a valid value for every field.
        let mut addr: libc::sockaddr_nl = unsafe { mem::zeroed() };
        addr.nl_family = libc::AF_NETLINK as libc::sa_family_t;
        (addr, mem::size_of::<libc::sockaddr_nl>() as libc::socklen_t)
    }

    /// Write a frame into `buf` and return its datagram length.
    fn put_frame(buf: &mut ReceiveBuffer, msg_type: u16, seq: u32, payload: &[u8]) -> usize {
        let len = NLMSG_HDRLEN + payload.len();
        let mut header = NlMsgHdr::new(msg_type, 0);
        header.nlmsg_len = len as u32;
        header.nlmsg_seq = seq;
        buf.0[..mem::size_of::<NlMsgHdr>()].copy_from_slice(header.as_bytes());
        buf.0[NLMSG_HDRLEN..len].copy_from_slice(payload);
        len
    }

    fn error_payload(code: i32, original: NlMsgHdr) -> Vec<u8> {
        let mut payload = code.to_ne_bytes().to_vec();
        payload.extend_from_slice(original.as_bytes());
        payload
    }

    #[test]
    fn kernel_sender_is_accepted() {
        let (addr, len) = kernel_sender();
        assert!(validate_sender(&addr, len).is_ok());
    }

    #[test]
    fn nonzero_port_id_is_spoofed() {
        let (mut addr, len) = kernel_sender();
        addr.nl_pid = 4321;
        match validate_sender(&addr, len) {
            Err(Error::Spoofed { port_id }) => assert_eq!(port_id, 4321),
            other => panic!("expected Spoofed, got {other:?}"),
        }
    }

    #[test]
    fn short_address_is_a_protocol_fault() {
        let (addr, len) = kernel_sender();
        match validate_sender(&addr, len - 1) {
            Err(err @ Error::AddressLength { .. }) => assert!(err.is_protocol()),
            other => panic!("expected AddressLength, got {other:?}"),
        }
    }

    #[test]
    fn ack_with_zero_code_decodes_as_error_body() {
        let mut buf = ReceiveBuffer::new();
        let original = NlMsgHdr::new(AUDIT_SET, NLM_F_REQUEST);
        let len = put_frame(&mut buf, NLMSG_ERROR, 5, &error_payload(0, original));

        let reply = decode(&buf.0, len).unwrap();
        assert_eq!(reply.header.nlmsg_seq, 5);
        match reply.body {
            ReplyBody::Error(err) => {
                assert!(err.is_ack());
                assert_eq!(err.msg.nlmsg_type, AUDIT_SET);
            }
            other => panic!("expected Error body, got {other:?}"),
        }
    }

    #[test]
    fn rejection_code_is_carried_through() {
        let mut buf = ReceiveBuffer::new();
        let original = NlMsgHdr::new(AUDIT_SET, NLM_F_REQUEST);
        let len = put_frame(&mut buf, NLMSG_ERROR, 9, &error_payload(-13, original));

        let reply = decode(&buf.0, len).unwrap();
        match reply.body {
            ReplyBody::Error(err) => assert_eq!(err.error, -13),
            other => panic!("expected Error body, got {other:?}"),
        }
    }

    #[test]
    fn status_reply_decodes_into_the_status_view() {
        let status = AuditStatus {
            enabled: 1,
            pid: 1234,
            backlog: 7,
            ..Default::default()
        };
        let mut buf = ReceiveBuffer::new();
        let len = put_frame(&mut buf, AUDIT_GET, 2, zerocopy::IntoBytes::as_bytes(&status));

        let reply = decode(&buf.0, len).unwrap();
        match reply.body {
            ReplyBody::Status(decoded) => {
                assert_eq!(decoded.pid, 1234);
                assert_eq!(decoded.backlog, 7);
                assert!(decoded.is_enabled());
            }
            other => panic!("expected Status body, got {other:?}"),
        }
    }

    #[test]
    fn signal_info_splits_head_and_context() {
        let mut payload = Vec::new();
        payload.extend_from_slice(&1000u32.to_ne_bytes()); // uid
        payload.extend_from_slice(&4242u32.to_ne_bytes()); // pid
        payload.extend_from_slice(b"system_u:system_r:init_t\0");

        let mut buf = ReceiveBuffer::new();
        let len = put_frame(&mut buf, AUDIT_SIGNAL_INFO, 3, &payload);

        let reply = decode(&buf.0, len).unwrap();
        match reply.body {
            ReplyBody::SignalInfo { info, context } => {
                assert_eq!(info.uid, 1000);
                assert_eq!(info.pid, 4242);
                assert_eq!(context, b"system_u:system_r:init_t\0".as_slice());
            }
            other => panic!("expected SignalInfo body, got {other:?}"),
        }
    }

    #[test]
    fn rule_list_stays_opaque() {
        let mut buf = ReceiveBuffer::new();
        let len = put_frame(&mut buf, AUDIT_LIST_RULES, 4, &[0xaa; 32]);

        let reply = decode(&buf.0, len).unwrap();
        match reply.body {
            ReplyBody::RuleList(data) => assert_eq!(data, &[0xaa; 32][..]),
            other => panic!("expected RuleList body, got {other:?}"),
        }
    }

    #[test]
    fn unrecognized_type_falls_back_to_generic() {
        let mut buf = ReceiveBuffer::new();
        // 1300 is a syscall event record
        let len = put_frame(&mut buf, 1300, 0, b"audit(123.456:789): arch=c000003e");

        let reply = decode(&buf.0, len).unwrap();
        match reply.body {
            ReplyBody::Generic(data) => assert!(data.starts_with(b"audit(")),
            other => panic!("expected Generic body, got {other:?}"),
        }
    }

    #[test]
    fn runt_datagram_is_malformed() {
        let buf = ReceiveBuffer::new();
        match decode(&buf.0, NLMSG_HDRLEN - 1) {
            Err(Error::Malformed(_)) => {}
            other => panic!("expected Malformed, got {other:?}"),
        }
    }

    #[test]
    fn declared_length_beyond_datagram_is_malformed() {
        let mut buf = ReceiveBuffer::new();
        let len = put_frame(&mut buf, AUDIT_GET, 1, &[0u8; 8]);
        // Claim four more bytes than were received.
        let bogus = (len as u32 + 4).to_ne_bytes();
        buf.0[..4].copy_from_slice(&bogus);

        match decode(&buf.0, len) {
            Err(Error::Malformed(_)) => {}
            other => panic!("expected Malformed, got {other:?}"),
        }
    }

    #[test]
    fn declared_length_under_header_size_is_malformed() {
        let mut buf = ReceiveBuffer::new();
        let len = put_frame(&mut buf, AUDIT_GET, 1, &[0u8; 8]);
        buf.0[..4].copy_from_slice(&8u32.to_ne_bytes());

        match decode(&buf.0, len) {
            Err(Error::Malformed(_)) => {}
            other => panic!("expected Malformed, got {other:?}"),
        }
    }

    #[test]
    fn full_buffer_with_bad_framing_is_too_large() {
        let mut buf = ReceiveBuffer::new();
        let capacity = buf.0.len();
        let _ = put_frame(&mut buf, AUDIT_GET, 1, &[0u8; 8]);
        // Frame claims more than the buffer holds and the datagram filled
        // the buffer: the tail was likely truncated by the transport.
        buf.0[..4].copy_from_slice(&(capacity as u32 + 64).to_ne_bytes());

        match decode(&buf.0, capacity) {
            Err(Error::TooLarge { capacity: reported }) => assert_eq!(reported, capacity),
            other => panic!("expected TooLarge, got {other:?}"),
        }
    }

    #[test]
    fn short_error_payload_is_malformed() {
        let mut buf = ReceiveBuffer::new();
        let len = put_frame(&mut buf, NLMSG_ERROR, 1, &[0u8; 4]);

        match decode(&buf.0, len) {
            Err(Error::Malformed(_)) => {}
            other => panic!("expected Malformed, got {other:?}"),
        }
    }
}
