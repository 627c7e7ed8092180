//! Error types for audit netlink operations.

use std::io;

/// Result type for audit netlink operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while talking to the kernel audit subsystem.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error from a socket syscall.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Caller-supplied input rejected before any I/O took place.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Kernel accepted the request but acknowledged it with an error code.
    #[error("kernel error: {message} (errno {errno})")]
    Kernel {
        /// The errno value from the kernel.
        errno: i32,
        /// Human-readable error message.
        message: String,
    },

    /// Reply datagram filled the receive buffer; its tail may be missing.
    #[error("reply exceeds the {capacity}-byte receive buffer")]
    TooLarge {
        /// Size of the receive buffer.
        capacity: usize,
    },

    /// Reply frame violates netlink length rules.
    #[error("malformed reply: {0}")]
    Malformed(String),

    /// Reply sender address was not a netlink address.
    #[error("bad sender address length: expected {expected}, got {actual}")]
    AddressLength {
        /// Expected address structure size.
        expected: usize,
        /// Reported address length.
        actual: usize,
    },

    /// Reply did not originate from the kernel.
    #[error("spoofed reply: sender port id {port_id} is not the kernel")]
    Spoofed {
        /// Netlink port id the datagram claimed to come from.
        port_id: u32,
    },

    /// Transport accepted fewer bytes than the framed length.
    #[error("partial send: wrote {written} of {expected} bytes")]
    PartialSend {
        /// Bytes the transport accepted.
        written: usize,
        /// Full framed length.
        expected: usize,
    },
}

impl Error {
    /// Create a kernel error from the (negative) errno embedded in an ack.
    pub fn from_errno(errno: i32) -> Self {
        let message = io::Error::from_raw_os_error(-errno).to_string();
        Self::Kernel {
            errno: -errno,
            message,
        }
    }

    /// Get the errno value if this is a kernel error.
    pub fn errno(&self) -> Option<i32> {
        match self {
            Self::Kernel { errno, .. } => Some(*errno),
            _ => None,
        }
    }

    /// Check if this is a permission error (EPERM, EACCES).
    pub fn is_permission_denied(&self) -> bool {
        matches!(self.errno(), Some(1) | Some(13))
    }

    /// Check if this is a wire-protocol failure (framing, addressing,
    /// partial transmission) rather than a kernel or OS report.
    pub fn is_protocol(&self) -> bool {
        matches!(
            self,
            Self::TooLarge { .. }
                | Self::Malformed(_)
                | Self::AddressLength { .. }
                | Self::PartialSend { .. }
        )
    }

    /// Check if the reply was rejected because its sender was not the kernel.
    pub fn is_spoofed(&self) -> bool {
        matches!(self, Self::Spoofed { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_errno_negates_the_embedded_code() {
        let err = Error::from_errno(-13); // EACCES
        assert_eq!(err.errno(), Some(13));
        assert!(err.is_permission_denied());
        assert!(err.to_string().contains("errno 13"));
    }

    #[test]
    fn from_errno_eperm() {
        let err = Error::from_errno(-1);
        assert!(err.is_permission_denied());
        assert_eq!(err.errno(), Some(1));
    }

    #[test]
    fn protocol_classification() {
        assert!(Error::TooLarge { capacity: 8986 }.is_protocol());
        assert!(Error::Malformed("short".into()).is_protocol());
        assert!(
            Error::AddressLength {
                expected: 12,
                actual: 8
            }
            .is_protocol()
        );
        assert!(
            Error::PartialSend {
                written: 4,
                expected: 16
            }
            .is_protocol()
        );
        assert!(!Error::from_errno(-13).is_protocol());
        assert!(!Error::Spoofed { port_id: 99 }.is_protocol());
    }

    #[test]
    fn spoofed_classification() {
        assert!(Error::Spoofed { port_id: 4321 }.is_spoofed());
        assert!(!Error::InvalidArgument("x".into()).is_spoofed());
    }

    #[test]
    fn error_messages() {
        let err = Error::Spoofed { port_id: 4321 };
        assert_eq!(
            err.to_string(),
            "spoofed reply: sender port id 4321 is not the kernel"
        );

        let err = Error::PartialSend {
            written: 10,
            expected: 24,
        };
        assert_eq!(err.to_string(), "partial send: wrote 10 of 24 bytes");
    }
}
