//! Kernel ABI payload structures for audit control requests and replies.

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

// Audit status mask bits: which fields of AuditStatus the kernel should apply.
pub const AUDIT_STATUS_ENABLED: u32 = 0x0001;
pub const AUDIT_STATUS_FAILURE: u32 = 0x0002;
pub const AUDIT_STATUS_PID: u32 = 0x0004;
pub const AUDIT_STATUS_RATE_LIMIT: u32 = 0x0008;
pub const AUDIT_STATUS_BACKLOG_LIMIT: u32 = 0x0010;

/// Log splitting disabled.
pub const AUDIT_LOGSPLIT_OFF: u32 = 0;
/// Log splitting enabled.
pub const AUDIT_LOGSPLIT_ON: u32 = 1;

/// Audit status structure (mirrors struct audit_status from linux/audit.h).
///
/// Sent with `AUDIT_SET` to apply the fields named by `mask`, and returned
/// by the kernel in `AUDIT_GET` replies with every field populated.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct AuditStatus {
    /// Bit mask selecting which fields a SET request applies.
    pub mask: u32,
    /// 1 = enabled, 0 = disabled, 2 = immutable.
    pub enabled: u32,
    /// Action on failure to log.
    pub failure: u32,
    /// PID of the registered audit listener.
    pub pid: u32,
    /// Message rate limit (per second).
    pub rate_limit: u32,
    /// Waiting messages limit.
    pub backlog_limit: u32,
    /// Messages lost.
    pub lost: u32,
    /// Messages waiting in queue.
    pub backlog: u32,
    /// Kernel audit feature bitmap / version.
    pub feature_bitmap: u32,
    /// Message queue wait timeout.
    pub backlog_wait_time: u32,
    /// Time spent waiting while the queue was full.
    pub backlog_wait_time_actual: u32,
}

impl AuditStatus {
    /// Build the payload that registers `pid` as the audit listener.
    pub fn listener(pid: u32) -> Self {
        Self {
            mask: AUDIT_STATUS_PID,
            pid,
            ..Default::default()
        }
    }

    /// Check if auditing is enabled.
    pub fn is_enabled(&self) -> bool {
        self.enabled == 1
    }

    /// Check if auditing is locked (immutable).
    pub fn is_locked(&self) -> bool {
        self.enabled == 2
    }
}

/// Payload for the vendor log-split toggle.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct LogSplitStatus {
    /// [`AUDIT_LOGSPLIT_OFF`] or [`AUDIT_LOGSPLIT_ON`].
    pub enabled: u32,
}

/// Log-split toggle state.
///
/// Only [`Off`](LogSplit::Off) and [`On`](LogSplit::On) are transmittable;
/// any other value is rejected before a request is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogSplit {
    /// Audit output goes to a single destination.
    Off,
    /// Audit output is divided across destinations.
    On,
    /// A value outside the protocol, carried for reporting only.
    Unknown(u32),
}

impl LogSplit {
    /// Parse a toggle value from its numeric form.
    pub fn from_u32(val: u32) -> Self {
        match val {
            AUDIT_LOGSPLIT_OFF => Self::Off,
            AUDIT_LOGSPLIT_ON => Self::On,
            other => Self::Unknown(other),
        }
    }

    /// Get the numeric value.
    pub fn as_u32(&self) -> u32 {
        match self {
            Self::Off => AUDIT_LOGSPLIT_OFF,
            Self::On => AUDIT_LOGSPLIT_ON,
            Self::Unknown(n) => *n,
        }
    }
}

/// Fixed head of an `AUDIT_SIGNAL_INFO` reply; the sender's security
/// context string follows it in the payload.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct AuditSignalInfo {
    /// UID of the process that signalled the audit daemon.
    pub uid: u32,
    /// PID of the process that signalled the audit daemon.
    pub pid: u32,
}
