//! Outbound request sequence numbering.

/// The single authority for outbound audit request sequence numbers.
///
/// The kernel echoes the sequence in its acks, so each transmission attempt
/// consumes exactly one number, even when the transmission later fails.
/// The counter is 16-bit signed to survive the narrowing casts the ack
/// correlation performs; it wraps to zero instead of ever going negative.
#[derive(Debug, Default)]
pub struct SequenceCounter {
    value: i16,
}

impl SequenceCounter {
    /// Create a fresh counter. The first issued number is 1.
    pub const fn new() -> Self {
        Self { value: 0 }
    }

    /// Issue the next sequence number.
    pub fn next(&mut self) -> i16 {
        if self.value == i16::MAX {
            tracing::warn!("audit request sequence number rolled over");
            self.value = 0;
        } else {
            self.value += 1;
        }
        self.value
    }

    /// The most recently issued number (0 on a fresh counter).
    pub fn current(&self) -> i16 {
        self.value
    }
}
