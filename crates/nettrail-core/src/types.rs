use derive_more::{Add, AddAssign, Sub};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// `TimeToLive` (ttl) newtype.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Ord, PartialOrd, Add, Sub, AddAssign)]
pub struct TimeToLive(pub u8);

/// `Sequence` number newtype.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Ord, PartialOrd, Add, AddAssign)]
pub struct Sequence(pub u16);

impl Sequence {
    /// The next sequence number, wrapping at the 16 bit boundary.
    #[must_use]
    pub const fn successor(self) -> Self {
        Self(self.0.wrapping_add(1))
    }
}

impl From<Sequence> for usize {
    fn from(sequence: Sequence) -> Self {
        Self::from(sequence.0)
    }
}

/// `SessionId` newtype.
///
/// Carried as the ICMP echo identifier on every probe of a session and used
/// to discard responses belonging to other processes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Ord, PartialOrd)]
pub struct SessionId(pub u16);

/// `PacketSize` newtype.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Ord, PartialOrd)]
pub struct PacketSize(pub u16);

/// `PayloadPattern` newtype.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Ord, PartialOrd)]
pub struct PayloadPattern(pub u8);

/// A cooperative cancellation signal for a running session.
///
/// Checked at every suspension point, a cancelled session stops promptly and
/// returns the results accumulated so far.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request the session stop.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_token() {
        let token = CancelToken::new();
        assert!(!token.is_cancelled());
        let shared = token.clone();
        shared.cancel();
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_sequence_successor() {
        assert_eq!(Sequence(1), Sequence(0).successor());
        assert_eq!(Sequence(1000), Sequence(999).successor());
    }

    #[test]
    fn test_sequence_successor_wraps() {
        assert_eq!(Sequence(0), Sequence(u16::MAX).successor());
    }

    #[test]
    fn test_ttl_arithmetic() {
        assert_eq!(TimeToLive(5), TimeToLive(4) + TimeToLive(1));
        assert_eq!(TimeToLive(3), TimeToLive(4) - TimeToLive(1));
    }
}
