//! I/O event bitmask
//!
//! `EventSet` describes which events a channel is interested in, and
//! which events the poller observed. The bit values follow poll(2)
//! (`POLLIN` etc.); poller backends translate to and from their native
//! representation explicitly.

use core::fmt;
use core::ops::{BitOr, BitOrAssign};

/// A set of I/O events, as a poll(2)-style bitmask.
#[derive(Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct EventSet(u32);

impl EventSet {
    /// Empty set - no events
    pub const NONE: EventSet = EventSet(0);

    /// Data readable (POLLIN)
    pub const IN: EventSet = EventSet(0x0001);

    /// Urgent/priority data readable (POLLPRI)
    pub const PRI: EventSet = EventSet(0x0002);

    /// Writable without blocking (POLLOUT)
    pub const OUT: EventSet = EventSet(0x0004);

    /// Error condition (POLLERR) - ready set only
    pub const ERR: EventSet = EventSet(0x0008);

    /// Hang-up (POLLHUP) - ready set only
    pub const HUP: EventSet = EventSet(0x0010);

    /// Invalid descriptor (POLLNVAL) - ready set only
    pub const NVAL: EventSet = EventSet(0x0020);

    /// Peer shut down its writing half (POLLRDHUP)
    pub const RDHUP: EventSet = EventSet(0x2000);

    /// Everything a read callback should react to
    pub const READ_EVENTS: EventSet = EventSet(0x0001 | 0x0002 | 0x2000);

    /// Create from a raw bitmask
    #[inline]
    pub const fn from_bits(bits: u32) -> Self {
        EventSet(bits)
    }

    /// Raw bitmask value
    #[inline]
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// True if no bits are set
    #[inline]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// True if all bits of `other` are set in `self`
    #[inline]
    pub const fn contains(self, other: EventSet) -> bool {
        self.0 & other.0 == other.0
    }

    /// True if any bit of `other` is set in `self`
    #[inline]
    pub const fn intersects(self, other: EventSet) -> bool {
        self.0 & other.0 != 0
    }

    /// Set all bits of `other`
    #[inline]
    pub fn insert(&mut self, other: EventSet) {
        self.0 |= other.0;
    }

    /// Clear all bits of `other`
    #[inline]
    pub fn remove(&mut self, other: EventSet) {
        self.0 &= !other.0;
    }
}

impl BitOr for EventSet {
    type Output = EventSet;

    #[inline]
    fn bitor(self, rhs: EventSet) -> EventSet {
        EventSet(self.0 | rhs.0)
    }
}

impl BitOrAssign for EventSet {
    #[inline]
    fn bitor_assign(&mut self, rhs: EventSet) {
        self.0 |= rhs.0;
    }
}

impl fmt::Debug for EventSet {
    /// Compact rendering like `IN|OUT` (used in trace logs).
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "NONE");
        }
        const NAMES: [(EventSet, &str); 7] = [
            (EventSet::IN, "IN"),
            (EventSet::PRI, "PRI"),
            (EventSet::OUT, "OUT"),
            (EventSet::ERR, "ERR"),
            (EventSet::HUP, "HUP"),
            (EventSet::NVAL, "NVAL"),
            (EventSet::RDHUP, "RDHUP"),
        ];
        let mut first = true;
        for (bit, name) in NAMES {
            if self.contains(bit) {
                if !first {
                    write!(f, "|")?;
                }
                write!(f, "{}", name)?;
                first = false;
            }
        }
        let unknown = self.0 & !(0x003f | 0x2000);
        if unknown != 0 {
            if !first {
                write!(f, "|")?;
            }
            write!(f, "{:#x}", unknown)?;
        }
        Ok(())
    }
}
