//! Identifier types shared across the kernel

use std::fmt;

/// Context annotation of a scheduled event, usually a node identifier
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ContextId(pub u32);

impl ContextId {
    /// Sentinel used during setup and for events scheduled without context
    pub const NONE: ContextId = ContextId(u32::MAX);

    #[inline]
    pub fn new(id: u32) -> Self {
        ContextId(id)
    }

    #[inline]
    pub fn is_none(self) -> bool {
        self == Self::NONE
    }
}

impl Default for ContextId {
    fn default() -> Self {
        Self::NONE
    }
}

impl fmt::Debug for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_none() {
            write!(f, "Context(-)")
        } else {
            write!(f, "Context({})", self.0)
        }
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_none() {
            f.write_str("-1")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

/// Insertion ticket of a scheduled event
///
/// Tickets are handed out by a monotonically increasing 64-bit counter; the
/// first few values are reserved.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct EventUid(pub u64);

impl EventUid {
    /// No event
    pub const INVALID: EventUid = EventUid(0);
    /// Ticket of events fired by `Destroy`
    pub const DESTROY: EventUid = EventUid(2);
    /// First ticket handed to a scheduled event
    pub const FIRST: EventUid = EventUid(4);

    #[inline]
    pub fn next(self) -> Self {
        EventUid(self.0 + 1)
    }
}

impl fmt::Debug for EventUid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Uid({})", self.0)
    }
}
