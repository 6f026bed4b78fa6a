// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Identifier types and the design-wide identity sequence.
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Canonical 256-bit hash used for frame state digests.
pub type Hash = [u8; 32];

/// Strongly typed identifier for an object in a design.
///
/// `ObjectId` values are issued by the design's [`IdentitySequence`] and are
/// unique across the whole history of that design. An id is never reissued,
/// even when the object that carried it is removed or the frame that created
/// it is discarded.
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectId(u64);

impl ObjectId {
    /// Constructs an `ObjectId` from a raw value.
    ///
    /// Intended for record restoration and tests; ids used with a live design
    /// should come from the design itself.
    #[must_use]
    pub const fn from_raw(value: u64) -> Self {
        Self(value)
    }

    /// Returns the underlying raw value.
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }
}

impl core::fmt::Display for ObjectId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Strongly typed identifier for a frame in a design.
///
/// Frame ids share the identity sequence with object ids, so a raw value is
/// never used for both an object and a frame of the same design.
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FrameId(u64);

impl FrameId {
    /// Constructs a `FrameId` from a raw value.
    #[must_use]
    pub const fn from_raw(value: u64) -> Self {
        Self(value)
    }

    /// Returns the underlying raw value.
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }
}

impl core::fmt::Display for FrameId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "frame:{}", self.0)
    }
}

/// Monotonic id generator shared by a design and all of its pending frames.
///
/// # Invariants
/// - Zero is reserved and never issued.
/// - Every call to [`IdentitySequence::next_object`] or
///   [`IdentitySequence::next_frame`] returns a value never returned before by
///   this sequence (or by any clone of it).
#[derive(Debug, Clone)]
pub struct IdentitySequence {
    next: Arc<AtomicU64>,
}

impl Default for IdentitySequence {
    fn default() -> Self {
        Self::starting_at(1)
    }
}

impl IdentitySequence {
    /// Creates a sequence whose first issued value is `first` (zero is bumped to one).
    #[must_use]
    pub fn starting_at(first: u64) -> Self {
        Self {
            next: Arc::new(AtomicU64::new(first.max(1))),
        }
    }

    fn next_raw(&self) -> u64 {
        self.next.fetch_add(1, Ordering::Relaxed)
    }

    /// Issues a fresh object id.
    pub fn next_object(&self) -> ObjectId {
        ObjectId(self.next_raw())
    }

    /// Issues a fresh frame id.
    pub fn next_frame(&self) -> FrameId {
        FrameId(self.next_raw())
    }

    /// Returns the value the next call will issue, without consuming it.
    #[must_use]
    pub fn peek(&self) -> u64 {
        self.next.load(Ordering::Relaxed)
    }

    /// Ensures the sequence never issues a value `<= seen`.
    pub fn observe(&self, seen: u64) {
        self.next.fetch_max(seen.saturating_add(1), Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_one_counter() {
        let seq = IdentitySequence::default();
        let other = seq.clone();
        let a = seq.next_object();
        let b = other.next_object();
        let f = seq.next_frame();
        assert_ne!(a.value(), b.value());
        assert_ne!(b.value(), f.value());
        assert_eq!(seq.peek(), 4);
    }

    #[test]
    fn zero_is_never_issued() {
        let seq = IdentitySequence::starting_at(0);
        assert_eq!(seq.next_object().value(), 1);
    }

    #[test]
    fn observe_skips_past_seen_values() {
        let seq = IdentitySequence::default();
        seq.observe(41);
        assert_eq!(seq.next_object().value(), 42);
        seq.observe(10);
        assert_eq!(seq.next_object().value(), 43);
    }
}
