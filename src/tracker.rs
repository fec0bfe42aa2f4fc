//! Requests waiting for a device response.
//!
//! A fixed-capacity circular FIFO. Requests enter when they have been
//! translated and leave either when a device response arrives (always the
//! oldest one) or when the oldest one has waited too long.

use arrayvec::ArrayVec;
use log::warn;
use snafu::{ensure, OptionExt, Snafu};

use crate::config::{MAX_REQUEST_LEN, TRACKER_CAPACITY};
use crate::mapping::EntryId;
use crate::types::CorrelationTag;

/// Error type for this module
#[derive(Debug, Snafu, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    #[snafu(display("Pending tracker full"))]
    Full,
    #[snafu(display("Request of {} bytes exceeds the pending entry size", len))]
    RequestTooLong { len: usize },
}

/// A control request awaiting its device response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingEntry {
    pub request: ArrayVec<u8, MAX_REQUEST_LEN>,
    pub tag: CorrelationTag,
    /// Clock reading when the request was queued.
    pub timestamp_ms: u32,
    /// Mapping entry that translated the request.
    pub mapping: EntryId,
}

impl PendingEntry {
    /// Milliseconds since the request was queued, wrap-around safe.
    pub fn age(&self, now_ms: u32) -> u32 {
        now_ms.wrapping_sub(self.timestamp_ms)
    }
}

#[derive(Debug, Clone)]
pub struct PendingTracker<const N: usize = TRACKER_CAPACITY> {
    slots: [Option<PendingEntry>; N],
    /// Next slot to write.
    head: usize,
    /// Oldest occupied slot.
    tail: usize,
    count: usize,
}

impl<const N: usize> Default for PendingTracker<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> PendingTracker<N> {
    pub fn new() -> Self {
        Self {
            slots: core::array::from_fn(|_| None),
            head: 0,
            tail: 0,
            count: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        N
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn is_full(&self) -> bool {
        self.count == N
    }

    /// Queue a copy of `request`, stamped with `now_ms`.
    /// # Errors
    /// [`Error::Full`] when no slot is free, [`Error::RequestTooLong`] when
    /// the request doesn't fit a pending entry.
    pub fn push(
        &mut self,
        request: &[u8],
        tag: CorrelationTag,
        mapping: EntryId,
        now_ms: u32,
    ) -> Result<(), Error> {
        ensure!(!self.is_full(), FullSnafu);
        let request = ArrayVec::try_from(request)
            .ok()
            .context(RequestTooLongSnafu { len: request.len() })?;

        self.slots[self.head] = Some(PendingEntry {
            request,
            tag,
            timestamp_ms: now_ms,
            mapping,
        });
        self.head = (self.head + 1) % N;
        self.count += 1;
        self.check_cursors();
        Ok(())
    }

    /// Remove and return the oldest entry.
    pub fn pop(&mut self) -> Option<PendingEntry> {
        if self.is_empty() {
            return None;
        }
        let entry = self.slots[self.tail].take();
        self.tail = (self.tail + 1) % N;
        self.count -= 1;
        self.check_cursors();
        entry
    }

    /// The oldest entry, left in place.
    pub fn peek(&self) -> Option<&PendingEntry> {
        if self.is_empty() {
            return None;
        }
        self.slots[self.tail].as_ref()
    }

    /// Remove the oldest entry if it is at least `timeout_ms` old.
    ///
    /// Only the oldest entry is inspected; call repeatedly to flush a run of
    /// expired entries.
    pub fn remove_if_expired(&mut self, timeout_ms: u32, now_ms: u32) -> Option<PendingEntry> {
        let age = self.peek()?.age(now_ms);
        if age < timeout_ms {
            return None;
        }
        let entry = self.pop();
        if let Some(e) = &entry {
            warn!(
                "Request {:02X?} expired after {} ms without response",
                e.request.as_slice(),
                age
            );
        }
        entry
    }

    /// Drop every pending entry.
    pub fn clear(&mut self) {
        self.slots.iter_mut().for_each(|slot| *slot = None);
        self.head = 0;
        self.tail = 0;
        self.count = 0;
    }

    /// Pending entries, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &PendingEntry> {
        (0..self.count).filter_map(move |i| self.slots[(self.tail + i) % N].as_ref())
    }

    fn check_cursors(&self) {
        debug_assert!(self.count <= N);
        debug_assert_eq!((self.tail + self.count) % N, self.head);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(n: u8) -> [u8; 9] {
        [0xAA, 0x05, 0x00, 0x16, 0x01, n, 0xC6u8.wrapping_add(n), 0xEB, 0xAA]
    }

    fn push(tracker: &mut PendingTracker, n: u8, now_ms: u32) -> Result<(), Error> {
        tracker.push(&request(n), CorrelationTag::None, EntryId::default(), now_ms)
    }

    #[test]
    fn test_fifo_order() {
        let mut tracker = PendingTracker::<16>::new();
        assert!(tracker.is_empty());
        for n in 0..10 {
            push(&mut tracker, n, u32::from(n)).unwrap();
        }
        assert_eq!(tracker.len(), 10);
        for n in 0..10 {
            let entry = tracker.pop().unwrap();
            assert_eq!(entry.request.as_slice(), &request(n));
            assert_eq!(entry.timestamp_ms, u32::from(n));
        }
        assert_eq!(tracker.pop(), None);
    }

    #[test]
    fn test_capacity() {
        let mut tracker = PendingTracker::<16>::new();
        assert_eq!(tracker.capacity(), 16);
        for n in 0..16 {
            push(&mut tracker, n, 0).unwrap();
        }
        assert!(tracker.is_full());
        assert_eq!(push(&mut tracker, 16, 0), Err(Error::Full));
        assert_eq!(tracker.len(), 16);
    }

    #[test]
    fn test_wraps_around() {
        let mut tracker = PendingTracker::<4>::new();
        for round in 0..5u8 {
            for n in 0..3 {
                push_small(&mut tracker, round * 3 + n);
            }
            for n in 0..3 {
                assert_eq!(tracker.pop().unwrap().request[5], round * 3 + n);
            }
        }
        assert!(tracker.is_empty());
    }

    fn push_small(tracker: &mut PendingTracker<4>, n: u8) {
        tracker
            .push(&request(n), CorrelationTag::None, EntryId::default(), 0)
            .unwrap();
    }

    #[test]
    fn test_request_too_long() {
        let mut tracker = PendingTracker::<4>::new();
        let long = [0u8; MAX_REQUEST_LEN + 1];
        assert_eq!(
            tracker.push(&long, CorrelationTag::None, EntryId::default(), 0),
            Err(Error::RequestTooLong {
                len: MAX_REQUEST_LEN + 1
            })
        );
        assert!(tracker.is_empty());
    }

    #[test]
    fn test_peek_is_non_destructive() {
        let mut tracker = PendingTracker::<16>::new();
        assert!(tracker.peek().is_none());
        tracker
            .push(&request(1), CorrelationTag::ImagePalette, EntryId::default(), 7)
            .unwrap();
        push(&mut tracker, 2, 8).unwrap();
        assert_eq!(tracker.peek().unwrap().tag, CorrelationTag::ImagePalette);
        assert_eq!(tracker.len(), 2);
        assert_eq!(tracker.iter().count(), 2);
        assert_eq!(tracker.pop().unwrap().tag, CorrelationTag::ImagePalette);
    }

    #[test]
    fn test_expiry_boundary() {
        let mut tracker = PendingTracker::<16>::new();
        push(&mut tracker, 0, 1000).unwrap();
        assert_eq!(tracker.remove_if_expired(100, 1099), None);
        assert_eq!(tracker.len(), 1);
        assert!(tracker.remove_if_expired(100, 1100).is_some());
        assert!(tracker.is_empty());
        assert_eq!(tracker.remove_if_expired(100, 5000), None);
    }

    #[test]
    fn test_expiry_only_oldest() {
        let mut tracker = PendingTracker::<16>::new();
        push(&mut tracker, 0, 0).unwrap();
        push(&mut tracker, 1, 500).unwrap();
        assert!(tracker.remove_if_expired(100, 550).is_some());
        assert_eq!(tracker.remove_if_expired(100, 550), None);
        assert_eq!(tracker.peek().unwrap().request[5], 1);
    }

    #[test]
    fn test_expiry_clock_wraps() {
        let mut tracker = PendingTracker::<16>::new();
        push(&mut tracker, 0, u32::MAX - 49).unwrap();
        assert_eq!(tracker.remove_if_expired(100, 49), None);
        assert!(tracker.remove_if_expired(100, 50).is_some());
    }

    #[test]
    fn test_clear() {
        let mut tracker = PendingTracker::<16>::new();
        push(&mut tracker, 0, 0).unwrap();
        push(&mut tracker, 1, 0).unwrap();
        tracker.clear();
        assert!(tracker.is_empty());
        push(&mut tracker, 2, 0).unwrap();
        assert_eq!(tracker.pop().unwrap().request[5], 2);
    }
}
