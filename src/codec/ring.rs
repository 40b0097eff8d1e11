//! # Position Sample Ring
//!
//! Fixed-capacity circular buffer of position fixes. The sensor side writes
//! slots in circular order; the batch encoder consumes slots whose `queued`
//! flag is set.
//!
//! Every slot carries a generation counter that changes whenever the slot
//! is written, so a consumer can tell whether a slot still holds the sample
//! it read earlier even when the new fix has the same capture time.

use super::protocol::{PositionSample, SAMPLE_BUFFER_CAPACITY};

/// Outcome of storing a sample
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PushOutcome {
    /// Slot the sample was written to
    pub slot: usize,
    /// A queued sample was overwritten before it could be sent
    pub overwrote_queued: bool,
}

/// Circular buffer of `N` position samples
#[derive(Debug, Clone)]
pub struct SampleRing<const N: usize = SAMPLE_BUFFER_CAPACITY> {
    slots: [PositionSample; N],
    generations: [u64; N],
    next: usize,
}

impl<const N: usize> SampleRing<N> {
    pub fn new() -> Self {
        Self {
            slots: [PositionSample::default(); N],
            generations: [0; N],
            next: 0,
        }
    }

    pub const fn capacity(&self) -> usize {
        N
    }

    /// Store a captured fix in the next slot and mark it queued
    pub fn push(&mut self, mut sample: PositionSample) -> PushOutcome {
        let slot = self.next;
        let overwrote_queued = self.slots[slot].queued;
        sample.queued = true;
        self.slots[slot] = sample;
        self.generations[slot] = self.generations[slot].wrapping_add(1);
        self.next = (self.next + 1) % N;
        PushOutcome {
            slot,
            overwrote_queued,
        }
    }

    pub fn slots(&self) -> &[PositionSample; N] {
        &self.slots
    }

    pub fn get(&self, slot: usize) -> Option<&PositionSample> {
        self.slots.get(slot)
    }

    /// Mutable slot access for producers that fill slots in place.
    ///
    /// Counts as a write: the slot's generation advances.
    pub fn get_mut(&mut self, slot: usize) -> Option<&mut PositionSample> {
        let generation = self.generations.get_mut(slot)?;
        *generation = generation.wrapping_add(1);
        self.slots.get_mut(slot)
    }

    /// Write counter of a slot
    pub fn generation(&self, slot: usize) -> Option<u64> {
        self.generations.get(slot).copied()
    }

    /// Number of slots awaiting delivery
    pub fn queued_count(&self) -> usize {
        self.slots.iter().filter(|s| s.queued).count()
    }

    /// Indices of queued slots, in index order
    pub fn queued_slots(&self) -> impl Iterator<Item = usize> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, s)| s.queued)
            .map(|(i, _)| i)
    }

    /// Mark a slot delivered. Returns false if it was not queued.
    pub fn dequeue(&mut self, slot: usize) -> bool {
        match self.slots.get_mut(slot) {
            Some(sample) if sample.queued => {
                sample.queued = false;
                true
            }
            _ => false,
        }
    }
}

impl<const N: usize> Default for SampleRing<N> {
    fn default() -> Self {
        Self::new()
    }
}
