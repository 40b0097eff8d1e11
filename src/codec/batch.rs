//! # Position Batch Encoder
//!
//! Packs queued ring buffer samples into a single `gps` array document.
//!
//! Encoding never touches the ring: the slots it consumed are returned in a
//! [`PositionBatch`] and only leave the queue when the batch is committed.
//! A failed encode therefore loses nothing, and a sample is dropped from the
//! queue only once it sits in a serialized document.

use bytes::Bytes;
use tracing::{debug, warn};

use super::clock::ClockSource;
use super::document::{serialize, DocumentBuilder, DocumentError};
use super::encoder::position_node;
use super::protocol::{KEY_GPS, DEFAULT_MAX_DOCUMENT_NODES, DEFAULT_MAX_PER_MESSAGE};
use super::ring::SampleRing;
use crate::error::{Result, TrackerError};

/// Serialized batch plus the slots it carries
#[derive(Debug, Clone, PartialEq)]
pub struct PositionBatch {
    payload: Bytes,
    /// (slot index, slot generation) of every included sample
    entries: Vec<(usize, u64)>,
}

impl PositionBatch {
    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    pub fn into_payload(self) -> Bytes {
        self.payload
    }

    /// Number of samples in the document
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Slot indices included, in document order
    pub fn slots(&self) -> impl Iterator<Item = usize> + '_ {
        self.entries.iter().map(|&(slot, _)| slot)
    }

    /// Remove the included samples from the queue.
    ///
    /// A slot is only dequeued if it has not been written since it was
    /// encoded; one overwritten since then stays queued. Returns the number
    /// dequeued.
    pub fn commit<const N: usize>(&self, ring: &mut SampleRing<N>) -> usize {
        let mut dequeued = 0;
        for &(slot, generation) in &self.entries {
            let unchanged = ring.generation(slot) == Some(generation)
                && ring.get(slot).is_some_and(|s| s.queued);
            if unchanged && ring.dequeue(slot) {
                dequeued += 1;
            } else {
                warn!("Slot {} changed since encode, leaving it queued", slot);
            }
        }
        dequeued
    }
}

/// Encoder settings for position batches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchEncoder {
    max_per_message: usize,
    max_nodes: usize,
}

impl Default for BatchEncoder {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_PER_MESSAGE, DEFAULT_MAX_DOCUMENT_NODES)
    }
}

impl BatchEncoder {
    pub fn new(max_per_message: usize, max_nodes: usize) -> Self {
        Self {
            max_per_message,
            max_nodes,
        }
    }

    pub fn max_per_message(&self) -> usize {
        self.max_per_message
    }

    /// Encode up to `max_per_message` queued samples, scanning in slot order.
    ///
    /// # Errors
    ///
    /// - `NothingToReport` if no slot is queued
    /// - `AllocationFailure` if the node budget runs out anywhere
    /// - `RetryableAssembly` if a sample cannot be represented or the
    ///   document cannot be serialized
    pub fn encode<const N: usize, C>(
        &self,
        ring: &SampleRing<N>,
        clock: &C,
    ) -> Result<PositionBatch>
    where
        C: ClockSource + ?Sized,
    {
        let selected: Vec<usize> = ring.queued_slots().take(self.max_per_message).collect();
        if selected.is_empty() {
            return Err(TrackerError::NothingToReport);
        }

        let offset = clock.offset();
        let mut builder = DocumentBuilder::new(self.max_nodes);
        let mut gps = builder.array().map_err(DocumentError::allocation)?;
        let mut entries = Vec::with_capacity(selected.len());

        for slot in selected {
            let (Some(sample), Some(generation)) = (ring.get(slot), ring.generation(slot))
            else {
                continue;
            };
            let value = position_node(&mut builder, sample).map_err(batch_error)?;
            let entry = builder
                .timestamped(value, offset.to_epoch_ms(sample.timestamp_ms))
                .map_err(batch_error)?;
            gps.push(entry).map_err(batch_error)?;
            entries.push((slot, generation));
        }

        let mut reported = builder.object().map_err(batch_error)?;
        reported.insert(KEY_GPS, gps).map_err(batch_error)?;
        let root = builder.wrap_reported(reported).map_err(batch_error)?;
        let payload = serialize(root)?;

        debug!(
            "Encoded position batch ({} samples): {}",
            entries.len(),
            String::from_utf8_lossy(&payload)
        );

        Ok(PositionBatch { payload, entries })
    }
}

fn batch_error(err: DocumentError) -> TrackerError {
    match err {
        DocumentError::NodeLimit { .. } => err.allocation(),
        other => other.assembly(),
    }
}

/// Encode queued samples and immediately commit them.
///
/// Returns the serialized document and the number of samples it carries.
pub fn encode_position_batch<const N: usize, C>(
    encoder: &BatchEncoder,
    ring: &mut SampleRing<N>,
    clock: &C,
) -> Result<(Bytes, usize)>
where
    C: ClockSource + ?Sized,
{
    let batch = encoder.encode(ring, clock)?;
    batch.commit(ring);
    let count = batch.len();
    Ok((batch.into_payload(), count))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::clock::FixedClock;
    use crate::codec::protocol::PositionSample;
    use serde_json::Value;

    fn sample(ts: i64) -> PositionSample {
        PositionSample {
            longitude: 10.39,
            latitude: 63.43,
            accuracy: 4.5,
            altitude: 12.0,
            speed: 1.5,
            heading: 270.0,
            timestamp_ms: ts,
            queued: false,
        }
    }

    fn full_ring(count: usize) -> SampleRing<10> {
        let mut ring = SampleRing::new();
        for i in 0..count {
            ring.push(sample(1_000 * (i as i64 + 1)));
        }
        ring
    }

    fn clock() -> FixedClock {
        FixedClock::new(1_600_000_000, 500, 10_000)
    }

    fn gps_entries(payload: &[u8]) -> Vec<Value> {
        let doc: Value = serde_json::from_slice(payload).unwrap();
        doc["state"]["reported"]["gps"].as_array().unwrap().clone()
    }

    #[test]
    fn test_batch_cap_respected() {
        let mut ring = full_ring(10);
        let encoder = BatchEncoder::new(5, 512);

        let (payload, count) = encode_position_batch(&encoder, &mut ring, &clock()).unwrap();

        assert_eq!(count, 5);
        assert_eq!(gps_entries(&payload).len(), 5);
        assert_eq!(ring.queued_count(), 5);
        // The first five slots went out; the rest wait for the next cycle
        let remaining: Vec<_> = ring.queued_slots().collect();
        assert_eq!(remaining, vec![5, 6, 7, 8, 9]);
    }

    #[test]
    fn test_each_sample_gets_its_own_timestamp() {
        let mut ring = full_ring(2);
        let encoder = BatchEncoder::default();
        let offset = clock().offset();

        let (payload, _) = encode_position_batch(&encoder, &mut ring, &clock()).unwrap();
        let entries = gps_entries(&payload);

        assert_eq!(entries[0]["ts"], offset.to_epoch_ms(1_000));
        assert_eq!(entries[1]["ts"], offset.to_epoch_ms(2_000));
        assert_eq!(entries[0]["v"]["lat"], 63.43);
        assert_eq!(entries[0]["v"]["hdg"], 270.0);
    }

    #[test]
    fn test_no_queued_samples_is_nothing_to_report() {
        let mut ring: SampleRing<10> = SampleRing::new();
        let result = encode_position_batch(&BatchEncoder::default(), &mut ring, &clock());
        assert!(matches!(result, Err(TrackerError::NothingToReport)));
    }

    #[test]
    fn test_no_duplicate_delivery_across_cycles() {
        let mut ring = full_ring(10);
        let encoder = BatchEncoder::new(4, 512);
        let mut seen = Vec::new();

        loop {
            match encode_position_batch(&encoder, &mut ring, &clock()) {
                Ok((payload, _)) => {
                    for entry in gps_entries(&payload) {
                        seen.push(entry["ts"].as_i64().unwrap());
                    }
                }
                Err(TrackerError::NothingToReport) => break,
                Err(e) => panic!("unexpected error: {:?}", e),
            }
        }

        let mut deduped = seen.clone();
        deduped.sort_unstable();
        deduped.dedup();
        assert_eq!(seen.len(), 10);
        assert_eq!(deduped.len(), 10);
    }

    #[test]
    fn test_allocation_failure_keeps_samples_queued() {
        let mut ring = full_ring(6);
        // Room for the array and one entry only
        let encoder = BatchEncoder::new(5, 12);

        let result = encode_position_batch(&encoder, &mut ring, &clock());

        assert!(matches!(result, Err(TrackerError::AllocationFailure(_))));
        assert_eq!(ring.queued_count(), 6);
    }

    #[test]
    fn test_non_finite_sample_is_retryable_and_keeps_queue() {
        let mut ring = full_ring(3);
        ring.get_mut(1).unwrap().latitude = f64::NAN;

        let result = encode_position_batch(&BatchEncoder::default(), &mut ring, &clock());

        assert!(matches!(result, Err(TrackerError::RetryableAssembly(_))));
        assert_eq!(ring.queued_count(), 3);
    }

    #[test]
    fn test_encode_without_commit_leaves_ring_untouched() {
        let ring = full_ring(3);
        let batch = BatchEncoder::default().encode(&ring, &clock()).unwrap();
        assert_eq!(batch.len(), 3);
        assert_eq!(ring.queued_count(), 3);
    }

    #[test]
    fn test_commit_skips_overwritten_slot() {
        let mut ring: SampleRing<2> = SampleRing::new();
        ring.push(sample(1));
        let batch = BatchEncoder::default().encode(&ring, &clock()).unwrap();

        ring.push(sample(2));
        ring.push(sample(3)); // overwrites slot 0

        assert_eq!(batch.commit(&mut ring), 0);
        assert_eq!(ring.queued_count(), 2);
    }

    #[test]
    fn test_commit_keeps_fresh_fix_with_same_timestamp() {
        let mut ring: SampleRing<2> = SampleRing::new();
        ring.push(sample(0));
        let batch = BatchEncoder::default().encode(&ring, &clock()).unwrap();

        ring.push(sample(5));
        let fresh = PositionSample {
            latitude: 3.0,
            ..sample(0)
        };
        ring.push(fresh); // overwrites slot 0 with an identical timestamp

        assert_eq!(batch.commit(&mut ring), 0);
        let slot0 = ring.get(0).unwrap();
        assert_eq!(slot0.latitude, 3.0);
        assert!(slot0.queued);
        assert_eq!(ring.queued_count(), 2);
    }

    #[test]
    fn test_commit_keeps_slot_refilled_in_place() {
        let mut ring = full_ring(2);
        let batch = BatchEncoder::default().encode(&ring, &clock()).unwrap();

        ring.get_mut(1).unwrap().latitude = 59.91;

        assert_eq!(batch.commit(&mut ring), 1);
        let remaining: Vec<_> = ring.queued_slots().collect();
        assert_eq!(remaining, vec![1]);
    }

    #[test]
    fn test_commit_is_idempotent() {
        let mut ring = full_ring(2);
        let batch = BatchEncoder::default().encode(&ring, &clock()).unwrap();
        assert_eq!(batch.commit(&mut ring), 2);
        assert_eq!(batch.commit(&mut ring), 0);
    }

    #[test]
    fn test_full_batch_fits_its_node_size() {
        use crate::codec::protocol::batch_document_nodes;

        let ring = full_ring(10);
        let fits = BatchEncoder::new(5, batch_document_nodes(5));
        assert_eq!(fits.encode(&ring, &clock()).unwrap().len(), 5);

        let short = BatchEncoder::new(5, batch_document_nodes(5) - 1);
        assert!(matches!(
            short.encode(&ring, &clock()),
            Err(TrackerError::AllocationFailure(_))
        ));
    }
}
