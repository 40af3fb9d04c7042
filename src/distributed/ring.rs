use crate::error::{AppError, AppResult, DistributedError};

use super::protocol::ReportRecord;

/// Periods of slack between the fastest and the slowest worker.
pub const RING_CAPACITY: usize = 10;

#[derive(Debug, Clone)]
struct Slot {
    epoch: u64,
    received: usize,
    values: Vec<u64>,
}

impl Slot {
    fn reset(&mut self, epoch: u64) {
        self.epoch = epoch;
        self.received = 0;
        self.values.iter_mut().for_each(|value| *value = 0);
    }
}

/// A period every expected worker has reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlushedPeriod {
    pub seq: u64,
    pub values: Vec<u64>,
}

#[derive(Debug, Clone, Copy, Default)]
struct WorkerProgress {
    last_seq: Option<u64>,
    finished: bool,
}

/// Sequence-indexed merge of worker reports.
///
/// Slot `seq % capacity` accumulates the element-wise sum of every report
/// for `seq`. Periods leave the ring strictly in sequence order, once each
/// worker that is still running, or that reported `seq` before its stream
/// ended, has contributed.
#[derive(Debug)]
pub struct AggregationRing {
    slots: Vec<Slot>,
    width: usize,
    next_expected: u64,
    workers: Vec<WorkerProgress>,
}

impl AggregationRing {
    #[must_use]
    pub fn new(workers: usize, width: usize, capacity: usize) -> Self {
        let slot = Slot {
            epoch: 0,
            received: 0,
            values: vec![0; width],
        };
        Self {
            slots: vec![slot; capacity.max(1)],
            width,
            next_expected: 0,
            workers: vec![WorkerProgress::default(); workers],
        }
    }

    #[cfg(test)]
    #[must_use]
    pub const fn next_expected(&self) -> u64 {
        self.next_expected
    }

    fn capacity(&self) -> u64 {
        u64::try_from(self.slots.len()).unwrap_or(u64::MAX)
    }

    fn slot_index(&self, seq: u64) -> usize {
        let index = seq.checked_rem(self.capacity()).unwrap_or(0);
        usize::try_from(index).unwrap_or(0)
    }

    /// Contributions needed before `seq` can leave the ring.
    fn expected_for(&self, seq: u64) -> usize {
        self.workers
            .iter()
            .filter(|worker| !worker.finished || worker.last_seq.is_some_and(|last| last >= seq))
            .count()
    }

    /// Adds one worker report and returns every period that became complete.
    ///
    /// # Errors
    ///
    /// Returns an error when the record has the wrong width, was already
    /// flushed, or is `capacity` or more periods ahead of the next expected
    /// sequence.
    pub fn accept(&mut self, worker: usize, record: &ReportRecord) -> AppResult<Vec<FlushedPeriod>> {
        let seq = record.seq;
        if record.values.len() != self.width {
            return Err(AppError::distributed(DistributedError::ReportWidth {
                seq,
                expected: self.width,
                actual: record.values.len(),
            }));
        }
        if seq < self.next_expected {
            return Err(AppError::distributed(DistributedError::StaleSequence {
                seq,
                next_expected: self.next_expected,
            }));
        }
        if seq.saturating_sub(self.next_expected) >= self.capacity() {
            return Err(AppError::distributed(DistributedError::SequenceDesync {
                seq,
                next_expected: self.next_expected,
                capacity: self.slots.len(),
            }));
        }

        let index = self.slot_index(seq);
        if let Some(slot) = self.slots.get_mut(index) {
            if slot.received == 0 || slot.epoch != seq {
                slot.reset(seq);
            }
            for (total, value) in slot.values.iter_mut().zip(&record.values) {
                *total = total.saturating_add(*value);
            }
            slot.received = slot.received.saturating_add(1);
        }
        if let Some(progress) = self.workers.get_mut(worker) {
            progress.last_seq = Some(progress.last_seq.map_or(seq, |last| last.max(seq)));
        }
        Ok(self.drain_ready())
    }

    /// Marks a worker's stream as ended; later periods stop waiting for it.
    pub fn worker_finished(&mut self, worker: usize) -> Vec<FlushedPeriod> {
        if let Some(progress) = self.workers.get_mut(worker) {
            progress.finished = true;
        }
        self.drain_ready()
    }

    /// Sequences holding contributions that can no longer complete.
    #[must_use]
    pub fn pending(&self) -> Vec<u64> {
        let mut pending: Vec<u64> = self
            .slots
            .iter()
            .filter(|slot| slot.received > 0)
            .map(|slot| slot.epoch)
            .collect();
        pending.sort_unstable();
        pending
    }

    fn drain_ready(&mut self) -> Vec<FlushedPeriod> {
        let mut flushed = Vec::new();
        loop {
            let seq = self.next_expected;
            let expected = self.expected_for(seq);
            let index = self.slot_index(seq);
            let Some(slot) = self.slots.get_mut(index) else {
                break;
            };
            if slot.received == 0 || slot.epoch != seq || slot.received < expected {
                break;
            }
            flushed.push(FlushedPeriod {
                seq,
                values: slot.values.clone(),
            });
            slot.reset(seq);
            self.next_expected = self.next_expected.saturating_add(1);
        }
        flushed
    }
}
