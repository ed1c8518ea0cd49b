//! Bounded, time-ordered history of decibel readings.

use std::collections::VecDeque;

/// One recorded reading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HistoryPoint {
    /// Milliseconds since the session clock's epoch
    pub timestamp: u64,
    /// Normalized decibel value (0-120)
    pub value: f32,
}

impl HistoryPoint {
    pub fn new(timestamp: u64, value: f32) -> Self {
        Self { timestamp, value }
    }
}

/// Append-only sequence with FIFO eviction once `capacity` is exceeded.
///
/// `append` consumes the buffer and hands back the updated one, so a caller
/// that still needs the previous history keeps a clone of it.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryBuffer {
    points: VecDeque<HistoryPoint>,
    capacity: usize,
}

impl HistoryBuffer {
    /// Creates an empty buffer. A capacity of zero is treated as one.
    pub fn new(capacity: usize) -> Self {
        Self {
            points: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    /// Returns the buffer with `(timestamp, value)` appended, evicting from the
    /// front until the length fits the capacity.
    #[must_use]
    pub fn append(mut self, timestamp: u64, value: f32) -> Self {
        self.points.push_back(HistoryPoint::new(timestamp, value));
        while self.points.len() > self.capacity {
            self.points.pop_front();
        }
        self
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Most recent point, if any.
    pub fn last(&self) -> Option<&HistoryPoint> {
        self.points.back()
    }

    /// Points from oldest to newest.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &HistoryPoint> + ExactSizeIterator {
        self.points.iter()
    }

    pub fn to_vec(&self) -> Vec<HistoryPoint> {
        self.points.iter().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled(capacity: usize, n: u64) -> HistoryBuffer {
        (1..=n).fold(HistoryBuffer::new(capacity), |buffer, t| {
            buffer.append(t, t as f32 * 10.0)
        })
    }

    #[test]
    fn evicts_oldest_beyond_capacity() {
        let buffer = filled(3, 4);
        assert_eq!(
            buffer.to_vec(),
            vec![
                HistoryPoint::new(2, 20.0),
                HistoryPoint::new(3, 30.0),
                HistoryPoint::new(4, 40.0),
            ]
        );
    }

    #[test]
    fn keeps_exactly_the_last_capacity_points_in_order() {
        for capacity in [1usize, 2, 7, 50] {
            let n = capacity as u64 * 3 + 1;
            let buffer = filled(capacity, n);
            assert_eq!(buffer.len(), capacity);

            let timestamps: Vec<u64> = buffer.iter().map(|p| p.timestamp).collect();
            let expected: Vec<u64> = (n - capacity as u64 + 1..=n).collect();
            assert_eq!(timestamps, expected);
        }
    }

    #[test]
    fn below_capacity_nothing_is_evicted() {
        let buffer = filled(3600, 10);
        assert_eq!(buffer.len(), 10);
        assert_eq!(buffer.iter().next().map(|p| p.timestamp), Some(1));
        assert_eq!(buffer.last().map(|p| p.timestamp), Some(10));
    }

    #[test]
    fn previous_value_is_untouched_by_append() {
        let before = filled(3, 2);
        let after = before.clone().append(3, 30.0);
        assert_eq!(before.len(), 2);
        assert_eq!(after.len(), 3);
    }

    #[test]
    fn zero_capacity_holds_one_point() {
        let buffer = HistoryBuffer::new(0).append(1, 1.0).append(2, 2.0);
        assert_eq!(buffer.to_vec(), vec![HistoryPoint::new(2, 2.0)]);
    }
}
