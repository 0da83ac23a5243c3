//! Fixed-capacity ring buffer holding the recent points of one time series.
//!
//! Appends are O(1) and never allocate once the buffer has been filled;
//! writing past capacity overwrites the oldest slot.

use crate::metrics::types::MetricPoint;
use parking_lot::Mutex;

/// Recent history of one metric identity x one attribute set.
pub struct MetricStream {
    inner: Mutex<StreamSlots>,
    capacity: usize,
}

struct StreamSlots {
    points: Vec<MetricPoint>,
    /// Index of the most recently written slot; `None` until the first append.
    cursor: Option<usize>,
}

impl MetricStream {
    /// Create a new stream with the specified capacity
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "Capacity must be greater than 0");

        Self {
            inner: Mutex::new(StreamSlots {
                points: Vec::with_capacity(capacity),
                cursor: None,
            }),
            capacity,
        }
    }

    /// Append a point, overwriting the oldest slot when full.
    pub fn append(&self, point: MetricPoint) {
        let mut slots = self.inner.lock();
        let next = match slots.cursor {
            Some(cursor) => (cursor + 1) % self.capacity,
            None => 0,
        };

        if next == slots.points.len() {
            slots.points.push(point);
        } else {
            slots.points[next] = point;
        }
        slots.cursor = Some(next);
    }

    /// The most recently appended point, if any.
    pub fn current_point(&self) -> Option<MetricPoint> {
        let slots = self.inner.lock();
        slots.cursor.map(|cursor| slots.points[cursor])
    }

    /// All retained points, oldest first.
    pub fn snapshot(&self) -> Vec<MetricPoint> {
        let slots = self.inner.lock();
        let Some(cursor) = slots.cursor else {
            return Vec::new();
        };

        if slots.points.len() < self.capacity {
            return slots.points.clone();
        }

        let mut ordered = Vec::with_capacity(self.capacity);
        ordered.extend_from_slice(&slots.points[cursor + 1..]);
        ordered.extend_from_slice(&slots.points[..=cursor]);
        ordered
    }

    /// Number of points currently retained
    pub fn len(&self) -> usize {
        self.inner.lock().points.len()
    }

    /// Check if nothing has been written yet
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Get stream capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_creation() {
        let stream = MetricStream::new(8);

        assert_eq!(stream.capacity(), 8);
        assert!(stream.is_empty());
        assert!(stream.current_point().is_none());
        assert!(stream.snapshot().is_empty());
    }

    #[test]
    #[should_panic(expected = "Capacity must be greater than 0")]
    fn test_zero_capacity_panics() {
        MetricStream::new(0);
    }

    #[test]
    fn test_current_point_tracks_latest() {
        let stream = MetricStream::new(4);
        stream.append(MetricPoint::long(1000, 5));
        stream.append(MetricPoint::long(2000, 7));

        assert_eq!(stream.current_point(), Some(MetricPoint::long(2000, 7)));
        assert_eq!(stream.len(), 2);
    }

    #[test]
    fn test_wraparound_overwrites_oldest() {
        let stream = MetricStream::new(3);
        for i in 0..5 {
            stream.append(MetricPoint::long(i, i * 10));
        }

        assert_eq!(stream.len(), 3);
        assert_eq!(stream.current_point(), Some(MetricPoint::long(4, 40)));

        let timestamps: Vec<i64> = stream.snapshot().iter().map(|p| p.timestamp).collect();
        assert_eq!(timestamps, vec![2, 3, 4]);
    }

    #[test]
    fn test_default_capacity_keeps_last_point() {
        let stream = MetricStream::new(300);
        for i in 0..=450 {
            stream.append(MetricPoint::double(i, i as f64 / 2.0));
        }

        assert_eq!(stream.len(), 300);
        assert_eq!(stream.current_point(), Some(MetricPoint::double(450, 225.0)));

        let snapshot = stream.snapshot();
        assert_eq!(snapshot.first().map(|p| p.timestamp), Some(151));
        assert_eq!(snapshot.last().map(|p| p.timestamp), Some(450));
    }

    #[test]
    fn test_concurrent_readers_see_whole_points() {
        use std::sync::Arc;
        use std::thread;

        let stream = Arc::new(MetricStream::new(16));
        let writer = {
            let stream = Arc::clone(&stream);
            thread::spawn(move || {
                for i in 0..1000 {
                    stream.append(MetricPoint::long(i, i));
                }
            })
        };

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let stream = Arc::clone(&stream);
                thread::spawn(move || {
                    for _ in 0..1000 {
                        if let Some(point) = stream.current_point() {
                            assert_eq!(point.value, crate::metrics::PointValue::Long(point.timestamp));
                        }
                    }
                })
            })
            .collect();

        writer.join().unwrap();
        for reader in readers {
            reader.join().unwrap();
        }
        assert_eq!(stream.current_point(), Some(MetricPoint::long(999, 999)));
    }
}
