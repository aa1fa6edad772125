//! Bounded history of spectrum rows for waterfall displays
//!
//! Rows are stored in a fixed ring allocated once at construction; pushing
//! a row copies into the oldest slot once the ring is full.

/// Rows kept before the oldest is evicted
pub const WATERFALL_CAPACITY: usize = 200;

pub struct WaterfallHistory {
    /// Pre-allocated row slots, each `row_len` long
    slots: Vec<Vec<f64>>,

    row_len: usize,

    /// Slot holding the oldest row
    head: usize,

    /// Number of valid rows
    len: usize,
}

impl WaterfallHistory {
    pub fn new(row_len: usize) -> Self {
        Self::with_capacity(WATERFALL_CAPACITY, row_len)
    }

    pub fn with_capacity(capacity: usize, row_len: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            slots: (0..capacity).map(|_| vec![0.0; row_len]).collect(),
            row_len,
            head: 0,
            len: 0,
        }
    }

    /// Append a row, evicting the oldest when full
    ///
    /// Rows shorter than `row_len` are zero-filled, longer ones truncated.
    pub fn push(&mut self, row: &[f64]) {
        let capacity = self.slots.len();
        let slot = if self.len < capacity {
            let slot = (self.head + self.len) % capacity;
            self.len += 1;
            slot
        } else {
            let slot = self.head;
            self.head = (self.head + 1) % capacity;
            slot
        };

        let dest = &mut self.slots[slot];
        let n = row.len().min(self.row_len);
        dest[..n].copy_from_slice(&row[..n]);
        dest[n..].fill(0.0);
    }

    /// Drop every row; storage stays allocated
    pub fn clear(&mut self) {
        self.head = 0;
        self.len = 0;
    }

    /// Rows from oldest to newest
    pub fn rows(&self) -> impl Iterator<Item = &[f64]> + '_ {
        let capacity = self.slots.len();
        (0..self.len).map(move |i| self.slots[(self.head + i) % capacity].as_slice())
    }

    /// Most recently pushed row
    pub fn latest(&self) -> Option<&[f64]> {
        if self.len == 0 {
            return None;
        }
        let index = (self.head + self.len - 1) % self.slots.len();
        Some(&self.slots[index])
    }

    /// Copy all rows, oldest first, into one flat buffer
    ///
    /// `out` is cleared first and only grows if its capacity is short.
    pub fn copy_flat_into(&self, out: &mut Vec<f64>) {
        out.clear();
        for row in self.rows() {
            out.extend_from_slice(row);
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn row_len(&self) -> usize {
        self.row_len
    }
}

/// Owned copy of a waterfall handed to readers
#[derive(Debug, Clone, PartialEq, Default)]
pub struct WaterfallSnapshot {
    /// Rows oldest to newest, each one spectrum in dB
    pub rows: Vec<Vec<f64>>,

    /// Bin frequencies in Hz shared by every row
    pub frequencies: Vec<f64>,
}

impl WaterfallSnapshot {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_and_order() {
        let mut history = WaterfallHistory::with_capacity(3, 2);
        assert!(history.is_empty());
        assert!(history.latest().is_none());

        history.push(&[1.0, 1.0]);
        history.push(&[2.0, 2.0]);

        let rows: Vec<_> = history.rows().map(|r| r[0]).collect();
        assert_eq!(rows, vec![1.0, 2.0]);
        assert_eq!(history.latest(), Some(&[2.0, 2.0][..]));
    }

    #[test]
    fn test_evicts_oldest_at_capacity() {
        let mut history = WaterfallHistory::with_capacity(3, 1);
        for i in 0..7 {
            history.push(&[i as f64]);
        }

        assert_eq!(history.len(), 3);
        let rows: Vec<_> = history.rows().map(|r| r[0]).collect();
        assert_eq!(rows, vec![4.0, 5.0, 6.0]);
    }

    #[test]
    fn test_default_capacity_bound() {
        let mut history = WaterfallHistory::new(4);
        for _ in 0..(WATERFALL_CAPACITY + 50) {
            history.push(&[0.0; 4]);
        }
        assert_eq!(history.len(), WATERFALL_CAPACITY);
    }

    #[test]
    fn test_clear() {
        let mut history = WaterfallHistory::with_capacity(4, 2);
        history.push(&[1.0, 2.0]);
        history.clear();

        assert!(history.is_empty());
        assert_eq!(history.rows().count(), 0);

        history.push(&[3.0, 4.0]);
        assert_eq!(history.latest(), Some(&[3.0, 4.0][..]));
    }

    #[test]
    fn test_short_rows_zero_filled() {
        let mut history = WaterfallHistory::with_capacity(2, 3);
        history.push(&[9.0, 9.0, 9.0]);
        history.push(&[9.0, 9.0, 9.0]);
        // Reuses the first slot
        history.push(&[1.0]);

        assert_eq!(history.latest(), Some(&[1.0, 0.0, 0.0][..]));
    }

    #[test]
    fn test_copy_flat() {
        let mut history = WaterfallHistory::with_capacity(2, 2);
        history.push(&[1.0, 2.0]);
        history.push(&[3.0, 4.0]);
        history.push(&[5.0, 6.0]);

        let mut flat = Vec::with_capacity(4);
        history.copy_flat_into(&mut flat);
        assert_eq!(flat, vec![3.0, 4.0, 5.0, 6.0]);
    }
}
