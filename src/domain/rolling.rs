//! Fixed-capacity rolling buffer of `f64` samples.
//!
//! Pushing into a full window evicts the oldest sample. Indexing is
//! oldest-first via [`RollingWindow::get`] and newest-first via
//! [`RollingWindow::from_end`].

use std::collections::VecDeque;

#[derive(Debug, Clone)]
pub struct RollingWindow {
    data: VecDeque<f64>,
    capacity: usize,
}

impl RollingWindow {
    /// A zero capacity is bumped to 1.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            data: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, value: f64) {
        if self.data.len() == self.capacity {
            self.data.pop_front();
        }
        self.data.push_back(value);
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.data.len() == self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn last(&self) -> Option<f64> {
        self.data.back().copied()
    }

    pub fn first(&self) -> Option<f64> {
        self.data.front().copied()
    }

    pub fn get(&self, index: usize) -> Option<f64> {
        self.data.get(index).copied()
    }

    /// `from_end(0)` is the newest sample.
    pub fn from_end(&self, offset: usize) -> Option<f64> {
        let len = self.data.len();
        if offset >= len {
            return None;
        }
        self.data.get(len - 1 - offset).copied()
    }

    /// The newest `min(n, len)` samples, oldest first.
    pub fn tail(&self, n: usize) -> Vec<f64> {
        let skip = self.data.len().saturating_sub(n);
        self.data.iter().skip(skip).copied().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = f64> + '_ {
        self.data.iter().copied()
    }

    pub fn to_vec(&self) -> Vec<f64> {
        self.data.iter().copied().collect()
    }

    pub fn clear(&mut self) {
        self.data.clear();
    }
}
