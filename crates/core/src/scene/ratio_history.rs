use std::collections::VecDeque;

/// Fixed-capacity FIFO of recent change ratios.
///
/// Pushing beyond capacity evicts the oldest entry. The capacity is the
/// detector's smoothing window and is clamped to at least 1.
#[derive(Clone, Debug)]
pub struct RatioHistory {
    buf: VecDeque<f64>,
    capacity: usize,
}

impl RatioHistory {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            buf: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, ratio: f64) {
        if self.buf.len() == self.capacity {
            self.buf.pop_front();
        }
        self.buf.push_back(ratio);
    }

    /// Arithmetic mean of the retained ratios, 0.0 when empty.
    pub fn mean(&self) -> f64 {
        if self.buf.is_empty() {
            return 0.0;
        }
        self.buf.iter().sum::<f64>() / self.buf.len() as f64
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.buf.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_empty_mean_is_zero() {
        let history = RatioHistory::new(5);
        assert_eq!(history.mean(), 0.0);
        assert!(history.is_empty());
    }

    #[test]
    fn test_capacity_clamped_to_one() {
        let mut history = RatioHistory::new(0);
        assert_eq!(history.capacity(), 1);
        history.push(0.3);
        history.push(0.7);
        assert_eq!(history.len(), 1);
        assert_relative_eq!(history.mean(), 0.7);
    }

    #[test]
    fn test_mean_of_partial_window() {
        let mut history = RatioHistory::new(5);
        history.push(0.2);
        history.push(0.4);
        assert_relative_eq!(history.mean(), 0.3);
    }

    #[test]
    fn test_push_beyond_capacity_evicts_oldest() {
        let mut history = RatioHistory::new(3);
        for r in [1.0, 0.0, 0.0, 0.0] {
            history.push(r);
        }
        // The 1.0 fell out of the window.
        assert_eq!(history.len(), 3);
        assert_relative_eq!(history.mean(), 0.0);
    }

    #[test]
    fn test_clear_empties_window() {
        let mut history = RatioHistory::new(3);
        history.push(0.9);
        history.clear();
        assert!(history.is_empty());
        assert_eq!(history.mean(), 0.0);
    }
}
