/// Global frame counter with an optional ceiling. Never reset between sequences.
#[derive(Debug, Clone, Default)]
pub struct FrameBudget {
    limit: Option<u64>,
    processed: u64,
}

impl FrameBudget {
    pub fn new(limit: Option<u64>) -> Self {
        Self {
            limit: limit.filter(|n| *n > 0),
            processed: 0,
        }
    }

    /// Count one fully processed frame; `true` once the ceiling is reached
    pub fn record_frame(&mut self) -> bool {
        self.processed += 1;
        self.exhausted()
    }

    pub fn exhausted(&self) -> bool {
        matches!(self.limit, Some(limit) if self.processed >= limit)
    }

    pub fn processed(&self) -> u64 {
        self.processed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stops_at_limit() {
        let mut budget = FrameBudget::new(Some(3));
        assert!(!budget.record_frame());
        assert!(!budget.record_frame());
        assert!(budget.record_frame());
        assert_eq!(budget.processed(), 3);
    }

    #[test]
    fn test_unlimited_never_stops() {
        let mut budget = FrameBudget::new(None);
        assert!((0..1000).all(|_| !budget.record_frame()));
        let mut budget = FrameBudget::new(Some(0));
        assert!(!budget.record_frame());
    }
}
