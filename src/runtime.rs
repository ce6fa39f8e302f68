//! Startup configuration of the inference thread pool.
//!
//! Resolved once before any model is loaded. `Default` leaves the runtime's
//! own choice untouched.

use crate::config::TrackerConfig;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ComputeThreads {
    #[default]
    Default,
    Configured(usize),
}

impl ComputeThreads {
    pub fn resolve(config: &TrackerConfig) -> Self {
        match config.intra_threads {
            Some(n) if n > 0 => ComputeThreads::Configured(n),
            _ => ComputeThreads::Default,
        }
    }

    pub fn count(&self) -> Option<usize> {
        match self {
            ComputeThreads::Default => None,
            ComputeThreads::Configured(n) => Some(*n),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_threads_means_default() {
        let mut cfg = TrackerConfig::default();
        assert_eq!(ComputeThreads::resolve(&cfg), ComputeThreads::Default);
        cfg.intra_threads = Some(0);
        assert_eq!(ComputeThreads::resolve(&cfg), ComputeThreads::Default);
        cfg.intra_threads = Some(4);
        assert_eq!(ComputeThreads::resolve(&cfg).count(), Some(4));
    }
}
