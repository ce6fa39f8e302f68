use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Frames per second over a sliding window of recent frames
pub struct FpsTracker {
    window: Duration,
    stamps: VecDeque<Instant>,
}

impl Default for FpsTracker {
    fn default() -> Self {
        Self::new(Duration::from_secs(1))
    }
}

impl FpsTracker {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            stamps: VecDeque::new(),
        }
    }

    pub fn add_frame(&mut self) {
        self.add_frame_at(Instant::now());
    }

    pub fn add_frame_at(&mut self, now: Instant) {
        self.stamps.push_back(now);
        while let Some(&oldest) = self.stamps.front() {
            if self.stamps.len() > 2 && now.duration_since(oldest) > self.window {
                self.stamps.pop_front();
            } else {
                break;
            }
        }
    }

    pub fn fps(&self) -> f64 {
        match (self.stamps.front(), self.stamps.back()) {
            (Some(first), Some(last)) if self.stamps.len() > 1 => {
                let span = last.duration_since(*first).as_secs_f64();
                if span > 0.0 {
                    (self.stamps.len() - 1) as f64 / span
                } else {
                    0.0
                }
            }
            _ => 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_steady_rate() {
        let mut fps = FpsTracker::default();
        let start = Instant::now();
        for i in 0..=10 {
            fps.add_frame_at(start + Duration::from_millis(i * 50));
        }
        assert!((fps.fps() - 20.0).abs() < 1e-6);
    }

    #[test]
    fn test_old_frames_fall_out() {
        let mut fps = FpsTracker::new(Duration::from_millis(500));
        let start = Instant::now();
        for i in 0..10 {
            fps.add_frame_at(start + Duration::from_millis(i * 10));
        }
        fps.add_frame_at(start + Duration::from_secs(5));
        fps.add_frame_at(start + Duration::from_millis(5100));
        assert!((fps.fps() - 10.0).abs() < 1e-6);
    }

    #[test]
    fn test_single_frame_reads_zero() {
        let mut fps = FpsTracker::default();
        fps.add_frame();
        assert_eq!(fps.fps(), 0.0);
    }
}
