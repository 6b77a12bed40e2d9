use std::time::{Duration, Instant};

/// Progress of the listing phase of a crawl
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CrawlProgress {
    pub processed: usize,
    pub total: usize,
    pub estimated_remaining: Duration,
}

impl CrawlProgress {
    /// Share of listings handled, in `[0, 1]`
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            return 1.0;
        }
        (self.processed as f64 / self.total as f64).clamp(0.0, 1.0)
    }

    pub fn is_done(&self) -> bool {
        self.processed >= self.total
    }

    /// Remaining time as `mm:ss`
    pub fn remaining_label(&self) -> String {
        if self.is_done() {
            return "done".to_string();
        }
        let secs = self.estimated_remaining.as_secs();
        format!("{:02}:{:02}", secs / 60, secs % 60)
    }
}

/// Average time per listing so far, extrapolated over what is left
pub fn estimate_remaining(elapsed: Duration, processed: usize, total: usize) -> Duration {
    if processed == 0 || processed >= total {
        return Duration::ZERO;
    }
    let per_listing = elapsed / processed as u32;
    per_listing * (total - processed) as u32
}

pub(crate) struct ProgressTracker {
    started: Instant,
    total: usize,
}

impl ProgressTracker {
    pub(crate) fn start(total: usize) -> Self {
        Self {
            started: Instant::now(),
            total,
        }
    }

    pub(crate) fn at(&self, processed: usize) -> CrawlProgress {
        CrawlProgress {
            processed,
            total: self.total,
            estimated_remaining: estimate_remaining(self.started.elapsed(), processed, self.total),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fraction() {
        let progress = CrawlProgress {
            processed: 3,
            total: 4,
            estimated_remaining: Duration::ZERO,
        };
        assert_eq!(progress.fraction(), 0.75);

        let empty = CrawlProgress {
            processed: 0,
            total: 0,
            estimated_remaining: Duration::ZERO,
        };
        assert_eq!(empty.fraction(), 1.0);
    }

    #[test]
    fn test_estimate_remaining() {
        assert_eq!(
            estimate_remaining(Duration::from_secs(10), 2, 6),
            Duration::from_secs(20)
        );
        assert_eq!(estimate_remaining(Duration::from_secs(10), 0, 6), Duration::ZERO);
        assert_eq!(estimate_remaining(Duration::from_secs(10), 6, 6), Duration::ZERO);
    }

    #[test]
    fn test_remaining_label() {
        let progress = CrawlProgress {
            processed: 1,
            total: 10,
            estimated_remaining: Duration::from_secs(125),
        };
        assert_eq!(progress.remaining_label(), "02:05");

        let done = CrawlProgress {
            processed: 10,
            total: 10,
            estimated_remaining: Duration::ZERO,
        };
        assert_eq!(done.remaining_label(), "done");
    }
}
