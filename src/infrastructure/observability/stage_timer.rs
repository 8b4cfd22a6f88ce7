use std::time::{Duration, Instant};
use tracing::info;

/// RAII guard that logs how long a pipeline stage took when dropped.
pub struct StageTimer {
    stage: &'static str,
    start: Instant,
}

impl StageTimer {
    pub fn start(stage: &'static str) -> Self {
        info!("Stage [{}] started", stage);
        Self {
            stage,
            start: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

impl Drop for StageTimer {
    fn drop(&mut self) {
        info!(
            "Stage [{}] finished in {:.2?}",
            self.stage,
            self.start.elapsed()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_elapsed_grows() {
        let timer = StageTimer::start("preprocess");
        std::thread::sleep(Duration::from_millis(10));
        assert!(timer.elapsed() >= Duration::from_millis(10));
    }
}
