use stampede_core::Stage;
use std::time::Duration;

/// Where the ramp is at a given instant.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RampState {
    Running { stage: usize, target: usize },
    Finished,
}

/// Virtual user level over time, linearly interpolated within each stage.
///
/// Stage `i` starts from the target of stage `i - 1` (or `start` for the first stage) and
/// reaches its own target when its duration has elapsed.
#[derive(Clone, Debug)]
pub struct RampSchedule {
    start: usize,
    stages: Vec<Stage>,
}

impl RampSchedule {
    pub fn new(start: usize, stages: &[Stage]) -> Self {
        Self {
            start,
            stages: stages.to_vec(),
        }
    }

    pub fn total_duration(&self) -> Duration {
        self.stages
            .iter()
            .fold(Duration::ZERO, |acc, s| acc.saturating_add(s.duration))
    }

    pub fn stage(&self, idx: usize) -> Option<&Stage> {
        self.stages.get(idx)
    }

    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    /// Highest level the ramp ever asks for.
    pub fn peak(&self) -> usize {
        self.stages
            .iter()
            .map(|s| s.target)
            .fold(self.start, usize::max)
    }

    pub fn state_at(&self, elapsed: Duration) -> RampState {
        let mut from = self.start;
        let mut stage_start = Duration::ZERO;

        for (idx, stage) in self.stages.iter().enumerate() {
            let stage_end = stage_start.saturating_add(stage.duration);
            if elapsed < stage_end {
                let progress =
                    (elapsed - stage_start).as_secs_f64() / stage.duration.as_secs_f64();
                let level = from as f64 + (stage.target as f64 - from as f64) * progress;
                return RampState::Running {
                    stage: idx,
                    target: level.round() as usize,
                };
            }
            from = stage.target;
            stage_start = stage_end;
        }

        RampState::Finished
    }
}
