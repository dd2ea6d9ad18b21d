//! Termination criteria bounding how long a solver may run

#[cfg(unix)]
use log::warn;
use std::time::{Duration, Instant};

/// Tells a solver whether it has to stop and how much time it has left.
///
/// Criteria start their clock at construction and are queried from any thread.
pub trait TerminationCriterion: Send + Sync {
    fn has_to_stop(&self) -> bool;

    fn remaining_time(&self) -> Duration;
}

/// A [`TerminationCriterion`] which triggers once a wall-clock budget has elapsed
#[derive(Clone, Copy, Debug)]
pub struct WalltimeTerminationCriterion {
    started_at: Instant,
    budget: Duration,
}

impl WalltimeTerminationCriterion {
    /// Give the solver a wall-clock budget, starting now
    pub fn starting_now(budget: Duration) -> Self {
        Self {
            started_at: Instant::now(),
            budget,
        }
    }
}

impl TerminationCriterion for WalltimeTerminationCriterion {
    fn has_to_stop(&self) -> bool {
        self.started_at.elapsed() >= self.budget
    }

    fn remaining_time(&self) -> Duration {
        self.budget.saturating_sub(self.started_at.elapsed())
    }
}

/// CPU time consumed by the whole process so far
#[cfg(unix)]
pub fn process_cpu_time() -> Duration {
    let mut now = libc::timespec {
        tv_sec: 0,
        tv_nsec: 0,
    };
    // SAFETY: `now` is a valid, writable timespec for the duration of the call.
    let status = unsafe { libc::clock_gettime(libc::CLOCK_PROCESS_CPUTIME_ID, &mut now) };
    if status != 0 {
        warn!("Could not read process CPU time.");
        return Duration::ZERO;
    }
    Duration::new(now.tv_sec as u64, now.tv_nsec as u32)
}

/// No process clock here, so CPU-time criteria never fire
#[cfg(not(unix))]
pub fn process_cpu_time() -> Duration {
    Duration::ZERO
}

/// A [`TerminationCriterion`] which triggers once the process has used a CPU-time budget
/// since the criterion was created
#[derive(Clone, Copy, Debug)]
pub struct CpuTimeTerminationCriterion {
    started_at: Duration,
    budget: Duration,
}

impl CpuTimeTerminationCriterion {
    pub fn starting_now(budget: Duration) -> Self {
        Self {
            started_at: process_cpu_time(),
            budget,
        }
    }

    fn consumed(&self) -> Duration {
        process_cpu_time().saturating_sub(self.started_at)
    }
}

impl TerminationCriterion for CpuTimeTerminationCriterion {
    fn has_to_stop(&self) -> bool {
        self.consumed() >= self.budget
    }

    fn remaining_time(&self) -> Duration {
        self.budget.saturating_sub(self.consumed())
    }
}

/// Stops as soon as any child stops; the remaining time is the smallest of the children's
pub struct DisjunctiveCompositeTerminationCriterion {
    criteria: Vec<Box<dyn TerminationCriterion>>,
}

impl DisjunctiveCompositeTerminationCriterion {
    pub fn new(criteria: Vec<Box<dyn TerminationCriterion>>) -> Self {
        Self { criteria }
    }
}

impl TerminationCriterion for DisjunctiveCompositeTerminationCriterion {
    fn has_to_stop(&self) -> bool {
        self.criteria.iter().any(|c| c.has_to_stop())
    }

    fn remaining_time(&self) -> Duration {
        self.criteria
            .iter()
            .map(|c| c.remaining_time())
            .min()
            .unwrap_or(Duration::MAX)
    }
}

/// Never stops
#[derive(Clone, Copy, Debug, Default)]
pub struct NeverEndingTerminationCriterion;

impl TerminationCriterion for NeverEndingTerminationCriterion {
    fn has_to_stop(&self) -> bool {
        false
    }

    fn remaining_time(&self) -> Duration {
        Duration::MAX
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_walltime_expires() {
        let criterion = WalltimeTerminationCriterion::starting_now(Duration::from_millis(50));
        assert!(!criterion.has_to_stop());
        assert!(criterion.remaining_time() <= Duration::from_millis(50));

        thread::sleep(Duration::from_millis(60));
        assert!(criterion.has_to_stop());
        assert_eq!(criterion.remaining_time(), Duration::ZERO);
    }

    #[test]
    fn test_cpu_time_ignores_sleep() {
        let criterion = CpuTimeTerminationCriterion::starting_now(Duration::from_millis(200));
        thread::sleep(Duration::from_millis(250));
        assert!(!criterion.has_to_stop());
    }

    #[cfg(unix)]
    #[test]
    fn test_process_cpu_time_advances_with_work() {
        let before = process_cpu_time();
        let deadline = Instant::now() + Duration::from_millis(100);
        let mut spins = 0u64;
        while Instant::now() < deadline {
            spins = std::hint::black_box(spins.wrapping_add(1));
        }
        let used = process_cpu_time().saturating_sub(before);
        assert!(used >= Duration::from_millis(50), "only {:?} of CPU time", used);

        let criterion = CpuTimeTerminationCriterion::starting_now(Duration::from_millis(10));
        let deadline = Instant::now() + Duration::from_millis(100);
        while Instant::now() < deadline {
            spins = std::hint::black_box(spins.wrapping_add(1));
        }
        assert!(criterion.has_to_stop());
    }

    #[test]
    fn test_composite_wall_and_cpu() {
        let composite = DisjunctiveCompositeTerminationCriterion::new(vec![
            Box::new(WalltimeTerminationCriterion::starting_now(Duration::from_secs(5))),
            Box::new(CpuTimeTerminationCriterion::starting_now(Duration::from_secs(2))),
        ]);

        assert!(!composite.has_to_stop());
        assert!(composite.remaining_time() <= Duration::from_secs(2));
        assert!(composite.remaining_time() > Duration::from_secs(1));
    }

    #[test]
    fn test_composite_stops_when_any_child_stops() {
        let composite = DisjunctiveCompositeTerminationCriterion::new(vec![
            Box::new(NeverEndingTerminationCriterion),
            Box::new(WalltimeTerminationCriterion::starting_now(Duration::ZERO)),
        ]);
        assert!(composite.has_to_stop());
        assert_eq!(composite.remaining_time(), Duration::ZERO);
    }

    #[test]
    fn test_empty_composite_never_stops() {
        let composite = DisjunctiveCompositeTerminationCriterion::new(Vec::new());
        assert!(!composite.has_to_stop());
        assert_eq!(composite.remaining_time(), Duration::MAX);
    }
}
