use std::time::{Duration, Instant};

/// Optional FPS cap applied on top of the display refresh.
///
/// `None` (or a non-positive FPS) means every refresh fires.
#[derive(Debug, Clone)]
pub struct FramePacer {
    interval: Option<Duration>,
    last_fired: Option<Instant>,
}

fn normalize_fps(value: Option<f32>) -> Option<f32> {
    value.and_then(|fps| if fps > 0.0 && fps.is_finite() { Some(fps) } else { None })
}

impl FramePacer {
    pub fn new(target_fps: Option<f32>) -> Self {
        Self {
            interval: normalize_fps(target_fps)
                .map(|fps| Duration::from_secs_f64(1.0 / f64::from(fps))),
            last_fired: None,
        }
    }

    pub fn interval(&self) -> Option<Duration> {
        self.interval
    }

    pub fn ready(&self, now: Instant) -> bool {
        match (self.interval, self.last_fired) {
            (Some(interval), Some(last)) => now.saturating_duration_since(last) >= interval,
            _ => true,
        }
    }

    pub fn mark_fired(&mut self, now: Instant) {
        self.last_fired = Some(now);
    }

    /// Earliest instant at which [`ready`](Self::ready) turns true, if capped.
    pub fn next_deadline(&self) -> Option<Instant> {
        let interval = self.interval?;
        self.last_fired.map(|last| last + interval)
    }

    pub fn reset(&mut self) {
        self.last_fired = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uncapped_pacer_is_always_ready() {
        let mut pacer = FramePacer::new(None);
        let now = Instant::now();
        assert!(pacer.ready(now));
        pacer.mark_fired(now);
        assert!(pacer.ready(now));
        assert_eq!(pacer.next_deadline(), None);
    }

    #[test]
    fn zero_fps_treated_as_uncapped() {
        let pacer = FramePacer::new(Some(0.0));
        assert_eq!(pacer.interval(), None);
    }

    #[test]
    fn capped_pacer_waits_for_interval() {
        let mut pacer = FramePacer::new(Some(10.0));
        let start = Instant::now();
        assert!(pacer.ready(start));
        pacer.mark_fired(start);
        assert!(!pacer.ready(start + Duration::from_millis(50)));
        assert!(pacer.ready(start + Duration::from_millis(100)));
        let deadline = pacer.next_deadline().expect("deadline");
        assert!(deadline > start);

        pacer.reset();
        assert!(pacer.ready(start));
    }

    #[test]
    fn interval_is_exact_for_whole_fps() {
        let pacer = FramePacer::new(Some(10.0));
        assert_eq!(pacer.interval(), Some(Duration::from_millis(100)));
        let pacer = FramePacer::new(Some(50.0));
        assert_eq!(pacer.interval(), Some(Duration::from_millis(20)));
    }
}
