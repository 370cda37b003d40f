use std::time::{Duration, Instant};

/// Weight given to the previous estimate on every tick.
pub const FPS_DECAY: f64 = 0.9;
/// Lower bound for the time between ticks, in seconds.
pub const MIN_ELAPSED_SECS: f64 = 1e-6;

/// Exponential moving average of the frame rate.
#[derive(Debug, Clone, Copy)]
pub struct SmoothedFps {
    value: f64,
    last_tick: Instant,
    alpha: f64,
}

impl Default for SmoothedFps {
    fn default() -> Self {
        Self::new()
    }
}

impl SmoothedFps {
    pub fn new() -> Self {
        Self::starting_at(Instant::now())
    }

    pub fn starting_at(last_tick: Instant) -> Self {
        Self {
            value: 0.0,
            last_tick,
            alpha: FPS_DECAY,
        }
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn last_tick(&self) -> Instant {
        self.last_tick
    }

    /// Records a frame at the current time and returns the new estimate.
    pub fn tick(&mut self) -> f64 {
        self.tick_at(Instant::now())
    }

    pub fn tick_at(&mut self, now: Instant) -> f64 {
        let elapsed = now.saturating_duration_since(self.last_tick);
        self.last_tick = now;
        self.update_with_elapsed(elapsed)
    }

    /// Blends `1 / elapsed` into the estimate.
    pub fn update_with_elapsed(&mut self, elapsed: Duration) -> f64 {
        let dt = elapsed.as_secs_f64().max(MIN_ELAPSED_SECS);
        let instant = 1.0 / dt;
        self.value = self.alpha * self.value + (1.0 - self.alpha) * instant;
        self.value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_tick_is_a_tenth_of_the_instant_rate() {
        let mut fps = SmoothedFps::new();
        let v = fps.update_with_elapsed(Duration::from_millis(100));
        assert!((v - 1.0).abs() < 1e-9);
    }

    #[test]
    fn converges_to_reciprocal_of_fixed_interval() {
        let mut fps = SmoothedFps::new();
        let mut previous_gap = f64::MAX;
        for _ in 0..200 {
            let v = fps.update_with_elapsed(Duration::from_millis(40));
            let gap = (25.0 - v).abs();
            assert!(gap <= previous_gap + 1e-12);
            assert!(v <= 25.0 + 1e-9);
            previous_gap = gap;
        }
        assert!(previous_gap < 1e-6);
    }

    #[test]
    fn zero_elapsed_stays_finite() {
        let mut fps = SmoothedFps::new();
        for _ in 0..50 {
            let v = fps.update_with_elapsed(Duration::ZERO);
            assert!(v.is_finite());
            assert!(v >= 0.0);
        }
        assert!(fps.value() <= (1.0 / MIN_ELAPSED_SECS) * (1.0 + 1e-9));
    }

    #[test]
    fn tick_at_uses_wall_clock_gap_and_moves_timestamp() {
        let start = Instant::now();
        let mut fps = SmoothedFps::starting_at(start);
        let later = start + Duration::from_millis(50);
        let v = fps.tick_at(later);
        assert!((v - 2.0).abs() < 1e-9);
        assert_eq!(fps.last_tick(), later);
    }

    #[test]
    fn clock_going_backwards_is_floored() {
        let start = Instant::now() + Duration::from_secs(1);
        let mut fps = SmoothedFps::starting_at(start);
        let v = fps.tick_at(start - Duration::from_millis(500));
        assert!(v.is_finite() && v > 0.0);
    }
}
