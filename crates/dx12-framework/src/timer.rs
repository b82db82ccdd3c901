use std::time::Duration;
use std::time::Instant;

/// Frame clock with pause support.
///
/// `total_time` excludes every interval spent stopped; `delta_time` is the gap
/// between the last two ticks, never negative, and zero while stopped.
#[derive(Debug, Clone)]
pub struct GameTimer {
    base: Instant,
    previous: Instant,
    current: Instant,
    stopped_at: Option<Instant>,
    paused_total: Duration,
    delta: f64,
}

impl GameTimer {
    pub fn new() -> Self {
        Self::new_at(Instant::now())
    }

    pub fn new_at(now: Instant) -> Self {
        Self {
            base: now,
            previous: now,
            current: now,
            stopped_at: None,
            paused_total: Duration::ZERO,
            delta: 0.0,
        }
    }

    pub fn reset(&mut self) {
        self.reset_at(Instant::now());
    }

    pub fn reset_at(&mut self, now: Instant) {
        *self = Self::new_at(now);
    }

    pub fn start(&mut self) {
        self.start_at(Instant::now());
    }

    pub fn start_at(&mut self, now: Instant) {
        if let Some(stopped_at) = self.stopped_at.take() {
            self.paused_total += now.saturating_duration_since(stopped_at);
            self.previous = now;
        }
    }

    pub fn stop(&mut self) {
        self.stop_at(Instant::now());
    }

    pub fn stop_at(&mut self, now: Instant) {
        if self.stopped_at.is_none() {
            self.stopped_at = Some(now);
        }
    }

    pub fn tick(&mut self) {
        self.tick_at(Instant::now());
    }

    pub fn tick_at(&mut self, now: Instant) {
        if self.stopped_at.is_some() {
            self.delta = 0.0;
            return;
        }
        self.current = now;
        self.delta = self
            .current
            .saturating_duration_since(self.previous)
            .as_secs_f64();
        self.previous = self.current;
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped_at.is_some()
    }

    /// Seconds since the last reset, not counting paused time.
    pub fn total_time(&self) -> f32 {
        let end = self.stopped_at.unwrap_or(self.current);
        end.saturating_duration_since(self.base)
            .saturating_sub(self.paused_total)
            .as_secs_f32()
    }

    /// Seconds between the last two ticks.
    pub fn delta_time(&self) -> f32 {
        self.delta as f32
    }
}

impl Default for GameTimer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    #[test]
    fn tick_measures_delta() {
        let t0 = Instant::now();
        let mut timer = GameTimer::new_at(t0);
        timer.tick_at(t0 + ms(16));
        assert!((timer.delta_time() - 0.016).abs() < 1e-6);
        timer.tick_at(t0 + ms(48));
        assert!((timer.delta_time() - 0.032).abs() < 1e-6);
        assert!((timer.total_time() - 0.048).abs() < 1e-6);
    }

    #[test]
    fn paused_time_is_excluded() {
        let t0 = Instant::now();
        let mut timer = GameTimer::new_at(t0);
        timer.tick_at(t0 + ms(100));
        timer.stop_at(t0 + ms(100));
        timer.tick_at(t0 + ms(600));
        assert_eq!(timer.delta_time(), 0.0);
        assert!((timer.total_time() - 0.1).abs() < 1e-6);

        timer.start_at(t0 + ms(1100));
        timer.tick_at(t0 + ms(1110));
        assert!((timer.delta_time() - 0.010).abs() < 1e-6);
        assert!((timer.total_time() - 0.110).abs() < 1e-6);
    }

    #[test]
    fn redundant_start_and_stop_are_ignored() {
        let t0 = Instant::now();
        let mut timer = GameTimer::new_at(t0);
        timer.start_at(t0 + ms(5));
        timer.stop_at(t0 + ms(10));
        timer.stop_at(t0 + ms(50));
        timer.start_at(t0 + ms(60));
        timer.tick_at(t0 + ms(70));
        assert!((timer.total_time() - 0.020).abs() < 1e-6);
    }

    #[test]
    fn delta_is_never_negative() {
        let t0 = Instant::now() + ms(1000);
        let mut timer = GameTimer::new_at(t0);
        timer.tick_at(t0 - ms(10));
        assert_eq!(timer.delta_time(), 0.0);
    }
}
