//! Refill scheduling math for the streaming worker.
//!
//! Tracks the last reported FIFO status and answers, for a given instant,
//! how full the FIFO probably is now, how many points are needed to honour
//! the latency budget, and how long the worker should sleep before asking
//! again. All queries take an explicit `now` so the arithmetic stays
//! deterministic under test.

use std::time::{Duration, Instant};

use crate::config;

/// Last reported FIFO status plus the drain model derived from it.
#[derive(Debug, Default)]
pub(crate) struct RefillState {
    point_rate: u32,
    buffer_fullness: u16,
    last_receive: Option<Instant>,
}

impl RefillState {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Record a freshly decoded status frame.
    pub(crate) fn note_status(&mut self, buffer_fullness: u16, point_rate: u32, now: Instant) {
        self.buffer_fullness = buffer_fullness;
        self.point_rate = point_rate;
        self.last_receive = Some(now);
    }

    pub(crate) fn point_rate(&self) -> u32 {
        self.point_rate
    }

    /// Estimate the FIFO occupancy at `now`.
    ///
    /// The last reported fullness alone overestimates whenever time has
    /// passed since the reply, which leads to undersending and underruns;
    /// subtracting the points consumed since the reply keeps the estimate
    /// close to the true depth. Clamped to `[0, FIFO_CAPACITY]`.
    pub(crate) fn estimated_fullness(&self, now: Instant) -> usize {
        let reported = self.buffer_fullness as usize;
        if self.point_rate == 0 {
            return reported.min(config::FIFO_CAPACITY);
        }
        let Some(received_at) = self.last_receive else {
            return reported.min(config::FIFO_CAPACITY);
        };

        let elapsed = now.saturating_duration_since(received_at);
        let consumed = self.point_rate as f64 * elapsed.as_secs_f64();
        let estimated = reported as f64 - consumed;
        estimated.clamp(0.0, config::FIFO_CAPACITY as f64).round() as usize
    }

    /// How many points must be appended now to satisfy the latency budget.
    ///
    /// Zero when the FIFO already holds enough, when no rate is known yet,
    /// or when the latency budget is non-positive.
    pub(crate) fn minimum_points(&self, latency_ms: i64, now: Instant) -> usize {
        if self.point_rate == 0 || latency_ms <= 0 {
            return 0;
        }

        let fullness = self.estimated_fullness(now) as f64;
        let mut required = config::MIN_BUFFER_FLOOR as f64
            + (self.point_rate as f64 * latency_ms as f64) / 1000.0;
        if required <= fullness {
            return 0;
        }
        if required > config::FIFO_CAPACITY as f64 {
            required = config::FIFO_CAPACITY as f64;
        }

        (required - fullness).max(0.0).ceil() as usize
    }

    /// The generator bounds for one refill: the deficit (bounded by free
    /// space) and the free space itself.
    pub(crate) fn fill_bounds(&self, latency_ms: i64, now: Instant) -> (usize, usize) {
        let fullness = self.estimated_fullness(now);
        let free = config::FIFO_CAPACITY.saturating_sub(fullness);
        let minimum = self.minimum_points(latency_ms, now).min(free);
        (minimum, free)
    }

    /// How long the worker may sleep before the FIFO drains to the level
    /// the latency budget asks for.
    ///
    /// Without rate information the loop paces at the nominal tick; the
    /// computed value is clamped to `[MIN_SLEEP, MAX_SLEEP]` so the loop
    /// neither spins nor oversleeps a flag change.
    pub(crate) fn sleep_duration(&self, latency_ms: i64, now: Instant) -> Duration {
        if self.point_rate == 0 || latency_ms <= 0 {
            return config::TICK_INTERVAL;
        }

        let min_points_in_buffer = millis_to_points(latency_ms as f64, self.point_rate);
        let deficit = self.estimated_fullness(now) as i64 - min_points_in_buffer as i64;
        let points_to_wait = deficit.clamp(0, config::MIN_PACKET_POINTS as i64) as usize;

        let millis = points_to_millis(points_to_wait, self.point_rate);
        Duration::from_secs_f64(millis / 1000.0).clamp(config::MIN_SLEEP, config::MAX_SLEEP)
    }
}

/// Playback duration of `point_count` points at `rate`, in milliseconds.
pub(crate) fn points_to_millis(point_count: usize, rate: u32) -> f64 {
    if rate == 0 || point_count == 0 {
        return 0.0;
    }
    (point_count as f64 * 1000.0) / rate as f64
}

/// Number of points consumed in `millis` at `rate`.
pub(crate) fn millis_to_points(millis: f64, rate: u32) -> usize {
    if rate == 0 || millis <= 0.0 {
        return 0;
    }
    ((millis / 1000.0) * rate as f64).round() as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(fullness: u16, rate: u32, at: Instant) -> RefillState {
        let mut state = RefillState::new();
        state.note_status(fullness, rate, at);
        state
    }

    // --- Conversions ---

    #[test]
    fn conversion_round_trip() {
        assert_eq!(points_to_millis(150, 30_000), 5.0);
        assert_eq!(millis_to_points(50.0, 30_000), 1500);
        assert_eq!(points_to_millis(0, 30_000), 0.0);
        assert_eq!(points_to_millis(100, 0), 0.0);
        assert_eq!(millis_to_points(-3.0, 30_000), 0);
        assert_eq!(millis_to_points(50.0, 0), 0);
    }

    // --- Fullness estimate ---

    #[test]
    fn estimate_equals_report_at_receive_time() {
        let t = Instant::now();
        assert_eq!(state(1500, 30_000, t).estimated_fullness(t), 1500);
    }

    #[test]
    fn estimate_decays_with_elapsed_time() {
        let t = Instant::now();
        let s = state(1500, 30_000, t);
        // After 20ms at 30000 pps: consumed = 600.
        assert_eq!(s.estimated_fullness(t + Duration::from_millis(20)), 900);
    }

    #[test]
    fn estimate_never_goes_negative() {
        let t = Instant::now();
        let s = state(100, 30_000, t);
        assert_eq!(s.estimated_fullness(t + Duration::from_secs(10)), 0);
    }

    #[test]
    fn estimate_clamps_to_capacity() {
        let t = Instant::now();
        // A bogus report above the device FIFO depth is clamped.
        assert_eq!(
            state(5000, 30_000, t).estimated_fullness(t),
            config::FIFO_CAPACITY
        );
    }

    #[test]
    fn zero_rate_freezes_the_estimate() {
        let t = Instant::now();
        let s = state(500, 0, t);
        assert_eq!(s.estimated_fullness(t + Duration::from_secs(5)), 500);
    }

    // --- Refill decision ---

    #[test]
    fn refill_deficit_at_thirty_kpps() {
        // required = 256 + 30000 * 0.050 = 1756; deficit = 1756 - 200 = 1556;
        // free = 1799 - 200 = 1599; minimum = min(1556, 1599) = 1556.
        let t = Instant::now();
        let s = state(200, 30_000, t);
        assert_eq!(s.minimum_points(50, t), 1556);
        assert_eq!(s.fill_bounds(50, t), (1556, 1599));
    }

    #[test]
    fn no_points_needed_when_buffer_satisfies_budget() {
        // required = 256 + 30000 * 0.010 = 556 <= 1700 reported.
        let t = Instant::now();
        let s = state(1700, 30_000, t);
        assert_eq!(s.minimum_points(10, t), 0);
        let (minimum, _) = s.fill_bounds(10, t);
        assert_eq!(minimum, 0);
    }

    #[test]
    fn required_is_capped_at_fifo_capacity() {
        // 256 + 30000 * 0.1 = 3256, capped to 1799; deficit = 1799.
        let t = Instant::now();
        let s = state(0, 30_000, t);
        assert_eq!(s.minimum_points(100, t), config::FIFO_CAPACITY);
    }

    #[test]
    fn zero_rate_or_latency_needs_nothing() {
        let t = Instant::now();
        assert_eq!(state(0, 0, t).minimum_points(50, t), 0);
        assert_eq!(state(0, 30_000, t).minimum_points(0, t), 0);
        assert_eq!(state(0, 30_000, t).minimum_points(-10, t), 0);
    }

    #[test]
    fn minimum_never_exceeds_maximum() {
        let t = Instant::now();
        for fullness in (0u16..=1799).step_by(97) {
            for latency in [1i64, 10, 50, 200] {
                let s = state(fullness, 30_000, t);
                let (minimum, maximum) = s.fill_bounds(latency, t);
                if maximum > 0 {
                    assert!(minimum <= maximum, "fullness={fullness} latency={latency}");
                }
            }
        }
    }

    // --- Sleep schedule ---

    #[test]
    fn sleep_paces_at_tick_interval_without_rate() {
        let t = Instant::now();
        assert_eq!(state(0, 0, t).sleep_duration(50, t), config::TICK_INTERVAL);
        assert_eq!(
            state(0, 30_000, t).sleep_duration(0, t),
            config::TICK_INTERVAL
        );
    }

    #[test]
    fn sleep_floors_at_min_sleep_when_starved() {
        // Fullness below the latency target: nothing to wait for.
        let t = Instant::now();
        let s = state(100, 30_000, t);
        assert_eq!(s.sleep_duration(50, t), config::MIN_SLEEP);
    }

    #[test]
    fn sleep_caps_at_max_sleep_when_saturated() {
        // Deficit far above MIN_PACKET_POINTS: capped at 150 points, which
        // at 30000 pps is 5ms.
        let t = Instant::now();
        let s = state(1799, 30_000, t);
        assert_eq!(s.sleep_duration(10, t), config::MAX_SLEEP);
    }

    #[test]
    fn sleep_tracks_partial_deficit() {
        // Latency target = 30 points at 30000 pps (1ms). Fullness 90 ->
        // deficit 60 points -> 2ms.
        let t = Instant::now();
        let s = state(90, 30_000, t);
        assert_eq!(s.sleep_duration(1, t), Duration::from_millis(2));
    }
}
