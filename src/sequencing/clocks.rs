/// Monotonic sample counter; the audio clock every schedule is measured against
#[derive(Debug, Default)]
pub struct Clock {
    current_sample: u64,
}

impl Clock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tick(&mut self) {
        self.current_sample = self.current_sample.wrapping_add(1);
    }

    pub fn get_sample(&self) -> u64 {
        self.current_sample
    }

    pub fn seconds(&self, sample_rate: f32) -> f64 {
        self.current_sample as f64 / sample_rate as f64
    }

    pub fn reset(&mut self) {
        self.current_sample = 0;
    }
}

/// Evenly spaced repeating tick positions.
///
/// Positions are kept in fractional samples so a grid whose interval is not
/// a whole number of samples does not drift. The first tick lands on the
/// sample the grid was started at.
#[derive(Debug)]
pub struct TickGrid {
    samples_per_tick: f64,
    // Tick n sits at anchor + n * samples_per_tick
    anchor: f64,
    since_anchor: u64,
    last_tick: Option<f64>,
    ticks_fired: u64,
}

impl TickGrid {
    pub fn new(samples_per_tick: f64, start_sample: u64) -> Self {
        Self {
            samples_per_tick: samples_per_tick.max(1.0),
            anchor: start_sample as f64,
            since_anchor: 0,
            last_tick: None,
            ticks_fired: 0,
        }
    }

    /// New spacing, counted from the most recent tick. A next tick that
    /// would already be overdue at `now` is moved to `now`, so a speed-up
    /// never fires a burst of catch-up ticks.
    pub fn set_samples_per_tick(&mut self, samples_per_tick: f64, now: u64) {
        self.samples_per_tick = samples_per_tick.max(1.0);
        if let Some(last_tick) = self.last_tick {
            self.anchor = (last_tick + self.samples_per_tick).max(now as f64);
            self.since_anchor = 0;
        }
    }

    pub fn samples_per_tick(&self) -> f64 {
        self.samples_per_tick
    }

    pub fn next_tick(&self) -> f64 {
        self.anchor + self.since_anchor as f64 * self.samples_per_tick
    }

    /// Returns the tick index and its exact position in samples when the
    /// clock has reached the next tick
    pub fn tick(&mut self, clock: &Clock) -> Option<(u64, f64)> {
        let position = self.next_tick();
        if (clock.get_sample() as f64) < position {
            return None;
        }

        let index = self.ticks_fired;
        self.last_tick = Some(position);
        self.since_anchor += 1;
        self.ticks_fired += 1;

        Some((index, position))
    }
}
