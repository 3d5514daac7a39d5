use crate::audio::{AudioProcessor, PI};

// Tan approximation function
fn tan_a(x: f32) -> f32 {
    let x2 = x * x;
    x * (0.999999492001 + x2 * -0.096524608111)
        / (1.0 + x2 * (-0.429867256894 + x2 * 0.009981877999))
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FilterMode {
    Lowpass,
    Highpass,
    Bandpass,
}

// SVF implementation matching Emilie Gillet's stmlib version
pub struct SVF {
    // State variables
    y0: f32,
    y1: f32,

    // Filter outputs
    lp: f32,
    hp: f32,
    bp: f32,

    // Filter parameters
    mode: FilterMode,
    cf: f32, // Cutoff frequency
    q: f32,  // Resonance
    sample_rate: f32,

    // Precomputed coefficients
    g: f32,
    r: f32,
    h: f32,
    rpg: f32,

    coeffs_dirty: bool,
}

impl SVF {
    pub fn new(cf: f32, q: f32, mode: FilterMode, sample_rate: f32) -> Self {
        let mut svf = Self {
            y0: 0.0,
            y1: 0.0,
            lp: 0.0,
            hp: 0.0,
            bp: 0.0,
            mode,
            cf,
            q,
            sample_rate,
            g: 0.0,
            r: 0.0,
            h: 0.0,
            rpg: 0.0,
            coeffs_dirty: true,
        };
        svf.update_coefficients();
        svf
    }

    fn update_coefficients(&mut self) {
        if self.coeffs_dirty {
            // The tan approximation only holds below Nyquist
            let nyquist_limit = self.sample_rate * 0.49;
            let cf = self.cf.clamp(10.0, nyquist_limit);
            self.g = tan_a(cf * PI / self.sample_rate);
            self.r = 1.0 / self.q.max(0.001);
            self.h = 1.0 / (1.0 + self.r * self.g + self.g * self.g);
            self.rpg = self.r + self.g;
            self.coeffs_dirty = false;
        }
    }

    pub fn set_cutoff_frequency(&mut self, cf: f32) {
        if (self.cf - cf).abs() > f32::EPSILON {
            self.cf = cf;
            self.coeffs_dirty = true;
        }
    }

    pub fn cutoff_frequency(&self) -> f32 {
        self.cf
    }

    pub fn reset(&mut self) {
        self.y0 = 0.0;
        self.y1 = 0.0;
        self.lp = 0.0;
        self.hp = 0.0;
        self.bp = 0.0;
    }
}

impl AudioProcessor for SVF {
    fn process(&mut self, input: f32) -> f32 {
        self.update_coefficients();

        self.hp = (input - self.rpg * self.y0 - self.y1) * self.h;
        self.bp = self.g * self.hp + self.y0;
        self.y0 = self.g * self.hp + self.bp;
        self.lp = self.g * self.bp + self.y1;
        self.y1 = self.g * self.bp + self.lp;

        match self.mode {
            FilterMode::Lowpass => self.lp,
            FilterMode::Highpass => self.hp,
            FilterMode::Bandpass => self.bp,
        }
    }
}

#[derive(Clone, Copy)]
pub enum OnePoleMode {
    Lowpass,
    Highpass,
}

pub struct OnePoleFilter {
    state: f32,
    cutoff: f32,
    mode: OnePoleMode,
    sample_rate: f32,
    a0: f32,
    b1: f32,
}

impl OnePoleFilter {
    pub fn new(cutoff: f32, mode: OnePoleMode, sample_rate: f32) -> Self {
        let mut filter = Self {
            state: 0.0,
            cutoff,
            mode,
            sample_rate,
            a0: 0.0,
            b1: 0.0,
        };
        filter.update_coefficients();
        filter
    }

    fn update_coefficients(&mut self) {
        let omega = 2.0 * PI * self.cutoff / self.sample_rate;
        self.b1 = (-omega).exp();
        self.a0 = 1.0 - self.b1;
    }
}

impl AudioProcessor for OnePoleFilter {
    fn process(&mut self, input: f32) -> f32 {
        let lowpass = self.b1 * self.state + self.a0 * input;
        self.state = lowpass;

        match self.mode {
            OnePoleMode::Lowpass => lowpass,
            OnePoleMode::Highpass => input - lowpass,
        }
    }
}
