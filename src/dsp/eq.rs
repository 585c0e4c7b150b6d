//! Three-band EQ
//!
//! Low shelf, mid peak and high shelf built from cascaded biquads using the
//! Audio EQ Cookbook formulas. One instance per layer; coefficients are only
//! recomputed when a gain actually changes.

use std::f64::consts::PI;

/// Gain range for every band, in dB
pub const EQ_GAIN_RANGE_DB: (f32, f32) = (-24.0, 24.0);

const LOW_SHELF_HZ: f64 = 250.0;
const MID_PEAK_HZ: f64 = 1000.0;
const MID_PEAK_Q: f64 = 0.7;
const HIGH_SHELF_HZ: f64 = 4000.0;
const SHELF_Q: f64 = 0.707;

/// Below this the band counts as flat
const BYPASS_THRESHOLD_DB: f32 = 0.01;

/// Filter shape of one band
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BandShape {
    LowShelf,
    Peak,
    HighShelf,
}

/// Biquad filter coefficients, normalized by a0
#[derive(Debug, Clone, Copy)]
struct BiquadCoeffs {
    b0: f64,
    b1: f64,
    b2: f64,
    a1: f64,
    a2: f64,
}

impl BiquadCoeffs {
    const IDENTITY: Self = Self {
        b0: 1.0,
        b1: 0.0,
        b2: 0.0,
        a1: 0.0,
        a2: 0.0,
    };

    fn calculate(shape: BandShape, sample_rate: f64, frequency: f64, gain_db: f64, q: f64) -> Self {
        let freq = frequency.clamp(20.0, sample_rate / 2.0 - 1.0);
        let w0 = 2.0 * PI * freq / sample_rate;
        let cos_w0 = w0.cos();
        let alpha = w0.sin() / (2.0 * q);
        let a = 10.0_f64.powf(gain_db / 40.0);

        let (b0, b1, b2, a0, a1, a2) = match shape {
            BandShape::Peak => (
                1.0 + alpha * a,
                -2.0 * cos_w0,
                1.0 - alpha * a,
                1.0 + alpha / a,
                -2.0 * cos_w0,
                1.0 - alpha / a,
            ),
            BandShape::LowShelf => {
                let k = 2.0 * a.sqrt() * alpha;
                (
                    a * ((a + 1.0) - (a - 1.0) * cos_w0 + k),
                    2.0 * a * ((a - 1.0) - (a + 1.0) * cos_w0),
                    a * ((a + 1.0) - (a - 1.0) * cos_w0 - k),
                    (a + 1.0) + (a - 1.0) * cos_w0 + k,
                    -2.0 * ((a - 1.0) + (a + 1.0) * cos_w0),
                    (a + 1.0) + (a - 1.0) * cos_w0 - k,
                )
            }
            BandShape::HighShelf => {
                let k = 2.0 * a.sqrt() * alpha;
                (
                    a * ((a + 1.0) + (a - 1.0) * cos_w0 + k),
                    -2.0 * a * ((a - 1.0) + (a + 1.0) * cos_w0),
                    a * ((a + 1.0) + (a - 1.0) * cos_w0 - k),
                    (a + 1.0) - (a - 1.0) * cos_w0 + k,
                    2.0 * ((a - 1.0) - (a + 1.0) * cos_w0),
                    (a + 1.0) - (a - 1.0) * cos_w0 - k,
                )
            }
        };

        Self {
            b0: b0 / a0,
            b1: b1 / a0,
            b2: b2 / a0,
            a1: a1 / a0,
            a2: a2 / a0,
        }
    }
}

/// Direct Form I state for one channel
#[derive(Debug, Clone, Copy, Default)]
struct BiquadState {
    x1: f64,
    x2: f64,
    y1: f64,
    y2: f64,
}

impl BiquadState {
    #[inline]
    fn process(&mut self, input: f64, c: &BiquadCoeffs) -> f64 {
        let output =
            c.b0 * input + c.b1 * self.x1 + c.b2 * self.x2 - c.a1 * self.y1 - c.a2 * self.y2;
        self.x2 = self.x1;
        self.x1 = input;
        self.y2 = self.y1;
        self.y1 = output;
        output
    }
}

#[derive(Debug, Clone)]
struct Band {
    shape: BandShape,
    frequency: f64,
    q: f64,
    gain_db: f32,
    coeffs: BiquadCoeffs,
    state: [BiquadState; 2],
}

impl Band {
    fn new(shape: BandShape, frequency: f64, q: f64) -> Self {
        Self {
            shape,
            frequency,
            q,
            gain_db: 0.0,
            coeffs: BiquadCoeffs::IDENTITY,
            state: [BiquadState::default(); 2],
        }
    }

    fn is_flat(&self) -> bool {
        self.gain_db.abs() < BYPASS_THRESHOLD_DB
    }

    fn update(&mut self, sample_rate: f64) {
        self.coeffs = if self.is_flat() {
            BiquadCoeffs::IDENTITY
        } else {
            BiquadCoeffs::calculate(
                self.shape,
                sample_rate,
                self.frequency,
                self.gain_db as f64,
                self.q,
            )
        };
    }
}

/// Per-layer low/mid/high EQ
#[derive(Debug, Clone)]
pub struct ThreeBandEq {
    bands: [Band; 3],
    sample_rate: f64,
}

impl ThreeBandEq {
    /// Create a flat EQ
    pub fn new() -> Self {
        Self {
            bands: [
                Band::new(BandShape::LowShelf, LOW_SHELF_HZ, SHELF_Q),
                Band::new(BandShape::Peak, MID_PEAK_HZ, MID_PEAK_Q),
                Band::new(BandShape::HighShelf, HIGH_SHELF_HZ, SHELF_Q),
            ],
            sample_rate: 48000.0,
        }
    }

    /// Set the sample rate and recompute coefficients
    pub fn prepare(&mut self, sample_rate: u32) {
        self.sample_rate = sample_rate as f64;
        for band in &mut self.bands {
            band.update(self.sample_rate);
        }
        self.reset();
    }

    /// Set all three gains in dB (clamped to +-24 dB)
    ///
    /// Coefficients are recomputed only for bands whose gain changed.
    pub fn set_gains(&mut self, low_db: f32, mid_db: f32, high_db: f32) {
        let (min, max) = EQ_GAIN_RANGE_DB;
        for (band, gain) in self.bands.iter_mut().zip([low_db, mid_db, high_db]) {
            let gain = if gain.is_finite() { gain.clamp(min, max) } else { 0.0 };
            if gain != band.gain_db {
                band.gain_db = gain;
                band.update(self.sample_rate);
            }
        }
    }

    /// Current gains as (low, mid, high) in dB
    pub fn gains(&self) -> (f32, f32, f32) {
        (self.bands[0].gain_db, self.bands[1].gain_db, self.bands[2].gain_db)
    }

    /// True when every band is flat and processing can be skipped
    pub fn is_bypassed(&self) -> bool {
        self.bands.iter().all(Band::is_flat)
    }

    /// Filter a stereo block in place
    pub fn process(&mut self, left: &mut [f32], right: &mut [f32]) {
        if self.is_bypassed() {
            return;
        }
        for band in self.bands.iter_mut().filter(|b| !b.is_flat()) {
            let coeffs = band.coeffs;
            let [state_l, state_r] = &mut band.state;
            for sample in left.iter_mut() {
                *sample = state_l.process(*sample as f64, &coeffs) as f32;
            }
            for sample in right.iter_mut() {
                *sample = state_r.process(*sample as f64, &coeffs) as f32;
            }
        }
    }

    /// Clear filter history
    pub fn reset(&mut self) {
        for band in &mut self.bands {
            band.state = [BiquadState::default(); 2];
        }
    }
}

impl Default for ThreeBandEq {
    fn default() -> Self {
        Self::new()
    }
}
