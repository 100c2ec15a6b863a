/// 3-band equalizer with biquad filters.
/// Bands: low shelf 250Hz, mid peak 1kHz, high shelf 4kHz. Gains ramp over 0.1s.
use serde::{Deserialize, Serialize};

use super::smoothing::SmoothedValue;

pub const EQ_MIN_DB: f32 = -12.0;
pub const EQ_MAX_DB: f32 = 12.0;
pub const EQ_RAMP_SECS: f32 = 0.1;

const LOW_SHELF_FREQ: f64 = 250.0;
const MID_PEAK_FREQ: f64 = 1000.0;
const MID_PEAK_Q: f64 = 0.7;
const HIGH_SHELF_FREQ: f64 = 4000.0;
/// Shelf slope S = 1 (steepest without overshoot).
const SHELF_SLOPE: f64 = 1.0;

/// Coefficients are recomputed every this many samples while a gain ramps.
const COEFF_BLOCK: u32 = 32;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EqBand {
    Low,
    Mid,
    High,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize, Default)]
pub struct EqBands {
    pub low: f32,
    pub mid: f32,
    pub high: f32,
}

impl EqBands {
    pub fn new(low: f32, mid: f32, high: f32) -> Self {
        Self {
            low: clamp_gain(low),
            mid: clamp_gain(mid),
            high: clamp_gain(high),
        }
    }

    pub fn get(&self, band: EqBand) -> f32 {
        match band {
            EqBand::Low => self.low,
            EqBand::Mid => self.mid,
            EqBand::High => self.high,
        }
    }

    pub fn set(&mut self, band: EqBand, db: f32) {
        let db = clamp_gain(db);
        match band {
            EqBand::Low => self.low = db,
            EqBand::Mid => self.mid = db,
            EqBand::High => self.high = db,
        }
    }
}

pub fn clamp_gain(db: f32) -> f32 {
    if db.is_finite() {
        db.clamp(EQ_MIN_DB, EQ_MAX_DB)
    } else {
        0.0
    }
}

/// Built-in EQ presets.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EqPreset {
    Flat,
    CyberBass,
    NeonTreble,
    Underground,
    Punchy,
}

impl EqPreset {
    pub const ALL: [EqPreset; 5] = [
        EqPreset::Flat,
        EqPreset::CyberBass,
        EqPreset::NeonTreble,
        EqPreset::Underground,
        EqPreset::Punchy,
    ];

    pub fn bands(self) -> EqBands {
        match self {
            EqPreset::Flat => EqBands::new(0.0, 0.0, 0.0),
            EqPreset::CyberBass => EqBands::new(12.0, -4.0, 2.0),
            EqPreset::NeonTreble => EqBands::new(-6.0, 2.0, 12.0),
            EqPreset::Underground => EqBands::new(10.0, 6.0, -8.0),
            EqPreset::Punchy => EqBands::new(6.0, 3.0, 6.0),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            EqPreset::Flat => "FLAT",
            EqPreset::CyberBass => "CYBER_BASS",
            EqPreset::NeonTreble => "NEON_TREBLE",
            EqPreset::Underground => "UNDERGROUND",
            EqPreset::Punchy => "PUNCHY",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|p| p.name().eq_ignore_ascii_case(name))
    }
}

#[derive(Clone)]
struct BiquadFilter {
    b0: f64,
    b1: f64,
    b2: f64,
    a1: f64,
    a2: f64,
    // State per channel (stereo = 2)
    x1: [f64; 2],
    x2: [f64; 2],
    y1: [f64; 2],
    y2: [f64; 2],
}

impl BiquadFilter {
    fn new() -> Self {
        Self {
            b0: 1.0,
            b1: 0.0,
            b2: 0.0,
            a1: 0.0,
            a2: 0.0,
            x1: [0.0; 2],
            x2: [0.0; 2],
            y1: [0.0; 2],
            y2: [0.0; 2],
        }
    }

    fn set_normalized(&mut self, b: [f64; 3], a: [f64; 3]) {
        self.b0 = b[0] / a[0];
        self.b1 = b[1] / a[0];
        self.b2 = b[2] / a[0];
        self.a1 = a[1] / a[0];
        self.a2 = a[2] / a[0];
    }

    fn set_peaking_eq(&mut self, sample_rate: f64, freq: f64, gain_db: f32, q: f64) {
        let a = 10.0_f64.powf(gain_db as f64 / 40.0);
        let w0 = 2.0 * std::f64::consts::PI * freq / sample_rate;
        let alpha = w0.sin() / (2.0 * q);
        let cos = w0.cos();

        self.set_normalized(
            [1.0 + alpha * a, -2.0 * cos, 1.0 - alpha * a],
            [1.0 + alpha / a, -2.0 * cos, 1.0 - alpha / a],
        );
    }

    fn set_low_shelf(&mut self, sample_rate: f64, freq: f64, gain_db: f32) {
        let a = 10.0_f64.powf(gain_db as f64 / 40.0);
        let w0 = 2.0 * std::f64::consts::PI * freq / sample_rate;
        let (sin, cos) = w0.sin_cos();
        let alpha = sin / 2.0 * ((a + 1.0 / a) * (1.0 / SHELF_SLOPE - 1.0) + 2.0).sqrt();
        let sq = 2.0 * a.sqrt() * alpha;

        self.set_normalized(
            [
                a * ((a + 1.0) - (a - 1.0) * cos + sq),
                2.0 * a * ((a - 1.0) - (a + 1.0) * cos),
                a * ((a + 1.0) - (a - 1.0) * cos - sq),
            ],
            [
                (a + 1.0) + (a - 1.0) * cos + sq,
                -2.0 * ((a - 1.0) + (a + 1.0) * cos),
                (a + 1.0) + (a - 1.0) * cos - sq,
            ],
        );
    }

    fn set_high_shelf(&mut self, sample_rate: f64, freq: f64, gain_db: f32) {
        let a = 10.0_f64.powf(gain_db as f64 / 40.0);
        let w0 = 2.0 * std::f64::consts::PI * freq / sample_rate;
        let (sin, cos) = w0.sin_cos();
        let alpha = sin / 2.0 * ((a + 1.0 / a) * (1.0 / SHELF_SLOPE - 1.0) + 2.0).sqrt();
        let sq = 2.0 * a.sqrt() * alpha;

        self.set_normalized(
            [
                a * ((a + 1.0) + (a - 1.0) * cos + sq),
                -2.0 * a * ((a - 1.0) + (a + 1.0) * cos),
                a * ((a + 1.0) + (a - 1.0) * cos - sq),
            ],
            [
                (a + 1.0) - (a - 1.0) * cos + sq,
                2.0 * ((a - 1.0) - (a + 1.0) * cos),
                (a + 1.0) - (a - 1.0) * cos - sq,
            ],
        );
    }

    #[inline]
    fn process_sample(&mut self, input: f32, channel: usize) -> f32 {
        let x = input as f64;
        let y = self.b0 * x + self.b1 * self.x1[channel] + self.b2 * self.x2[channel]
            - self.a1 * self.y1[channel]
            - self.a2 * self.y2[channel];

        self.x2[channel] = self.x1[channel];
        self.x1[channel] = x;
        self.y2[channel] = self.y1[channel];
        self.y1[channel] = y;

        y as f32
    }
}

pub struct Equalizer {
    low: BiquadFilter,
    mid: BiquadFilter,
    high: BiquadFilter,
    gains: [SmoothedValue; 3],
    sample_rate: u32,
    block_ctr: u32,
}

impl Equalizer {
    pub fn new(sample_rate: u32) -> Self {
        let mut eq = Self {
            low: BiquadFilter::new(),
            mid: BiquadFilter::new(),
            high: BiquadFilter::new(),
            gains: std::array::from_fn(|_| SmoothedValue::new(0.0, EQ_RAMP_SECS, sample_rate)),
            sample_rate,
            block_ctr: 0,
        };
        eq.update_filters();
        eq
    }

    /// Ramp toward new band gains (dB, clamped to ±12).
    pub fn set_bands(&mut self, bands: EqBands) {
        self.gains[0].set_target(clamp_gain(bands.low));
        self.gains[1].set_target(clamp_gain(bands.mid));
        self.gains[2].set_target(clamp_gain(bands.high));
    }

    /// Gains the filters are currently running with.
    pub fn current_bands(&self) -> EqBands {
        EqBands {
            low: self.gains[0].current(),
            mid: self.gains[1].current(),
            high: self.gains[2].current(),
        }
    }

    fn update_filters(&mut self) {
        let sr = self.sample_rate as f64;
        self.low.set_low_shelf(sr, LOW_SHELF_FREQ, self.gains[0].current());
        self.mid
            .set_peaking_eq(sr, MID_PEAK_FREQ, self.gains[1].current(), MID_PEAK_Q);
        self.high.set_high_shelf(sr, HIGH_SHELF_FREQ, self.gains[2].current());
    }

    fn is_flat(&self) -> bool {
        self.gains
            .iter()
            .all(|g| !g.is_ramping() && g.current() == 0.0)
    }

    /// Process interleaved stereo samples in-place.
    pub fn process(&mut self, samples: &mut [f32]) {
        if self.is_flat() {
            return;
        }
        for frame in samples.chunks_exact_mut(2) {
            if self.block_ctr == 0 && self.gains.iter().any(|g| g.is_ramping()) {
                for g in self.gains.iter_mut() {
                    g.advance(COEFF_BLOCK);
                }
                self.update_filters();
            }
            self.block_ctr = (self.block_ctr + 1) % COEFF_BLOCK;

            for (ch, s) in frame.iter_mut().enumerate() {
                let mut sample = *s;
                sample = self.low.process_sample(sample, ch);
                sample = self.mid.process_sample(sample, ch);
                sample = self.high.process_sample(sample, ch);
                *s = sample;
            }
        }
    }
}
