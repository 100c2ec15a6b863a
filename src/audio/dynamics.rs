/// Compressor and output limiter.

use super::smoothing::SmoothedValue;

/// Limiter ceiling. Nothing leaves the chain above this.
pub const LIMIT_CEILING: f32 = 0.99;
const LIMITER_RELEASE_SECS: f32 = 0.05;

pub const COMPRESSOR_RAMP_SECS: f32 = 0.1;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CompressorProfile {
    pub threshold_db: f32,
    pub ratio: f32,
    pub attack_secs: f32,
    pub release_secs: f32,
}

impl CompressorProfile {
    /// Threshold -24 dB, 4:1, 5 ms attack, 200 ms release.
    pub const ON: CompressorProfile = CompressorProfile {
        threshold_db: -24.0,
        ratio: 4.0,
        attack_secs: 0.005,
        release_secs: 0.2,
    };

    /// Unity: nothing ever crosses 0 dBFS at 1:1.
    pub const OFF: CompressorProfile = CompressorProfile {
        threshold_db: 0.0,
        ratio: 1.0,
        attack_secs: 0.005,
        release_secs: 0.2,
    };

    pub fn for_enabled(enabled: bool) -> Self {
        if enabled {
            Self::ON
        } else {
            Self::OFF
        }
    }
}

/// Feed-forward compressor with a stereo-linked peak envelope.
pub struct Compressor {
    threshold_db: SmoothedValue,
    ratio: SmoothedValue,
    attack_coeff: f32,
    release_coeff: f32,
    envelope: f32,
    gain_reduction_db: f32,
    sample_rate: u32,
}

impl Compressor {
    pub fn new(sample_rate: u32, profile: CompressorProfile) -> Self {
        let mut c = Self {
            threshold_db: SmoothedValue::new(profile.threshold_db, COMPRESSOR_RAMP_SECS, sample_rate),
            ratio: SmoothedValue::new(profile.ratio, COMPRESSOR_RAMP_SECS, sample_rate),
            attack_coeff: 0.0,
            release_coeff: 0.0,
            envelope: 0.0,
            gain_reduction_db: 0.0,
            sample_rate,
        };
        c.set_times(profile.attack_secs, profile.release_secs);
        c
    }

    fn set_times(&mut self, attack_secs: f32, release_secs: f32) {
        let sr = self.sample_rate as f32;
        self.attack_coeff = (-1.0 / (attack_secs.max(1e-4) * sr)).exp();
        self.release_coeff = (-1.0 / (release_secs.max(1e-3) * sr)).exp();
    }

    /// Ramp to a new profile.
    pub fn set_profile(&mut self, profile: CompressorProfile) {
        self.threshold_db.set_target(profile.threshold_db);
        self.ratio.set_target(profile.ratio.max(1.0));
        self.set_times(profile.attack_secs, profile.release_secs);
    }

    pub fn gain_reduction_db(&self) -> f32 {
        self.gain_reduction_db
    }

    fn is_bypassed(&self) -> bool {
        !self.ratio.is_ramping() && self.ratio.current() <= 1.0 && self.envelope < 1e-6
    }

    /// Process interleaved stereo samples in-place.
    pub fn process(&mut self, samples: &mut [f32]) {
        if self.is_bypassed() {
            self.gain_reduction_db = 0.0;
            return;
        }
        for frame in samples.chunks_exact_mut(2) {
            let threshold = self.threshold_db.next();
            let ratio = self.ratio.next();

            let peak = frame[0].abs().max(frame[1].abs());
            let coeff = if peak > self.envelope {
                self.attack_coeff
            } else {
                self.release_coeff
            };
            self.envelope = peak + coeff * (self.envelope - peak);

            let env_db = if self.envelope > 1e-9 {
                20.0 * self.envelope.log10()
            } else {
                -180.0
            };
            let over = env_db - threshold;
            let gr_db = if over > 0.0 {
                over * (1.0 - 1.0 / ratio)
            } else {
                0.0
            };
            self.gain_reduction_db = gr_db;

            let gain = 10.0_f32.powf(-gr_db / 20.0);
            frame[0] *= gain;
            frame[1] *= gain;
        }
    }
}

/// Brickwall peak limiter. Instant attack, exponential release.
pub struct Limiter {
    gain: f32,
    release_coeff: f32,
}

impl Limiter {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            gain: 1.0,
            release_coeff: (-1.0 / (LIMITER_RELEASE_SECS * sample_rate as f32)).exp(),
        }
    }

    pub fn process(&mut self, samples: &mut [f32]) {
        for frame in samples.chunks_exact_mut(2) {
            let peak = frame[0].abs().max(frame[1].abs());
            let wanted = if peak.is_finite() && peak > LIMIT_CEILING {
                LIMIT_CEILING / peak
            } else {
                1.0
            };
            self.gain = if wanted < self.gain {
                wanted
            } else {
                wanted + self.release_coeff * (self.gain - wanted)
            };
            frame[0] = hard_limit(frame[0] * self.gain);
            frame[1] = hard_limit(frame[1] * self.gain);
        }
    }
}

/// Catches NaN, Inf, and any samples exceeding the ceiling.
#[inline(always)]
pub fn hard_limit(s: f32) -> f32 {
    if s.is_finite() {
        s.clamp(-LIMIT_CEILING, LIMIT_CEILING)
    } else {
        0.0
    }
}

#[inline]
pub fn db_to_linear(db: f32) -> f32 {
    10.0_f32.powf(db / 20.0)
}
