/// Mid/side stereo widener (the "3D" switch).

use super::smoothing::SmoothedValue;

pub const WIDENER_RAMP_SECS: f32 = 0.2;

pub struct StereoWidener {
    width: SmoothedValue,
}

impl StereoWidener {
    pub fn new(sample_rate: u32, width: f32) -> Self {
        Self {
            width: SmoothedValue::new(width.clamp(0.0, 1.0), WIDENER_RAMP_SECS, sample_rate),
        }
    }

    pub fn set_width(&mut self, width: f32) {
        let w = if width.is_finite() { width.clamp(0.0, 1.0) } else { 0.0 };
        self.width.set_target(w);
    }

    pub fn width(&self) -> f32 {
        self.width.current()
    }

    /// Process interleaved stereo samples in-place.
    pub fn process(&mut self, samples: &mut [f32]) {
        if !self.width.is_ramping() && self.width.current() == 0.0 {
            return;
        }
        for frame in samples.chunks_exact_mut(2) {
            let side_gain = 1.0 + self.width.next();
            let mid = (frame[0] + frame[1]) * 0.5;
            let side = (frame[0] - frame[1]) * 0.5 * side_gain;
            frame[0] = mid + side;
            frame[1] = mid - side;
        }
    }
}
