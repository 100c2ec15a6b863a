use std::sync::atomic::{AtomicU32, Ordering};

#[derive(Debug, Clone)]
pub struct SmoothedValue {
    current: f32,
    target: f32,
    step: f32,
    remaining: u32,
    ramp_samples: u32,
}

impl SmoothedValue {
    pub fn new(initial: f32, ramp_secs: f32, sample_rate: u32) -> Self {
        Self {
            current: initial,
            target: initial,
            step: 0.0,
            remaining: 0,
            ramp_samples: ramp_len(ramp_secs, sample_rate),
        }
    }

    /// Retarget. A no-op when the target is unchanged so an in-flight ramp
    /// is not restarted by repeated writes of the same value.
    pub fn set_target(&mut self, target: f32) {
        if target == self.target {
            return;
        }
        self.target = target;
        self.remaining = self.ramp_samples;
        self.step = (self.target - self.current) / self.ramp_samples as f32;
    }

    #[inline]
    pub fn next(&mut self) -> f32 {
        if self.remaining > 0 {
            self.remaining -= 1;
            self.current = if self.remaining == 0 {
                self.target
            } else {
                self.current + self.step
            };
        }
        self.current
    }

    /// Advance by `n` samples at once (per-block coefficient updates).
    pub fn advance(&mut self, n: u32) -> f32 {
        if n >= self.remaining {
            self.remaining = 0;
            self.current = self.target;
        } else {
            self.remaining -= n;
            self.current += self.step * n as f32;
        }
        self.current
    }

    pub fn current(&self) -> f32 {
        self.current
    }

    pub fn target(&self) -> f32 {
        self.target
    }

    pub fn is_ramping(&self) -> bool {
        self.remaining > 0
    }
}

fn ramp_len(secs: f32, sample_rate: u32) -> u32 {
    ((secs.max(0.0) * sample_rate as f32) as u32).max(1)
}

// ─── Lock-free f32 (bit cast) ───

/// f32 stored as its bit pattern. Written by the control thread, read by the
/// audio callback; no locks on either side.
#[derive(Debug)]
pub struct AtomicF32(AtomicU32);

impl AtomicF32 {
    pub fn new(v: f32) -> Self {
        Self(AtomicU32::new(v.to_bits()))
    }

    #[inline]
    pub fn load(&self) -> f32 {
        f32::from_bits(self.0.load(Ordering::Relaxed))
    }

    #[inline]
    pub fn store(&self, v: f32) {
        self.0.store(v.to_bits(), Ordering::Relaxed);
    }
}
