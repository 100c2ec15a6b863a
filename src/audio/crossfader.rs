use serde::{Deserialize, Serialize};

use super::deck::DeckId;

pub const MIN_CROSSFADE_SECS: f64 = 1.0;
pub const MAX_CROSSFADE_SECS: f64 = 12.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum GainLaw {
    /// g(x) = x. Dips about 3 dB at the midpoint.
    Linear,
    /// g(x) = sin(x·π/2). Constant perceived loudness through the fade.
    #[default]
    EqualPower,
}

impl GainLaw {
    #[inline]
    pub fn gain(self, x: f32) -> f32 {
        let x = x.clamp(0.0, 1.0);
        match self {
            GainLaw::Linear => x,
            GainLaw::EqualPower => (x * std::f32::consts::FRAC_PI_2).sin(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CrossfadeConfig {
    pub enabled: bool,
    pub duration_secs: f64,
}

impl CrossfadeConfig {
    pub fn new(enabled: bool, duration_secs: f64) -> Self {
        Self {
            enabled,
            duration_secs: clamp_duration(duration_secs),
        }
    }
}

impl Default for CrossfadeConfig {
    fn default() -> Self {
        Self::new(true, 5.0)
    }
}

pub fn clamp_duration(secs: f64) -> f64 {
    if secs.is_nan() {
        return MIN_CROSSFADE_SECS;
    }
    secs.clamp(MIN_CROSSFADE_SECS, MAX_CROSSFADE_SECS)
}

/// One time-driven ramp of the crossfader value.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FadeOperation {
    pub from: f32,
    pub to: f32,
    /// Audio-clock seconds.
    pub started_at: f64,
    pub duration_secs: f64,
    pub generation: u64,
}

impl FadeOperation {
    pub fn progress(&self, now: f64) -> f32 {
        if self.duration_secs <= 0.0 {
            return 1.0;
        }
        ((now - self.started_at) / self.duration_secs).clamp(0.0, 1.0) as f32
    }

    pub fn value_at(&self, now: f64) -> f32 {
        let v = self.from + (self.to - self.from) * self.progress(now);
        v.clamp(0.0, 1.0)
    }

    pub fn ends_at(&self) -> f64 {
        self.started_at + self.duration_secs.max(0.0)
    }

    pub fn is_complete(&self, now: f64) -> bool {
        now >= self.ends_at()
    }
}

/// What the control side tells the mixer.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum FadeUpdate {
    Ramp(FadeOperation),
    Hold(f32),
}

#[derive(Clone, Debug)]
pub struct Crossfader {
    law: GainLaw,
    resting: f32,
    ramp: Option<FadeOperation>,
}

impl Crossfader {
    pub fn new(law: GainLaw) -> Self {
        Self {
            law,
            resting: 0.0,
            ramp: None,
        }
    }

    pub fn law(&self) -> GainLaw {
        self.law
    }

    pub fn set_law(&mut self, law: GainLaw) {
        self.law = law;
    }

    pub fn value_at(&self, now: f64) -> f32 {
        match &self.ramp {
            Some(op) => op.value_at(now),
            None => self.resting,
        }
    }

    pub fn active(&self) -> Option<&FadeOperation> {
        self.ramp.as_ref()
    }

    /// Start a ramp toward `to` from wherever the fader is right now.
    /// Any ramp already running is cancelled, not completed.
    pub fn begin(&mut self, to: f32, duration_secs: f64, now: f64, generation: u64) -> FadeOperation {
        let op = FadeOperation {
            from: self.value_at(now),
            to: to.clamp(0.0, 1.0),
            started_at: now,
            duration_secs: duration_secs.max(0.0),
            generation,
        };
        if let Some(prev) = self.ramp.replace(op) {
            log::debug!(
                "Crossfade gen {} cancelled at {:.3}",
                prev.generation,
                prev.value_at(now)
            );
        }
        op
    }

    /// Jump to `value` with no ramp.
    pub fn hold(&mut self, value: f32) {
        self.ramp = None;
        self.resting = value.clamp(0.0, 1.0);
    }

    /// Fold a finished ramp into the resting value. Returns the finished
    /// operation, if one just completed.
    pub fn settle(&mut self, now: f64) -> Option<FadeOperation> {
        match self.ramp {
            Some(op) if op.is_complete(now) => {
                self.resting = op.to;
                self.ramp = None;
                Some(op)
            }
            _ => None,
        }
    }

    pub fn apply(&mut self, update: FadeUpdate) {
        match update {
            FadeUpdate::Ramp(op) => self.ramp = Some(op),
            FadeUpdate::Hold(v) => self.hold(v),
        }
    }

    /// Mix weight of one deck before the gain law (A = 1 - fade, B = fade).
    pub fn weight(&self, deck: DeckId, now: f64) -> f32 {
        let fade = self.value_at(now);
        match deck {
            DeckId::A => 1.0 - fade,
            DeckId::B => fade,
        }
    }

    /// Output gains for (deck A, deck B).
    #[inline]
    pub fn gains(&self, now: f64) -> (f32, f32) {
        let fade = self.value_at(now);
        (self.law.gain(1.0 - fade), self.law.gain(fade))
    }
}

impl Default for Crossfader {
    fn default() -> Self {
        Self::new(GainLaw::default())
    }
}
