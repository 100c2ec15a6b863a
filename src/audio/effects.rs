/// Effect chain: EQ -> widener -> compressor -> limiter -> analyser.

use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::analyser::Waveform;
use super::dynamics::{Compressor, CompressorProfile, Limiter};
use super::equalizer::{EqBand, EqBands, EqPreset, Equalizer};
use super::smoothing::AtomicF32;
use super::stereo::StereoWidener;

/// Widener width used when the 3D switch is on.
pub const WIDE_WIDTH: f32 = 1.0;

#[derive(Debug)]
pub struct EffectParams {
    low: AtomicF32,
    mid: AtomicF32,
    high: AtomicF32,
    width: AtomicF32,
    compressor: AtomicBool,
}

impl EffectParams {
    pub fn new() -> Self {
        Self {
            low: AtomicF32::new(0.0),
            mid: AtomicF32::new(0.0),
            high: AtomicF32::new(0.0),
            width: AtomicF32::new(0.0),
            compressor: AtomicBool::new(false),
        }
    }

    pub fn bands(&self) -> EqBands {
        EqBands {
            low: self.low.load(),
            mid: self.mid.load(),
            high: self.high.load(),
        }
    }

    pub fn width(&self) -> f32 {
        self.width.load()
    }

    pub fn compressor_enabled(&self) -> bool {
        self.compressor.load(Ordering::Relaxed)
    }

    fn store_bands(&self, bands: EqBands) {
        self.low.store(bands.low);
        self.mid.store(bands.mid);
        self.high.store(bands.high);
    }
}

impl Default for EffectParams {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum PresetLabel {
    Named(EqPreset),
    /// Bands were moved by hand since the last preset.
    Custom,
}

/// Serializable view for the UI.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct EffectState {
    pub bands: EqBands,
    pub preset: PresetLabel,
    pub eq_enabled: bool,
    pub wide_enabled: bool,
    pub compressor_enabled: bool,
}

pub struct EffectSettings {
    params: Arc<EffectParams>,
    bands: EqBands,
    preset: PresetLabel,
    eq_enabled: bool,
    wide_enabled: bool,
    compressor_enabled: bool,
}

impl EffectSettings {
    pub fn new(params: Arc<EffectParams>) -> Self {
        let s = Self {
            params,
            bands: EqPreset::Flat.bands(),
            preset: PresetLabel::Named(EqPreset::Flat),
            eq_enabled: true,
            wide_enabled: false,
            compressor_enabled: false,
        };
        s.publish();
        s
    }

    pub fn params(&self) -> &Arc<EffectParams> {
        &self.params
    }

    /// Set one band by hand. The preset label becomes Custom.
    pub fn set_band(&mut self, band: EqBand, db: f32) {
        self.bands.set(band, db);
        self.preset = PresetLabel::Custom;
        self.publish();
    }

    /// All three bands at once, under the preset's name.
    pub fn apply_preset(&mut self, preset: EqPreset) {
        self.bands = preset.bands();
        self.preset = PresetLabel::Named(preset);
        self.publish();
    }

    /// Disabled EQ ramps to flat but keeps the user's bands for later.
    pub fn set_eq_enabled(&mut self, enabled: bool) {
        self.eq_enabled = enabled;
        self.publish();
    }

    pub fn set_wide(&mut self, enabled: bool) {
        self.wide_enabled = enabled;
        self.publish();
    }

    pub fn toggle_wide(&mut self) -> bool {
        self.set_wide(!self.wide_enabled);
        self.wide_enabled
    }

    pub fn set_compressor(&mut self, enabled: bool) {
        self.compressor_enabled = enabled;
        self.publish();
    }

    pub fn toggle_compressor(&mut self) -> bool {
        self.set_compressor(!self.compressor_enabled);
        self.compressor_enabled
    }

    pub fn bands(&self) -> EqBands {
        self.bands
    }

    pub fn preset(&self) -> PresetLabel {
        self.preset
    }

    pub fn state(&self) -> EffectState {
        EffectState {
            bands: self.bands,
            preset: self.preset,
            eq_enabled: self.eq_enabled,
            wide_enabled: self.wide_enabled,
            compressor_enabled: self.compressor_enabled,
        }
    }

    fn publish(&self) {
        let effective = if self.eq_enabled {
            self.bands
        } else {
            EqBands::default()
        };
        self.params.store_bands(effective);
        self.params
            .width
            .store(if self.wide_enabled { WIDE_WIDTH } else { 0.0 });
        self.params
            .compressor
            .store(self.compressor_enabled, Ordering::Relaxed);
    }
}

/// DSP half. Owned by the audio callback.
pub struct EffectChain {
    params: Arc<EffectParams>,
    waveform: Arc<Waveform>,
    eq: Equalizer,
    widener: StereoWidener,
    compressor: Compressor,
    compressor_on: bool,
    limiter: Limiter,
}

impl EffectChain {
    pub fn new(sample_rate: u32, params: Arc<EffectParams>, waveform: Arc<Waveform>) -> Self {
        let compressor_on = params.compressor_enabled();
        let mut chain = Self {
            eq: Equalizer::new(sample_rate),
            widener: StereoWidener::new(sample_rate, params.width()),
            compressor: Compressor::new(sample_rate, CompressorProfile::for_enabled(compressor_on)),
            compressor_on,
            limiter: Limiter::new(sample_rate),
            params,
            waveform,
        };
        chain.eq.set_bands(chain.params.bands());
        chain
    }

    fn sync_targets(&mut self) {
        self.eq.set_bands(self.params.bands());
        self.widener.set_width(self.params.width());
        let on = self.params.compressor_enabled();
        if on != self.compressor_on {
            self.compressor_on = on;
            self.compressor.set_profile(CompressorProfile::for_enabled(on));
        }
    }

    /// Process interleaved stereo samples in-place.
    pub fn process(&mut self, samples: &mut [f32]) {
        self.sync_targets();
        self.eq.process(samples);
        self.widener.process(samples);
        self.compressor.process(samples);
        self.limiter.process(samples);
        self.waveform.record(samples);
    }
}
