/// Player preferences, stored as `player.json` in the user config directory.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::audio::analyser::DEFAULT_WAVEFORM_SIZE;
use crate::audio::crossfader::{CrossfadeConfig, GainLaw};
use crate::audio::engine::{EngineOptions, DEFAULT_TICK_MS};
use crate::audio::equalizer::EqPreset;
use crate::audio::navigation::{NavigationPolicy, RepeatMode};
use crate::audio::transport::TransportSettings;
use crate::error::{EngineError, EngineResult};

pub const CONFIG_FILE: &str = "player.json";

const MIN_TICK_MS: u64 = 5;
const MAX_TICK_MS: u64 = 250;
const MIN_WAVEFORM_SIZE: usize = 64;
const MAX_WAVEFORM_SIZE: usize = 16384;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    pub crossfade: CrossfadeConfig,
    pub gain_law: GainLaw,
    pub shuffle: bool,
    pub repeat: RepeatMode,
    /// Shuffle never picks the track that is already playing.
    pub shuffle_avoids_repeat: bool,
    pub eq_preset: EqPreset,
    pub compressor: bool,
    /// Stereo widener ("3D") on at start.
    pub wide: bool,
    pub waveform_size: usize,
    pub tick_ms: u64,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            crossfade: CrossfadeConfig::default(),
            gain_law: GainLaw::default(),
            shuffle: false,
            repeat: RepeatMode::default(),
            shuffle_avoids_repeat: true,
            eq_preset: EqPreset::Flat,
            compressor: false,
            wide: false,
            waveform_size: DEFAULT_WAVEFORM_SIZE,
            tick_ms: DEFAULT_TICK_MS,
        }
    }
}

impl PlayerConfig {
    /// `<config dir>/cyberplayer`, when the platform has one.
    pub fn default_dir() -> Option<PathBuf> {
        dirs_next::config_dir().map(|d| d.join("cyberplayer"))
    }

    /// Load from `dir`. Returns defaults if the file doesn't exist or
    /// doesn't parse.
    pub fn load(dir: &Path) -> Self {
        let path = dir.join(CONFIG_FILE);
        match std::fs::read_to_string(&path) {
            Ok(data) => match serde_json::from_str::<PlayerConfig>(&data) {
                Ok(cfg) => cfg.clamped(),
                Err(e) => {
                    log::warn!("Ignoring malformed {}: {}", path.display(), e);
                    Self::default()
                }
            },
            Err(_) => Self::default(),
        }
    }

    pub fn save(&self, dir: &Path) -> EngineResult<()> {
        std::fs::create_dir_all(dir)
            .map_err(|e| EngineError::Config(format!("Failed to create dir: {}", e)))?;
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(dir.join(CONFIG_FILE), json)?;
        Ok(())
    }

    pub fn clamped(mut self) -> Self {
        self.crossfade = CrossfadeConfig::new(self.crossfade.enabled, self.crossfade.duration_secs);
        self.tick_ms = self.tick_ms.clamp(MIN_TICK_MS, MAX_TICK_MS);
        self.waveform_size = self.waveform_size.clamp(MIN_WAVEFORM_SIZE, MAX_WAVEFORM_SIZE);
        self
    }

    pub fn engine_options(&self) -> EngineOptions {
        EngineOptions {
            transport: TransportSettings {
                crossfade: self.crossfade,
                gain_law: self.gain_law,
                shuffle: self.shuffle,
                repeat: self.repeat,
                navigation: NavigationPolicy {
                    shuffle_avoids_repeat: self.shuffle_avoids_repeat,
                },
            },
            preset: self.eq_preset,
            compressor: self.compressor,
            wide: self.wide,
            waveform_size: self.waveform_size,
            tick: Duration::from_millis(self.tick_ms),
            seed: None,
        }
    }
}
