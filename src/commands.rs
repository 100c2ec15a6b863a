use crate::audio::backend::AudioBackend;
use crate::audio::crossfader::{CrossfadeConfig, GainLaw};
use crate::audio::equalizer::{EqBand, EqPreset};
use crate::audio::navigation::RepeatMode;
use crate::audio::transport::TransportController;
use crate::error::EngineResult;
use crate::playlist::TrackDescriptor;

/// Operations the UI can ask of the engine.
#[derive(Clone, Debug, PartialEq)]
pub enum PlayerCommand {
    // Playback
    SetQueue {
        tracks: Vec<TrackDescriptor>,
        start: Option<usize>,
    },
    Play,
    Pause,
    TogglePlay,
    Stop,
    Seek(f64),
    SeekRelative(f64),
    Load(usize),
    Next,
    Previous,

    // Modes
    SetShuffle(bool),
    ToggleShuffle,
    SetRepeat(RepeatMode),
    CycleRepeat,

    // Effects
    SetEqBand(EqBand, f32),
    ApplyPreset(EqPreset),
    SetEqEnabled(bool),
    SetWide(bool),
    ToggleWide,
    SetCompressor(bool),
    ToggleCompressor,

    // Crossfade
    SetCrossfade(CrossfadeConfig),
    SetGainLaw(GainLaw),

    Shutdown,
}

/// Run one command against the controller.
pub fn apply<B: AudioBackend>(ctl: &mut TransportController<B>, cmd: PlayerCommand) -> EngineResult<()> {
    match cmd {
        // ─── Playback Commands ───
        PlayerCommand::SetQueue { tracks, start } => {
            ctl.set_queue(tracks, start)?;
            match start {
                Some(index) => ctl.load_track(index),
                None => Ok(()),
            }
        }
        PlayerCommand::Play => ctl.play(),
        PlayerCommand::Pause => ctl.pause(),
        PlayerCommand::TogglePlay => ctl.toggle_play(),
        PlayerCommand::Stop => ctl.stop(),
        PlayerCommand::Seek(secs) => ctl.seek_to(secs),
        PlayerCommand::SeekRelative(delta) => ctl.seek_relative(delta),
        PlayerCommand::Load(index) => ctl.load_track(index),
        PlayerCommand::Next => ctl.next(false),
        PlayerCommand::Previous => ctl.prev(),

        // ─── Mode Commands ───
        PlayerCommand::SetShuffle(on) => {
            ctl.set_shuffle(on);
            Ok(())
        }
        PlayerCommand::ToggleShuffle => {
            let on = ctl.toggle_shuffle();
            log::info!("Shuffle {}", if on { "on" } else { "off" });
            Ok(())
        }
        PlayerCommand::SetRepeat(mode) => {
            ctl.set_repeat(mode);
            Ok(())
        }
        PlayerCommand::CycleRepeat => {
            let mode = ctl.cycle_repeat();
            log::info!("Repeat {:?}", mode);
            Ok(())
        }

        // ─── Effect Commands ───
        PlayerCommand::SetEqBand(band, db) => {
            ctl.effects_mut().set_band(band, db);
            Ok(())
        }
        PlayerCommand::ApplyPreset(preset) => {
            ctl.effects_mut().apply_preset(preset);
            log::info!("EQ preset {}", preset.name());
            Ok(())
        }
        PlayerCommand::SetEqEnabled(on) => {
            ctl.effects_mut().set_eq_enabled(on);
            Ok(())
        }
        PlayerCommand::SetWide(on) => {
            ctl.effects_mut().set_wide(on);
            Ok(())
        }
        PlayerCommand::ToggleWide => {
            let on = ctl.effects_mut().toggle_wide();
            log::info!("3D {}", if on { "on" } else { "off" });
            Ok(())
        }
        PlayerCommand::SetCompressor(on) => {
            ctl.effects_mut().set_compressor(on);
            Ok(())
        }
        PlayerCommand::ToggleCompressor => {
            let on = ctl.effects_mut().toggle_compressor();
            log::info!("Compressor {}", if on { "on" } else { "off" });
            Ok(())
        }

        // ─── Crossfade Commands ───
        PlayerCommand::SetCrossfade(config) => {
            ctl.set_crossfade(config);
            Ok(())
        }
        PlayerCommand::SetGainLaw(law) => {
            ctl.set_gain_law(law);
            Ok(())
        }

        // Handled by the engine loop.
        PlayerCommand::Shutdown => Ok(()),
    }
}
