use clap::{Parser, ValueEnum};
use std::io::BufRead;
use std::path::PathBuf;
use std::process::ExitCode;

use cyberplayer_lib::audio::crossfader::CrossfadeConfig;
use cyberplayer_lib::audio::equalizer::EqPreset;
use cyberplayer_lib::audio::navigation::RepeatMode;
use cyberplayer_lib::audio::resources::{LocalMediaSession, RemoteAction, RemoteControl};
use cyberplayer_lib::library::scanner;
use cyberplayer_lib::{AudioEngine, EngineResult, HostServices, PlayerCommand, PlayerConfig};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum RepeatArg {
    Off,
    All,
    One,
}

impl From<RepeatArg> for RepeatMode {
    fn from(r: RepeatArg) -> Self {
        match r {
            RepeatArg::Off => RepeatMode::Off,
            RepeatArg::All => RepeatMode::All,
            RepeatArg::One => RepeatMode::One,
        }
    }
}

/// Crossfading music player for local folders.
#[derive(Parser, Debug)]
#[command(name = "cyberplayer", version)]
struct Cli {
    /// Folder to scan for audio files
    folder: PathBuf,

    /// Crossfade length in seconds (1-12); 0 disables crossfading
    #[arg(long)]
    crossfade: Option<f64>,

    #[arg(long)]
    shuffle: bool,

    #[arg(long, value_enum)]
    repeat: Option<RepeatArg>,

    /// Directory holding player.json (defaults to the user config dir)
    #[arg(long)]
    config_dir: Option<PathBuf>,

    /// Write the effective settings back to player.json
    #[arg(long)]
    save_config: bool,
}

const HELP: &str = "\
p play/pause   s stop   n next   b previous
f +10s   r -10s   R repeat mode   h shuffle
e next EQ preset   x EQ on/off   c compressor   w 3D
i status   q quit";

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> EngineResult<()> {
    let config_dir = cli.config_dir.clone().or_else(PlayerConfig::default_dir);
    let mut config = config_dir
        .as_deref()
        .map(PlayerConfig::load)
        .unwrap_or_default();

    if let Some(secs) = cli.crossfade {
        config.crossfade = if secs <= 0.0 {
            CrossfadeConfig::new(false, config.crossfade.duration_secs)
        } else {
            CrossfadeConfig::new(true, secs)
        };
    }
    if cli.shuffle {
        config.shuffle = true;
    }
    if let Some(r) = cli.repeat {
        config.repeat = r.into();
    }
    if cli.save_config {
        match &config_dir {
            Some(dir) => config.save(dir)?,
            None => log::warn!("No config directory on this platform, not saving"),
        }
    }

    let tracks = scanner::scan_tracks(&cli.folder);
    if tracks.is_empty() {
        println!("No audio files under {}", cli.folder.display());
        return Ok(());
    }

    let session = LocalMediaSession::new();
    let remote = session.remote();
    let mut engine = AudioEngine::start(
        config.engine_options(),
        HostServices::without_wake_lock(Box::new(session)),
    )?;

    engine.send_command(PlayerCommand::SetQueue {
        tracks,
        start: Some(0),
    })?;
    engine.send_command(PlayerCommand::Play)?;

    println!("{}", HELP);
    let mut preset = config.eq_preset;
    let mut eq_on = true;

    for line in std::io::stdin().lock().lines() {
        let line = line?;
        let Some(key) = line.trim().chars().next() else {
            continue;
        };
        match key {
            'q' => break,
            'i' => print_status(&engine),
            _ => {
                if let Some(cmd) = key_command(key, &remote, &mut preset, &mut eq_on) {
                    engine.send_command(cmd)?;
                }
            }
        }
    }

    engine.shutdown();
    Ok(())
}

/// Transport keys go through the media-session remote, like hardware media keys.
fn key_command(
    key: char,
    remote: &RemoteControl,
    preset: &mut EqPreset,
    eq_on: &mut bool,
) -> Option<PlayerCommand> {
    let press = |action: RemoteAction| -> Option<PlayerCommand> {
        if !remote.press(action) {
            log::warn!("Remote action {} not bound", action.name());
        }
        None
    };
    match key {
        'p' => Some(PlayerCommand::TogglePlay),
        's' => Some(PlayerCommand::Stop),
        'n' => press(RemoteAction::NextTrack),
        'b' => press(RemoteAction::PreviousTrack),
        'f' => press(RemoteAction::SeekForward),
        'r' => press(RemoteAction::SeekBackward),
        'R' => Some(PlayerCommand::CycleRepeat),
        'h' => Some(PlayerCommand::ToggleShuffle),
        'e' => {
            let pos = EqPreset::ALL.iter().position(|p| p == preset).unwrap_or(0);
            *preset = EqPreset::ALL[(pos + 1) % EqPreset::ALL.len()];
            Some(PlayerCommand::ApplyPreset(*preset))
        }
        'x' => {
            *eq_on = !*eq_on;
            Some(PlayerCommand::SetEqEnabled(*eq_on))
        }
        'c' => Some(PlayerCommand::ToggleCompressor),
        'w' => Some(PlayerCommand::ToggleWide),
        _ => {
            println!("{}", HELP);
            None
        }
    }
}

fn print_status(engine: &AudioEngine) {
    let Some(s) = engine.state() else {
        println!("(engine starting)");
        return;
    };
    let title = s
        .current_track
        .as_ref()
        .map(|t| format!("{} - {}", t.artist, t.title))
        .unwrap_or_else(|| "-".into());
    let duration = s
        .duration_secs
        .map(|d| format!("{:.0}s", d))
        .unwrap_or_else(|| "?".into());
    println!(
        "{:?} | {} | {:.0}s / {} | shuffle {} | repeat {:?} | deck {:?} fade {:.2}",
        s.phase, title, s.position_secs, duration, s.shuffle, s.repeat, s.active_deck, s.fade
    );
    println!(
        "EQ {:?} {:?} on={} | 3D {} | comp {}",
        s.effects.preset,
        s.effects.bands,
        s.effects.eq_enabled,
        s.effects.wide_enabled,
        s.effects.compressor_enabled
    );
}
