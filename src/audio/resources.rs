use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

use super::backend::ClockMode;
use super::transport::TransportPhase;
use crate::error::{EngineError, EngineResult};
use crate::playlist::TrackDescriptor;

// ─── OS contracts ───

pub trait WakeLock: Send {
    fn acquire(&mut self) -> EngineResult<()>;
    fn release(&mut self);
}

/// Remote-control actions a media session can deliver.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum RemoteAction {
    Play,
    Pause,
    PreviousTrack,
    NextTrack,
    SeekBackward,
    SeekForward,
}

impl RemoteAction {
    pub const ALL: [RemoteAction; 6] = [
        RemoteAction::Play,
        RemoteAction::Pause,
        RemoteAction::PreviousTrack,
        RemoteAction::NextTrack,
        RemoteAction::SeekBackward,
        RemoteAction::SeekForward,
    ];

    /// Names used by the OS media-session contract.
    pub fn name(self) -> &'static str {
        match self {
            RemoteAction::Play => "play",
            RemoteAction::Pause => "pause",
            RemoteAction::PreviousTrack => "previoustrack",
            RemoteAction::NextTrack => "nexttrack",
            RemoteAction::SeekBackward => "seekbackward",
            RemoteAction::SeekForward => "seekforward",
        }
    }
}

pub type ActionHandler = Box<dyn Fn() + Send + Sync>;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MediaMetadata {
    pub title: String,
    pub artist: String,
    pub album: String,
    pub artwork: Option<String>,
}

impl From<&TrackDescriptor> for MediaMetadata {
    fn from(t: &TrackDescriptor) -> Self {
        Self {
            title: t.title.clone(),
            artist: t.artist.clone(),
            album: t.album.clone(),
            artwork: t.artwork.clone(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct PositionState {
    pub duration: f64,
    pub playback_rate: f64,
    pub position: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum PlaybackStatus {
    None,
    Paused,
    Playing,
}

pub trait MediaSession: Send {
    fn set_action_handler(&mut self, action: RemoteAction, handler: ActionHandler) -> EngineResult<()>;
    fn set_metadata(&mut self, metadata: &MediaMetadata) -> EngineResult<()>;
    fn set_position_state(&mut self, state: &PositionState) -> EngineResult<()>;
    fn set_playback_status(&mut self, _status: PlaybackStatus) -> EngineResult<()> {
        Ok(())
    }
}

// ─── Default implementations ───

/// For platforms without a wake-lock facility.
pub struct NoWakeLock;

impl WakeLock for NoWakeLock {
    fn acquire(&mut self) -> EngineResult<()> {
        Err(EngineError::WakeLockUnavailable(
            "no wake-lock facility on this platform".into(),
        ))
    }

    fn release(&mut self) {}
}

type HandlerMap = Arc<Mutex<HashMap<RemoteAction, ActionHandler>>>;

/// In-process media session. Metadata is logged; remote actions are fired
/// through a [`RemoteControl`] (keyboard shortcuts, the CLI, tests).
#[derive(Default)]
pub struct LocalMediaSession {
    handlers: HandlerMap,
}

impl LocalMediaSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn remote(&self) -> RemoteControl {
        RemoteControl {
            handlers: self.handlers.clone(),
        }
    }
}

impl MediaSession for LocalMediaSession {
    fn set_action_handler(&mut self, action: RemoteAction, handler: ActionHandler) -> EngineResult<()> {
        self.handlers.lock().insert(action, handler);
        Ok(())
    }

    fn set_metadata(&mut self, metadata: &MediaMetadata) -> EngineResult<()> {
        log::info!("Now playing: {} - {} ({})", metadata.artist, metadata.title, metadata.album);
        Ok(())
    }

    fn set_position_state(&mut self, state: &PositionState) -> EngineResult<()> {
        log::trace!("Position {:.1}/{:.1}s", state.position, state.duration);
        Ok(())
    }
}

#[derive(Clone)]
pub struct RemoteControl {
    handlers: HandlerMap,
}

impl RemoteControl {
    /// Fire a remote action. Returns false when nothing is registered for it.
    pub fn press(&self, action: RemoteAction) -> bool {
        match self.handlers.lock().get(&action) {
            Some(handler) => {
                handler();
                true
            }
            None => false,
        }
    }
}

// ─── Guard ───

pub struct ResourceGuard {
    wake_lock: Box<dyn WakeLock>,
    session: Box<dyn MediaSession>,
    /// An acquire was attempted for the current active stretch.
    lock_requested: bool,
    lock_held: bool,
    clock: Option<ClockMode>,
    position_failures: u64,
}

impl ResourceGuard {
    pub fn new(wake_lock: Box<dyn WakeLock>, session: Box<dyn MediaSession>) -> Self {
        Self {
            wake_lock,
            session,
            lock_requested: false,
            lock_held: false,
            clock: None,
            position_failures: 0,
        }
    }

    pub fn wake_lock_held(&self) -> bool {
        self.lock_held
    }

    pub fn session_mut(&mut self) -> &mut dyn MediaSession {
        self.session.as_mut()
    }

    /// Bring wake lock and playback status in line with `phase`. Returns the
    /// clock mode to apply when it changed.
    pub fn sync(&mut self, phase: TransportPhase) -> Option<ClockMode> {
        let active = phase.is_active();

        if active && !self.lock_requested {
            self.lock_requested = true;
            match self.wake_lock.acquire() {
                Ok(()) => {
                    self.lock_held = true;
                    log::debug!("Wake lock acquired");
                }
                Err(e) => log::warn!("{}", e),
            }
        } else if !active && self.lock_requested {
            self.lock_requested = false;
            if self.lock_held {
                self.wake_lock.release();
                self.lock_held = false;
                log::debug!("Wake lock released");
            }
        }

        let mode = match phase {
            TransportPhase::Playing | TransportPhase::Loading => ClockMode::Running,
            TransportPhase::Paused => ClockMode::KeepAlive,
            TransportPhase::Idle => ClockMode::Suspended,
        };
        if self.clock == Some(mode) {
            return None;
        }
        self.clock = Some(mode);

        let status = match mode {
            ClockMode::Running => PlaybackStatus::Playing,
            ClockMode::KeepAlive => PlaybackStatus::Paused,
            ClockMode::Suspended => PlaybackStatus::None,
        };
        if let Err(e) = self.session.set_playback_status(status) {
            log::warn!("{}", e);
        }
        Some(mode)
    }

    pub fn publish_metadata(&mut self, track: &TrackDescriptor) {
        if let Err(e) = self.session.set_metadata(&MediaMetadata::from(track)) {
            log::warn!("Failed to publish metadata: {}", e);
        }
    }

    pub fn publish_position(&mut self, state: PositionState) {
        if let Err(e) = self.session.set_position_state(&state) {
            self.position_failures += 1;
            if self.position_failures == 1 {
                log::warn!("Failed to publish position: {}", e);
            } else {
                log::debug!("Failed to publish position: {}", e);
            }
        }
    }

    /// Drop the wake lock regardless of phase (engine teardown).
    pub fn release_all(&mut self) {
        if self.lock_held {
            self.wake_lock.release();
        }
        self.lock_held = false;
        self.lock_requested = false;
        self.clock = None;
    }
}
