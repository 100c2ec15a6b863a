#![allow(dead_code)]

use crossbeam_channel::Sender;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use cyberplayer_lib::audio::backend::{AudioBackend, ClockMode, DeckEvent};
use cyberplayer_lib::audio::crossfader::{CrossfadeConfig, FadeUpdate, GainLaw};
use cyberplayer_lib::audio::deck::DeckId;
use cyberplayer_lib::audio::effects::{EffectParams, EffectSettings};
use cyberplayer_lib::audio::events::Message;
use cyberplayer_lib::audio::navigation::RepeatMode;
use cyberplayer_lib::audio::resources::{
    ActionHandler, MediaMetadata, MediaSession, PositionState, RemoteAction, ResourceGuard, WakeLock,
};
use cyberplayer_lib::audio::transport::{TransportController, TransportSettings};
use cyberplayer_lib::error::{EngineError, EngineResult};
use cyberplayer_lib::playlist::{SourceHandle, TrackDescriptor};

// ─── Backend ───

#[derive(Clone, Debug, PartialEq)]
pub enum Call {
    Load(DeckId, PathBuf),
    Start(DeckId, u64),
    Pause(DeckId),
    Seek(DeckId, f64),
}

/// In-memory backend with a manual clock. Playing decks advance with it.
#[derive(Default)]
pub struct FakeBackend {
    pub now: f64,
    pub calls: Vec<Call>,
    pub fades: Vec<FadeUpdate>,
    pub clock_modes: Vec<ClockMode>,
    pub law: Option<GainLaw>,
    pub deny_unlock: bool,
    /// start_deck fails as if no source were bound.
    pub refuse_start: bool,
    pub teardowns: usize,
    /// Sources whose load fails.
    pub broken: HashSet<PathBuf>,
    /// Durations reported by load; tracks not listed report None.
    pub durations: HashMap<PathBuf, f64>,
    positions: [f64; 2],
    playing: [bool; 2],
    pending: VecDeque<DeckEvent>,
    events: Option<Sender<Message>>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Post deck events straight to an engine channel instead of queueing.
    pub fn with_events(events: Sender<Message>) -> Self {
        Self {
            events: Some(events),
            ..Self::default()
        }
    }

    pub fn take_events(&mut self) -> Vec<DeckEvent> {
        self.pending.drain(..).collect()
    }

    pub fn is_playing(&self, deck: DeckId) -> bool {
        self.playing[deck.index()]
    }

    pub fn advance(&mut self, secs: f64) {
        self.now += secs;
        for i in 0..2 {
            if self.playing[i] {
                self.positions[i] += secs;
            }
        }
    }

    pub fn last_fade(&self) -> Option<FadeUpdate> {
        self.fades.last().copied()
    }

    pub fn calls_since(&self, mark: usize) -> &[Call] {
        &self.calls[mark..]
    }

    fn post(&mut self, event: DeckEvent) {
        match &self.events {
            Some(tx) => {
                let _ = tx.try_send(Message::Deck(event));
            }
            None => self.pending.push_back(event),
        }
    }
}

impl AudioBackend for FakeBackend {
    fn resume(&mut self) -> EngineResult<()> {
        if self.deny_unlock {
            return Err(EngineError::HardwareUnlockDenied("denied by test".into()));
        }
        Ok(())
    }

    fn set_clock_mode(&mut self, mode: ClockMode) {
        self.clock_modes.push(mode);
    }

    fn now(&self) -> f64 {
        self.now
    }

    fn load(&mut self, deck: DeckId, source: &SourceHandle) -> EngineResult<Option<f64>> {
        let path = source.path().to_path_buf();
        if self.broken.contains(&path) {
            return Err(EngineError::source_load(source.display(), "broken by test"));
        }
        self.calls.push(Call::Load(deck, path.clone()));
        self.playing[deck.index()] = false;
        self.positions[deck.index()] = 0.0;
        Ok(self.durations.get(&path).copied())
    }

    fn start_deck(&mut self, deck: DeckId, generation: u64) -> EngineResult<()> {
        if self.refuse_start {
            return Err(EngineError::Stream(format!("Deck {:?} has no source bound", deck)));
        }
        self.calls.push(Call::Start(deck, generation));
        self.playing[deck.index()] = true;
        self.post(DeckEvent::Started { deck, generation });
        Ok(())
    }

    fn pause_deck(&mut self, deck: DeckId) {
        self.calls.push(Call::Pause(deck));
        self.playing[deck.index()] = false;
    }

    fn seek_deck(&mut self, deck: DeckId, seconds: f64) {
        self.calls.push(Call::Seek(deck, seconds));
        self.positions[deck.index()] = seconds;
    }

    fn deck_position(&self, deck: DeckId) -> f64 {
        self.positions[deck.index()]
    }

    fn set_fade(&mut self, update: FadeUpdate) {
        self.fades.push(update);
    }

    fn set_gain_law(&mut self, law: GainLaw) {
        self.law = Some(law);
    }

    fn teardown(&mut self) {
        self.teardowns += 1;
    }
}

// ─── Host services ───

#[derive(Clone, Default)]
pub struct LockCounter {
    pub acquired: Arc<AtomicUsize>,
    pub released: Arc<AtomicUsize>,
}

impl LockCounter {
    pub fn acquired(&self) -> usize {
        self.acquired.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }
}

impl WakeLock for LockCounter {
    fn acquire(&mut self) -> EngineResult<()> {
        self.acquired.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn release(&mut self) {
        self.released.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Default)]
pub struct SessionLog {
    pub metadata: Vec<MediaMetadata>,
    pub positions: Vec<PositionState>,
    pub actions: Vec<RemoteAction>,
}

/// Media session that records what it is told. Position publication can be
/// made to fail.
#[derive(Clone, Default)]
pub struct RecordingSession {
    pub log: Arc<Mutex<SessionLog>>,
    pub fail_positions: bool,
}

impl MediaSession for RecordingSession {
    fn set_action_handler(&mut self, action: RemoteAction, _handler: ActionHandler) -> EngineResult<()> {
        self.log.lock().actions.push(action);
        Ok(())
    }

    fn set_metadata(&mut self, metadata: &MediaMetadata) -> EngineResult<()> {
        self.log.lock().metadata.push(metadata.clone());
        Ok(())
    }

    fn set_position_state(&mut self, state: &PositionState) -> EngineResult<()> {
        if self.fail_positions {
            return Err(EngineError::MediaSession("position rejected".into()));
        }
        self.log.lock().positions.push(*state);
        Ok(())
    }
}

// ─── Harness ───

pub struct Harness {
    pub ctl: TransportController<FakeBackend>,
    pub lock: LockCounter,
    pub session: RecordingSession,
}

pub fn track_path(i: usize) -> PathBuf {
    PathBuf::from(format!("/music/track{i}.flac"))
}

pub fn tracks(durations: &[f64]) -> Vec<TrackDescriptor> {
    durations
        .iter()
        .enumerate()
        .map(|(i, d)| TrackDescriptor::from_path(i as u64, track_path(i)).with_duration(*d))
        .collect()
}

pub fn settings(crossfade: bool, repeat: RepeatMode) -> TransportSettings {
    TransportSettings {
        crossfade: CrossfadeConfig::new(crossfade, 5.0),
        gain_law: GainLaw::Linear,
        shuffle: false,
        repeat,
        ..TransportSettings::default()
    }
}

pub fn harness_with(backend: FakeBackend, session: RecordingSession, settings: TransportSettings) -> Harness {
    let lock = LockCounter::default();
    let resources = ResourceGuard::new(Box::new(lock.clone()), Box::new(session.clone()));
    let effects = EffectSettings::new(Arc::new(EffectParams::new()));
    let mut ctl = TransportController::new(backend, resources, effects, settings).with_seed(42);
    ctl.init().unwrap();
    Harness { ctl, lock, session }
}

pub fn harness(settings: TransportSettings) -> Harness {
    harness_with(FakeBackend::new(), RecordingSession::default(), settings)
}

impl Harness {
    /// Queue `durations.len()` tracks with index 0 loaded.
    pub fn with_queue(mut self, durations: &[f64]) -> Self {
        self.ctl.set_queue(tracks(durations), Some(0)).unwrap();
        self.ctl.load_track(0).unwrap();
        self
    }

    /// Deliver queued deck events to the controller.
    pub fn pump(&mut self) {
        for event in self.ctl.backend_mut().take_events() {
            self.ctl.handle_deck_event(event).unwrap();
        }
    }

    pub fn play(&mut self) {
        self.ctl.play().unwrap();
        self.pump();
    }

    /// Move the clock forward and let the controller poll its timers.
    pub fn advance(&mut self, secs: f64) {
        self.ctl.backend_mut().advance(secs);
        self.ctl.tick();
    }

    /// The active deck reaches the end of its source.
    pub fn finish_active(&mut self) {
        let deck = self.ctl.active_deck();
        let generation = self.ctl.generation();
        self.ctl
            .handle_deck_event(DeckEvent::Ended { deck, generation })
            .unwrap();
        self.pump();
    }

    pub fn index(&self) -> Option<usize> {
        self.ctl.queue().current_index()
    }
}
