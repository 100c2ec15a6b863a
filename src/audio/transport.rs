/// Transport state machine over the two decks. Owned by the engine thread.

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

use super::backend::{AudioBackend, DeckEvent};
use super::crossfader::{CrossfadeConfig, Crossfader, FadeUpdate, GainLaw};
use super::deck::{DeckId, DeckPair};
use super::effects::{EffectSettings, EffectState};
use super::navigation::{NavAction, NavigationPolicy, RepeatMode};
use super::resources::{PositionState, ResourceGuard};
use crate::error::{EngineError, EngineResult};
use crate::playlist::{Queue, TrackDescriptor};

static NEXT_CONTROLLER_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Default)]
pub enum TransportPhase {
    #[default]
    Idle,
    /// Play was requested; waiting for the deck to confirm it started.
    Loading,
    Playing,
    Paused,
}

impl TransportPhase {
    /// Phases during which the screen must stay awake and the clock run.
    pub fn is_active(self) -> bool {
        matches!(self, TransportPhase::Loading | TransportPhase::Playing)
    }
}

/// Initial transport settings, usually from `PlayerConfig`.
#[derive(Clone, Copy, Debug)]
pub struct TransportSettings {
    pub crossfade: CrossfadeConfig,
    pub gain_law: GainLaw,
    pub shuffle: bool,
    pub repeat: RepeatMode,
    pub navigation: NavigationPolicy,
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            crossfade: CrossfadeConfig::default(),
            gain_law: GainLaw::default(),
            shuffle: false,
            repeat: RepeatMode::default(),
            navigation: NavigationPolicy::default(),
        }
    }
}

/// Read-only view published to the UI after every message.
#[derive(Clone, Debug, Serialize)]
pub struct TransportSnapshot {
    pub phase: TransportPhase,
    pub shuffle: bool,
    pub repeat: RepeatMode,
    pub current_index: Option<usize>,
    pub current_track: Option<TrackDescriptor>,
    pub queue_len: usize,
    pub position_secs: f64,
    pub duration_secs: Option<f64>,
    pub active_deck: DeckId,
    pub fade: f32,
    pub crossfade: CrossfadeConfig,
    pub gain_law: GainLaw,
    pub generation: u64,
    pub effects: EffectState,
}

/// "Pause and rewind the outgoing deck once the fade is over."
#[derive(Clone, Copy, Debug, PartialEq)]
struct PendingStop {
    deck: DeckId,
    generation: u64,
    due_at: f64,
}

pub struct TransportController<B: AudioBackend> {
    id: u64,
    backend: B,
    decks: DeckPair,
    active: DeckId,
    crossfader: Crossfader,
    crossfade: CrossfadeConfig,
    generation: u64,
    pending_stop: Option<PendingStop>,
    phase: TransportPhase,
    shuffle: bool,
    repeat: RepeatMode,
    queue: Queue,
    navigation: NavigationPolicy,
    rng: StdRng,
    effects: EffectSettings,
    resources: ResourceGuard,
    current_time: f64,
    initialized: bool,
    consecutive_failures: usize,
}

impl<B: AudioBackend> TransportController<B> {
    pub fn new(
        backend: B,
        resources: ResourceGuard,
        effects: EffectSettings,
        settings: TransportSettings,
    ) -> Self {
        Self {
            id: NEXT_CONTROLLER_ID.fetch_add(1, Ordering::Relaxed),
            backend,
            decks: DeckPair::default(),
            active: DeckId::A,
            crossfader: Crossfader::new(settings.gain_law),
            crossfade: CrossfadeConfig::new(settings.crossfade.enabled, settings.crossfade.duration_secs),
            generation: 0,
            pending_stop: None,
            phase: TransportPhase::Idle,
            shuffle: settings.shuffle,
            repeat: settings.repeat,
            queue: Queue::default(),
            navigation: settings.navigation,
            rng: StdRng::from_os_rng(),
            effects,
            resources,
            current_time: 0.0,
            initialized: false,
            consecutive_failures: 0,
        }
    }

    /// Replace the shuffle RNG with a seeded one (reproducible order).
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    /// Identity used by the media-session bridge to know when to rebind.
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn resources(&self) -> &ResourceGuard {
        &self.resources
    }

    pub fn resources_mut(&mut self) -> &mut ResourceGuard {
        &mut self.resources
    }

    pub fn effects(&self) -> &EffectSettings {
        &self.effects
    }

    pub fn effects_mut(&mut self) -> &mut EffectSettings {
        &mut self.effects
    }

    pub fn phase(&self) -> TransportPhase {
        self.phase
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn active_deck(&self) -> DeckId {
        self.active
    }

    pub fn queue(&self) -> &Queue {
        &self.queue
    }

    pub fn current_time(&self) -> f64 {
        self.current_time
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Mix weight of `deck` right now, before the gain law.
    pub fn deck_weight(&self, deck: DeckId) -> f32 {
        self.crossfader.weight(deck, self.backend.now())
    }

    pub fn is_fading(&self) -> bool {
        self.crossfader.active().is_some()
    }

    // ─── Lifecycle ───

    pub fn init(&mut self) -> EngineResult<()> {
        if self.initialized {
            return Ok(());
        }
        self.initialized = true;
        self.backend.set_gain_law(self.crossfader.law());
        self.hold_on(self.active);
        self.sync_resources();
        log::info!("Transport {} initialized", self.id);
        Ok(())
    }

    pub fn teardown(&mut self) {
        if !self.initialized {
            return;
        }
        self.initialized = false;
        for deck in [DeckId::A, DeckId::B] {
            self.backend.pause_deck(deck);
            self.decks.get_mut(deck).running = false;
        }
        self.pending_stop = None;
        self.crossfader.hold(self.active.fade_target());
        self.phase = TransportPhase::Idle;
        self.resources.release_all();
        self.backend.teardown();
        log::info!("Transport {} torn down", self.id);
    }

    // ─── Transport ───

    pub fn play(&mut self) -> EngineResult<()> {
        let Some(index) = self.queue.current_index() else {
            return Ok(());
        };
        if self.phase.is_active() {
            return Ok(());
        }
        self.init()?;
        self.backend.resume()?;

        if self.decks.get(self.active).source.is_none() {
            self.load_track(index)?;
        }

        let active = self.active;
        let generation = self.decks.get(active).generation;
        self.start(active, generation)?;
        self.phase = TransportPhase::Loading;
        self.sync_resources();
        Ok(())
    }

    pub fn pause(&mut self) -> EngineResult<()> {
        if matches!(self.phase, TransportPhase::Idle | TransportPhase::Paused) {
            return Ok(());
        }
        for deck in [DeckId::A, DeckId::B] {
            self.backend.pause_deck(deck);
            self.decks.get_mut(deck).running = false;
        }
        // A paused crossfade lands on the incoming deck.
        self.finish_fade_now();
        self.phase = TransportPhase::Paused;
        self.sync_resources();
        Ok(())
    }

    pub fn toggle_play(&mut self) -> EngineResult<()> {
        if self.phase.is_active() {
            self.pause()
        } else {
            self.play()
        }
    }

    pub fn stop(&mut self) -> EngineResult<()> {
        self.pending_stop = None;
        for deck in [DeckId::A, DeckId::B] {
            self.park(deck);
        }
        self.hold_on(self.active);
        self.current_time = 0.0;
        self.phase = TransportPhase::Idle;
        self.sync_resources();
        Ok(())
    }

    pub fn seek_to(&mut self, seconds: f64) -> EngineResult<()> {
        let deck = self.decks.get(self.active);
        if deck.source.is_none() {
            return Ok(());
        }
        let mut target = if seconds.is_finite() { seconds.max(0.0) } else { 0.0 };
        if let Some(duration) = deck.duration_secs {
            target = target.min(duration);
        }
        self.backend.seek_deck(self.active, target);
        self.decks.get_mut(self.active).position_secs = target;
        self.current_time = target;
        self.publish_position();
        Ok(())
    }

    pub fn seek_relative(&mut self, delta: f64) -> EngineResult<()> {
        self.seek_to(self.current_time + delta)
    }

    /// Bind queue entry `index` to a deck and, if playing, bring it in.
    pub fn load_track(&mut self, index: usize) -> EngineResult<()> {
        let track = self
            .queue
            .get(index)
            .cloned()
            .ok_or(EngineError::InvalidIndex {
                index,
                len: self.queue.len(),
            })?;

        let previous = self.active;
        let has_active = self.decks.get(previous).source.is_some();
        let target = if self.crossfade.enabled && has_active {
            previous.other()
        } else {
            previous
        };

        // Nothing changes unless the source opens.
        let duration = match self.backend.load(target, &track.source) {
            Ok(d) => d.or(track.duration_secs),
            Err(e) => {
                log::error!("{}", e);
                return Err(e);
            }
        };

        self.generation += 1;
        let generation = self.generation;
        self.decks
            .get_mut(target)
            .bind(track.source.clone(), duration, generation);
        self.queue.set_current(Some(index));
        self.current_time = 0.0;

        if let Some(stale) = self.pending_stop.take() {
            log::debug!(
                "Cancelled stop of deck {:?} (gen {})",
                stale.deck,
                stale.generation
            );
        }

        let started = if self.phase.is_active() {
            self.start(target, generation)
        } else {
            Ok(())
        };

        if self.phase.is_active() && started.is_ok() {
            if target != previous {
                let now = self.backend.now();
                let op = self.crossfader.begin(
                    target.fade_target(),
                    self.crossfade.duration_secs,
                    now,
                    generation,
                );
                self.backend.set_fade(FadeUpdate::Ramp(op));
                self.pending_stop = Some(PendingStop {
                    deck: previous,
                    generation,
                    due_at: op.ends_at(),
                });
                log::debug!(
                    "Crossfade {:?} -> {:?} over {:.1}s (gen {})",
                    previous,
                    target,
                    op.duration_secs,
                    generation
                );
            } else {
                self.park(target.other());
                self.hold_on(target);
            }
            self.phase = TransportPhase::Loading;
        } else {
            if target != previous {
                self.park(previous);
            } else {
                self.park(target.other());
            }
            self.hold_on(target);
            if started.is_err() {
                self.phase = TransportPhase::Idle;
            }
        }

        self.active = target;
        self.resources.publish_metadata(&track);
        self.sync_resources();
        log::info!("Loaded [{}] {} (gen {})", index, track.title, generation);
        started
    }

    pub fn next(&mut self, auto: bool) -> EngineResult<()> {
        let current = self.queue.current_index();
        let action = self.navigation.next(
            current,
            self.queue.len(),
            self.shuffle,
            self.repeat,
            auto,
            &mut self.rng,
        );
        self.execute(action)
    }

    pub fn prev(&mut self) -> EngineResult<()> {
        let position = self.current_time;
        let action = self.navigation.prev(
            self.queue.current_index(),
            self.queue.len(),
            self.shuffle,
            position,
            &mut self.rng,
        );
        self.execute(action)
    }

    fn execute(&mut self, action: NavAction) -> EngineResult<()> {
        match action {
            NavAction::None => Ok(()),
            NavAction::RestartCurrent => self.restart_current(),
            NavAction::JumpTo(index) => self.load_track(index),
            NavAction::StopAtEnd => {
                log::info!("End of queue");
                self.stop()
            }
        }
    }

    fn restart_current(&mut self) -> EngineResult<()> {
        self.seek_to(0.0)?;
        let active = self.active;
        let deck = self.decks.get(active);
        if self.phase.is_active() && !deck.running {
            let generation = deck.generation;
            self.start(active, generation)?;
            self.phase = TransportPhase::Loading;
            self.sync_resources();
        }
        Ok(())
    }

    fn start(&mut self, deck: DeckId, generation: u64) -> EngineResult<()> {
        self.backend.start_deck(deck, generation).map_err(|e| {
            log::error!("Deck {:?} did not start: {}", deck, e);
            e
        })
    }

    // ─── Queue and modes ───

    /// Replace the track list. Decks keep playing what they hold; the
    /// current index is taken from `current` when valid.
    pub fn set_queue(&mut self, tracks: Vec<TrackDescriptor>, current: Option<usize>) -> EngineResult<()> {
        let mut queue = Queue::new(tracks);
        if let Some(index) = current {
            if !queue.set_current(Some(index)) {
                return Err(EngineError::InvalidIndex {
                    index,
                    len: queue.len(),
                });
            }
        }
        self.queue = queue;
        self.consecutive_failures = 0;
        Ok(())
    }

    pub fn set_shuffle(&mut self, shuffle: bool) {
        self.shuffle = shuffle;
    }

    pub fn toggle_shuffle(&mut self) -> bool {
        self.shuffle = !self.shuffle;
        self.shuffle
    }

    pub fn set_repeat(&mut self, repeat: RepeatMode) {
        self.repeat = repeat;
    }

    pub fn cycle_repeat(&mut self) -> RepeatMode {
        self.repeat = self.repeat.cycle();
        self.repeat
    }

    /// Applies to the next transition; a fade already running keeps its length.
    pub fn set_crossfade(&mut self, config: CrossfadeConfig) {
        self.crossfade = CrossfadeConfig::new(config.enabled, config.duration_secs);
    }

    pub fn set_gain_law(&mut self, law: GainLaw) {
        self.crossfader.set_law(law);
        self.backend.set_gain_law(law);
    }

    pub fn set_navigation_policy(&mut self, policy: NavigationPolicy) {
        self.navigation = policy;
    }

    // ─── Events ───

    pub fn handle_deck_event(&mut self, event: DeckEvent) -> EngineResult<()> {
        let deck = event.deck();
        let generation = event.generation();
        if generation != self.decks.get(deck).generation {
            log::debug!(
                "Stale {:?} from deck {:?} (gen {}, deck at {})",
                event,
                deck,
                generation,
                self.decks.get(deck).generation
            );
            return Ok(());
        }

        match event {
            DeckEvent::Started { .. } => {
                self.decks.get_mut(deck).running = true;
                if deck == self.active && self.phase == TransportPhase::Loading {
                    self.phase = TransportPhase::Playing;
                    self.consecutive_failures = 0;
                    self.sync_resources();
                }
                Ok(())
            }
            DeckEvent::Ended { .. } => {
                self.decks.get_mut(deck).running = false;
                if deck != self.active || !self.phase.is_active() {
                    log::debug!("Ignoring end of inactive deck {:?}", deck);
                    return Ok(());
                }
                self.advance_from(self.queue.current_index(), self.repeat)
            }
            DeckEvent::Failed { reason, .. } => {
                log::error!("Deck {:?} failed: {}", deck, reason);
                self.decks.get_mut(deck).running = false;
                if deck != self.active || !self.phase.is_active() {
                    return Ok(());
                }
                self.consecutive_failures += 1;
                if self.consecutive_failures >= self.queue.len() {
                    log::warn!("Every track in the queue failed, stopping");
                    return self.stop();
                }
                self.advance_from(self.queue.current_index(), skip_mode(self.repeat))
            }
        }
    }

    /// Auto-advance, skipping over entries whose source will not open.
    fn advance_from(&mut self, mut cursor: Option<usize>, mut repeat: RepeatMode) -> EngineResult<()> {
        loop {
            let action = self.navigation.next(
                cursor,
                self.queue.len(),
                self.shuffle,
                repeat,
                true,
                &mut self.rng,
            );
            match self.execute(action) {
                Err(e @ EngineError::SourceLoad { .. }) => {
                    self.consecutive_failures += 1;
                    if self.consecutive_failures >= self.queue.len() {
                        log::warn!("Every track in the queue failed, stopping");
                        self.stop()?;
                        return Err(e);
                    }
                    if let NavAction::JumpTo(index) = action {
                        cursor = Some(index);
                    }
                    repeat = skip_mode(repeat);
                }
                other => return other,
            }
        }
    }

    /// Poll timers and refresh positions. Called by the engine loop on
    /// every idle wake-up.
    pub fn tick(&mut self) {
        if !self.initialized {
            return;
        }
        let now = self.backend.now();

        if let Some(stop) = self.pending_stop {
            if now >= stop.due_at {
                self.pending_stop = None;
                if stop.generation == self.generation {
                    self.park(stop.deck);
                } else {
                    log::debug!("Discarded stale stop for deck {:?} (gen {})", stop.deck, stop.generation);
                }
            }
        }

        if let Some(done) = self.crossfader.settle(now) {
            self.backend.set_fade(FadeUpdate::Hold(done.to));
            log::debug!("Crossfade gen {} complete", done.generation);
        }

        for deck in [DeckId::A, DeckId::B] {
            if self.decks.get(deck).source.is_some() {
                self.decks.get_mut(deck).position_secs = self.backend.deck_position(deck);
            }
        }
        if self.decks.get(self.active).source.is_some() && self.phase != TransportPhase::Idle {
            self.current_time = self.decks.get(self.active).position_secs;
            self.publish_position();
        }
    }

    pub fn snapshot(&self) -> TransportSnapshot {
        let deck = self.decks.get(self.active);
        TransportSnapshot {
            phase: self.phase,
            shuffle: self.shuffle,
            repeat: self.repeat,
            current_index: self.queue.current_index(),
            current_track: self.queue.current().cloned(),
            queue_len: self.queue.len(),
            position_secs: self.current_time,
            duration_secs: deck.duration_secs,
            active_deck: self.active,
            fade: self.crossfader.value_at(self.backend.now()),
            crossfade: self.crossfade,
            gain_law: self.crossfader.law(),
            generation: self.generation,
            effects: self.effects.state(),
        }
    }

    // ─── Helpers ───

    /// Pause a deck and rewind it to 0.
    fn park(&mut self, deck: DeckId) {
        self.backend.pause_deck(deck);
        if self.decks.get(deck).source.is_some() {
            self.backend.seek_deck(deck, 0.0);
        }
        self.decks.get_mut(deck).reset();
    }

    fn hold_on(&mut self, deck: DeckId) {
        let value = deck.fade_target();
        self.crossfader.hold(value);
        self.backend.set_fade(FadeUpdate::Hold(value));
    }

    fn finish_fade_now(&mut self) {
        if let Some(stop) = self.pending_stop.take() {
            self.park(stop.deck);
        }
        if self.crossfader.active().is_some() {
            self.hold_on(self.active);
        }
    }

    fn sync_resources(&mut self) {
        if let Some(mode) = self.resources.sync(self.phase) {
            self.backend.set_clock_mode(mode);
        }
    }

    fn publish_position(&mut self) {
        let deck = self.decks.get(self.active);
        let state = PositionState {
            duration: deck.duration_secs.unwrap_or(0.0),
            playback_rate: if self.phase == TransportPhase::Playing { 1.0 } else { 0.0 },
            position: self.current_time,
        };
        self.resources.publish_position(state);
    }
}

impl<B: AudioBackend> Drop for TransportController<B> {
    fn drop(&mut self) {
        self.teardown();
    }
}

/// Repeat mode used when skipping a broken track: never restart it.
fn skip_mode(repeat: RepeatMode) -> RepeatMode {
    match repeat {
        RepeatMode::One => RepeatMode::All,
        other => other,
    }
}
