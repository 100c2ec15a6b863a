/// Transport-facing audio seam. The cpal implementation lives in `output.rs`.

use super::crossfader::{FadeUpdate, GainLaw};
use super::deck::DeckId;
use crate::error::EngineResult;
use crate::playlist::SourceHandle;

/// What the audio clock should do while the transport sits in a phase.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClockMode {
    /// Decks are rendering.
    Running,
    /// Output stays open rendering silence so resume is instant and the OS
    /// keeps treating the app as an audio app.
    KeepAlive,
    /// Output closed.
    Suspended,
}

/// Notifications from the decks, delivered to the engine thread.
#[derive(Clone, Debug, PartialEq)]
pub enum DeckEvent {
    Started { deck: DeckId, generation: u64 },
    Ended { deck: DeckId, generation: u64 },
    Failed { deck: DeckId, generation: u64, reason: String },
}

impl DeckEvent {
    pub fn deck(&self) -> DeckId {
        match self {
            DeckEvent::Started { deck, .. }
            | DeckEvent::Ended { deck, .. }
            | DeckEvent::Failed { deck, .. } => *deck,
        }
    }

    pub fn generation(&self) -> u64 {
        match self {
            DeckEvent::Started { generation, .. }
            | DeckEvent::Ended { generation, .. }
            | DeckEvent::Failed { generation, .. } => *generation,
        }
    }
}

pub trait AudioBackend {
    /// Resume the audio clock. Fails with `HardwareUnlockDenied` when the
    /// output refuses to start.
    fn resume(&mut self) -> EngineResult<()>;

    fn set_clock_mode(&mut self, mode: ClockMode);

    /// Audio-clock time in seconds. Monotonic while running.
    fn now(&self) -> f64;

    /// Bind a new source to a deck, replacing whatever it held. On error the
    /// deck keeps its previous source. Returns the duration when known.
    fn load(&mut self, deck: DeckId, source: &SourceHandle) -> EngineResult<Option<f64>>;

    /// Begin playing a deck's bound source. Errors only when nothing can be
    /// started; otherwise the backend later posts `DeckEvent::Started`
    /// stamped with `generation`.
    fn start_deck(&mut self, deck: DeckId, generation: u64) -> EngineResult<()>;

    fn pause_deck(&mut self, deck: DeckId);

    fn seek_deck(&mut self, deck: DeckId, seconds: f64);

    fn deck_position(&self, deck: DeckId) -> f64;

    /// Hand the mixer a new crossfader ramp or resting value.
    fn set_fade(&mut self, update: FadeUpdate);

    fn set_gain_law(&mut self, law: GainLaw);

    fn teardown(&mut self);
}
