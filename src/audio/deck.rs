use serde::Serialize;

use crate::playlist::SourceHandle;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum DeckId {
    A,
    B,
}

impl DeckId {
    pub fn other(self) -> Self {
        match self {
            DeckId::A => DeckId::B,
            DeckId::B => DeckId::A,
        }
    }

    pub fn index(self) -> usize {
        match self {
            DeckId::A => 0,
            DeckId::B => 1,
        }
    }

    /// Crossfader value at which this deck is fully audible.
    pub fn fade_target(self) -> f32 {
        match self {
            DeckId::A => 0.0,
            DeckId::B => 1.0,
        }
    }
}

/// Control-side view of one deck. The audio itself lives in the backend.
#[derive(Clone, Debug, Default)]
pub struct Deck {
    pub source: Option<SourceHandle>,
    pub position_secs: f64,
    pub duration_secs: Option<f64>,
    /// Generation of the load that bound the current source.
    pub generation: u64,
    /// True once the backend confirmed playback started for `generation`.
    pub running: bool,
}

impl Deck {
    pub fn bind(&mut self, source: SourceHandle, duration_secs: Option<f64>, generation: u64) {
        self.source = Some(source);
        self.duration_secs = duration_secs;
        self.position_secs = 0.0;
        self.generation = generation;
        self.running = false;
    }

    pub fn reset(&mut self) {
        self.position_secs = 0.0;
        self.running = false;
    }
}

#[derive(Debug, Default)]
pub struct DeckPair {
    decks: [Deck; 2],
}

impl DeckPair {
    pub fn get(&self, id: DeckId) -> &Deck {
        &self.decks[id.index()]
    }

    pub fn get_mut(&mut self, id: DeckId) -> &mut Deck {
        &mut self.decks[id.index()]
    }
}
