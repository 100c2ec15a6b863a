use rand::Rng;
use serde::{Deserialize, Serialize};

/// Going back further than this restarts the current track instead.
pub const PREV_RESTART_THRESHOLD_SECS: f64 = 3.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum RepeatMode {
    Off,
    #[default]
    All,
    One,
}

impl RepeatMode {
    /// Off → All → One → Off.
    pub fn cycle(self) -> Self {
        match self {
            RepeatMode::Off => RepeatMode::All,
            RepeatMode::All => RepeatMode::One,
            RepeatMode::One => RepeatMode::Off,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NavAction {
    /// Nothing to play.
    None,
    /// Seek the current track to 0 and keep the index.
    RestartCurrent,
    JumpTo(usize),
    /// Auto-advance ran off the end of the queue with repeat off.
    StopAtEnd,
}

#[derive(Clone, Copy, Debug)]
pub struct NavigationPolicy {
    /// Never let shuffle pick the index that is already playing
    /// (only meaningful with more than one track).
    pub shuffle_avoids_repeat: bool,
}

impl Default for NavigationPolicy {
    fn default() -> Self {
        Self {
            shuffle_avoids_repeat: true,
        }
    }
}

impl NavigationPolicy {
    pub fn next<R: Rng + ?Sized>(
        &self,
        current: Option<usize>,
        len: usize,
        shuffle: bool,
        repeat: RepeatMode,
        auto: bool,
        rng: &mut R,
    ) -> NavAction {
        if len == 0 {
            return NavAction::None;
        }
        if repeat == RepeatMode::One && auto && current.is_some() {
            return NavAction::RestartCurrent;
        }
        if shuffle {
            return NavAction::JumpTo(self.random_index(current, len, rng));
        }
        match current {
            None => NavAction::JumpTo(0),
            Some(i) if auto && repeat == RepeatMode::Off && i + 1 >= len => NavAction::StopAtEnd,
            Some(i) => NavAction::JumpTo((i + 1) % len),
        }
    }

    pub fn prev<R: Rng + ?Sized>(
        &self,
        current: Option<usize>,
        len: usize,
        shuffle: bool,
        position_secs: f64,
        rng: &mut R,
    ) -> NavAction {
        if len == 0 {
            return NavAction::None;
        }
        if current.is_some() && position_secs > PREV_RESTART_THRESHOLD_SECS {
            return NavAction::RestartCurrent;
        }
        if shuffle {
            return NavAction::JumpTo(self.random_index(current, len, rng));
        }
        match current {
            None => NavAction::JumpTo(len - 1),
            Some(i) => NavAction::JumpTo((i % len + len - 1) % len),
        }
    }

    fn random_index<R: Rng + ?Sized>(&self, current: Option<usize>, len: usize, rng: &mut R) -> usize {
        match current {
            Some(cur) if self.shuffle_avoids_repeat && len > 1 && cur < len => {
                // Draw from the other len-1 slots, skipping over `cur`.
                let pick = rng.random_range(0..len - 1);
                if pick >= cur {
                    pick + 1
                } else {
                    pick
                }
            }
            _ => rng.random_range(0..len),
        }
    }
}
