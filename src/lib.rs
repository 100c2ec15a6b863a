pub mod audio;
pub mod commands;
pub mod config;
pub mod error;
pub mod library;
pub mod metadata;
pub mod playlist;

pub use audio::backend::{AudioBackend, ClockMode, DeckEvent};
pub use audio::engine::{AudioEngine, EngineOptions, HostServices};
pub use audio::transport::{TransportController, TransportPhase, TransportSnapshot};
pub use commands::PlayerCommand;
pub use config::PlayerConfig;
pub use error::{EngineError, EngineResult};
