pub mod analyser;
pub mod backend;
pub mod crossfader;
pub mod deck;
pub mod decoder;
pub mod dynamics;
pub mod effects;
pub mod engine;
pub mod equalizer;
pub mod events;
pub mod navigation;
pub mod output;
pub mod resample;
pub mod resources;
pub mod ring_buffer;
pub mod smoothing;
pub mod stereo;
pub mod transport;
