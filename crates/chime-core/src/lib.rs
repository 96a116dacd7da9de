//! Chime Core - handle-based sound effect playback
//!
//! This crate wraps a native audio engine behind a small, stable API:
//! initialize the engine, load short sounds into handles, and control
//! playback (play, pause, stop, volume, looping, seeking) per handle.

pub mod backend;
pub mod command;
pub mod decoder;
pub mod engine;
pub mod library;
pub mod player;
pub mod source;

#[cfg( any( test, feature = "test-support" ) )]
pub mod testing;

pub use backend::{ CpalBackend, NullBackend };
pub use command::{ help_text, parse_handle, Command, CommandError, Toggle };
pub use engine::{ Backend, EngineError, PlayState, SeekMode };
pub use library::{ InitError, LoadError, LoadStep, PlayerEvent, SoundLib };
pub use player::{ gain_to_millibels, Handle };
pub use source::AssetSource;
