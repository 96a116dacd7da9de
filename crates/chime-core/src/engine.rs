//! Native audio engine interfaces
//!
//! The traits in this module describe the surface a platform audio engine
//! has to provide for [`SoundLib`](crate::SoundLib) to drive it: an engine
//! object, a default output mix, and player objects that expose optional
//! play, seek and volume controls once realized.

use thiserror::Error;

use crate::source::AssetSource;


/// Errors reported by a native engine or one of its objects.
#[derive( Debug, Error )]
pub enum EngineError {
    #[error( "No output device available" )]
    NoDevice,

    #[error( "Output stream error: {0}" )]
    Stream( String ),

    #[error( "Content error: {0}" )]
    Content( String ),

    #[error( "Capability not supported: {0:?}" )]
    FeatureUnsupported( Capability ),

    #[error( "Object is not realized" )]
    NotRealized,

    #[error( "Object has been destroyed" )]
    Destroyed,

    #[error( "Engine error: {0}" )]
    Other( String ),
}


/// Play state of a player object.
#[derive( Debug, Clone, Copy, PartialEq, Eq, Default )]
pub enum PlayState {
    #[default]
    Stopped,
    Paused,
    Playing,
}


/// How precisely a seek should land.
#[derive( Debug, Clone, Copy, PartialEq, Eq )]
pub enum SeekMode {
    /// Prefer speed; the head may land on the nearest convenient frame.
    Fast,
    /// Land on the exact requested frame.
    Accurate,
}


/// Optional capabilities a player object can be asked to support.
#[derive( Debug, Clone, Copy, PartialEq, Eq )]
pub enum Capability {
    Seek,
    Volume,
}


/// Invoked by the engine, possibly from its own thread, when a player's head
/// reaches the end of its data.
pub type EndCallback = Box<dyn Fn() + Send + Sync>;


/// Play state, duration and end-of-data notification for a player.
pub trait PlayControl {
    fn set_state( &self, state: PlayState ) -> Result<(), EngineError>;

    fn state( &self ) -> Result<PlayState, EngineError>;

    /// Total duration in milliseconds, `None` when the engine cannot tell.
    ///
    /// Engines are allowed to only know the duration while the player is
    /// paused or playing.
    fn duration( &self ) -> Result<Option<u32>, EngineError>;

    /// Current head position in milliseconds.
    fn position( &self ) -> Result<u32, EngineError>;

    /// Replaces any previously registered end-of-data callback.
    fn register_end_callback( &self, callback: EndCallback ) -> Result<(), EngineError>;
}


/// Seek and loop configuration for a player.
pub trait SeekControl {
    fn set_position( &self, msec: u32, mode: SeekMode ) -> Result<(), EngineError>;

    /// Enables or disables looping between `start` and `end` (milliseconds).
    /// An `end` of `None` means the end of the content.
    fn set_loop( &self, enabled: bool, start: u32, end: Option<u32> ) -> Result<(), EngineError>;
}


/// Volume control for a player, in millibels (hundredths of a decibel).
pub trait VolumeControl {
    fn set_level( &self, millibels: i16 ) -> Result<(), EngineError>;

    fn level( &self ) -> Result<i16, EngineError>;
}


/// A player object created by the engine for one audio source.
///
/// Controls may only be retrieved once the object has been realized. They
/// become invalid once the object is destroyed.
pub trait PlayerObject {
    fn realize( &mut self ) -> Result<(), EngineError>;

    fn play_control( &self ) -> Result<Box<dyn PlayControl>, EngineError>;

    fn seek_control( &self ) -> Result<Box<dyn SeekControl>, EngineError>;

    fn volume_control( &self ) -> Result<Box<dyn VolumeControl>, EngineError>;

    /// Releases the native object. Must tolerate repeated calls.
    fn destroy( &mut self );
}


/// The default output mix every player is routed into.
pub trait OutputMix {
    fn realize( &mut self ) -> Result<(), EngineError>;

    /// Releases the native mix. Must tolerate repeated calls.
    fn destroy( &mut self );
}


/// A native audio engine instance.
pub trait AudioEngine {
    type Mix: OutputMix;
    type Player: PlayerObject;

    fn realize( &mut self ) -> Result<(), EngineError>;

    fn create_output_mix( &mut self ) -> Result<Self::Mix, EngineError>;

    /// Creates an unrealized player reading from `source` and rendering into
    /// `sink`. Fails if any of the `required` capabilities is unavailable.
    fn create_player(
        &mut self,
        source: &AssetSource,
        sink: &Self::Mix,
        required: &[Capability],
    ) -> Result<Self::Player, EngineError>;

    /// Releases the native engine. Must tolerate repeated calls.
    fn destroy( &mut self );
}


/// Factory for engine instances.
pub trait Backend {
    type Engine: AudioEngine;

    fn create_engine( &self ) -> Result<Self::Engine, EngineError>;
}
