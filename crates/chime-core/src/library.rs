//! Sound library: engine context and player table
//!
//! [`SoundLib`] owns one engine instance, its default output mix and an
//! append-only table of loaded sounds. Sounds are addressed by [`Handle`],
//! their 1-based position in the table. Handles are never reused; only
//! [`SoundLib::shutdown`] invalidates them, all at once.
//!
//! The engine reports end-of-data from its own thread. Those notifications
//! are posted to a channel and applied by [`SoundLib::dispatch_events`],
//! which every control call runs first.

use std::sync::mpsc::{ self, Receiver, Sender };

use thiserror::Error;

use crate::engine::{
    AudioEngine, Backend, Capability, EngineError, OutputMix, PlayState, PlayerObject, SeekMode,
};
use crate::player::{ gain_to_millibels, Handle, PlayerResource };
use crate::source::AssetSource;


/// Errors from bringing up the engine.
#[derive( Debug, Error )]
pub enum InitError {
    #[error( "Engine creation failed: {0}" )]
    CreateEngine( #[source] EngineError ),

    #[error( "Engine realize failed: {0}" )]
    RealizeEngine( #[source] EngineError ),

    #[error( "Output mix creation failed: {0}" )]
    CreateOutputMix( #[source] EngineError ),

    #[error( "Output mix realize failed: {0}" )]
    RealizeOutputMix( #[source] EngineError ),
}


/// Step of a load that failed.
#[derive( Debug, Clone, Copy, PartialEq, Eq )]
pub enum LoadStep {
    CreatePlayer,
    Realize,
    PlayControl,
    SeekControl,
    VolumeControl,
    RegisterCallback,
}


impl std::fmt::Display for LoadStep {
    fn fmt( &self, f: &mut std::fmt::Formatter<'_> ) -> std::fmt::Result {
        let step = match self {
            LoadStep::CreatePlayer => "create audio player",
            LoadStep::Realize => "realize audio player",
            LoadStep::PlayControl => "get 'play' interface",
            LoadStep::SeekControl => "get 'seek' interface",
            LoadStep::VolumeControl => "get 'volume' interface",
            LoadStep::RegisterCallback => "register callback function",
        };
        f.write_str( step )
    }
}


/// Errors from loading a sound.
#[derive( Debug, Error )]
pub enum LoadError {
    #[error( "No asset provided" )]
    EmptySource,

    #[error( "Sound library is not initialized" )]
    NotInitialized,

    #[error( "Failed to {step}: {source}" )]
    Engine {
        step: LoadStep,
        #[source]
        source: EngineError,
    },
}


/// Notifications posted by the engine side.
#[derive( Debug, Clone, Copy, PartialEq, Eq )]
pub enum PlayerEvent {
    /// The player's head reached the end of its data.
    HeadAtEnd( Handle ),
}


type PlayerOf<B> = <<B as Backend>::Engine as AudioEngine>::Player;
type MixOf<B> = <<B as Backend>::Engine as AudioEngine>::Mix;


/// Handle-based sound effect player on top of a native engine.
///
/// Not thread-safe: the table and its event channel belong to the thread
/// that owns the `SoundLib`.
pub struct SoundLib<B: Backend> {
    backend: B,
    initialized: bool,
    engine: Option<B::Engine>,
    mix: Option<MixOf<B>>,
    players: Vec<PlayerResource<PlayerOf<B>>>,
    events_tx: Sender<PlayerEvent>,
    events_rx: Receiver<PlayerEvent>,
}


impl<B: Backend> SoundLib<B> {
    /// Creates an uninitialized library for `backend`.
    pub fn new( backend: B ) -> Self {
        let ( events_tx, events_rx ) = mpsc::channel();
        Self {
            backend,
            initialized: false,
            engine: None,
            mix: None,
            players: Vec::new(),
            events_tx,
            events_rx,
        }
    }


    pub fn backend( &self ) -> &B {
        &self.backend
    }


    /// Returns true once [`initialize`](Self::initialize) has succeeded.
    pub fn is_initialized( &self ) -> bool {
        self.initialized
    }


    /// Number of sounds loaded since the last shutdown.
    pub fn len( &self ) -> usize {
        self.players.len()
    }


    pub fn is_empty( &self ) -> bool {
        self.players.is_empty()
    }


    /// Handles of every loaded sound, in load order.
    pub fn handles( &self ) -> impl Iterator<Item = Handle> + '_ {
        ( 0..self.players.len() ).map( Handle::from_index )
    }


    /// Creates and realizes the engine and its output mix.
    ///
    /// Returns false on failure; the cause is logged. A failed initialize
    /// leaves whatever was created in place, call [`shutdown`](Self::shutdown)
    /// to release it.
    pub fn initialize( &mut self ) -> bool {
        match self.try_initialize() {
            Ok(()) => true,
            Err( e ) => {
                tracing::error!( "{}", e );
                false
            }
        }
    }


    /// Like [`initialize`](Self::initialize), returning the failing step.
    pub fn try_initialize( &mut self ) -> Result<(), InitError> {
        if self.initialized {
            tracing::warn!( "Sound library already initialized" );
            return Ok(());
        }

        let engine = self.backend.create_engine().map_err( InitError::CreateEngine )?;
        let engine = self.engine.insert( engine );
        engine.realize().map_err( InitError::RealizeEngine )?;

        let mix = engine.create_output_mix().map_err( InitError::CreateOutputMix )?;
        let mix = self.mix.insert( mix );
        mix.realize().map_err( InitError::RealizeOutputMix )?;

        self.initialized = true;
        tracing::info!( "Sound library initialized" );
        Ok(())
    }


    /// Destroys every player, then the output mix, then the engine.
    ///
    /// Safe to call repeatedly and after a failed initialize. All handles
    /// become invalid; later loads start again at handle 1.
    pub fn shutdown( &mut self ) {
        let players = self.players.len();
        // Dropping a resource destroys its native object
        self.players.clear();

        if let Some( mut mix ) = self.mix.take() {
            mix.destroy();
        }

        if let Some( mut engine ) = self.engine.take() {
            engine.destroy();
        }

        // Notifications still in flight refer to handles that no longer exist
        let ( events_tx, events_rx ) = mpsc::channel();
        self.events_tx = events_tx;
        self.events_rx = events_rx;

        if self.initialized {
            tracing::info!( "Sound library shut down, released {} players", players );
        }
        self.initialized = false;
    }


    /// Creates a player for `source` and returns its handle.
    ///
    /// On failure the partially built player is destroyed and no handle is
    /// allocated.
    pub fn load_from_asset( &mut self, source: &AssetSource ) -> Result<Handle, LoadError> {
        self.dispatch_events();

        let result = self.load( source );
        match &result {
            Ok( handle ) => tracing::debug!( "Loaded sound {}", handle ),
            Err( e ) => tracing::error!( "{}", e ),
        }
        result
    }


    fn load( &mut self, source: &AssetSource ) -> Result<Handle, LoadError> {
        if source.is_empty() {
            return Err( LoadError::EmptySource );
        }

        let ( engine, mix ) = match ( self.initialized, self.engine.as_mut(), self.mix.as_ref() ) {
            ( true, Some( engine ), Some( mix ) ) => ( engine, mix ),
            _ => return Err( LoadError::NotInitialized ),
        };

        let failed_at = |step: LoadStep| move |source: EngineError| LoadError::Engine { step, source };

        let object = engine
            .create_player( source, mix, &[ Capability::Seek, Capability::Volume ] )
            .map_err( failed_at( LoadStep::CreatePlayer ) )?;

        // From here on, an early return drops the resource and destroys the object
        let mut resource = PlayerResource::new( object );
        resource.object_mut().realize().map_err( failed_at( LoadStep::Realize ) )?;

        let play = resource.object().play_control().map_err( failed_at( LoadStep::PlayControl ) )?;
        let seek = resource.object().seek_control().map_err( failed_at( LoadStep::SeekControl ) )?;
        let volume = resource.object().volume_control().map_err( failed_at( LoadStep::VolumeControl ) )?;

        let handle = Handle::from_index( self.players.len() );
        let events = self.events_tx.clone();
        play.register_end_callback( Box::new( move || {
            // The receiver is gone after shutdown; nothing left to stop
            let _ = events.send( PlayerEvent::HeadAtEnd( handle ) );
        }))
        .map_err( failed_at( LoadStep::RegisterCallback ) )?;

        resource.play = Some( play );
        resource.seek = Some( seek );
        resource.volume = Some( volume );

        self.players.push( resource );
        Ok( handle )
    }


    /// Applies pending engine notifications. Returns how many were handled.
    ///
    /// A sound whose head reached the end is stopped unless it is looping.
    pub fn dispatch_events( &self ) -> usize {
        let mut handled = 0;
        while let Ok( event ) = self.events_rx.try_recv() {
            handled += 1;
            match event {
                PlayerEvent::HeadAtEnd( handle ) => {
                    let Some( resource ) = handle.index().and_then( |i| self.players.get( i ) ) else {
                        continue;
                    };
                    if resource.looping.get() {
                        tracing::trace!( "Sound {} reached end while looping", handle );
                        continue;
                    }
                    if let Some( play ) = resource.play.as_deref() {
                        tracing::debug!( "Sound {} finished", handle );
                        log_failure( handle, "stop", play.set_state( PlayState::Stopped ) );
                    }
                }
            }
        }
        handled
    }


    /// Resolves a handle after applying pending notifications.
    ///
    /// [`Handle::NONE`] resolves to nothing silently; handles past the end
    /// of the table are logged.
    fn resource( &self, handle: Handle ) -> Option<&PlayerResource<PlayerOf<B>>> {
        self.dispatch_events();

        let index = handle.index()?;
        let resource = self.players.get( index );
        if resource.is_none() {
            tracing::warn!(
                "Handle {} is out of range ({} sounds loaded)",
                handle,
                self.players.len()
            );
        }
        resource
    }


    fn set_state( &self, handle: Handle, state: PlayState ) -> bool {
        if let Some( play ) = self.resource( handle ).and_then( |r| r.play.as_deref() ) {
            log_failure( handle, "set play state", play.set_state( state ) );
        }
        // Always false, whether or not the state changed
        false
    }


    /// Starts or resumes playback. Always returns false.
    pub fn play( &self, handle: Handle ) -> bool {
        self.set_state( handle, PlayState::Playing )
    }


    /// Stops playback and rewinds. Always returns false.
    pub fn stop( &self, handle: Handle ) -> bool {
        self.set_state( handle, PlayState::Stopped )
    }


    /// Pauses playback. Always returns false.
    pub fn pause( &self, handle: Handle ) -> bool {
        self.set_state( handle, PlayState::Paused )
    }


    /// Stops every loaded sound.
    pub fn stop_all( &self ) {
        self.dispatch_events();

        for ( index, resource ) in self.players.iter().enumerate() {
            if let Some( play ) = resource.play.as_deref() {
                log_failure(
                    Handle::from_index( index ),
                    "stop",
                    play.set_state( PlayState::Stopped ),
                );
            }
        }
    }


    /// Sets the volume from a normalized linear gain in [0, 1].
    pub fn set_volume( &self, handle: Handle, gain: f32 ) {
        if let Some( volume ) = self.resource( handle ).and_then( |r| r.volume.as_deref() ) {
            log_failure( handle, "set volume", volume.set_level( gain_to_millibels( gain ) ) );
        }
    }


    /// Loops the whole sound, or stops looping.
    pub fn set_looped( &self, handle: Handle, enabled: bool ) {
        let Some( resource ) = self.resource( handle ) else {
            return;
        };
        if let Some( seek ) = resource.seek.as_deref() {
            match seek.set_loop( enabled, 0, None ) {
                Ok(()) => resource.looping.set( enabled ),
                Err( e ) => tracing::warn!( "Failed to set loop on sound {}: {}", handle, e ),
            }
        }
    }


    /// Seeks to `msec` milliseconds, preferring speed over accuracy.
    pub fn set_play_position( &self, handle: Handle, msec: u64 ) {
        if let Some( seek ) = self.resource( handle ).and_then( |r| r.seek.as_deref() ) {
            let msec = u32::try_from( msec ).unwrap_or( u32::MAX );
            log_failure( handle, "seek", seek.set_position( msec, SeekMode::Fast ) );
        }
    }


    /// Total length in milliseconds, 0 if unknown.
    ///
    /// Engines may only report the duration while paused or playing, so a
    /// stopped sound is paused for the query and put back afterwards.
    pub fn play_length( &self, handle: Handle ) -> u64 {
        let Some( play ) = self.resource( handle ).and_then( |r| r.play.as_deref() ) else {
            return 0;
        };

        let state = match play.state() {
            Ok( state ) => state,
            Err( e ) => {
                tracing::warn!( "Failed to get play state of sound {}: {}", handle, e );
                return 0;
            }
        };

        let needs_pause = !matches!( state, PlayState::Paused | PlayState::Playing );
        if needs_pause {
            log_failure( handle, "pause", play.set_state( PlayState::Paused ) );
        }

        let duration = match play.duration() {
            Ok( duration ) => duration.unwrap_or( 0 ),
            Err( e ) => {
                tracing::warn!( "Failed to get duration of sound {}: {}", handle, e );
                0
            }
        };

        if needs_pause {
            log_failure( handle, "restore play state", play.set_state( state ) );
        }

        duration as u64
    }


    /// Current head position in milliseconds, 0 if unknown.
    pub fn play_position( &self, handle: Handle ) -> u64 {
        self.resource( handle )
            .and_then( |r| r.play.as_deref() )
            .and_then( |play| play.position().ok() )
            .map_or( 0, u64::from )
    }


    /// Current play state, `None` for invalid handles or sounds without a
    /// play control.
    pub fn play_state( &self, handle: Handle ) -> Option<PlayState> {
        self.resource( handle )
            .and_then( |r| r.play.as_deref() )
            .and_then( |play| play.state().ok() )
    }


    /// Returns true if the sound is set to loop.
    pub fn is_looped( &self, handle: Handle ) -> bool {
        self.resource( handle ).is_some_and( |r| r.looping.get() )
    }
}


impl<B: Backend> Drop for SoundLib<B> {
    fn drop( &mut self ) {
        self.shutdown();
    }
}


fn log_failure( handle: Handle, action: &str, result: Result<(), EngineError> ) {
    if let Err( e ) = result {
        tracing::warn!( "Failed to {} sound {}: {}", action, handle, e );
    }
}


#[cfg( test )]
mod tests {
    use super::*;
    use crate::backend::NullBackend;
    use crate::testing::{ wav_bytes, FailPoint, FakeBackend };


    fn source() -> AssetSource {
        AssetSource::from_bytes( vec![ 1u8; 16 ], Some( "audio/ogg" ) )
    }


    fn ready( backend: FakeBackend ) -> SoundLib<FakeBackend> {
        let mut lib = SoundLib::new( backend );
        assert!( lib.initialize() );
        lib
    }


    #[test]
    fn test_initialize_and_shutdown_order() {
        let backend = FakeBackend::new();
        let mut lib = ready( backend.clone() );
        lib.load_from_asset( &source() ).unwrap();
        lib.shutdown();

        assert!( !lib.is_initialized() );
        assert_eq!(
            backend.log(),
            vec![
                "engine.create", "engine.realize", "mix.create", "mix.realize",
                "player.create", "player.realize", "player.destroy",
                "mix.destroy", "engine.destroy",
            ]
        );
    }


    #[test]
    fn test_initialize_failure_reports_step() {
        let backend = FakeBackend::new();
        backend.fail_at( FailPoint::RealizeMix );

        let mut lib = SoundLib::new( backend.clone() );
        assert!( matches!( lib.try_initialize(), Err( InitError::RealizeOutputMix( _ ) ) ) );
        assert!( !lib.is_initialized() );
        assert!( matches!( lib.load_from_asset( &source() ), Err( LoadError::NotInitialized ) ) );

        // Whatever was created is released by shutdown
        lib.shutdown();
        let log = backend.log();
        assert!( log.contains( &"mix.destroy" ) );
        assert!( log.contains( &"engine.destroy" ) );
    }


    #[test]
    fn test_shutdown_is_idempotent() {
        let mut lib = SoundLib::new( FakeBackend::new() );
        lib.shutdown();
        assert!( lib.initialize() );
        lib.shutdown();
        lib.shutdown();
        assert!( !lib.is_initialized() );
    }


    #[test]
    fn test_handles_are_dense_across_failures() {
        let backend = FakeBackend::new();
        let mut lib = ready( backend.clone() );

        assert_eq!( lib.load_from_asset( &source() ).unwrap(), Handle::new( 1 ) );

        backend.fail_at( FailPoint::RealizePlayer );
        assert!( matches!(
            lib.load_from_asset( &source() ),
            Err( LoadError::Engine { step: LoadStep::Realize, .. } )
        ));

        backend.fail_at( FailPoint::SeekControl );
        assert!( lib.load_from_asset( &source() ).is_err() );

        backend.clear_failure();
        assert_eq!( lib.load_from_asset( &source() ).unwrap(), Handle::new( 2 ) );
        assert_eq!( lib.load_from_asset( &source() ).unwrap(), Handle::new( 3 ) );
        assert_eq!( lib.handles().collect::<Vec<_>>(), vec![ Handle::new( 1 ), Handle::new( 2 ), Handle::new( 3 ) ] );
    }


    #[test]
    fn test_failed_load_destroys_partial_player() {
        let backend = FakeBackend::new();
        let mut lib = ready( backend.clone() );

        backend.fail_at( FailPoint::RegisterCallback );
        assert!( lib.load_from_asset( &source() ).is_err() );
        assert_eq!( backend.live_players(), 0 );
        assert!( lib.is_empty() );
    }


    #[test]
    fn test_empty_source_rejected() {
        let mut lib = ready( FakeBackend::new() );
        let empty = AssetSource::from_bytes( Vec::new(), None );
        assert!( matches!( lib.load_from_asset( &empty ), Err( LoadError::EmptySource ) ) );
    }


    #[test]
    fn test_play_pause_stop_return_false() {
        let mut lib = ready( FakeBackend::new() );
        let h = lib.load_from_asset( &source() ).unwrap();

        assert!( !lib.play( h ) );
        assert_eq!( lib.play_state( h ), Some( PlayState::Playing ) );
        assert!( !lib.pause( h ) );
        assert_eq!( lib.play_state( h ), Some( PlayState::Paused ) );
        assert!( !lib.stop( h ) );
        assert_eq!( lib.play_state( h ), Some( PlayState::Stopped ) );
    }


    #[test]
    fn test_handle_zero_is_a_no_op() {
        let backend = FakeBackend::new();
        let mut lib = ready( backend.clone() );
        let h = lib.load_from_asset( &source() ).unwrap();
        let calls = backend.state_changes( 0 );

        assert!( !lib.play( Handle::NONE ) );
        assert!( !lib.stop( Handle::NONE ) );
        assert!( !lib.pause( Handle::NONE ) );
        lib.set_volume( Handle::NONE, 0.5 );
        lib.set_looped( Handle::NONE, true );
        lib.set_play_position( Handle::NONE, 100 );
        assert_eq!( lib.play_length( Handle::NONE ), 0 );
        assert_eq!( lib.play_state( Handle::NONE ), None );

        assert_eq!( backend.state_changes( 0 ), calls );
        assert_eq!( lib.play_state( h ), Some( PlayState::Stopped ) );
        assert_eq!( backend.level( 0 ), 0 );
    }


    #[test]
    fn test_out_of_range_handle_is_rejected() {
        let mut lib = ready( FakeBackend::new() );
        lib.load_from_asset( &source() ).unwrap();

        assert!( !lib.play( Handle::new( 2 ) ) );
        assert_eq!( lib.play_length( Handle::new( 99 ) ), 0 );
        assert_eq!( lib.play_state( Handle::new( 2 ) ), None );
    }


    #[test]
    fn test_volume_is_sent_in_millibels() {
        let backend = FakeBackend::new();
        let mut lib = ready( backend.clone() );
        let h = lib.load_from_asset( &source() ).unwrap();

        lib.set_volume( h, 0.5 );
        assert_eq!( backend.level( 0 ), -602 );

        lib.set_volume( h, 0.0 );
        assert_eq!( backend.level( 0 ), -9600 );

        lib.set_volume( h, 1.0 );
        assert_eq!( backend.level( 0 ), 0 );
    }


    #[test]
    fn test_play_length_restores_stopped_state() {
        let backend = FakeBackend::new();
        let mut lib = ready( backend.clone() );
        let h = lib.load_from_asset( &source() ).unwrap();

        // The fake only knows its duration while paused or playing
        let stopped_length = lib.play_length( h );
        assert_eq!( stopped_length, 1500 );
        assert_eq!( lib.play_state( h ), Some( PlayState::Stopped ) );

        lib.play( h );
        let changes = backend.state_changes( 0 );
        assert_eq!( lib.play_length( h ), stopped_length );
        assert_eq!( lib.play_state( h ), Some( PlayState::Playing ) );
        // No transient pause while already playing
        assert_eq!( backend.state_changes( 0 ), changes );
    }


    #[test]
    fn test_play_length_while_paused_keeps_pause() {
        let mut lib = ready( FakeBackend::new() );
        let h = lib.load_from_asset( &source() ).unwrap();

        lib.pause( h );
        assert_eq!( lib.play_length( h ), 1500 );
        assert_eq!( lib.play_state( h ), Some( PlayState::Paused ) );
    }


    #[test]
    fn test_stop_all() {
        let mut lib = ready( FakeBackend::new() );
        let a = lib.load_from_asset( &source() ).unwrap();
        let b = lib.load_from_asset( &source() ).unwrap();
        let c = lib.load_from_asset( &source() ).unwrap();

        lib.play( a );
        lib.pause( b );
        lib.stop_all();

        for h in [ a, b, c ] {
            assert_eq!( lib.play_state( h ), Some( PlayState::Stopped ) );
        }
    }


    #[test]
    fn test_end_of_data_stops_one_shot() {
        let backend = FakeBackend::new();
        let mut lib = ready( backend.clone() );
        let h = lib.load_from_asset( &source() ).unwrap();

        lib.play( h );
        backend.end_of_data( 0 );
        assert_eq!( lib.dispatch_events(), 1 );
        assert_eq!( lib.play_state( h ), Some( PlayState::Stopped ) );
    }


    #[test]
    fn test_looping_suppresses_auto_stop() {
        let backend = FakeBackend::new();
        let mut lib = ready( backend.clone() );
        let h = lib.load_from_asset( &source() ).unwrap();

        lib.set_looped( h, true );
        assert!( lib.is_looped( h ) );
        assert_eq!( backend.loop_setting( 0 ), Some(( true, 0, None )) );

        lib.play( h );
        backend.end_of_data( 0 );
        assert_eq!( lib.play_state( h ), Some( PlayState::Playing ) );

        lib.set_looped( h, false );
        backend.end_of_data( 0 );
        assert_eq!( lib.play_state( h ), Some( PlayState::Stopped ) );
    }


    #[test]
    fn test_seek_uses_fast_mode() {
        let backend = FakeBackend::new();
        let mut lib = ready( backend.clone() );
        let h = lib.load_from_asset( &source() ).unwrap();

        lib.set_play_position( h, 5000 );
        assert_eq!( backend.last_seek( 0 ), Some(( 5000, SeekMode::Fast )) );
        assert_eq!( lib.play_position( h ), 5000 );
    }


    #[test]
    fn test_events_from_before_shutdown_are_dropped() {
        let backend = FakeBackend::new();
        let mut lib = ready( backend.clone() );
        let h = lib.load_from_asset( &source() ).unwrap();
        lib.play( h );

        // Keep the stale player's callback around across a restart
        let stale = backend.take_callback( 0 );
        lib.shutdown();
        assert!( lib.initialize() );
        let h = lib.load_from_asset( &source() ).unwrap();
        lib.play( h );

        if let Some( callback ) = stale {
            callback();
        }
        assert_eq!( lib.dispatch_events(), 0 );
        assert_eq!( lib.play_state( h ), Some( PlayState::Playing ) );
    }


    #[test]
    fn test_null_backend_end_to_end() {
        let mut lib = SoundLib::new( NullBackend::new() );
        assert!( lib.initialize() );

        let source = AssetSource::from_bytes( wav_bytes( 8000, 1, 8000 ), Some( "audio/wav" ) );
        let h = lib.load_from_asset( &source ).unwrap();
        assert_eq!( lib.play_length( h ), 1000 );

        lib.set_play_position( h, 500 );
        assert_eq!( lib.play_position( h ), 500 );

        lib.play( h );
        lib.backend().advance( 250 );
        assert_eq!( lib.play_position( h ), 750 );

        lib.backend().advance( 400 );
        assert_eq!( lib.play_state( h ), Some( PlayState::Stopped ) );
        assert_eq!( lib.play_position( h ), 0 );

        lib.set_looped( h, true );
        lib.play( h );
        lib.backend().advance( 2500 );
        assert_eq!( lib.play_state( h ), Some( PlayState::Playing ) );
        assert_eq!( lib.play_position( h ), 500 );

        lib.shutdown();
        assert_eq!( lib.backend().live_players(), 0 );
    }


    #[test]
    fn test_garbage_asset_fails_to_realize() {
        let mut lib = SoundLib::new( NullBackend::new() );
        assert!( lib.initialize() );

        let garbage = AssetSource::from_bytes( vec![ 0x42u8; 256 ], Some( "audio/wav" ) );
        assert!( matches!(
            lib.load_from_asset( &garbage ),
            Err( LoadError::Engine { step: LoadStep::Realize, .. } )
        ));
        assert!( lib.is_empty() );
        assert_eq!( lib.backend().live_players(), 0 );
    }
}
