//! Test helpers: a scripted engine and in-memory WAV assets.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use crate::engine::{
    AudioEngine, Backend, Capability, EndCallback, EngineError, OutputMix, PlayControl, PlayState,
    PlayerObject, SeekControl, SeekMode, VolumeControl,
};
use crate::source::AssetSource;


/// Duration the fake players report, in milliseconds.
pub const FAKE_DURATION_MS: u32 = 1500;


/// Builds a 16-bit PCM WAV file.
pub fn wav_bytes( sample_rate: u32, channels: u16, frames: u32 ) -> Vec<u8> {
    let data_len = frames * channels as u32 * 2;
    let mut out = Vec::with_capacity( 44 + data_len as usize );

    out.extend_from_slice( b"RIFF" );
    out.extend_from_slice( &( 36 + data_len ).to_le_bytes() );
    out.extend_from_slice( b"WAVE" );

    out.extend_from_slice( b"fmt " );
    out.extend_from_slice( &16u32.to_le_bytes() );
    out.extend_from_slice( &1u16.to_le_bytes() );
    out.extend_from_slice( &channels.to_le_bytes() );
    out.extend_from_slice( &sample_rate.to_le_bytes() );
    out.extend_from_slice( &( sample_rate * channels as u32 * 2 ).to_le_bytes() );
    out.extend_from_slice( &( channels * 2 ).to_le_bytes() );
    out.extend_from_slice( &16u16.to_le_bytes() );

    out.extend_from_slice( b"data" );
    out.extend_from_slice( &data_len.to_le_bytes() );
    for i in 0..frames * channels as u32 {
        let sample = ( ( i % 64 ) as i16 - 32 ) * 256;
        out.extend_from_slice( &sample.to_le_bytes() );
    }

    out
}


/// Where the fake engine should fail.
#[derive( Debug, Clone, Copy, PartialEq, Eq )]
pub enum FailPoint {
    CreateEngine,
    RealizeEngine,
    CreateMix,
    RealizeMix,
    CreatePlayer,
    RealizePlayer,
    PlayControl,
    SeekControl,
    VolumeControl,
    RegisterCallback,
}


#[derive( Default )]
struct FakeVoice {
    realized: bool,
    destroyed: bool,
    state: PlayState,
    state_changes: usize,
    position: u32,
    level: i16,
    loop_setting: Option<( bool, u32, Option<u32> )>,
    last_seek: Option<( u32, SeekMode )>,
    callback: Option<Arc<EndCallback>>,
}


#[derive( Default )]
struct Shared {
    fail: Option<FailPoint>,
    log: Vec<&'static str>,
    players: Vec<Rc<RefCell<FakeVoice>>>,
}


type SharedRef = Rc<RefCell<Shared>>;


fn check( shared: &SharedRef, point: FailPoint ) -> Result<(), EngineError> {
    if shared.borrow().fail == Some( point ) {
        return Err( EngineError::Other( format!( "injected failure at {:?}", point ) ) );
    }
    Ok(())
}


fn log( shared: &SharedRef, entry: &'static str ) {
    shared.borrow_mut().log.push( entry );
}


/// Scripted backend recording every call made against it.
///
/// Players only know their duration while paused or playing.
#[derive( Clone, Default )]
pub struct FakeBackend {
    shared: SharedRef,
}


impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }


    pub fn fail_at( &self, point: FailPoint ) {
        self.shared.borrow_mut().fail = Some( point );
    }


    pub fn clear_failure( &self ) {
        self.shared.borrow_mut().fail = None;
    }


    pub fn log( &self ) -> Vec<&'static str> {
        self.shared.borrow().log.clone()
    }


    pub fn live_players( &self ) -> usize {
        self.shared
            .borrow()
            .players
            .iter()
            .filter( |p| !p.borrow().destroyed )
            .count()
    }


    fn voice( &self, index: usize ) -> Rc<RefCell<FakeVoice>> {
        Rc::clone( &self.shared.borrow().players[ index ] )
    }


    /// Number of play state changes requested on the `index`th created player.
    pub fn state_changes( &self, index: usize ) -> usize {
        self.voice( index ).borrow().state_changes
    }


    pub fn level( &self, index: usize ) -> i16 {
        self.voice( index ).borrow().level
    }


    pub fn loop_setting( &self, index: usize ) -> Option<( bool, u32, Option<u32> )> {
        self.voice( index ).borrow().loop_setting
    }


    pub fn last_seek( &self, index: usize ) -> Option<( u32, SeekMode )> {
        self.voice( index ).borrow().last_seek
    }


    /// Delivers end-of-data for the `index`th created player, as the engine
    /// thread would.
    pub fn end_of_data( &self, index: usize ) {
        let callback = self.voice( index ).borrow().callback.clone();
        if let Some( callback ) = callback {
            callback();
        }
    }


    pub fn take_callback( &self, index: usize ) -> Option<Arc<EndCallback>> {
        self.voice( index ).borrow_mut().callback.take()
    }
}


impl Backend for FakeBackend {
    type Engine = FakeEngine;


    fn create_engine( &self ) -> Result<FakeEngine, EngineError> {
        check( &self.shared, FailPoint::CreateEngine )?;
        log( &self.shared, "engine.create" );
        Ok( FakeEngine { shared: Rc::clone( &self.shared ), destroyed: false } )
    }
}


pub struct FakeEngine {
    shared: SharedRef,
    destroyed: bool,
}


impl AudioEngine for FakeEngine {
    type Mix = FakeMix;
    type Player = FakePlayer;


    fn realize( &mut self ) -> Result<(), EngineError> {
        check( &self.shared, FailPoint::RealizeEngine )?;
        log( &self.shared, "engine.realize" );
        Ok(())
    }


    fn create_output_mix( &mut self ) -> Result<FakeMix, EngineError> {
        check( &self.shared, FailPoint::CreateMix )?;
        log( &self.shared, "mix.create" );
        Ok( FakeMix { shared: Rc::clone( &self.shared ), destroyed: false } )
    }


    fn create_player(
        &mut self,
        _source: &AssetSource,
        _sink: &FakeMix,
        required: &[Capability],
    ) -> Result<FakePlayer, EngineError> {
        check( &self.shared, FailPoint::CreatePlayer )?;
        assert_eq!( required, &[ Capability::Seek, Capability::Volume ] );
        log( &self.shared, "player.create" );

        let voice = Rc::new( RefCell::new( FakeVoice::default() ) );
        self.shared.borrow_mut().players.push( Rc::clone( &voice ) );
        Ok( FakePlayer { shared: Rc::clone( &self.shared ), voice } )
    }


    fn destroy( &mut self ) {
        if !self.destroyed {
            self.destroyed = true;
            log( &self.shared, "engine.destroy" );
        }
    }
}


pub struct FakeMix {
    shared: SharedRef,
    destroyed: bool,
}


impl OutputMix for FakeMix {
    fn realize( &mut self ) -> Result<(), EngineError> {
        check( &self.shared, FailPoint::RealizeMix )?;
        log( &self.shared, "mix.realize" );
        Ok(())
    }


    fn destroy( &mut self ) {
        if !self.destroyed {
            self.destroyed = true;
            log( &self.shared, "mix.destroy" );
        }
    }
}


pub struct FakePlayer {
    shared: SharedRef,
    voice: Rc<RefCell<FakeVoice>>,
}


impl FakePlayer {
    fn control( &self, point: FailPoint ) -> Result<FakeControl, EngineError> {
        check( &self.shared, point )?;
        if !self.voice.borrow().realized {
            return Err( EngineError::NotRealized );
        }
        Ok( FakeControl { shared: Rc::clone( &self.shared ), voice: Rc::clone( &self.voice ) } )
    }
}


impl PlayerObject for FakePlayer {
    fn realize( &mut self ) -> Result<(), EngineError> {
        check( &self.shared, FailPoint::RealizePlayer )?;
        self.voice.borrow_mut().realized = true;
        log( &self.shared, "player.realize" );
        Ok(())
    }


    fn play_control( &self ) -> Result<Box<dyn PlayControl>, EngineError> {
        Ok( Box::new( self.control( FailPoint::PlayControl )? ) )
    }


    fn seek_control( &self ) -> Result<Box<dyn SeekControl>, EngineError> {
        Ok( Box::new( self.control( FailPoint::SeekControl )? ) )
    }


    fn volume_control( &self ) -> Result<Box<dyn VolumeControl>, EngineError> {
        Ok( Box::new( self.control( FailPoint::VolumeControl )? ) )
    }


    fn destroy( &mut self ) {
        let mut voice = self.voice.borrow_mut();
        if !voice.destroyed {
            voice.destroyed = true;
            voice.callback = None;
            drop( voice );
            log( &self.shared, "player.destroy" );
        }
    }
}


struct FakeControl {
    shared: SharedRef,
    voice: Rc<RefCell<FakeVoice>>,
}


impl FakeControl {
    fn live( &self ) -> Result<std::cell::RefMut<'_, FakeVoice>, EngineError> {
        let voice = self.voice.borrow_mut();
        if voice.destroyed {
            return Err( EngineError::Destroyed );
        }
        Ok( voice )
    }
}


impl PlayControl for FakeControl {
    fn set_state( &self, state: PlayState ) -> Result<(), EngineError> {
        let mut voice = self.live()?;
        voice.state = state;
        voice.state_changes += 1;
        Ok(())
    }


    fn state( &self ) -> Result<PlayState, EngineError> {
        Ok( self.live()?.state )
    }


    fn duration( &self ) -> Result<Option<u32>, EngineError> {
        let voice = self.live()?;
        Ok( match voice.state {
            PlayState::Paused | PlayState::Playing => Some( FAKE_DURATION_MS ),
            PlayState::Stopped => None,
        })
    }


    fn position( &self ) -> Result<u32, EngineError> {
        Ok( self.live()?.position )
    }


    fn register_end_callback( &self, callback: EndCallback ) -> Result<(), EngineError> {
        check( &self.shared, FailPoint::RegisterCallback )?;
        self.live()?.callback = Some( Arc::new( callback ) );
        Ok(())
    }
}


impl SeekControl for FakeControl {
    fn set_position( &self, msec: u32, mode: SeekMode ) -> Result<(), EngineError> {
        let mut voice = self.live()?;
        voice.position = msec;
        voice.last_seek = Some(( msec, mode ));
        Ok(())
    }


    fn set_loop( &self, enabled: bool, start: u32, end: Option<u32> ) -> Result<(), EngineError> {
        self.live()?.loop_setting = Some(( enabled, start, end ));
        Ok(())
    }
}


impl VolumeControl for FakeControl {
    fn set_level( &self, millibels: i16 ) -> Result<(), EngineError> {
        self.live()?.level = millibels;
        Ok(())
    }


    fn level( &self ) -> Result<i16, EngineError> {
        Ok( self.live()?.level )
    }
}
