//! Null audio backend
//!
//! Decodes sources like a real engine but never opens a device. Time only
//! moves when [`NullBackend::advance`] is called, which makes end-of-data
//! delivery deterministic for headless runs and tests.

use std::sync::{ Arc, Mutex };

use crate::backend::voice::{ SharedVoice, VoiceControl, VoiceState };
use crate::decoder::{ self, ms_to_frames };
use crate::engine::{
    AudioEngine, Backend, Capability, EngineError, OutputMix, PlayControl, PlayerObject,
    SeekControl, VolumeControl,
};
use crate::source::AssetSource;


type Registry = Arc<Mutex<Vec<SharedVoice>>>;


/// Null backend (no sound output).
#[derive( Clone, Default )]
pub struct NullBackend {
    voices: Registry,
}


impl NullBackend {
    pub fn new() -> Self {
        Self::default()
    }


    /// Moves every playing voice forward by `msec` of virtual time,
    /// delivering end-of-data callbacks on the calling thread.
    pub fn advance( &self, msec: u32 ) {
        let callbacks: Vec<_> = {
            let voices = match self.voices.lock() {
                Ok( voices ) => voices,
                Err( _ ) => return,
            };
            voices
                .iter()
                .filter_map( |voice| {
                    let mut voice = voice.lock().ok()?;
                    let frames = ms_to_frames( msec, voice.clip().sample_rate );
                    voice.advance( frames, |_, _, _| {} )
                })
                .collect()
        };

        for callback in callbacks {
            callback();
        }
    }


    /// Number of realized, not yet destroyed players.
    pub fn live_players( &self ) -> usize {
        self.voices.lock().map( |v| v.len() ).unwrap_or( 0 )
    }
}


impl Backend for NullBackend {
    type Engine = NullEngine;


    fn create_engine( &self ) -> Result<NullEngine, EngineError> {
        Ok( NullEngine {
            voices: Arc::clone( &self.voices ),
            realized: false,
        })
    }
}


/// Engine object of the null backend.
pub struct NullEngine {
    voices: Registry,
    realized: bool,
}


impl AudioEngine for NullEngine {
    type Mix = NullMix;
    type Player = NullPlayer;


    fn realize( &mut self ) -> Result<(), EngineError> {
        self.realized = true;
        Ok(())
    }


    fn create_output_mix( &mut self ) -> Result<NullMix, EngineError> {
        if !self.realized {
            return Err( EngineError::NotRealized );
        }
        Ok( NullMix { realized: false } )
    }


    fn create_player(
        &mut self,
        source: &AssetSource,
        sink: &NullMix,
        _required: &[Capability],
    ) -> Result<NullPlayer, EngineError> {
        if !self.realized || !sink.realized {
            return Err( EngineError::NotRealized );
        }
        Ok( NullPlayer {
            source: source.clone(),
            voices: Arc::clone( &self.voices ),
            voice: None,
        })
    }


    fn destroy( &mut self ) {
        self.realized = false;
    }
}


/// Output mix of the null backend.
pub struct NullMix {
    realized: bool,
}


impl OutputMix for NullMix {
    fn realize( &mut self ) -> Result<(), EngineError> {
        self.realized = true;
        Ok(())
    }


    fn destroy( &mut self ) {
        self.realized = false;
    }
}


/// Player object of the null backend.
pub struct NullPlayer {
    source: AssetSource,
    voices: Registry,
    voice: Option<SharedVoice>,
}


impl NullPlayer {
    fn control( &self ) -> Result<VoiceControl, EngineError> {
        self.voice
            .as_ref()
            .map( |voice| VoiceControl::new( Arc::clone( voice ) ) )
            .ok_or( EngineError::NotRealized )
    }
}


impl PlayerObject for NullPlayer {
    fn realize( &mut self ) -> Result<(), EngineError> {
        let clip = decoder::decode( &self.source )
            .map_err( |e| EngineError::Content( e.to_string() ) )?;

        let voice = Arc::new( Mutex::new( VoiceState::new( clip ) ) );
        self.voices
            .lock()
            .map_err( |_| EngineError::Other( "voice registry poisoned".into() ) )?
            .push( Arc::clone( &voice ) );
        self.voice = Some( voice );
        Ok(())
    }


    fn play_control( &self ) -> Result<Box<dyn PlayControl>, EngineError> {
        Ok( Box::new( self.control()? ) )
    }


    fn seek_control( &self ) -> Result<Box<dyn SeekControl>, EngineError> {
        Ok( Box::new( self.control()? ) )
    }


    fn volume_control( &self ) -> Result<Box<dyn VolumeControl>, EngineError> {
        Ok( Box::new( self.control()? ) )
    }


    fn destroy( &mut self ) {
        if let Some( voice ) = self.voice.take() {
            if let Ok( mut voices ) = self.voices.lock() {
                voices.retain( |v| !Arc::ptr_eq( v, &voice ) );
            }
            if let Ok( mut voice ) = voice.lock() {
                voice.destroy();
            }
        }
    }
}


impl Drop for NullPlayer {
    fn drop( &mut self ) {
        self.destroy();
    }
}


#[cfg( test )]
mod tests {
    use super::*;
    use crate::engine::PlayState;
    use crate::testing::wav_bytes;


    fn realized_player( backend: &NullBackend ) -> ( NullEngine, NullMix, NullPlayer ) {
        let mut engine = backend.create_engine().unwrap();
        engine.realize().unwrap();
        let mut mix = engine.create_output_mix().unwrap();
        mix.realize().unwrap();

        let source = AssetSource::from_bytes( wav_bytes( 8000, 1, 4000 ), Some( "audio/wav" ) );
        let mut player = engine.create_player( &source, &mix, &[ Capability::Seek ] ).unwrap();
        player.realize().unwrap();
        ( engine, mix, player )
    }


    #[test]
    fn test_player_reports_duration() {
        let backend = NullBackend::new();
        let ( _engine, _mix, player ) = realized_player( &backend );
        let play = player.play_control().unwrap();
        assert_eq!( play.duration().unwrap(), Some( 500 ) );
        assert_eq!( backend.live_players(), 1 );
    }


    #[test]
    fn test_advance_moves_playing_voices_only() {
        let backend = NullBackend::new();
        let ( _engine, _mix, player ) = realized_player( &backend );
        let play = player.play_control().unwrap();

        backend.advance( 100 );
        assert_eq!( play.position().unwrap(), 0 );

        play.set_state( PlayState::Playing ).unwrap();
        backend.advance( 100 );
        assert_eq!( play.position().unwrap(), 100 );
    }


    #[test]
    fn test_destroy_unregisters_voice() {
        let backend = NullBackend::new();
        let ( _engine, _mix, mut player ) = realized_player( &backend );
        let play = player.play_control().unwrap();

        player.destroy();
        assert_eq!( backend.live_players(), 0 );
        assert!( play.state().is_err() );
        assert!( player.play_control().is_err() );
    }


    #[test]
    fn test_unrealized_mix_rejects_players() {
        let backend = NullBackend::new();
        let mut engine = backend.create_engine().unwrap();
        engine.realize().unwrap();
        let mix = engine.create_output_mix().unwrap();

        let source = AssetSource::from_bytes( wav_bytes( 8000, 1, 10 ), None );
        assert!( matches!(
            engine.create_player( &source, &mix, &[] ),
            Err( EngineError::NotRealized )
        ));
    }
}
