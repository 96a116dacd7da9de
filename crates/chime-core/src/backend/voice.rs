//! Per-player voice state shared by the bundled backends
//!
//! A voice is a decoded clip plus a play head. The engine side advances the
//! head (rendering samples or just moving a clock) while the control side is
//! handed out to [`SoundLib`](crate::SoundLib) as play, seek and volume
//! controls.

use std::sync::{ Arc, Mutex, MutexGuard };

use crate::decoder::{ frames_to_ms, ms_to_frames, Clip };
use crate::engine::{
    EndCallback, EngineError, PlayControl, PlayState, SeekControl, SeekMode, VolumeControl,
};


/// Voice state behind a lock, shared between controls and the render side.
pub type SharedVoice = Arc<Mutex<VoiceState>>;


/// Play head and settings of one voice.
pub struct VoiceState {
    clip: Clip,
    state: PlayState,
    /// Head position in frames
    cursor: u64,
    /// Head reached the end of data while playing; cleared by stop or seek
    at_end: bool,
    looping: bool,
    loop_start: u64,
    loop_end: Option<u64>,
    millibels: i16,
    on_end: Option<Arc<EndCallback>>,
    destroyed: bool,
}


impl VoiceState {
    pub fn new( clip: Clip ) -> Self {
        Self {
            clip,
            state: PlayState::Stopped,
            cursor: 0,
            at_end: false,
            looping: false,
            loop_start: 0,
            loop_end: None,
            millibels: 0,
            on_end: None,
            destroyed: false,
        }
    }


    pub fn state( &self ) -> PlayState {
        self.state
    }


    pub fn clip( &self ) -> &Clip {
        &self.clip
    }


    pub fn position_ms( &self ) -> u32 {
        frames_to_ms( self.cursor, self.clip.sample_rate )
    }


    /// Linear gain derived from the millibel level.
    pub fn gain( &self ) -> f32 {
        10f32.powf( self.millibels as f32 / 2000.0 )
    }


    /// Marks the voice dead; controls fail from now on.
    pub fn destroy( &mut self ) {
        self.destroyed = true;
        self.state = PlayState::Stopped;
        self.on_end = None;
    }


    fn set_state( &mut self, state: PlayState ) {
        match state {
            PlayState::Stopped => {
                self.cursor = 0;
                self.at_end = false;
            }
            PlayState::Playing if self.at_end => {
                self.cursor = 0;
                self.at_end = false;
            }
            _ => {}
        }
        self.state = state;
    }


    fn seek( &mut self, frame: u64 ) {
        self.cursor = frame.min( self.clip.frames() );
        self.at_end = false;
    }


    /// Frame at which the head wraps (looping) or stops.
    fn region_end( &self ) -> u64 {
        let total = self.clip.frames();
        if self.looping {
            self.loop_end.map_or( total, |end| end.min( total ) )
        } else {
            total
        }
    }


    /// Advances the head by up to `frames` frames.
    ///
    /// `emit( src_frame, dst_frame, count )` is called for every contiguous
    /// run of source frames consumed. Returns the end-of-data callback when
    /// the head reached the end during this pass; the caller invokes it once
    /// the lock is released.
    pub fn advance(
        &mut self,
        mut frames: u64,
        mut emit: impl FnMut( u64, u64, u64 ),
    ) -> Option<Arc<EndCallback>> {
        if self.destroyed || self.state != PlayState::Playing || self.at_end {
            return None;
        }

        let mut written = 0;
        while frames > 0 {
            let end = self.region_end();
            if self.cursor >= end {
                if self.looping && end > self.loop_start {
                    self.cursor = self.loop_start;
                    continue;
                }
                break;
            }

            let run = frames.min( end - self.cursor );
            emit( self.cursor, written, run );
            self.cursor += run;
            written += run;
            frames -= run;
        }

        if !self.looping && self.cursor >= self.clip.frames() {
            self.at_end = true;
            return self.on_end.clone();
        }
        None
    }


    /// Mixes up to `out.len() / channels` frames additively into `out`.
    /// The clip must already be interleaved with `channels` channels.
    pub fn mix_into( &mut self, out: &mut [f32], channels: usize ) -> Option<Arc<EndCallback>> {
        if channels == 0 || self.clip.channels as usize != channels {
            return None;
        }

        let gain = self.gain();
        let samples = Arc::clone( &self.clip.samples );
        let frames = ( out.len() / channels ) as u64;

        self.advance( frames, |src, dst, count| {
            let src = src as usize * channels;
            let dst = dst as usize * channels;
            let len = count as usize * channels;
            for ( o, s ) in out[ dst..dst + len ].iter_mut().zip( &samples[ src..src + len ] ) {
                *o += s * gain;
            }
        })
    }
}


/// Locks a voice, reporting a destroyed voice as an error.
fn lock( voice: &SharedVoice ) -> Result<MutexGuard<'_, VoiceState>, EngineError> {
    let guard = voice
        .lock()
        .map_err( |_| EngineError::Other( "voice lock poisoned".into() ) )?;
    if guard.destroyed {
        return Err( EngineError::Destroyed );
    }
    Ok( guard )
}


/// Play, seek and volume control over a shared voice.
#[derive( Clone )]
pub struct VoiceControl {
    voice: SharedVoice,
}


impl VoiceControl {
    pub fn new( voice: SharedVoice ) -> Self {
        Self { voice }
    }
}


impl PlayControl for VoiceControl {
    fn set_state( &self, state: PlayState ) -> Result<(), EngineError> {
        lock( &self.voice )?.set_state( state );
        Ok(())
    }


    fn state( &self ) -> Result<PlayState, EngineError> {
        Ok( lock( &self.voice )?.state )
    }


    fn duration( &self ) -> Result<Option<u32>, EngineError> {
        Ok( Some( lock( &self.voice )?.clip.duration_ms() ) )
    }


    fn position( &self ) -> Result<u32, EngineError> {
        Ok( lock( &self.voice )?.position_ms() )
    }


    fn register_end_callback( &self, callback: EndCallback ) -> Result<(), EngineError> {
        lock( &self.voice )?.on_end = Some( Arc::new( callback ) );
        Ok(())
    }
}


impl SeekControl for VoiceControl {
    fn set_position( &self, msec: u32, _mode: SeekMode ) -> Result<(), EngineError> {
        // Decoded clips are in memory, so fast and accurate seeks coincide
        let mut voice = lock( &self.voice )?;
        let frame = ms_to_frames( msec, voice.clip.sample_rate );
        voice.seek( frame );
        Ok(())
    }


    fn set_loop( &self, enabled: bool, start: u32, end: Option<u32> ) -> Result<(), EngineError> {
        let mut voice = lock( &self.voice )?;
        let rate = voice.clip.sample_rate;
        voice.looping = enabled;
        voice.loop_start = ms_to_frames( start, rate );
        voice.loop_end = end.map( |end| ms_to_frames( end, rate ) );
        if enabled {
            voice.at_end = false;
        }
        Ok(())
    }
}


impl VolumeControl for VoiceControl {
    fn set_level( &self, millibels: i16 ) -> Result<(), EngineError> {
        lock( &self.voice )?.millibels = millibels;
        Ok(())
    }


    fn level( &self ) -> Result<i16, EngineError> {
        Ok( lock( &self.voice )?.millibels )
    }
}


#[cfg( test )]
mod tests {
    use super::*;
    use std::sync::atomic::{ AtomicUsize, Ordering };


    fn clip( frames: usize ) -> Clip {
        Clip {
            samples: vec![ 1.0f32; frames ].into(),
            sample_rate: 1000,
            channels: 1,
        }
    }


    fn counting_voice( frames: usize ) -> ( SharedVoice, VoiceControl, Arc<AtomicUsize> ) {
        let voice = Arc::new( Mutex::new( VoiceState::new( clip( frames ) ) ) );
        let control = VoiceControl::new( Arc::clone( &voice ) );
        let ends = Arc::new( AtomicUsize::new( 0 ) );
        let counter = Arc::clone( &ends );
        control
            .register_end_callback( Box::new( move || {
                counter.fetch_add( 1, Ordering::SeqCst );
            }))
            .unwrap();
        ( voice, control, ends )
    }


    fn run( voice: &SharedVoice, frames: u64 ) {
        let callback = voice.lock().unwrap().advance( frames, |_, _, _| {} );
        if let Some( callback ) = callback {
            callback();
        }
    }


    #[test]
    fn test_end_of_data_fires_once() {
        let ( voice, control, ends ) = counting_voice( 100 );
        control.set_state( PlayState::Playing ).unwrap();

        run( &voice, 60 );
        assert_eq!( ends.load( Ordering::SeqCst ), 0 );
        assert_eq!( control.position().unwrap(), 60 );

        run( &voice, 60 );
        run( &voice, 60 );
        assert_eq!( ends.load( Ordering::SeqCst ), 1 );
        // The engine leaves the state alone; stopping is the library's job
        assert_eq!( control.state().unwrap(), PlayState::Playing );
    }


    #[test]
    fn test_loop_wraps_without_end_event() {
        let ( voice, control, ends ) = counting_voice( 100 );
        control.set_loop( true, 0, None ).unwrap();
        control.set_state( PlayState::Playing ).unwrap();

        run( &voice, 250 );
        assert_eq!( ends.load( Ordering::SeqCst ), 0 );
        assert_eq!( control.position().unwrap(), 50 );
    }


    #[test]
    fn test_stop_rewinds_and_pause_holds() {
        let ( voice, control, _ ) = counting_voice( 100 );
        control.set_state( PlayState::Playing ).unwrap();
        run( &voice, 30 );

        control.set_state( PlayState::Paused ).unwrap();
        run( &voice, 30 );
        assert_eq!( control.position().unwrap(), 30 );

        control.set_state( PlayState::Stopped ).unwrap();
        assert_eq!( control.position().unwrap(), 0 );
    }


    #[test]
    fn test_mix_applies_gain() {
        let ( voice, control, _ ) = counting_voice( 4 );
        control.set_level( -600 ).unwrap();
        control.set_state( PlayState::Playing ).unwrap();

        let mut out = [ 0.0f32; 4 ];
        let ended = voice.lock().unwrap().mix_into( &mut out, 1 );
        assert!( ended.is_some() );
        // -6 dB is roughly half amplitude
        assert!( ( out[ 0 ] - 0.501 ).abs() < 0.01 );
    }


    #[test]
    fn test_destroyed_voice_rejects_controls() {
        let ( voice, control, _ ) = counting_voice( 10 );
        voice.lock().unwrap().destroy();
        assert!( matches!( control.state(), Err( EngineError::Destroyed ) ) );
    }
}
