//! Audio output via cpal
//!
//! The engine is the default cpal host and output device. The output mix is a
//! single f32 stream whose callback sums every playing voice. Players decode
//! their clip up front and convert it to the device's rate and channel
//! layout, so the audio callback only copies samples.

use std::sync::{ Arc, Mutex };

use cpal::traits::{ DeviceTrait, HostTrait, StreamTrait };
use rubato::{ FastFixedOut, PolynomialDegree, Resampler };

use crate::backend::voice::{ SharedVoice, VoiceControl, VoiceState };
use crate::decoder::{ self, Clip };
use crate::engine::{
    AudioEngine, Backend, Capability, EngineError, OutputMix, PlayControl, PlayerObject,
    SeekControl, VolumeControl,
};
use crate::source::AssetSource;


type Registry = Arc<Mutex<Vec<SharedVoice>>>;


/// Resampler output chunk size in frames.
const RESAMPLE_CHUNK: usize = 1024;


/// Backend playing through the system's default output device.
#[derive( Debug, Clone, Copy, Default )]
pub struct CpalBackend;


impl CpalBackend {
    pub fn new() -> Self {
        Self
    }
}


impl Backend for CpalBackend {
    type Engine = CpalEngine;


    fn create_engine( &self ) -> Result<CpalEngine, EngineError> {
        Ok( CpalEngine {
            host: cpal::default_host(),
            device: None,
            config: None,
        })
    }
}


/// Engine object wrapping a cpal host and its default output device.
pub struct CpalEngine {
    host: cpal::Host,
    device: Option<cpal::Device>,
    config: Option<cpal::StreamConfig>,
}


impl CpalEngine {
    fn output( &self ) -> Result<( &cpal::Device, &cpal::StreamConfig ), EngineError> {
        match ( self.device.as_ref(), self.config.as_ref() ) {
            ( Some( device ), Some( config ) ) => Ok(( device, config )),
            _ => Err( EngineError::NotRealized ),
        }
    }
}


impl AudioEngine for CpalEngine {
    type Mix = CpalMix;
    type Player = CpalPlayer;


    fn realize( &mut self ) -> Result<(), EngineError> {
        let device = self.host
            .default_output_device()
            .ok_or( EngineError::NoDevice )?;

        tracing::info!( "Using output device: {:?}", device.name() );

        let config = device
            .default_output_config()
            .map_err( |e| EngineError::Stream( e.to_string() ) )?
            .config();

        tracing::info!(
            "Audio output config: {} Hz, {} channels",
            config.sample_rate.0,
            config.channels
        );

        self.device = Some( device );
        self.config = Some( config );
        Ok(())
    }


    fn create_output_mix( &mut self ) -> Result<CpalMix, EngineError> {
        let ( device, config ) = self.output()?;
        Ok( CpalMix {
            device: device.clone(),
            config: config.clone(),
            voices: Registry::default(),
            stream: None,
        })
    }


    fn create_player(
        &mut self,
        source: &AssetSource,
        sink: &CpalMix,
        _required: &[Capability],
    ) -> Result<CpalPlayer, EngineError> {
        // Every voice supports seek and volume, nothing to negotiate
        if sink.stream.is_none() {
            return Err( EngineError::NotRealized );
        }
        Ok( CpalPlayer {
            source: source.clone(),
            sample_rate: sink.config.sample_rate.0,
            channels: sink.config.channels,
            voices: Arc::clone( &sink.voices ),
            voice: None,
        })
    }


    fn destroy( &mut self ) {
        self.config = None;
        self.device = None;
    }
}


/// Output mix: one running output stream summing all voices.
pub struct CpalMix {
    device: cpal::Device,
    config: cpal::StreamConfig,
    voices: Registry,
    stream: Option<cpal::Stream>,
}


impl OutputMix for CpalMix {
    fn realize( &mut self ) -> Result<(), EngineError> {
        let voices = Arc::clone( &self.voices );
        let channels = self.config.channels as usize;

        let stream = self.device
            .build_output_stream(
                &self.config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    render( &voices, data, channels );
                },
                |err| {
                    tracing::error!( "Audio output error: {}", err );
                },
                None,
            )
            .map_err( |e| EngineError::Stream( e.to_string() ) )?;

        stream.play().map_err( |e| EngineError::Stream( e.to_string() ) )?;

        self.stream = Some( stream );
        Ok(())
    }


    fn destroy( &mut self ) {
        // Dropping the stream stops the device callback
        self.stream = None;
        if let Ok( mut voices ) = self.voices.lock() {
            voices.clear();
        }
    }
}


/// Audio callback body: silence, then every playing voice added on top.
fn render( voices: &Registry, data: &mut [f32], channels: usize ) {
    data.fill( 0.0 );

    let callbacks: Vec<_> = match voices.lock() {
        Ok( voices ) => voices
            .iter()
            .filter_map( |voice| voice.lock().ok()?.mix_into( data, channels ) )
            .collect(),
        Err( _ ) => return,
    };

    for sample in data.iter_mut() {
        *sample = sample.clamp( -1.0, 1.0 );
    }

    for callback in callbacks {
        callback();
    }
}


/// Player object: a decoded clip converted to the mix format.
pub struct CpalPlayer {
    source: AssetSource,
    sample_rate: u32,
    channels: u16,
    voices: Registry,
    voice: Option<SharedVoice>,
}


impl CpalPlayer {
    fn control( &self ) -> Result<VoiceControl, EngineError> {
        self.voice
            .as_ref()
            .map( |voice| VoiceControl::new( Arc::clone( voice ) ) )
            .ok_or( EngineError::NotRealized )
    }
}


impl PlayerObject for CpalPlayer {
    fn realize( &mut self ) -> Result<(), EngineError> {
        let clip = decoder::decode( &self.source )
            .map_err( |e| EngineError::Content( e.to_string() ) )?;
        let clip = convert( clip, self.sample_rate, self.channels )?;

        tracing::debug!(
            "Realized player: {} frames at {} Hz",
            clip.frames(),
            clip.sample_rate
        );

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


impl Drop for CpalPlayer {
    fn drop( &mut self ) {
        self.destroy();
    }
}


/// Converts a clip to `sample_rate` and `channels`.
pub fn convert( clip: Clip, sample_rate: u32, channels: u16 ) -> Result<Clip, EngineError> {
    let clip = if clip.sample_rate != sample_rate {
        tracing::debug!( "Resampling: {} Hz → {} Hz", clip.sample_rate, sample_rate );
        resample( &clip, sample_rate )?
    } else {
        clip
    };

    if clip.channels == channels {
        return Ok( clip );
    }

    Ok( Clip {
        samples: remix( &clip.samples, clip.channels as usize, channels as usize ).into(),
        sample_rate: clip.sample_rate,
        channels,
    })
}


/// Converts interleaved samples between channel layouts.
fn remix( samples: &[f32], src_ch: usize, out_ch: usize ) -> Vec<f32> {
    if src_ch == 0 || out_ch == 0 {
        return Vec::new();
    }

    let frames = samples.len() / src_ch;
    let mut out = Vec::with_capacity( frames * out_ch );

    for frame in samples.chunks_exact( src_ch ) {
        if src_ch == 2 && out_ch == 1 {
            // Stereo to mono: mix down
            out.push( ( frame[ 0 ] + frame[ 1 ] ) * 0.5 );
            continue;
        }
        for ch in 0..out_ch {
            // Duplicate the last channel if the output has more channels
            out.push( frame[ ch.min( src_ch - 1 ) ] );
        }
    }

    out
}


/// Frame count of `frames` at `src_rate` once converted to `target_rate`, rounded.
fn expected_frames( frames: u64, src_rate: u32, target_rate: u32 ) -> usize {
    let scaled = ( frames as u128 * target_rate as u128 * 2 + src_rate as u128 ) / ( src_rate as u128 * 2 );
    usize::try_from( scaled ).unwrap_or( usize::MAX )
}


/// Resamples a whole clip with rubato.
fn resample( clip: &Clip, target_rate: u32 ) -> Result<Clip, EngineError> {
    let channels = clip.channels as usize;
    if channels == 0 || clip.sample_rate == 0 {
        return Err( EngineError::Content( "clip has no channels or sample rate".into() ) );
    }

    let mut resampler = FastFixedOut::<f32>::new(
        target_rate as f64 / clip.sample_rate as f64,
        2.0,
        PolynomialDegree::Cubic,
        RESAMPLE_CHUNK,
        channels,
    ).map_err( |e| EngineError::Other( format!( "Failed to create resampler: {}", e ) ) )?;

    // Planar copy of the input
    let mut input: Vec<Vec<f32>> = ( 0..channels ).map( |_| Vec::new() ).collect();
    for frame in clip.samples.chunks_exact( channels ) {
        for ( ch, sample ) in frame.iter().enumerate() {
            input[ ch ].push( *sample );
        }
    }

    let mut planar: Vec<Vec<f32>> = ( 0..channels ).map( |_| Vec::new() ).collect();
    let mut append = |chunk: Vec<Vec<f32>>| {
        for ( out, ch ) in planar.iter_mut().zip( chunk ) {
            out.extend( ch );
        }
    };

    let mut offset = 0;
    while input[ 0 ].len() - offset >= resampler.input_frames_next() {
        let needed = resampler.input_frames_next();
        let chunk: Vec<&[f32]> = input.iter().map( |ch| &ch[ offset..offset + needed ] ).collect();
        let resampled = resampler
            .process( &chunk, None )
            .map_err( |e| EngineError::Other( format!( "Resample error: {}", e ) ) )?;
        append( resampled );
        offset += needed;
    }

    if offset < input[ 0 ].len() {
        let rest: Vec<&[f32]> = input.iter().map( |ch| &ch[ offset.. ] ).collect();
        let resampled = resampler
            .process_partial( Some( rest.as_slice() ), None )
            .map_err( |e| EngineError::Other( format!( "Final resample error: {}", e ) ) )?;
        append( resampled );
    }

    // Flush the resampler's internal delay
    let tail = resampler
        .process_partial( None::<&[Vec<f32>]>, None )
        .map_err( |e| EngineError::Other( format!( "Final resample error: {}", e ) ) )?;
    append( tail );

    // Drop the leading filter delay and the zero padding of the last chunks
    let delay = resampler.output_delay();
    let frames = expected_frames( clip.frames(), clip.sample_rate, target_rate );
    for ch in planar.iter_mut() {
        ch.drain( ..delay.min( ch.len() ) );
        ch.resize( frames, 0.0 );
    }

    let mut samples = Vec::with_capacity( frames * channels );
    for f in 0..frames {
        for ch in &planar {
            samples.push( ch[ f ] );
        }
    }

    Ok( Clip {
        samples: samples.into(),
        sample_rate: target_rate,
        channels: clip.channels,
    })
}


#[cfg( test )]
mod tests {
    use super::*;


    fn ramp( frames: usize, channels: u16, sample_rate: u32 ) -> Clip {
        let samples: Vec<f32> = ( 0..frames * channels as usize )
            .map( |i| ( i % 100 ) as f32 / 100.0 )
            .collect();
        Clip { samples: samples.into(), sample_rate, channels }
    }


    #[test]
    fn test_remix_mono_to_stereo() {
        let out = remix( &[ 0.1, 0.2 ], 1, 2 );
        assert_eq!( out, vec![ 0.1, 0.1, 0.2, 0.2 ] );
    }


    #[test]
    fn test_remix_stereo_to_mono() {
        let out = remix( &[ 0.2, 0.4, 1.0, 0.0 ], 2, 1 );
        assert_eq!( out.len(), 2 );
        assert!( ( out[ 0 ] - 0.3 ).abs() < 1e-6 );
        assert!( ( out[ 1 ] - 0.5 ).abs() < 1e-6 );
    }


    #[test]
    fn test_convert_keeps_matching_clip() {
        let clip = ramp( 100, 2, 48000 );
        let converted = convert( clip.clone(), 48000, 2 ).unwrap();
        assert_eq!( converted.samples.len(), clip.samples.len() );
    }


    #[test]
    fn test_resample_scales_length() {
        let clip = ramp( 22050, 1, 22050 );
        let converted = convert( clip.clone(), 44100, 1 ).unwrap();
        assert_eq!( converted.sample_rate, 44100 );
        assert_eq!( converted.frames(), 44100 );
        assert!( converted.duration_ms().abs_diff( clip.duration_ms() ) <= 1 );
    }


    #[test]
    fn test_resample_keeps_short_clip_duration() {
        // 100 ms at 44.1 kHz is shorter than one resampler chunk
        let clip = ramp( 4410, 2, 44100 );
        let converted = convert( clip.clone(), 48000, 2 ).unwrap();
        assert_eq!( converted.frames(), 4800 );
        assert_eq!( converted.samples.len(), 4800 * 2 );
        assert!( converted.duration_ms().abs_diff( clip.duration_ms() ) <= 1 );
    }


    #[test]
    fn test_resample_preserves_level() {
        // A constant signal stays at its level from the start of the clip
        let clip = Clip { samples: vec![ 0.5; 8000 ].into(), sample_rate: 8000, channels: 1 };
        let converted = convert( clip, 48000, 1 ).unwrap();
        assert_eq!( converted.frames(), 48000 );
        let middle = converted.samples[ 24000 ];
        assert!( ( middle - 0.5 ).abs() < 0.05, "got {}", middle );
        assert!( converted.samples[ 64 ] > 0.25, "got {}", converted.samples[ 64 ] );
    }


    #[test]
    fn test_expected_frames_rounds() {
        assert_eq!( expected_frames( 4410, 44100, 48000 ), 4800 );
        assert_eq!( expected_frames( 1, 3, 2 ), 1 );
        assert_eq!( expected_frames( 0, 44100, 48000 ), 0 );
    }
}
