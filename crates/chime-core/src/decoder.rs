//! Audio decoding via Symphonia
//!
//! Sound effects are short, so players decode their whole source into an
//! interleaved f32 [`Clip`] when they are realized.

use std::sync::Arc;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{ Decoder as SymphoniaDecoder, DecoderOptions, CODEC_TYPE_NULL };
use symphonia::core::formats::{ FormatOptions, FormatReader };
use symphonia::core::io::{ MediaSourceStream, MediaSourceStreamOptions };
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use thiserror::Error;

use crate::source::AssetSource;


/// Errors that can occur during decoding.
#[derive( Debug, Error )]
pub enum DecoderError {
    #[error( "Unsupported format" )]
    UnsupportedFormat,

    #[error( "No audio tracks found" )]
    NoAudioTrack,

    #[error( "Decoder creation failed: {0}" )]
    DecoderCreation( String ),

    #[error( "Decode error: {0}" )]
    Decode( String ),
}


/// Fully decoded PCM for one source.
#[derive( Debug, Clone )]
pub struct Clip {
    /// Interleaved samples.
    pub samples: Arc<[f32]>,
    pub sample_rate: u32,
    pub channels: u16,
}


impl Clip {
    /// Number of frames (samples per channel).
    pub fn frames( &self ) -> u64 {
        if self.channels == 0 {
            return 0;
        }
        ( self.samples.len() / self.channels as usize ) as u64
    }


    /// Duration in milliseconds, rounded down.
    pub fn duration_ms( &self ) -> u32 {
        frames_to_ms( self.frames(), self.sample_rate )
    }
}


/// Converts a frame count at `sample_rate` to whole milliseconds.
pub fn frames_to_ms( frames: u64, sample_rate: u32 ) -> u32 {
    if sample_rate == 0 {
        return 0;
    }
    u32::try_from( frames * 1000 / sample_rate as u64 ).unwrap_or( u32::MAX )
}


/// Converts milliseconds to a frame count at `sample_rate`.
pub fn ms_to_frames( msec: u32, sample_rate: u32 ) -> u64 {
    msec as u64 * sample_rate as u64 / 1000
}


/// Audio decoder wrapper around Symphonia.
pub struct Decoder {
    format_reader: Box<dyn FormatReader>,
    decoder: Box<dyn SymphoniaDecoder>,
    track_id: u32,
    sample_rate: u32,
    channels: usize,
    sample_buf: Option<SampleBuffer<f32>>,
    n_frames: Option<u64>,
}


impl Decoder {
    /// Probes an asset and prepares its first audio track for decoding.
    pub fn open( source: &AssetSource ) -> Result<Self, DecoderError> {
        let mss = MediaSourceStream::new(
            Box::new( source.reader() ),
            MediaSourceStreamOptions::default(),
        );

        let mut hint = Hint::new();
        if let Some( mime ) = source.mime_type() {
            hint.mime_type( mime );
        }
        if let Some( ext ) = source.extension() {
            hint.with_extension( ext );
        }

        let probed = symphonia::default::get_probe()
            .format( &hint, mss, &FormatOptions::default(), &MetadataOptions::default() )
            .map_err( |_| DecoderError::UnsupportedFormat )?;

        let format_reader = probed.format;

        let track = format_reader
            .tracks()
            .iter()
            .find( |t| t.codec_params.codec != CODEC_TYPE_NULL )
            .ok_or( DecoderError::NoAudioTrack )?;

        let track_id = track.id;
        let codec_params = &track.codec_params;

        let sample_rate = codec_params.sample_rate.unwrap_or( 44100 );
        let channels = codec_params.channels.map( |c| c.count() ).unwrap_or( 2 );
        let n_frames = codec_params.n_frames;

        tracing::debug!(
            "Opened asset: {} Hz, {} channels, {:?} frames, mime {:?}",
            sample_rate,
            channels,
            n_frames,
            source.mime_type()
        );

        let decoder = symphonia::default::get_codecs()
            .make( codec_params, &DecoderOptions::default() )
            .map_err( |e| DecoderError::DecoderCreation( e.to_string() ) )?;

        Ok( Self {
            format_reader,
            decoder,
            track_id,
            sample_rate,
            channels,
            sample_buf: None,
            n_frames,
        })
    }


    /// Returns the sample rate of the audio.
    pub fn sample_rate( &self ) -> u32 {
        self.sample_rate
    }


    /// Returns the number of channels.
    pub fn channels( &self ) -> usize {
        self.channels
    }


    /// Decodes the next packet and returns interleaved f32 samples.
    ///
    /// Returns None when EOF is reached.
    pub fn decode_next( &mut self ) -> Result<Option<Vec<f32>>, DecoderError> {
        loop {
            let packet = match self.format_reader.next_packet() {
                Ok( packet ) => packet,
                Err( symphonia::core::errors::Error::IoError( ref e ) )
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    return Ok( None );
                }
                Err( e ) => {
                    return Err( DecoderError::Decode( e.to_string() ) );
                }
            };

            if packet.track_id() != self.track_id {
                continue;
            }

            let decoded = match self.decoder.decode( &packet ) {
                Ok( decoded ) => decoded,
                Err( symphonia::core::errors::Error::DecodeError( e ) ) => {
                    // Recoverable, skip the packet
                    tracing::debug!( "Skipping corrupt packet: {}", e );
                    continue;
                }
                Err( e ) => {
                    return Err( DecoderError::Decode( e.to_string() ) );
                }
            };

            let spec = *decoded.spec();
            let num_frames = decoded.frames();

            let needs_alloc = self.sample_buf
                .as_ref()
                .map_or( true, |buf| buf.capacity() < num_frames );
            if needs_alloc {
                self.sample_buf = Some( SampleBuffer::new( num_frames as u64, spec ) );
            }

            let Some( sample_buf ) = self.sample_buf.as_mut() else {
                continue;
            };
            sample_buf.copy_interleaved_ref( decoded );

            return Ok( Some( sample_buf.samples().to_vec() ) );
        }
    }


    /// Decodes every remaining packet into a [`Clip`].
    pub fn decode_all( mut self ) -> Result<Clip, DecoderError> {
        let capacity = self.n_frames.unwrap_or( 0 ) as usize * self.channels;
        let mut samples = Vec::with_capacity( capacity );

        while let Some( chunk ) = self.decode_next()? {
            samples.extend_from_slice( &chunk );
        }

        Ok( Clip {
            samples: samples.into(),
            sample_rate: self.sample_rate,
            channels: self.channels as u16,
        })
    }
}


/// Decodes a whole asset.
pub fn decode( source: &AssetSource ) -> Result<Clip, DecoderError> {
    Decoder::open( source )?.decode_all()
}


#[cfg( test )]
mod tests {
    use super::*;
    use crate::testing::wav_bytes;


    #[test]
    fn test_decode_wav_clip() {
        let source = AssetSource::from_bytes( wav_bytes( 8000, 1, 8000 ), Some( "audio/wav" ) );

        let decoder = Decoder::open( &source ).unwrap();
        assert_eq!( decoder.sample_rate(), 8000 );
        assert_eq!( decoder.channels(), 1 );

        let clip = decoder.decode_all().unwrap();
        assert_eq!( clip.frames(), 8000 );
        assert_eq!( clip.duration_ms(), 1000 );
    }


    #[test]
    fn test_decode_stereo_wav() {
        let source = AssetSource::from_bytes( wav_bytes( 16000, 2, 4000 ), None );
        let clip = decode( &source ).unwrap();
        assert_eq!( clip.channels, 2 );
        assert_eq!( clip.frames(), 4000 );
        assert_eq!( clip.duration_ms(), 250 );
    }


    #[test]
    fn test_garbage_is_unsupported() {
        let source = AssetSource::from_bytes( vec![ 0x42u8; 512 ], Some( "audio/wav" ) );
        assert!( matches!( Decoder::open( &source ), Err( DecoderError::UnsupportedFormat ) ) );
    }


    #[test]
    fn test_frame_conversions() {
        assert_eq!( frames_to_ms( 44100, 44100 ), 1000 );
        assert_eq!( ms_to_frames( 5000, 48000 ), 240000 );
        assert_eq!( frames_to_ms( 10, 0 ), 0 );
    }
}
