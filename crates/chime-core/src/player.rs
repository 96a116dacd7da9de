//! Player resources and handles
//!
//! A [`PlayerResource`] owns one native player object together with the
//! controls retrieved from it. Dropping the resource releases the controls
//! and destroys the native object, so a load that fails halfway cleans up
//! after itself.

use std::cell::Cell;
use std::fmt;

use crate::engine::{ PlayControl, PlayerObject, SeekControl, VolumeControl };


/// Attenuation used for gains too small to take the logarithm of.
pub const SILENCE_DB: f32 = -96.0;


/// Gains below this are treated as silence.
pub const MIN_GAIN: f32 = 0.01;


/// Converts a normalized linear gain to millibels (hundredths of a decibel).
///
/// Gains below [`MIN_GAIN`] clamp to [`SILENCE_DB`], i.e. exactly -9600.
/// The fractional part is truncated toward zero.
pub fn gain_to_millibels( gain: f32 ) -> i16 {
    let atten = if gain < MIN_GAIN { SILENCE_DB } else { 20.0 * gain.log10() };
    ( atten * 100.0 ) as i16
}


/// Identifies a loaded sound.
///
/// Handles are 1-based positions in the player table. [`Handle::NONE`] (0)
/// never refers to a sound.
#[derive( Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default )]
pub struct Handle( u32 );


impl Handle {
    /// The reserved "no resource" handle.
    pub const NONE: Handle = Handle( 0 );


    pub const fn new( raw: u32 ) -> Self {
        Self( raw )
    }


    pub const fn get( self ) -> u32 {
        self.0
    }


    pub const fn is_none( self ) -> bool {
        self.0 == 0
    }


    /// Table index for this handle, `None` for [`Handle::NONE`].
    pub fn index( self ) -> Option<usize> {
        ( self.0 as usize ).checked_sub( 1 )
    }


    /// Handle for a table index.
    pub(crate) fn from_index( index: usize ) -> Self {
        Self( u32::try_from( index + 1 ).unwrap_or( u32::MAX ) )
    }
}


impl From<u32> for Handle {
    fn from( raw: u32 ) -> Self {
        Self( raw )
    }
}


impl fmt::Display for Handle {
    fn fmt( &self, f: &mut fmt::Formatter<'_> ) -> fmt::Result {
        write!( f, "#{}", self.0 )
    }
}


/// One loaded sound: the native object plus whichever controls it exposes.
pub struct PlayerResource<P: PlayerObject> {
    object: P,
    pub(crate) play: Option<Box<dyn PlayControl>>,
    pub(crate) seek: Option<Box<dyn SeekControl>>,
    pub(crate) volume: Option<Box<dyn VolumeControl>>,
    /// Set through the seek control; suppresses the end-of-data auto-stop
    pub(crate) looping: Cell<bool>,
}


impl<P: PlayerObject> PlayerResource<P> {
    /// Takes ownership of an unrealized native object.
    pub fn new( object: P ) -> Self {
        Self {
            object,
            play: None,
            seek: None,
            volume: None,
            looping: Cell::new( false ),
        }
    }


    pub fn object( &self ) -> &P {
        &self.object
    }


    pub fn object_mut( &mut self ) -> &mut P {
        &mut self.object
    }
}


impl<P: PlayerObject> Drop for PlayerResource<P> {
    fn drop( &mut self ) {
        // Controls go first; they are invalid once the object is destroyed
        self.play = None;
        self.seek = None;
        self.volume = None;
        self.object.destroy();
    }
}


#[cfg( test )]
mod tests {
    use super::*;


    #[test]
    fn test_silence_clamp() {
        assert_eq!( gain_to_millibels( 0.0 ), -9600 );
        assert_eq!( gain_to_millibels( 0.009 ), -9600 );
        assert_eq!( gain_to_millibels( -1.0 ), -9600 );
    }


    #[test]
    fn test_unity_and_half_gain() {
        assert_eq!( gain_to_millibels( 1.0 ), 0 );
        // 20 * log10(0.5) = -6.0206 dB, truncated toward zero
        assert_eq!( gain_to_millibels( 0.5 ), -602 );
        assert!( ( gain_to_millibels( MIN_GAIN ) + 4000 ).abs() <= 1 );
    }


    #[test]
    fn test_attenuation_is_monotonic() {
        let mut previous = gain_to_millibels( MIN_GAIN );
        for step in 1..=99 {
            let gain = MIN_GAIN + step as f32 * 0.01;
            let level = gain_to_millibels( gain );
            assert!( level >= previous, "gain {} gave {} after {}", gain, level, previous );
            previous = level;
        }
    }


    #[test]
    fn test_handle_indexing() {
        assert_eq!( Handle::NONE.index(), None );
        assert!( Handle::NONE.is_none() );
        assert_eq!( Handle::new( 1 ).index(), Some( 0 ) );
        assert_eq!( Handle::from_index( 2 ), Handle::new( 3 ) );
        assert_eq!( Handle::from( 7 ).to_string(), "#7" );
    }
}
