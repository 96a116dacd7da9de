//! Application settings management
//!
//! Persistent defaults for the soundboard, stored as JSON in the user's
//! config directory.

use std::fs;
use std::path::PathBuf;

use serde::{ Deserialize, Serialize };


/// Log filter used when neither `RUST_LOG` nor the settings name one.
pub const DEFAULT_LOG_FILTER: &str = "chime=info";


/// Application settings.
#[derive( Debug, Clone, PartialEq, Serialize, Deserialize )]
#[serde( default )]
pub struct Settings {
    /// Gain applied to every sound right after it loads
    pub default_gain: f32,

    /// Loop sounds as soon as they load
    pub loop_by_default: bool,

    /// Use the virtual-clock backend instead of the audio device
    pub headless: bool,

    /// `tracing` filter directive
    pub log_filter: String,
}


impl Default for Settings {
    fn default() -> Self {
        Self {
            default_gain: 1.0,
            loop_by_default: false,
            headless: false,
            log_filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}


impl Settings {
    /// Returns the path to the settings file.
    fn settings_path() -> Option<PathBuf> {
        dirs::config_dir().map( |p| p.join( "chime" ).join( "settings.json" ) )
    }


    /// Loads settings from disk, or returns defaults if not found.
    pub fn load() -> Self {
        let path = match Self::settings_path() {
            Some( p ) => p,
            None => return Self::default(),
        };

        if !path.exists() {
            return Self::default();
        }

        match fs::read_to_string( &path ) {
            Ok( contents ) => Self::from_json( &contents ),
            Err( e ) => {
                tracing::warn!( "Failed to read settings: {}", e );
                Self::default()
            }
        }
    }


    /// Parses settings, falling back to defaults on malformed input.
    pub fn from_json( contents: &str ) -> Self {
        match serde_json::from_str::<Settings>( contents ) {
            Ok( settings ) => settings.sanitized(),
            Err( e ) => {
                tracing::warn!( "Ignoring malformed settings: {}", e );
                Self::default()
            }
        }
    }


    /// Clamps out-of-range values.
    fn sanitized( mut self ) -> Self {
        if !self.default_gain.is_finite() {
            self.default_gain = 1.0;
        }
        self.default_gain = self.default_gain.clamp( 0.0, 1.0 );
        if self.log_filter.trim().is_empty() {
            self.log_filter = DEFAULT_LOG_FILTER.to_string();
        }
        self
    }


    /// Writes the defaults out so they can be edited, unless a file exists.
    pub fn save_if_missing( &self ) {
        if Self::settings_path().is_some_and( |p| !p.exists() ) {
            self.save();
        }
    }


    /// Saves settings to disk.
    pub fn save( &self ) {
        let path = match Self::settings_path() {
            Some( p ) => p,
            None => return,
        };

        // Create parent directory if needed
        if let Some( parent ) = path.parent() {
            if !parent.exists() {
                if let Err( e ) = fs::create_dir_all( parent ) {
                    tracing::warn!( "Failed to create settings directory: {}", e );
                    return;
                }
            }
        }

        match serde_json::to_string_pretty( self ) {
            Ok( json ) => {
                if let Err( e ) = fs::write( &path, json ) {
                    tracing::warn!( "Failed to save settings: {}", e );
                }
            }
            Err( e ) => {
                tracing::warn!( "Failed to serialize settings: {}", e );
            }
        }
    }
}


#[cfg( test )]
mod tests {
    use super::*;


    #[test]
    fn test_partial_settings_use_defaults() {
        let settings = Settings::from_json( r#"{ "loop_by_default": true }"# );
        assert!( settings.loop_by_default );
        assert_eq!( settings.default_gain, 1.0 );
        assert_eq!( settings.log_filter, DEFAULT_LOG_FILTER );
    }


    #[test]
    fn test_malformed_settings_fall_back() {
        assert_eq!( Settings::from_json( "not json" ), Settings::default() );
    }


    #[test]
    fn test_gain_is_clamped() {
        let settings = Settings::from_json( r#"{ "default_gain": 4.5, "log_filter": "" }"# );
        assert_eq!( settings.default_gain, 1.0 );
        assert_eq!( settings.log_filter, DEFAULT_LOG_FILTER );
    }
}
