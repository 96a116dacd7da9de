//! Slash command parsing.
//!
//! Provides the command language of the interactive soundboard. Commands
//! are parsed from user input and executed against a
//! [`SoundLib`](crate::SoundLib) by the front end.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use crate::player::Handle;


/// Errors that can occur during command parsing.
#[derive( Debug, Error )]
pub enum CommandError {
    #[error( "Unknown command: {0}" )]
    Unknown( String ),

    #[error( "Invalid argument: {0}" )]
    InvalidArgument( String ),

    #[error( "Missing argument: {0}" )]
    MissingArgument( String ),
}


/// Parsed slash command.
#[derive( Debug, Clone, PartialEq )]
pub enum Command {
    // Asset commands
    Load { path: PathBuf },
    List,

    // Playback commands
    Play { handle: Handle },
    Pause { handle: Handle },
    Stop { handle: Handle },
    StopAll,
    Seek { handle: Handle, position: Duration },
    Loop { handle: Handle, mode: Option<Toggle> },
    Volume { handle: Handle, level: u32 },

    // Queries
    Length { handle: Handle },
    Position { handle: Handle },

    Help,
    Quit,
}


/// On/off argument for parsing.
#[derive( Debug, Clone, Copy, PartialEq, Eq )]
pub enum Toggle {
    On,
    Off,
}


impl Toggle {
    pub fn enabled( self ) -> bool {
        self == Toggle::On
    }
}


impl FromStr for Toggle {
    type Err = CommandError;


    fn from_str( s: &str ) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "on" | "1" | "yes" | "true" => Ok( Toggle::On ),
            "off" | "0" | "no" | "false" => Ok( Toggle::Off ),
            _ => Err( CommandError::InvalidArgument(
                format!( "Invalid toggle: '{}'. Use 'on' or 'off'", s )
            )),
        }
    }
}


impl Command {
    /// Parses a command string (without the leading `/`).
    ///
    /// @param input - The command string to parse
    ///
    /// @returns The parsed command or an error
    pub fn parse( input: &str ) -> Result<Self, CommandError> {
        let input = input.trim();
        let mut parts = input.splitn( 2, ' ' );
        let cmd = parts.next().unwrap_or( "" ).to_lowercase();
        let args = parts.next().map( |s| s.trim() ).filter( |s| !s.is_empty() );

        match cmd.as_str() {
            "load" | "l" | "add" => {
                let path = args
                    .ok_or_else( || CommandError::MissingArgument( "path".into() ) )?;
                Ok( Command::Load { path: PathBuf::from( path ) } )
            }
            "list" | "ls" => Ok( Command::List ),

            "play" | "p" => Ok( Command::Play { handle: handle_arg( args )? } ),
            "pause" | "pa" => Ok( Command::Pause { handle: handle_arg( args )? } ),
            "stop" | "st" => Ok( Command::Stop { handle: handle_arg( args )? } ),
            "stopall" | "sa" | "silence" => Ok( Command::StopAll ),
            "seek" | "sk" => {
                let ( handle, rest ) = split_handle( args )?;
                let time_str = rest
                    .ok_or_else( || CommandError::MissingArgument( "time position".into() ) )?;
                let position = parse_time( time_str )?;
                Ok( Command::Seek { handle, position } )
            }
            "loop" | "lp" => {
                let ( handle, rest ) = split_handle( args )?;
                let mode = rest.map( |s| s.parse() ).transpose()?;
                Ok( Command::Loop { handle, mode } )
            }
            "vol" | "volume" => {
                let ( handle, rest ) = split_handle( args )?;
                let level_str = rest
                    .ok_or_else( || CommandError::MissingArgument( "volume level".into() ) )?;
                let level: u32 = level_str.parse()
                    .map_err( |_| CommandError::InvalidArgument( format!( "Invalid volume: {}", level_str ) ) )?;
                if level > 100 {
                    return Err( CommandError::InvalidArgument(
                        format!( "Volume must be 0-100, got {}", level )
                    ));
                }
                Ok( Command::Volume { handle, level } )
            }

            "length" | "len" => Ok( Command::Length { handle: handle_arg( args )? } ),
            "pos" | "position" => Ok( Command::Position { handle: handle_arg( args )? } ),

            "help" | "h" | "?" => Ok( Command::Help ),
            "quit" | "q" | "exit" => Ok( Command::Quit ),

            "" => Err( CommandError::Unknown( "empty command".into() ) ),
            other => Err( CommandError::Unknown( other.to_string() ) ),
        }
    }
}


/// Parses a handle such as `3` or `#3`.
pub fn parse_handle( s: &str ) -> Result<Handle, CommandError> {
    let s = s.trim();
    let digits = s.strip_prefix( '#' ).unwrap_or( s );
    digits.parse::<u32>()
        .map( Handle::new )
        .map_err( |_| CommandError::InvalidArgument( format!( "Invalid handle: {}", s ) ) )
}


fn handle_arg( args: Option<&str> ) -> Result<Handle, CommandError> {
    let arg = args.ok_or_else( || CommandError::MissingArgument( "handle".into() ) )?;
    parse_handle( arg )
}


/// Splits `<handle> [rest]`.
fn split_handle( args: Option<&str> ) -> Result<( Handle, Option<&str> ), CommandError> {
    let args = args.ok_or_else( || CommandError::MissingArgument( "handle".into() ) )?;
    let mut parts = args.splitn( 2, ' ' );
    let handle = parse_handle( parts.next().unwrap_or( "" ) )?;
    let rest = parts.next().map( |s| s.trim() ).filter( |s| !s.is_empty() );
    Ok(( handle, rest ))
}


/// Parses a time string like "1:30", "90" or "250ms" into a Duration.
///
/// @param s - Time string in format "MM:SS", "M:SS", seconds, or milliseconds with an `ms` suffix
///
/// @returns Duration or error
fn parse_time( s: &str ) -> Result<Duration, CommandError> {
    let s = s.trim();

    if let Some( ms ) = s.strip_suffix( "ms" ) {
        let millis: u64 = ms.trim().parse()
            .map_err( |_| CommandError::InvalidArgument( format!( "Invalid milliseconds: {}", ms ) ) )?;
        Ok( Duration::from_millis( millis ) )
    } else if let Some(( min, sec )) = s.split_once( ':' ) {
        let minutes: u64 = min.parse()
            .map_err( |_| CommandError::InvalidArgument( format!( "Invalid minutes: {}", min ) ) )?;
        let seconds: u64 = sec.parse()
            .map_err( |_| CommandError::InvalidArgument( format!( "Invalid seconds: {}", sec ) ) )?;
        Ok( Duration::from_secs( minutes * 60 + seconds ) )
    } else {
        let seconds: f64 = s.parse()
            .map_err( |_| CommandError::InvalidArgument( format!( "Invalid time: {}", s ) ) )?;
        if !seconds.is_finite() || seconds < 0.0 {
            return Err( CommandError::InvalidArgument( format!( "Invalid time: {}", s ) ) );
        }
        Ok( Duration::from_secs_f64( seconds ) )
    }
}


/// Returns help text listing all available commands.
pub fn help_text() -> &'static str {
    r#"Asset Commands:
  /load <path>           Load a sound, prints its handle
  /list                  List loaded sounds

Playback Commands:
  /play <h>              Play sound <h>
  /pause <h>             Pause sound <h>
  /stop <h>              Stop sound <h>
  /stopall               Stop every sound
  /seek <h> <time>       Seek (e.g., 1:30, 2.5, 250ms)
  /loop <h> [on|off]     Toggle or set looping
  /vol <h> <0-100>       Set volume

Queries:
  /length <h>            Sound length
  /pos <h>               Play position

Other Commands:
  /help                  Show this help
  /quit                  Exit chime"#
}


#[cfg( test )]
mod tests {
    use super::*;


    #[test]
    fn test_parse_load() {
        let cmd = Command::parse( "load sfx/jump.ogg" ).unwrap();
        assert_eq!( cmd, Command::Load { path: PathBuf::from( "sfx/jump.ogg" ) } );
    }


    #[test]
    fn test_parse_play_with_hash_handle() {
        let cmd = Command::parse( "play #2" ).unwrap();
        assert_eq!( cmd, Command::Play { handle: Handle::new( 2 ) } );
    }


    #[test]
    fn test_parse_seek() {
        let cmd = Command::parse( "seek 1 1:30" ).unwrap();
        assert_eq!( cmd, Command::Seek { handle: Handle::new( 1 ), position: Duration::from_secs( 90 ) } );
    }


    #[test]
    fn test_parse_seek_millis() {
        let cmd = Command::parse( "sk 3 250ms" ).unwrap();
        assert_eq!( cmd, Command::Seek { handle: Handle::new( 3 ), position: Duration::from_millis( 250 ) } );
    }


    #[test]
    fn test_parse_seek_fractional_seconds() {
        let cmd = Command::parse( "seek 1 2.5" ).unwrap();
        assert_eq!( cmd, Command::Seek { handle: Handle::new( 1 ), position: Duration::from_millis( 2500 ) } );
    }


    #[test]
    fn test_parse_loop_with_mode() {
        let cmd = Command::parse( "loop 4 on" ).unwrap();
        assert_eq!( cmd, Command::Loop { handle: Handle::new( 4 ), mode: Some( Toggle::On ) } );
    }


    #[test]
    fn test_parse_loop_toggle() {
        let cmd = Command::parse( "loop 4" ).unwrap();
        assert_eq!( cmd, Command::Loop { handle: Handle::new( 4 ), mode: None } );
    }


    #[test]
    fn test_parse_volume() {
        let cmd = Command::parse( "vol 1 50" ).unwrap();
        assert_eq!( cmd, Command::Volume { handle: Handle::new( 1 ), level: 50 } );

        let result = Command::parse( "vol 1 150" );
        assert!( matches!( result, Err( CommandError::InvalidArgument( _ ) ) ) );
    }


    #[test]
    fn test_parse_unknown() {
        let result = Command::parse( "foobar" );
        assert!( matches!( result, Err( CommandError::Unknown( _ ) ) ) );
    }


    #[test]
    fn test_parse_missing_arg() {
        assert!( matches!( Command::parse( "load" ), Err( CommandError::MissingArgument( _ ) ) ) );
        assert!( matches!( Command::parse( "play" ), Err( CommandError::MissingArgument( _ ) ) ) );
        assert!( matches!( Command::parse( "seek 1" ), Err( CommandError::MissingArgument( _ ) ) ) );
    }


    #[test]
    fn test_parse_bad_handle() {
        let result = Command::parse( "stop one" );
        assert!( matches!( result, Err( CommandError::InvalidArgument( _ ) ) ) );
    }
}
