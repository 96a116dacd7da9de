//! Soundboard state and command execution.

use std::path::{ Path, PathBuf };
use std::time::{ Duration, Instant };

use anyhow::{ bail, Context, Result };

use chime_core::{
    backend::{ CpalBackend, NullBackend },
    AssetSource, Backend, Command, Handle, PlayState, SoundLib,
};


/// Moves backend time forward between commands.
pub trait Clock {
    fn pump( &self, elapsed: Duration );
}


impl Clock for CpalBackend {
    fn pump( &self, _elapsed: Duration ) {}
}


impl Clock for NullBackend {
    fn pump( &self, elapsed: Duration ) {
        self.advance( u32::try_from( elapsed.as_millis() ).unwrap_or( u32::MAX ) );
    }
}


/// What the REPL should do after a command.
#[derive( Debug, Clone, Copy, PartialEq, Eq )]
pub enum Flow {
    Continue,
    Quit,
}


/// Formats milliseconds as `M:SS.mmm`.
pub fn format_ms( msec: u64 ) -> String {
    let secs = msec / 1000;
    format!( "{}:{:02}.{:03}", secs / 60, secs % 60, msec % 1000 )
}


fn state_label( state: Option<PlayState> ) -> &'static str {
    match state {
        Some( PlayState::Playing ) => "playing",
        Some( PlayState::Paused ) => "paused",
        Some( PlayState::Stopped ) => "stopped",
        None => "unavailable",
    }
}


/// Application state.
pub struct App<B: Backend + Clock> {
    lib: SoundLib<B>,
    names: Vec<String>,
    default_gain: f32,
    loop_by_default: bool,
    last_tick: Instant,
}


impl<B: Backend + Clock> App<B> {
    /// Initializes the sound library on `backend`.
    pub fn new( backend: B, default_gain: f32, loop_by_default: bool ) -> Result<Self> {
        let mut lib = SoundLib::new( backend );
        lib.try_initialize().context( "Failed to initialize audio" )?;

        Ok( Self {
            lib,
            names: Vec::new(),
            default_gain: default_gain.clamp( 0.0, 1.0 ),
            loop_by_default,
            last_tick: Instant::now(),
        })
    }


    /// Advances the backend clock and delivers pending end-of-data events.
    pub fn tick( &mut self ) {
        let now = Instant::now();
        self.lib.backend().pump( now.duration_since( self.last_tick ) );
        self.last_tick = now;
        self.lib.dispatch_events();
    }


    /// Loads a sound file and applies the configured defaults.
    pub fn load( &mut self, path: &Path ) -> Result<Handle> {
        let source = AssetSource::open( path )
            .with_context( || format!( "Failed to read {}", path.display() ) )?;
        let handle = self.lib.load_from_asset( &source )
            .with_context( || format!( "Failed to load {}", path.display() ) )?;

        self.lib.set_volume( handle, self.default_gain );
        if self.loop_by_default {
            self.lib.set_looped( handle, true );
        }

        let name = path
            .file_name()
            .map( |n| n.to_string_lossy().into_owned() )
            .unwrap_or_else( || path.display().to_string() );
        self.names.push( name );

        tracing::info!( "Loaded {} as {}", path.display(), handle );
        Ok( handle )
    }


    fn name( &self, handle: Handle ) -> Result<&str> {
        match handle.index().and_then( |i| self.names.get( i ) ) {
            Some( name ) => Ok( name ),
            None => bail!( "No sound {}", handle ),
        }
    }


    /// Runs one parsed command, returning the text to show the user.
    pub fn run_command( &mut self, cmd: Command ) -> Result<( Flow, String )> {
        let message = match cmd {
            Command::Load { path } => {
                let handle = self.load( &expand_home( path ) )?;
                format!( "Loaded {}", handle )
            }
            Command::List => self.listing(),
            Command::Play { handle } => {
                let name = self.name( handle )?.to_string();
                self.lib.play( handle );
                format!( "Playing {} {}", handle, name )
            }
            Command::Pause { handle } => {
                self.name( handle )?;
                self.lib.pause( handle );
                format!( "Paused {}", handle )
            }
            Command::Stop { handle } => {
                self.name( handle )?;
                self.lib.stop( handle );
                format!( "Stopped {}", handle )
            }
            Command::StopAll => {
                self.lib.stop_all();
                "Stopped all sounds".to_string()
            }
            Command::Seek { handle, position } => {
                self.name( handle )?;
                let msec = u64::try_from( position.as_millis() ).unwrap_or( u64::MAX );
                self.lib.set_play_position( handle, msec );
                format!( "Seeked {} to {}", handle, format_ms( msec ) )
            }
            Command::Loop { handle, mode } => {
                self.name( handle )?;
                let enabled = match mode {
                    Some( mode ) => mode.enabled(),
                    None => !self.lib.is_looped( handle ),
                };
                self.lib.set_looped( handle, enabled );
                format!( "Loop {}: {}", handle, if enabled { "on" } else { "off" } )
            }
            Command::Volume { handle, level } => {
                self.name( handle )?;
                self.lib.set_volume( handle, level as f32 / 100.0 );
                format!( "Volume {}: {}%", handle, level )
            }
            Command::Length { handle } => {
                self.name( handle )?;
                format!( "Length {}: {}", handle, format_ms( self.lib.play_length( handle ) ) )
            }
            Command::Position { handle } => {
                self.name( handle )?;
                format!( "Position {}: {}", handle, format_ms( self.lib.play_position( handle ) ) )
            }
            Command::Help => chime_core::help_text().to_string(),
            Command::Quit => {
                self.lib.stop_all();
                return Ok(( Flow::Quit, "Bye".to_string() ));
            }
        };

        Ok(( Flow::Continue, message ))
    }


    fn listing( &self ) -> String {
        if self.lib.is_empty() {
            return "No sounds loaded".to_string();
        }

        self.lib
            .handles()
            .zip( &self.names )
            .map( |( handle, name )| {
                format!(
                    "{:>4}  {:<11} {}{}",
                    handle.to_string(),
                    state_label( self.lib.play_state( handle ) ),
                    name,
                    if self.lib.is_looped( handle ) { "  (loop)" } else { "" },
                )
            })
            .collect::<Vec<_>>()
            .join( "\n" )
    }


    /// Stops everything and releases the engine.
    pub fn shutdown( &mut self ) {
        self.lib.stop_all();
        self.lib.shutdown();
    }
}


/// Expands a leading `~` to the home directory.
fn expand_home( path: PathBuf ) -> PathBuf {
    match path.strip_prefix( "~" ) {
        Ok( rest ) => dirs::home_dir().map( |home| home.join( rest ) ).unwrap_or( path ),
        Err( _ ) => path,
    }
}


#[cfg( test )]
mod tests {
    use super::*;

    use chime_core::testing::wav_bytes;
    use chime_core::Toggle;


    fn write_wav( name: &str, sample_rate: u32, frames: u32 ) -> PathBuf {
        let path = std::env::temp_dir().join( format!( "chime-cli-{}-{}.wav", std::process::id(), name ) );
        std::fs::write( &path, wav_bytes( sample_rate, 1, frames ) ).unwrap();
        path
    }


    fn headless() -> App<NullBackend> {
        App::new( NullBackend::new(), 1.0, false ).unwrap()
    }


    #[test]
    fn test_format_ms() {
        assert_eq!( format_ms( 0 ), "0:00.000" );
        assert_eq!( format_ms( 61_250 ), "1:01.250" );
    }


    #[test]
    fn test_load_and_query_length() {
        let path = write_wav( "length", 8000, 4000 );
        let mut app = headless();

        let handle = app.load( &path ).unwrap();
        assert_eq!( handle, Handle::new( 1 ) );

        let ( flow, message ) = app.run_command( Command::Length { handle } ).unwrap();
        assert_eq!( flow, Flow::Continue );
        assert_eq!( message, "Length #1: 0:00.500" );

        std::fs::remove_file( path ).ok();
    }


    #[test]
    fn test_loop_toggles() {
        let path = write_wav( "loop", 8000, 800 );
        let mut app = headless();
        let handle = app.load( &path ).unwrap();

        let ( _, message ) = app.run_command( Command::Loop { handle, mode: None } ).unwrap();
        assert_eq!( message, "Loop #1: on" );
        let ( _, message ) = app.run_command( Command::Loop { handle, mode: Some( Toggle::Off ) } ).unwrap();
        assert_eq!( message, "Loop #1: off" );

        std::fs::remove_file( path ).ok();
    }


    #[test]
    fn test_unknown_handle_is_an_error() {
        let mut app = headless();
        assert!( app.run_command( Command::Play { handle: Handle::new( 3 ) } ).is_err() );
        assert!( app.run_command( Command::Play { handle: Handle::NONE } ).is_err() );
    }


    #[test]
    fn test_missing_file_is_an_error() {
        let mut app = headless();
        let result = app.run_command( Command::Load { path: PathBuf::from( "/nonexistent/boom.wav" ) } );
        assert!( result.is_err() );
        assert!( app.lib.is_empty() );
    }


    #[test]
    fn test_quit_stops_playback() {
        let path = write_wav( "quit", 8000, 8000 );
        let mut app = headless();
        let handle = app.load( &path ).unwrap();
        app.run_command( Command::Play { handle } ).unwrap();
        assert_eq!( app.lib.play_state( handle ), Some( PlayState::Playing ) );

        let ( flow, _ ) = app.run_command( Command::Quit ).unwrap();
        assert_eq!( flow, Flow::Quit );
        assert_eq!( app.lib.play_state( handle ), Some( PlayState::Stopped ) );

        std::fs::remove_file( path ).ok();
    }
}
