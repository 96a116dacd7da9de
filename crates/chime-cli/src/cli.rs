//! Command-line argument parsing for Chime.

use std::path::PathBuf;

use clap::Parser;


/// Chime - An interactive terminal soundboard.
#[derive( Parser, Debug )]
#[command( name = "chime" )]
#[command( version, about, long_about = None )]
pub struct Args {
    /// Run without an audio device, on a virtual clock.
    #[arg( long )]
    pub headless: bool,

    /// Initial gain for loaded sounds (0.0 - 1.0).
    #[arg( short, long )]
    pub gain: Option<f32>,

    /// Loop every loaded sound.
    #[arg( short = 'l', long = "loop" )]
    pub looped: bool,

    /// Sound files to load on startup.
    #[arg( trailing_var_arg = true )]
    pub files: Vec<PathBuf>,
}
