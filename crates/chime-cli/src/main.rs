//! Chime CLI - Interactive terminal soundboard

mod app;
mod cli;
mod settings;

use std::io::{ self, BufRead, Write };

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{ layer::SubscriberExt, util::SubscriberInitExt, EnvFilter };

use app::{ App, Clock, Flow };
use cli::Args;
use settings::Settings;

use chime_core::{ Backend, Command, CpalBackend, NullBackend };


fn init_logging( settings: &Settings ) {
    let filter = EnvFilter::try_from_default_env()
        .or_else( |_| EnvFilter::try_new( &settings.log_filter ) )
        .unwrap_or_else( |_| EnvFilter::new( settings::DEFAULT_LOG_FILTER ) );

    tracing_subscriber::registry()
        .with( filter )
        .with( tracing_subscriber::fmt::layer().with_writer( io::stderr ) )
        .init();
}


/// Reads slash commands from stdin until `/quit` or end of input.
fn run<B: Backend + Clock>( mut app: App<B>, args: &Args ) -> Result<()> {
    for path in &args.files {
        match app.load( path ) {
            Ok( handle ) => println!( "{} {}", handle, path.display() ),
            Err( e ) => eprintln!( "Error: {:#}", e ),
        }
    }

    println!( "Type /help for commands." );

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut lines = stdin.lock().lines();

    loop {
        print!( "> " );
        stdout.flush()?;

        let line = match lines.next() {
            Some( line ) => line?,
            None => break,
        };
        let input = line.trim();
        if input.is_empty() {
            continue;
        }

        app.tick();

        let input = input.strip_prefix( '/' ).unwrap_or( input );
        match Command::parse( input ) {
            Ok( cmd ) => match app.run_command( cmd ) {
                Ok(( flow, message )) => {
                    println!( "{}", message );
                    if flow == Flow::Quit {
                        break;
                    }
                }
                Err( e ) => println!( "Error: {:#}", e ),
            },
            Err( e ) => println!( "{}", e ),
        }
    }

    app.shutdown();
    Ok(())
}


fn main() -> Result<()> {
    let args = Args::parse();
    let settings = Settings::load();
    init_logging( &settings );
    settings.save_if_missing();

    let gain = args.gain.unwrap_or( settings.default_gain );
    let looped = args.looped || settings.loop_by_default;

    if args.headless || settings.headless {
        tracing::info!( "Starting headless" );
        run( App::new( NullBackend::new(), gain, looped )?, &args )
    } else {
        run( App::new( CpalBackend::new(), gain, looped )?, &args )
    }
}
