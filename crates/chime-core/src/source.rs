//! Seekable in-memory audio sources
//!
//! An [`AssetSource`] is the byte container a player is created from: a
//! randomly seekable blob with a known length and an optional MIME type.

use std::fs::File;
use std::io::{ self, Cursor, Read, Seek, SeekFrom };
use std::path::Path;
use std::sync::Arc;


/// Known container extensions and their MIME types.
const MIME_TYPES: &[( &str, &str )] = &[
    ( "wav", "audio/wav" ),
    ( "ogg", "audio/ogg" ),
    ( "oga", "audio/ogg" ),
    ( "mp3", "audio/mpeg" ),
    ( "flac", "audio/flac" ),
    ( "m4a", "audio/mp4" ),
    ( "aac", "audio/aac" ),
    ( "aiff", "audio/aiff" ),
    ( "caf", "audio/x-caf" ),
];


/// An audio asset held in memory.
///
/// Cloning is cheap; clones share the underlying bytes.
#[derive( Debug, Clone )]
pub struct AssetSource {
    data: Arc<[u8]>,
    mime_type: Option<String>,
    extension: Option<String>,
}


impl AssetSource {
    /// Creates a source from raw bytes with an optional MIME type.
    pub fn from_bytes( data: impl Into<Arc<[u8]>>, mime_type: Option<&str> ) -> Self {
        Self {
            data: data.into(),
            mime_type: mime_type.map( str::to_string ),
            extension: None,
        }
    }


    /// Reads a whole file, guessing the MIME type from its extension.
    pub fn open( path: &Path ) -> io::Result<Self> {
        let data = std::fs::read( path )?;
        Ok( Self::with_path_hints( data, path ) )
    }


    /// Reads `length` bytes starting at `start` from a file, the way packed
    /// asset archives expose an embedded sound.
    pub fn open_range( path: &Path, start: u64, length: u64 ) -> io::Result<Self> {
        let mut file = File::open( path )?;
        file.seek( SeekFrom::Start( start ) )?;

        let len = usize::try_from( length )
            .map_err( |_| io::Error::new( io::ErrorKind::InvalidInput, "asset range too large" ) )?;
        let mut data = vec![ 0u8; len ];
        file.read_exact( &mut data )?;

        Ok( Self::with_path_hints( data, path ) )
    }


    fn with_path_hints( data: Vec<u8>, path: &Path ) -> Self {
        let extension = path
            .extension()
            .and_then( |e| e.to_str() )
            .map( |e| e.to_ascii_lowercase() );
        let mime_type = extension.as_deref().and_then( mime_for_extension ).map( str::to_string );

        Self {
            data: data.into(),
            mime_type,
            extension,
        }
    }


    /// Overrides the MIME type.
    pub fn with_mime_type( mut self, mime_type: &str ) -> Self {
        self.mime_type = Some( mime_type.to_string() );
        self
    }


    /// Total length in bytes.
    pub fn len( &self ) -> u64 {
        self.data.len() as u64
    }


    /// Returns true if the source holds no bytes.
    pub fn is_empty( &self ) -> bool {
        self.data.is_empty()
    }


    pub fn mime_type( &self ) -> Option<&str> {
        self.mime_type.as_deref()
    }


    pub fn extension( &self ) -> Option<&str> {
        self.extension.as_deref()
    }


    /// Returns a fresh seekable reader over the bytes.
    pub fn reader( &self ) -> Cursor<Arc<[u8]>> {
        Cursor::new( Arc::clone( &self.data ) )
    }
}


/// Looks up the MIME type for a lowercase file extension.
pub fn mime_for_extension( ext: &str ) -> Option<&'static str> {
    MIME_TYPES.iter().find( |( e, _ )| *e == ext ).map( |( _, m )| *m )
}


#[cfg( test )]
mod tests {
    use super::*;
    use std::io::Write;


    #[test]
    fn test_mime_lookup() {
        assert_eq!( mime_for_extension( "ogg" ), Some( "audio/ogg" ) );
        assert_eq!( mime_for_extension( "txt" ), None );
    }


    #[test]
    fn test_open_range_reads_slice() {
        let path = std::env::temp_dir().join( format!( "chime-range-{}.wav", std::process::id() ) );
        {
            let mut file = File::create( &path ).unwrap();
            file.write_all( b"HEADERpayloadTRAILER" ).unwrap();
        }

        let source = AssetSource::open_range( &path, 6, 7 ).unwrap();
        std::fs::remove_file( &path ).unwrap();

        assert_eq!( source.len(), 7 );
        assert_eq!( source.mime_type(), Some( "audio/wav" ) );
        assert_eq!( source.extension(), Some( "wav" ) );

        let mut buf = Vec::new();
        source.reader().read_to_end( &mut buf ).unwrap();
        assert_eq!( buf, b"payload" );
    }


    #[test]
    fn test_from_bytes_is_cheap_to_clone() {
        let source = AssetSource::from_bytes( vec![ 1u8, 2, 3 ], None ).with_mime_type( "audio/wav" );
        let copy = source.clone();
        assert_eq!( copy.len(), 3 );
        assert_eq!( copy.mime_type(), Some( "audio/wav" ) );
        assert!( !copy.is_empty() );
    }
}
