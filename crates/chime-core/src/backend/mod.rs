//! Bundled engine backends

pub mod cpal_backend;
pub mod null;
pub mod voice;

pub use cpal_backend::CpalBackend;
pub use null::NullBackend;
