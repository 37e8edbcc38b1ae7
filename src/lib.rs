//! Grid player — plays a run-length encoded animation on a fixed grid of
//! colored cells, in step with an independently running audio track.

pub mod audio;
pub mod config;
pub mod decoder;
pub mod error;
pub mod grid;
pub mod host;
pub mod menubar;
pub mod player;
pub mod transition;
pub mod types;

pub use error::{PlayerError, PlayerResult};
