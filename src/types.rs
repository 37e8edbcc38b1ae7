//! Shared boundary types for the grid player.
//!
//! This module defines the data contracts between the pieces:
//! - Frame source → Decoder (file): `FrameData` containing run-length `EncodedFrame`s
//! - Decoder → Player (in-memory): decoded frames of `ColorIndex`
//! - Controller → host glue: `SessionState` and the `Label` of the trigger control

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::PlayerError;

// ---------------------------------------------------------------------------
// Colors
// ---------------------------------------------------------------------------

/// A literal RGB color, serialized as `#RRGGBB`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Color { r, g, b }
    }

    pub fn parse(s: &str) -> Result<Self, PlayerError> {
        let invalid = || PlayerError::InvalidColorLiteral(s.to_string());
        let hex = s.strip_prefix('#').ok_or_else(invalid)?;
        if hex.len() != 6 || !hex.is_ascii() {
            return Err(invalid());
        }
        let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| invalid());
        Ok(Color {
            r: channel(0)?,
            g: channel(2)?,
            b: channel(4)?,
        })
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }
}

impl TryFrom<String> for Color {
    type Error = PlayerError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Color::parse(&s)
    }
}

impl From<Color> for String {
    fn from(c: Color) -> String {
        c.to_string()
    }
}

/// Number of entries in every palette.
pub const PALETTE_SIZE: usize = 5;

/// Index of a palette entry, always in `[0, PALETTE_SIZE)`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ColorIndex(u8);

impl ColorIndex {
    pub fn new(index: u8) -> Option<Self> {
        ((index as usize) < PALETTE_SIZE).then_some(ColorIndex(index))
    }

    pub fn get(self) -> u8 {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Palette(pub [Color; PALETTE_SIZE]);

impl Palette {
    pub fn color(&self, index: ColorIndex) -> Color {
        self.0[index.0 as usize]
    }
}

impl Default for Palette {
    /// The five-step contribution-graph palette.
    fn default() -> Self {
        Palette([
            Color::rgb(0xEB, 0xED, 0xF0),
            Color::rgb(0x91, 0xDA, 0x9E),
            Color::rgb(0x40, 0xC4, 0x63),
            Color::rgb(0x30, 0xA1, 0x4E),
            Color::rgb(0x21, 0x6E, 0x39),
        ])
    }
}

// ---------------------------------------------------------------------------
// Frame source → Decoder boundary (serialized)
// ---------------------------------------------------------------------------

/// One `(colorIndex, runLength)` pair, serialized as a two-element array.
///
/// The color index is kept raw here; range checks happen in the decoder so
/// that a bad payload reports which frame it came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "(u8, u32)", into = "(u8, u32)")]
pub struct Run {
    pub color: u8,
    pub len: u32,
}

impl From<(u8, u32)> for Run {
    fn from((color, len): (u8, u32)) -> Self {
        Run { color, len }
    }
}

impl From<Run> for (u8, u32) {
    fn from(run: Run) -> Self {
        (run.color, run.len)
    }
}

pub type EncodedFrame = Vec<Run>;

/// The frame payload as delivered by the frame data source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameData {
    pub fps: f64,
    pub frames: Vec<EncodedFrame>,
}

impl FrameData {
    pub fn from_json(json: &str) -> Result<Self, PlayerError> {
        Ok(serde_json::from_str(json)?)
    }
}

// ---------------------------------------------------------------------------
// Controller → host glue boundary
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Stopped,
    Transitioning,
    Playing,
}

/// Text of the trigger control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Label {
    #[default]
    Play,
    Stop,
}

impl Label {
    pub fn as_str(self) -> &'static str {
        match self {
            Label::Play => "Play",
            Label::Stop => "Stop",
        }
    }
}
