//! Host surfaces the player can drive.
//!
//! - `memory`: headless cells kept in memory, with an operation log
//! - `terminal`: a contribution-graph-style grid drawn with crossterm

pub mod memory;
pub mod terminal;

use crate::types::{Color, Palette};

/// Opacity given to freshly inserted cells before they are revealed.
pub(crate) const INSERTED_OPACITY: f32 = 0.01;

/// Deterministic "activity" color for the cells that exist before any
/// session, mostly empty with the occasional busy day.
pub(crate) fn activity_color(index: usize, palette: &Palette) -> Color {
    let h = (index as u32).wrapping_mul(2_654_435_761) >> 16;
    let level = match h % 10 {
        0..=4 => 0,
        5 | 6 => 1,
        7 => 2,
        8 => 3,
        _ => 4,
    };
    palette.0[level]
}
