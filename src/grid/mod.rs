//! Grid model — the ordered cell handles of the host surface.
//!
//! The host surface owns the cells; this module only holds handles to them
//! in canonical order and is the one place cell colors are written from.

use std::io;

use crate::error::{PlayerError, PlayerResult};
use crate::types::{Color, ColorIndex, Palette};

/// One addressable cell on the host surface.
///
/// Handles are cheap to clone and share the underlying cell, so writes
/// through any clone are visible to all of them.
pub trait CellHandle: Clone {
    fn color(&self) -> Color;
    fn set_color(&self, color: Color);
    /// Whether color changes should be eased by the host.
    fn set_animatable(&self, animatable: bool);
    fn set_opacity(&self, opacity: f32);
}

/// The host visual surface the player draws on.
///
/// Resizing and revealing only *start* the host-side animation; the
/// caller is responsible for waiting out its duration.
pub trait Surface {
    type Cell: CellHandle;

    /// Walk the surface and return every cell in canonical order.
    fn collect_cells(&self) -> Vec<Self::Cell>;

    /// Grow the visual area to full size, or collapse it back.
    fn set_expanded(&self, expanded: bool);

    /// Show the cells needed for the full display (creating them the first
    /// time), or hide them again.
    fn set_revealed(&self, revealed: bool);

    /// Push pending changes to the screen.
    fn present(&self) -> io::Result<()>;
}

#[derive(Debug, Clone)]
pub struct Grid<C> {
    cells: Vec<C>,
}

impl<C: CellHandle> Grid<C> {
    /// Collect the cells of `surface`, requiring exactly `expected` of them.
    pub fn collect<S>(surface: &S, expected: usize) -> PlayerResult<Self>
    where
        S: Surface<Cell = C>,
    {
        let cells = surface.collect_cells();
        if cells.len() != expected {
            return Err(PlayerError::StructuralMismatch {
                expected,
                actual: cells.len(),
            });
        }
        Ok(Grid { cells })
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn cells(&self) -> &[C] {
        &self.cells
    }

    /// Record every cell's current color.
    pub fn snapshot(&self) -> Snapshot<C> {
        Snapshot {
            entries: self
                .cells
                .iter()
                .map(|cell| (cell.clone(), cell.color()))
                .collect(),
        }
    }

    /// Write back the colors recorded in `snapshot`, once per cell.
    pub fn restore(&self, snapshot: &Snapshot<C>) {
        for (cell, color) in &snapshot.entries {
            cell.set_color(*color);
        }
    }

    pub fn set_index(&self, i: usize, color: ColorIndex, palette: &Palette) {
        self.cells[i].set_color(palette.color(color));
    }

    pub fn set_literal(&self, i: usize, color: Color) {
        self.cells[i].set_color(color);
    }

    pub fn fill(&self, color: Color) {
        for cell in &self.cells {
            cell.set_color(color);
        }
    }

    pub fn set_animatable(&self, animatable: bool) {
        for cell in &self.cells {
            cell.set_animatable(animatable);
        }
    }
}

/// Colors of a grid before a session touched it.
#[derive(Debug, Clone)]
pub struct Snapshot<C> {
    entries: Vec<(C, Color)>,
}

impl<C> Snapshot<C> {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn colors(&self) -> impl Iterator<Item = Color> + '_ {
        self.entries.iter().map(|(_, color)| *color)
    }
}
