//! Headless surface kept entirely in memory.
//!
//! Every host operation is logged with the (tokio) time it happened, and
//! every color write is counted, so callers can check phase ordering and
//! redraw cost without a screen.

use std::cell::{Cell, RefCell};
use std::io;
use std::rc::Rc;

use tokio::time::Instant;

use crate::config::GridLayout;
use crate::grid::{CellHandle, Surface};
use crate::host::{INSERTED_OPACITY, activity_color};
use crate::types::{Color, Palette};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellState {
    pub color: Color,
    pub opacity: f32,
    pub animatable: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostOp {
    Expand(bool),
    Reveal(bool),
    Present,
}

#[derive(Debug, Clone)]
pub struct MemoryCell {
    state: Rc<RefCell<CellState>>,
    writes: Rc<Cell<usize>>,
}

impl MemoryCell {
    fn new(color: Color, opacity: f32, writes: &Rc<Cell<usize>>) -> Self {
        MemoryCell {
            state: Rc::new(RefCell::new(CellState {
                color,
                opacity,
                animatable: false,
            })),
            writes: Rc::clone(writes),
        }
    }

    pub fn state(&self) -> CellState {
        *self.state.borrow()
    }
}

impl CellHandle for MemoryCell {
    fn color(&self) -> Color {
        self.state.borrow().color
    }

    fn set_color(&self, color: Color) {
        self.state.borrow_mut().color = color;
        self.writes.set(self.writes.get() + 1);
    }

    fn set_animatable(&self, animatable: bool) {
        self.state.borrow_mut().animatable = animatable;
    }

    fn set_opacity(&self, opacity: f32) {
        self.state.borrow_mut().opacity = opacity;
    }
}

pub struct MemorySurface {
    layout: GridLayout,
    palette: Palette,
    columns: RefCell<Vec<Vec<MemoryCell>>>,
    overflow: Vec<MemoryCell>,
    inserted: Cell<bool>,
    expanded: Cell<bool>,
    revealed: Cell<bool>,
    writes: Rc<Cell<usize>>,
    log: RefCell<Vec<(Instant, HostOp)>>,
}

impl MemorySurface {
    pub fn new(layout: GridLayout, palette: Palette) -> Self {
        let writes = Rc::new(Cell::new(0));
        let columns = (0..layout.columns)
            .map(|col| {
                (0..layout.base_rows)
                    .map(|row| {
                        let color = activity_color(col * layout.base_rows + row, &palette);
                        MemoryCell::new(color, 1.0, &writes)
                    })
                    .collect()
            })
            .collect();
        let overflow = (0..layout.base_rows)
            .map(|row| {
                let color = activity_color(layout.columns * layout.base_rows + row, &palette);
                MemoryCell::new(color, 1.0, &writes)
            })
            .collect();

        MemorySurface {
            layout,
            palette,
            columns: RefCell::new(columns),
            overflow,
            inserted: Cell::new(false),
            expanded: Cell::new(false),
            revealed: Cell::new(false),
            writes,
            log: RefCell::new(Vec::new()),
        }
    }

    pub fn layout(&self) -> GridLayout {
        self.layout
    }

    pub fn is_expanded(&self) -> bool {
        self.expanded.get()
    }

    pub fn is_revealed(&self) -> bool {
        self.revealed.get()
    }

    /// Whether the trailing partial column is showing.
    pub fn overflow_visible(&self) -> bool {
        self.overflow.iter().all(|cell| cell.state().opacity > 0.5)
    }

    /// Color writes since creation or the last `reset_writes`.
    pub fn writes(&self) -> usize {
        self.writes.get()
    }

    pub fn reset_writes(&self) {
        self.writes.set(0);
    }

    pub fn log(&self) -> Vec<(Instant, HostOp)> {
        self.log.borrow().clone()
    }

    /// Host operations other than `Present`, in order.
    pub fn phases(&self) -> Vec<HostOp> {
        self.log
            .borrow()
            .iter()
            .map(|(_, op)| *op)
            .filter(|op| *op != HostOp::Present)
            .collect()
    }

    /// When each `present` happened.
    pub fn presents(&self) -> Vec<Instant> {
        self.log
            .borrow()
            .iter()
            .filter(|(_, op)| *op == HostOp::Present)
            .map(|(at, _)| *at)
            .collect()
    }

    /// States of every existing cell, in canonical order.
    pub fn cell_states(&self) -> Vec<CellState> {
        self.columns
            .borrow()
            .iter()
            .flatten()
            .map(MemoryCell::state)
            .collect()
    }

    fn record(&self, op: HostOp) {
        self.log.borrow_mut().push((Instant::now(), op));
    }

    fn added_cells(&self) -> Vec<MemoryCell> {
        let base = self.layout.base_rows;
        self.columns
            .borrow()
            .iter()
            .flat_map(|column| column.iter().skip(base).cloned())
            .collect()
    }
}

impl Surface for MemorySurface {
    type Cell = MemoryCell;

    fn collect_cells(&self) -> Vec<MemoryCell> {
        self.columns.borrow().iter().flatten().cloned().collect()
    }

    fn set_expanded(&self, expanded: bool) {
        self.expanded.set(expanded);
        self.record(HostOp::Expand(expanded));
    }

    fn set_revealed(&self, revealed: bool) {
        if revealed && !self.inserted.replace(true) {
            let blank = self.palette.0[0];
            for column in self.columns.borrow_mut().iter_mut() {
                for _ in self.layout.base_rows..self.layout.rows {
                    column.push(MemoryCell::new(blank, INSERTED_OPACITY, &self.writes));
                }
            }
        }
        let (added, overflow) = if revealed { (1.0, 0.0) } else { (0.0, 1.0) };
        for cell in self.added_cells() {
            cell.set_opacity(added);
        }
        for cell in &self.overflow {
            cell.set_opacity(overflow);
        }
        self.revealed.set(revealed);
        self.record(HostOp::Reveal(revealed));
    }

    fn present(&self) -> io::Result<()> {
        self.record(HostOp::Present);
        Ok(())
    }
}
