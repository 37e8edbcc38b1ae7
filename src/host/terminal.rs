//! Terminal surface — draws the grid as a contribution graph with crossterm.
//!
//! Each cell is one glyph plus a gap. Collapsed, the graph shows the base
//! rows and the trailing partial column; expanded, it shows every row and
//! hides the trailing column. Writes are queued as dirty cells and drawn
//! on `present`.

use std::cell::RefCell;
use std::io::Write;
use std::rc::Rc;

use crossterm::{cursor, queue, style, terminal};

use crate::config::GridLayout;
use crate::grid::{CellHandle, Surface};
use crate::host::{INSERTED_OPACITY, activity_color};
use crate::menubar::print_menu;
use crate::types::{Color, Label, Palette};

/// Rows reserved above the canvas for the menu bar and a spacer.
const CANVAS_OFFSET: u16 = 2;

/// Terminal columns per grid cell.
const CELL_WIDTH: u16 = 2;

const GLYPH: char = '■';

#[derive(Debug, Clone, Copy)]
struct CellState {
    color: Color,
    opacity: f32,
}

impl CellState {
    fn visible(&self) -> bool {
        self.opacity >= 0.5
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Grid { col: usize, row: usize },
    Overflow { row: usize },
}

struct Canvas {
    layout: GridLayout,
    columns: Vec<Vec<CellState>>,
    overflow: Vec<CellState>,
    expanded: bool,
    dirty: Vec<Slot>,
    full_redraw: bool,
}

impl Canvas {
    fn state_mut(&mut self, slot: Slot) -> &mut CellState {
        match slot {
            Slot::Grid { col, row } => &mut self.columns[col][row],
            Slot::Overflow { row } => &mut self.overflow[row],
        }
    }

    fn state(&self, slot: Slot) -> CellState {
        match slot {
            Slot::Grid { col, row } => self.columns[col][row],
            Slot::Overflow { row } => self.overflow[row],
        }
    }

    fn visible_rows(&self) -> usize {
        if self.expanded {
            self.layout.rows
        } else {
            self.layout.base_rows
        }
    }

    fn on_screen(&self, slot: Slot) -> bool {
        match slot {
            Slot::Grid { row, .. } => row < self.visible_rows(),
            Slot::Overflow { row } => row < self.layout.base_rows,
        }
    }

    fn position(&self, slot: Slot) -> (u16, u16) {
        let (col, row) = match slot {
            Slot::Grid { col, row } => (col, row),
            Slot::Overflow { row } => (self.layout.columns, row),
        };
        (col as u16 * CELL_WIDTH, row as u16 + CANVAS_OFFSET)
    }

    fn slots(&self) -> impl Iterator<Item = Slot> + '_ {
        let grid = self
            .columns
            .iter()
            .enumerate()
            .flat_map(|(col, column)| (0..column.len()).map(move |row| Slot::Grid { col, row }));
        let overflow = (0..self.overflow.len()).map(|row| Slot::Overflow { row });
        grid.chain(overflow)
    }
}

#[derive(Clone)]
pub struct TermCell {
    slot: Slot,
    canvas: Rc<RefCell<Canvas>>,
}

impl CellHandle for TermCell {
    fn color(&self) -> Color {
        self.canvas.borrow().state(self.slot).color
    }

    fn set_color(&self, color: Color) {
        let mut canvas = self.canvas.borrow_mut();
        canvas.state_mut(self.slot).color = color;
        canvas.dirty.push(self.slot);
    }

    // Terminal cells change color instantly.
    fn set_animatable(&self, _animatable: bool) {}

    fn set_opacity(&self, opacity: f32) {
        let mut canvas = self.canvas.borrow_mut();
        canvas.state_mut(self.slot).opacity = opacity;
        canvas.dirty.push(self.slot);
    }
}

pub struct TermSurface<W: Write> {
    canvas: Rc<RefCell<Canvas>>,
    palette: Palette,
    out: RefCell<W>,
}

impl<W: Write> TermSurface<W> {
    pub fn new(out: W, layout: GridLayout, palette: Palette) -> Self {
        let columns = (0..layout.columns)
            .map(|col| {
                (0..layout.base_rows)
                    .map(|row| CellState {
                        color: activity_color(col * layout.base_rows + row, &palette),
                        opacity: 1.0,
                    })
                    .collect()
            })
            .collect();
        let overflow = (0..layout.base_rows)
            .map(|row| CellState {
                color: activity_color(layout.columns * layout.base_rows + row, &palette),
                opacity: 1.0,
            })
            .collect();

        TermSurface {
            canvas: Rc::new(RefCell::new(Canvas {
                layout,
                columns,
                overflow,
                expanded: false,
                dirty: Vec::new(),
                full_redraw: true,
            })),
            palette,
            out: RefCell::new(out),
        }
    }

    /// Terminal size needed to show the expanded graph.
    pub fn required_size(layout: &GridLayout) -> (u16, u16) {
        let width = (layout.columns as u16 + 1) * CELL_WIDTH;
        let height = layout.rows as u16 + CANVAS_OFFSET;
        (width, height)
    }

    pub fn render_menubar(&self, label: Label) -> std::io::Result<()> {
        let items = [
            format!("[Space] {}", label.as_str()),
            "[q][Esc] quit".to_string(),
        ];
        let mut out = self.out.borrow_mut();
        queue!(
            out,
            cursor::MoveTo(0, 0),
            terminal::Clear(terminal::ClearType::CurrentLine),
        )?;
        print_menu(&mut *out, &items)?;
        out.flush()
    }

    /// Redraw the whole canvas on the next `present`.
    pub fn invalidate(&self) {
        self.canvas.borrow_mut().full_redraw = true;
    }

    fn draw_slot(out: &mut W, canvas: &Canvas, slot: Slot) -> std::io::Result<()> {
        let (x, y) = canvas.position(slot);
        let state = canvas.state(slot);
        queue!(out, cursor::MoveTo(x, y))?;
        if canvas.on_screen(slot) && state.visible() {
            let cs = style::ContentStyle {
                foreground_color: Some(to_ct_color(state.color)),
                ..Default::default()
            };
            queue!(out, style::PrintStyledContent(style::StyledContent::new(cs, GLYPH)))?;
        } else {
            queue!(out, style::Print(' '))?;
        }
        Ok(())
    }
}

impl<W: Write> Surface for TermSurface<W> {
    type Cell = TermCell;

    fn collect_cells(&self) -> Vec<TermCell> {
        let canvas = self.canvas.borrow();
        canvas
            .columns
            .iter()
            .enumerate()
            .flat_map(|(col, column)| {
                (0..column.len()).map(move |row| TermCell {
                    slot: Slot::Grid { col, row },
                    canvas: Rc::clone(&self.canvas),
                })
            })
            .collect()
    }

    fn set_expanded(&self, expanded: bool) {
        let mut canvas = self.canvas.borrow_mut();
        canvas.expanded = expanded;
        canvas.full_redraw = true;
    }

    fn set_revealed(&self, revealed: bool) {
        let mut canvas = self.canvas.borrow_mut();
        let layout = canvas.layout;
        let blank = self.palette.0[0];
        for column in canvas.columns.iter_mut() {
            while column.len() < layout.rows {
                column.push(CellState {
                    color: blank,
                    opacity: INSERTED_OPACITY,
                });
            }
            for cell in column.iter_mut().skip(layout.base_rows) {
                cell.opacity = if revealed { 1.0 } else { 0.0 };
            }
        }
        for cell in canvas.overflow.iter_mut() {
            cell.opacity = if revealed { 0.0 } else { 1.0 };
        }
        canvas.full_redraw = true;
    }

    fn present(&self) -> std::io::Result<()> {
        let mut canvas = self.canvas.borrow_mut();
        let mut out = self.out.borrow_mut();

        if canvas.full_redraw {
            for row in 0..canvas.layout.rows as u16 {
                queue!(
                    out,
                    cursor::MoveTo(0, row + CANVAS_OFFSET),
                    terminal::Clear(terminal::ClearType::UntilNewLine),
                )?;
            }
            for slot in canvas.slots() {
                Self::draw_slot(&mut out, &canvas, slot)?;
            }
            canvas.full_redraw = false;
        } else {
            for &slot in &canvas.dirty {
                Self::draw_slot(&mut out, &canvas, slot)?;
            }
        }
        canvas.dirty.clear();
        out.flush()
    }
}

fn to_ct_color(c: Color) -> style::Color {
    style::Color::Rgb {
        r: c.r,
        g: c.g,
        b: c.b,
    }
}
