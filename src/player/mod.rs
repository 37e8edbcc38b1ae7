//! Player — the playback clock and renderer.
//!
//! Frame selection is driven by wall-clock time since playback start, not
//! by counting ticks. A late tick jumps straight to the frame that is due
//! and frames in between are skipped. Each redraw writes only the cells
//! that differ from what is already on the grid.

use std::cell::Cell;
use std::mem;
use std::rc::Rc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::decoder::FrameSequence;
use crate::error::{PlayerError, PlayerResult};
use crate::grid::{CellHandle, Grid, Surface};
use crate::types::{ColorIndex, Palette};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockTiming {
    /// Interval between scheduling ticks.
    pub tick: Duration,
    /// How long `stop` waits for an in-flight tick to see the cancel flag.
    pub grace: Duration,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlaybackStats {
    pub ticks: u64,
    pub redraws: u64,
    pub writes: u64,
}

// ---------------------------------------------------------------------------
// Renderer
// ---------------------------------------------------------------------------

/// Double-buffered diff renderer.
///
/// `front` mirrors what the grid currently shows (`None` until first
/// drawn); `back` is staged with the next frame, diffed against `front`,
/// then the two are swapped.
pub struct Renderer {
    front: Vec<Option<ColorIndex>>,
    back: Vec<Option<ColorIndex>>,
    shown: Option<usize>,
}

impl Renderer {
    pub fn new(cell_count: usize) -> Self {
        Renderer {
            front: vec![None; cell_count],
            back: vec![None; cell_count],
            shown: None,
        }
    }

    /// Index of the frame currently on the grid.
    pub fn shown(&self) -> Option<usize> {
        self.shown
    }

    /// Bring the grid to the frame due at `elapsed`.
    ///
    /// Returns `None` when that frame is already shown, otherwise the number
    /// of cells written, which is zero when the new frame looks the same as
    /// the old one.
    pub fn draw<C: CellHandle>(
        &mut self,
        elapsed: Duration,
        frames: &FrameSequence,
        grid: &Grid<C>,
        palette: &Palette,
    ) -> Option<usize> {
        let index = frames.index_at(elapsed);
        if self.shown == Some(index) {
            return None;
        }

        for (slot, &color) in self.back.iter_mut().zip(frames.frame(index)) {
            *slot = Some(color);
        }

        let mut writes = 0;
        for (i, (next, prev)) in self.back.iter().zip(&self.front).enumerate() {
            if next == prev {
                continue;
            }
            if let Some(color) = *next {
                grid.set_index(i, color, palette);
                writes += 1;
            }
        }

        mem::swap(&mut self.front, &mut self.back);
        self.shown = Some(index);
        Some(writes)
    }
}

// ---------------------------------------------------------------------------
// Playback task
// ---------------------------------------------------------------------------

pub struct PlaybackHandle {
    cancelled: Rc<Cell<bool>>,
    task: JoinHandle<PlaybackStats>,
    grace: Duration,
}

impl PlaybackHandle {
    /// Stop the render loop. Once this returns, the loop has exited and
    /// will not write to the grid again.
    pub async fn stop(self) -> PlaybackStats {
        self.cancelled.set(true);
        tokio::time::sleep(self.grace).await;
        match self.task.await {
            Ok(stats) => stats,
            Err(e) => {
                warn!("playback task failed: {e}");
                PlaybackStats::default()
            }
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

/// Start drawing `frames` onto `grid`, with time zero at the call.
///
/// The grid must have exactly one cell per decoded frame entry; a mismatch
/// is reported here, before any tick runs. Must be called from within a
/// `LocalSet`.
pub fn start_playback<S>(
    surface: Rc<S>,
    grid: Rc<Grid<S::Cell>>,
    frames: Rc<FrameSequence>,
    palette: Palette,
    timing: ClockTiming,
) -> PlayerResult<PlaybackHandle>
where
    S: Surface + 'static,
{
    if grid.len() != frames.cell_count() {
        return Err(PlayerError::StructuralMismatch {
            expected: frames.cell_count(),
            actual: grid.len(),
        });
    }

    let cancelled = Rc::new(Cell::new(false));
    let flag = Rc::clone(&cancelled);
    let task = tokio::task::spawn_local(async move {
        render_loop(&*surface, &grid, &frames, &palette, timing.tick, &flag).await
    });

    Ok(PlaybackHandle {
        cancelled,
        task,
        grace: timing.grace,
    })
}

async fn render_loop<S: Surface>(
    surface: &S,
    grid: &Grid<S::Cell>,
    frames: &FrameSequence,
    palette: &Palette,
    tick: Duration,
    cancelled: &Cell<bool>,
) -> PlaybackStats {
    let t0 = Instant::now();
    let mut renderer = Renderer::new(grid.len());
    let mut stats = PlaybackStats::default();
    let mut ticker = tokio::time::interval(tick);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    info!(frames = frames.len(), fps = frames.fps(), "playback started");

    loop {
        ticker.tick().await;
        if cancelled.get() {
            break;
        }
        stats.ticks += 1;

        let Some(written) = renderer.draw(t0.elapsed(), frames, grid, palette) else {
            continue;
        };
        if written > 0 {
            stats.redraws += 1;
            stats.writes += written as u64;
            if let Err(e) = surface.present() {
                warn!("present failed: {e}");
            }
        }

        if renderer.shown() == Some(frames.last_index()) {
            info!(
                actual_ms = t0.elapsed().as_millis() as u64,
                expected_ms = frames.total_duration().as_millis() as u64,
                "reached last frame"
            );
        }
    }

    debug!(
        ticks = stats.ticks,
        redraws = stats.redraws,
        writes = stats.writes,
        "playback stopped"
    );
    stats
}
