//! Decoder — expands run-length frames into one color index per cell.
//!
//! The decoder is pure and stateless. Given the same payload it always
//! produces the same frames, which is what lets `LazyFrames` decode once
//! and hand the result to every later session.
//!
//! Cells are in canonical order: column-major, top to bottom within a
//! column, columns left to right.

pub mod diff;

use std::cell::OnceCell;
use std::rc::Rc;
use std::time::Duration;

use tracing::debug;

use crate::error::{PlayerError, PlayerResult};
use crate::types::{ColorIndex, EncodedFrame, FrameData, Run};

pub type DecodedFrame = Vec<ColorIndex>;

/// Expand every encoded frame to exactly `cell_count` color indices.
///
/// Any frame whose runs do not add up to `cell_count` fails the whole
/// dataset; there is no truncation or padding.
pub fn decode(encoded: &[EncodedFrame], cell_count: usize) -> PlayerResult<Vec<DecodedFrame>> {
    encoded
        .iter()
        .enumerate()
        .map(|(frame, runs)| decode_frame(frame, runs, cell_count))
        .collect()
}

fn decode_frame(frame: usize, runs: &[Run], cell_count: usize) -> PlayerResult<DecodedFrame> {
    let actual: usize = runs.iter().map(|run| run.len as usize).sum();
    if actual != cell_count {
        return Err(PlayerError::MalformedFrame {
            frame,
            expected: cell_count,
            actual,
        });
    }

    let mut cells = Vec::with_capacity(cell_count);
    for run in runs {
        if run.len == 0 {
            return Err(PlayerError::EmptyRun { frame });
        }
        let color = ColorIndex::new(run.color).ok_or(PlayerError::InvalidColor {
            frame,
            index: run.color,
        })?;
        cells.extend(std::iter::repeat_n(color, run.len as usize));
    }
    Ok(cells)
}

/// Encode one decoded frame with maximal runs: adjacent runs never share a color.
pub fn encode(frame: &[ColorIndex]) -> EncodedFrame {
    let mut runs: EncodedFrame = Vec::new();
    for &color in frame {
        match runs.last_mut() {
            Some(last) if last.color == color.get() => last.len += 1,
            _ => runs.push(Run {
                color: color.get(),
                len: 1,
            }),
        }
    }
    runs
}

// ---------------------------------------------------------------------------
// Frame sequence
// ---------------------------------------------------------------------------

/// Decoded frames plus the nominal rate they were sampled at.
#[derive(Debug, Clone)]
pub struct FrameSequence {
    fps: f64,
    frame_duration: Duration,
    total_duration: Duration,
    cell_count: usize,
    frames: Vec<DecodedFrame>,
}

impl FrameSequence {
    pub fn decode(data: &FrameData, cell_count: usize) -> PlayerResult<Self> {
        if !(data.fps.is_finite() && data.fps > 0.0) {
            return Err(PlayerError::InvalidFps(data.fps));
        }
        if data.frames.is_empty() {
            return Err(PlayerError::NoFrames);
        }
        // Rates so low that the timeline does not fit in a `Duration`.
        let (frame_duration, total_duration) = match (
            Duration::try_from_secs_f64(1.0 / data.fps),
            Duration::try_from_secs_f64(data.frames.len() as f64 / data.fps),
        ) {
            (Ok(frame), Ok(total)) => (frame, total),
            _ => return Err(PlayerError::InvalidFps(data.fps)),
        };
        let frames = decode(&data.frames, cell_count)?;
        Ok(FrameSequence {
            fps: data.fps,
            frame_duration,
            total_duration,
            cell_count,
            frames,
        })
    }

    pub fn fps(&self) -> f64 {
        self.fps
    }

    pub fn frame_duration(&self) -> Duration {
        self.frame_duration
    }

    /// Nominal length of the whole sequence.
    pub fn total_duration(&self) -> Duration {
        self.total_duration
    }

    pub fn cell_count(&self) -> usize {
        self.cell_count
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn last_index(&self) -> usize {
        self.frames.len().saturating_sub(1)
    }

    pub fn frame(&self, index: usize) -> &[ColorIndex] {
        &self.frames[index]
    }

    pub fn frames(&self) -> &[DecodedFrame] {
        &self.frames
    }

    /// Cells that differ between frame `index` and the one before it; every
    /// cell for the first frame.
    pub fn changed_cells(&self, index: usize) -> usize {
        match index.checked_sub(1) {
            None => self.cell_count,
            Some(prev) => self.frames[prev]
                .iter()
                .zip(&self.frames[index])
                .filter(|(a, b)| a != b)
                .count(),
        }
    }

    /// Frame shown `elapsed` after playback start, clamped to the last frame.
    pub fn index_at(&self, elapsed: Duration) -> usize {
        let index = (elapsed.as_secs_f64() * self.fps).floor() as usize;
        index.min(self.last_index())
    }
}

// ---------------------------------------------------------------------------
// Lazy cache
// ---------------------------------------------------------------------------

/// Raw frame payload that is decoded on first use and reused afterwards.
///
/// A failed decode is not cached; the error is returned to every caller.
pub struct LazyFrames {
    data: FrameData,
    cell_count: usize,
    decoded: OnceCell<Rc<FrameSequence>>,
}

impl LazyFrames {
    pub fn new(data: FrameData, cell_count: usize) -> Self {
        LazyFrames {
            data,
            cell_count,
            decoded: OnceCell::new(),
        }
    }

    pub fn cell_count(&self) -> usize {
        self.cell_count
    }

    /// Nominal length of the payload, without decoding it. Zero when the
    /// frame rate cannot describe a length.
    pub fn nominal_duration(&self) -> Duration {
        if !(self.data.fps.is_finite() && self.data.fps > 0.0) {
            return Duration::ZERO;
        }
        Duration::try_from_secs_f64(self.data.frames.len() as f64 / self.data.fps)
            .unwrap_or(Duration::ZERO)
    }

    pub fn get(&self) -> PlayerResult<Rc<FrameSequence>> {
        if let Some(frames) = self.decoded.get() {
            return Ok(Rc::clone(frames));
        }
        let frames = Rc::new(FrameSequence::decode(&self.data, self.cell_count)?);
        debug!(
            frames = frames.len(),
            fps = frames.fps(),
            cells = self.cell_count,
            "decoded frame data"
        );
        Ok(Rc::clone(self.decoded.get_or_init(|| frames)))
    }
}
