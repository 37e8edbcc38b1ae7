//! Diff-triple datasets.
//!
//! Older datasets store each frame as the list of cells that changed since
//! the previous frame, `[x, y, colorIndex]`, with the first frame diffed
//! against an empty grid. `to_run_length` replays those diffs and re-encodes
//! every full frame with maximal runs.

use serde::{Deserialize, Serialize};

use crate::decoder::encode;
use crate::error::{PlayerError, PlayerResult};
use crate::types::{ColorIndex, FrameData};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiffData {
    pub fps: f64,
    pub frames: Vec<Vec<(u16, u16, u8)>>,
}

impl DiffData {
    pub fn from_json(json: &str) -> PlayerResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Replay `data` on a `columns` × `rows` grid and emit run-length frames.
///
/// Cells never written by the first frame take palette index 0.
pub fn to_run_length(data: &DiffData, columns: usize, rows: usize) -> PlayerResult<FrameData> {
    let mut grid = vec![ColorIndex::default(); columns * rows];
    let mut frames = Vec::with_capacity(data.frames.len());

    for (frame, changes) in data.frames.iter().enumerate() {
        for &(x, y, color) in changes {
            let (col, row) = (x as usize, y as usize);
            if col >= columns || row >= rows {
                return Err(PlayerError::CellOutOfRange { frame, x, y });
            }
            let color =
                ColorIndex::new(color).ok_or(PlayerError::InvalidColor { frame, index: color })?;
            grid[col * rows + row] = color;
        }
        frames.push(encode(&grid));
    }

    Ok(FrameData {
        fps: data.fps,
        frames,
    })
}
