pub type PlayerResult<T> = Result<T, PlayerError>;

#[derive(thiserror::Error, Debug)]
pub enum PlayerError {
    #[error("malformed frame {frame}: runs expand to {actual} cells, expected {expected}")]
    MalformedFrame {
        frame: usize,
        expected: usize,
        actual: usize,
    },

    #[error("malformed frame {frame}: color index {index} is outside the palette")]
    InvalidColor { frame: usize, index: u8 },

    #[error("malformed frame {frame}: zero-length run")]
    EmptyRun { frame: usize },

    #[error("malformed frame {frame}: cell ({x}, {y}) is outside the grid")]
    CellOutOfRange { frame: usize, x: u16, y: u16 },

    #[error("frame data contains no frames")]
    NoFrames,

    #[error("invalid frame rate: {0}")]
    InvalidFps(f64),

    #[error("grid has {actual} cells, expected {expected}")]
    StructuralMismatch { expected: usize, actual: usize },

    #[error("invalid color literal: {0:?}")]
    InvalidColorLiteral(String),

    #[error("audio error: {0}")]
    Audio(String),

    #[error("config error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Unparsable frame or diff payload. Config files report `Config` instead.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl PlayerError {
    pub fn audio(msg: impl Into<String>) -> Self {
        Self::Audio(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Whether this error comes from the frame payload itself.
    pub fn is_malformed_input(&self) -> bool {
        matches!(
            self,
            Self::MalformedFrame { .. }
                | Self::InvalidColor { .. }
                | Self::EmptyRun { .. }
                | Self::CellOutOfRange { .. }
                | Self::NoFrames
                | Self::InvalidFps(_)
                | Self::Json(_)
        )
    }
}
