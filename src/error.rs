use thiserror::Error;

use crate::models::ColorClass;

/// Per-frame failure taxonomy. Every variant aborts the current pipeline
/// run only; the processing slot is freed and the next frame starts clean.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Failed to decode frame payload: {0}")]
    Decode(String),

    #[error("Detector failed on {} pass: {message}", .color.label())]
    Detector { color: ColorClass, message: String },

    #[error("Frame of {height} rows cannot be cropped by top_cutoff={cutoff}")]
    BadCutoff { height: u32, cutoff: u32 },
}

pub type Result<T> = std::result::Result<T, PipelineError>;
