//! Overlapping line-window splitter.
//!
//! Splits source text into windows of `window` consecutive lines, each
//! window starting `window - overlap` lines after the previous one, so
//! consecutive chunks share `overlap` lines of context. Windows whose
//! trimmed content is empty are dropped, but the scan still advances —
//! a run of blank lines never stalls or extends the walk.
//!
//! The step computation degenerates to zero progress when
//! `overlap >= window`, so that case is rejected up front as a
//! configuration error instead of looping forever.

use crate::errors::StoreError;

/// Default window size in lines.
pub const DEFAULT_WINDOW: usize = 40;
/// Default overlap between consecutive windows, in lines.
pub const DEFAULT_OVERLAP: usize = 10;

/// Window/overlap settings for [`split_lines`].
#[derive(Debug, Clone, Copy)]
pub struct SplitterConfig {
    /// Lines per chunk.
    pub window: usize,
    /// Lines shared between consecutive chunks. Must be `< window`.
    pub overlap: usize,
}

impl Default for SplitterConfig {
    fn default() -> Self {
        SplitterConfig {
            window: DEFAULT_WINDOW,
            overlap: DEFAULT_OVERLAP,
        }
    }
}

impl SplitterConfig {
    /// Reject window/overlap combinations that cannot make progress.
    pub fn validate(&self) -> Result<(), StoreError> {
        if self.window == 0 {
            return Err(StoreError::Config(
                "chunking.window_lines must be > 0".to_string(),
            ));
        }
        if self.overlap >= self.window {
            return Err(StoreError::Config(format!(
                "chunking.overlap_lines ({}) must be smaller than chunking.window_lines ({})",
                self.overlap, self.window
            )));
        }
        Ok(())
    }
}

/// Split text into overlapping line windows.
///
/// Returns chunk strings in scan order. Deterministic: the same text and
/// config always produce the same chunks. Text shorter than one window
/// yields a single chunk (if non-empty after trimming), an all-blank text
/// yields none.
pub fn split_lines(text: &str, config: &SplitterConfig) -> Result<Vec<String>, StoreError> {
    config.validate()?;

    let lines: Vec<&str> = text.split('\n').collect();
    let step = config.window - config.overlap;
    let mut chunks = Vec::new();

    let mut start = 0;
    while start < lines.len() {
        let end = (start + config.window).min(lines.len());
        let chunk = lines[start..end].join("\n");
        if !chunk.trim().is_empty() {
            chunks.push(chunk);
        }
        start += step;
    }

    Ok(chunks)
}
