//! Loader configuration

use serde::{Deserialize, Serialize};

// ============================================================================
// Loader Options
// ============================================================================

/// Trace loader options
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderOptions {
    /// Frames per `FramesLoaded` batch when a trace is fully materialized
    pub frames_per_batch: usize,
    /// Minimum progress advance, in percent, between `Parsed` events
    pub progress_step: u8,
    /// Whether to verify the checksum of every decoded event
    pub verify_checksums: bool,
}

impl Default for LoaderOptions {
    fn default() -> Self {
        LoaderOptions {
            frames_per_batch: 100,
            progress_step: 5,
            verify_checksums: true,
        }
    }
}

impl LoaderOptions {
    /// Interactive options - small batches, frequent progress
    pub fn interactive() -> Self {
        LoaderOptions {
            frames_per_batch: 10,
            progress_step: 1,
            ..Default::default()
        }
    }

    /// Fast options - skip checksum verification
    pub fn fast() -> Self {
        LoaderOptions {
            verify_checksums: false,
            ..Default::default()
        }
    }

    /// Set the batch size (at least 1)
    pub fn with_frames_per_batch(mut self, n: usize) -> Self {
        self.frames_per_batch = n.max(1);
        self
    }

    /// Set the progress step (1-100)
    pub fn with_progress_step(mut self, step: u8) -> Self {
        self.progress_step = step.clamp(1, 100);
        self
    }

    /// Enable or disable checksum verification
    pub fn with_verify_checksums(mut self, verify: bool) -> Self {
        self.verify_checksums = verify;
        self
    }
}
