//! The fixed, linear stage order of the pipeline.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One ordered step of the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    /// Walk the input directory for media files.
    Discover,
    /// Pull the audio track out of each video via ffmpeg.
    Extract,
    /// Push each audio file to object storage.
    Upload,
    /// Turn each uploaded audio file into a transcript.
    Transcribe,
    /// Condense each transcript into a summary.
    Summarize,
}

/// Canonical execution order.
pub const STAGE_ORDER: [Stage; 5] = [
    Stage::Discover,
    Stage::Extract,
    Stage::Upload,
    Stage::Transcribe,
    Stage::Summarize,
];

impl Stage {
    /// The 1-based checkpoint index of this stage.
    ///
    /// A checkpoint value of `index(S)` means S has fully completed; 0 means
    /// a fresh run.
    #[must_use]
    pub const fn index(self) -> u32 {
        match self {
            Self::Discover => 1,
            Self::Extract => 2,
            Self::Upload => 3,
            Self::Transcribe => 4,
            Self::Summarize => 5,
        }
    }

    /// The checkpoint value that marks the whole run complete.
    #[must_use]
    pub const fn terminal() -> u32 {
        Self::Summarize.index()
    }

    /// The stage label used in events and logging.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Discover => "discover",
            Self::Extract => "extract",
            Self::Upload => "upload",
            Self::Transcribe => "transcribe",
            Self::Summarize => "summarize",
        }
    }

    /// The manifest file written at this stage's output boundary.
    #[must_use]
    pub const fn manifest_name(self) -> &'static str {
        match self {
            Self::Discover => "discovered.json",
            Self::Extract => "extracted.json",
            Self::Upload => "uploaded.json",
            Self::Transcribe => "transcripts.json",
            Self::Summarize => "summaries.json",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
