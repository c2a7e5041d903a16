//! Conversion engine
//!
//! The engine is an external collaborator: the session only writes an input
//! file, runs one fixed transcode and reads the result back.

pub mod backend;
pub mod ffmpeg;
pub mod handle;
pub mod progress;

pub use backend::{ConversionEngine, EngineFactory, ProgressReceiver};
pub use ffmpeg::{FfmpegConfig, FfmpegEngine};
pub use handle::{EngineHandle, EngineLease};
pub use progress::{ProgressLine, ProgressParser};

/// Working file the input is written to
pub const INPUT_FILE: &str = "input.mp4";

/// Working file the transcode produces
pub const OUTPUT_FILE: &str = "output.mp3";

/// Audio-only extraction to MP3 with LAME VBR quality 2
pub fn transcode_args() -> Vec<String> {
    [
        "-i",
        INPUT_FILE,
        "-vn",
        "-acodec",
        "libmp3lame",
        "-q:a",
        "2",
        OUTPUT_FILE,
    ]
    .into_iter()
    .map(String::from)
    .collect()
}
