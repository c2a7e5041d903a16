use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use symphonia::core::codecs::CODEC_TYPE_NULL;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::info;

/// Basic properties of a produced audio file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioSummary {
    /// Duration in seconds, when the container announces a frame count
    pub duration_seconds: Option<f64>,
    pub sample_rate: u32,
    pub channels: u16,
}

impl AudioSummary {
    /// Probe in-memory audio without decoding it
    ///
    /// `extension` is a format hint such as `"mp3"`.
    pub fn probe(bytes: &[u8], extension: &str) -> Result<Self> {
        let source = Cursor::new(bytes.to_vec());
        let mss = MediaSourceStream::new(Box::new(source), Default::default());

        let mut hint = Hint::new();
        hint.with_extension(extension);

        let probed = symphonia::default::get_probe()
            .format(
                &hint,
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|e| anyhow!("Failed to probe audio format: {}", e))?;

        let track = probed
            .format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| anyhow!("No audio track found"))?;

        let params = &track.codec_params;
        let sample_rate = params
            .sample_rate
            .ok_or_else(|| anyhow!("Unknown sample rate"))?;
        let channels = params.channels.map(|c| c.count() as u16).unwrap_or(1);
        let duration_seconds = params
            .n_frames
            .map(|frames| frames as f64 / sample_rate as f64);

        let summary = Self {
            duration_seconds,
            sample_rate,
            channels,
        };

        info!(
            "Audio probed: {}, {}Hz, {} channels",
            summary
                .duration_seconds
                .map(|d| format!("{:.1}s", d))
                .unwrap_or_else(|| "unknown duration".to_string()),
            summary.sample_rate,
            summary.channels
        );

        Ok(summary)
    }
}
