use serde::{Deserialize, Serialize};

/// Shown when the submitted file is not an MP4
pub const DEFAULT_VALIDATION_MESSAGE: &str = "MP4 파일만 지원됩니다. .mp4 파일을 선택해 주세요.";

/// Shown for any failure while loading the engine or converting
pub const DEFAULT_PROCESSING_MESSAGE: &str =
    "변환 중 오류가 발생했습니다. 파일이 올바른 MP4 형식인지 확인해 주세요.";

/// Configuration for a conversion session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// User-facing message for a rejected file name
    pub validation_message: String,

    /// User-facing message for engine and transcode failures
    pub processing_message: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            validation_message: DEFAULT_VALIDATION_MESSAGE.to_string(),
            processing_message: DEFAULT_PROCESSING_MESSAGE.to_string(),
        }
    }
}
