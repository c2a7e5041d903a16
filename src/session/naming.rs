//! File name rules: which inputs are accepted and what the output is called.

/// Extension a submitted file must carry (compared case-insensitively)
pub const ACCEPTED_EXTENSION: &str = "mp4";

/// Extension of the produced file
pub const TARGET_EXTENSION: &str = "mp3";

/// Output name used when no accepted input name is available
pub const DEFAULT_OUTPUT_NAME: &str = "output.mp3";

/// Split `.{extension}` off the end of `file_name`, ignoring ASCII case
pub fn strip_extension<'a>(file_name: &'a str, extension: &str) -> Option<&'a str> {
    let suffix_len = extension.len() + 1;
    if file_name.len() < suffix_len {
        return None;
    }

    let split = file_name.len() - suffix_len;
    if !file_name.is_char_boundary(split) {
        return None;
    }

    let (stem, suffix) = file_name.split_at(split);
    let matches = suffix
        .strip_prefix('.')
        .is_some_and(|ext| ext.eq_ignore_ascii_case(extension));

    matches.then_some(stem)
}

/// Whether a file with this name may be submitted
pub fn is_supported(file_name: &str) -> bool {
    strip_extension(file_name, ACCEPTED_EXTENSION).is_some()
}

/// Name of the produced file for a given input name
///
/// `clip.MP4` becomes `clip.mp3`; anything without the accepted extension
/// falls back to [`DEFAULT_OUTPUT_NAME`].
pub fn output_name(input_name: Option<&str>) -> String {
    input_name
        .and_then(|name| strip_extension(name, ACCEPTED_EXTENSION))
        .map(|stem| format!("{}.{}", stem, TARGET_EXTENSION))
        .unwrap_or_else(|| DEFAULT_OUTPUT_NAME.to_string())
}
