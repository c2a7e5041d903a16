//! Parser for ffmpeg's `-progress` output.
//!
//! ffmpeg prints blocks of `key=value` lines terminated by a
//! `progress=continue` or `progress=end` line. The total duration comes from
//! the regular log (`Duration: 00:01:02.50, start: ...`), which shares the
//! stream when progress is written to stderr.

/// What a single output line meant to the parser
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ProgressLine {
    /// End of a progress block, with the fraction of the input processed
    Fraction(f64),
    /// A progress field with nothing to report yet
    Field,
    /// A regular log line
    Log,
}

/// Incremental state for one ffmpeg run
#[derive(Debug, Default)]
pub struct ProgressParser {
    duration_us: Option<i64>,
    out_time_us: Option<i64>,
}

impl ProgressParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total input duration, once the log has announced it
    pub fn duration_us(&self) -> Option<i64> {
        self.duration_us
    }

    /// Consume one line of output
    ///
    /// The fraction is not clamped: ffmpeg reports slightly negative
    /// `out_time_us` at the start of some inputs and overshoots the probed
    /// duration at the end of others.
    pub fn feed(&mut self, line: &str) -> ProgressLine {
        let line = line.trim();

        if let Some(value) = line.strip_prefix("out_time_us=") {
            self.out_time_us = value.parse().ok();
            return ProgressLine::Field;
        }

        if let Some(state) = line.strip_prefix("progress=") {
            if state == "end" {
                return ProgressLine::Fraction(1.0);
            }
            return match (self.out_time_us, self.duration_us) {
                (Some(out_us), Some(total_us)) if total_us > 0 => {
                    ProgressLine::Fraction(out_us as f64 / total_us as f64)
                }
                _ => ProgressLine::Field,
            };
        }

        if is_progress_field(line) {
            return ProgressLine::Field;
        }

        if self.duration_us.is_none() {
            if let Some(duration) = parse_duration_line(line) {
                self.duration_us = Some(duration);
            }
        }

        ProgressLine::Log
    }
}

/// `key=value` with a bare lowercase key, e.g. `total_size=1024`
fn is_progress_field(line: &str) -> bool {
    match line.split_once('=') {
        Some((key, _)) => {
            !key.is_empty()
                && key
                    .chars()
                    .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
        }
        None => false,
    }
}

/// Parse `Duration: HH:MM:SS.ff, ...` into microseconds
fn parse_duration_line(line: &str) -> Option<i64> {
    let rest = line.strip_prefix("Duration:")?;
    let timestamp = rest.split(',').next()?;
    parse_timestamp_us(timestamp)
}

fn parse_timestamp_us(timestamp: &str) -> Option<i64> {
    let mut parts = timestamp.trim().split(':');
    let hours: i64 = parts.next()?.parse().ok()?;
    let minutes: i64 = parts.next()?.parse().ok()?;
    let seconds: f64 = parts.next()?.parse().ok()?;
    if parts.next().is_some() {
        return None;
    }

    Some(hours * 3_600_000_000 + minutes * 60_000_000 + (seconds * 1_000_000.0).round() as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duration_line_sets_total() {
        let mut parser = ProgressParser::new();
        let line = "  Duration: 00:01:02.50, start: 0.000000, bitrate: 1205 kb/s";

        assert_eq!(parser.feed(line), ProgressLine::Log);
        assert_eq!(parser.duration_us(), Some(62_500_000));
    }

    #[test]
    fn unknown_duration_is_ignored() {
        let mut parser = ProgressParser::new();
        parser.feed("  Duration: N/A, bitrate: N/A");
        assert_eq!(parser.duration_us(), None);
    }

    #[test]
    fn progress_block_reports_fraction() {
        let mut parser = ProgressParser::new();
        parser.feed("Duration: 00:00:10.00, start: 0.000000, bitrate: 128 kb/s");

        assert_eq!(parser.feed("bitrate= 128.0kbits/s"), ProgressLine::Field);
        assert_eq!(parser.feed("out_time_us=2500000"), ProgressLine::Field);
        assert_eq!(parser.feed("speed=41.2x"), ProgressLine::Field);
        assert_eq!(parser.feed("progress=continue"), ProgressLine::Fraction(0.25));
    }

    #[test]
    fn progress_without_duration_reports_nothing() {
        let mut parser = ProgressParser::new();
        parser.feed("out_time_us=2500000");
        assert_eq!(parser.feed("progress=continue"), ProgressLine::Field);
    }

    #[test]
    fn end_of_stream_reports_completion() {
        let mut parser = ProgressParser::new();
        assert_eq!(parser.feed("progress=end"), ProgressLine::Fraction(1.0));
    }

    #[test]
    fn fraction_is_not_clamped() {
        let mut parser = ProgressParser::new();
        parser.feed("Duration: 00:00:01.00, start: 0.000000, bitrate: 128 kb/s");

        parser.feed("out_time_us=-23000");
        assert_eq!(parser.feed("progress=continue"), ProgressLine::Fraction(-0.023));

        parser.feed("out_time_us=1100000");
        assert_eq!(parser.feed("progress=continue"), ProgressLine::Fraction(1.1));
    }

    #[test]
    fn log_lines_are_passed_through() {
        let mut parser = ProgressParser::new();
        assert_eq!(
            parser.feed("[mp3 @ 0x55d5] Invalid data found when processing input"),
            ProgressLine::Log
        );
        assert_eq!(parser.feed("Stream mapping:"), ProgressLine::Log);
    }

    #[test]
    fn timestamps_parse_to_microseconds() {
        assert_eq!(parse_timestamp_us("01:00:00.00"), Some(3_600_000_000));
        assert_eq!(parse_timestamp_us("00:00:00.04"), Some(40_000));
        assert_eq!(parse_timestamp_us("00:00"), None);
        assert_eq!(parse_timestamp_us("N/A"), None);
    }
}
