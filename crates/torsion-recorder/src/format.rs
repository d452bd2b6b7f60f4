//! Text layout of a run record.

use std::time::Duration;
use torsion_engine::{RunHeader, Sample};

/// Column names, tab separated in the record.
pub const COLUMNS: [&str; 5] = ["Time", "Voltage_Torque", "Voltage_Angle", "Torque", "Angle"];

/// Column units, tab separated in the record.
pub const UNITS: [&str; 5] = ["[HH:mm:ss.f]", "[V]", "[V]", "[Nm]", "[deg]"];

/// Suffix of the data file name.
pub const DATA_SUFFIX: &str = "_DATA.txt";

pub(crate) const STARTED_PREFIX: &str = "# Measurement started: ";
pub(crate) const SAMPLE_SEPARATOR: &str = " - Sample: ";
pub(crate) const STARTED_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Replace every character outside `[A-Za-z0-9_-]` with `_`.
///
/// An empty or all-whitespace name becomes `unnamed`.
pub fn sanitize_sample_name(name: &str) -> String {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return String::from("unnamed");
    }
    trimmed
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// `{YYYYmmdd}_{HHMMSS}_{sample}`, shared by the run folder and data file.
pub fn run_stem(header: &RunHeader) -> String {
    format!(
        "{}_{}",
        header.started_at.format("%Y%m%d_%H%M%S"),
        sanitize_sample_name(&header.sample_name)
    )
}

/// Elapsed time as `HH:MM:SS.f`, tenths truncated. Hours do not wrap.
pub fn format_elapsed(elapsed: Duration) -> String {
    let tenths = elapsed.as_millis() / 100;
    let total_secs = tenths / 10;
    format!(
        "{:02}:{:02}:{:02}.{}",
        total_secs / 3600,
        (total_secs / 60) % 60,
        total_secs % 60,
        tenths % 10
    )
}

/// Inverse of [`format_elapsed`]. Returns `None` for anything else.
pub fn parse_elapsed(text: &str) -> Option<Duration> {
    let (clock, tenths) = text.split_once('.')?;
    let mut parts = clock.split(':');
    let hours: u64 = parts.next()?.parse().ok()?;
    let minutes: u64 = parts.next()?.parse().ok()?;
    let seconds: u64 = parts.next()?.parse().ok()?;
    if parts.next().is_some() || minutes >= 60 || seconds >= 60 || tenths.len() != 1 {
        return None;
    }
    let tenths: u64 = tenths.parse().ok()?;
    let secs = hours.checked_mul(3600)?.checked_add(minutes * 60 + seconds)?;
    Some(Duration::from_secs(secs) + Duration::from_millis(tenths * 100))
}

/// The four header lines, newline terminated.
pub fn header_text(header: &RunHeader) -> String {
    let params = &header.parameters;
    format!(
        "{STARTED_PREFIX}{}{SAMPLE_SEPARATOR}{}\n\
         # Max Angle [deg]: {} | Max Torque [Nm]: {} | Velocity [deg/s]: {} | \
         Torque Scale [Nm/V]: {} | Interval: {}ms\n\
         {}\n\
         {}\n",
        header.started_at.format(STARTED_FORMAT),
        header.sample_name,
        params.max_angle,
        params.max_torque,
        params.velocity,
        header.torque_scale,
        header.period.as_millis(),
        COLUMNS.join("\t"),
        UNITS.join("\t"),
    )
}

/// One data row, newline terminated.
pub fn row_text(sample: &Sample) -> String {
    format!(
        "{}\t{:.6}\t{:.6}\t{:.6}\t{:.6}\n",
        format_elapsed(sample.elapsed),
        sample.torque_voltage,
        sample.angle_signal,
        sample.torque,
        sample.angle
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize() {
        assert_eq!(sanitize_sample_name("Steel rod #3"), "Steel_rod__3");
        assert_eq!(sanitize_sample_name("  ok-name_1 "), "ok-name_1");
        assert_eq!(sanitize_sample_name("../etc"), "___etc");
        assert_eq!(sanitize_sample_name("Probe\u{e4}"), "Probe_");
        assert_eq!(sanitize_sample_name("   "), "unnamed");
    }

    #[test]
    fn test_elapsed_truncates_tenths() {
        assert_eq!(format_elapsed(Duration::ZERO), "00:00:00.0");
        assert_eq!(format_elapsed(Duration::from_millis(199)), "00:00:00.1");
        assert_eq!(format_elapsed(Duration::from_millis(61_250)), "00:01:01.2");
        assert_eq!(format_elapsed(Duration::from_secs(90_000)), "25:00:00.0");
    }

    #[test]
    fn test_parse_elapsed() {
        assert_eq!(parse_elapsed("00:01:01.2"), Some(Duration::from_millis(61_200)));
        assert_eq!(parse_elapsed("25:00:00.0"), Some(Duration::from_secs(90_000)));
        assert_eq!(parse_elapsed("00:61:00.0"), None);
        assert_eq!(parse_elapsed("00:00:00.12"), None);
        assert_eq!(parse_elapsed("00:00:00"), None);
        assert_eq!(parse_elapsed("a:b:c.d"), None);
    }

    #[test]
    fn test_row_layout() {
        let sample = Sample {
            index: 7,
            elapsed: Duration::from_millis(700),
            torque_voltage: -0.5,
            angle_signal: 1.25,
            torque: -1.0,
            angle: 365.0,
        };
        assert_eq!(
            row_text(&sample),
            "00:00:00.7\t-0.500000\t1.250000\t-1.000000\t365.000000\n"
        );
    }
}
