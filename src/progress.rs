//! Export progress reporting.
//!
//! Reports observable progress while `digger export` pages through the
//! Discogs collection and downloads record photos. Progress is emitted on
//! **stderr** so stdout remains parseable for scripts.
//!
//! Image progress is an integer percentage of image attempts across all
//! local records; failed downloads count as attempts. Percentages reported
//! during one export never decrease and always end at 100.

use std::io::Write;

/// A single progress event for an export.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ExportProgressEvent {
    /// A page of the remote collection was fetched.
    FetchingCollection { page: u32, pages: u32 },
    /// `done` of `total` images attempted.
    Images { done: u64, total: u64, percent: u8 },
}

impl ExportProgressEvent {
    /// Image progress event; `total == 0` counts as complete.
    pub fn images(done: u64, total: u64) -> Self {
        let percent = if total == 0 {
            100
        } else {
            ((done as f64 / total as f64) * 100.0).round().min(100.0) as u8
        };
        ExportProgressEvent::Images {
            done,
            total,
            percent,
        }
    }
}

/// Receives export progress. Implementations write to stderr (human or
/// JSON) or collect events in tests.
pub trait ExportProgressReporter: Send + Sync {
    fn report(&self, event: ExportProgressEvent);
}

/// Human-friendly progress on stderr: "export  images  3 / 12  (25%)".
pub struct StderrProgress;

impl ExportProgressReporter for StderrProgress {
    fn report(&self, event: ExportProgressEvent) {
        let line = match &event {
            ExportProgressEvent::FetchingCollection { page, pages } => {
                format!("export  discogs collection  page {} / {}\n", page, pages)
            }
            ExportProgressEvent::Images {
                done,
                total,
                percent,
            } => format!(
                "export  images  {} / {}  ({}%)\n",
                format_number(*done),
                format_number(*total),
                percent
            ),
        };
        let _ = std::io::stderr().lock().write_all(line.as_bytes());
        let _ = std::io::stderr().lock().flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl ExportProgressReporter for JsonProgress {
    fn report(&self, event: ExportProgressEvent) {
        let obj = match &event {
            ExportProgressEvent::FetchingCollection { page, pages } => serde_json::json!({
                "event": "progress",
                "phase": "collection",
                "page": page,
                "pages": pages
            }),
            ExportProgressEvent::Images {
                done,
                total,
                percent,
            } => serde_json::json!({
                "event": "progress",
                "phase": "images",
                "n": done,
                "total": total,
                "percent": percent
            }),
        };
        if let Ok(line) = serde_json::to_string(&obj) {
            let _ = writeln!(std::io::stderr().lock(), "{}", line);
            let _ = std::io::stderr().lock().flush();
        }
    }
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl ExportProgressReporter for NoProgress {
    fn report(&self, _event: ExportProgressEvent) {}
}

fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + (s.len() - 1) / 3);
    let chars: Vec<char> = s.chars().rev().collect();
    for (i, c) in chars.iter().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(*c);
    }
    result.chars().rev().collect()
}

/// Progress mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq, clap::ValueEnum)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Default: human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    pub fn reporter(&self) -> Box<dyn ExportProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_number_comma() {
        assert_eq!(format_number(0), "0");
        assert_eq!(format_number(999), "999");
        assert_eq!(format_number(1000), "1,000");
        assert_eq!(format_number(1_234_567), "1,234,567");
    }

    #[test]
    fn image_percent_rounds() {
        assert_eq!(
            ExportProgressEvent::images(1, 3),
            ExportProgressEvent::Images {
                done: 1,
                total: 3,
                percent: 33
            }
        );
        assert_eq!(
            ExportProgressEvent::images(2, 3),
            ExportProgressEvent::Images {
                done: 2,
                total: 3,
                percent: 67
            }
        );
    }

    #[test]
    fn zero_images_is_complete() {
        assert_eq!(
            ExportProgressEvent::images(0, 0),
            ExportProgressEvent::Images {
                done: 0,
                total: 0,
                percent: 100
            }
        );
    }
}
