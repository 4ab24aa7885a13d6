//! Progress reporting for `cov sync` and `cov compute`.
//!
//! Progress goes to **stderr** so stdout stays parseable for scripts.

use orbit_coverage_core::engine::RunProgress;
use std::io::Write;

/// A single progress event.
#[derive(Clone, Debug)]
pub enum ProgressEvent {
    /// Listing the source for a satellite. Total unknown.
    Discovering { satellite: String },
    /// Dataset `n` of `total` is being fetched.
    Fetching {
        satellite: String,
        dataset: String,
        n: u64,
        total: u64,
    },
    /// Tiles overlaid so far in the current run.
    Computing {
        satellite: String,
        done: u64,
        total: u64,
    },
}

/// Reports progress. Implementations write to stderr (human or JSON).
pub trait ProgressReporter: Send + Sync {
    fn report(&self, event: ProgressEvent);
}

/// Human-friendly progress on stderr: "S2A  computing  1,024 / 5,000 tiles".
pub struct StderrProgress;

impl ProgressReporter for StderrProgress {
    fn report(&self, event: ProgressEvent) {
        let line = match &event {
            ProgressEvent::Discovering { satellite } => {
                format!("{}  discovering...\n", satellite)
            }
            ProgressEvent::Fetching {
                satellite,
                dataset,
                n,
                total,
            } => format!(
                "{}  fetching  {} / {}  {}\n",
                satellite,
                format_number(*n),
                format_number(*total),
                dataset
            ),
            ProgressEvent::Computing {
                satellite,
                done,
                total,
            } => format!(
                "{}  computing  {} / {} tiles\n",
                satellite,
                format_number(*done),
                format_number(*total)
            ),
        };
        let mut stderr = std::io::stderr().lock();
        let _ = stderr.write_all(line.as_bytes());
        let _ = stderr.flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl ProgressReporter for JsonProgress {
    fn report(&self, event: ProgressEvent) {
        let obj = match &event {
            ProgressEvent::Discovering { satellite } => serde_json::json!({
                "event": "progress",
                "satellite": satellite,
                "phase": "discovering"
            }),
            ProgressEvent::Fetching {
                satellite,
                dataset,
                n,
                total,
            } => serde_json::json!({
                "event": "progress",
                "satellite": satellite,
                "phase": "fetching",
                "dataset": dataset,
                "n": n,
                "total": total
            }),
            ProgressEvent::Computing {
                satellite,
                done,
                total,
            } => serde_json::json!({
                "event": "progress",
                "satellite": satellite,
                "phase": "computing",
                "n": done,
                "total": total
            }),
        };
        if let Ok(line) = serde_json::to_string(&obj) {
            let mut stderr = std::io::stderr().lock();
            let _ = writeln!(stderr, "{}", line);
            let _ = stderr.flush();
        }
    }
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl ProgressReporter for NoProgress {
    fn report(&self, _event: ProgressEvent) {}
}

/// Adapts a [`ProgressReporter`] to the engine's per-batch callback.
pub struct EngineProgress<'a> {
    pub reporter: &'a dyn ProgressReporter,
    pub satellite: String,
}

impl RunProgress for EngineProgress<'_> {
    fn tiles_done(&self, done: u64, total: u64) {
        self.reporter.report(ProgressEvent::Computing {
            satellite: self.satellite.clone(),
            done,
            total,
        });
    }
}

fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + (s.len() - 1) / 3);
    for (i, c) in s.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(c);
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

    pub fn reporter(&self) -> Box<dyn ProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}
