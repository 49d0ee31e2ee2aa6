use std::path::PathBuf;

/// Fatal errors surfaced before any trial runs. Per-trial failures are never
/// represented here; they are recorded as `TrialOutcome.error` and the sweep
/// continues.
#[derive(Debug, thiserror::Error)]
pub enum SweepError {
    #[error("invalid grid axis {axis}: {reason} (start={start}, end={end}, step={step})")]
    InvalidGridSpec {
        axis: &'static str,
        reason: &'static str,
        start: u32,
        end: u32,
        step: u32,
    },

    #[error("result store at {path} exists but is not parseable: {source}")]
    CorruptStore {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("i/o error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl SweepError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        SweepError::Io {
            path: path.into(),
            source,
        }
    }
}
