//! Grid configuration merged from three sources in increasing priority:
//! built-in defaults, an optional YAML file, and command-line overrides.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::warn;

use sweep_runner::{GridAxis, GridSpec, TraversalOrder};

pub const DEFAULT_CTX_START: u32 = 8192;
pub const DEFAULT_CTX_END: u32 = 102400;
pub const DEFAULT_CTX_STEP: u32 = 2048;

pub const DEFAULT_BATCH_START: u32 = 32;
pub const DEFAULT_BATCH_END: u32 = 2080;
pub const DEFAULT_BATCH_STEP: u32 = 128;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AxisFileConfig {
    #[serde(default)]
    pub start: Option<u32>,
    #[serde(default)]
    pub end: Option<u32>,
    #[serde(default)]
    pub step: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub num_ctx: AxisFileConfig,
    #[serde(default)]
    pub num_batch: AxisFileConfig,
    #[serde(default)]
    pub test_row_first: bool,
}

/// A missing file falls back to defaults; a present but unparseable one is a
/// startup error, since silently discarding operator configuration would run
/// the wrong grid for hours.
pub fn load_file_config(path: &Path) -> Result<FileConfig> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!(path = %path.display(), "config file not found, using defaults");
            return Ok(FileConfig::default());
        }
        Err(e) => {
            return Err(e).with_context(|| format!("reading config file {}", path.display()))
        }
    };
    serde_yaml::from_str(&raw).with_context(|| format!("parsing config file {}", path.display()))
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AxisOverrides {
    pub start: Option<u32>,
    pub end: Option<u32>,
    pub step: Option<u32>,
}

fn resolve_axis(
    name: &'static str,
    defaults: (u32, u32, u32),
    file: &AxisFileConfig,
    overrides: AxisOverrides,
) -> Result<GridAxis> {
    let start = overrides.start.or(file.start).unwrap_or(defaults.0);
    let end = overrides.end.or(file.end).unwrap_or(defaults.1);
    let step = overrides.step.or(file.step).unwrap_or(defaults.2);
    Ok(GridAxis::new(name, start, end, step)?)
}

pub fn resolve_grid(
    file: &FileConfig,
    ctx_overrides: AxisOverrides,
    batch_overrides: AxisOverrides,
) -> Result<GridSpec> {
    let num_ctx = resolve_axis(
        "num_ctx",
        (DEFAULT_CTX_START, DEFAULT_CTX_END, DEFAULT_CTX_STEP),
        &file.num_ctx,
        ctx_overrides,
    )?;
    let num_batch = resolve_axis(
        "num_batch",
        (DEFAULT_BATCH_START, DEFAULT_BATCH_END, DEFAULT_BATCH_STEP),
        &file.num_batch,
        batch_overrides,
    )?;
    let order = if file.test_row_first {
        TraversalOrder::RowFirst
    } else {
        TraversalOrder::ColumnFirst
    };
    Ok(GridSpec::new(num_ctx, num_batch, order))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_with_no_file_and_no_overrides() {
        let grid = resolve_grid(
            &FileConfig::default(),
            AxisOverrides::default(),
            AxisOverrides::default(),
        )
        .unwrap();
        assert_eq!(grid.num_ctx.describe(), "8192-102400:2048");
        assert_eq!(grid.num_batch.describe(), "32-2080:128");
        assert_eq!(grid.order, TraversalOrder::ColumnFirst);
    }

    #[test]
    fn file_config_overrides_defaults() {
        let file: FileConfig = serde_yaml::from_str(
            "num_ctx:\n  start: 4096\n  end: 8192\n  step: 1024\ntest_row_first: true\n",
        )
        .unwrap();
        let grid = resolve_grid(&file, AxisOverrides::default(), AxisOverrides::default()).unwrap();
        assert_eq!(grid.num_ctx.describe(), "4096-8192:1024");
        // Unspecified axis keeps its defaults.
        assert_eq!(grid.num_batch.describe(), "32-2080:128");
        assert_eq!(grid.order, TraversalOrder::RowFirst);
    }

    #[test]
    fn cli_overrides_beat_file_config() {
        let file: FileConfig =
            serde_yaml::from_str("num_ctx:\n  start: 4096\n  end: 8192\n").unwrap();
        let grid = resolve_grid(
            &file,
            AxisOverrides {
                start: Some(2048),
                end: None,
                step: None,
            },
            AxisOverrides::default(),
        )
        .unwrap();
        // CLI start wins, file end survives, default step survives.
        assert_eq!(grid.num_ctx.describe(), "2048-8192:2048");
    }

    #[test]
    fn invalid_resolved_axis_is_an_error() {
        let err = resolve_grid(
            &FileConfig::default(),
            AxisOverrides {
                start: Some(200_000),
                end: None,
                step: None,
            },
            AxisOverrides::default(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("num_ctx"));
    }

    #[test]
    fn missing_config_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_file_config(&dir.path().join("benchmark_config.yaml")).unwrap();
        assert!(config.num_ctx.start.is_none());
        assert!(!config.test_row_first);
    }

    #[test]
    fn unparseable_config_file_is_a_startup_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("benchmark_config.yaml");
        fs::write(&path, "num_ctx: [not a map\n").unwrap();
        assert!(load_file_config(&path).is_err());
    }
}
