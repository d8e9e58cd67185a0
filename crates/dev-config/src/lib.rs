//! Typed configuration for the develop engine (spec §6 "Configuration", §9
//! "Config/preferences": a typed struct with explicit defaults, not a
//! dynamic map; unknown options are a programmer error).
//!
//! Parsing follows the same `serde` + `toml` shape as the teacher's
//! `core-config`: a raw `ConfigFile` deserialized as-is, wrapped in a
//! `Config` that clamps the few fields with documented bounds and logs when
//! a clamp actually changes the effective value.

use anyhow::Result;
use serde::Deserialize;
use std::{fs, path::PathBuf};
use tracing::warn;

/// Raw display thresholds toggled from the UI (raw highlight clipping,
/// over-exposure warning) — consumed by operators, not interpreted here.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq)]
pub struct DisplayThresholds {
    #[serde(default = "DisplayThresholds::default_raw_clip")]
    pub raw_clip: f32,
    #[serde(default = "DisplayThresholds::default_overexposed")]
    pub overexposed: f32,
}

impl DisplayThresholds {
    const fn default_raw_clip() -> f32 {
        1.0
    }
    const fn default_overexposed() -> f32 {
        1.0
    }
}

impl Default for DisplayThresholds {
    fn default() -> Self {
        Self {
            raw_clip: Self::default_raw_clip(),
            overexposed: Self::default_overexposed(),
        }
    }
}

/// Zoom bounds for the develop controller (spec §4.F, §9 "policy, not
/// invariant; keep them configurable").
#[derive(Debug, Deserialize, Clone, Copy, PartialEq)]
pub struct ZoomBounds {
    #[serde(default = "ZoomBounds::default_max_pixel_factor")]
    pub max_pixel_factor: f32,
    #[serde(default = "ZoomBounds::default_min_fit_factor")]
    pub min_fit_factor: f32,
}

impl ZoomBounds {
    const fn default_max_pixel_factor() -> f32 {
        16.0
    }
    const fn default_min_fit_factor() -> f32 {
        1.0 / 3.0
    }
}

impl Default for ZoomBounds {
    fn default() -> Self {
        Self {
            max_pixel_factor: Self::default_max_pixel_factor(),
            min_fit_factor: Self::default_min_fit_factor(),
        }
    }
}

/// Pipeline timing/coalescing knobs (spec §4.F, §5 "Timeouts").
#[derive(Debug, Deserialize, Clone, Copy, PartialEq)]
pub struct PipelineTiming {
    #[serde(default = "PipelineTiming::default_preview_head_start_ms")]
    pub preview_head_start_ms: u64,
    #[serde(default = "PipelineTiming::default_deferred_save_ms")]
    pub deferred_save_ms: u64,
    #[serde(default = "PipelineTiming::default_max_reentries")]
    pub max_reentries: u8,
    /// Cooperative back-off between DIRTY-loop iterations (spec §4.E step l).
    #[serde(default = "PipelineTiming::default_iteration_backoff_ms")]
    pub iteration_backoff_ms: u64,
    /// Outer-loop idle sleep when there's nothing to do (spec §4.E step l).
    #[serde(default = "PipelineTiming::default_idle_sleep_ms")]
    pub idle_sleep_ms: u64,
}

impl PipelineTiming {
    const fn default_preview_head_start_ms() -> u64 {
        150
    }
    const fn default_deferred_save_ms() -> u64 {
        750
    }
    const fn default_max_reentries() -> u8 {
        2
    }
    const fn default_iteration_backoff_ms() -> u64 {
        250
    }
    const fn default_idle_sleep_ms() -> u64 {
        100
    }
}

impl Default for PipelineTiming {
    fn default() -> Self {
        Self {
            preview_head_start_ms: Self::default_preview_head_start_ms(),
            deferred_save_ms: Self::default_deferred_save_ms(),
            max_reentries: Self::default_max_reentries(),
            iteration_backoff_ms: Self::default_iteration_backoff_ms(),
            idle_sleep_ms: Self::default_idle_sleep_ms(),
        }
    }
}

/// Aggregate byte bounds for the two caches (spec §4.A, §4.B).
#[derive(Debug, Deserialize, Clone, Copy, PartialEq)]
pub struct CacheBounds {
    #[serde(default = "CacheBounds::default_metadata_entries")]
    pub metadata_entries: usize,
    #[serde(default = "CacheBounds::default_pixel_cache_bytes")]
    pub pixel_cache_bytes: u64,
}

impl CacheBounds {
    const fn default_metadata_entries() -> usize {
        2048
    }
    const fn default_pixel_cache_bytes() -> u64 {
        512 * 1024 * 1024
    }
}

impl Default for CacheBounds {
    fn default() -> Self {
        Self {
            metadata_entries: Self::default_metadata_entries(),
            pixel_cache_bytes: Self::default_pixel_cache_bytes(),
        }
    }
}

/// Raw, as-parsed configuration file shape. Unknown keys are ignored
/// (forward compatibility); missing sections fall back to their defaults.
#[derive(Debug, Deserialize, Default, Clone, PartialEq)]
pub struct ConfigFile {
    #[serde(default)]
    pub display: DisplayThresholds,
    #[serde(default)]
    pub zoom: ZoomBounds,
    #[serde(default)]
    pub timing: PipelineTiming,
    #[serde(default)]
    pub cache: CacheBounds,
}

/// The engine-facing configuration: `file` as parsed, plus values clamped
/// to their documented valid ranges.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub file: ConfigFile,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            file: ConfigFile::default(),
        }
    }
}

impl EngineConfig {
    fn clamp(mut file: ConfigFile) -> ConfigFile {
        if !(1.0..=64.0).contains(&file.zoom.max_pixel_factor) {
            warn!(
                target: "config",
                raw = file.zoom.max_pixel_factor,
                "zoom.max_pixel_factor out of [1, 64], clamping"
            );
            file.zoom.max_pixel_factor = file.zoom.max_pixel_factor.clamp(1.0, 64.0);
        }
        if !(0.01..=1.0).contains(&file.zoom.min_fit_factor) {
            warn!(
                target: "config",
                raw = file.zoom.min_fit_factor,
                "zoom.min_fit_factor out of [0.01, 1], clamping"
            );
            file.zoom.min_fit_factor = file.zoom.min_fit_factor.clamp(0.01, 1.0);
        }
        if file.timing.max_reentries == 0 {
            warn!(target: "config", "timing.max_reentries cannot be 0, using 1");
            file.timing.max_reentries = 1;
        }
        file
    }

    pub fn from_file(file: ConfigFile) -> Self {
        Self {
            file: Self::clamp(file),
        }
    }
}

/// Best-effort config path: prefer `./develop.toml`, else the sentinel
/// fallback filename (mirrors the teacher's `discover()`).
pub fn discover() -> PathBuf {
    let local = PathBuf::from("develop.toml");
    if local.exists() {
        return local;
    }
    PathBuf::from("develop.toml")
}

pub fn load_from(path: Option<PathBuf>) -> Result<EngineConfig> {
    let path = path.unwrap_or_else(discover);
    if let Ok(content) = fs::read_to_string(&path) {
        match toml::from_str::<ConfigFile>(&content) {
            Ok(file) => Ok(EngineConfig::from_file(file)),
            Err(e) => {
                warn!(target: "config", error = %e, path = %path.display(), "config parse failed, using defaults");
                Ok(EngineConfig::default())
            }
        }
    } else {
        Ok(EngineConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec_policy_values() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.file.zoom.max_pixel_factor, 16.0);
        assert!((cfg.file.zoom.min_fit_factor - 1.0 / 3.0).abs() < 1e-6);
        assert_eq!(cfg.file.timing.preview_head_start_ms, 150);
        assert_eq!(cfg.file.timing.max_reentries, 2);
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let cfg = load_from(Some(PathBuf::from("__does_not_exist__.toml"))).unwrap();
        assert_eq!(cfg, EngineConfig::default());
    }

    #[test]
    fn parses_overrides() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(
            tmp.path(),
            "[zoom]\nmax_pixel_factor = 8.0\n[timing]\npreview_head_start_ms = 50\n",
        )
        .unwrap();
        let cfg = load_from(Some(tmp.path().to_path_buf())).unwrap();
        assert_eq!(cfg.file.zoom.max_pixel_factor, 8.0);
        assert_eq!(cfg.file.timing.preview_head_start_ms, 50);
        assert_eq!(cfg.file.timing.max_reentries, 2);
    }

    #[test]
    fn clamps_out_of_range_zoom_cap() {
        let file = ConfigFile {
            zoom: ZoomBounds {
                max_pixel_factor: 999.0,
                ..ZoomBounds::default()
            },
            ..ConfigFile::default()
        };
        let cfg = EngineConfig::from_file(file);
        assert_eq!(cfg.file.zoom.max_pixel_factor, 64.0);
    }
}
