//! Pipeline and model configuration.

use std::path::PathBuf;

/// Default confidence for both detection and tracking.
pub const DEFAULT_CONFIDENCE: f32 = 0.5;

/// Configuration for [`crate::VideoPipeline`].
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Root under which each run creates its `<name>_<timestamp>` directory
    pub downloads_root: PathBuf,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            downloads_root: default_downloads_root(),
        }
    }
}

impl PipelineConfig {
    /// Create config with an explicit downloads root.
    pub fn with_downloads_root(root: impl Into<PathBuf>) -> Self {
        Self {
            downloads_root: root.into(),
        }
    }

    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            downloads_root: std::env::var("TANDEN_DOWNLOADS_DIR")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .map(PathBuf::from)
                .unwrap_or_else(default_downloads_root),
        }
    }
}

/// The user's download directory, or `~/Downloads` when the platform has none.
pub fn default_downloads_root() -> PathBuf {
    dirs::download_dir()
        .or_else(|| dirs::home_dir().map(|home| home.join("Downloads")))
        .unwrap_or_else(|| PathBuf::from("Downloads"))
}

/// Configuration for [`crate::BlazePoseModel`].
#[derive(Debug, Clone)]
pub struct PoseModelConfig {
    /// Path to the landmark ONNX model; default search paths are tried when unset
    pub model_path: Option<PathBuf>,
    /// Minimum pose presence to accept a detection from a full-frame search
    pub min_detection_confidence: f32,
    /// Minimum pose presence to keep tracking from the previous frame's region
    pub min_tracking_confidence: f32,
}

impl Default for PoseModelConfig {
    fn default() -> Self {
        Self {
            model_path: None,
            min_detection_confidence: DEFAULT_CONFIDENCE,
            min_tracking_confidence: DEFAULT_CONFIDENCE,
        }
    }
}

impl PoseModelConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            model_path: std::env::var("TANDEN_POSE_MODEL").ok().map(PathBuf::from),
            min_detection_confidence: env_confidence("TANDEN_MIN_DETECTION_CONFIDENCE"),
            min_tracking_confidence: env_confidence("TANDEN_MIN_TRACKING_CONFIDENCE"),
        }
    }
}

fn env_confidence(var: &str) -> f32 {
    std::env::var(var)
        .ok()
        .and_then(|s| s.parse::<f32>().ok())
        .filter(|v| (0.0..=1.0).contains(v))
        .unwrap_or(DEFAULT_CONFIDENCE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_config_defaults() {
        let config = PoseModelConfig::default();
        assert!(config.model_path.is_none());
        assert_eq!(config.min_detection_confidence, 0.5);
        assert_eq!(config.min_tracking_confidence, 0.5);
    }

    #[test]
    fn test_explicit_downloads_root() {
        let config = PipelineConfig::with_downloads_root("/data/out");
        assert_eq!(config.downloads_root, PathBuf::from("/data/out"));
    }

    #[test]
    fn test_default_root_is_not_empty() {
        assert!(!default_downloads_root().as_os_str().is_empty());
    }
}
