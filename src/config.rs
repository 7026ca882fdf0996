use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ResampleError;

/// All resampling parameters in one struct.
/// Serializable so presets can be stored as TOML next to a database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ResampleConfig {
    /// Number of points in the resampled curve.
    pub npoints: usize,
    /// B-spline degree, 1 to 5. Cubic is recommended; even degrees
    /// behave poorly with very small smoothing factors.
    pub degree: usize,
    /// Upper bound on the sum of squared fit residuals.
    /// Larger = smoother, looser fit. 0 = interpolate the samples.
    pub smoothing: f64,
    /// Curvature bias added everywhere before integration.
    /// Larger = more homogeneous spacing between output points.
    pub smoother: f64,
    /// Resolution of the dense parameter grid used to integrate curvature.
    pub grid_size: usize,
}

impl Default for ResampleConfig {
    fn default() -> Self {
        Self {
            npoints: 200,
            degree: 3,
            smoothing: 1e-6,
            smoother: 10.0,
            grid_size: 1000,
        }
    }
}

impl ResampleConfig {
    /// Check ranges before running the pipeline.
    pub fn validate(&self) -> Result<(), ResampleError> {
        if self.npoints == 0 {
            return Err(ResampleError::InvalidConfig(
                "npoints must be at least 1".into(),
            ));
        }
        if !(1..=5).contains(&self.degree) {
            return Err(ResampleError::InvalidConfig(format!(
                "degree must be between 1 and 5, got {}",
                self.degree
            )));
        }
        if !self.smoothing.is_finite() || self.smoothing < 0.0 {
            return Err(ResampleError::InvalidConfig(format!(
                "smoothing must be finite and non-negative, got {}",
                self.smoothing
            )));
        }
        if !self.smoother.is_finite() || self.smoother < 0.0 {
            return Err(ResampleError::InvalidConfig(format!(
                "smoother must be finite and non-negative, got {}",
                self.smoother
            )));
        }
        if self.grid_size < 2 {
            return Err(ResampleError::InvalidConfig(format!(
                "grid_size must be at least 2, got {}",
                self.grid_size
            )));
        }
        Ok(())
    }

    /// Parse a TOML preset. Missing keys keep their defaults.
    pub fn from_toml_str(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Load and validate a TOML preset file.
    pub fn load_preset(path: &Path) -> Result<Self, ResampleError> {
        let text = std::fs::read_to_string(path).map_err(|e| ResampleError::io(path, e))?;
        let config = Self::from_toml_str(&text).map_err(|e| ResampleError::Preset {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize as a TOML preset.
    pub fn to_toml_string(&self) -> String {
        // A flat struct of numbers always serializes.
        toml::to_string(self).unwrap_or_default()
    }
}
