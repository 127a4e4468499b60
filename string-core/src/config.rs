use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{error::ConfigError, types::MAX_LOOPS};

/// Initial shape of the seed loop.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SeedShape {
    /// Rigidly rotating circle at the discrete equilibrium angular velocity.
    Circle,
    /// Pinched figure-eight-like loop with traveling-wave velocities.
    #[default]
    Perturbed,
}

/// Point-count policy for daughters after a split.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum DaughterResolution {
    /// Each daughter is resampled to the parent's point count.
    #[default]
    MatchParent,
    /// Each daughter keeps its share of the parent's points, floored at
    /// [`SimConfig::min_daughter_points`].
    Proportional,
    /// Each daughter gets one point per `spacing` of its arclength,
    /// clamped to `min_points..=max_points`.
    Density {
        spacing: f64,
        min_points: usize,
        max_points: usize,
    },
}

impl DaughterResolution {
    /// Density policy with half-unit spacing and 20 to 150 points.
    pub const DENSITY: Self = Self::Density {
        spacing: 0.5,
        min_points: 20,
        max_points: 150,
    };
}

/// Point count for a loop of `arclength` at one point per `spacing`,
/// clamped to `min_points..=max_points`.
pub fn density_points(arclength: f64, spacing: f64, min_points: usize, max_points: usize) -> usize {
    let raw = arclength / spacing;
    let raw = if raw.is_finite() && raw > 0.0 {
        raw as usize
    } else {
        0
    };
    raw.clamp(min_points, max_points.max(min_points))
}

/// Periodic re-resampling of loops whose point density has drifted.
///
/// After the split phase, a loop whose density target differs from its
/// current point count by more than `threshold` is resampled to the target.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DriftResample {
    /// Arclength per point.
    pub spacing: f64,
    pub min_points: usize,
    pub max_points: usize,
    /// Tolerated difference between the target and the current count.
    pub threshold: usize,
}

impl Default for DriftResample {
    fn default() -> Self {
        Self {
            spacing: 0.5,
            min_points: 20,
            max_points: 256,
            threshold: 10,
        }
    }
}

impl DriftResample {
    /// Returns the new point count for a loop of `points` points and
    /// `arclength`, or `None` if it is within the threshold.
    pub fn target(&self, points: usize, arclength: f64) -> Option<usize> {
        let target = density_points(arclength, self.spacing, self.min_points, self.max_points);
        (target.abs_diff(points) > self.threshold).then_some(target)
    }
}

fn check_density(
    name: &'static str,
    spacing: f64,
    min_points: usize,
    max_points: usize,
) -> Result<(), ConfigError> {
    if !(spacing.is_finite() && spacing > 0.0) {
        return Err(ConfigError::InvalidParameter {
            name,
            reason: format!("spacing must be positive, got {spacing}"),
        });
    }
    if min_points < 3 || max_points < min_points {
        return Err(ConfigError::InvalidParameter {
            name,
            reason: format!("point range {min_points}..={max_points} must start at 3 or more"),
        });
    }
    Ok(())
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SimConfig {
    /// Initial string tension (coupling).
    pub tension: f64,
    /// Integrator sub-steps per frame.
    pub substeps: usize,
    /// Upper bound applied to every frame delta before sub-stepping.
    pub max_frame_dt: f64,
    /// Per-point speed clamp applied after each sub-step.
    pub max_speed: f64,
    /// Velocity damping rate per unit time.
    pub damping: f64,
    /// Distance below which two non-adjacent points count as crossing.
    pub tolerance: f64,
    /// Minimum cyclic index separation for a pair to be considered.
    pub min_separation: usize,
    /// Population cap, at most [`MAX_LOOPS`].
    pub max_loops: usize,
    /// Point count of the seed loop.
    pub seed_points: usize,
    /// Radius of the seed loop.
    pub seed_radius: f64,
    pub seed_shape: SeedShape,
    /// Amplitude of the seeded random perturbation added to the seed loop.
    pub seed_noise: f64,
    /// Seed of the RNG used for `seed_noise`.
    pub seed: u64,
    pub daughter_resolution: DaughterResolution,
    /// Floor for [`DaughterResolution::Proportional`].
    pub min_daughter_points: usize,
    /// Spline samples per segment when tabulating arclength.
    pub arclength_subdivisions: usize,
    /// Density-driven re-resampling of every loop; off when `None`.
    pub drift_resample: Option<DriftResample>,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            tension: 1.0,
            substeps: 3,
            max_frame_dt: 1.0 / 30.0,
            max_speed: 20.0,
            damping: 0.01,
            tolerance: 0.8,
            min_separation: 8,
            max_loops: MAX_LOOPS,
            seed_points: 64,
            seed_radius: 5.0,
            seed_shape: SeedShape::default(),
            seed_noise: 0.0,
            seed: 0,
            daughter_resolution: DaughterResolution::default(),
            min_daughter_points: 16,
            arclength_subdivisions: 8,
            drift_resample: None,
        }
    }
}

impl SimConfig {
    /// Parses a configuration from JSON. Missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let cfg: Self = serde_json::from_str(json)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Reads and parses a JSON configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    /// Checks that every parameter is within the range the engine supports.
    pub fn validate(&self) -> Result<(), ConfigError> {
        fn invalid(name: &'static str, reason: impl Into<String>) -> ConfigError {
            ConfigError::InvalidParameter {
                name,
                reason: reason.into(),
            }
        }

        if !self.tension.is_finite() {
            return Err(invalid("tension", "must be finite"));
        }
        if self.substeps == 0 {
            return Err(invalid("substeps", "must be at least 1"));
        }
        if !(self.max_frame_dt.is_finite() && self.max_frame_dt > 0.0) {
            return Err(invalid("max_frame_dt", "must be positive"));
        }
        if !(self.max_speed.is_finite() && self.max_speed > 0.0) {
            return Err(invalid("max_speed", "must be positive"));
        }
        if !(self.damping.is_finite() && self.damping >= 0.0) {
            return Err(invalid("damping", "must be non-negative"));
        }
        if !(self.tolerance.is_finite() && self.tolerance > 0.0) {
            return Err(invalid("tolerance", "must be positive"));
        }
        if self.min_separation < 2 {
            return Err(invalid("min_separation", "must be at least 2"));
        }
        if self.max_loops == 0 || self.max_loops > MAX_LOOPS {
            return Err(invalid(
                "max_loops",
                format!("must be in 1..={MAX_LOOPS}"),
            ));
        }
        if self.seed_points < 3 {
            return Err(invalid("seed_points", "must be at least 3"));
        }
        if !(self.seed_radius.is_finite() && self.seed_radius > 0.0) {
            return Err(invalid("seed_radius", "must be positive"));
        }
        if !(self.seed_noise.is_finite() && self.seed_noise >= 0.0) {
            return Err(invalid("seed_noise", "must be non-negative"));
        }
        if self.min_daughter_points < 3 {
            return Err(invalid("min_daughter_points", "must be at least 3"));
        }
        if self.arclength_subdivisions == 0 {
            return Err(invalid("arclength_subdivisions", "must be at least 1"));
        }
        if let DaughterResolution::Density {
            spacing,
            min_points,
            max_points,
        } = self.daughter_resolution
        {
            check_density("daughter_resolution", spacing, min_points, max_points)?;
        }
        if let Some(drift) = &self.drift_resample {
            check_density(
                "drift_resample",
                drift.spacing,
                drift.min_points,
                drift.max_points,
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let cfg = SimConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.max_loops, MAX_LOOPS);
        assert_eq!(cfg.substeps, 3);
    }

    #[test]
    fn json_fills_missing_fields_with_defaults() {
        let cfg = SimConfig::from_json_str(
            r#"{ "tension": 2.5, "seed_shape": "circle", "daughter_resolution": "proportional" }"#,
        )
        .unwrap();

        assert_eq!(cfg.tension, 2.5);
        assert_eq!(cfg.seed_shape, SeedShape::Circle);
        assert_eq!(cfg.daughter_resolution, DaughterResolution::Proportional);
        assert_eq!(cfg.seed_points, SimConfig::default().seed_points);
    }

    #[test]
    fn json_rejects_invalid_values() {
        let err = SimConfig::from_json_str(r#"{ "max_loops": 9 }"#).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidParameter {
                name: "max_loops",
                ..
            }
        ));

        let err = SimConfig::from_json_str("{ not json").unwrap_err();
        assert!(matches!(err, ConfigError::Json(_)));
    }

    #[test]
    fn validate_rejects_tiny_separation_window() {
        let cfg = SimConfig {
            min_separation: 1,
            ..SimConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn json_reads_density_policy_and_drift() {
        let cfg = SimConfig::from_json_str(
            r#"{
                "daughter_resolution": { "density": { "spacing": 0.25, "min_points": 12, "max_points": 90 } },
                "drift_resample": { "threshold": 4 }
            }"#,
        )
        .unwrap();

        assert_eq!(
            cfg.daughter_resolution,
            DaughterResolution::Density {
                spacing: 0.25,
                min_points: 12,
                max_points: 90
            }
        );
        let drift = cfg.drift_resample.unwrap();
        assert_eq!(drift.threshold, 4);
        assert_eq!(drift.max_points, 256);
        assert_eq!(SimConfig::default().drift_resample, None);
    }

    #[test]
    fn validate_rejects_bad_density_ranges() {
        let cfg = SimConfig {
            daughter_resolution: DaughterResolution::Density {
                spacing: 0.0,
                min_points: 20,
                max_points: 150,
            },
            ..SimConfig::default()
        };
        assert!(cfg.validate().is_err());

        let cfg = SimConfig {
            drift_resample: Some(DriftResample {
                min_points: 40,
                max_points: 30,
                ..DriftResample::default()
            }),
            ..SimConfig::default()
        };
        assert!(cfg.validate().is_err());

        let cfg = SimConfig {
            daughter_resolution: DaughterResolution::DENSITY,
            drift_resample: Some(DriftResample::default()),
            ..SimConfig::default()
        };
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn density_points_truncates_and_clamps() {
        assert_eq!(density_points(14.9, 0.5, 20, 150), 29);
        assert_eq!(density_points(3.0, 0.5, 20, 150), 20);
        assert_eq!(density_points(500.0, 0.5, 20, 150), 150);
        assert_eq!(density_points(f64::NAN, 0.5, 20, 150), 20);
    }

    #[test]
    fn drift_target_respects_threshold() {
        let drift = DriftResample::default();
        // 31.4 / 0.5 = 62, within 10 of 64.
        assert_eq!(drift.target(64, 31.4), None);
        // 125.6 / 0.5 = 251.
        assert_eq!(drift.target(64, 125.6), Some(251));
        assert_eq!(drift.target(64, 1.0), Some(20));
    }

    #[test]
    fn load_reports_missing_file() {
        let err = SimConfig::load("/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
