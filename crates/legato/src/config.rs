use crate::file;
use anyhow::{Context, Result};
use legato_core::{
    Axis, AxisSettings, BedCompensation, ConfigError, KinematicsContext, KinematicsMode,
    kinematics::LinearDelta,
};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, path::Path, sync::Arc};

/// Machine configuration for the Legato motion core
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Kinematics and planner settings
    #[serde(default)]
    pub machine: MachineConfig,

    /// Settings for every active axis, keyed by axis letter
    #[serde(default)]
    pub axes: BTreeMap<Axis, AxisSettings>,

    /// Geometry of the bundled linear delta solver
    pub delta: Option<DeltaConfig>,

    /// Bed tilt compensation
    #[serde(default)]
    pub bed: BedConfig,

    /// Slave axis letter to master axis letter
    #[serde(default)]
    pub slaves: BTreeMap<Axis, Axis>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MachineConfig {
    /// Kinematics name or legacy numeric code
    #[serde(default)]
    pub kinematics: KinematicsSetting,

    /// Axis that receives extrusion moves
    #[serde(default = "default_tool")]
    pub tool: Axis,

    /// Delta moves longer than this are split
    #[serde(default = "default_delta_split_size")]
    pub delta_split_size: f64,

    /// Largest angle covered by one arc sub-segment, in radians
    #[serde(default = "default_arc_resolution")]
    pub arc_resolution: f64,
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            kinematics: KinematicsSetting::default(),
            tool: default_tool(),
            delta_split_size: default_delta_split_size(),
            arc_resolution: default_arc_resolution(),
        }
    }
}

/// `kinematics = "core-xy"` or `kinematics = 2`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum KinematicsSetting {
    Code(i64),
    Name(String),
}

impl Default for KinematicsSetting {
    fn default() -> Self {
        KinematicsSetting::Name(KinematicsMode::Cartesian.to_string())
    }
}

impl KinematicsSetting {
    pub fn mode(&self) -> Result<KinematicsMode, ConfigError> {
        match self {
            KinematicsSetting::Code(code) => KinematicsMode::from_code(*code)
                .ok_or_else(|| ConfigError::UnknownKinematics(code.to_string())),
            KinematicsSetting::Name(name) => KinematicsMode::parse(name)
                .ok_or_else(|| ConfigError::UnknownKinematics(name.clone())),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeltaConfig {
    /// Diagonal rod length
    pub rod_length: f64,

    /// Distance from the center to each tower
    pub radius: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BedConfig {
    /// Row-major 3x3 matrix, either nested rows or nine comma-separated values
    pub matrix: Option<BedMatrix>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BedMatrix {
    Rows([[f64; 3]; 3]),
    Text(String),
}

impl BedMatrix {
    pub fn compensation(&self) -> Result<BedCompensation> {
        match self {
            BedMatrix::Rows(rows) => {
                BedCompensation::from_matrix(*rows).context("invalid bed.matrix")
            }
            BedMatrix::Text(text) => text
                .parse::<BedCompensation>()
                .context("invalid bed.matrix"),
        }
    }
}

fn default_tool() -> Axis {
    Axis::E
}

fn default_delta_split_size() -> f64 {
    legato_core::context::DEFAULT_DELTA_SPLIT_SIZE
}

fn default_arc_resolution() -> f64 {
    legato_core::context::DEFAULT_ARC_RESOLUTION
}

impl Config {
    /// Load configuration from a file, auto-detecting TOML or JSON format
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        file::load(path.as_ref(), "config")
    }

    /// Parse configuration from TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        file::from_toml(content, "config")
    }

    /// Parse configuration from JSON string
    pub fn from_json(content: &str) -> Result<Self> {
        file::from_json(content, "config")
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.axes.is_empty() {
            anyhow::bail!("no axes configured");
        }

        let mode = self.machine.kinematics.mode()?;
        if mode == KinematicsMode::Delta && self.delta.is_none() {
            anyhow::bail!("delta kinematics requires a [delta] section");
        }

        if let Some(delta) = &self.delta {
            if !(delta.radius.is_finite() && delta.radius > 0.0) {
                anyhow::bail!("delta.radius must be positive");
            }
            if !(delta.rod_length.is_finite() && delta.rod_length > delta.radius) {
                anyhow::bail!("delta.rod_length must be longer than delta.radius");
            }
        }

        if let Some(matrix) = &self.bed.matrix {
            matrix.compensation()?;
        }

        Ok(())
    }

    /// Build the validated kinematics context
    pub fn context(&self) -> Result<KinematicsContext> {
        self.validate()?;

        let mut builder = KinematicsContext::builder(self.machine.kinematics.mode()?)
            .tool(self.machine.tool)
            .delta_split_size(self.machine.delta_split_size)
            .arc_resolution(self.machine.arc_resolution);

        for (axis, settings) in &self.axes {
            builder = builder.axis(*axis, *settings);
        }
        if let Some(delta) = &self.delta {
            builder = builder.delta(Arc::new(LinearDelta::new(delta.rod_length, delta.radius)));
        }
        if let Some(matrix) = &self.bed.matrix {
            builder = builder.bed_matrix(*matrix.compensation()?.matrix());
        }
        for (slave, master) in &self.slaves {
            builder = builder.slave(*slave, *master);
        }

        builder.build().context("invalid machine configuration")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_toml() {
        let toml = r#"
[machine]
kinematics = "core-xy"
tool = "h"

[axes.x]
steps_per_unit = 80000.0
soft_min = 0.0
soft_max = 0.2
backlash = 0.0001

[axes.y]
steps_per_unit = 80000.0

[axes.e]
steps_per_unit = 500000.0

[axes.h]
steps_per_unit = 500000.0

[axes.a]
steps_per_unit = 80000.0

[slaves]
a = "x"
"#;

        let config = Config::from_toml(toml).unwrap();
        assert_eq!(
            config.machine.kinematics.mode(),
            Ok(KinematicsMode::CoreXy)
        );
        assert_eq!(config.machine.tool, Axis::H);
        assert_eq!(config.axes[&Axis::X].soft_max, 0.2);
        assert_eq!(config.axes[&Axis::Y].soft_max, 1000.0);
        assert_eq!(config.slaves[&Axis::A], Axis::X);

        let ctx = config.context().unwrap();
        assert_eq!(ctx.tool(), Axis::H);
        assert_eq!(ctx.master_of(Axis::A), Some(Axis::X));
        assert_eq!(ctx.backlash()[0], 0.0001);
    }

    #[test]
    fn test_parse_json() {
        let json = r#"{
            "machine": { "kinematics": 3 },
            "axes": {
                "X": { "steps_per_unit": 10000.0 },
                "Y": { "steps_per_unit": 10000.0 },
                "Z": { "steps_per_unit": 10000.0 },
                "E": { "steps_per_unit": 10000.0 }
            },
            "delta": { "rod_length": 0.25, "radius": 0.12 }
        }"#;

        let config = Config::from_json(json).unwrap();
        let ctx = config.context().unwrap();
        assert_eq!(ctx.mode(), KinematicsMode::Delta);
        assert!(ctx.is_active(Axis::Z));
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(
            config.machine.kinematics.mode(),
            Ok(KinematicsMode::Cartesian)
        );
        assert_eq!(config.machine.tool, Axis::E);
        assert_eq!(config.machine.arc_resolution, 0.001);
        assert!(config.axes.is_empty());
        // nothing to move
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_unknown_kinematics() {
        let config = Config::from_toml("[machine]\nkinematics = \"scara\"").unwrap();
        assert_eq!(
            config.machine.kinematics.mode(),
            Err(ConfigError::UnknownKinematics("scara".into()))
        );
        let config = Config::from_toml("[machine]\nkinematics = 7").unwrap();
        assert!(config.machine.kinematics.mode().is_err());
    }

    #[test]
    fn test_missing_steps_per_unit() {
        let toml = r#"
[axes.x]
steps_per_unit = 100.0

[axes.e]
backlash = 0.001
"#;
        let config = Config::from_toml(toml).unwrap();
        let err = config.context().unwrap_err();
        let cause = err.downcast_ref::<ConfigError>().unwrap();
        assert_eq!(cause, &ConfigError::MissingStepsPerUnit { axis: Axis::E });
    }

    #[test]
    fn test_delta_requires_geometry() {
        let toml = r#"
[machine]
kinematics = "delta"

[axes.e]
steps_per_unit = 100.0
"#;
        let config = Config::from_toml(toml).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_bed_matrix_forms() {
        let rows = r#"
[axes.e]
steps_per_unit = 100.0

[bed]
matrix = [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.01, 0.0, 1.0]]
"#;
        let ctx = Config::from_toml(rows).unwrap().context().unwrap();
        assert_eq!(ctx.bed().matrix()[2][0], 0.01);

        let text = r#"
[axes.e]
steps_per_unit = 100.0

[bed]
matrix = "1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.01, 0.0, 1.0"
"#;
        let ctx = Config::from_toml(text).unwrap().context().unwrap();
        assert_eq!(ctx.bed().matrix()[2][0], 0.01);

        let singular = r#"
[axes.e]
steps_per_unit = 100.0

[bed]
matrix = "0, 0, 0, 0, 1, 0, 0, 0, 1"
"#;
        assert!(Config::from_toml(singular).unwrap().validate().is_err());
    }

    #[test]
    fn test_unknown_fields_rejected() {
        assert!(Config::from_toml("[axes.x]\nsteps = 100.0").is_err());
    }
}
