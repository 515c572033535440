//! Motion request files.
//!
//! A moves file lists requests in submission order:
//!
//! ```toml
//! [[moves]]
//! kind = "reset"
//! targets = { x = 0.005, y = 0.005 }
//!
//! [[moves]]
//! kind = "arc"
//! direction = "ccw"
//! center = [-0.005, 0.0]
//! targets = { x = 0.0, y = 0.01 }
//! speed = 0.02
//! ```

use crate::file;
use anyhow::{Context, Result};
use legato_core::{ArcDirection, Axis, AxisTargets, MotionRequest, MoveKind, SegmentFlags};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, path::Path};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MovesFile {
    #[serde(default)]
    pub moves: Vec<MoveEntry>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MoveEntryKind {
    Absolute,
    Relative,
    Reset,
    Arc,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MoveEntry {
    pub kind: MoveEntryKind,

    /// Axis letter to target value
    #[serde(default)]
    pub targets: BTreeMap<Axis, f64>,

    pub speed: Option<f64>,
    pub acceleration: Option<f64>,

    /// Arc direction; required for arcs
    pub direction: Option<ArcDirection>,

    /// Arc center offset from the start point; required for arcs
    pub center: Option<[f64; 2]>,

    /// Reduce speed to the slowest home speed of the moving axes
    #[serde(default)]
    pub homing: bool,

    #[serde(default)]
    pub flags: SegmentFlags,
}

impl MoveEntry {
    pub fn request(&self) -> Result<MotionRequest> {
        let kind = match self.kind {
            MoveEntryKind::Absolute => MoveKind::Absolute,
            MoveEntryKind::Relative => MoveKind::Relative,
            MoveEntryKind::Reset => MoveKind::Reset,
            MoveEntryKind::Arc => MoveKind::Arc {
                direction: self.direction.context("arc move without direction")?,
                center: self.center.context("arc move without center")?,
            },
        };
        if !matches!(kind, MoveKind::Arc { .. })
            && (self.direction.is_some() || self.center.is_some())
        {
            anyhow::bail!("direction and center only apply to arc moves");
        }

        let targets: AxisTargets = self.targets.iter().map(|(a, v)| (*a, *v)).collect();
        Ok(MotionRequest {
            kind,
            targets,
            speed: self.speed,
            acceleration: self.acceleration,
            flags: self.flags,
        })
    }
}

impl MovesFile {
    /// Load a moves file, auto-detecting TOML or JSON format
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        file::load(path.as_ref(), "moves")
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        file::from_toml(content, "moves")
    }

    pub fn from_json(content: &str) -> Result<Self> {
        file::from_json(content, "moves")
    }

    /// Requests paired with their homing flag, in file order
    pub fn requests(&self) -> Result<Vec<(MotionRequest, bool)>> {
        self.moves
            .iter()
            .enumerate()
            .map(|(index, entry)| {
                let request = entry
                    .request()
                    .with_context(|| format!("invalid move #{}", index + 1))?;
                Ok((request, entry.homing))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_every_kind() {
        let toml = r#"
[[moves]]
kind = "reset"
targets = { x = 0.01 }

[[moves]]
kind = "relative"
targets = { X = 0.001, e = 0.0005 }
speed = 0.05
flags = { cancelable = true }

[[moves]]
kind = "arc"
direction = "clockwise"
center = [-0.01, 0.0]
targets = { x = 0.0, y = 0.01 }

[[moves]]
kind = "absolute"
targets = { x = 0.0 }
homing = true
"#;
        let file = MovesFile::from_toml(toml).unwrap();
        let requests = file.requests().unwrap();
        assert_eq!(requests.len(), 4);

        assert_eq!(requests[0].0.kind, MoveKind::Reset);
        let (relative, _) = &requests[1];
        assert_eq!(relative.targets.get(Axis::X), Some(0.001));
        assert_eq!(relative.targets.get(Axis::E), Some(0.0005));
        assert_eq!(relative.speed, Some(0.05));
        assert!(relative.flags.cancelable);
        assert!(relative.flags.soft_limits);
        assert_eq!(
            requests[2].0.kind,
            MoveKind::Arc {
                direction: ArcDirection::Clockwise,
                center: [-0.01, 0.0]
            }
        );
        assert!(requests[3].1);
    }

    #[test]
    fn arc_needs_center() {
        let json = r#"{ "moves": [ { "kind": "arc", "direction": "cw" } ] }"#;
        let file = MovesFile::from_json(json).unwrap();
        let err = file.requests().unwrap_err();
        assert!(format!("{err:#}").contains("without center"));
    }

    #[test]
    fn center_outside_arc_rejected() {
        let json = r#"{ "moves": [ { "kind": "absolute", "center": [1.0, 0.0] } ] }"#;
        let file = MovesFile::from_json(json).unwrap();
        assert!(file.requests().is_err());
    }
}
