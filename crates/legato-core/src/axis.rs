// Logical axis set shared by every per-axis array

use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of logical axes. Every per-axis array is indexed in [`Axis::ALL`] order.
pub const AXIS_COUNT: usize = 8;

/// Number of spatial axes (X, Y, Z) that take part in magnitude and bed compensation.
pub const SPATIAL_AXES: usize = 3;

/// One value per logical axis.
pub type AxisVec = [f64; AXIS_COUNT];

/// Logical axis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    #[serde(alias = "X")]
    X,
    #[serde(alias = "Y")]
    Y,
    #[serde(alias = "Z")]
    Z,
    /// Default extrusion axis
    #[serde(alias = "E")]
    E,
    #[serde(alias = "H")]
    H,
    #[serde(alias = "A")]
    A,
    #[serde(alias = "B")]
    B,
    #[serde(alias = "C")]
    C,
}

impl Axis {
    pub const ALL: [Axis; AXIS_COUNT] = [
        Axis::X,
        Axis::Y,
        Axis::Z,
        Axis::E,
        Axis::H,
        Axis::A,
        Axis::B,
        Axis::C,
    ];

    /// Parse axis from its letter (case-insensitive)
    pub fn parse(s: &str) -> Option<Self> {
        let mut chars = s.chars();
        let letter = chars.next()?;
        if chars.next().is_some() {
            return None;
        }
        Self::from_letter(letter)
    }

    pub fn from_letter(letter: char) -> Option<Self> {
        match letter.to_ascii_uppercase() {
            'X' => Some(Axis::X),
            'Y' => Some(Axis::Y),
            'Z' => Some(Axis::Z),
            'E' => Some(Axis::E),
            'H' => Some(Axis::H),
            'A' => Some(Axis::A),
            'B' => Some(Axis::B),
            'C' => Some(Axis::C),
            _ => None,
        }
    }

    pub const fn letter(self) -> char {
        match self {
            Axis::X => 'X',
            Axis::Y => 'Y',
            Axis::Z => 'Z',
            Axis::E => 'E',
            Axis::H => 'H',
            Axis::A => 'A',
            Axis::B => 'B',
            Axis::C => 'C',
        }
    }

    pub const fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// X, Y or Z
    pub const fn is_spatial(self) -> bool {
        self.index() < SPATIAL_AXES
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.letter())
    }
}

/// Sparse per-axis request values.
///
/// A slot is `Some` only when the axis was present in the originating command.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AxisTargets([Option<f64>; AXIS_COUNT]);

impl AxisTargets {
    pub const fn new() -> Self {
        Self([None; AXIS_COUNT])
    }

    pub fn with(mut self, axis: Axis, value: f64) -> Self {
        self.set(axis, value);
        self
    }

    pub fn set(&mut self, axis: Axis, value: f64) {
        self.0[axis.index()] = Some(value);
    }

    pub fn get(&self, axis: Axis) -> Option<f64> {
        self.0[axis.index()]
    }

    pub fn contains(&self, axis: Axis) -> bool {
        self.0[axis.index()].is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.0.iter().all(Option::is_none)
    }

    /// Present axes with their values, in axis order
    pub fn iter(&self) -> impl Iterator<Item = (Axis, f64)> + '_ {
        Axis::ALL
            .iter()
            .zip(self.0.iter())
            .filter_map(|(axis, value)| value.map(|v| (*axis, v)))
    }

    /// Overwrite the slots present in `self`, keep the others from `base`.
    pub fn overlay(&self, base: &AxisVec) -> AxisVec {
        let mut out = *base;
        for (axis, value) in self.iter() {
            out[axis.index()] = value;
        }
        out
    }

    /// Present slots as a displacement, absent ones as zero.
    pub fn to_displacement(&self) -> AxisVec {
        self.overlay(&[0.0; AXIS_COUNT])
    }
}

impl FromIterator<(Axis, f64)> for AxisTargets {
    fn from_iter<I: IntoIterator<Item = (Axis, f64)>>(iter: I) -> Self {
        let mut targets = Self::new();
        for (axis, value) in iter {
            targets.set(axis, value);
        }
        targets
    }
}

/// Euclidean norm over the spatial axes
pub fn spatial_norm(v: &AxisVec) -> f64 {
    v[..SPATIAL_AXES].iter().map(|c| c * c).sum::<f64>().sqrt()
}

pub(crate) fn add(a: &AxisVec, b: &AxisVec) -> AxisVec {
    std::array::from_fn(|i| a[i] + b[i])
}

pub(crate) fn sub(a: &AxisVec, b: &AxisVec) -> AxisVec {
    std::array::from_fn(|i| a[i] - b[i])
}
