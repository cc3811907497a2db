//! Single dice: the settled face and the still-rolling placeholder.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::DiceError;

/// Lowest face on a d10.
pub const MIN_FACE: u8 = 1;

/// Highest face on a d10.
pub const MAX_FACE: u8 = 10;

/// One settled d10.
///
/// Faces are validated on construction and on deserialization, so every
/// `DieFace` in the program holds a value in `1..=10`. The fields are
/// private: a rolled die never changes.
///
/// On the wire a face looks like `{ "value": 7, "isBloodDie": true }`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawDieFace", rename_all = "camelCase")]
pub struct DieFace {
    value: u8,
    is_blood_die: bool,
}

impl DieFace {
    /// Creates a face, rejecting values outside `1..=10`.
    pub fn new(value: u8, is_blood_die: bool) -> Result<Self, DiceError> {
        if !(MIN_FACE..=MAX_FACE).contains(&value) {
            return Err(DiceError::FaceOutOfRange(value));
        }
        Ok(Self {
            value,
            is_blood_die,
        })
    }

    /// Shorthand for a regular (non-blood) die.
    pub fn regular(value: u8) -> Result<Self, DiceError> {
        Self::new(value, false)
    }

    /// Shorthand for a blood (hunger) die.
    pub fn blood(value: u8) -> Result<Self, DiceError> {
        Self::new(value, true)
    }

    /// Used by the rollers, which only ever produce in-range values.
    pub(crate) fn from_roll(value: u8, is_blood_die: bool) -> Self {
        debug_assert!((MIN_FACE..=MAX_FACE).contains(&value));
        Self {
            value,
            is_blood_die,
        }
    }

    /// The number showing, `1..=10`.
    pub fn value(&self) -> u8 {
        self.value
    }

    /// Whether this die came from the hunger pool.
    pub fn is_blood_die(&self) -> bool {
        self.is_blood_die
    }
}

impl fmt::Display for DieFace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_blood_die {
            write!(f, "{}*", self.value)
        } else {
            write!(f, "{}", self.value)
        }
    }
}

/// Unchecked wire shape, validated through `TryFrom`.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawDieFace {
    value: u8,
    #[serde(default)]
    is_blood_die: bool,
}

impl TryFrom<RawDieFace> for DieFace {
    type Error = DiceError;

    fn try_from(raw: RawDieFace) -> Result<Self, Self::Error> {
        Self::new(raw.value, raw.is_blood_die)
    }
}

/// A die in a pool that may still be tumbling.
///
/// Callers that animate a roll hand the engine the whole pool, settled or
/// not. Any die still in motion makes the pool unresolvable for now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Die {
    /// Still rolling, no face yet.
    InMotion { is_blood_die: bool },
    /// Landed.
    Settled(DieFace),
}

impl Die {
    /// The settled face, if any.
    pub fn face(&self) -> Option<DieFace> {
        match self {
            Self::InMotion { .. } => None,
            Self::Settled(face) => Some(*face),
        }
    }

    pub fn is_blood_die(&self) -> bool {
        match self {
            Self::InMotion { is_blood_die } => *is_blood_die,
            Self::Settled(face) => face.is_blood_die(),
        }
    }
}

impl From<DieFace> for Die {
    fn from(face: DieFace) -> Self {
        Self::Settled(face)
    }
}
