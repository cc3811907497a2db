//! The dice-pool resolution engine.
//!
//! Turns a pool of settled d10s into categorized outcomes and a success
//! total. The rules, per die and then per pool:
//!
//! | Die | Outcome | Successes |
//! |-----|---------|-----------|
//! | blood 1 | `bestial-failure` | 0 |
//! | 6..=9 | `success` / `blood-success` | 1 |
//! | pair of 10s in the same bucket | `critical` / `blood-critical` | 4 |
//! | unpaired 10 | `success` (value 10) | 1 |
//!
//! Tens are paired within their own bucket only: a regular 10 never pairs
//! with a blood 10. Everything else scores nothing and produces no outcome.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{Die, DieFace};

/// Points a paired critical is worth.
pub const CRITICAL_SUCCESSES: u32 = 4;

/// The category of one resolved outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutcomeKind {
    /// A blood die showed 1.
    BestialFailure,
    /// A regular die showed 6..=9, or any unpaired 10.
    Success,
    /// A blood die showed 6..=9.
    BloodSuccess,
    /// Two regular 10s.
    Critical,
    /// Two blood 10s.
    BloodCritical,
}

impl OutcomeKind {
    /// How many successes this outcome adds to the pool total.
    pub fn successes(self) -> u32 {
        match self {
            Self::BestialFailure => 0,
            Self::Success | Self::BloodSuccess => 1,
            Self::Critical | Self::BloodCritical => CRITICAL_SUCCESSES,
        }
    }
}

impl fmt::Display for OutcomeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::BestialFailure => "bestial-failure",
            Self::Success => "success",
            Self::BloodSuccess => "blood-success",
            Self::Critical => "critical",
            Self::BloodCritical => "blood-critical",
        })
    }
}

/// One categorized outcome with the face that produced it.
///
/// Criticals carry the value 10.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResultOutcome {
    #[serde(rename = "type")]
    pub kind: OutcomeKind,
    pub value: u8,
}

impl ResultOutcome {
    pub fn new(kind: OutcomeKind, value: u8) -> Self {
        Self { kind, value }
    }
}

/// The output of [`resolve`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resolution {
    pub results: Vec<ResultOutcome>,
    pub total_successes: u32,
}

impl Resolution {
    /// Number of outcomes of the given kind.
    pub fn count(&self, kind: OutcomeKind) -> usize {
        self.results.iter().filter(|r| r.kind == kind).count()
    }

    /// True when no outcome was produced.
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

/// Resolves a pool that may still contain dice in motion.
///
/// Returns an empty resolution if the pool is empty or any die has not
/// landed yet. Partial pools are never scored.
pub fn resolve(dice: &[Die]) -> Resolution {
    let mut faces = Vec::with_capacity(dice.len());
    for die in dice {
        match die {
            Die::Settled(face) => faces.push(*face),
            Die::InMotion { .. } => return Resolution::default(),
        }
    }
    resolve_faces(&faces)
}

/// Resolves a fully settled pool.
///
/// Output order: per-die outcomes in input order, then regular criticals,
/// blood criticals, and finally any unpaired tens.
pub fn resolve_faces(faces: &[DieFace]) -> Resolution {
    if faces.is_empty() {
        return Resolution::default();
    }

    let mut results = Vec::with_capacity(faces.len());
    let mut tens: usize = 0;
    let mut blood_tens: usize = 0;

    for face in faces {
        match (face.value(), face.is_blood_die()) {
            (1, true) => results.push(ResultOutcome::new(
                OutcomeKind::BestialFailure,
                1,
            )),
            (v @ 6..=9, false) => {
                results.push(ResultOutcome::new(OutcomeKind::Success, v))
            }
            (v @ 6..=9, true) => {
                results.push(ResultOutcome::new(OutcomeKind::BloodSuccess, v))
            }
            (10, false) => tens += 1,
            (10, true) => blood_tens += 1,
            _ => {}
        }
    }

    for _ in 0..tens / 2 {
        results.push(ResultOutcome::new(OutcomeKind::Critical, 10));
    }
    for _ in 0..blood_tens / 2 {
        results.push(ResultOutcome::new(OutcomeKind::BloodCritical, 10));
    }
    if tens % 2 == 1 {
        results.push(ResultOutcome::new(OutcomeKind::Success, 10));
    }
    if blood_tens % 2 == 1 {
        results.push(ResultOutcome::new(OutcomeKind::Success, 10));
    }

    let total_successes = results.iter().map(|r| r.kind.successes()).sum();

    Resolution {
        results,
        total_successes,
    }
}
