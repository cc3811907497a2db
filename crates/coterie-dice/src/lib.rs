//! Dice-pool resolution engine for Coterie.
//!
//! - [`resolve`] / [`resolve_faces`] — the pure scoring function: a pool of
//!   d10s in, categorized outcomes and a success total out.
//! - [`RollRecord`] — a resolved roll as carried by `dice_roll` events.
//! - [`rules`] — rollers for pools, rouse checks, remorse checks and
//!   willpower rerolls.
//!
//! Resolution is referentially transparent: the same multiset of faces
//! always scores the same category counts and total.

mod error;
mod face;
mod record;
mod resolve;
pub mod rules;

pub use error::DiceError;
pub use face::{Die, DieFace, MAX_FACE, MIN_FACE};
pub use record::{generate_roll_id, RollRecord};
pub use resolve::{
    resolve, resolve_faces, OutcomeKind, Resolution, ResultOutcome,
    CRITICAL_SUCCESSES,
};
pub use rules::{RemorseOutcome, RouseOutcome};
