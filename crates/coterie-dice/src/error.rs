//! Error types for the dice layer.

/// Errors raised when building dice or applying a roll rule.
///
/// Resolution itself never fails: [`resolve`](crate::resolve) is total.
/// These errors come from the edges, where raw numbers from a caller or
/// from the wire are turned into dice.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DiceError {
    /// A d10 face must lie in `1..=10`.
    #[error("die face {0} is outside 1..=10")]
    FaceOutOfRange(u8),

    /// Hunger is a `0..=5` meter.
    #[error("hunger {0} is outside 0..=5")]
    HungerOutOfRange(u8),

    /// Humanity is a `0..=10` track.
    #[error("humanity {0} is outside 0..=10")]
    HumanityOutOfRange(u8),

    /// Stains can never exceed the humanity track.
    #[error("stains {0} is outside 0..=10")]
    StainsOutOfRange(u8),

    /// A pool needs at least one die.
    #[error("dice pool is empty")]
    EmptyPool,

    /// Willpower rerolls at most three dice.
    #[error("cannot reroll {0} dice, the limit is 3")]
    TooManyRerolls(usize),

    /// The reroll index does not point into the original roll.
    #[error("reroll index {0} is out of range")]
    RerollIndexOutOfRange(usize),

    /// The same die was selected twice for a reroll.
    #[error("die {0} selected more than once")]
    DuplicateReroll(usize),

    /// Blood dice may not be rerolled.
    #[error("die {0} is a blood die and cannot be rerolled")]
    BloodDieReroll(usize),

    /// A reroll replaces an earlier roll by id, so the original needs one.
    #[error("roll has no id to reroll against")]
    MissingRollId,
}
