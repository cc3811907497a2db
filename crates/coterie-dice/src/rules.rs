//! Rolling rules: dice pools, rouse checks, remorse checks, willpower rerolls.
//!
//! Every roller takes `&mut impl Rng` so callers choose the source of
//! randomness. Production code passes `rand::rng()`, tests pass a seeded
//! `StdRng`.

use std::collections::HashSet;

use rand::Rng;

use crate::{DiceError, DieFace, RollRecord, MAX_FACE, MIN_FACE};

/// Hunger is a `0..=5` meter.
pub const MAX_HUNGER: u8 = 5;

/// Humanity is a `0..=10` track.
pub const MAX_HUMANITY: u8 = 10;

/// Willpower lets a player reroll at most this many regular dice.
pub const MAX_REROLL_DICE: usize = 3;

/// Lowest face that counts as a success on rouse and remorse checks.
pub const SUCCESS_THRESHOLD: u8 = 6;

fn roll_d10<R: Rng + ?Sized>(rng: &mut R) -> u8 {
    rng.random_range(MIN_FACE..=MAX_FACE)
}

/// Rolls a pool of `pool` d10s, the first `min(hunger, pool)` of them blood
/// dice.
pub fn roll_pool<R: Rng + ?Sized>(
    rng: &mut R,
    pool: usize,
    hunger: u8,
) -> Result<Vec<DieFace>, DiceError> {
    if hunger > MAX_HUNGER {
        return Err(DiceError::HungerOutOfRange(hunger));
    }
    if pool == 0 {
        return Err(DiceError::EmptyPool);
    }
    let blood = usize::from(hunger).min(pool);
    Ok((0..pool)
        .map(|i| DieFace::from_roll(roll_d10(rng), i < blood))
        .collect())
}

/// Result of a rouse check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouseOutcome {
    pub roll: u8,
    pub success: bool,
    pub new_hunger: u8,
}

/// Rolls a single d10; 6+ keeps hunger steady, anything else raises it by
/// one (never past 5).
pub fn rouse_check<R: Rng + ?Sized>(
    rng: &mut R,
    hunger: u8,
) -> Result<RouseOutcome, DiceError> {
    if hunger > MAX_HUNGER {
        return Err(DiceError::HungerOutOfRange(hunger));
    }
    let roll = roll_d10(rng);
    Ok(rouse_outcome(roll, hunger))
}

/// Scores an already rolled rouse die.
pub fn rouse_outcome(roll: u8, hunger: u8) -> RouseOutcome {
    let success = roll >= SUCCESS_THRESHOLD;
    let new_hunger = if success {
        hunger
    } else {
        hunger.saturating_add(1).min(MAX_HUNGER)
    };
    RouseOutcome {
        roll,
        success,
        new_hunger,
    }
}

/// Result of a remorse check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemorseOutcome {
    pub rolls: Vec<u8>,
    pub successes: u32,
    pub passed: bool,
    pub new_humanity: u8,
}

/// Number of dice a remorse check rolls: one per unmarked box on the
/// humanity track, never fewer than one.
pub fn remorse_pool(humanity: u8, stains: u8) -> usize {
    usize::from(MAX_HUMANITY.saturating_sub(humanity).saturating_sub(stains))
        .max(1)
}

/// Rolls remorse; a single success keeps humanity, otherwise it drops by
/// one.
pub fn remorse_check<R: Rng + ?Sized>(
    rng: &mut R,
    humanity: u8,
    stains: u8,
) -> Result<RemorseOutcome, DiceError> {
    if humanity > MAX_HUMANITY {
        return Err(DiceError::HumanityOutOfRange(humanity));
    }
    if stains > MAX_HUMANITY {
        return Err(DiceError::StainsOutOfRange(stains));
    }
    let rolls: Vec<u8> = (0..remorse_pool(humanity, stains))
        .map(|_| roll_d10(rng))
        .collect();
    Ok(remorse_outcome(rolls, humanity))
}

/// Scores already rolled remorse dice.
pub fn remorse_outcome(rolls: Vec<u8>, humanity: u8) -> RemorseOutcome {
    let successes =
        rolls.iter().filter(|&&r| r >= SUCCESS_THRESHOLD).count() as u32;
    let passed = successes > 0;
    let new_humanity = if passed {
        humanity
    } else {
        humanity.saturating_sub(1)
    };
    RemorseOutcome {
        rolls,
        successes,
        passed,
        new_humanity,
    }
}

/// Spends willpower to reroll up to three regular dice of `record`.
///
/// The new record keeps the original roll id and is flagged as a reroll,
/// so ingesting it replaces the original entry in the event log.
pub fn willpower_reroll<R: Rng + ?Sized>(
    rng: &mut R,
    record: &RollRecord,
    indices: &[usize],
) -> Result<RollRecord, DiceError> {
    let roll_id = record.roll_id.clone().ok_or(DiceError::MissingRollId)?;
    if indices.len() > MAX_REROLL_DICE {
        return Err(DiceError::TooManyRerolls(indices.len()));
    }

    let mut seen = HashSet::with_capacity(indices.len());
    for &i in indices {
        let die = record
            .dice
            .get(i)
            .ok_or(DiceError::RerollIndexOutOfRange(i))?;
        if die.is_blood_die() {
            return Err(DiceError::BloodDieReroll(i));
        }
        if !seen.insert(i) {
            return Err(DiceError::DuplicateReroll(i));
        }
    }

    let mut dice = record.dice.clone();
    for &i in indices {
        dice[i] = DieFace::from_roll(roll_d10(rng), false);
    }
    Ok(RollRecord::with_id(dice, roll_id).into_reroll())
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(0xC0FFEE)
    }

    #[test]
    fn test_roll_pool_marks_leading_dice_as_blood() {
        let dice = roll_pool(&mut rng(), 6, 2).unwrap();
        assert_eq!(dice.len(), 6);
        assert!(dice[0].is_blood_die() && dice[1].is_blood_die());
        assert!(dice[2..].iter().all(|d| !d.is_blood_die()));
        assert!(dice.iter().all(|d| (1..=10).contains(&d.value())));
    }

    #[test]
    fn test_roll_pool_hunger_larger_than_pool_is_capped() {
        let dice = roll_pool(&mut rng(), 2, 5).unwrap();
        assert!(dice.iter().all(|d| d.is_blood_die()));
    }

    #[test]
    fn test_roll_pool_rejects_bad_input() {
        assert_eq!(roll_pool(&mut rng(), 0, 1), Err(DiceError::EmptyPool));
        assert_eq!(
            roll_pool(&mut rng(), 3, 6),
            Err(DiceError::HungerOutOfRange(6))
        );
    }

    #[test]
    fn test_rouse_outcome_success_keeps_hunger() {
        let out = rouse_outcome(6, 2);
        assert!(out.success);
        assert_eq!(out.new_hunger, 2);
    }

    #[test]
    fn test_rouse_outcome_failure_raises_hunger_capped() {
        assert_eq!(rouse_outcome(5, 2).new_hunger, 3);
        assert_eq!(rouse_outcome(1, 5).new_hunger, 5);
    }

    #[test]
    fn test_rouse_check_rejects_hunger_above_five() {
        assert_eq!(
            rouse_check(&mut rng(), 6),
            Err(DiceError::HungerOutOfRange(6))
        );
    }

    #[test]
    fn test_remorse_pool_counts_unmarked_boxes() {
        assert_eq!(remorse_pool(7, 1), 2);
        assert_eq!(remorse_pool(7, 3), 1);
        assert_eq!(remorse_pool(9, 5), 1);
    }

    #[test]
    fn test_remorse_outcome_single_success_passes() {
        let out = remorse_outcome(vec![2, 9], 7);
        assert!(out.passed);
        assert_eq!(out.successes, 1);
        assert_eq!(out.new_humanity, 7);
    }

    #[test]
    fn test_remorse_outcome_failure_loses_humanity() {
        let out = remorse_outcome(vec![2, 3, 5], 7);
        assert!(!out.passed);
        assert_eq!(out.new_humanity, 6);
        assert_eq!(remorse_outcome(vec![1], 0).new_humanity, 0);
    }

    #[test]
    fn test_remorse_check_rolls_pool_size() {
        let out = remorse_check(&mut rng(), 6, 1).unwrap();
        assert_eq!(out.rolls.len(), 3);
    }

    #[test]
    fn test_willpower_reroll_keeps_id_and_flags_reroll() {
        let original = RollRecord::with_id(
            vec![
                DieFace::blood(3).unwrap(),
                DieFace::regular(2).unwrap(),
                DieFace::regular(4).unwrap(),
            ],
            "r1",
        );
        let rerolled =
            willpower_reroll(&mut rng(), &original, &[1, 2]).unwrap();
        assert_eq!(rerolled.roll_id.as_deref(), Some("r1"));
        assert!(rerolled.is_reroll);
        assert_eq!(rerolled.dice[0], original.dice[0]);
        assert_eq!(rerolled.dice.len(), 3);
    }

    #[test]
    fn test_willpower_reroll_rejects_blood_and_excess_dice() {
        let original = RollRecord::with_id(
            vec![
                DieFace::blood(3).unwrap(),
                DieFace::regular(2).unwrap(),
                DieFace::regular(2).unwrap(),
                DieFace::regular(2).unwrap(),
                DieFace::regular(2).unwrap(),
            ],
            "r1",
        );
        assert_eq!(
            willpower_reroll(&mut rng(), &original, &[0]),
            Err(DiceError::BloodDieReroll(0))
        );
        assert_eq!(
            willpower_reroll(&mut rng(), &original, &[1, 2, 3, 4]),
            Err(DiceError::TooManyRerolls(4))
        );
        assert_eq!(
            willpower_reroll(&mut rng(), &original, &[1, 1]),
            Err(DiceError::DuplicateReroll(1))
        );
        assert_eq!(
            willpower_reroll(&mut rng(), &original, &[9]),
            Err(DiceError::RerollIndexOutOfRange(9))
        );
    }

    #[test]
    fn test_willpower_reroll_requires_roll_id() {
        let mut original =
            RollRecord::with_id(vec![DieFace::regular(2).unwrap()], "x");
        original.roll_id = None;
        assert_eq!(
            willpower_reroll(&mut rng(), &original, &[0]),
            Err(DiceError::MissingRollId)
        );
    }
}
