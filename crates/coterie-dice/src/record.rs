//! The roll record embedded in `dice_roll` events.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::{resolve_faces, DieFace, ResultOutcome};

/// A resolved roll as it travels between participants.
///
/// `results` and `total_successes` are always the engine's output for
/// `dice`; build records through [`RollRecord::from_dice`] or
/// [`RollRecord::with_id`] so the two never drift apart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RollRecord {
    pub dice: Vec<DieFace>,
    pub results: Vec<ResultOutcome>,
    pub total_successes: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub roll_id: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_reroll: bool,
}

impl RollRecord {
    /// Resolves `dice` and tags the record with a fresh roll id.
    pub fn from_dice(dice: Vec<DieFace>) -> Self {
        Self::with_id(dice, generate_roll_id(&mut rand::rng()))
    }

    /// Resolves `dice` under a caller-chosen roll id.
    pub fn with_id(dice: Vec<DieFace>, roll_id: impl Into<String>) -> Self {
        let resolution = resolve_faces(&dice);
        Self {
            dice,
            results: resolution.results,
            total_successes: resolution.total_successes,
            roll_id: Some(roll_id.into()),
            is_reroll: false,
        }
    }

    /// Marks this record as replacing an earlier roll with the same id.
    pub fn into_reroll(mut self) -> Self {
        self.is_reroll = true;
        self
    }

    /// Number of blood dice in the pool.
    pub fn hunger_dice(&self) -> usize {
        self.dice.iter().filter(|d| d.is_blood_die()).count()
    }
}

/// Generates a random 32-character hex roll id (128 bits).
pub fn generate_roll_id<R: Rng + ?Sized>(rng: &mut R) -> String {
    let bytes: [u8; 16] = rng.random();
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;
    use crate::OutcomeKind;

    #[test]
    fn test_from_dice_embeds_engine_output() {
        let dice = vec![
            DieFace::regular(10).unwrap(),
            DieFace::regular(10).unwrap(),
            DieFace::blood(1).unwrap(),
        ];
        let record = RollRecord::from_dice(dice);
        assert_eq!(record.total_successes, 4);
        assert!(record
            .results
            .iter()
            .any(|r| r.kind == OutcomeKind::BestialFailure));
        assert_eq!(record.roll_id.as_deref().map(str::len), Some(32));
        assert!(!record.is_reroll);
        assert_eq!(record.hunger_dice(), 1);
    }

    #[test]
    fn test_generate_roll_id_is_hex_and_unique() {
        let mut rng = StdRng::seed_from_u64(7);
        let a = generate_roll_id(&mut rng);
        let b = generate_roll_id(&mut rng);
        assert_ne!(a, b);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_record_json_omits_reroll_flag_when_false() {
        let record =
            RollRecord::with_id(vec![DieFace::regular(6).unwrap()], "r1");
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["rollId"], "r1");
        assert_eq!(json["totalSuccesses"], 1);
        assert!(json.get("isReroll").is_none());

        let json = serde_json::to_value(record.into_reroll()).unwrap();
        assert_eq!(json["isReroll"], true);
    }

    #[test]
    fn test_record_deserializes_without_optional_fields() {
        let json = r#"{
            "dice": [{ "value": 7, "isBloodDie": true }],
            "results": [{ "type": "blood-success", "value": 7 }],
            "totalSuccesses": 1
        }"#;
        let record: RollRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.roll_id, None);
        assert!(!record.is_reroll);
    }
}
