//! The dice resolution engine.
//!
//! Pure arithmetic: nothing here reads or writes an aggregate. Hold
//! consumption is the caller's job and must be committed together with the
//! roll record.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use loremaster_core::error::DomainError;
use loremaster_core::rng::DeterministicRng;
use serde::{Deserialize, Serialize};

/// Lowest stat value a character sheet may hold.
pub const STAT_MIN: i32 = -2;
/// Highest stat value a character sheet may hold.
pub const STAT_MAX: i32 = 3;

/// Totals at or above this are a strong hit.
pub const STRONG_HIT_THRESHOLD: i32 = 10;
/// Totals at or above this (and below the strong-hit threshold) are a weak hit.
pub const WEAK_HIT_THRESHOLD: i32 = 7;

/// The fixed set of character stats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stat {
    /// Acting under pressure, keeping calm.
    Cool,
    /// Violence, going aggro.
    Hard,
    /// Charm, seduction, manipulation.
    Hot,
    /// Reading people and situations.
    Sharp,
    /// The uncanny.
    Weird,
}

impl Stat {
    /// Every stat, in sheet order.
    pub const ALL: [Stat; 5] = [Stat::Cool, Stat::Hard, Stat::Hot, Stat::Sharp, Stat::Weird];

    /// Returns the stat's key.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cool => "cool",
            Self::Hard => "hard",
            Self::Hot => "hot",
            Self::Sharp => "sharp",
            Self::Weird => "weird",
        }
    }
}

impl fmt::Display for Stat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Stat {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_ascii_lowercase();
        Stat::ALL
            .into_iter()
            .find(|stat| stat.as_str() == key)
            .ok_or_else(|| DomainError::Validation(format!("unknown stat: {s}")))
    }
}

/// Resolves a caller-supplied stat key. Unknown keys are normalized to "no
/// stat" (modifier 0) and logged rather than rejected.
#[must_use]
pub fn resolve_stat_key(key: Option<&str>) -> Option<Stat> {
    let key = key?.trim();
    if key.is_empty() {
        return None;
    }
    match key.parse::<Stat>() {
        Ok(stat) => Some(stat),
        Err(_) => {
            tracing::warn!(stat_key = key, "unknown stat key, rolling with +0");
            None
        }
    }
}

/// A character's stat values. Missing stats count as 0; values are clamped
/// to `[STAT_MIN, STAT_MAX]` on the way in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StatBlock(BTreeMap<Stat, i32>);

impl StatBlock {
    /// Builds a stat block from `(stat, value)` pairs, clamping each value.
    #[must_use]
    pub fn from_pairs<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (Stat, i32)>,
    {
        Self(
            pairs
                .into_iter()
                .map(|(stat, value)| (stat, value.clamp(STAT_MIN, STAT_MAX)))
                .collect(),
        )
    }

    /// Builds a stat block from string keys, dropping unknown keys with a warning.
    #[must_use]
    pub fn from_keyed<'a, I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, i32)>,
    {
        Self::from_pairs(pairs.into_iter().filter_map(|(key, value)| {
            resolve_stat_key(Some(key)).map(|stat| (stat, value))
        }))
    }

    /// Returns the value of a stat (0 when unset).
    #[must_use]
    pub fn get(&self, stat: Stat) -> i32 {
        self.0.get(&stat).copied().unwrap_or(0)
    }

    /// Iterates over the set stats.
    pub fn iter(&self) -> impl Iterator<Item = (Stat, i32)> + '_ {
        self.0.iter().map(|(stat, value)| (*stat, *value))
    }
}

/// The three-tier result of a roll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Outcome {
    /// 10+: the move succeeds cleanly.
    StrongHit,
    /// 7–9: success with a cost or complication.
    WeakHit,
    /// 6-: the narrator makes a move.
    Miss,
}

impl Outcome {
    /// Classifies a roll total. The thresholds are fixed for every campaign.
    #[must_use]
    pub fn from_total(total: i32) -> Self {
        if total >= STRONG_HIT_THRESHOLD {
            Self::StrongHit
        } else if total >= WEAK_HIT_THRESHOLD {
            Self::WeakHit
        } else {
            Self::Miss
        }
    }

    /// Returns the wire name of the outcome.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StrongHit => "strongHit",
            Self::WeakHit => "weakHit",
            Self::Miss => "miss",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a roll's modifier came from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModifierBreakdown {
    /// The rolled stat's value (0 for stat-less rolls).
    pub stat: i32,
    /// Help, interfere and other caller-supplied bonuses.
    pub situational: i32,
    /// The forward hold consumed by this roll.
    pub forward: i32,
    /// The ongoing hold applied to this roll.
    pub ongoing: i32,
}

impl ModifierBreakdown {
    /// Returns the summed modifier, saturating at the `i32` bounds.
    #[must_use]
    pub fn total(&self) -> i32 {
        self.stat
            .saturating_add(self.situational)
            .saturating_add(self.forward)
            .saturating_add(self.ongoing)
    }
}

/// Everything the engine needs for one roll, read from the character at
/// call time.
#[derive(Debug, Clone, Copy)]
pub struct RollInputs<'a> {
    /// The roller's stats.
    pub stats: &'a StatBlock,
    /// The stat rolled, if any.
    pub stat: Option<Stat>,
    /// Caller-supplied situational modifier.
    pub situational: i32,
    /// The roller's forward hold (consumed by this roll).
    pub forward: i32,
    /// The roller's ongoing hold (not consumed).
    pub ongoing: i32,
}

/// The computed result of a roll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RollComputation {
    /// The two die faces, each in `1..=6`.
    pub dice: [u8; 2],
    /// Where the modifier came from.
    pub breakdown: ModifierBreakdown,
    /// The summed modifier.
    pub modifier: i32,
    /// `dice[0] + dice[1] + modifier`.
    pub total: i32,
    /// The outcome tier of `total`.
    pub outcome: Outcome,
}

fn draw_die(rng: &mut dyn DeterministicRng) -> u8 {
    let face = rng.next_u32_range(1, 6).clamp(1, 6);
    u8::try_from(face).unwrap_or(6)
}

/// Rolls 2d6 and scores the result.
#[must_use]
pub fn roll(inputs: &RollInputs<'_>, rng: &mut dyn DeterministicRng) -> RollComputation {
    let dice = [draw_die(rng), draw_die(rng)];
    let breakdown = ModifierBreakdown {
        stat: inputs.stat.map_or(0, |stat| inputs.stats.get(stat)),
        situational: inputs.situational,
        forward: inputs.forward,
        ongoing: inputs.ongoing,
    };
    let modifier = breakdown.total();
    let total = (i32::from(dice[0]) + i32::from(dice[1])).saturating_add(modifier);

    RollComputation {
        dice,
        breakdown,
        modifier,
        total,
        outcome: Outcome::from_total(total),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use loremaster_test_support::{MockRng, SequenceRng};

    fn sheet() -> StatBlock {
        StatBlock::from_pairs([(Stat::Cool, 1), (Stat::Hard, 2), (Stat::Weird, -1)])
    }

    #[test]
    fn test_outcome_table_is_exhaustive_and_disjoint() {
        for total in -10..=30 {
            let outcome = Outcome::from_total(total);
            assert_eq!(outcome == Outcome::StrongHit, total >= 10, "total {total}");
            assert_eq!(outcome == Outcome::WeakHit, (7..=9).contains(&total), "total {total}");
            assert_eq!(outcome == Outcome::Miss, total <= 6, "total {total}");
        }
    }

    #[test]
    fn test_roll_sums_dice_and_every_modifier_source() {
        let stats = sheet();
        let mut rng = SequenceRng::new(vec![4, 3]);
        let inputs = RollInputs {
            stats: &stats,
            stat: Some(Stat::Hard),
            situational: 1,
            forward: 2,
            ongoing: -1,
        };

        let result = roll(&inputs, &mut rng);

        assert_eq!(result.dice, [4, 3]);
        assert_eq!(
            result.breakdown,
            ModifierBreakdown {
                stat: 2,
                situational: 1,
                forward: 2,
                ongoing: -1
            }
        );
        assert_eq!(result.modifier, 4);
        assert_eq!(result.total, 11);
        assert_eq!(result.outcome, Outcome::StrongHit);
    }

    #[test]
    fn test_stat_less_roll_uses_zero() {
        let stats = sheet();
        let mut rng = SequenceRng::new(vec![5, 2]);
        let inputs = RollInputs {
            stats: &stats,
            stat: None,
            situational: 0,
            forward: 0,
            ongoing: 0,
        };

        let result = roll(&inputs, &mut rng);

        assert_eq!(result.total, 7);
        assert_eq!(result.outcome, Outcome::WeakHit);
    }

    #[test]
    fn test_snake_eyes_with_negative_stat_is_a_miss() {
        let stats = sheet();
        let inputs = RollInputs {
            stats: &stats,
            stat: Some(Stat::Weird),
            situational: 0,
            forward: 0,
            ongoing: 0,
        };

        let result = roll(&inputs, &mut MockRng);

        assert_eq!(result.dice, [1, 1]);
        assert_eq!(result.total, 1);
        assert_eq!(result.outcome, Outcome::Miss);
    }

    #[test]
    fn test_out_of_range_faces_are_clamped() {
        let stats = StatBlock::default();
        let mut rng = SequenceRng::new(vec![0, 9]);
        let inputs = RollInputs {
            stats: &stats,
            stat: None,
            situational: 0,
            forward: 0,
            ongoing: 0,
        };

        assert_eq!(roll(&inputs, &mut rng).dice, [1, 6]);
    }

    #[test]
    fn test_modifiers_at_i32_bounds_saturate() {
        let stats = sheet();
        let high = RollInputs {
            stats: &stats,
            stat: Some(Stat::Hard),
            situational: i32::MAX,
            forward: 1,
            ongoing: 1,
        };
        let low = RollInputs {
            stat: Some(Stat::Weird),
            situational: i32::MIN,
            forward: -1,
            ongoing: -1,
            ..high
        };

        let high = roll(&high, &mut SequenceRng::new(vec![6, 6]));
        let low = roll(&low, &mut SequenceRng::new(vec![1, 1]));

        assert_eq!(high.modifier, i32::MAX);
        assert_eq!(high.total, i32::MAX);
        assert_eq!(high.outcome, Outcome::StrongHit);
        assert_eq!(low.modifier, i32::MIN);
        assert_eq!(low.total, i32::MIN + 2);
        assert_eq!(low.outcome, Outcome::Miss);
    }

    #[test]
    fn test_unknown_stat_key_normalizes_to_none() {
        assert_eq!(resolve_stat_key(Some("charisma")), None);
        assert_eq!(resolve_stat_key(Some("  Sharp ")), Some(Stat::Sharp));
        assert_eq!(resolve_stat_key(Some("")), None);
        assert_eq!(resolve_stat_key(None), None);
    }

    #[test]
    fn test_stat_block_clamps_and_drops_unknown_keys() {
        let block = StatBlock::from_keyed([("cool", 5), ("hot", -4), ("luck", 2)]);

        assert_eq!(block.get(Stat::Cool), STAT_MAX);
        assert_eq!(block.get(Stat::Hot), STAT_MIN);
        assert_eq!(block.get(Stat::Sharp), 0);
        assert_eq!(block.iter().count(), 2);
    }

    #[test]
    fn test_stat_block_serializes_with_stat_keys() {
        let json = serde_json::to_value(sheet()).unwrap();
        assert_eq!(json, serde_json::json!({ "cool": 1, "hard": 2, "weird": -1 }));
    }

    #[test]
    fn test_outcome_wire_names() {
        assert_eq!(serde_json::to_value(Outcome::StrongHit).unwrap(), "strongHit");
        assert_eq!(serde_json::to_value(Outcome::WeakHit).unwrap(), "weakHit");
        assert_eq!(Outcome::Miss.to_string(), "miss");
    }
}
