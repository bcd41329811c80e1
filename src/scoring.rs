/*
Workload scoring and tag classification.
Turns qualitative levels into raw score -> mana cost -> energy zone,
and decides per field whether a value comes from the user or the
keyword heuristics. Pure functions; safe to call from any handler.
*/

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::heuristics;
use crate::levels::{normalize_level, Criterion, CriterionMap, Level, LevelError, RawLevelInput};

/// Highest possible weighted sum, derived from the weight table.
pub const MAX_RAW_SCORE: u32 = {
    let mut total = 0;
    let mut i = 0;
    while i < Criterion::ALL.len() {
        total += Criterion::ALL[i].weight() * Level::High.points();
        i += 1;
    }
    total
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EnergyZone {
    Peak,
    Balance,
    Low,
}

impl EnergyZone {
    // Highest threshold first; the first zone whose minimum is met wins
    pub const BY_THRESHOLD: [EnergyZone; 3] = [EnergyZone::Peak, EnergyZone::Balance, EnergyZone::Low];

    pub const fn min_mana_cost(self) -> u32 {
        match self {
            EnergyZone::Peak => 70,
            EnergyZone::Balance => 40,
            EnergyZone::Low => 0,
        }
    }

    pub fn from_mana_cost(mana_cost: u32) -> EnergyZone {
        Self::BY_THRESHOLD
            .into_iter()
            .find(|zone| mana_cost >= zone.min_mana_cost())
            .unwrap_or(EnergyZone::Low)
    }

    /// Position in the scheduled task list (Peak first).
    pub const fn sort_rank(self) -> u8 {
        match self {
            EnergyZone::Peak => 0,
            EnergyZone::Balance => 1,
            EnergyZone::Low => 2,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            EnergyZone::Peak => "Peak",
            EnergyZone::Balance => "Balance",
            EnergyZone::Low => "Low",
        }
    }
}

impl fmt::Display for EnergyZone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkTag {
    DeepWork,
    Admin,
    Communicating,
    Learning,
}

impl WorkTag {
    pub const ALL: [WorkTag; 4] = [
        WorkTag::DeepWork,
        WorkTag::Admin,
        WorkTag::Communicating,
        WorkTag::Learning,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            WorkTag::DeepWork => "deep_work",
            WorkTag::Admin => "admin",
            WorkTag::Communicating => "communicating",
            WorkTag::Learning => "learning",
        }
    }
}

impl fmt::Display for WorkTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TagSource {
    Manual,
    Ai,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoringSource {
    Ai,
    #[default]
    Manual,
    Mixed,
}

impl ScoringSource {
    /// `manual` when no field was inferred, otherwise `ai` or `mixed`
    /// depending on whether the caller supplied any criterion.
    pub fn from_usage(ai_used: bool, supplied_count: usize) -> ScoringSource {
        match (ai_used, supplied_count) {
            (false, _) => ScoringSource::Manual,
            (true, 0) => ScoringSource::Ai,
            (true, _) => ScoringSource::Mixed,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScoringError {
    #[error("task description is required for scoring")]
    MissingDescription,

    #[error("{criterion}: {source}")]
    InvalidLevel {
        criterion: Criterion,
        source: LevelError,
    },

    #[error("missing {0} and AI disabled")]
    MissingCriterion(Criterion),

    #[error("invalid tag {0}, expected one of deep_work, admin, communicating, learning")]
    InvalidTag(String),

    #[error("tag required, AI disabled")]
    TagRequired,
}

// Raw score and its derived buckets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreBreakdown {
    pub raw_score: u32,   // 0..=MAX_RAW_SCORE
    pub mana_cost: u32,   // 0..=100
    pub energy_zone: EnergyZone,
}

/// Weighted sum -> mana cost -> zone.
///
/// A criterion without a level counts as medium.
pub fn calculate_scores(levels: &CriterionMap<Option<Level>>) -> ScoreBreakdown {
    let raw_score: u32 = levels
        .iter()
        .map(|(c, level)| c.weight() * level.unwrap_or(Level::Medium).points())
        .sum();

    let mana_cost = to_mana_cost(raw_score);

    ScoreBreakdown {
        raw_score,
        mana_cost,
        energy_zone: EnergyZone::from_mana_cost(mana_cost),
    }
}

/// Scale a raw score onto 0..=100.
pub fn to_mana_cost(raw_score: u32) -> u32 {
    let ratio = f64::from(raw_score.min(MAX_RAW_SCORE)) / f64::from(MAX_RAW_SCORE);
    (ratio * 100.0).round() as u32
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoringResult {
    pub normalized_levels: CriterionMap<Level>,
    pub raw_score: u32,
    pub mana_cost: u32,
    pub energy_zone: EnergyZone,
    pub auto_filled: CriterionMap<bool>,
    pub ai_used: bool,
    pub evaluated_at: DateTime<Utc>,
}

/// Score a task, filling missing criteria from the heuristics when allowed.
///
/// Criteria are resolved in weight order; the first invalid or missing
/// value aborts the whole evaluation. Heuristics only run when at least one
/// criterion is missing.
pub fn score_task(
    description: &str,
    provided: &CriterionMap<Option<RawLevelInput>>,
    allow_ai: bool,
) -> Result<ScoringResult, ScoringError> {
    if description.trim().is_empty() {
        return Err(ScoringError::MissingDescription);
    }

    let mut inferred: Option<CriterionMap<Level>> = None;
    let resolved = CriterionMap::try_from_fn(|c| match provided.get(c) {
        Some(raw) => normalize_level(Some(raw), None)
            .map(|level| (level, false))
            .map_err(|source| ScoringError::InvalidLevel { criterion: c, source }),
        None if allow_ai => {
            let levels = inferred.get_or_insert_with(|| heuristics::infer_levels(description));
            Ok((*levels.get(c), true))
        }
        None => Err(ScoringError::MissingCriterion(c)),
    })?;

    let normalized_levels = resolved.map(|(level, _)| *level);
    let auto_filled = resolved.map(|(_, filled)| *filled);
    let ai_used = auto_filled.iter().any(|(_, filled)| *filled);
    let scores = calculate_scores(&normalized_levels.map(|level| Some(*level)));

    Ok(ScoringResult {
        normalized_levels,
        raw_score: scores.raw_score,
        mana_cost: scores.mana_cost,
        energy_zone: scores.energy_zone,
        auto_filled,
        ai_used,
        evaluated_at: Utc::now(),
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TagResult {
    pub tag: WorkTag,
    pub source: TagSource,
}

/// Lower-case, collapse whitespace runs to `_`, then match the tag set.
pub fn normalize_tag(value: &str) -> Result<WorkTag, ScoringError> {
    let normalized = value
        .trim()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_");

    WorkTag::ALL
        .into_iter()
        .find(|tag| tag.as_str() == normalized)
        .ok_or_else(|| ScoringError::InvalidTag(value.to_string()))
}

pub fn classify_tag(
    description: &str,
    provided: Option<&str>,
    allow_ai: bool,
) -> Result<TagResult, ScoringError> {
    match provided.filter(|t| !t.trim().is_empty()) {
        Some(tag) => Ok(TagResult {
            tag: normalize_tag(tag)?,
            source: TagSource::Manual,
        }),
        None if allow_ai => Ok(TagResult {
            tag: heuristics::infer_tag(description),
            source: TagSource::Ai,
        }),
        None => Err(ScoringError::TagRequired),
    }
}

/// An update re-scores only when asked to, or when it touches a criterion.
pub fn needs_rescore(
    use_ai_scoring: Option<bool>,
    force_recalculate: bool,
    supplied: &CriterionMap<Option<RawLevelInput>>,
) -> bool {
    use_ai_scoring == Some(true) || force_recalculate || !supplied.supplied().is_empty()
}

/// Inputs for re-scoring a stored task.
///
/// Unsupplied criteria keep their stored level, unless AI scoring was
/// explicitly requested, in which case they are left for the heuristics.
pub fn rescore_inputs(
    supplied: &CriterionMap<Option<RawLevelInput>>,
    stored: &CriterionMap<Level>,
    ai_forced: bool,
) -> CriterionMap<Option<RawLevelInput>> {
    CriterionMap::from_fn(|c| match supplied.get(c) {
        Some(raw) => Some(raw.clone()),
        None if ai_forced => None,
        None => Some(RawLevelInput::from(*stored.get(c))),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn provided(v: serde_json::Value) -> CriterionMap<Option<RawLevelInput>> {
        serde_json::from_value(v).unwrap()
    }

    fn all_levels(level: Level) -> CriterionMap<Option<Level>> {
        CriterionMap::from_fn(|_| Some(level))
    }

    #[test]
    fn max_raw_score_follows_weights() {
        assert_eq!(MAX_RAW_SCORE, 27);
    }

    #[test]
    fn raw_score_is_weighted_sum_for_every_combination() {
        for f in Level::ALL {
            for m in Level::ALL {
                for u in Level::ALL {
                    for mv in Level::ALL {
                        let levels = CriterionMap {
                            focus_level: Some(f),
                            mental_load: Some(m),
                            urgency: Some(u),
                            movement: Some(mv),
                        };
                        let s = calculate_scores(&levels);
                        let expected =
                            3 * f.points() + 3 * m.points() + 2 * u.points() + mv.points();
                        assert_eq!(s.raw_score, expected);
                        assert!(s.raw_score <= MAX_RAW_SCORE);
                        assert!(s.mana_cost <= 100);
                        assert_eq!(
                            s.mana_cost,
                            (f64::from(expected) / 27.0 * 100.0).round() as u32
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn extremes() {
        let low = calculate_scores(&all_levels(Level::Low));
        assert_eq!(low.raw_score, 9);
        assert_eq!(low.mana_cost, 33);
        assert_eq!(low.energy_zone, EnergyZone::Low);

        let high = calculate_scores(&all_levels(Level::High));
        assert_eq!(high.raw_score, 27);
        assert_eq!(high.mana_cost, 100);
        assert_eq!(high.energy_zone, EnergyZone::Peak);

        let medium = calculate_scores(&all_levels(Level::Medium));
        assert_eq!(medium.raw_score, 18);
        assert_eq!(medium.mana_cost, 67);
        assert_eq!(medium.energy_zone, EnergyZone::Balance);
    }

    #[test]
    fn missing_level_counts_as_medium() {
        let s = calculate_scores(&CriterionMap::from_fn(|_| None));
        assert_eq!(s.raw_score, 18);
    }

    #[test]
    fn zone_thresholds() {
        assert_eq!(EnergyZone::from_mana_cost(100), EnergyZone::Peak);
        assert_eq!(EnergyZone::from_mana_cost(70), EnergyZone::Peak);
        assert_eq!(EnergyZone::from_mana_cost(69), EnergyZone::Balance);
        assert_eq!(EnergyZone::from_mana_cost(40), EnergyZone::Balance);
        assert_eq!(EnergyZone::from_mana_cost(39), EnergyZone::Low);
        assert_eq!(EnergyZone::from_mana_cost(0), EnergyZone::Low);
    }

    #[test]
    fn zone_is_monotonic_in_mana_cost() {
        let mut last_rank = u8::MAX;
        for cost in 0..=100 {
            let rank = EnergyZone::from_mana_cost(cost).sort_rank();
            assert!(rank <= last_rank, "zone got lighter at {cost}");
            last_rank = rank;
        }
    }

    #[test]
    fn ai_fills_every_missing_criterion() {
        let result = score_task("Deep work on architecture diagram", &provided(json!({})), true)
            .unwrap();

        assert_eq!(result.normalized_levels.focus_level, Level::High);
        assert_eq!(result.normalized_levels.mental_load, Level::High);
        assert_eq!(result.normalized_levels.urgency, Level::Medium);
        assert_eq!(result.normalized_levels.movement, Level::Low);
        // 3*3 + 3*3 + 2*2 + 1*1
        assert_eq!(result.raw_score, 23);
        assert_eq!(result.mana_cost, 85);
        assert_eq!(result.energy_zone, EnergyZone::Peak);
        assert!(result.ai_used);
        assert_eq!(result.auto_filled, CriterionMap::from_fn(|_| true));
    }

    #[test]
    fn provided_values_win_over_heuristics() {
        let result = score_task(
            "Deep work on architecture diagram",
            &provided(json!({ "focusLevel": 1, "urgency": "HIGH" })),
            true,
        )
        .unwrap();

        assert_eq!(result.normalized_levels.focus_level, Level::Low);
        assert_eq!(result.normalized_levels.urgency, Level::High);
        assert_eq!(result.normalized_levels.mental_load, Level::High);
        assert!(!result.auto_filled.focus_level);
        assert!(!result.auto_filled.urgency);
        assert!(result.auto_filled.mental_load);
        assert!(result.ai_used);
    }

    #[test]
    fn ai_disabled_requires_every_criterion() {
        let err = score_task(
            "Write report",
            &provided(json!({ "focusLevel": "high", "mentalLoad": "high", "urgency": "low" })),
            false,
        )
        .unwrap_err();
        assert_eq!(err, ScoringError::MissingCriterion(Criterion::Movement));
        assert_eq!(err.to_string(), "missing movement and AI disabled");
    }

    #[test]
    fn ai_disabled_with_all_criteria_is_manual() {
        let result = score_task(
            "Write report",
            &provided(json!({
                "focusLevel": "high", "mentalLoad": 2, "urgency": "low", "movement": 1
            })),
            false,
        )
        .unwrap();
        assert!(!result.ai_used);
        assert_eq!(result.auto_filled, CriterionMap::from_fn(|_| false));
        assert_eq!(ScoringSource::from_usage(result.ai_used, 4), ScoringSource::Manual);
    }

    #[test]
    fn invalid_level_names_the_field() {
        let err = score_task("Write report", &provided(json!({ "mentalLoad": "huge" })), true)
            .unwrap_err();
        assert_eq!(err.to_string(), "mentalLoad: invalid level huge");
    }

    #[test]
    fn empty_description_rejected() {
        assert_eq!(
            score_task("   ", &provided(json!({})), true).unwrap_err(),
            ScoringError::MissingDescription
        );
    }

    #[test]
    fn scoring_is_deterministic_apart_from_timestamp() {
        let input = provided(json!({ "movement": "medium" }));
        let a = score_task("Urgent proposal planning", &input, true).unwrap();
        let b = score_task("Urgent proposal planning", &input, true).unwrap();
        assert!(b.evaluated_at >= a.evaluated_at);
        assert_eq!(
            ScoringResult { evaluated_at: a.evaluated_at, ..b },
            a
        );
    }

    #[test]
    fn scoring_source_labels() {
        assert_eq!(ScoringSource::from_usage(false, 0), ScoringSource::Manual);
        assert_eq!(ScoringSource::from_usage(false, 4), ScoringSource::Manual);
        assert_eq!(ScoringSource::from_usage(true, 0), ScoringSource::Ai);
        assert_eq!(ScoringSource::from_usage(true, 2), ScoringSource::Mixed);
    }

    #[test]
    fn classify_tag_paths() {
        assert_eq!(
            classify_tag("Buy groceries and pay bills", None, true).unwrap(),
            TagResult { tag: WorkTag::Admin, source: TagSource::Ai }
        );
        assert_eq!(
            classify_tag("anything", Some(" Deep  Work "), false).unwrap(),
            TagResult { tag: WorkTag::DeepWork, source: TagSource::Manual }
        );
        assert_eq!(
            classify_tag("anything", None, false).unwrap_err(),
            ScoringError::TagRequired
        );
        assert_eq!(
            classify_tag("anything", Some(""), false).unwrap_err(),
            ScoringError::TagRequired
        );
        assert!(matches!(
            classify_tag("anything", Some("errands"), true),
            Err(ScoringError::InvalidTag(_))
        ));
    }

    #[test]
    fn rescore_only_when_triggered() {
        let none = provided(json!({}));
        assert!(!needs_rescore(None, false, &none));
        assert!(!needs_rescore(Some(false), false, &none));
        assert!(needs_rescore(Some(true), false, &none));
        assert!(needs_rescore(None, true, &none));
        assert!(needs_rescore(None, false, &provided(json!({ "urgency": "low" }))));
    }

    #[test]
    fn rescore_inputs_fall_back_to_stored_levels() {
        let stored = CriterionMap {
            focus_level: Level::High,
            mental_load: Level::Low,
            urgency: Level::Low,
            movement: Level::Medium,
        };
        let supplied = provided(json!({ "urgency": 3 }));

        let kept = rescore_inputs(&supplied, &stored, false);
        assert_eq!(kept.urgency, Some(RawLevelInput::Number(serde_json::Number::from(3))));
        assert_eq!(kept.focus_level, Some(RawLevelInput::from(Level::High)));
        assert_eq!(kept.movement, Some(RawLevelInput::from(Level::Medium)));

        let forced = rescore_inputs(&supplied, &stored, true);
        assert_eq!(forced.urgency, Some(RawLevelInput::Number(serde_json::Number::from(3))));
        assert_eq!(forced.focus_level, None);
        assert_eq!(forced.supplied(), vec![Criterion::Urgency]);
    }
}
