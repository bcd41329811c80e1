/*
Qualitative effort levels and the four scoring criteria.
Raw request values are resolved into `Level` here, once,
so the scoring path never sees untyped input.
*/

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

// Canonical 3-point scale
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Low,
    Medium,
    High,
}

impl Level {
    pub const ALL: [Level; 3] = [Level::Low, Level::Medium, Level::High];

    pub const fn points(self) -> u32 {
        match self {
            Level::Low => 1,
            Level::Medium => 2,
            Level::High => 3,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Level::Low => "low",
            Level::Medium => "medium",
            Level::High => "high",
        }
    }

    fn from_points(points: i64) -> Option<Level> {
        match points {
            1 => Some(Level::Low),
            2 => Some(Level::Medium),
            3 => Some(Level::High),
            _ => None,
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Level {
    type Err = LevelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "low" => Ok(Level::Low),
            "medium" => Ok(Level::Medium),
            "high" => Ok(Level::High),
            _ => Err(LevelError::Invalid(s.to_string())),
        }
    }
}

// Effort dimensions, listed in weight order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Criterion {
    FocusLevel,
    MentalLoad,
    Urgency,
    Movement,
}

impl Criterion {
    pub const ALL: [Criterion; 4] = [
        Criterion::FocusLevel,
        Criterion::MentalLoad,
        Criterion::Urgency,
        Criterion::Movement,
    ];

    pub const fn weight(self) -> u32 {
        match self {
            Criterion::FocusLevel => 3,
            Criterion::MentalLoad => 3,
            Criterion::Urgency => 2,
            Criterion::Movement => 1,
        }
    }

    /// Field name used on the wire and in error messages.
    pub const fn key(self) -> &'static str {
        match self {
            Criterion::FocusLevel => "focusLevel",
            Criterion::MentalLoad => "mentalLoad",
            Criterion::Urgency => "urgency",
            Criterion::Movement => "movement",
        }
    }
}

impl fmt::Display for Criterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// One value per criterion.
///
/// Serialized with the criterion keys (`focusLevel`, `mentalLoad`, ...) so it
/// can be flattened into request and task documents.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CriterionMap<T> {
    pub focus_level: T,
    pub mental_load: T,
    pub urgency: T,
    pub movement: T,
}

impl<T> CriterionMap<T> {
    pub fn from_fn(mut f: impl FnMut(Criterion) -> T) -> Self {
        CriterionMap {
            focus_level: f(Criterion::FocusLevel),
            mental_load: f(Criterion::MentalLoad),
            urgency: f(Criterion::Urgency),
            movement: f(Criterion::Movement),
        }
    }

    /// Builds the map in criterion order, stopping at the first error.
    pub fn try_from_fn<E>(mut f: impl FnMut(Criterion) -> Result<T, E>) -> Result<Self, E> {
        Ok(CriterionMap {
            focus_level: f(Criterion::FocusLevel)?,
            mental_load: f(Criterion::MentalLoad)?,
            urgency: f(Criterion::Urgency)?,
            movement: f(Criterion::Movement)?,
        })
    }

    pub fn get(&self, criterion: Criterion) -> &T {
        match criterion {
            Criterion::FocusLevel => &self.focus_level,
            Criterion::MentalLoad => &self.mental_load,
            Criterion::Urgency => &self.urgency,
            Criterion::Movement => &self.movement,
        }
    }

    pub fn get_mut(&mut self, criterion: Criterion) -> &mut T {
        match criterion {
            Criterion::FocusLevel => &mut self.focus_level,
            Criterion::MentalLoad => &mut self.mental_load,
            Criterion::Urgency => &mut self.urgency,
            Criterion::Movement => &mut self.movement,
        }
    }

    pub fn map<U>(&self, mut f: impl FnMut(&T) -> U) -> CriterionMap<U> {
        CriterionMap::from_fn(|c| f(self.get(c)))
    }

    pub fn iter(&self) -> impl Iterator<Item = (Criterion, &T)> {
        Criterion::ALL.into_iter().map(move |c| (c, self.get(c)))
    }
}

impl<T> CriterionMap<Option<T>> {
    /// Criteria that carry a value, in criterion order.
    pub fn supplied(&self) -> Vec<Criterion> {
        self.iter()
            .filter(|(_, v)| v.is_some())
            .map(|(c, _)| c)
            .collect()
    }
}

/// Level value as it arrives from a client: `2`, `"High"`, or anything else.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawLevelInput {
    Number(serde_json::Number),
    Text(String),
    Other(serde_json::Value),
}

impl RawLevelInput {
    // Empty strings are treated the same as an absent field by request handlers
    pub fn is_blank(&self) -> bool {
        matches!(self, RawLevelInput::Text(s) if s.trim().is_empty())
    }
}

impl From<Level> for RawLevelInput {
    fn from(level: Level) -> Self {
        RawLevelInput::Text(level.as_str().to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LevelError {
    #[error("missing level")]
    Missing,

    #[error("invalid numeric level {0}")]
    InvalidNumeric(String),

    #[error("invalid level {0}")]
    Invalid(String),

    #[error("unsupported level type {0}")]
    UnsupportedType(&'static str),
}

/// Resolve a raw level into the canonical scale.
///
/// - absent -> `fallback`, or `LevelError::Missing`
/// - numbers 1, 2, 3 -> low, medium, high
/// - strings are trimmed and matched case-insensitively
pub fn normalize_level(
    value: Option<&RawLevelInput>,
    fallback: Option<Level>,
) -> Result<Level, LevelError> {
    let Some(value) = value else {
        return fallback.ok_or(LevelError::Missing);
    };

    match value {
        RawLevelInput::Number(n) => n
            .as_f64()
            .filter(|f| f.fract() == 0.0)
            .and_then(|f| Level::from_points(f as i64))
            .ok_or_else(|| LevelError::InvalidNumeric(n.to_string())),
        RawLevelInput::Text(s) => s.parse(),
        RawLevelInput::Other(v) => Err(LevelError::UnsupportedType(json_type_name(v))),
    }
}

fn json_type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn raw(v: serde_json::Value) -> RawLevelInput {
        serde_json::from_value(v).unwrap()
    }

    #[test]
    fn numbers_map_onto_scale() {
        assert_eq!(normalize_level(Some(&raw(json!(1))), None), Ok(Level::Low));
        assert_eq!(normalize_level(Some(&raw(json!(2))), None), Ok(Level::Medium));
        assert_eq!(normalize_level(Some(&raw(json!(3))), None), Ok(Level::High));
        assert_eq!(normalize_level(Some(&raw(json!(3.0))), None), Ok(Level::High));
    }

    #[test]
    fn out_of_range_numbers_rejected() {
        for v in [json!(0), json!(4), json!(-1), json!(2.5)] {
            let err = normalize_level(Some(&raw(v)), None).unwrap_err();
            assert!(matches!(err, LevelError::InvalidNumeric(_)), "{err:?}");
        }
    }

    #[test]
    fn strings_are_trimmed_and_case_insensitive() {
        assert_eq!(normalize_level(Some(&raw(json!("  HIGH "))), None), Ok(Level::High));
        assert_eq!(normalize_level(Some(&raw(json!("Medium"))), None), Ok(Level::Medium));
        assert_eq!(
            normalize_level(Some(&raw(json!("extreme"))), None),
            Err(LevelError::Invalid("extreme".into()))
        );
    }

    #[test]
    fn other_json_types_unsupported() {
        assert_eq!(
            normalize_level(Some(&raw(json!(true))), None),
            Err(LevelError::UnsupportedType("boolean"))
        );
        assert_eq!(
            normalize_level(Some(&raw(json!(["low"]))), None),
            Err(LevelError::UnsupportedType("array"))
        );
    }

    #[test]
    fn absent_uses_fallback_or_fails() {
        assert_eq!(normalize_level(None, Some(Level::Low)), Ok(Level::Low));
        assert_eq!(normalize_level(None, None), Err(LevelError::Missing));
    }

    #[test]
    fn criterion_map_uses_wire_keys() {
        let map = CriterionMap::from_fn(|c| c.weight());
        let value = serde_json::to_value(map).unwrap();
        assert_eq!(
            value,
            json!({ "focusLevel": 3, "mentalLoad": 3, "urgency": 2, "movement": 1 })
        );
    }

    #[test]
    fn supplied_lists_present_criteria_in_order() {
        let map = CriterionMap {
            focus_level: None,
            mental_load: Some(Level::High),
            urgency: None,
            movement: Some(Level::Low),
        };
        assert_eq!(map.supplied(), vec![Criterion::MentalLoad, Criterion::Movement]);
    }
}
