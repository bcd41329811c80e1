/*
Keyword heuristics standing in for an AI model.
Every criterion starts at a default and is overridden by the first
matching tier. All matching runs on the lower-cased description.
*/

use std::sync::LazyLock;

use regex::Regex;

use crate::levels::{Criterion, CriterionMap, Level};
use crate::scoring::WorkTag;

struct CriterionRules {
    criterion: Criterion,
    default: Level,
    tiers: Vec<(Level, Regex)>, // tested in order, first match wins
}

// `\b` is an ASCII word boundary here, so "designé" still hits "design"
fn pattern(src: &str) -> Regex {
    Regex::new(&src.replace(r"\b", r"(?-u:\b)")).expect("heuristic keyword pattern must compile")
}

static LEVEL_RULES: LazyLock<Vec<CriterionRules>> = LazyLock::new(|| {
    vec![
        CriterionRules {
            criterion: Criterion::FocusLevel,
            default: Level::Medium,
            tiers: vec![
                (
                    Level::High,
                    pattern(r"\bdeep work\b|\bstrategy\b|\bdesign\b|\bwrite\b|\bresearch\b|\bdebug\b"),
                ),
                (
                    Level::Low,
                    pattern(r"\bemail\b|\bcleanup\b|\bhabit\b|\bscroll\b|\badmin\b|\bbacklog\b"),
                ),
            ],
        },
        CriterionRules {
            criterion: Criterion::MentalLoad,
            default: Level::Medium,
            tiers: vec![
                (
                    Level::High,
                    pattern(r"\barchitecture\b|\bfinancial\b|\bplanning\b|\bproposal\b|\bpresentation\b"),
                ),
                (
                    Level::Low,
                    pattern(r"\brefill\b|\bchores\b|\bmaintenance\b|\bwater\b|\bgrocery\b"),
                ),
            ],
        },
        CriterionRules {
            criterion: Criterion::Movement,
            default: Level::Low,
            tiers: vec![
                (
                    Level::High,
                    pattern(
                        r"\bgym\b|\brun\b|\bwalk\b|\bcommute\b|\btravel\b|\bmeeting\b|\bshoot\b|\berrand\b",
                    ),
                ),
                (Level::Medium, pattern(r"\bsetup\b|\brecord\b|\bdeliver\b|\bvisit\b")),
            ],
        },
        CriterionRules {
            criterion: Criterion::Urgency,
            default: Level::Medium,
            tiers: vec![
                (
                    Level::High,
                    pattern(r"\burgent\b|\basap\b|\bdeadline\b|\bdue\b|\bsubmit\b|\btoday\b|\bcall\b"),
                ),
                (Level::Low, pattern(r"\bidea\b|\bdraft\b|\bexplore\b|\bsomeday\b")),
            ],
        },
    ]
});

// Priority order matters: a description mentioning both "code" and
// "meeting" is deep work. Admin doubles as the fallback.
static TAG_RULES: LazyLock<Vec<(WorkTag, Regex)>> = LazyLock::new(|| {
    vec![
        (
            WorkTag::DeepWork,
            pattern(
                r"\bdeep work\b|\bwriting\b|\bcode\b|\bcoding\b|\bdebug\b|\bdesign\b|\banalysis\b|\barchitect\b|\bprototype\b",
            ),
        ),
        (
            WorkTag::Communicating,
            pattern(
                r"\bmeeting\b|\bmeet\b|\bcall\b|\b1-?on-?1\b|\b1on1\b|\bsync\b|\binterview\b|\bpresentation\b",
            ),
        ),
        (
            WorkTag::Learning,
            pattern(
                r"\blearn\b|\blearning\b|\bread\b|\breading\b|\bcourse\b|\btraining\b|\bwebinar\b|\bresearch\b|\bstudy\b",
            ),
        ),
        (
            WorkTag::Admin,
            pattern(
                r"\bemail\b|\binbox\b|\bschedule\b|\bcalendar\b|\badministrative\b|\badmin\b|\bform\b|\bexpense\b|\btask list\b",
            ),
        ),
    ]
});

/// Guess all four effort levels from a free-text description.
pub fn infer_levels(description: &str) -> CriterionMap<Level> {
    let text = description.to_lowercase();
    let mut levels = CriterionMap::from_fn(|_| Level::Medium);

    for rules in LEVEL_RULES.iter() {
        let level = rules
            .tiers
            .iter()
            .find(|(_, re)| re.is_match(&text))
            .map_or(rules.default, |(level, _)| *level);
        *levels.get_mut(rules.criterion) = level;
    }

    levels
}

/// Pick the single work tag for a description. Never fails.
pub fn infer_tag(description: &str) -> WorkTag {
    let text = description.to_lowercase();
    TAG_RULES
        .iter()
        .find(|(_, re)| re.is_match(&text))
        .map_or(WorkTag::Admin, |(tag, _)| *tag)
}
