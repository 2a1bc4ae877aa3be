//! Header lines to requirement rules.
//!
//! Matchers are tried in [`HEADER_MATCHERS`] order and the first hit wins.
//! The order matters: `Select 10 units` would otherwise be read as a
//! `Select 10` count, and `List A (Select one):` as a plain area header.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;

use crate::models::RequirementRule;
use crate::parser::text::{format_units, safe_text, word_or_int};

static CROSS_LIST_GLOBAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)Select\s+(\d+)\s+units\s+minimum\s+from\s+the\s+lists\s+below,\s+with\s+at\s+least\s+(\d+)\s+units\s+from\s+List\s+([A-Z])\b",
    )
    .expect("cross-list regex")
});

static UNITS_PER_AREA: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^Select\s+(\w+)\s+units\b.*?\bat\s+least\s+(\w+)\s+units?\s+from\s+each\s+area\b",
    )
    .expect("units-per-area regex")
});

static UNITS_FROM_DISCIPLINES: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^Select\s+(\w+)\s+units\s+from\s+at\s+least\s+(\w+)\s+disciplines\s*:?$")
        .expect("disciplines regex")
});

static SELECT_UNITS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^Select\s+(\w+)\s+units?\b").expect("select units regex"));

static SELECT_COUNT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^Select\s+(\w+)\b").expect("select count regex"));

static UNITS_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bunits\b").expect("units word regex"));

static NAMED_LIST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(List\s+[A-Z])\s*(?:\((.*?)\))?\s*:?$").expect("named list regex")
});

static REQUIRED_COURSES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^Required courses?:?$").expect("required regex"));

static IMPLIED_GROUP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(.+?(?:Emphasis|Option|Group|Track)\b.*?):?$").expect("implied group regex")
});

static AREA: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([A-Za-z][A-Za-z\s/&'(),*+\-]*[A-Za-z)])\s*:$").expect("area regex")
});

static CLAUSE_RANGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)Select\s+(\w+)\s+to\s+(\w+)").expect("clause range regex"));

static CLAUSE_SELECT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)Select\s+(\w+)").expect("clause select regex"));

static CLAUSE_BORROW: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)any\s+course\s+from\s+(.+?)\s+not\s+already\s+used").expect("borrow regex")
});

static LIST_LETTER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b([A-Z])\b").expect("list letter regex"));

static TRAILING_PAREN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(.*?)\s*\(([^()]*)\)$").expect("trailing paren regex"));

/// A recognized header line.
#[derive(Debug, Clone, PartialEq)]
pub enum Header {
    /// "Select 10 units minimum from the lists below, with at least 3 units
    /// from List A". Applies to the `List X` headers that follow.
    CrossListGlobal {
        min_units_total: f64,
        anchor: String,
        anchor_min_units: f64,
    },

    /// "Select 9 units ..., at least 3 units from each area". Areas that
    /// follow are wired into this rule.
    UnitsPerArea {
        min_units: f64,
        per_area_min_units: f64,
    },

    /// "Select 6 units from at least 2 disciplines".
    UnitsFromDisciplines { min_units: f64, min_disciplines: u32 },

    /// "Select 6 units".
    SelectUnits { min_units: f64 },

    /// "Select two".
    SelectCount { count: u32 },

    /// "List A (Select one)" or "Required courses:".
    NamedList { name: String, rule: RequirementRule },

    /// "Chemistry Option", "Biological Sciences:".
    Area { name: String, rule: RequirementRule },
}

impl Header {
    /// Name of the section this header opens. Cross-list directives open none.
    pub fn section_name(&self) -> Option<String> {
        match self {
            Self::CrossListGlobal { .. } => None,
            Self::UnitsPerArea { min_units, .. }
            | Self::UnitsFromDisciplines { min_units, .. }
            | Self::SelectUnits { min_units } => {
                Some(format!("Select {} units", format_units(*min_units)))
            }
            Self::SelectCount { count } => Some(format!("Select {count}")),
            Self::NamedList { name, .. } | Self::Area { name, .. } => Some(name.clone()),
        }
    }

    /// Rule of the section this header opens.
    pub fn rule(&self) -> Option<RequirementRule> {
        match self {
            Self::CrossListGlobal { .. } => None,
            Self::UnitsPerArea { min_units, .. } | Self::SelectUnits { min_units } => {
                Some(RequirementRule::units(*min_units))
            }
            Self::UnitsFromDisciplines {
                min_units,
                min_disciplines,
            } => Some(RequirementRule::Units {
                min_units: *min_units,
                min_disciplines: Some(*min_disciplines),
                discipline_from: Some("prefix".to_string()),
                per_list_min_units: BTreeMap::new(),
                allow_from: Vec::new(),
            }),
            Self::SelectCount { count } => Some(RequirementRule::exactly(*count)),
            Self::NamedList { rule, .. } | Self::Area { rule, .. } => Some(rule.clone()),
        }
    }

    /// Whether the header opens a bare "Select ..." block.
    pub fn is_select_block(&self) -> bool {
        matches!(
            self,
            Self::UnitsFromDisciplines { .. } | Self::SelectUnits { .. } | Self::SelectCount { .. }
        )
    }
}

type Matcher = fn(&str) -> Option<Header>;

/// Header matchers, most specific first.
pub const HEADER_MATCHERS: &[(&str, Matcher)] = &[
    ("cross_list_global", match_cross_list_global),
    ("units_per_area", match_units_per_area),
    ("units_from_disciplines", match_units_from_disciplines),
    ("select_units", match_select_units),
    ("select_count", match_select_count),
    ("named_list", match_named_list),
    ("implied_group", match_implied_group),
    ("area", match_area),
];

/// Classify a header line. `None` when no pattern applies.
pub fn classify_header(line: &str) -> Option<Header> {
    let line = safe_text(line);
    if line.is_empty() {
        return None;
    }
    HEADER_MATCHERS
        .iter()
        .find_map(|(_, matcher)| matcher(&line))
}

/// Select-family headers with a numeral we cannot read become `Select 1`.
fn unresolved_select() -> Header {
    Header::SelectCount { count: 1 }
}

fn match_cross_list_global(line: &str) -> Option<Header> {
    let caps = CROSS_LIST_GLOBAL.captures(line)?;
    Some(Header::CrossListGlobal {
        min_units_total: caps[1].parse().ok()?,
        anchor: format!("List {}", caps[3].to_uppercase()),
        anchor_min_units: caps[2].parse().ok()?,
    })
}

fn match_units_per_area(line: &str) -> Option<Header> {
    let caps = UNITS_PER_AREA.captures(line)?;
    match (word_or_int(&caps[1]), word_or_int(&caps[2])) {
        (Some(total), Some(per_area)) => Some(Header::UnitsPerArea {
            min_units: f64::from(total),
            per_area_min_units: f64::from(per_area),
        }),
        _ => Some(unresolved_select()),
    }
}

fn match_units_from_disciplines(line: &str) -> Option<Header> {
    let caps = UNITS_FROM_DISCIPLINES.captures(line)?;
    match (word_or_int(&caps[1]), word_or_int(&caps[2])) {
        (Some(total), Some(disciplines)) => Some(Header::UnitsFromDisciplines {
            min_units: f64::from(total),
            min_disciplines: disciplines,
        }),
        _ => Some(unresolved_select()),
    }
}

fn match_select_units(line: &str) -> Option<Header> {
    let caps = SELECT_UNITS.captures(line)?;
    Some(match word_or_int(&caps[1]) {
        Some(n) => Header::SelectUnits {
            min_units: f64::from(n),
        },
        None => unresolved_select(),
    })
}

fn match_select_count(line: &str) -> Option<Header> {
    let caps = SELECT_COUNT.captures(line)?;
    let whole = caps.get(0)?;
    if UNITS_WORD.is_match(&line[whole.end()..]) {
        return None;
    }
    Some(Header::SelectCount {
        count: word_or_int(&caps[1]).unwrap_or(1),
    })
}

fn match_named_list(line: &str) -> Option<Header> {
    if REQUIRED_COURSES.is_match(line) {
        return Some(Header::NamedList {
            name: "Required courses".to_string(),
            rule: RequirementRule::All,
        });
    }
    let caps = NAMED_LIST.captures(line)?;
    let clause = caps.get(2).map(|m| safe_text(m.as_str()));
    Some(Header::NamedList {
        name: safe_text(&caps[1]),
        rule: parse_rule_clause(clause.as_deref()),
    })
}

fn match_implied_group(line: &str) -> Option<Header> {
    if starts_with_any(line, &["select", "complete", "required"]) {
        return None;
    }
    let caps = IMPLIED_GROUP.captures(line)?;
    Some(area_header(&caps[1]))
}

fn match_area(line: &str) -> Option<Header> {
    if starts_with_any(line, &["select"]) {
        return None;
    }
    let caps = AREA.captures(line)?;
    Some(area_header(&caps[1]))
}

/// Area headers are all-required unless they carry their own clause,
/// e.g. `Biology (Select two):`.
fn area_header(raw: &str) -> Header {
    let raw = safe_text(raw);
    if let Some(caps) = TRAILING_PAREN.captures(&raw) {
        if CLAUSE_SELECT.is_match(&caps[2]) {
            return Header::Area {
                name: safe_text(&caps[1]),
                rule: parse_rule_clause(Some(&caps[2])),
            };
        }
    }
    Header::Area {
        name: raw,
        rule: RequirementRule::All,
    }
}

fn starts_with_any(line: &str, words: &[&str]) -> bool {
    let first = line
        .split(|c: char| !c.is_alphanumeric())
        .next()
        .unwrap_or("")
        .to_lowercase();
    words.contains(&first.as_str())
}

/// Parse the parenthetical clause of a list header into a count rule.
///
/// Defaults to exactly one. A borrowing clause ("any course from List A/B
/// not already used") fills `allow_from`.
pub fn parse_rule_clause(clause: Option<&str>) -> RequirementRule {
    let Some(text) = clause.map(str::trim).filter(|t| !t.is_empty()) else {
        return RequirementRule::exactly(1);
    };

    let (min, max) = CLAUSE_RANGE
        .captures(text)
        .and_then(|caps| Some((word_or_int(&caps[1])?, word_or_int(&caps[2])?)))
        .map(|(a, b)| (a.min(b), a.max(b)))
        .or_else(|| {
            CLAUSE_SELECT
                .captures(text)
                .and_then(|caps| word_or_int(&caps[1]))
                .map(|n| (n, n))
        })
        .unwrap_or((1, 1));

    let allow_from = CLAUSE_BORROW
        .captures(text)
        .map(|caps| {
            LIST_LETTER
                .captures_iter(&caps[1])
                .map(|letter| format!("List {}", &letter[1]))
                .collect()
        })
        .unwrap_or_default();

    RequirementRule::Count {
        min,
        max: Some(max),
        allow_from,
    }
}
