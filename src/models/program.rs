//! Canonical program requirement model.
//!
//! Both ingestion paths (catalog markup and the evaluation API) produce
//! these types. Values are built once and never edited afterwards.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Rule attached to a section, or spanning several sections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequirementRule {
    /// Every item is required.
    All,

    /// Choose between `min` and `max` items.
    Count {
        min: u32,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max: Option<u32>,
        /// Other lists whose unused courses may also count
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        allow_from: Vec<String>,
    },

    /// Satisfy a unit total.
    Units {
        min_units: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min_disciplines: Option<u32>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        discipline_from: Option<String>,
        #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
        per_list_min_units: BTreeMap<String, f64>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        allow_from: Vec<String>,
    },

    /// Unit total across other named sections.
    CrossListUnits {
        applies_to: Vec<String>,
        min_units_total: f64,
        #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
        per_list_min_units: BTreeMap<String, f64>,
    },
}

impl RequirementRule {
    /// Exact-count rule.
    pub fn exactly(n: u32) -> Self {
        Self::Count {
            min: n,
            max: Some(n),
            allow_from: Vec::new(),
        }
    }

    /// At-least-`n` rule with no upper bound.
    pub fn at_least(n: u32) -> Self {
        Self::Count {
            min: n,
            max: None,
            allow_from: Vec::new(),
        }
    }

    /// Plain unit-total rule.
    pub fn units(min_units: f64) -> Self {
        Self::Units {
            min_units,
            min_disciplines: None,
            discipline_from: None,
            per_list_min_units: BTreeMap::new(),
            allow_from: Vec::new(),
        }
    }

    /// Section names this rule points at.
    pub fn references(&self) -> &[String] {
        match self {
            Self::Units { allow_from, .. } | Self::Count { allow_from, .. } => allow_from,
            Self::All => &[],
            Self::CrossListUnits { applies_to, .. } => applies_to,
        }
    }
}

/// One alternative inside a [`Choice`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseOption {
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub units: Option<f64>,
}

/// One requirement slot, satisfied by any one of its alternatives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Choice {
    pub any_of: Vec<CourseOption>,
}

impl Choice {
    pub fn single(code: impl Into<String>, units: Option<f64>) -> Self {
        Self {
            any_of: vec![CourseOption {
                code: code.into(),
                units,
            }],
        }
    }
}

/// Named, independently ruled group of choices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    pub name: String,
    pub rule: RequirementRule,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<Choice>,
}

/// Total units a program requires.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RequiredUnits {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
}

impl RequiredUnits {
    pub fn is_empty(&self) -> bool {
        self.min.is_none() && self.max.is_none()
    }
}

/// Requirement structure of one program in one catalog year.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProgramDetail {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub program_goal: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ge_patterns: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub program_learning_outcomes: Vec<String>,

    #[serde(default, skip_serializing_if = "RequiredUnits::is_empty")]
    pub required_units: RequiredUnits,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sections: Vec<Section>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cross_list_rules: Vec<RequirementRule>,
}

impl ProgramDetail {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Names referenced by rules that match no section.
    pub fn dangling_references(&self) -> Vec<String> {
        let known: Vec<&str> = self.sections.iter().map(|s| s.name.as_str()).collect();
        let mut dangling = Vec::new();

        let rules = self
            .sections
            .iter()
            .map(|s| &s.rule)
            .chain(self.cross_list_rules.iter());
        for rule in rules {
            for name in rule.references() {
                if !known.contains(&name.as_str()) && !dangling.contains(name) {
                    dangling.push(name.clone());
                }
            }
        }
        dangling
    }
}

/// One row of the catalog's program listing table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramListing {
    pub name: String,
    pub program_type: String,
    pub department: String,
    pub program_code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_info_url: Option<String>,
}

/// Canonical program record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Program {
    pub name: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub program_type: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub department: String,

    pub program_code: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year_label: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<ProgramDetail>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

/// One catalog year's crawl output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct YearSnapshot {
    pub year_id: String,
    pub year_label: String,
    pub source_list_url: String,
    pub program_count: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub programs: Vec<Program>,
}

/// Catalog year identifier (`8` => 2018-2019 with a base of 2010).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CatalogYear {
    pub id: u32,
    pub base: i32,
}

impl CatalogYear {
    pub fn new(id: u32, base: i32) -> Self {
        Self { id, base }
    }

    /// Two-digit form used in URLs and output (`"08"`).
    pub fn id_string(&self) -> String {
        format!("{:02}", self.id)
    }

    pub fn start_year(&self) -> i32 {
        self.base + self.id as i32
    }

    /// `"2018-2019"`.
    pub fn label(&self) -> String {
        format!("{}-{}", self.start_year(), self.start_year() + 1)
    }

    pub fn next(&self) -> Self {
        Self::new(self.id + 1, self.base)
    }
}
