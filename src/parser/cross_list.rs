//! Unit rules spanning several named sections.
//!
//! Drafts are collected while the classifier walks a program and resolved
//! once the last section is flushed.

use std::collections::BTreeMap;

use crate::models::{RequirementRule, Section};

/// Where a draft came from.
#[derive(Debug, Clone, PartialEq)]
pub enum DraftSource {
    /// Explicit "... with at least M units from List X" sentence.
    Global,
    /// "at least M units from each area"; `section` is the ordinal of the
    /// unit section the directive opened.
    PerArea { section: usize, per_area_min_units: f64 },
}

/// A cross-list rule still collecting the sections it applies to.
#[derive(Debug, Clone, PartialEq)]
pub struct CrossListDraft {
    pub source: DraftSource,
    pub min_units_total: f64,
    pub per_list_min_units: BTreeMap<String, f64>,
    pub applies_to: Vec<String>,
    /// Cleared once a later header ends the directive's reach.
    pub accepting: bool,
}

impl CrossListDraft {
    pub fn global(min_units_total: f64, anchor: String, anchor_min_units: f64) -> Self {
        Self {
            source: DraftSource::Global,
            min_units_total,
            per_list_min_units: BTreeMap::from([(anchor, anchor_min_units)]),
            applies_to: Vec::new(),
            accepting: true,
        }
    }

    pub fn per_area(section: usize, min_units_total: f64, per_area_min_units: f64) -> Self {
        Self {
            source: DraftSource::PerArea {
                section,
                per_area_min_units,
            },
            min_units_total,
            per_list_min_units: BTreeMap::new(),
            applies_to: Vec::new(),
            accepting: true,
        }
    }

    pub fn is_global(&self) -> bool {
        self.source == DraftSource::Global
    }

    /// Record a named list the directive applies to.
    pub fn add_list(&mut self, name: &str) {
        if !self.applies_to.iter().any(|n| n == name) {
            self.applies_to.push(name.to_string());
        }
    }

    /// Record an area; per-area drafts also note its minimum.
    pub fn add_area(&mut self, name: &str) {
        if let DraftSource::PerArea {
            per_area_min_units, ..
        } = self.source
        {
            self.per_list_min_units
                .insert(name.to_string(), per_area_min_units);
        }
        self.add_list(name);
    }

    fn into_rule(self) -> RequirementRule {
        RequirementRule::CrossListUnits {
            applies_to: self.applies_to,
            min_units_total: self.min_units_total,
            per_list_min_units: self.per_list_min_units,
        }
    }
}

/// Turn drafts into `CROSS_LIST_UNITS` rules.
///
/// `sections` pairs every retained section with the ordinal it was opened
/// under. Drafts that never collected a target are dropped. A per-area
/// draft's own unit section, when retained, gets the final `allow_from`
/// and `per_list_min_units`.
pub fn resolve(
    sections: Vec<(usize, Section)>,
    drafts: Vec<CrossListDraft>,
) -> (Vec<Section>, Vec<RequirementRule>) {
    let drafts: Vec<CrossListDraft> = drafts
        .into_iter()
        .filter(|d| !d.applies_to.is_empty())
        .collect();

    let sections = sections
        .into_iter()
        .map(|(ordinal, section)| {
            let anchor = drafts.iter().find(|d| {
                matches!(d.source, DraftSource::PerArea { section, .. } if section == ordinal)
            });
            match anchor {
                Some(draft) => link_unit_section(section, draft),
                None => section,
            }
        })
        .collect();

    let rules = drafts.into_iter().map(CrossListDraft::into_rule).collect();
    (sections, rules)
}

fn link_unit_section(section: Section, draft: &CrossListDraft) -> Section {
    let rule = match section.rule {
        RequirementRule::Units {
            min_units,
            min_disciplines,
            discipline_from,
            ..
        } => RequirementRule::Units {
            min_units,
            min_disciplines,
            discipline_from,
            per_list_min_units: draft.per_list_min_units.clone(),
            allow_from: draft.applies_to.clone(),
        },
        other => other,
    };
    Section { rule, ..section }
}
