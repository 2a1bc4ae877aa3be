// src/parser/classifier.rs

//! Section classifier.
//!
//! Walks the ordered content blocks of a program page and groups course
//! rows under the header that precedes them. The classifier is a plain
//! value: [`SectionClassifier::step`] consumes it and returns the next
//! state, and [`SectionClassifier::finish`] flushes the last section and
//! resolves cross-list directives.
//!
//! ```text
//! NoActiveSection ──header──▶ InSection ◀──header──▶ InSelectBlock
//!        │                        ▲                        │
//!        └──────course row────────┘            course rows absorbed
//! ```

use crate::models::{Choice, CourseOption, RequirementRule, Section};
use crate::parser::cross_list::{self, CrossListDraft};
use crate::parser::rules::{Header, classify_header};
use crate::parser::text::{normalize_course_code, starts_with_or};

const DEFAULT_SECTION: &str = "Required courses";

/// One content block of a program detail page.
#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    /// Free text; a header candidate.
    Text(String),
    /// A course-link row with the raw code cell and parsed units.
    Course { code: String, units: Option<f64> },
}

impl Block {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    pub fn course(code: impl Into<String>, units: Option<f64>) -> Self {
        Self::Course {
            code: code.into(),
            units,
        }
    }
}

/// Output of one classifier run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Classified {
    pub sections: Vec<Section>,
    pub cross_list_rules: Vec<RequirementRule>,
}

#[derive(Debug, Clone, PartialEq)]
struct SectionDraft {
    ordinal: usize,
    name: String,
    rule: RequirementRule,
    items: Vec<Choice>,
}

impl SectionDraft {
    fn push(&mut self, option: CourseOption, continues_previous: bool) {
        match self.items.last_mut() {
            Some(previous) if continues_previous => previous.any_of.push(option),
            _ => self.items.push(Choice {
                any_of: vec![option],
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum State {
    NoActiveSection,
    InSection(SectionDraft),
    /// Bare "Select N" block; `min` is the count or unit total announced.
    InSelectBlock { section: SectionDraft, min: f64 },
}

/// Line classifier state.
#[derive(Debug, Clone, PartialEq)]
pub struct SectionClassifier {
    state: State,
    next_ordinal: usize,
    sections: Vec<(usize, Section)>,
    drafts: Vec<CrossListDraft>,
}

impl Default for SectionClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl SectionClassifier {
    /// Start with an implicit all-required section so leading course rows
    /// are kept.
    pub fn new() -> Self {
        Self {
            state: State::InSection(SectionDraft {
                ordinal: 0,
                name: DEFAULT_SECTION.to_string(),
                rule: RequirementRule::All,
                items: Vec::new(),
            }),
            next_ordinal: 1,
            sections: Vec::new(),
            drafts: Vec::new(),
        }
    }

    /// Classify every block in order.
    pub fn classify<'a>(blocks: impl IntoIterator<Item = &'a Block>) -> Classified {
        blocks
            .into_iter()
            .fold(Self::new(), |classifier, block| classifier.step(block))
            .finish()
    }

    /// Feed one block.
    pub fn step(self, block: &Block) -> Self {
        match block {
            Block::Text(text) => match classify_header(text) {
                Some(header) => self.open(header),
                None => self,
            },
            Block::Course { code, units } => self.push_course(code, *units),
        }
    }

    /// Flush the open section and resolve cross-list drafts.
    pub fn finish(self) -> Classified {
        let Self {
            sections, drafts, ..
        } = self.flush();
        let (sections, cross_list_rules) = cross_list::resolve(sections, drafts);
        Classified {
            sections,
            cross_list_rules,
        }
    }

    fn open(self, header: Header) -> Self {
        if let Header::CrossListGlobal {
            min_units_total,
            anchor,
            anchor_min_units,
        } = header
        {
            let mut next = self;
            next.stop_accepting(|_| true);
            next.drafts.push(CrossListDraft::global(
                min_units_total,
                anchor,
                anchor_min_units,
            ));
            return next;
        }

        let mut next = self.flush();
        let ordinal = next.next_ordinal;
        next.next_ordinal += 1;

        let (Some(name), Some(mut rule)) = (header.section_name(), header.rule()) else {
            return next;
        };

        match &header {
            Header::UnitsPerArea {
                min_units,
                per_area_min_units,
            } => {
                next.stop_accepting(|d| !d.is_global());
                next.drafts.push(CrossListDraft::per_area(
                    ordinal,
                    *min_units,
                    *per_area_min_units,
                ));
            }
            Header::NamedList { name, .. } => {
                next.stop_accepting(|d| !d.is_global());
                if name.starts_with("List ") {
                    if let Some(draft) = next.accepting_draft(true) {
                        draft.add_list(name);
                    }
                }
            }
            Header::Area { name, .. } => {
                if let Some(draft) = next.accepting_draft(false) {
                    draft.add_area(name);
                    if let cross_list::DraftSource::PerArea {
                        per_area_min_units, ..
                    } = draft.source
                    {
                        rule = RequirementRule::units(per_area_min_units);
                    }
                }
            }
            _ => next.stop_accepting(|d| !d.is_global()),
        }

        let section = SectionDraft {
            ordinal,
            name,
            rule,
            items: Vec::new(),
        };
        next.state = if header.is_select_block() {
            State::InSelectBlock {
                min: select_minimum(&section.rule),
                section,
            }
        } else {
            State::InSection(section)
        };
        next
    }

    fn push_course(mut self, raw: &str, units: Option<f64>) -> Self {
        let code = normalize_course_code(raw);
        if code.is_empty() {
            return self;
        }
        let option = CourseOption { code, units };
        let continues_previous = starts_with_or(raw);

        match &mut self.state {
            State::InSection(section) | State::InSelectBlock { section, .. } => {
                section.push(option, continues_previous);
            }
            State::NoActiveSection => {
                let mut section = SectionDraft {
                    ordinal: self.next_ordinal,
                    name: DEFAULT_SECTION.to_string(),
                    rule: RequirementRule::All,
                    items: Vec::new(),
                };
                self.next_ordinal += 1;
                section.push(option, false);
                self.state = State::InSection(section);
            }
        }
        self
    }

    /// Close the open section; sections without items are discarded.
    fn flush(mut self) -> Self {
        let section = match std::mem::replace(&mut self.state, State::NoActiveSection) {
            State::NoActiveSection => return self,
            State::InSection(section) => section,
            State::InSelectBlock { section, min } => {
                if let RequirementRule::Count { .. } = section.rule {
                    if (section.items.len() as f64) < min {
                        log::debug!(
                            "Section '{}' offers {} choices but asks for {}",
                            section.name,
                            section.items.len(),
                            min
                        );
                    }
                }
                section
            }
        };

        if !section.items.is_empty() {
            self.sections.push((
                section.ordinal,
                Section {
                    name: section.name,
                    rule: section.rule,
                    items: section.items,
                },
            ));
        }
        self
    }

    fn stop_accepting(&mut self, filter: impl Fn(&CrossListDraft) -> bool) {
        for draft in self.drafts.iter_mut().filter(|d| filter(d)) {
            draft.accepting = false;
        }
    }

    /// Latest draft of the given kind still collecting targets.
    fn accepting_draft(&mut self, global: bool) -> Option<&mut CrossListDraft> {
        self.drafts
            .iter_mut()
            .rev()
            .find(|d| d.accepting && d.is_global() == global)
    }
}

fn select_minimum(rule: &RequirementRule) -> f64 {
    match rule {
        RequirementRule::Count { min, .. } => f64::from(*min),
        RequirementRule::Units { min_units, .. } => *min_units,
        _ => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    fn run(blocks: &[Block]) -> Classified {
        SectionClassifier::classify(blocks)
    }

    fn codes(section: &Section) -> Vec<Vec<&str>> {
        section
            .items
            .iter()
            .map(|c| c.any_of.iter().map(|o| o.code.as_str()).collect())
            .collect()
    }

    #[test]
    fn two_named_lists() {
        let out = run(&[
            Block::text("List A (Select one):"),
            Block::course("BIOL 1", Some(4.0)),
            Block::course("BIOL 2", Some(4.0)),
            Block::text("List B (Select two):"),
            Block::course("CHEM 1A", Some(5.0)),
            Block::course("CHEM 1B", Some(5.0)),
            Block::course("CHEM 2", Some(3.0)),
        ]);

        assert_eq!(out.sections.len(), 2);
        assert_eq!(out.sections[0].name, "List A");
        assert_eq!(out.sections[0].rule, RequirementRule::exactly(1));
        assert_eq!(out.sections[0].items.len(), 2);
        assert_eq!(out.sections[1].name, "List B");
        assert_eq!(out.sections[1].rule, RequirementRule::exactly(2));
        assert_eq!(out.sections[1].items.len(), 3);
        assert!(out.cross_list_rules.is_empty());
    }

    #[test]
    fn leading_rows_land_in_required_courses() {
        let out = run(&[
            Block::course("MATH 1", Some(4.0)),
            Block::text("Select two:"),
            Block::course("PHYS 2A", Some(4.0)),
            Block::course("PHYS 2B", Some(4.0)),
        ]);

        assert_eq!(out.sections[0].name, "Required courses");
        assert_eq!(out.sections[0].rule, RequirementRule::All);
        assert_eq!(out.sections[1].name, "Select 2");
        assert_eq!(out.sections[1].rule, RequirementRule::exactly(2));
    }

    #[test]
    fn empty_sections_are_discarded() {
        let out = run(&[
            Block::text("Required courses:"),
            Block::text("List A (Select one):"),
            Block::course("ART 1", None),
        ]);
        assert_eq!(out.sections.len(), 1);
        assert_eq!(out.sections[0].name, "List A");
    }

    #[test]
    fn or_rows_merge_into_previous_choice() {
        let out = run(&[
            Block::course("ENGL 1A", Some(3.0)),
            Block::course("or ENGL 1AH", Some(3.0)),
            Block::course("MATH 13", Some(4.0)),
        ]);
        assert_eq!(
            codes(&out.sections[0]),
            vec![vec!["ENGL 1A", "ENGL 1AH"], vec!["MATH 13"]]
        );
    }

    #[test]
    fn leading_or_without_previous_choice_starts_one() {
        let out = run(&[Block::text("Select one:"), Block::course("or ART 2", None)]);
        assert_eq!(codes(&out.sections[0]), vec![vec!["ART 2"]]);
    }

    #[test]
    fn unmatched_text_is_ignored() {
        let out = run(&[
            Block::text("Required courses:"),
            Block::course("MATH 1", None),
            Block::text("Total units 24"),
            Block::course("MATH 2", None),
        ]);
        assert_eq!(out.sections.len(), 1);
        assert_eq!(out.sections[0].items.len(), 2);
    }

    #[test]
    fn per_area_directive_wires_areas() {
        let out = run(&[
            Block::text("Select nine units from the following, at least three units from each area:"),
            Block::text("Biological Sciences:"),
            Block::course("BIOL 1", Some(4.0)),
            Block::text("Physical Sciences:"),
            Block::course("CHEM 1A", Some(5.0)),
            Block::course("PHYS 2A", Some(4.0)),
        ]);

        let names: Vec<&str> = out.sections.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Biological Sciences", "Physical Sciences"]);
        for section in &out.sections {
            assert_eq!(section.rule, RequirementRule::units(3.0));
        }

        let per_list = BTreeMap::from([
            ("Biological Sciences".to_string(), 3.0),
            ("Physical Sciences".to_string(), 3.0),
        ]);
        assert_eq!(
            out.cross_list_rules,
            vec![RequirementRule::CrossListUnits {
                applies_to: vec!["Biological Sciences".into(), "Physical Sciences".into()],
                min_units_total: 9.0,
                per_list_min_units: per_list,
            }]
        );
    }

    #[test]
    fn per_area_unit_section_gets_links_when_it_has_rows() {
        let out = run(&[
            Block::text("Select 6 units, at least 3 units from each area:"),
            Block::course("HIST 1", Some(3.0)),
            Block::text("Arts Emphasis"),
            Block::course("ART 1", Some(3.0)),
        ]);

        assert_eq!(out.sections[0].name, "Select 6 units");
        assert_eq!(out.sections[0].rule.references(), ["Arts Emphasis".to_string()]);
        assert_eq!(out.sections[1].rule, RequirementRule::units(3.0));
    }

    #[test]
    fn areas_after_another_select_block_are_not_wired() {
        let out = run(&[
            Block::text("Select 6 units, at least 3 units from each area:"),
            Block::text("Select two:"),
            Block::course("ART 1", None),
            Block::text("Biology:"),
            Block::course("BIOL 1", None),
        ]);
        assert!(out.cross_list_rules.is_empty());
        assert_eq!(out.sections[1].rule, RequirementRule::All);
    }

    #[test]
    fn global_directive_collects_following_lists() {
        let out = run(&[
            Block::text(
                "Select 10 units minimum from the lists below, with at least 3 units from List A",
            ),
            Block::text("List A (Select one):"),
            Block::course("BIOL 1", Some(4.0)),
            Block::text("List B (Select one):"),
            Block::course("CHEM 1A", Some(5.0)),
        ]);

        assert_eq!(
            out.cross_list_rules,
            vec![RequirementRule::CrossListUnits {
                applies_to: vec!["List A".into(), "List B".into()],
                min_units_total: 10.0,
                per_list_min_units: BTreeMap::from([("List A".to_string(), 3.0)]),
            }]
        );
    }

    #[test]
    fn directive_without_targets_is_dropped() {
        let out = run(&[
            Block::text(
                "Select 10 units minimum from the lists below, with at least 3 units from List A",
            ),
            Block::course("BIOL 1", Some(4.0)),
        ]);
        assert!(out.cross_list_rules.is_empty());
        assert_eq!(out.sections.len(), 1);
    }

    #[test]
    fn stepping_is_pure() {
        let blocks = [
            Block::text("List A (Select one):"),
            Block::course("BIOL 1", None),
        ];
        assert_eq!(run(&blocks), run(&blocks));
    }
}
