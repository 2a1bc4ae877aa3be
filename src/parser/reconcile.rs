// src/parser/reconcile.rs

//! Program evaluation payloads to the canonical program model.
//!
//! The evaluation service nests requirements as
//! `Requirement -> Subrequirement -> Group -> Course`. Every group becomes
//! one [`Section`]; administrative sections are dropped.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

use crate::models::{Choice, CourseOption, Program, ProgramDetail, RequirementRule, Section};

/// Section name markers for bookkeeping requirements.
const ADMIN_MARKERS: [&str; 3] = ["Electives", "Grad Check", "Graduation Requirement"];

static DISPLAY_COURSE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b([A-Z]{2,4}[- ]\w{1,5})\b").expect("display course regex")
});

/// Top-level evaluation response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct EvaluationResponse {
    pub program: Option<EvalProgram>,
    #[serde(deserialize_with = "null_as_default")]
    pub notifications: Vec<Notification>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Notification {
    #[serde(deserialize_with = "null_as_default")]
    pub message: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct EvalProgram {
    #[serde(deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(deserialize_with = "null_as_default")]
    pub code: String,
    #[serde(deserialize_with = "null_as_default")]
    pub degree: String,
    #[serde(deserialize_with = "null_as_default")]
    pub departments: Vec<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub requirements: Vec<Requirement>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Requirement {
    pub description: Option<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub code: String,
    #[serde(deserialize_with = "null_as_default")]
    pub subrequirements: Vec<Subrequirement>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Subrequirement {
    #[serde(deserialize_with = "null_as_default")]
    pub code: String,
    pub display_text: Option<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub groups: Vec<Group>,
    pub min_groups: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Group {
    #[serde(deserialize_with = "null_as_default")]
    pub courses: Vec<CourseRef>,
    #[serde(deserialize_with = "null_as_default")]
    pub from_courses: Vec<CourseRef>,
    pub min_credits: Option<f64>,
    pub min_courses: Option<f64>,
    pub min_subjects: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct CourseRef {
    pub course_name: Option<String>,
}

/// Explicit `null` reads as the field's default, like a missing key.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Why a payload produced no program.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReconcileFailure {
    #[error("empty or invalid data")]
    EmptyPayload,

    #[error("no requirements: {message}")]
    NoRequirements { message: String },

    #[error("no sections produced")]
    NoSections,
}

/// Build a canonical program from an evaluation payload.
pub fn reconcile(payload: &EvaluationResponse) -> Result<Program, ReconcileFailure> {
    let program = payload
        .program
        .as_ref()
        .ok_or(ReconcileFailure::EmptyPayload)?;

    if program.requirements.is_empty() {
        let message = payload
            .notifications
            .iter()
            .map(|n| n.message.as_str())
            .find(|m| m.to_lowercase().contains("no requirements"))
            .unwrap_or("empty Requirements array")
            .to_string();
        return Err(ReconcileFailure::NoRequirements { message });
    }

    let sections: Vec<Section> = program
        .requirements
        .iter()
        .flat_map(|req| {
            let req_name = req
                .description
                .as_deref()
                .filter(|d| !d.is_empty())
                .unwrap_or(req.code.as_str());
            req.subrequirements
                .iter()
                .flat_map(move |sub| subrequirement_sections(req_name, sub))
        })
        .collect();

    if sections.is_empty() {
        return Err(ReconcileFailure::NoSections);
    }

    Ok(Program {
        name: program.title.clone(),
        program_type: program.degree.clone(),
        department: program
            .departments
            .iter()
            .find(|d| !d.trim().is_empty())
            .cloned()
            .unwrap_or_else(|| "Unknown".to_string()),
        program_code: program.code.clone(),
        detail: Some(ProgramDetail {
            sections,
            ..ProgramDetail::default()
        }),
        ..Program::default()
    })
}

fn section_name(req_name: &str, sub: &Subrequirement) -> String {
    format!("{req_name} - {}", sub.code).replace("General Education - ", "GE ")
}

fn is_admin(name: &str) -> bool {
    ADMIN_MARKERS.iter().any(|m| name.contains(m))
}

/// `eng-1a` => `ENG 1A`.
fn clean_course_code(code: &str) -> String {
    code.replace('-', " ").trim().to_uppercase()
}

fn listed_courses(courses: &[CourseRef]) -> Vec<String> {
    courses
        .iter()
        .filter_map(|c| c.course_name.as_deref())
        .filter(|name| !name.is_empty())
        .map(clean_course_code)
        .collect()
}

fn group_courses(group: &Group) -> Vec<String> {
    let courses = listed_courses(&group.courses);
    if courses.is_empty() {
        listed_courses(&group.from_courses)
    } else {
        courses
    }
}

/// Course codes mentioned in display text, sorted and unique.
fn courses_in_text(text: &str) -> Vec<String> {
    DISPLAY_COURSE
        .captures_iter(text)
        .map(|caps| clean_course_code(&caps[1]))
        .filter(|code| code.chars().any(|c| c.is_ascii_digit()))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

fn subrequirement_sections(req_name: &str, sub: &Subrequirement) -> Vec<Section> {
    let name = section_name(req_name, sub);
    if is_admin(&name) {
        return Vec::new();
    }

    if let Some(section) = collapse_paired_groups(&name, sub) {
        return vec![section];
    }

    let is_ge = name.contains("GE ") || name.contains("General Education");
    sub.groups
        .iter()
        .filter_map(|group| {
            let mut courses = group_courses(group);
            if courses.is_empty() {
                courses = courses_in_text(sub.display_text.as_deref().unwrap_or(""));
            }

            let rule = group_rule(group, is_ge && courses.len() > 1);
            let items = items_for(&rule, &courses);
            let keep = !items.is_empty() || rule != RequirementRule::All;
            keep.then(|| Section {
                name: name.clone(),
                rule,
                items,
            })
        })
        .collect()
}

/// Two electable groups that differ by one course each collapse into one
/// section over their union. Matches one observed catalog shape only.
fn collapse_paired_groups(name: &str, sub: &Subrequirement) -> Option<Section> {
    let [first, second] = sub.groups.as_slice() else {
        return None;
    };
    if sub.min_groups != Some(1) {
        return None;
    }

    let a: BTreeSet<String> = group_courses(first).into_iter().collect();
    let b: BTreeSet<String> = group_courses(second).into_iter().collect();
    let shared = a.intersection(&b).count();
    if shared == 0 || a.difference(&b).count() != 1 || b.difference(&a).count() != 1 {
        return None;
    }

    let union: Vec<String> = a.union(&b).cloned().collect();
    let rule = group_rule(first, false);
    let items = items_for(&rule, &union);
    Some(Section {
        name: name.to_string(),
        rule,
        items,
    })
}

/// Credits, then courses, then the GE default, then all-required.
fn group_rule(group: &Group, substitutable: bool) -> RequirementRule {
    let credits = group.min_credits.unwrap_or(0.0);
    let courses = group.min_courses.unwrap_or(0.0);
    let subjects = group.min_subjects.unwrap_or(0.0);

    if credits > 0.0 {
        RequirementRule::Units {
            min_units: credits,
            min_disciplines: (subjects > 0.0).then_some((subjects.ceil() as u32).max(1)),
            discipline_from: None,
            per_list_min_units: BTreeMap::new(),
            allow_from: Vec::new(),
        }
    } else if courses > 0.0 {
        // Fractional counts round up; any positive count needs one course.
        RequirementRule::at_least((courses.ceil() as u32).max(1))
    } else if substitutable {
        RequirementRule::at_least(1)
    } else {
        RequirementRule::All
    }
}

/// A count below the pool size repeats one pooled choice `min` times;
/// everything else lists each course as its own choice.
fn items_for(rule: &RequirementRule, courses: &[String]) -> Vec<Choice> {
    match rule {
        RequirementRule::Count { min, .. } if (*min as usize) < courses.len() => {
            let pool = Choice {
                any_of: courses
                    .iter()
                    .map(|code| CourseOption {
                        code: code.clone(),
                        units: None,
                    })
                    .collect(),
            };
            vec![pool; (*min).max(1) as usize]
        }
        _ => courses
            .iter()
            .map(|code| Choice::single(code.as_str(), None))
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload(value: serde_json::Value) -> EvaluationResponse {
        serde_json::from_value(value).unwrap()
    }

    fn courses(names: &[&str]) -> serde_json::Value {
        names
            .iter()
            .map(|n| json!({"CourseName": n}))
            .collect::<Vec<_>>()
            .into()
    }

    fn sample() -> EvaluationResponse {
        payload(json!({
            "Program": {
                "Title": "Biology",
                "Code": "BIO.AS",
                "Degree": "AS",
                "Departments": ["SCI"],
                "Requirements": [
                    {
                        "Description": "Major",
                        "Code": "MAJ",
                        "Subrequirements": [
                            {
                                "Code": "CORE",
                                "Groups": [{"Courses": courses(&["BIOL-1", "BIOL-2"])}]
                            },
                            {
                                "Code": "SEQ",
                                "MinGroups": 1,
                                "Groups": [
                                    {"Courses": courses(&["CHEM-1A", "CHEM-1B", "PHYS-2A"]), "MinCourses": 2},
                                    {"Courses": courses(&["CHEM-1A", "CHEM-1B", "PHYS-4A"]), "MinCourses": 2}
                                ]
                            },
                            {
                                "Code": "UNITS",
                                "Groups": [{"FromCourses": courses(&["MATH-13", "MATH-20"]), "MinCredits": 6.0, "MinSubjects": 2}]
                            }
                        ]
                    },
                    {
                        "Description": "General Education",
                        "Code": "GE",
                        "Subrequirements": [
                            {"Code": "AREA-B", "DisplayText": "Take ENGL 2 or COMM 4", "Groups": [{}]}
                        ]
                    },
                    {
                        "Code": "ELECT",
                        "Description": "Electives",
                        "Subrequirements": [{"Code": "ANY", "Groups": [{"Courses": courses(&["ART-1"])}]}]
                    }
                ]
            }
        }))
    }

    #[test]
    fn maps_program_fields() {
        let program = reconcile(&sample()).unwrap();
        assert_eq!(program.name, "Biology");
        assert_eq!(program.program_code, "BIO.AS");
        assert_eq!(program.program_type, "AS");
        assert_eq!(program.department, "SCI");
    }

    #[test]
    fn builds_sections() {
        let program = reconcile(&sample()).unwrap();
        let sections = program.detail.unwrap().sections;
        let names: Vec<&str> = sections.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["Major - CORE", "Major - SEQ", "Major - UNITS", "GE AREA-B"]
        );

        assert_eq!(sections[0].rule, RequirementRule::All);
        assert_eq!(sections[0].items[1].any_of[0].code, "BIOL 2");

        assert_eq!(
            sections[2].rule,
            RequirementRule::Units {
                min_units: 6.0,
                min_disciplines: Some(2),
                discipline_from: None,
                per_list_min_units: Default::default(),
                allow_from: Vec::new(),
            }
        );
        assert_eq!(sections[2].items.len(), 2);

        assert_eq!(sections[3].rule, RequirementRule::at_least(1));
        assert_eq!(sections[3].items.len(), 1);
        let pooled: Vec<&str> = sections[3].items[0]
            .any_of
            .iter()
            .map(|o| o.code.as_str())
            .collect();
        assert_eq!(pooled, vec!["COMM 4", "ENGL 2"]);
    }

    #[test]
    fn paired_groups_collapse_to_union() {
        let program = reconcile(&sample()).unwrap();
        let seq = &program.detail.unwrap().sections[1];
        assert_eq!(seq.rule, RequirementRule::at_least(2));
        assert_eq!(seq.items.len(), 2);
        let pooled: Vec<&str> = seq.items[0].any_of.iter().map(|o| o.code.as_str()).collect();
        assert_eq!(pooled, vec!["CHEM 1A", "CHEM 1B", "PHYS 2A", "PHYS 4A"]);
    }

    #[test]
    fn admin_sections_are_dropped() {
        let program = reconcile(&sample()).unwrap();
        let detail = program.detail.unwrap();
        assert!(detail.sections.iter().all(|s| !s.name.contains("Electives")));
    }

    #[test]
    fn output_is_deterministic() {
        let first = serde_json::to_vec(&reconcile(&sample()).unwrap()).unwrap();
        let second = serde_json::to_vec(&reconcile(&sample()).unwrap()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn null_fields_read_as_empty() {
        let response = payload(json!({
            "Program": {
                "Title": "Welding",
                "Code": "WELD.CA",
                "Degree": null,
                "Departments": null,
                "Requirements": [{
                    "Description": null,
                    "Code": "MAJ",
                    "Subrequirements": [{
                        "Code": "CORE",
                        "DisplayText": null,
                        "MinGroups": null,
                        "Groups": [{
                            "Courses": courses(&["WELD-10", "WELD-20"]),
                            "FromCourses": null,
                            "MinCourses": null
                        }]
                    }]
                }]
            },
            "Notifications": null
        }));

        let program = reconcile(&response).unwrap();
        assert_eq!(program.department, "Unknown");
        assert_eq!(program.program_type, "");
        let sections = program.detail.unwrap().sections;
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].name, "MAJ - CORE");
        assert_eq!(sections[0].rule, RequirementRule::All);
        assert_eq!(sections[0].items.len(), 2);
    }

    #[test]
    fn null_lists_fall_back_to_display_text() {
        let response = payload(json!({
            "Program": {
                "Code": null,
                "Title": null,
                "Departments": [""],
                "Requirements": [{
                    "Code": "GE",
                    "Description": "General Education",
                    "Subrequirements": [{
                        "Code": "AREA-C",
                        "DisplayText": "Take ART 1 or MUS 3",
                        "Groups": [{"Courses": null, "FromCourses": null}]
                    }, {
                        "Code": "AREA-D",
                        "Groups": null
                    }]
                }]
            },
            "Notifications": [{"Message": null}]
        }));

        let program = reconcile(&response).unwrap();
        assert_eq!(program.department, "Unknown");
        assert_eq!(program.program_code, "");
        let sections = program.detail.unwrap().sections;
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].name, "GE AREA-C");
        let pooled: Vec<&str> = sections[0].items[0]
            .any_of
            .iter()
            .map(|o| o.code.as_str())
            .collect();
        assert_eq!(pooled, vec!["ART 1", "MUS 3"]);
    }

    #[test]
    fn null_requirements_report_notification() {
        assert_eq!(
            reconcile(&payload(json!({
                "Program": {"Title": "X", "Requirements": null},
                "Notifications": [{"Message": null}, {"Message": "No requirements found"}]
            }))),
            Err(ReconcileFailure::NoRequirements {
                message: "No requirements found".into()
            })
        );
    }

    #[test]
    fn fractional_minimums_round_up() {
        let group = Group {
            min_courses: Some(0.5),
            ..Group::default()
        };
        assert_eq!(group_rule(&group, false), RequirementRule::at_least(1));

        let group = Group {
            min_courses: Some(2.5),
            ..Group::default()
        };
        assert_eq!(group_rule(&group, false), RequirementRule::at_least(3));

        let group = Group {
            min_credits: Some(3.0),
            min_subjects: Some(1.5),
            ..Group::default()
        };
        assert!(matches!(
            group_rule(&group, false),
            RequirementRule::Units { min_disciplines: Some(2), .. }
        ));
    }

    #[test]
    fn failure_reasons() {
        assert_eq!(
            reconcile(&payload(json!({}))),
            Err(ReconcileFailure::EmptyPayload)
        );
        assert_eq!(
            reconcile(&payload(json!({
                "Program": {"Title": "X", "Requirements": []},
                "Notifications": [{"Message": "Program has No Requirements defined"}]
            }))),
            Err(ReconcileFailure::NoRequirements {
                message: "Program has No Requirements defined".into()
            })
        );
        assert_eq!(
            reconcile(&payload(json!({
                "Program": {"Requirements": [{"Code": "R", "Description": "Grad Check", "Subrequirements": [{"Code": "A", "Groups": [{}]}]}]}
            }))),
            Err(ReconcileFailure::NoSections)
        );
    }
}
