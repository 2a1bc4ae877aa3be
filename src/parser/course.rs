// src/parser/course.rs

//! Course catalog record cleaning.
//!
//! Records are kept as JSON values: only a handful of keys are rewritten
//! and everything else passes through untouched.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};

use crate::error::Result;
use crate::models::LeafMeta;
use crate::parser::requisite::{annotate_leaves, combine_with_and, parse_requirement_text};
use crate::utils::prune_empty;

/// Keys with no use downstream.
pub const UNWANTED_KEYS: [&str; 24] = [
    "FullTitleDisplay",
    "TermsAndSections",
    "LocationsDisplay",
    "HasSections",
    "LocationCycleRestrictionDescriptions",
    "CreditsCeusDisplay",
    "CreditsDisplayLabel",
    "MatchingSectionIds",
    "Ceus",
    "TermSessionCycle",
    "TermYearlyCycle",
    "YearsOffered",
    "TermsOffered",
    "LocationCodes",
    "IsPseudoCourse",
    "EquatedCourseIds",
    "LocationCycleRestrictions",
    "VerifyGrades",
    "ShowDropRoster",
    "SubjectCode",
    "Number",
    "CorequisiteCourseId",
    "IsProtected",
    "ReferencesInvalidCourseOrSection",
];

const TITLE_KEY: &str = "CourseTitleDisplay";
const CODE_KEY: &str = "CourseCode";
const COURSE_REQUISITES: &str = "CourseRequisites";
const REQUISITES: &str = "Requisites";
const TREE_KEY: &str = "RequirementTree";

static TITLE_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([A-Za-z]+)-(\d+)").expect("title code regex"));

/// `"MATH-13 Statistics"` => `"MATH 13 Statistics"`.
fn rewrite_title(value: Value) -> Value {
    match value {
        Value::String(title) => Value::String(TITLE_CODE.replace_all(&title, "$1 $2").into_owned()),
        other => other,
    }
}

/// Clean a course record, or every record of an array, recursively.
///
/// Nested objects get the same treatment as the top level. The returned
/// value has no `null`, `[]` or `{}` entries.
pub fn clean_course(value: Value) -> Result<Value> {
    match value {
        Value::Object(map) => clean_object(map),
        Value::Array(items) => Ok(Value::Array(
            items
                .into_iter()
                .map(clean_course)
                .collect::<Result<Vec<_>>>()?,
        )),
        other => Ok(other),
    }
}

fn clean_object(map: Map<String, Value>) -> Result<Value> {
    let mut cleaned = Map::new();
    for (key, value) in map {
        if UNWANTED_KEYS.contains(&key.as_str()) {
            continue;
        }
        if key == TITLE_KEY {
            cleaned.insert(CODE_KEY.to_string(), rewrite_title(value));
        } else {
            cleaned.insert(key, clean_course(value)?);
        }
    }

    if let Some(Value::Array(requisites)) = cleaned.get(REQUISITES) {
        let orders = completion_orders(requisites);
        if let Some(Value::Array(course_requisites)) = cleaned.get_mut(COURSE_REQUISITES) {
            copy_completion_orders(course_requisites, &orders);
        }
    }

    if let Some(Value::Array(course_requisites)) = cleaned.get(COURSE_REQUISITES) {
        let trees = course_requisites
            .iter()
            .filter_map(Value::as_object)
            .filter_map(|requisite| {
                let text = requisite
                    .get("DisplayText")
                    .and_then(Value::as_str)
                    .unwrap_or("");
                let tree = parse_requirement_text(text)?;
                Some(annotate_leaves(tree, &leaf_meta(requisite)))
            })
            .collect();
        if let Some(tree) = combine_with_and(trees) {
            cleaned.insert(TREE_KEY.to_string(), serde_json::to_value(tree)?);
        }
    }

    cleaned.remove(COURSE_REQUISITES);
    cleaned.remove(REQUISITES);
    Ok(prune_empty(Value::Object(cleaned)))
}

/// `RequirementCode` => `CompletionOrder` for every requisite that names one.
fn completion_orders(requisites: &[Value]) -> HashMap<String, Value> {
    requisites
        .iter()
        .filter_map(Value::as_object)
        .filter_map(|r| {
            let code = r.get("RequirementCode").filter(|c| !c.is_null())?;
            let order = r.get("CompletionOrder").cloned().unwrap_or(Value::Null);
            Some((key_string(code), order))
        })
        .collect()
}

fn copy_completion_orders(course_requisites: &mut [Value], orders: &HashMap<String, Value>) {
    for requisite in course_requisites.iter_mut().filter_map(Value::as_object_mut) {
        let order = requisite
            .get("RequisiteId")
            .filter(|id| !id.is_null())
            .and_then(|id| orders.get(&key_string(id)));
        if let Some(order) = order.cloned() {
            requisite.insert("CompletionOrder".to_string(), order);
        }
    }
}

/// Ids arrive as strings or numbers; compare them as text.
fn key_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn leaf_meta(requisite: &Map<String, Value>) -> LeafMeta {
    let present = |key: &str| requisite.get(key).filter(|v| !v.is_null()).cloned();
    LeafMeta {
        requisite_id: present("RequisiteId"),
        is_required: requisite.get("IsRequired").and_then(Value::as_bool),
        completion_order: present("CompletionOrder"),
    }
}
