//! Free-text prerequisite descriptions to boolean trees.
//!
//! `and` is tried before `or` at every level, so `"A and B or C"` parses as
//! `AND[A, OR[B, C]]`. Downstream consumers depend on this precedence.

use std::sync::LazyLock;

use regex::Regex;

use crate::models::{BoolOp, LeafMeta, RequisiteTree};
use crate::parser::text::{
    course_tokens, has_course_token, split_top_level, strip_outer_brackets,
};

/// Concurrent-enrollment permission is not modeled.
static CONCURRENT_ASIDE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\([^)]*or concurrent enrollment[^)]*\)").expect("concurrent aside regex")
});

static PARENTHETICAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\([^)]*\)").expect("parenthetical regex"));

/// Parse one requisite description. Blank input yields `None`.
pub fn parse_requirement_text(text: &str) -> Option<RequisiteTree> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    let without_aside = CONCURRENT_ASIDE.replace_all(text, "");
    let s = strip_outer_brackets(&without_aside);

    if has_course_token(s) {
        for (keyword, op) in [("and", BoolOp::And), ("or", BoolOp::Or)] {
            let parts = split_top_level(s, keyword);
            if parts.len() > 1 {
                let nodes = parts
                    .iter()
                    .filter_map(|part| parse_requirement_text(part))
                    .collect();
                return RequisiteTree::group(op, nodes);
            }
        }
    }

    let bare = PARENTHETICAL.replace_all(s, "");
    let bare = strip_outer_brackets(bare.trim());
    let mut courses = course_tokens(bare);

    match courses.len() {
        0 if s.is_empty() => None,
        0 => Some(RequisiteTree::text(s)),
        1 => courses.pop().map(RequisiteTree::course),
        // Juxtaposed course lists without a connective are substitutable.
        _ => RequisiteTree::group(
            BoolOp::Or,
            courses.into_iter().map(RequisiteTree::course).collect(),
        ),
    }
}

/// Copy `meta` onto every leaf. Group nodes stay bare.
pub fn annotate_leaves(tree: RequisiteTree, meta: &LeafMeta) -> RequisiteTree {
    match tree {
        RequisiteTree::Group { op, nodes } => RequisiteTree::Group {
            op,
            nodes: nodes
                .into_iter()
                .map(|node| annotate_leaves(node, meta))
                .collect(),
        },
        RequisiteTree::Course { course, meta: own } => RequisiteTree::Course {
            course,
            meta: merge_meta(own, meta),
        },
        RequisiteTree::Text { text, meta: own } => RequisiteTree::Text {
            text,
            meta: merge_meta(own, meta),
        },
    }
}

fn merge_meta(own: LeafMeta, incoming: &LeafMeta) -> LeafMeta {
    LeafMeta {
        requisite_id: incoming.requisite_id.clone().or(own.requisite_id),
        is_required: incoming.is_required.or(own.is_required),
        completion_order: incoming.completion_order.clone().or(own.completion_order),
    }
}

/// AND together the trees of several requisite descriptions.
///
/// Top-level `AND` trees are spliced into the result; `OR` trees are kept
/// whole.
pub fn combine_with_and(trees: Vec<RequisiteTree>) -> Option<RequisiteTree> {
    if trees.len() <= 1 {
        return trees.into_iter().next();
    }

    let mut nodes = Vec::new();
    for tree in trees {
        match tree {
            RequisiteTree::Group {
                op: BoolOp::And,
                nodes: children,
            } => nodes.extend(children),
            other => nodes.push(other),
        }
    }
    RequisiteTree::group(BoolOp::And, nodes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn course(code: &str) -> RequisiteTree {
        RequisiteTree::course(code)
    }

    #[test]
    fn and_of_two_courses() {
        assert_eq!(
            parse_requirement_text("MATH 1 and MATH 2"),
            Some(RequisiteTree::Group {
                op: BoolOp::And,
                nodes: vec![course("MATH 1"), course("MATH 2")],
            })
        );
    }

    #[test]
    fn or_of_two_courses() {
        assert_eq!(
            parse_requirement_text("ENGL 1A or ENGL 1AH"),
            Some(RequisiteTree::Group {
                op: BoolOp::Or,
                nodes: vec![course("ENGL 1A"), course("ENGL 1AH")],
            })
        );
    }

    #[test]
    fn empty_input_is_none() {
        assert_eq!(parse_requirement_text(""), None);
        assert_eq!(parse_requirement_text("   "), None);
    }

    #[test]
    fn and_binds_before_or() {
        let tree = parse_requirement_text("MATH 1 and MATH 2 or MATH 3").unwrap();
        assert_eq!(
            tree,
            RequisiteTree::Group {
                op: BoolOp::And,
                nodes: vec![
                    course("MATH 1"),
                    RequisiteTree::Group {
                        op: BoolOp::Or,
                        nodes: vec![course("MATH 2"), course("MATH 3")],
                    },
                ],
            }
        );
    }

    #[test]
    fn bracketed_clause_is_a_unit() {
        let tree = parse_requirement_text("[CHEM 1A or CHEM 2A] and MATH 20").unwrap();
        assert_eq!(tree.op(), Some(BoolOp::And));
        let RequisiteTree::Group { nodes, .. } = tree else {
            panic!("expected group");
        };
        assert_eq!(nodes[0].op(), Some(BoolOp::Or));
        assert_eq!(nodes[1], course("MATH 20"));
    }

    #[test]
    fn concurrent_enrollment_aside_is_dropped() {
        assert_eq!(
            parse_requirement_text("MATH 18 (may be taken with or concurrent enrollment)"),
            Some(course("MATH 18"))
        );
    }

    #[test]
    fn prose_becomes_text_leaf() {
        assert_eq!(
            parse_requirement_text("Eligibility for English composition"),
            Some(RequisiteTree::text("Eligibility for English composition"))
        );
    }

    #[test]
    fn comma_list_defaults_to_or() {
        assert_eq!(
            parse_requirement_text("BIOL 1, BIOL 2, BIOL 3"),
            Some(RequisiteTree::Group {
                op: BoolOp::Or,
                nodes: vec![course("BIOL 1"), course("BIOL 2"), course("BIOL 3")],
            })
        );
    }

    #[test]
    fn annotation_reaches_leaves_only() {
        let tree = parse_requirement_text("MATH 1 and MATH 2").unwrap();
        let meta = LeafMeta {
            requisite_id: Some(json!("42")),
            is_required: Some(true),
            completion_order: Some(json!("Previous")),
        };
        let annotated = annotate_leaves(tree, &meta);

        assert!(annotated.meta().is_none());
        for leaf in annotated.leaves() {
            assert_eq!(leaf.meta(), Some(&meta));
        }
    }

    #[test]
    fn combine_flattens_and_but_not_or() {
        let and_tree = parse_requirement_text("MATH 1 and MATH 2").unwrap();
        let or_tree = parse_requirement_text("ENGL 1A or ENGL 1AH").unwrap();
        let combined = combine_with_and(vec![and_tree, or_tree.clone()]).unwrap();

        assert_eq!(
            combined,
            RequisiteTree::Group {
                op: BoolOp::And,
                nodes: vec![course("MATH 1"), course("MATH 2"), or_tree],
            }
        );
    }

    #[test]
    fn combine_single_and_empty() {
        assert_eq!(combine_with_and(Vec::new()), None);
        assert_eq!(
            combine_with_and(vec![course("MATH 1")]),
            Some(course("MATH 1"))
        );
    }
}
