//! Boolean prerequisite trees.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Boolean connective of a group node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum BoolOp {
    And,
    Or,
}

/// Requisite record fields copied onto every leaf of its tree.
///
/// Values are passed through as they appear in the source records.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LeafMeta {
    #[serde(
        rename = "RequisiteId",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub requisite_id: Option<Value>,

    #[serde(rename = "IsRequired", default, skip_serializing_if = "Option::is_none")]
    pub is_required: Option<bool>,

    #[serde(
        rename = "CompletionOrder",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub completion_order: Option<Value>,
}

impl LeafMeta {
    pub fn is_empty(&self) -> bool {
        self.requisite_id.is_none() && self.is_required.is_none() && self.completion_order.is_none()
    }
}

/// A prerequisite tree.
///
/// Serialized as `{"op": "AND", "nodes": [...]}` for groups,
/// `{"course": "MATH 1", ...meta}` and `{"text": "...", ...meta}` for leaves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequisiteTree {
    Group {
        op: BoolOp,
        nodes: Vec<RequisiteTree>,
    },
    Course {
        course: String,
        #[serde(flatten)]
        meta: LeafMeta,
    },
    Text {
        text: String,
        #[serde(flatten)]
        meta: LeafMeta,
    },
}

impl RequisiteTree {
    pub fn course(code: impl Into<String>) -> Self {
        Self::Course {
            course: code.into(),
            meta: LeafMeta::default(),
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self::Text {
            text: text.into(),
            meta: LeafMeta::default(),
        }
    }

    /// Build a group, or `None` when there are no children.
    pub fn group(op: BoolOp, nodes: Vec<RequisiteTree>) -> Option<Self> {
        if nodes.is_empty() {
            None
        } else {
            Some(Self::Group { op, nodes })
        }
    }

    pub fn op(&self) -> Option<BoolOp> {
        match self {
            Self::Group { op, .. } => Some(*op),
            _ => None,
        }
    }

    /// All leaves in depth-first order.
    pub fn leaves(&self) -> Vec<&RequisiteTree> {
        match self {
            Self::Group { nodes, .. } => nodes.iter().flat_map(|n| n.leaves()).collect(),
            leaf => vec![leaf],
        }
    }

    /// Metadata of a leaf; `None` for groups.
    pub fn meta(&self) -> Option<&LeafMeta> {
        match self {
            Self::Group { .. } => None,
            Self::Course { meta, .. } | Self::Text { meta, .. } => Some(meta),
        }
    }
}
