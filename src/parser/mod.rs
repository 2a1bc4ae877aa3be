// src/parser/mod.rs

//! Requirement parsers.
//!
//! Everything here is synchronous and free of I/O: markup, payloads and
//! course records go in, canonical values come out.

pub mod classifier;
pub mod course;
pub mod cross_list;
pub mod html;
pub mod reconcile;
pub mod requisite;
pub mod rules;
pub mod text;

pub use classifier::{Block, Classified, SectionClassifier};
pub use course::clean_course;
pub use html::CatalogParser;
pub use reconcile::{EvaluationResponse, ReconcileFailure, reconcile};
pub use requisite::parse_requirement_text;
pub use rules::{Header, classify_header, parse_rule_clause};
