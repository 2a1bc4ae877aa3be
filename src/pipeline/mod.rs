//! Pipeline entry points for catalog operations.
//!
//! - `run_crawler`: Crawl catalog years into per-year snapshots
//! - `run_courses`: Clean a course export
//! - `run_evaluation`: Rebuild programs from evaluation payloads

pub mod courses;
pub mod crawl;
pub mod evaluate;

pub use courses::run_courses;
pub use crawl::run_crawler;
pub use evaluate::{EvaluationReport, program_codes_from_snapshot, run_evaluation};
