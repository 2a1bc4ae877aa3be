// src/pipeline/courses.rs

//! Course export cleaning.

use std::path::Path;

use serde_json::Value;

use crate::error::Result;
use crate::parser::clean_course;
use crate::storage::{SnapshotStorage, WriteMetadata};

const COURSES_KEY: &str = "CourseFullModels";

/// Clean a course export and write the cleaned array under `output_key`.
///
/// An export without course records produces an empty array.
pub async fn run_courses(
    input: &Path,
    output_key: &str,
    storage: &dyn SnapshotStorage,
) -> Result<WriteMetadata> {
    log::info!("Reading courses from {}", input.display());
    let content = tokio::fs::read_to_string(input).await?;
    let mut export: Value = serde_json::from_str(&content)?;

    let courses = match export.get_mut(COURSES_KEY).map(Value::take) {
        Some(Value::Array(courses)) => courses,
        _ => {
            log::warn!("{} has no {} array", input.display(), COURSES_KEY);
            Vec::new()
        }
    };
    log::info!("Cleaning {} course records", courses.len());

    let cleaned = clean_course(Value::Array(courses))?;
    let meta = storage.write_document(output_key, &cleaned).await?;
    log::info!("Wrote {} courses to {}", meta.count, meta.location);
    Ok(meta)
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tempfile::TempDir;

    use super::*;
    use crate::storage::LocalStorage;

    #[tokio::test]
    async fn test_cleans_export() {
        let tmp = TempDir::new().unwrap();
        let input = tmp.path().join("courses.json");
        let export = json!({
            "CourseFullModels": [
                {
                    "Id": "1",
                    "CourseTitleDisplay": "CHEM-1A General Chemistry",
                    "TermsOffered": ["Fall"],
                    "Requisites": [{"RequirementCode": "P1", "CompletionOrder": "Previous"}],
                    "CourseRequisites": [{"RequisiteId": "P1", "IsRequired": true, "DisplayText": "MATH 18"}]
                }
            ]
        });
        std::fs::write(&input, export.to_string()).unwrap();

        let storage = LocalStorage::new(tmp.path().join("out"));
        let meta = run_courses(&input, "courses_cleaned.json", &storage)
            .await
            .unwrap();
        assert_eq!(meta.count, 1);

        let written: Value = serde_json::from_str(
            &std::fs::read_to_string(tmp.path().join("out/courses_cleaned.json")).unwrap(),
        )
        .unwrap();
        assert_eq!(
            written,
            json!([{
                "Id": "1",
                "CourseCode": "CHEM 1A General Chemistry",
                "RequirementTree": {
                    "course": "MATH 18",
                    "RequisiteId": "P1",
                    "IsRequired": true,
                    "CompletionOrder": "Previous"
                }
            }])
        );
    }

    #[tokio::test]
    async fn test_missing_array_writes_empty_list() {
        let tmp = TempDir::new().unwrap();
        let input = tmp.path().join("courses.json");
        std::fs::write(&input, r#"{"Other": 1}"#).unwrap();

        let storage = LocalStorage::new(tmp.path());
        let meta = run_courses(&input, "cleaned.json", &storage).await.unwrap();
        assert_eq!(meta.count, 0);
    }
}
