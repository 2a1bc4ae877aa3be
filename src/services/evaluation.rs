// src/services/evaluation.rs

//! Program evaluation client.
//!
//! Asks the degree-audit service for a what-if evaluation of a program,
//! caches the raw answer and reconciles it into a canonical [`Program`].

use std::sync::Arc;

use serde_json::{Value, json};
use thiserror::Error;

use crate::error::FetchFailure;
use crate::models::{EvaluationConfig, Program};
use crate::parser::{EvaluationResponse, ReconcileFailure, reconcile};
use crate::services::fetcher::Fetcher;
use crate::storage::SnapshotStorage;

/// Why a program could not be evaluated.
#[derive(Error, Debug)]
pub enum EvaluationFailure {
    #[error(transparent)]
    Fetch(#[from] FetchFailure),

    #[error("unreadable payload: {0}")]
    Decode(#[from] serde_json::Error),

    #[error(transparent)]
    Reconcile(#[from] ReconcileFailure),
}

/// Result of evaluating one program code.
#[derive(Debug)]
pub enum EvaluationOutcome {
    Reconciled {
        code: String,
        program: Program,
        cached: bool,
    },
    Failed {
        code: String,
        failure: EvaluationFailure,
    },
}

impl EvaluationOutcome {
    pub fn code(&self) -> &str {
        match self {
            Self::Reconciled { code, .. } | Self::Failed { code, .. } => code,
        }
    }
}

/// Client for the evaluation API.
pub struct EvaluationClient {
    config: EvaluationConfig,
    fetcher: Fetcher,
    storage: Arc<dyn SnapshotStorage>,
}

impl EvaluationClient {
    pub fn new(config: EvaluationConfig, fetcher: Fetcher, storage: Arc<dyn SnapshotStorage>) -> Self {
        Self {
            config,
            fetcher,
            storage,
        }
    }

    /// Request body for one program.
    pub fn request_body(&self, code: &str) -> Value {
        json!({
            "program": code,
            "catalogYear": self.config.catalog_year,
            "isWhatIfEvaluation": true,
            "studentId": self.config.student_id,
        })
    }

    /// Evaluate one program, preferring a cached payload.
    pub async fn evaluate(&self, code: &str) -> EvaluationOutcome {
        match self.payload(code).await {
            Ok((payload, cached)) => match rebuild(payload) {
                Ok(program) => EvaluationOutcome::Reconciled {
                    code: code.to_string(),
                    program,
                    cached,
                },
                Err(failure) => EvaluationOutcome::Failed {
                    code: code.to_string(),
                    failure,
                },
            },
            Err(failure) => EvaluationOutcome::Failed {
                code: code.to_string(),
                failure,
            },
        }
    }

    /// Raw payload and whether it came from the cache.
    async fn payload(&self, code: &str) -> Result<(Value, bool), EvaluationFailure> {
        match self.storage.load_payload(code).await {
            Ok(Some(cached)) if has_program(&cached) => {
                log::debug!("Using cached evaluation for {}", code);
                return Ok((cached, true));
            }
            Ok(_) => {}
            Err(e) => log::warn!("Could not read cached evaluation for {}: {}", code, e),
        }

        let body = self
            .fetcher
            .post_json(&self.config.api_url, &self.request_body(code))
            .await?;
        let payload: Value = serde_json::from_str(&body)?;

        if let Err(e) = self.storage.save_payload(code, &payload).await {
            log::warn!("Could not cache evaluation for {}: {}", code, e);
        }
        Ok((payload, false))
    }
}

fn rebuild(payload: Value) -> Result<Program, EvaluationFailure> {
    let response: EvaluationResponse = serde_json::from_value(payload)?;
    Ok(reconcile(&response)?)
}

fn has_program(payload: &Value) -> bool {
    payload.get("Program").is_some_and(|p| !p.is_null())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tempfile::TempDir;

    use super::*;
    use crate::services::fetcher::RetryPolicy;
    use crate::services::fetcher::testing::ScriptedTransport;
    use crate::storage::LocalStorage;

    const API: &str = "https://audit.example.edu/Planning/Programs/ProgramEvaluation";

    fn payload(code: &str) -> Value {
        json!({
            "Program": {
                "Title": "Biology",
                "Code": code,
                "Requirements": [{
                    "Description": "Major",
                    "Code": "R1",
                    "Subrequirements": [{
                        "Code": "S1",
                        "Groups": [{"Courses": [{"CourseName": "BIOL-1"}]}]
                    }]
                }]
            },
            "Notifications": []
        })
    }

    fn client(
        transport: &Arc<ScriptedTransport>,
        storage: Arc<dyn SnapshotStorage>,
    ) -> EvaluationClient {
        let config = EvaluationConfig {
            api_url: API.to_string(),
            student_id: Some("0001".to_string()),
            ..EvaluationConfig::default()
        };
        let policy = RetryPolicy {
            max_attempts: 1,
            base: Duration::from_millis(1),
            cap: Duration::from_millis(1),
        };
        let fetcher = Fetcher::new(transport.clone(), policy, 2);
        EvaluationClient::new(config, fetcher, storage)
    }

    #[test]
    fn test_request_body() {
        let tmp = TempDir::new().unwrap();
        let client = client(
            &Arc::new(ScriptedTransport::new()),
            Arc::new(LocalStorage::new(tmp.path())),
        );
        let body = client.request_body("BIO.AS");
        assert_eq!(body["program"], "BIO.AS");
        assert_eq!(body["catalogYear"], "2025");
        assert_eq!(body["isWhatIfEvaluation"], true);
        assert_eq!(body["studentId"], "0001");
    }

    #[tokio::test]
    async fn test_fetches_then_uses_cache() {
        let tmp = TempDir::new().unwrap();
        let storage = Arc::new(LocalStorage::new(tmp.path()));
        let transport = Arc::new(ScriptedTransport::new());
        transport.respond(API, 200, &payload("BIO.AS").to_string());
        let client = client(&transport, storage.clone());

        match client.evaluate("BIO.AS").await {
            EvaluationOutcome::Reconciled { program, cached, .. } => {
                assert!(!cached);
                assert_eq!(program.program_code, "BIO.AS");
            }
            EvaluationOutcome::Failed { failure, .. } => panic!("unexpected failure: {failure}"),
        }
        assert!(storage.load_payload("BIO.AS").await.unwrap().is_some());

        match client.evaluate("BIO.AS").await {
            EvaluationOutcome::Reconciled { cached, .. } => assert!(cached),
            EvaluationOutcome::Failed { failure, .. } => panic!("unexpected failure: {failure}"),
        }
        assert_eq!(transport.total_calls(), 1);
    }

    #[tokio::test]
    async fn test_cache_without_program_is_refetched() {
        let tmp = TempDir::new().unwrap();
        let storage = Arc::new(LocalStorage::new(tmp.path()));
        storage
            .save_payload("BIO.AS", &json!({"Program": null}))
            .await
            .unwrap();
        let transport = Arc::new(ScriptedTransport::new());
        transport.respond(API, 200, &payload("BIO.AS").to_string());
        let client = client(&transport, storage);

        assert!(matches!(
            client.evaluate("BIO.AS").await,
            EvaluationOutcome::Reconciled { cached: false, .. }
        ));
        assert_eq!(transport.total_calls(), 1);
    }

    #[tokio::test]
    async fn test_payload_with_nulls_is_reconciled() {
        let tmp = TempDir::new().unwrap();
        let transport = Arc::new(ScriptedTransport::new());
        let mut body = payload("BIO.AS");
        body["Program"]["Departments"] = Value::Null;
        body["Program"]["Degree"] = Value::Null;
        body["Program"]["Requirements"][0]["Subrequirements"][0]["Groups"][0]["FromCourses"] =
            Value::Null;
        body["Notifications"] = Value::Null;
        transport.respond(API, 200, &body.to_string());
        let client = client(&transport, Arc::new(LocalStorage::new(tmp.path())));

        match client.evaluate("BIO.AS").await {
            EvaluationOutcome::Reconciled { program, .. } => {
                assert_eq!(program.department, "Unknown");
                assert_eq!(program.detail.unwrap().sections[0].name, "Major - S1");
            }
            EvaluationOutcome::Failed { failure, .. } => panic!("unexpected failure: {failure}"),
        }
    }

    #[tokio::test]
    async fn test_failures_are_reported() {
        let tmp = TempDir::new().unwrap();
        let transport = Arc::new(ScriptedTransport::new());
        transport.respond(
            API,
            200,
            r#"{"Program": {"Code": "X", "Requirements": []}, "Notifications": [{"Message": "Program has no requirements"}]}"#,
        );
        let client = client(&transport, Arc::new(LocalStorage::new(tmp.path())));

        match client.evaluate("X").await {
            EvaluationOutcome::Failed { code, failure } => {
                assert_eq!(code, "X");
                assert!(matches!(
                    failure,
                    EvaluationFailure::Reconcile(ReconcileFailure::NoRequirements { .. })
                ));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }
}
